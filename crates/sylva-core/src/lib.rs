//! Sylva Core - hierarchical document model with transactional notification
//!
//! This crate provides an in-process mutable tree of typed nodes, including:
//! - Nodes with attributes, ordered children, references and lazily
//!   synchronized external nodes
//! - Nested updates that can be reverted and restored while listeners run
//! - Freezing of notified nodes with deferred replay of their mutations
//! - Cycle-safe traversal iterators
//! - Change records and change sets (plain, union, intersect) and tree diffs
//! - Location paths with inversion and live path listeners
//!
//! A model and its nodes are single-threaded (`Rc` handles); cross-thread
//! work is handed to the model's [`Dispatcher`].

pub mod change;
pub mod config;
pub mod diff;
pub mod errors;
pub mod listener;
pub mod logging_facility;
pub mod node;
pub mod path;
pub mod traversal;
pub mod update;
pub mod variables;

pub use sylva_core_types as core_types;

// Re-export commonly used types
pub use change::{ChangeRecord, ChangeSet, ChangeSink, IntersectChangeSet, UnionChangeSet};
pub use config::ModelOptions;
pub use diff::diff_trees;
pub use errors::{ExError, ExErrorKind, PathSyntaxError, Result, SylvaError};
pub use listener::{ExceptionSink, LoggingExceptionSink, NodeListener};
pub use node::{CachingPolicy, DefaultFactory, Node, NodeFactory, Value};
pub use path::{Axis, Path, PathElement, PathListener, Predicate};
pub use update::{Dispatcher, Model, ModelBuilder, Task};
pub use variables::{VariableListener, VariableScope};
