//! Reified mutations
//!
//! A [`ChangeRecord`] captures one mutation as data so it can be deferred,
//! replayed, filtered or shipped relative to a root. [`ChangeSet`] keeps an
//! ordered list of them; the union and intersect variants filter what the
//! tree differ feeds in.

mod change_set;
mod record;
mod set_ops;

pub use change_set::{ChangeSet, ChangeSink};
pub use record::{ChangeKind, ChangeRecord, ChangeTarget};
pub use set_ops::{IntersectChangeSet, UnionChangeSet};
