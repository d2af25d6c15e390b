//! Sylva Engine - embedding layer for sylva models
//!
//! A [`sylva_core::Model`] and its nodes live on one thread. This crate
//! provides the pieces an application uses to reach that thread from others:
//!
//! - [`QueueDispatcher`] / [`TaskQueue`]: a bounded blocking queue whose
//!   sending half is installed as the model's dispatcher and whose receiving
//!   half is pumped by the owning thread
//! - [`ModelThread`]: spawns the owning thread, builds its model and state,
//!   and runs submitted work until shut down

pub mod config;
pub mod queue;
pub mod thread;

pub use config::QueueConfig;
pub use queue::{task_queue, QueueDispatcher, TaskQueue};
pub use thread::{ModelThread, RunReport};
