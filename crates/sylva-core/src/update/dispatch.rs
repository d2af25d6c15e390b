//! Hand-off of work to the model's owning thread
//!
//! A model is single-threaded. Code running elsewhere submits a [`Task`] to
//! the installed [`Dispatcher`], which runs it on the thread that owns the
//! model. `sylva-engine` provides a queue-backed implementation.

use crate::errors::Result;

use super::Model;

/// Unit of work executed against a model on its owning thread
pub type Task = Box<dyn FnOnce(&Model) + Send + 'static>;

/// Routes tasks to the thread that owns a model
pub trait Dispatcher: Send + Sync {
    /// Enqueue `task`; ordering between tasks from one submitter is preserved
    ///
    /// # Errors
    /// * `DispatchFailed` - If the receiving side is gone
    fn execute(&self, task: Task) -> Result<()>;
}
