//! Node listeners and fan-out
//!
//! Listeners are held weakly by the nodes they observe. Delivery copies the
//! listener list first, so a listener may add or remove listeners (itself
//! included) while being notified. Each listener is isolated: an error or a
//! panic is routed to the model's [`ExceptionSink`] and delivery continues
//! with the next listener. After every listener the model is restored, so a
//! listener that reverted the update cannot leak the reverted view to the
//! next one.

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::rc::Rc;

use crate::errors::{ExError, Result, SylvaError};
use crate::node::{Node, Value};
use crate::update::Model;

/// Receives change notifications from the nodes it is registered on
///
/// Every callback defaults to doing nothing, except [`notify_dirty`] which
/// synchronizes a node as soon as it becomes dirty so that observed external
/// nodes stay populated.
///
/// [`notify_dirty`]: NodeListener::notify_dirty
#[allow(unused_variables)]
pub trait NodeListener {
    /// `child` moved from `old_parent` to `new_parent` (either may be absent)
    fn notify_parent(
        &self,
        child: &Node,
        new_parent: Option<&Node>,
        old_parent: Option<&Node>,
    ) -> Result<()> {
        Ok(())
    }

    fn notify_add_child(&self, parent: &Node, child: &Node, index: usize) -> Result<()> {
        Ok(())
    }

    fn notify_remove_child(&self, parent: &Node, child: &Node, index: usize) -> Result<()> {
        Ok(())
    }

    /// Attribute `name` was set; `old_value` is absent for a new attribute
    fn notify_change(
        &self,
        node: &Node,
        name: &str,
        new_value: &Value,
        old_value: Option<&Value>,
    ) -> Result<()> {
        Ok(())
    }

    /// Attribute `name` was removed
    fn notify_clear(&self, node: &Node, name: &str, old_value: &Value) -> Result<()> {
        Ok(())
    }

    fn notify_dirty(&self, node: &Node, dirty: bool) -> Result<()> {
        if dirty {
            node.children();
        }
        Ok(())
    }
}

/// Destination for errors raised while notifying listeners
pub trait ExceptionSink {
    fn handle_exception(&self, error: &SylvaError);
}

/// Default sink: log and carry on
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingExceptionSink;

impl ExceptionSink for LoggingExceptionSink {
    fn handle_exception(&self, error: &SylvaError) {
        let ex: ExError = error.clone().into();
        tracing::error!(
            err_kind = ?ex.kind(),
            err_code = ex.code(),
            error = %error,
            "listener delivery failed"
        );
    }
}

/// Text of a caught panic payload
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Deliver to each listener in `listeners`, isolating failures
pub(crate) fn deliver_each<L, F>(model: &Model, listeners: Vec<Rc<L>>, mut deliver: F)
where
    L: ?Sized,
    F: FnMut(&Rc<L>) -> Result<()>,
{
    for listener in listeners {
        let outcome = if model.options().catch_listener_panics {
            match catch_unwind(AssertUnwindSafe(|| deliver(&listener))) {
                Ok(result) => result,
                Err(payload) => Err(SylvaError::ListenerPanicked {
                    message: panic_message(payload.as_ref()),
                }),
            }
        } else {
            deliver(&listener)
        };
        if let Err(err) = outcome {
            model.handle_exception(&err);
        }
        model.restore();
    }
}

/// Deliver one event to every listener registered on `node`
pub(crate) fn fan_out<F>(node: &Node, deliver: F)
where
    F: FnMut(&Rc<dyn NodeListener>) -> Result<()>,
{
    let listeners = node.listeners();
    if listeners.is_empty() {
        return;
    }
    deliver_each(node.model(), listeners, deliver);
}
