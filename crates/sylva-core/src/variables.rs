//! Named variables with undo support
//!
//! A [`VariableScope`] holds values that path predicates can compare
//! attributes against (`[@owner=$user]`). Writes go through the model's
//! update protocol, so they are reverted and restored with the rest of the
//! innermost update, and listeners are notified with the same failure
//! isolation as node listeners.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::{Rc, Weak};

use crate::errors::Result;
use crate::listener::deliver_each;
use crate::node::Value;
use crate::update::{Memento, Model};

/// Observer of variable writes
pub trait VariableListener {
    /// `name` changed; either value is `None` when the variable is unset
    fn notify_variable(
        &self,
        scope: &VariableScope,
        name: &str,
        new_value: Option<&Value>,
        old_value: Option<&Value>,
    ) -> Result<()>;
}

/// Shared handle to a set of named values
#[derive(Clone)]
pub struct VariableScope {
    inner: Rc<ScopeInner>,
}

struct ScopeInner {
    model: Model,
    values: RefCell<BTreeMap<String, Value>>,
    listeners: RefCell<Vec<Weak<dyn VariableListener>>>,
}

impl VariableScope {
    pub fn new(model: &Model) -> Self {
        Self {
            inner: Rc::new(ScopeInner {
                model: model.clone(),
                values: RefCell::new(BTreeMap::new()),
                listeners: RefCell::new(Vec::new()),
            }),
        }
    }

    pub fn model(&self) -> &Model {
        &self.inner.model
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        self.inner.values.borrow().get(name).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        self.inner.values.borrow().keys().cloned().collect()
    }

    /// Write a variable, returning the previous value
    ///
    /// `Null` unsets the variable. Writing the current value is a no-op.
    pub fn set(&self, name: &str, value: impl Into<Value>) -> Option<Value> {
        let value = Some(value.into()).filter(|v| !v.is_null());
        let old = self.get(name);
        if old == value {
            return old;
        }

        let model = self.inner.model.clone();
        let _update = model.begin();
        model.record(Memento::Variable {
            scope: self.clone(),
            name: name.to_string(),
            old: old.clone(),
            new: value.clone(),
        });
        self.raw_set(name, value.clone());

        let listeners: Vec<_> = self
            .inner
            .listeners
            .borrow()
            .iter()
            .filter_map(|l| l.upgrade())
            .collect();
        deliver_each(&model, listeners, |listener| {
            listener.notify_variable(self, name, value.as_ref(), old.as_ref())
        });
        old
    }

    /// Unset a variable, returning the previous value
    pub fn remove(&self, name: &str) -> Option<Value> {
        self.set(name, Value::Null)
    }

    pub fn add_listener(&self, listener: &Rc<dyn VariableListener>) {
        let mut listeners = self.inner.listeners.borrow_mut();
        listeners.retain(|l| l.strong_count() > 0);
        let target = Rc::as_ptr(listener) as *const ();
        if !listeners.iter().any(|l| l.as_ptr() as *const () == target) {
            listeners.push(Rc::downgrade(listener));
        }
    }

    pub fn remove_listener(&self, listener: &Rc<dyn VariableListener>) {
        let target = Rc::as_ptr(listener) as *const ();
        self.inner
            .listeners
            .borrow_mut()
            .retain(|l| l.strong_count() > 0 && l.as_ptr() as *const () != target);
    }

    pub(crate) fn raw_set(&self, name: &str, value: Option<Value>) {
        let mut values = self.inner.values.borrow_mut();
        match value {
            Some(value) => values.insert(name.to_string(), value),
            None => values.remove(name),
        };
    }
}

impl fmt::Debug for VariableScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.inner.values.borrow().iter())
            .finish()
    }
}
