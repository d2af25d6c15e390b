#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Rc;

use sylva_core::errors::{Result, SylvaError};
use sylva_core::{ExceptionSink, Model, Node, NodeListener, Value};

/// State owned by a model thread in these tests
pub struct Document {
    pub root: Node,
    pub log: Rc<EventLog>,
    pub sink: Rc<ErrorLog>,
    // nodes hold listeners weakly
    _listener: Rc<dyn NodeListener>,
}

/// Build a `doc` root with an event log attached and an error-collecting sink
pub fn document(model: &Model) -> Result<Document> {
    let sink = Rc::new(ErrorLog::default());
    model.set_exception_sink(sink.clone());
    let root = model.create_node("doc");
    let log = Rc::new(EventLog::default());
    let listener: Rc<dyn NodeListener> = log.clone();
    root.add_listener(&listener);
    Ok(Document {
        root,
        log,
        sink,
        _listener: listener,
    })
}

#[derive(Default)]
pub struct EventLog {
    events: RefCell<Vec<String>>,
}

impl EventLog {
    pub fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.events.borrow_mut())
    }
}

impl NodeListener for EventLog {
    fn notify_add_child(&self, _parent: &Node, child: &Node, index: usize) -> Result<()> {
        self.events
            .borrow_mut()
            .push(format!("add {}@{}", child.node_type(), index));
        Ok(())
    }

    fn notify_change(
        &self,
        _node: &Node,
        name: &str,
        new_value: &Value,
        _old_value: Option<&Value>,
    ) -> Result<()> {
        self.events
            .borrow_mut()
            .push(format!("set {}={}", name, new_value));
        Ok(())
    }
}

#[derive(Default)]
pub struct ErrorLog {
    errors: RefCell<Vec<SylvaError>>,
}

impl ErrorLog {
    pub fn errors(&self) -> Vec<SylvaError> {
        self.errors.borrow().clone()
    }
}

impl ExceptionSink for ErrorLog {
    fn handle_exception(&self, error: &SylvaError) {
        self.errors.borrow_mut().push(error.clone());
    }
}
