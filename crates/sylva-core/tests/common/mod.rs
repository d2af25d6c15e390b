#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Rc;

use sylva_core::errors::{Result, SylvaError};
use sylva_core::traversal::DepthFirst;
use sylva_core::{ExceptionSink, Model, Node, NodeListener, Value};

/// Build the shared fixture tree
///
/// ```text
/// r
/// ├── a
/// │   ├── a1
/// │   └── a2
/// ├── b
/// └── c
///     └── c1
/// ```
pub fn sample_tree(model: &Model) -> Node {
    let r = model.create_node("r");
    let a = model.create_node("a");
    let b = model.create_node("b");
    let c = model.create_node("c");
    r.add_child(&a, None).unwrap();
    r.add_child(&b, None).unwrap();
    r.add_child(&c, None).unwrap();
    a.add_child(&model.create_node("a1"), None).unwrap();
    a.add_child(&model.create_node("a2"), None).unwrap();
    c.add_child(&model.create_node("c1"), None).unwrap();
    r
}

/// First node of `node_type` in depth-first order
pub fn find(root: &Node, node_type: &str) -> Node {
    DepthFirst::new(root)
        .find(|n| n.is_type(node_type))
        .unwrap_or_else(|| panic!("no {} under {:?}", node_type, root))
}

pub fn types(nodes: impl IntoIterator<Item = Node>) -> Vec<String> {
    nodes
        .into_iter()
        .map(|n| n.node_type().to_string())
        .collect()
}

/// Node listener that records every event as a short string
#[derive(Default)]
pub struct Recorder {
    events: RefCell<Vec<String>>,
}

impl Recorder {
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    /// Register on `node` and return the handle the node holds weakly
    pub fn attach(self: &Rc<Self>, node: &Node) -> Rc<dyn NodeListener> {
        let listener: Rc<dyn NodeListener> = self.clone();
        node.add_listener(&listener);
        listener
    }

    pub fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.events.borrow_mut())
    }

    fn push(&self, event: String) {
        self.events.borrow_mut().push(event);
    }
}

fn text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

impl NodeListener for Recorder {
    fn notify_parent(
        &self,
        child: &Node,
        new_parent: Option<&Node>,
        _old_parent: Option<&Node>,
    ) -> Result<()> {
        let parent = new_parent.map_or("none".to_string(), |p| p.node_type().to_string());
        self.push(format!("parent {}->{}", child.node_type(), parent));
        Ok(())
    }

    fn notify_add_child(&self, parent: &Node, child: &Node, index: usize) -> Result<()> {
        self.push(format!("add {}+{}@{}", parent.node_type(), child.node_type(), index));
        Ok(())
    }

    fn notify_remove_child(&self, parent: &Node, child: &Node, index: usize) -> Result<()> {
        self.push(format!("remove {}-{}@{}", parent.node_type(), child.node_type(), index));
        Ok(())
    }

    fn notify_change(
        &self,
        node: &Node,
        name: &str,
        new_value: &Value,
        _old_value: Option<&Value>,
    ) -> Result<()> {
        self.push(format!("set {}.{}={}", node.node_type(), name, text(new_value)));
        Ok(())
    }

    fn notify_clear(&self, node: &Node, name: &str, _old_value: &Value) -> Result<()> {
        self.push(format!("clear {}.{}", node.node_type(), name));
        Ok(())
    }

    fn notify_dirty(&self, node: &Node, dirty: bool) -> Result<()> {
        self.push(format!("dirty {}={}", node.node_type(), dirty));
        Ok(())
    }
}

/// Exception sink that keeps every error it is handed
#[derive(Default)]
pub struct CollectingSink {
    errors: RefCell<Vec<SylvaError>>,
}

impl CollectingSink {
    pub fn errors(&self) -> Vec<SylvaError> {
        self.errors.borrow().clone()
    }
}

impl ExceptionSink for CollectingSink {
    fn handle_exception(&self, error: &SylvaError) {
        self.errors.borrow_mut().push(error.clone());
    }
}

/// Model whose exception sink is returned alongside it
pub fn model_with_sink() -> (Model, Rc<CollectingSink>) {
    let sink = Rc::new(CollectingSink::default());
    let model = Model::builder().exception_sink(sink.clone()).build();
    (model, sink)
}
