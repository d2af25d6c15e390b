//! Revert/restore of the in-flight update as seen from listeners

mod common;

use std::cell::RefCell;
use std::rc::Rc;

use common::{find, sample_tree, types};
use serde_json::{json, Value};
use sylva_core::errors::Result;
use sylva_core::{Model, Node, NodeListener};

/// Reverts during notification and records what it sees
struct Peek {
    model: Model,
    restore: bool,
    seen: RefCell<Vec<Option<Value>>>,
}

impl Peek {
    fn new(model: &Model, restore: bool) -> Rc<Self> {
        Rc::new(Self {
            model: model.clone(),
            restore,
            seen: RefCell::new(Vec::new()),
        })
    }
}

impl NodeListener for Peek {
    fn notify_change(&self, node: &Node, name: &str, _: &Value, _: Option<&Value>) -> Result<()> {
        self.model.revert();
        self.seen.borrow_mut().push(node.attribute(name));
        if self.restore {
            self.model.restore();
            self.seen.borrow_mut().push(node.attribute(name));
        }
        Ok(())
    }
}

/// Reads without reverting
#[derive(Default)]
struct Reader {
    seen: RefCell<Vec<Option<Value>>>,
    reverted: RefCell<Vec<bool>>,
}

impl NodeListener for Reader {
    fn notify_change(&self, node: &Node, name: &str, _: &Value, _: Option<&Value>) -> Result<()> {
        self.seen.borrow_mut().push(node.attribute(name));
        self.reverted.borrow_mut().push(node.model().is_reverted());
        Ok(())
    }
}

#[test]
fn test_scenario_listener_sees_old_value_after_revert() {
    // GIVEN a node with n=1 and a listener that reverts then restores
    let model = Model::new();
    let node = model.create_node("item");
    node.set_attribute("n", 1).unwrap();
    let peek = Peek::new(&model, true);
    let listener: Rc<dyn NodeListener> = peek.clone();
    node.add_listener(&listener);

    // WHEN n is set to 2
    node.set_attribute("n", 2).unwrap();

    // THEN the listener saw 1 while reverted and 2 after restoring
    assert_eq!(*peek.seen.borrow(), vec![Some(json!(1)), Some(json!(2))]);
    assert_eq!(node.attribute("n"), Some(json!(2)));
    assert!(!model.is_reverted());
}

#[test]
fn test_scenario_revert_does_not_leak_to_next_listener() {
    // GIVEN a listener that reverts without restoring, followed by a reader
    let model = Model::new();
    let node = model.create_node("item");
    node.set_attribute("n", 1).unwrap();
    let peek = Peek::new(&model, false);
    let reader = Rc::new(Reader::default());
    let first: Rc<dyn NodeListener> = peek.clone();
    let second: Rc<dyn NodeListener> = reader.clone();
    node.add_listener(&first);
    node.add_listener(&second);

    // WHEN n changes
    node.set_attribute("n", 2).unwrap();

    // THEN the reader observes the restored (new) state
    assert_eq!(*peek.seen.borrow(), vec![Some(json!(1))]);
    assert_eq!(*reader.seen.borrow(), vec![Some(json!(2))]);
    assert_eq!(*reader.reverted.borrow(), vec![false]);
    assert_eq!(node.attribute("n"), Some(json!(2)));
}

/// Reverts an add-child and records the child list it sees
struct StructurePeek {
    seen: RefCell<Vec<(Vec<String>, bool)>>,
}

impl NodeListener for StructurePeek {
    fn notify_add_child(&self, parent: &Node, child: &Node, _: usize) -> Result<()> {
        parent.model().revert();
        self.seen
            .borrow_mut()
            .push((types(parent.children()), child.parent().is_some()));
        parent.model().restore();
        self.seen
            .borrow_mut()
            .push((types(parent.children()), child.parent().is_some()));
        Ok(())
    }
}

#[test]
fn test_structural_revert_and_restore() {
    let model = Model::new();
    let r = sample_tree(&model);
    let b = find(&r, "b");
    let peek = Rc::new(StructurePeek {
        seen: RefCell::new(Vec::new()),
    });
    let listener: Rc<dyn NodeListener> = peek.clone();
    b.add_listener(&listener);

    let fresh = model.create_node("b1");
    b.add_child(&fresh, None).unwrap();

    let seen = peek.seen.borrow();
    assert_eq!(seen[0], (Vec::<String>::new(), false));
    assert_eq!(seen[1], (vec!["b1".to_string()], true));
}

#[test]
fn test_revert_targets_only_the_innermost_update() {
    let model = Model::new();
    let node = model.create_node("item");

    model.start_update();
    node.set_attribute("outer", 1).unwrap();
    model.start_update();
    model.revert();
    // The innermost update recorded nothing, so nothing changes
    assert_eq!(node.attribute("outer"), Some(json!(1)));
    model.restore();
    model.end_update();
    model.end_update();

    assert_eq!(model.update_depth(), 0);
    assert_eq!(model.current_update_id(), 0);
}

#[test]
fn test_delivery_restores_a_revert_left_by_listener() {
    let model = Model::new();
    let node = model.create_node("item");
    node.set_attribute("n", 1).unwrap();

    struct RevertAndLeave;
    impl NodeListener for RevertAndLeave {
        fn notify_change(&self, node: &Node, _: &str, _: &Value, _: Option<&Value>) -> Result<()> {
            node.model().revert();
            Ok(())
        }
    }
    let listener: Rc<dyn NodeListener> = Rc::new(RevertAndLeave);
    node.add_listener(&listener);

    node.set_attribute("n", 2).unwrap();
    assert_eq!(node.attribute("n"), Some(json!(2)));
    assert!(!model.is_reverted());
}

/// On `trigger` writes, repeats `other`'s current value and counts mementos
struct Repeat {
    other: Node,
    counts: RefCell<Vec<usize>>,
}

impl NodeListener for Repeat {
    fn notify_change(&self, node: &Node, name: &str, _: &Value, _: Option<&Value>) -> Result<()> {
        if name != "trigger" {
            return Ok(());
        }
        let model = node.model();
        self.counts.borrow_mut().push(model.memento_count());
        let current = self.other.attribute("n").unwrap_or(Value::Null);
        self.other.set_attribute("n", current)?;
        self.counts.borrow_mut().push(model.memento_count());
        model.revert();
        self.counts.borrow_mut().push(usize::from(node.attribute("trigger").is_none()));
        Ok(())
    }
}

#[test]
fn test_scenario_noop_set_records_no_memento() {
    // GIVEN other.n = 1 and a listener on node that rewrites other.n unchanged
    let model = Model::new();
    let node = model.create_node("node");
    let other = model.create_node("other");
    other.set_attribute("n", 1).unwrap();
    let repeat = Rc::new(Repeat {
        other: other.clone(),
        counts: RefCell::new(Vec::new()),
    });
    let listener: Rc<dyn NodeListener> = repeat.clone();
    node.add_listener(&listener);

    // WHEN node.trigger is written
    node.set_attribute("trigger", true).unwrap();

    // THEN the rewrite added nothing to the in-flight update
    // AND reverting it still undoes only the trigger write
    assert_eq!(*repeat.counts.borrow(), vec![1, 1, 1]);
    assert_eq!(other.attribute("n"), Some(json!(1)));
    assert_eq!(node.attribute("trigger"), Some(json!(true)));
    assert_eq!(model.memento_count(), 0);
}
