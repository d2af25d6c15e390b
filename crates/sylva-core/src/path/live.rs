//! Live path listeners
//!
//! A [`ListenerChain`] keeps the result of one path evaluated from one
//! context node up to date. It stores every intermediate layer of the
//! evaluation and hooks itself as a node listener on each node the layers
//! depend on, remembering the earliest step that depends on it. An event on
//! a hooked node re-evaluates from that step onward, diffs the final layer
//! and tells the [`PathListener`] which nodes left and which joined the
//! result, removals first.
//!
//! Events raised while a chain is re-evaluating (for instance by a lazily
//! synchronized external node) only mark the chain dirty; the running
//! evaluation loops until no dirty step remains.
//!
//! Ownership: the context node owns its chains, and a chain holds its
//! context and every node in its layers strongly. Nodes only hold weak
//! references to the chain as a listener. A registered chain therefore
//! keeps its context alive, even after the context is detached, until
//! [`Path::remove_path_listener`] takes it off the context.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};
use std::rc::{Rc, Weak};
use std::time::Instant;

use crate::errors::Result;
use crate::listener::{deliver_each, NodeListener};
use crate::node::{Node, NodeKey, Value};
use crate::traversal::Ancestors;
use crate::{log_op_end, log_op_start};

use super::axis::Axis;
use super::eval::{axis_candidates, evaluate_step};
use super::predicate::ExpressionListener;
use super::Path;

/// Told when the set of nodes a path selects from a context changes
pub trait PathListener {
    fn notify_add(&self, context: &Node, path: &Path, nodes: &[Node]) -> Result<()>;

    fn notify_remove(&self, context: &Node, path: &Path, nodes: &[Node]) -> Result<()>;
}

/// Axes whose results move when the context's ancestry changes
const ANCESTRY: Axis = Axis::ROOT
    .union(Axis::PARENT)
    .union(Axis::ANCESTOR)
    .union(Axis::FOLLOWING)
    .union(Axis::PRECEDING)
    .union(Axis::FOLLOWING_SIBLING)
    .union(Axis::PRECEDING_SIBLING);

struct Hook {
    node: Node,
    /// Steps that expand from or through the node, ascending
    steps: Vec<usize>,
}

#[derive(Default)]
struct ChainState {
    /// `layers[k]` holds the nodes selected by the first `k` steps
    layers: Vec<Vec<Node>>,
    hooks: HashMap<NodeKey, Hook>,
}

pub(crate) struct ListenerChain {
    this: Weak<ListenerChain>,
    path: Path,
    context: Node,
    listener: Rc<dyn PathListener>,
    state: RefCell<ChainState>,
    busy: Cell<bool>,
    dirty_from: Cell<Option<usize>>,
}

impl ListenerChain {
    fn new(path: &Path, context: &Node, listener: Rc<dyn PathListener>) -> Rc<Self> {
        Rc::new_cyclic(|this| Self {
            this: this.clone(),
            path: path.clone(),
            context: context.clone(),
            listener,
            state: RefCell::new(ChainState::default()),
            busy: Cell::new(false),
            dirty_from: Cell::new(None),
        })
    }

    pub(crate) fn is_for(&self, path: &Path, context: &Node, listener: &Rc<dyn PathListener>) -> bool {
        self.context.ptr_eq(context)
            && Rc::as_ptr(&self.listener) as *const () == Rc::as_ptr(listener) as *const ()
            && self.path == *path
    }

    /// Nodes currently selected
    pub(crate) fn leaves(&self) -> Vec<Node> {
        self.state
            .borrow()
            .layers
            .last()
            .cloned()
            .unwrap_or_default()
    }

    fn as_hook(&self) -> Option<Rc<dyn NodeListener>> {
        let this: Rc<dyn NodeListener> = self.this.upgrade()?;
        Some(this)
    }

    fn as_expression_listener(&self) -> Option<Rc<dyn ExpressionListener>> {
        let this: Rc<dyn ExpressionListener> = self.this.upgrade()?;
        Some(this)
    }

    fn install(&self) {
        let layers = self.evaluate(vec![vec![self.context.clone()]], 0);
        self.state.borrow_mut().layers = layers;
        self.rehook();
        if let Some(listener) = self.as_expression_listener() {
            for element in self.path.elements() {
                if let Some(predicate) = &element.predicate {
                    predicate.add_expression_listener(&listener);
                }
            }
        }
        let added = self.leaves();
        if !added.is_empty() {
            self.deliver(|l| l.notify_add(&self.context, &self.path, &added));
        }
    }

    fn uninstall(&self) {
        self.unhook();
        if let Some(listener) = self.as_expression_listener() {
            for element in self.path.elements() {
                if let Some(predicate) = &element.predicate {
                    predicate.remove_expression_listener(&listener);
                }
            }
        }
        let removed = std::mem::take(&mut self.state.borrow_mut().layers)
            .pop()
            .unwrap_or_default();
        if !removed.is_empty() {
            self.deliver(|l| l.notify_remove(&self.context, &self.path, &removed));
        }
    }

    fn deliver(&self, notify: impl FnMut(&Rc<dyn PathListener>) -> Result<()>) {
        deliver_each(self.context.model(), vec![self.listener.clone()], notify);
    }

    /// Evaluate steps `from..` on top of `layers[..=from]`
    fn evaluate(&self, mut layers: Vec<Vec<Node>>, from: usize) -> Vec<Vec<Node>> {
        layers.truncate(from + 1);
        for element in &self.path.elements()[from..] {
            let mut seen = HashSet::new();
            let mut next = Vec::new();
            if let Some(current) = layers.last() {
                for node in current {
                    evaluate_step(element, node, &mut seen, &mut next);
                }
            }
            layers.push(next);
        }
        if super::invert::anchored_at_root(&self.path) {
            if let Some(last) = layers.last_mut() {
                last.retain(|n| n.parent().is_none());
            }
        }
        layers
    }

    /// Re-evaluate from step `from` and report the difference
    fn recompute(&self, from: usize) {
        if self.busy.get() {
            let earliest = self.dirty_from.get().map_or(from, |d| d.min(from));
            self.dirty_from.set(Some(earliest));
            return;
        }
        self.busy.set(true);
        let mut from = from;
        loop {
            let start = Instant::now();
            log_op_start!("path_recompute", path = %self.path, from_step = from);

            let previous = std::mem::take(&mut self.state.borrow_mut().layers);
            let old_leaves = previous.last().cloned().unwrap_or_default();
            let layers = if previous.len() > from {
                self.evaluate(previous, from)
            } else {
                self.evaluate(vec![vec![self.context.clone()]], 0)
            };
            let new_leaves = layers.last().cloned().unwrap_or_default();
            self.state.borrow_mut().layers = layers;
            self.rehook();

            let old_keys: HashSet<NodeKey> = old_leaves.iter().map(Node::key).collect();
            let new_keys: HashSet<NodeKey> = new_leaves.iter().map(Node::key).collect();
            let removed: Vec<Node> = old_leaves
                .into_iter()
                .filter(|n| !new_keys.contains(&n.key()))
                .collect();
            let added: Vec<Node> = new_leaves
                .into_iter()
                .filter(|n| !old_keys.contains(&n.key()))
                .collect();

            if !removed.is_empty() {
                self.deliver(|l| l.notify_remove(&self.context, &self.path, &removed));
            }
            if !added.is_empty() {
                self.deliver(|l| l.notify_add(&self.context, &self.path, &added));
            }
            log_op_end!(
                "path_recompute",
                duration_ms = start.elapsed().as_millis() as u64,
                added = added.len(),
                removed = removed.len()
            );

            match self.dirty_from.take() {
                Some(next) => from = next,
                None => break,
            }
        }
        self.busy.set(false);
    }

    fn unhook(&self) {
        let hooks = std::mem::take(&mut self.state.borrow_mut().hooks);
        if let Some(hook) = self.as_hook() {
            for entry in hooks.values() {
                entry.node.remove_listener(&hook);
            }
        }
    }

    /// Replace the hook set with the nodes the current layers depend on
    ///
    /// Only nodes that joined or left the set gain or lose the listener.
    fn rehook(&self) {
        let Some(hook) = self.as_hook() else {
            return;
        };

        let layers = self.state.borrow().layers.clone();
        let mut hooks: HashMap<NodeKey, Hook> = HashMap::new();
        let mut watch = |node: &Node, step: usize| {
            if node.is_attribute_node() {
                return;
            }
            let entry = hooks.entry(node.key()).or_insert_with(|| Hook {
                node: node.clone(),
                steps: Vec::new(),
            });
            if !entry.steps.contains(&step) {
                entry.steps.push(step);
                entry.steps.sort_unstable();
            }
        };

        for (step, element) in self.path.elements().iter().enumerate() {
            let Some(contexts) = layers.get(step) else {
                break;
            };
            for context in contexts {
                watch(context, step);
                if element.axis.intersects(ANCESTRY) {
                    for ancestor in Ancestors::new(context) {
                        watch(&ancestor, step);
                    }
                }
                let mut candidates = Vec::new();
                axis_candidates(element, context, &mut candidates);
                for candidate in &candidates {
                    watch(candidate, step);
                }
            }
        }

        let previous = std::mem::take(&mut self.state.borrow_mut().hooks);
        for (key, entry) in &previous {
            if !hooks.contains_key(key) {
                entry.node.remove_listener(&hook);
            }
        }
        for (key, entry) in &hooks {
            if !previous.contains_key(key) {
                entry.node.add_listener(&hook);
            }
        }
        self.state.borrow_mut().hooks = hooks;
    }

    fn earliest_step(&self, node: &Node) -> Option<usize> {
        let state = self.state.borrow();
        state
            .hooks
            .get(&node.key())
            .and_then(|h| h.steps.first().copied())
    }

    /// Earliest step whose result can depend on attribute `name` of `node`
    fn attribute_step(&self, node: &Node, name: &str) -> Option<usize> {
        let state = self.state.borrow();
        let hook = state.hooks.get(&node.key())?;
        let elements = self.path.elements();
        hook.steps.iter().copied().find(|&step| {
            let element = &elements[step];
            element.axis.contains(Axis::ATTRIBUTE)
                || element
                    .predicate
                    .as_ref()
                    .map(|p| p.watched_attributes().watches(name))
                    .unwrap_or(false)
        })
    }

    /// Earliest step with a predicate that looks at candidates' children
    fn children_step(&self, node: &Node) -> Option<usize> {
        let state = self.state.borrow();
        let hook = state.hooks.get(&node.key())?;
        let elements = self.path.elements();
        hook.steps.iter().copied().find(|&step| {
            elements[step]
                .predicate
                .as_ref()
                .map(|p| p.watches_children())
                .unwrap_or(false)
        })
    }

    fn structural_event(&self, node: &Node) {
        let step = match (self.earliest_step(node), self.children_step(node)) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };
        if let Some(step) = step {
            self.recompute(step);
        }
    }
}

impl NodeListener for ListenerChain {
    fn notify_parent(
        &self,
        child: &Node,
        _new_parent: Option<&Node>,
        _old_parent: Option<&Node>,
    ) -> Result<()> {
        self.structural_event(child);
        Ok(())
    }

    fn notify_add_child(&self, parent: &Node, _child: &Node, _index: usize) -> Result<()> {
        self.structural_event(parent);
        Ok(())
    }

    fn notify_remove_child(&self, parent: &Node, _child: &Node, _index: usize) -> Result<()> {
        self.structural_event(parent);
        Ok(())
    }

    fn notify_change(
        &self,
        node: &Node,
        name: &str,
        _new_value: &Value,
        _old_value: Option<&Value>,
    ) -> Result<()> {
        if let Some(step) = self.attribute_step(node, name) {
            self.recompute(step);
        }
        Ok(())
    }

    fn notify_clear(&self, node: &Node, name: &str, _old_value: &Value) -> Result<()> {
        if let Some(step) = self.attribute_step(node, name) {
            self.recompute(step);
        }
        Ok(())
    }

    fn notify_dirty(&self, node: &Node, _dirty: bool) -> Result<()> {
        self.structural_event(node);
        Ok(())
    }
}

impl ExpressionListener for ListenerChain {
    fn notify_expression_changed(&self) {
        self.recompute(0);
    }
}

impl Path {
    /// Keep `listener` informed of the nodes this path selects from `context`
    ///
    /// The listener is told about the current result right away. It stays
    /// registered (and held) until [`Path::remove_path_listener`] is called
    /// with the same context and listener.
    pub fn add_path_listener(&self, context: &Node, listener: Rc<dyn PathListener>) {
        let start = Instant::now();
        log_op_start!("add_path_listener", path = %self);
        let chain = ListenerChain::new(self, context, listener);
        context.push_path_chain(chain.clone());
        chain.install();
        log_op_end!(
            "add_path_listener",
            duration_ms = start.elapsed().as_millis() as u64,
            selected = chain.leaves().len()
        );
    }

    /// Stop notifying `listener`; it is told the current result was removed
    ///
    /// Returns false when no such registration exists.
    pub fn remove_path_listener(&self, context: &Node, listener: &Rc<dyn PathListener>) -> bool {
        match context.take_path_chain(|c| c.is_for(self, context, listener)) {
            Some(chain) => {
                chain.uninstall();
                true
            }
            None => false,
        }
    }
}
