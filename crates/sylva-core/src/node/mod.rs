//! The tree entity
//!
//! A [`Node`] is a cheap-clone handle (`Rc`) to a typed tree node holding
//! name/value attributes, an ordered child list and a non-owning back
//! reference to its parent. A parent owns its children; a child only holds a
//! `Weak` pointer up, so dropping the last handle to a detached subtree
//! reclaims it.
//!
//! # Node kinds
//!
//! - **Plain**: the default in-memory node.
//! - **External**: a lazily populated node whose children and attributes are
//!   supplied by a [`CachingPolicy`] on first access while it is dirty.
//! - **Reference**: an alias that forwards every operation to its referent
//!   except parentage: a reference has its own position in the tree.
//! - **Attribute**: a transient node produced by the ATTRIBUTE axis; its value
//!   reads and writes through to the owner's attribute.
//!
//! # Identity
//!
//! Equality and hashing use the fully dereferenced referent, so a reference
//! and its referent are interchangeable as set and map keys. Structural
//! operations (child positions, parent checks) use handle identity via
//! [`Node::ptr_eq`].

mod clone;
mod external;
mod factory;
mod mutation;

use std::cell::{Ref, RefCell, RefMut};
use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::{Rc, Weak};

use crate::listener::NodeListener;
use crate::path::live::ListenerChain;
use crate::update::Model;

pub use external::CachingPolicy;
pub(crate) use external::ExternalState;
pub use factory::{DefaultFactory, NodeFactory};

/// Attribute value; `Null` is never stored (setting null removes)
pub type Value = serde_json::Value;

/// Attribute map keyed by name; the empty name holds the node's own value
pub type Attributes = BTreeMap<String, Value>;

/// Name of the attribute used to identify children by id
pub const ID_ATTRIBUTE: &str = "id";

/// Handle-level key for deduplicating query results
///
/// Unlike `Node` equality, a reference and its referent get distinct keys;
/// transient attribute nodes key by owner and name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum NodeKey {
    Handle(usize),
    Attribute(usize, String),
}

/// Render an attribute value as plain text (strings without quotes)
pub fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Shared handle to a tree node
#[derive(Clone)]
pub struct Node {
    inner: Rc<NodeInner>,
}

pub(crate) struct NodeInner {
    model: Model,
    node_type: Rc<str>,
    kind: NodeKind,
    parent: RefCell<Weak<NodeInner>>,
    data: RefCell<NodeData>,
}

pub(crate) enum NodeKind {
    Plain,
    External(ExternalState),
    Reference(Node),
    Attribute { owner: Node, name: String },
}

#[derive(Default)]
pub(crate) struct NodeData {
    pub(crate) attributes: Attributes,
    pub(crate) children: Vec<Node>,
    pub(crate) listeners: Vec<Weak<dyn NodeListener>>,
    pub(crate) path_chains: Vec<Rc<ListenerChain>>,
}

fn same_listener(a: *const dyn NodeListener, b: *const dyn NodeListener) -> bool {
    a as *const () == b as *const ()
}

impl Node {
    pub(crate) fn from_kind(model: &Model, node_type: &str, kind: NodeKind) -> Self {
        Self {
            inner: Rc::new(NodeInner {
                model: model.clone(),
                node_type: model.intern(node_type),
                kind,
                parent: RefCell::new(Weak::new()),
                data: RefCell::new(NodeData::default()),
            }),
        }
    }

    /// Create a plain in-memory node
    ///
    /// Most callers should go through [`Model::create_node`] so the model's
    /// installed factory decides the concrete kind.
    pub fn new(model: &Model, node_type: &str) -> Self {
        Self::from_kind(model, node_type, NodeKind::Plain)
    }

    /// Create an external node that starts dirty
    pub fn new_external(
        model: &Model,
        node_type: &str,
        policy: Option<Rc<dyn CachingPolicy>>,
    ) -> Self {
        Self::from_kind(model, node_type, NodeKind::External(ExternalState::new(policy, true)))
    }

    /// Create a reference (alias) to `referent`
    ///
    /// The reference belongs to the referent's model and reports the
    /// referent's type.
    pub fn new_reference(referent: &Node) -> Self {
        let model = referent.model().clone();
        Self::from_kind(
            &model,
            referent.node_type(),
            NodeKind::Reference(referent.clone()),
        )
    }

    /// Transient node standing for attribute `name` of `owner`
    pub(crate) fn attribute_node(owner: &Node, name: &str) -> Self {
        let owner = owner.referent();
        let node = Self::from_kind(
            &owner.model().clone(),
            name,
            NodeKind::Attribute {
                owner: owner.clone(),
                name: name.to_string(),
            },
        );
        *node.inner.parent.borrow_mut() = Rc::downgrade(&owner.inner);
        node
    }

    // ===== Identity =====

    /// Owning model
    pub fn model(&self) -> &Model {
        &self.inner.model
    }

    /// Interned node type (attribute name for attribute nodes)
    pub fn node_type(&self) -> &str {
        &self.inner.node_type
    }

    /// Check the node type
    pub fn is_type(&self, node_type: &str) -> bool {
        &*self.inner.node_type == node_type
    }

    /// Handle identity: true only for clones of the same handle
    pub fn ptr_eq(&self, other: &Node) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Follow reference links to a fixed point
    ///
    /// Returns `self` for anything that is not a reference.
    pub fn referent(&self) -> Node {
        let mut current = self.clone();
        loop {
            let next = match &current.inner.kind {
                NodeKind::Reference(target) => target.clone(),
                _ => return current,
            };
            current = next;
        }
    }

    pub fn is_reference(&self) -> bool {
        matches!(self.inner.kind, NodeKind::Reference(_))
    }

    /// True for nodes produced by the ATTRIBUTE axis
    pub fn is_attribute_node(&self) -> bool {
        matches!(self.inner.kind, NodeKind::Attribute { .. })
    }

    /// True when the dereferenced node is lazily populated
    pub fn is_external(&self) -> bool {
        matches!(self.referent().inner.kind, NodeKind::External(_))
    }

    pub(crate) fn kind(&self) -> &NodeKind {
        &self.inner.kind
    }

    pub(crate) fn key(&self) -> NodeKey {
        match &self.inner.kind {
            NodeKind::Attribute { owner, name } => {
                NodeKey::Attribute(Rc::as_ptr(&owner.inner) as usize, name.clone())
            }
            _ => NodeKey::Handle(Rc::as_ptr(&self.inner) as usize),
        }
    }

    // ===== Attributes =====

    /// Read an attribute (the empty name reads the node's value)
    pub fn attribute(&self, name: &str) -> Option<Value> {
        let node = self.referent();
        if let NodeKind::Attribute { owner, name: attr } = &node.inner.kind {
            return if name.is_empty() {
                owner.attribute(attr)
            } else {
                None
            };
        }
        node.access_attributes();
        node.raw_attribute(name)
    }

    /// The node's own value
    pub fn value(&self) -> Option<Value> {
        self.attribute("")
    }

    /// Attribute value rendered as text
    pub fn attribute_text(&self, name: &str) -> Option<String> {
        self.attribute(name).map(|v| value_text(&v))
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.attribute(name).is_some()
    }

    /// Names of all attributes, in sorted order
    pub fn attribute_names(&self) -> Vec<String> {
        let node = self.referent();
        if node.is_attribute_node() {
            return vec![String::new()];
        }
        node.access_attributes();
        let data = node.data();
        data.attributes.keys().cloned().collect()
    }

    /// Snapshot of all attributes
    pub fn attributes(&self) -> Attributes {
        let node = self.referent();
        if let NodeKind::Attribute { owner, name } = &node.inner.kind {
            let mut map = Attributes::new();
            if let Some(value) = owner.attribute(name) {
                map.insert(String::new(), value);
            }
            return map;
        }
        node.access_attributes();
        let data = node.data();
        data.attributes.clone()
    }

    // ===== Children =====

    /// Snapshot of the child list
    ///
    /// Never notifies, but a dirty external node is synchronized first.
    pub fn children(&self) -> Vec<Node> {
        let node = self.referent();
        node.access_children();
        node.raw_children()
    }

    /// Children of the given type, in order
    pub fn children_of_type(&self, node_type: &str) -> Vec<Node> {
        self.children()
            .into_iter()
            .filter(|c| c.is_type(node_type))
            .collect()
    }

    /// First child of the given type
    pub fn first_child(&self, node_type: &str) -> Option<Node> {
        self.children().into_iter().find(|c| c.is_type(node_type))
    }

    /// Child of the given type whose `id` attribute renders as `id`
    pub fn child(&self, node_type: &str, id: &str) -> Option<Node> {
        self.children().into_iter().find(|c| {
            c.is_type(node_type) && c.attribute_text(ID_ATTRIBUTE).as_deref() == Some(id)
        })
    }

    pub fn child_at(&self, index: usize) -> Option<Node> {
        self.children().get(index).cloned()
    }

    pub fn child_count(&self) -> usize {
        let node = self.referent();
        node.access_children();
        let data = node.data();
        data.children.len()
    }

    /// Position of `child` in this node's child list (handle identity)
    pub fn index_of(&self, child: &Node) -> Option<usize> {
        self.referent().raw_position(child)
    }

    // ===== Parentage =====

    /// Parent of this handle (a reference reports its own parent)
    pub fn parent(&self) -> Option<Node> {
        self.inner.parent.borrow().upgrade().map(|inner| Node { inner })
    }

    /// Topmost ancestor (self when detached)
    pub fn root(&self) -> Node {
        let mut current = self.clone();
        while let Some(parent) = current.parent() {
            current = parent;
        }
        current
    }

    /// True when `ancestor` is on this node's parent chain (handle identity)
    pub fn is_descendant_of(&self, ancestor: &Node) -> bool {
        let mut current = self.parent();
        while let Some(node) = current {
            if node.ptr_eq(ancestor) {
                return true;
            }
            current = node.parent();
        }
        false
    }

    // ===== Listeners =====

    /// Register a listener; the node keeps only a weak reference
    pub fn add_listener(&self, listener: &Rc<dyn NodeListener>) {
        let node = self.listener_target();
        let mut data = node.data_mut();
        data.listeners.retain(|l| l.strong_count() > 0);
        let exists = data
            .listeners
            .iter()
            .any(|l| same_listener(l.as_ptr(), Rc::as_ptr(listener)));
        if !exists {
            data.listeners.push(Rc::downgrade(listener));
        }
    }

    /// Unregister a listener; returns whether it was registered
    pub fn remove_listener(&self, listener: &Rc<dyn NodeListener>) -> bool {
        let node = self.listener_target();
        let mut data = node.data_mut();
        let before = data.listeners.len();
        data.listeners
            .retain(|l| l.strong_count() > 0 && !same_listener(l.as_ptr(), Rc::as_ptr(listener)));
        data.listeners.len() != before
    }

    /// Live listeners, copied so the registry may change during delivery
    pub fn listeners(&self) -> Vec<Rc<dyn NodeListener>> {
        let node = self.listener_target();
        let data = node.data();
        data.listeners.iter().filter_map(|l| l.upgrade()).collect()
    }

    pub fn has_listeners(&self) -> bool {
        let node = self.listener_target();
        let data = node.data();
        data.listeners.iter().any(|l| l.strong_count() > 0)
    }

    fn listener_target(&self) -> Node {
        let node = self.referent();
        match &node.inner.kind {
            NodeKind::Attribute { owner, .. } => owner.clone(),
            _ => node,
        }
    }

    // ===== Raw storage (no notification, no lazy sync) =====

    pub(crate) fn data(&self) -> Ref<'_, NodeData> {
        self.inner.data.borrow()
    }

    pub(crate) fn data_mut(&self) -> RefMut<'_, NodeData> {
        self.inner.data.borrow_mut()
    }

    pub(crate) fn raw_attribute(&self, name: &str) -> Option<Value> {
        self.data().attributes.get(name).cloned()
    }

    /// Write or remove an attribute, returning the previous value
    pub(crate) fn raw_set_attribute(&self, name: &str, value: Option<Value>) -> Option<Value> {
        let mut data = self.data_mut();
        match value {
            Some(value) => data.attributes.insert(name.to_string(), value),
            None => data.attributes.remove(name),
        }
    }

    pub(crate) fn raw_children(&self) -> Vec<Node> {
        self.data().children.clone()
    }

    pub(crate) fn raw_child_count(&self) -> usize {
        self.data().children.len()
    }

    pub(crate) fn raw_position(&self, child: &Node) -> Option<usize> {
        self.data().children.iter().position(|c| c.ptr_eq(child))
    }

    pub(crate) fn raw_insert_child(&self, index: usize, child: Node) {
        let mut data = self.data_mut();
        let index = index.min(data.children.len());
        data.children.insert(index, child);
    }

    /// Remove `child` (handle identity), preferring the recorded position
    pub(crate) fn raw_remove_child(&self, child: &Node, hint: usize) -> Option<usize> {
        let mut data = self.data_mut();
        let index = if data.children.get(hint).is_some_and(|c| c.ptr_eq(child)) {
            hint
        } else {
            data.children.iter().position(|c| c.ptr_eq(child))?
        };
        data.children.remove(index);
        Some(index)
    }

    pub(crate) fn raw_move_child(&self, from: usize, to: usize) {
        let mut data = self.data_mut();
        if from >= data.children.len() {
            return;
        }
        let child = data.children.remove(from);
        let to = to.min(data.children.len());
        data.children.insert(to, child);
    }

    pub(crate) fn set_parent_raw(&self, parent: Option<&Node>) {
        *self.inner.parent.borrow_mut() = match parent {
            Some(parent) => Rc::downgrade(&parent.inner),
            None => Weak::new(),
        };
    }

    // ===== Path listener registry =====

    pub(crate) fn push_path_chain(&self, chain: Rc<ListenerChain>) {
        self.data_mut().path_chains.push(chain);
    }

    pub(crate) fn take_path_chain(
        &self,
        matches: impl Fn(&ListenerChain) -> bool,
    ) -> Option<Rc<ListenerChain>> {
        let mut data = self.data_mut();
        let index = data.path_chains.iter().position(|c| matches(c))?;
        Some(data.path_chains.remove(index))
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        let a = self.referent();
        let b = other.referent();
        match (&a.inner.kind, &b.inner.kind) {
            (
                NodeKind::Attribute { owner: o1, name: n1 },
                NodeKind::Attribute { owner: o2, name: n2 },
            ) => n1 == n2 && o1 == o2,
            _ => Rc::ptr_eq(&a.inner, &b.inner),
        }
    }
}

impl Eq for Node {}

impl Hash for Node {
    fn hash<H: Hasher>(&self, state: &mut H) {
        let node = self.referent();
        match &node.inner.kind {
            NodeKind::Attribute { owner, name } => {
                owner.hash(state);
                name.hash(state);
            }
            _ => (Rc::as_ptr(&node.inner) as *const () as usize).hash(state),
        }
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.inner.kind {
            NodeKind::Reference(target) => write!(f, "&{:?}", target),
            NodeKind::Attribute { owner, name } => {
                write!(f, "@{}", name)?;
                if let Some(value) = owner.raw_attribute(name) {
                    write!(f, "={}", value)?;
                }
                Ok(())
            }
            _ => {
                write!(f, "<{}", self.node_type())?;
                if let Ok(data) = self.inner.data.try_borrow() {
                    for (name, value) in &data.attributes {
                        if name.is_empty() {
                            continue;
                        }
                        write!(f, " {}={}", name, value)?;
                    }
                    if let Some(value) = data.attributes.get("") {
                        write!(f, ">{}", value_text(value))?;
                    } else if !data.children.is_empty() {
                        write!(f, " children={}>", data.children.len())?;
                    } else {
                        write!(f, "/>")?;
                    }
                    Ok(())
                } else {
                    write!(f, " ..>")
                }
            }
        }
    }
}
