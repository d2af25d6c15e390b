//! Reversible records of single mutations
//!
//! Mementos touch raw storage only: reverting or restoring never notifies
//! listeners and never opens an update.

use crate::node::{Node, Value};
use crate::variables::VariableScope;

#[derive(Clone)]
pub(crate) enum Memento {
    SetAttribute {
        node: Node,
        name: String,
        old: Option<Value>,
        new: Value,
    },
    RemoveAttribute {
        node: Node,
        name: String,
        old: Value,
    },
    AddChild {
        parent: Node,
        child: Node,
        index: usize,
        /// Former parent and position when the child was moved across parents
        previous: Option<(Node, usize)>,
    },
    RemoveChild {
        parent: Node,
        child: Node,
        index: usize,
    },
    SetParent {
        child: Node,
        old: Option<Node>,
        new: Option<Node>,
    },
    MoveChild {
        parent: Node,
        child: Node,
        from: usize,
        to: usize,
    },
    Variable {
        scope: VariableScope,
        name: String,
        old: Option<Value>,
        new: Option<Value>,
    },
}

impl Memento {
    /// Put storage back to the state before the mutation
    pub(crate) fn revert(&self) {
        match self {
            Memento::SetAttribute { node, name, old, .. } => {
                node.raw_set_attribute(name, old.clone());
            }
            Memento::RemoveAttribute { node, name, old } => {
                node.raw_set_attribute(name, Some(old.clone()));
            }
            Memento::AddChild {
                parent,
                child,
                index,
                previous,
            } => {
                parent.raw_remove_child(child, *index);
                match previous {
                    Some((old_parent, old_index)) => {
                        old_parent.raw_insert_child(*old_index, child.clone());
                        child.set_parent_raw(Some(old_parent));
                    }
                    None => child.set_parent_raw(None),
                }
            }
            Memento::RemoveChild {
                parent,
                child,
                index,
            } => {
                parent.raw_insert_child(*index, child.clone());
            }
            Memento::SetParent { child, old, .. } => child.set_parent_raw(old.as_ref()),
            Memento::MoveChild { parent, from, to, .. } => parent.raw_move_child(*to, *from),
            Memento::Variable {
                scope, name, old, ..
            } => scope.raw_set(name, old.clone()),
        }
    }

    /// Re-apply the mutation after a revert
    pub(crate) fn restore(&self) {
        match self {
            Memento::SetAttribute {
                node, name, new, ..
            } => {
                node.raw_set_attribute(name, Some(new.clone()));
            }
            Memento::RemoveAttribute { node, name, .. } => {
                node.raw_set_attribute(name, None);
            }
            Memento::AddChild {
                parent,
                child,
                index,
                previous,
            } => {
                if let Some((old_parent, old_index)) = previous {
                    old_parent.raw_remove_child(child, *old_index);
                }
                parent.raw_insert_child(*index, child.clone());
                child.set_parent_raw(Some(parent));
            }
            Memento::RemoveChild {
                parent,
                child,
                index,
            } => {
                parent.raw_remove_child(child, *index);
            }
            Memento::SetParent { child, new, .. } => child.set_parent_raw(new.as_ref()),
            Memento::MoveChild { parent, from, to, .. } => parent.raw_move_child(*from, *to),
            Memento::Variable {
                scope, name, new, ..
            } => scope.raw_set(name, new.clone()),
        }
    }
}
