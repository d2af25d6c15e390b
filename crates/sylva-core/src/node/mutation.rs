//! Structural and attribute mutations
//!
//! Every mutation follows the same protocol:
//!
//! 1. If any node the mutation touches is frozen, the change is appended to
//!    the freezing update's deferred change set and the call returns without
//!    touching storage.
//! 2. Otherwise an update is opened, a memento is recorded, storage is
//!    mutated, the touched node is frozen while its listeners are notified,
//!    then the update is closed (which replays anything deferred meanwhile).

use crate::change::ChangeRecord;
use crate::errors::{Result, SylvaError};
use crate::listener::fan_out;
use crate::update::Memento;

use super::{Attributes, Node, NodeKind, Value, ID_ATTRIBUTE};

impl Node {
    /// Set an attribute, returning the previous value
    ///
    /// Setting `Null` removes the attribute. Setting a value equal to the
    /// current one is a no-op and notifies nobody. When the node is frozen the
    /// write is deferred and the current (unchanged) value is returned.
    ///
    /// # Errors
    /// * `Unsupported` - If this is an attribute node and `name` is not empty
    pub fn set_attribute(&self, name: &str, value: impl Into<Value>) -> Result<Option<Value>> {
        let value = value.into();
        let node = self.referent();
        if let NodeKind::Attribute { owner, name: attr } = node.kind() {
            if !name.is_empty() {
                return Err(SylvaError::unsupported("set_attribute", node.node_type()));
            }
            return owner.set_attribute(attr, value);
        }
        if value.is_null() {
            return node.remove_attribute(name);
        }

        let model = node.model().clone();
        if model.try_defer(&[&node], || {
            ChangeRecord::change_attribute(&node, name, value.clone())
        }) {
            return Ok(node.raw_attribute(name));
        }

        let old = node.raw_attribute(name);
        if old.as_ref() == Some(&value) {
            return Ok(old);
        }

        let _update = model.begin();
        model.record(Memento::SetAttribute {
            node: node.clone(),
            name: name.to_string(),
            old: old.clone(),
            new: value.clone(),
        });
        node.raw_set_attribute(name, Some(value.clone()));

        let _frozen = model.freeze_scope(&[&node]);
        fan_out(&node, |listener| {
            listener.notify_change(&node, name, &value, old.as_ref())
        });
        Ok(old)
    }

    /// Remove an attribute, returning the removed value
    ///
    /// # Errors
    /// * `Unsupported` - If this is an attribute node and `name` is not empty
    pub fn remove_attribute(&self, name: &str) -> Result<Option<Value>> {
        let node = self.referent();
        if let NodeKind::Attribute { owner, name: attr } = node.kind() {
            if !name.is_empty() {
                return Err(SylvaError::unsupported("remove_attribute", node.node_type()));
            }
            return owner.remove_attribute(attr);
        }

        let model = node.model().clone();
        if model.try_defer(&[&node], || ChangeRecord::clear_attribute(&node, name)) {
            return Ok(node.raw_attribute(name));
        }

        let Some(old) = node.raw_attribute(name) else {
            return Ok(None);
        };

        let _update = model.begin();
        model.record(Memento::RemoveAttribute {
            node: node.clone(),
            name: name.to_string(),
            old: old.clone(),
        });
        node.raw_set_attribute(name, None);

        let _frozen = model.freeze_scope(&[&node]);
        fan_out(&node, |listener| listener.notify_clear(&node, name, &old));
        Ok(Some(old))
    }

    /// Set the node's own value (the empty-named attribute)
    ///
    /// # Errors
    /// See [`Node::set_attribute`].
    pub fn set_value(&self, value: impl Into<Value>) -> Result<Option<Value>> {
        self.set_attribute("", value)
    }

    /// Insert `child` at `index` (append when `None`)
    ///
    /// A child already under this node is moved: the index is clamped to the
    /// last position and moving to the current position is a no-op. A child
    /// under another parent is detached from it first.
    ///
    /// # Errors
    /// * `InvalidOperation` - If `child` is this node or an attribute node
    /// * `CycleDetected` - If `child` is an ancestor of this node
    /// * `ForeignModel` - If `child` belongs to a different model
    pub fn add_child(&self, child: &Node, index: Option<usize>) -> Result<()> {
        let parent = self.referent();
        if parent.is_attribute_node() {
            return Err(SylvaError::unsupported("add_child", parent.node_type()));
        }
        if child.is_attribute_node() {
            return Err(SylvaError::InvalidOperation {
                reason: "attribute nodes cannot be children".to_string(),
            });
        }
        if child.ptr_eq(self) || child.ptr_eq(&parent) {
            return Err(SylvaError::InvalidOperation {
                reason: format!("cannot add {} to itself", child.node_type()),
            });
        }
        if !parent.model().ptr_eq(child.model()) {
            return Err(SylvaError::ForeignModel {
                node_type: child.node_type().to_string(),
            });
        }
        if parent.is_descendant_of(child) || self.is_descendant_of(child) {
            return Err(SylvaError::CycleDetected {
                node_type: child.node_type().to_string(),
            });
        }

        let model = parent.model().clone();
        let old_parent = child.parent();
        let deferred = {
            let mut touched = vec![&parent, child];
            if let Some(old) = &old_parent {
                touched.push(old);
            }
            model.try_defer(&touched, || ChangeRecord::add_child(&parent, child, index))
        };
        if deferred {
            return Ok(());
        }

        if let Some(old) = old_parent.as_ref().filter(|p| p.ptr_eq(&parent)) {
            return old.move_child(child, index);
        }

        let _update = model.begin();
        let previous = match &old_parent {
            Some(old) => old.raw_position(child).map(|i| (old.clone(), i)),
            None => None,
        };
        if let Some((old, old_index)) = &previous {
            old.raw_remove_child(child, *old_index);
        }
        let position = index
            .unwrap_or(usize::MAX)
            .min(parent.raw_child_count());
        model.record(Memento::AddChild {
            parent: parent.clone(),
            child: child.clone(),
            index: position,
            previous: previous.clone(),
        });
        parent.raw_insert_child(position, child.clone());
        child.set_parent_raw(Some(&parent));

        let mut notified = vec![&parent, child];
        if let Some((old, _)) = &previous {
            notified.push(old);
        }
        let _frozen = model.freeze_scope(&notified);
        fan_out(child, |listener| {
            listener.notify_parent(child, Some(&parent), old_parent.as_ref())
        });
        if let Some((old, old_index)) = &previous {
            fan_out(old, |listener| listener.notify_remove_child(old, child, *old_index));
        }
        fan_out(&parent, |listener| {
            listener.notify_add_child(&parent, child, position)
        });
        Ok(())
    }

    /// Child of `node_type` whose `id` is `id`, appended if there is none
    ///
    /// The new child is built through the model's factory with its `id`
    /// already set. When this node is frozen the insertion is deferred and
    /// the returned node is not attached yet.
    ///
    /// # Errors
    /// See [`Node::add_child`].
    pub fn get_or_create_child(&self, node_type: &str, id: &str) -> Result<Node> {
        if let Some(existing) = self.child(node_type, id) {
            return Ok(existing);
        }
        let parent = self.referent();
        let model = parent.model().clone();
        let attributes = Attributes::from([(ID_ATTRIBUTE.to_string(), Value::from(id))]);
        let child = model.factory().create_object_from_attributes(
            &model,
            Some(&parent),
            node_type,
            &attributes,
        );
        parent.add_child(&child, None)?;
        Ok(child)
    }

    /// Reorder `child` within this node
    fn move_child(&self, child: &Node, index: Option<usize>) -> Result<()> {
        let model = self.model().clone();
        let Some(from) = self.raw_position(child) else {
            return Err(SylvaError::Internal {
                message: "child missing from its parent's child list".to_string(),
            });
        };
        let last = self.raw_child_count().saturating_sub(1);
        let to = index.unwrap_or(last).min(last);
        if from == to {
            return Ok(());
        }

        let _update = model.begin();
        model.record(Memento::MoveChild {
            parent: self.clone(),
            child: child.clone(),
            from,
            to,
        });
        self.raw_move_child(from, to);

        let _frozen = model.freeze_scope(&[self, child]);
        fan_out(self, |listener| listener.notify_remove_child(self, child, from));
        fan_out(self, |listener| listener.notify_add_child(self, child, to));
        Ok(())
    }

    /// Remove `child`; returns whether it was a child of this node
    ///
    /// # Errors
    /// * `Unsupported` - If this is an attribute node
    pub fn remove_child(&self, child: &Node) -> Result<bool> {
        let parent = self.referent();
        if parent.is_attribute_node() {
            return Err(SylvaError::unsupported("remove_child", parent.node_type()));
        }
        let model = parent.model().clone();
        if model.try_defer(&[&parent, child], || {
            ChangeRecord::remove_child(&parent, child)
        }) {
            return Ok(parent.raw_position(child).is_some());
        }
        let Some(index) = parent.raw_position(child) else {
            return Ok(false);
        };

        let _update = model.begin();
        model.record(Memento::RemoveChild {
            parent: parent.clone(),
            child: child.clone(),
            index,
        });
        parent.raw_remove_child(child, index);
        let _frozen = model.freeze_scope(&[&parent, child]);
        fan_out(&parent, |listener| {
            listener.notify_remove_child(&parent, child, index)
        });

        model.record(Memento::SetParent {
            child: child.clone(),
            old: Some(parent.clone()),
            new: None,
        });
        child.set_parent_raw(None);
        fan_out(child, |listener| listener.notify_parent(child, None, Some(&parent)));
        Ok(true)
    }

    /// Remove and return the child at `index`
    ///
    /// # Errors
    /// * `Unsupported` - If this is an attribute node
    pub fn remove_child_at(&self, index: usize) -> Result<Option<Node>> {
        let parent = self.referent();
        let Some(child) = parent.data().children.get(index).cloned() else {
            return Ok(None);
        };
        parent.remove_child(&child)?;
        Ok(Some(child))
    }

    /// Detach this node from its parent; returns whether it had one
    ///
    /// # Errors
    /// See [`Node::remove_child`].
    pub fn remove_from_parent(&self) -> Result<bool> {
        match self.parent() {
            Some(parent) => parent.remove_child(self),
            None => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::errors::SylvaError;
    use crate::update::Model;
    use serde_json::json;

    #[test]
    fn test_set_attribute_returns_previous() {
        let model = Model::new();
        let node = model.create_node("item");

        assert_eq!(node.set_attribute("a", 1).unwrap(), None);
        assert_eq!(node.set_attribute("a", 2).unwrap(), Some(json!(1)));
        assert_eq!(node.attribute("a"), Some(json!(2)));
    }

    #[test]
    fn test_get_or_create_child_reuses_by_id() {
        let model = Model::new();
        let list = model.create_node("list");

        let first = list.get_or_create_child("item", "x").unwrap();
        let again = list.get_or_create_child("item", "x").unwrap();
        let other = list.get_or_create_child("item", "y").unwrap();

        assert!(first.ptr_eq(&again));
        assert!(!first.ptr_eq(&other));
        assert_eq!(list.child_count(), 2);
        assert_eq!(first.attribute("id"), Some(json!("x")));
    }

    #[test]
    fn test_set_null_removes() {
        let model = Model::new();
        let node = model.create_node("item");
        node.set_attribute("a", "x").unwrap();

        let old = node.set_attribute("a", serde_json::Value::Null).unwrap();
        assert_eq!(old, Some(json!("x")));
        assert!(!node.has_attribute("a"));
    }

    #[test]
    fn test_add_child_appends_and_sets_parent() {
        let model = Model::new();
        let parent = model.create_node("list");
        let a = model.create_node("a");
        let b = model.create_node("b");

        parent.add_child(&a, None).unwrap();
        parent.add_child(&b, Some(0)).unwrap();

        let types: Vec<_> = parent.children().iter().map(|c| c.node_type().to_string()).collect();
        assert_eq!(types, vec!["b", "a"]);
        assert!(a.parent().unwrap().ptr_eq(&parent));
    }

    #[test]
    fn test_add_to_self_rejected() {
        let model = Model::new();
        let node = model.create_node("item");
        assert!(matches!(
            node.add_child(&node, None),
            Err(SylvaError::InvalidOperation { .. })
        ));
    }

    #[test]
    fn test_add_ancestor_rejected() {
        let model = Model::new();
        let root = model.create_node("root");
        let child = model.create_node("child");
        root.add_child(&child, None).unwrap();

        assert!(matches!(
            child.add_child(&root, None),
            Err(SylvaError::CycleDetected { .. })
        ));
        assert!(root.parent().is_none());
    }

    #[test]
    fn test_foreign_model_rejected() {
        let a = Model::new();
        let b = Model::new();
        let parent = a.create_node("p");
        let child = b.create_node("c");
        assert!(matches!(
            parent.add_child(&child, None),
            Err(SylvaError::ForeignModel { .. })
        ));
    }

    #[test]
    fn test_move_within_parent() {
        let model = Model::new();
        let parent = model.create_node("list");
        let b1 = model.create_node("b1");
        let b2 = model.create_node("b2");
        parent.add_child(&b1, None).unwrap();
        parent.add_child(&b2, None).unwrap();

        parent.add_child(&b1, Some(1)).unwrap();

        let children = parent.children();
        assert!(children[0].ptr_eq(&b2));
        assert!(children[1].ptr_eq(&b1));
        assert_eq!(parent.child_count(), 2);
    }

    #[test]
    fn test_reparent_detaches_from_old_parent() {
        let model = Model::new();
        let left = model.create_node("left");
        let right = model.create_node("right");
        let child = model.create_node("child");
        left.add_child(&child, None).unwrap();

        right.add_child(&child, None).unwrap();

        assert_eq!(left.child_count(), 0);
        assert_eq!(right.child_count(), 1);
        assert!(child.parent().unwrap().ptr_eq(&right));
    }

    #[test]
    fn test_remove_child_clears_parent() {
        let model = Model::new();
        let parent = model.create_node("p");
        let child = model.create_node("c");
        parent.add_child(&child, None).unwrap();

        assert!(parent.remove_child(&child).unwrap());
        assert!(child.parent().is_none());
        assert!(!parent.remove_child(&child).unwrap());
    }
}
