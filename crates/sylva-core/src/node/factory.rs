//! Node construction policy
//!
//! The model creates every node through its installed [`NodeFactory`], so an
//! application can decide per type whether a node is plain or external and
//! which caching policy it gets.

use super::{Attributes, ExternalState, Node, NodeKind};
use crate::update::Model;

/// Creates nodes for a model
#[allow(unused_variables)]
pub trait NodeFactory {
    /// New node of `node_type`; `parent` is a hint and is not linked
    fn create_object(&self, model: &Model, parent: Option<&Node>, node_type: &str) -> Node;

    /// New node pre-loaded with `attributes` (no notifications)
    fn create_object_from_attributes(
        &self,
        model: &Model,
        parent: Option<&Node>,
        node_type: &str,
        attributes: &Attributes,
    ) -> Node {
        let node = self.create_object(model, parent, node_type);
        {
            let mut data = node.data_mut();
            for (name, value) in attributes {
                if !value.is_null() {
                    data.attributes.insert(name.clone(), value.clone());
                }
            }
        }
        node
    }

    /// Shallow copy: same kind, type and attributes, no children
    ///
    /// A reference is copied as a new reference to the same referent.
    fn create_clone(&self, node: &Node) -> Node {
        let model = node.model().clone();
        match node.kind() {
            NodeKind::Reference(target) => Node::new_reference(target),
            NodeKind::External(_) => {
                // Loaded content is copied by the tree walk, so a clean
                // original yields a clean copy.
                let copy = Node::from_kind(
                    &model,
                    node.node_type(),
                    NodeKind::External(ExternalState::new(node.caching_policy(), node.is_dirty())),
                );
                copy.data_mut().attributes = node.data().attributes.clone();
                copy
            }
            NodeKind::Attribute { .. } => {
                let copy = self.create_object(&model, None, node.node_type());
                if let Some(value) = node.value() {
                    copy.data_mut().attributes.insert(String::new(), value);
                }
                copy
            }
            NodeKind::Plain => {
                let attributes = node.data().attributes.clone();
                self.create_object_from_attributes(&model, None, node.node_type(), &attributes)
            }
        }
    }

    /// New external node of `node_type` with no policy
    fn create_external_object(
        &self,
        model: &Model,
        parent: Option<&Node>,
        node_type: &str,
    ) -> Node {
        Node::new_external(model, node_type, None)
    }
}

/// Factory producing plain nodes
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultFactory;

impl NodeFactory for DefaultFactory {
    fn create_object(&self, model: &Model, _parent: Option<&Node>, node_type: &str) -> Node {
        Node::new(model, node_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::rc::Rc;

    struct ExternalFolders;

    impl NodeFactory for ExternalFolders {
        fn create_object(&self, model: &Model, parent: Option<&Node>, node_type: &str) -> Node {
            if node_type == "folder" {
                self.create_external_object(model, parent, node_type)
            } else {
                Node::new(model, node_type)
            }
        }
    }

    #[test]
    fn test_installed_factory_decides_kind() {
        let model = Model::builder().factory(Rc::new(ExternalFolders)).build();
        assert!(model.create_node("folder").is_external());
        assert!(!model.create_node("file").is_external());
    }

    #[test]
    fn test_create_from_attributes_skips_null() {
        let model = Model::new();
        let mut attributes = Attributes::new();
        attributes.insert("a".to_string(), json!(1));
        attributes.insert("b".to_string(), serde_json::Value::Null);

        let node = DefaultFactory.create_object_from_attributes(&model, None, "item", &attributes);
        assert_eq!(node.attribute("a"), Some(json!(1)));
        assert!(!node.has_attribute("b"));
    }

    #[test]
    fn test_clone_of_reference_is_reference() {
        let model = Model::new();
        let target = model.create_node("target");
        let alias = Node::new_reference(&target);

        let copy = DefaultFactory.create_clone(&alias);
        assert!(copy.is_reference());
        assert_eq!(copy, target);
        assert!(!copy.ptr_eq(&alias));
    }
}
