//! Lazily populated nodes
//!
//! An external node starts *dirty*. The first read of its children or
//! attributes calls [`Node::sync`], which asks the node's [`CachingPolicy`]
//! to populate it through the ordinary mutation API. `clear_cache` drops the
//! loaded content (keeping the policy's static attributes) and marks the node
//! dirty again.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::errors::{Result, SylvaError};
use crate::listener::fan_out;

use super::{Node, NodeKind};

/// Loads and unloads the content of an external node
pub trait CachingPolicy {
    /// Populate `node`; called with the node already marked clean
    ///
    /// # Errors
    /// Any error leaves the node dirty and is reported as `SyncFailed`.
    fn sync(&self, node: &Node) -> Result<()>;

    /// Drop everything [`CachingPolicy::sync`] loaded
    ///
    /// # Errors
    /// Propagates mutation errors.
    fn clear_cache(&self, node: &Node) -> Result<()> {
        clear_loaded_content(node, &self.static_attributes())
    }

    /// Attributes that survive [`CachingPolicy::clear_cache`]
    fn static_attributes(&self) -> Vec<String> {
        Vec::new()
    }
}

/// Dirty flag and policy of an external node
pub(crate) struct ExternalState {
    dirty: Cell<bool>,
    syncing: Cell<bool>,
    policy: RefCell<Option<Rc<dyn CachingPolicy>>>,
}

impl ExternalState {
    pub(crate) fn new(policy: Option<Rc<dyn CachingPolicy>>, dirty: bool) -> Self {
        Self {
            dirty: Cell::new(dirty),
            syncing: Cell::new(false),
            policy: RefCell::new(policy),
        }
    }
}

/// Remove every child and every attribute not named in `keep`
fn clear_loaded_content(node: &Node, keep: &[String]) -> Result<()> {
    while node.raw_child_count() > 0 {
        let last = node.raw_child_count() - 1;
        node.remove_child_at(last)?;
    }
    let names: Vec<String> = node.data().attributes.keys().cloned().collect();
    for name in names.iter().filter(|name| !keep.contains(name)) {
        node.remove_attribute(name)?;
    }
    Ok(())
}

impl Node {
    fn external_state(&self) -> Option<&ExternalState> {
        match self.kind() {
            NodeKind::External(state) => Some(state),
            _ => None,
        }
    }

    /// True while an external node's content has not been loaded
    pub fn is_dirty(&self) -> bool {
        let node = self.referent();
        node.external_state().is_some_and(|state| state.dirty.get())
    }

    /// Change the dirty flag and notify listeners
    ///
    /// # Errors
    /// * `Unsupported` - If the node is not external
    pub fn set_dirty(&self, dirty: bool) -> Result<()> {
        let node = self.referent();
        let Some(state) = node.external_state() else {
            return Err(SylvaError::unsupported("set_dirty", node.node_type()));
        };
        if state.dirty.replace(dirty) == dirty {
            return Ok(());
        }
        fan_out(&node, |listener| listener.notify_dirty(&node, dirty));
        Ok(())
    }

    pub fn caching_policy(&self) -> Option<Rc<dyn CachingPolicy>> {
        let node = self.referent();
        node.external_state()
            .and_then(|state| state.policy.borrow().clone())
    }

    /// # Errors
    /// * `Unsupported` - If the node is not external
    pub fn set_caching_policy(&self, policy: Option<Rc<dyn CachingPolicy>>) -> Result<()> {
        let node = self.referent();
        let Some(state) = node.external_state() else {
            return Err(SylvaError::unsupported("set_caching_policy", node.node_type()));
        };
        *state.policy.borrow_mut() = policy;
        Ok(())
    }

    /// Load the node's content through its caching policy
    ///
    /// # Errors
    /// * `Unsupported` - If the node is not external or has no policy
    /// * `SyncFailed` - If the policy reports an error
    pub fn sync(&self) -> Result<()> {
        let node = self.referent();
        let Some(state) = node.external_state() else {
            return Err(SylvaError::unsupported("sync", node.node_type()));
        };
        let Some(policy) = state.policy.borrow().clone() else {
            return Err(SylvaError::unsupported("sync", node.node_type()));
        };
        if state.syncing.replace(true) {
            return Ok(());
        }
        let was_dirty = state.dirty.replace(false);
        let outcome = policy.sync(&node);
        state.syncing.set(false);
        match outcome {
            Ok(()) => {
                tracing::debug!(node_type = node.node_type(), "external node synchronized");
                if was_dirty {
                    fan_out(&node, |listener| listener.notify_dirty(&node, false));
                }
                Ok(())
            }
            Err(err) => {
                state.dirty.set(true);
                Err(SylvaError::SyncFailed {
                    node_type: node.node_type().to_string(),
                    message: err.to_string(),
                })
            }
        }
    }

    /// Drop loaded content and mark the node dirty
    ///
    /// # Errors
    /// * `Unsupported` - If the node is not external
    pub fn clear_cache(&self) -> Result<()> {
        let node = self.referent();
        if node.external_state().is_none() {
            return Err(SylvaError::unsupported("clear_cache", node.node_type()));
        }
        match node.caching_policy() {
            Some(policy) => policy.clear_cache(&node)?,
            None => clear_loaded_content(&node, &[])?,
        }
        node.set_dirty(true)
    }

    /// Lazy-load hook run before children are read
    pub(crate) fn access_children(&self) {
        self.load_if_dirty();
    }

    /// Lazy-load hook run before attributes are read
    pub(crate) fn access_attributes(&self) {
        self.load_if_dirty();
    }

    fn load_if_dirty(&self) {
        let Some(state) = self.external_state() else {
            return;
        };
        if !state.dirty.get() || state.syncing.get() || state.policy.borrow().is_none() {
            return;
        }
        if let Err(err) = self.sync() {
            tracing::warn!(node_type = self.node_type(), error = %err, "lazy sync failed");
            self.model().handle_exception(&err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::update::Model;
    use serde_json::json;

    struct TwoChildren {
        calls: Cell<usize>,
    }

    impl CachingPolicy for TwoChildren {
        fn sync(&self, node: &Node) -> Result<()> {
            self.calls.set(self.calls.get() + 1);
            let model = node.model().clone();
            node.add_child(&model.create_node("a"), None)?;
            node.add_child(&model.create_node("b"), None)?;
            node.set_attribute("loaded", true)?;
            Ok(())
        }

        fn static_attributes(&self) -> Vec<String> {
            vec!["name".to_string()]
        }
    }

    #[test]
    fn test_children_read_triggers_single_sync() {
        let model = Model::new();
        let policy = Rc::new(TwoChildren { calls: Cell::new(0) });
        let node = Node::new_external(&model, "folder", Some(policy.clone()));
        assert!(node.is_dirty());

        assert_eq!(node.child_count(), 2);
        assert_eq!(node.children().len(), 2);
        assert!(!node.is_dirty());
        assert_eq!(policy.calls.get(), 1);
    }

    #[test]
    fn test_clear_cache_keeps_static_attributes() {
        let model = Model::new();
        let policy = Rc::new(TwoChildren { calls: Cell::new(0) });
        let node = Node::new_external(&model, "folder", Some(policy.clone()));
        node.set_attribute("name", "docs").unwrap();
        assert_eq!(node.attribute("loaded"), Some(json!(true)));

        node.clear_cache().unwrap();

        assert!(node.is_dirty());
        assert_eq!(node.raw_child_count(), 0);
        assert_eq!(node.raw_attribute("name"), Some(json!("docs")));
        assert_eq!(node.raw_attribute("loaded"), None);
    }

    #[test]
    fn test_plain_node_rejects_sync() {
        let model = Model::new();
        let node = model.create_node("item");
        assert!(matches!(node.sync(), Err(SylvaError::Unsupported { .. })));
        assert!(matches!(node.clear_cache(), Err(SylvaError::Unsupported { .. })));
        assert!(!node.is_dirty());
    }
}
