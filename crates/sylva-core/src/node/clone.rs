//! Shallow and deep copies

use std::collections::VecDeque;
use std::time::Instant;

use super::Node;

impl Node {
    /// Shallow copy through the model's factory (no children, detached)
    pub fn clone_object(&self) -> Node {
        let node = self.referent();
        node.model().factory().create_clone(&node)
    }

    /// Deep copy of the subtree rooted here
    ///
    /// The walk is breadth first and keeps sibling order. References are
    /// copied as references and not descended into, so aliased or cyclic
    /// structures copy in finite time. Dirty external nodes are copied dirty
    /// without loading their content. No listeners are notified; the copy is
    /// detached and has no listeners.
    pub fn clone_tree(&self) -> Node {
        let started = Instant::now();
        let source = self.referent();
        let factory = source.model().factory();
        let copy = factory.create_clone(&source);

        let mut queue = VecDeque::from([(source.clone(), copy.clone())]);
        let mut count = 1usize;
        while let Some((original, duplicate)) = queue.pop_front() {
            if original.is_reference() || original.is_dirty() {
                continue;
            }
            for child in original.raw_children() {
                let child_copy = factory.create_clone(&child);
                duplicate.raw_insert_child(usize::MAX, child_copy.clone());
                child_copy.set_parent_raw(Some(&duplicate));
                queue.push_back((child, child_copy));
                count += 1;
            }
        }

        tracing::debug!(
            node_type = source.node_type(),
            node_count = count,
            duration_ms = started.elapsed().as_millis() as u64,
            "tree cloned"
        );
        copy
    }
}
