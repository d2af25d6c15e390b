//! Tree iterators
//!
//! All iterators are lazy and yield [`Node`] handles. References are
//! followed into their referent's children, but a reference whose referent
//! has already been visited is skipped, so aliased or cyclic structures are
//! walked in finite time. Reading children may synchronize dirty external
//! nodes.

mod breadth_first;
mod depth_first;
mod following;
mod leaf;
mod preceding;

use std::collections::HashSet;

use crate::node::Node;

pub use breadth_first::BreadthFirst;
pub use depth_first::DepthFirst;
pub use following::Following;
pub use leaf::Leaves;
pub use preceding::Preceding;

/// Referents seen so far in one walk
#[derive(Default)]
pub(crate) struct Visited {
    seen: HashSet<Node>,
}

impl Visited {
    /// Record `node`; false for a reference whose referent was already seen
    pub(crate) fn admit(&mut self, node: &Node) -> bool {
        let first_visit = self.seen.insert(node.referent());
        first_visit || !node.is_reference()
    }
}

/// Parent chain, nearest first (excluding the node itself)
pub struct Ancestors {
    next: Option<Node>,
}

impl Ancestors {
    pub fn new(node: &Node) -> Self {
        Self {
            next: node.parent(),
        }
    }
}

impl Iterator for Ancestors {
    type Item = Node;

    fn next(&mut self) -> Option<Node> {
        let current = self.next.take()?;
        self.next = current.parent();
        Some(current)
    }
}

/// Sibling after `node` in its parent's child list
pub fn next_sibling(node: &Node) -> Option<Node> {
    let parent = node.parent()?;
    let index = parent.index_of(node)?;
    parent.child_at(index + 1)
}

/// Sibling before `node` in its parent's child list
pub fn previous_sibling(node: &Node) -> Option<Node> {
    let parent = node.parent()?;
    let index = parent.index_of(node)?;
    index.checked_sub(1).and_then(|i| parent.child_at(i))
}
