use crate::node::Node;

use super::DepthFirst;

/// Childless nodes of a subtree in document order
pub struct Leaves {
    walk: DepthFirst,
}

impl Leaves {
    pub fn new(root: &Node) -> Self {
        Self {
            walk: DepthFirst::new(root),
        }
    }
}

impl Iterator for Leaves {
    type Item = Node;

    fn next(&mut self) -> Option<Node> {
        self.walk.find(|node| node.child_count() == 0)
    }
}
