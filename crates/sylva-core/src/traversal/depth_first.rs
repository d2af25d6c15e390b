use crate::node::Node;

use super::Visited;

/// Pre-order (document order) walk starting with the root itself
pub struct DepthFirst {
    stack: Vec<Node>,
    visited: Visited,
}

impl DepthFirst {
    pub fn new(root: &Node) -> Self {
        let mut visited = Visited::default();
        visited.admit(root);
        Self {
            stack: vec![root.clone()],
            visited,
        }
    }

    /// Walk that skips `root` and starts with its first child
    pub fn descendants(root: &Node) -> Self {
        let mut walk = Self::new(root);
        walk.next();
        walk
    }
}

impl Iterator for DepthFirst {
    type Item = Node;

    fn next(&mut self) -> Option<Node> {
        let node = self.stack.pop()?;
        // Reverse push so the first child is popped first
        for child in node.children().into_iter().rev() {
            if self.visited.admit(&child) {
                self.stack.push(child);
            }
        }
        Some(node)
    }
}
