use std::collections::VecDeque;

use crate::node::Node;

use super::Visited;

/// Level-order walk starting with the root itself
pub struct BreadthFirst {
    queue: VecDeque<Node>,
    visited: Visited,
}

impl BreadthFirst {
    pub fn new(root: &Node) -> Self {
        let mut visited = Visited::default();
        visited.admit(root);
        Self {
            queue: VecDeque::from([root.clone()]),
            visited,
        }
    }
}

impl Iterator for BreadthFirst {
    type Item = Node;

    fn next(&mut self) -> Option<Node> {
        let node = self.queue.pop_front()?;
        for child in node.children() {
            if self.visited.admit(&child) {
                self.queue.push_back(child);
            }
        }
        Some(node)
    }
}
