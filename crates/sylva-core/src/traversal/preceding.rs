use crate::node::Node;

use super::{previous_sibling, DepthFirst};

/// Nodes before the start node in reverse document order, excluding ancestors
pub struct Preceding {
    cursor: Option<Node>,
    /// Current sibling subtree in document order; drained from the back
    pending: Vec<Node>,
}

impl Preceding {
    pub fn new(start: &Node) -> Self {
        Self {
            cursor: Some(start.clone()),
            pending: Vec::new(),
        }
    }
}

impl Iterator for Preceding {
    type Item = Node;

    fn next(&mut self) -> Option<Node> {
        loop {
            if let Some(node) = self.pending.pop() {
                return Some(node);
            }
            let cursor = self.cursor.take()?;
            match previous_sibling(&cursor) {
                Some(sibling) => {
                    self.pending = DepthFirst::new(&sibling).collect();
                    self.cursor = Some(sibling);
                }
                None => self.cursor = cursor.parent(),
            }
        }
    }
}
