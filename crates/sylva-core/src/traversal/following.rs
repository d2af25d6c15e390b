use crate::node::Node;

use super::{next_sibling, DepthFirst};

/// Nodes after the start node in document order, excluding its descendants
///
/// Siblings are expanded one subtree at a time; when a level runs out the
/// walk climbs to the parent (which is not yielded) and continues with the
/// parent's following siblings.
pub struct Following {
    cursor: Option<Node>,
    subtree: Option<DepthFirst>,
}

impl Following {
    pub fn new(start: &Node) -> Self {
        Self {
            cursor: Some(start.clone()),
            subtree: None,
        }
    }
}

impl Iterator for Following {
    type Item = Node;

    fn next(&mut self) -> Option<Node> {
        loop {
            if let Some(subtree) = &mut self.subtree {
                if let Some(node) = subtree.next() {
                    return Some(node);
                }
                self.subtree = None;
            }
            let cursor = self.cursor.take()?;
            match next_sibling(&cursor) {
                Some(sibling) => {
                    self.subtree = Some(DepthFirst::new(&sibling));
                    self.cursor = Some(sibling);
                }
                None => self.cursor = cursor.parent(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traversal::fixtures::{find, sample, types};
    use crate::update::Model;

    #[test]
    fn test_following_from_leaf() {
        let model = Model::new();
        let r = sample(&model);
        let a1 = find(&r, "a1");
        assert_eq!(types(Following::new(&a1)), vec!["a2", "b", "c", "c1"]);
    }

    #[test]
    fn test_following_skips_own_subtree() {
        let model = Model::new();
        let r = sample(&model);
        let a = find(&r, "a");
        assert_eq!(types(Following::new(&a)), vec!["b", "c", "c1"]);
    }

    #[test]
    fn test_following_of_last_is_empty() {
        let model = Model::new();
        let r = sample(&model);
        assert_eq!(Following::new(&find(&r, "c1")).count(), 0);
        assert_eq!(Following::new(&r).count(), 0);
    }
}
