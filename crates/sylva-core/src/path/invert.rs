//! Path inversion and membership tests
//!
//! Inverting `e0/e1/…/eL-1` yields a path that starts at a candidate node
//! and walks back toward the context:
//!
//! ```text
//! f0 = self::        test(eL-1)
//! fj = inverse(eL-j) test(eL-1-j)    for j in 1..L
//! ```
//!
//! Each inverted step remembers the axis its node test was originally
//! selected along (`origin`). Position-sensitive predicates use it to
//! re-run the forward step, the last step uses it to anchor absolute paths
//! at a root, and inverting an inverted path uses it to restore the first
//! axis.

use crate::errors::{Result, SylvaError};
use crate::node::Node;

use super::axis::Axis;
use super::element::PathElement;
use super::Path;

pub(crate) fn invert(path: &Path) -> Result<Path> {
    let elements = path.elements();
    let len = elements.len();
    if len == 0 {
        return Ok(Path::from_elements(Vec::new()));
    }
    let not_invertible = || SylvaError::NotInvertible {
        path: path.to_string(),
    };

    // attribute nodes are transient, so no step can lead back from one
    if elements.iter().any(|e| e.axis.contains(Axis::ATTRIBUTE)) {
        return Err(not_invertible());
    }

    let already_inverted = elements[0].origin.is_some();
    let mut inverted = Vec::with_capacity(len);
    for j in 0..len {
        let source = &elements[len - 1 - j];
        let axis = if j == 0 {
            Axis::SELF
        } else {
            let step = elements[len - j].axis;
            if step.contains(Axis::ROOT) {
                return Err(not_invertible());
            }
            step.inverse().ok_or_else(not_invertible)?
        };
        inverted.push(PathElement {
            axis,
            node_type: source.node_type.clone(),
            predicate: source.predicate.clone(),
            origin: if already_inverted {
                None
            } else {
                Some(source.axis)
            },
        });
    }
    if already_inverted {
        inverted[0].axis = elements[len - 1].origin.unwrap_or(Axis::SELF);
    }
    Ok(Path::from_elements(inverted))
}

/// Results of an inverted path must be roots when the forward path
/// started with a bare `/`
pub(crate) fn anchored_at_root(path: &Path) -> bool {
    match path.elements().last().and_then(|e| e.origin) {
        Some(origin) => origin.contains(Axis::ROOT) && (origin - Axis::ROOT - Axis::SELF).is_empty(),
        None => false,
    }
}

impl Path {
    /// Whether some context exists from which this path selects `node`
    ///
    /// Walks the inverted path from `node` instead of querying forward. A
    /// path that cannot be inverted answers `false`.
    pub fn is_leaf(&self, node: &Node) -> bool {
        match self.invert_path() {
            Some(inverted) => !inverted.query(node).is_empty(),
            None => false,
        }
    }

    /// Whether `node` is selected by some non-empty prefix of this path
    ///
    /// True for every node a live listener on this path depends on
    /// structurally: the leaves and each intermediate step's results.
    pub fn is_node(&self, node: &Node) -> bool {
        let Some(inverted) = self.invert_path() else {
            return false;
        };
        let elements = inverted.elements();
        (0..elements.len()).any(|start| {
            let mut suffix = elements[start..].to_vec();
            suffix[0].axis = Axis::SELF;
            !Path::from_elements(suffix).query(node).is_empty()
        })
    }
}
