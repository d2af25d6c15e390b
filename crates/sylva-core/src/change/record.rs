//! A single reified mutation

use std::fmt;

use crate::errors::{Result, SylvaError};
use crate::node::{Node, Value};
use crate::path::Path;

/// The node a record applies to
#[derive(Debug, Clone)]
pub enum ChangeTarget {
    /// A concrete node
    Bound(Node),
    /// A location relative to whatever root the record is applied under
    Unbound(Path),
}

impl ChangeTarget {
    fn same_as(&self, other: &ChangeTarget) -> bool {
        match (self, other) {
            (ChangeTarget::Bound(a), ChangeTarget::Bound(b)) => a == b,
            (ChangeTarget::Unbound(a), ChangeTarget::Unbound(b)) => a.to_string() == b.to_string(),
            _ => false,
        }
    }
}

impl fmt::Display for ChangeTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangeTarget::Bound(node) => write!(f, "{:?}", node),
            ChangeTarget::Unbound(path) => write!(f, "{}", path),
        }
    }
}

/// Discriminant of a [`ChangeRecord`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    ChangeAttribute,
    ClearAttribute,
    AddChild,
    RemoveChild,
}

/// A mutation captured as data
///
/// Records are produced when a mutation hits a frozen node and by the tree
/// differ. Applying a record performs the mutation through the public API,
/// with full notification.
#[derive(Debug, Clone)]
pub enum ChangeRecord {
    ChangeAttribute {
        target: ChangeTarget,
        name: String,
        value: Value,
    },
    ClearAttribute {
        target: ChangeTarget,
        name: String,
    },
    AddChild {
        target: ChangeTarget,
        child: Node,
        index: Option<usize>,
    },
    /// `child` is `None` in unbound records, which remove by `index`
    RemoveChild {
        target: ChangeTarget,
        child: Option<Node>,
        index: usize,
    },
}

impl ChangeRecord {
    pub fn change_attribute(node: &Node, name: &str, value: Value) -> Self {
        ChangeRecord::ChangeAttribute {
            target: ChangeTarget::Bound(node.clone()),
            name: name.to_string(),
            value,
        }
    }

    pub fn clear_attribute(node: &Node, name: &str) -> Self {
        ChangeRecord::ClearAttribute {
            target: ChangeTarget::Bound(node.clone()),
            name: name.to_string(),
        }
    }

    pub fn add_child(parent: &Node, child: &Node, index: Option<usize>) -> Self {
        ChangeRecord::AddChild {
            target: ChangeTarget::Bound(parent.clone()),
            child: child.clone(),
            index,
        }
    }

    pub fn remove_child(parent: &Node, child: &Node) -> Self {
        let index = parent.index_of(child).unwrap_or_default();
        ChangeRecord::RemoveChild {
            target: ChangeTarget::Bound(parent.clone()),
            child: Some(child.clone()),
            index,
        }
    }

    pub fn kind(&self) -> ChangeKind {
        match self {
            ChangeRecord::ChangeAttribute { .. } => ChangeKind::ChangeAttribute,
            ChangeRecord::ClearAttribute { .. } => ChangeKind::ClearAttribute,
            ChangeRecord::AddChild { .. } => ChangeKind::AddChild,
            ChangeRecord::RemoveChild { .. } => ChangeKind::RemoveChild,
        }
    }

    pub fn target(&self) -> &ChangeTarget {
        match self {
            ChangeRecord::ChangeAttribute { target, .. }
            | ChangeRecord::ClearAttribute { target, .. }
            | ChangeRecord::AddChild { target, .. }
            | ChangeRecord::RemoveChild { target, .. } => target,
        }
    }

    fn with_target(&self, target: ChangeTarget) -> Self {
        let mut record = self.clone();
        match &mut record {
            ChangeRecord::ChangeAttribute { target: t, .. }
            | ChangeRecord::ClearAttribute { target: t, .. }
            | ChangeRecord::AddChild { target: t, .. }
            | ChangeRecord::RemoveChild { target: t, .. } => *t = target,
        }
        record
    }

    /// Attribute name, or the child's type for structural records
    pub fn name(&self) -> &str {
        match self {
            ChangeRecord::ChangeAttribute { name, .. }
            | ChangeRecord::ClearAttribute { name, .. } => name,
            ChangeRecord::AddChild { child, .. } => child.node_type(),
            ChangeRecord::RemoveChild { child, .. } => {
                child.as_ref().map_or("", |child| child.node_type())
            }
        }
    }

    pub fn is_bound(&self) -> bool {
        matches!(self.target(), ChangeTarget::Bound(_))
    }

    pub(crate) fn same_target(&self, other: &ChangeRecord) -> bool {
        self.target().same_as(other.target())
    }

    /// Apply a bound record
    ///
    /// # Errors
    /// * `InvalidOperation` - If the record is unbound
    /// * Any error of the underlying mutation
    pub fn apply(&self) -> Result<()> {
        match self.target() {
            ChangeTarget::Bound(node) => self.apply_on(node),
            ChangeTarget::Unbound(path) => Err(SylvaError::InvalidOperation {
                reason: format!("unbound change record for '{}' needs a root", path),
            }),
        }
    }

    /// Apply under `root`, resolving an unbound target against it
    ///
    /// An unbound target that matches nothing is skipped.
    ///
    /// # Errors
    /// Any error of the underlying mutation.
    pub fn apply_to(&self, root: &Node) -> Result<()> {
        match self.target() {
            ChangeTarget::Bound(node) => self.apply_on(node),
            ChangeTarget::Unbound(path) => match path.query_first(root) {
                Some(node) => self.apply_on(&node),
                None => {
                    tracing::debug!(path = %path, "unbound change target not found; skipped");
                    Ok(())
                }
            },
        }
    }

    fn apply_on(&self, node: &Node) -> Result<()> {
        match self {
            ChangeRecord::ChangeAttribute { name, value, .. } => {
                node.set_attribute(name, value.clone())?;
            }
            ChangeRecord::ClearAttribute { name, .. } => {
                node.remove_attribute(name)?;
            }
            ChangeRecord::AddChild { child, index, .. } => node.add_child(child, *index)?,
            ChangeRecord::RemoveChild { child, index, .. } => match child {
                Some(child) => {
                    node.remove_child(child)?;
                }
                None => {
                    node.remove_child_at(*index)?;
                }
            },
        }
        Ok(())
    }

    /// Replace the target with its location relative to `root`
    ///
    /// Returns `None` when the target is not under `root`.
    pub fn unbind(&self, root: &Node) -> Option<ChangeRecord> {
        let ChangeTarget::Bound(node) = self.target() else {
            return Some(self.clone());
        };
        let path = Path::identity_path(node, root)?;
        let mut record = self.with_target(ChangeTarget::Unbound(path));
        if let ChangeRecord::RemoveChild { child, .. } = &mut record {
            *child = None;
        }
        Some(record)
    }

    /// Resolve an unbound target against `root`
    ///
    /// # Errors
    /// * `InvalidOperation` - If the location matches nothing under `root`
    pub fn bind(&self, root: &Node) -> Result<ChangeRecord> {
        let ChangeTarget::Unbound(path) = self.target() else {
            return Ok(self.clone());
        };
        let node = path
            .query_first(root)
            .ok_or_else(|| SylvaError::InvalidOperation {
                reason: format!("no node at '{}'", path),
            })?;
        let mut record = self.with_target(ChangeTarget::Bound(node.clone()));
        if let ChangeRecord::RemoveChild { child, index, .. } = &mut record {
            *child = node.child_at(*index);
        }
        Ok(record)
    }
}

impl fmt::Display for ChangeRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangeRecord::ChangeAttribute {
                target, name, value, ..
            } => write!(f, "set {}@{}={}", target, name, value),
            ChangeRecord::ClearAttribute { target, name } => write!(f, "clear {}@{}", target, name),
            ChangeRecord::AddChild {
                target, child, index,
            } => match index {
                Some(index) => write!(f, "add {:?} to {} at {}", child, target, index),
                None => write!(f, "add {:?} to {}", child, target),
            },
            ChangeRecord::RemoveChild { target, index, .. } => {
                write!(f, "remove {}[{}] from {}", self.name(), index, target)
            }
        }
    }
}
