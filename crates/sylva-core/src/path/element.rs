//! One step of a location path

use std::fmt;
use std::rc::Rc;

use crate::node::Node;

use super::axis::Axis;
use super::predicate::Predicate;

/// Axis, optional node test and optional predicate
#[derive(Clone)]
pub struct PathElement {
    pub(crate) axis: Axis,
    /// `None` matches any type
    pub(crate) node_type: Option<String>,
    pub(crate) predicate: Option<Rc<dyn Predicate>>,
    /// Set on inverted paths: the axis the node test was selected along in
    /// the path this one was inverted from
    pub(crate) origin: Option<Axis>,
}

impl PathElement {
    /// Step along `axis` matching `node_type` (`None` or `"*"` for any)
    pub fn new(axis: Axis, node_type: Option<&str>) -> Self {
        Self {
            axis,
            node_type: node_type.filter(|t| *t != "*").map(str::to_string),
            predicate: None,
            origin: None,
        }
    }

    pub fn child(node_type: &str) -> Self {
        Self::new(Axis::CHILD, Some(node_type))
    }

    pub fn with_predicate(self, predicate: impl Predicate + 'static) -> Self {
        self.with_shared_predicate(Rc::new(predicate))
    }

    pub fn with_shared_predicate(mut self, predicate: Rc<dyn Predicate>) -> Self {
        self.predicate = Some(predicate);
        self
    }

    pub fn axis(&self) -> Axis {
        self.axis
    }

    pub fn node_type(&self) -> Option<&str> {
        self.node_type.as_deref()
    }

    pub fn predicate(&self) -> Option<&Rc<dyn Predicate>> {
        self.predicate.as_ref()
    }

    pub fn matches_type(&self, node: &Node) -> bool {
        match &self.node_type {
            Some(node_type) => node.is_type(node_type),
            None => true,
        }
    }

    pub(crate) fn name_test(&self) -> &str {
        self.node_type.as_deref().unwrap_or("*")
    }

    /// Canonical text of the step without its separator
    pub(crate) fn write_step(&self, f: &mut fmt::Formatter<'_>, axis: Axis) -> fmt::Result {
        let bare = self.node_type.is_none() && self.predicate.is_none();
        if axis == Axis::SELF && bare {
            return write!(f, ".");
        }
        if axis == Axis::PARENT && bare {
            return write!(f, "..");
        }
        if axis == Axis::ATTRIBUTE {
            write!(f, "@{}", self.name_test())?;
        } else if axis == Axis::CHILD {
            write!(f, "{}", self.name_test())?;
        } else {
            write!(f, "{}::{}", axis.name(), self.name_test())?;
        }
        if let Some(predicate) = &self.predicate {
            write!(f, "{}", predicate)?;
        }
        Ok(())
    }
}

impl PartialEq for PathElement {
    fn eq(&self, other: &Self) -> bool {
        let same_predicate = match (&self.predicate, &other.predicate) {
            (None, None) => true,
            (Some(a), Some(b)) => {
                Rc::as_ptr(a) as *const () == Rc::as_ptr(b) as *const ()
                    || a.to_string() == b.to_string()
            }
            _ => false,
        };
        self.axis == other.axis
            && self.node_type == other.node_type
            && self.origin == other.origin
            && same_predicate
    }
}

impl fmt::Debug for PathElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("PathElement");
        s.field("axis", &self.axis.name())
            .field("node_type", &self.name_test());
        if let Some(predicate) = &self.predicate {
            s.field("predicate", &predicate.to_string());
        }
        if let Some(origin) = self.origin {
            s.field("origin", &origin.name());
        }
        s.finish()
    }
}
