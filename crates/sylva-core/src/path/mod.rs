//! Location paths over the node tree
//!
//! A [`Path`] is a sequence of [`PathElement`]s, each an [`Axis`], an
//! optional node-type test and an optional [`Predicate`]. Paths compile
//! from an XPath-like syntax (`/root/item[@id='x']`, `//leaf`,
//! `../following-sibling::*[1]`), evaluate step by step from a context node,
//! invert so membership can be decided from the candidate upward, and drive
//! live [`PathListener`]s that are told when the result set changes.

pub mod axis;
pub mod element;
mod eval;
mod invert;
pub(crate) mod live;
mod parser;
pub mod predicate;

use std::cell::OnceCell;
use std::collections::HashSet;
use std::fmt;
use std::rc::Rc;
use std::str::FromStr;

use crate::errors::PathSyntaxError;
use crate::node::{Node, ID_ATTRIBUTE};
use crate::variables::VariableScope;

pub use axis::Axis;
pub use element::PathElement;
pub use live::PathListener;
pub use predicate::{
    AttributePredicate, AttributeWatch, ChildPredicate, ExpressionListener, FnPredicate,
    PositionPredicate, Predicate, PredicateContext, VariablePredicate,
};

/// Compiled location path
pub struct Path {
    elements: Vec<PathElement>,
    absolute: OnceCell<bool>,
    inverse: OnceCell<Option<Rc<Path>>>,
}

impl Path {
    /// Compile path text
    pub fn compile(text: &str) -> std::result::Result<Path, PathSyntaxError> {
        Self::compile_with(text, None)
    }

    /// Compile path text whose predicates may reference `$variables`
    pub fn compile_with(
        text: &str,
        scope: Option<&VariableScope>,
    ) -> std::result::Result<Path, PathSyntaxError> {
        parser::parse(text, scope).map(Self::from_elements)
    }

    pub fn from_elements(elements: Vec<PathElement>) -> Self {
        Self {
            elements,
            absolute: OnceCell::new(),
            inverse: OnceCell::new(),
        }
    }

    pub fn elements(&self) -> &[PathElement] {
        &self.elements
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn add_element(&mut self, element: PathElement) {
        self.elements.push(element);
        self.reset_caches();
    }

    pub fn remove_element(&mut self, index: usize) -> Option<PathElement> {
        if index >= self.elements.len() {
            return None;
        }
        let removed = self.elements.remove(index);
        self.reset_caches();
        Some(removed)
    }

    fn reset_caches(&mut self) {
        self.absolute = OnceCell::new();
        self.inverse = OnceCell::new();
    }

    /// Result does not depend on where below the root the context sits
    ///
    /// True when the first step starts at the root or when any predicate
    /// reads state reachable only from the root.
    pub fn is_absolute(&self) -> bool {
        *self.absolute.get_or_init(|| {
            let rooted = self
                .elements
                .first()
                .is_some_and(|e| e.axis.contains(Axis::ROOT));
            rooted
                || self
                    .elements
                    .iter()
                    .filter_map(|e| e.predicate.as_ref())
                    .any(|p| p.is_absolute())
        })
    }

    /// Inverted path, computed once; `None` when a step has no inverse
    pub fn invert_path(&self) -> Option<Rc<Path>> {
        self.inverse
            .get_or_init(|| match invert::invert(self) {
                Ok(path) => Some(Rc::new(path)),
                Err(err) => {
                    tracing::debug!(path = %self, error = %err, "path is not invertible");
                    None
                }
            })
            .clone()
    }

    /// Every node the path selects from `context`, in evaluation order
    pub fn query(&self, context: &Node) -> Vec<Node> {
        self.query_prefix(context, self.elements.len())
    }

    /// Nodes selected by the first `length` steps
    pub fn query_prefix(&self, context: &Node, length: usize) -> Vec<Node> {
        let length = length.min(self.elements.len());
        let mut layer = vec![context.clone()];
        for element in &self.elements[..length] {
            let mut seen = HashSet::new();
            let mut next = Vec::new();
            for node in &layer {
                eval::evaluate_step(element, node, &mut seen, &mut next);
            }
            layer = next;
            if layer.is_empty() {
                break;
            }
        }
        if length == self.elements.len() && invert::anchored_at_root(self) {
            layer.retain(|n| n.parent().is_none());
        }
        layer
    }

    /// First node the path selects, without evaluating the rest
    pub fn query_first(&self, context: &Node) -> Option<Node> {
        self.first_from(0, context)
    }

    fn first_from(&self, depth: usize, context: &Node) -> Option<Node> {
        if depth == self.elements.len() {
            if invert::anchored_at_root(self) && context.parent().is_some() {
                return None;
            }
            return Some(context.clone());
        }
        let mut step = Vec::new();
        eval::evaluate_step(&self.elements[depth], context, &mut HashSet::new(), &mut step);
        step.iter().find_map(|node| self.first_from(depth + 1, node))
    }

    /// Path that selects exactly `node` from `root`
    ///
    /// Steps use the `id` attribute where present and the position among
    /// same-typed siblings otherwise. `None` if `node` is not under `root`.
    pub fn identity_path(node: &Node, root: &Node) -> Option<Path> {
        let mut steps = Vec::new();
        let mut current = node.clone();
        while !current.ptr_eq(root) {
            let parent = current.parent()?;
            let step = if current.is_attribute_node() {
                PathElement::new(Axis::ATTRIBUTE, Some(current.node_type()))
            } else if let Some(id) = current.attribute(ID_ATTRIBUTE) {
                PathElement::child(current.node_type())
                    .with_predicate(AttributePredicate::equals(ID_ATTRIBUTE, id))
            } else {
                let position = parent
                    .children_of_type(current.node_type())
                    .iter()
                    .position(|c| c.ptr_eq(&current))?;
                PathElement::child(current.node_type())
                    .with_predicate(PositionPredicate::Index(position + 1))
            };
            steps.push(step);
            current = parent;
        }
        if steps.is_empty() {
            steps.push(PathElement::new(Axis::SELF, None));
        }
        steps.reverse();
        Some(Path::from_elements(steps))
    }
}

impl Clone for Path {
    fn clone(&self) -> Self {
        Self::from_elements(self.elements.clone())
    }
}

impl PartialEq for Path {
    fn eq(&self, other: &Self) -> bool {
        self.elements == other.elements
    }
}

impl FromStr for Path {
    type Err = PathSyntaxError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Path::compile(s)
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, element) in self.elements.iter().enumerate() {
            let axis = element.axis;
            if index == 0 && axis.contains(Axis::ROOT) {
                let rest = axis - Axis::ROOT;
                if rest.is_empty() {
                    if self.elements.len() == 1
                        && element.node_type.is_none()
                        && element.predicate.is_none()
                    {
                        return write!(f, "/");
                    }
                    write!(f, "/")?;
                    element.write_step(f, Axis::CHILD)?;
                } else if rest == Axis::SELF | Axis::DESCENDANT {
                    write!(f, "//")?;
                    element.write_step(f, Axis::CHILD)?;
                } else {
                    write!(f, "/")?;
                    element.write_step(f, rest)?;
                }
                continue;
            }
            if index > 0 {
                if axis == Axis::DESCENDANT {
                    write!(f, "//")?;
                    element.write_step(f, Axis::CHILD)?;
                    continue;
                }
                write!(f, "/")?;
            }
            element.write_step(f, axis)?;
        }
        Ok(())
    }
}

impl fmt::Debug for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Path({})", self)
    }
}
