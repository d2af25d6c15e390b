//! Single-step evaluation
//!
//! A step expands one context node along its axis, filters by node test,
//! then applies the predicate with each survivor's position among the
//! survivors. Candidates of reverse axes come nearest first, so `[1]` on
//! `ancestor::x` is the closest matching ancestor.

use std::collections::HashSet;

use crate::node::{Node, NodeKey};
use crate::traversal::{next_sibling, previous_sibling, Ancestors, DepthFirst, Following, Preceding};

use super::axis::Axis;
use super::element::PathElement;
use super::predicate::{Predicate, PredicateContext};

/// Every node `element.axis` reaches from `context`, unfiltered
pub(crate) fn axis_candidates(element: &PathElement, context: &Node, out: &mut Vec<Node>) {
    let axis = element.axis;
    if axis.contains(Axis::ROOT) {
        let root = context.root();
        let rest = axis - Axis::ROOT;
        if rest.is_empty() {
            out.push(root);
        } else {
            collect(element, rest, &root, out);
        }
        return;
    }
    collect(element, axis, context, out);
}

fn collect(element: &PathElement, axis: Axis, context: &Node, out: &mut Vec<Node>) {
    if axis.contains(Axis::SELF) {
        out.push(context.clone());
    }
    if axis.contains(Axis::ATTRIBUTE) {
        for name in context.attribute_names() {
            if !name.is_empty() {
                out.push(Node::attribute_node(context, &name));
            }
        }
    }
    if axis.contains(Axis::CHILD) {
        out.extend(context.children());
    }
    if axis.contains(Axis::DESCENDANT) {
        out.extend(DepthFirst::descendants(context));
    }
    if axis.contains(Axis::NESTED) {
        nested(element, context, out);
    }
    if axis.contains(Axis::PARENT) {
        out.extend(context.parent());
    }
    if axis.contains(Axis::ANCESTOR) {
        out.extend(Ancestors::new(context));
    }
    if axis.contains(Axis::FOLLOWING_SIBLING) {
        let mut current = next_sibling(context);
        while let Some(node) = current {
            current = next_sibling(&node);
            out.push(node);
        }
    }
    if axis.contains(Axis::PRECEDING_SIBLING) {
        let mut current = previous_sibling(context);
        while let Some(node) = current {
            current = previous_sibling(&node);
            out.push(node);
        }
    }
    if axis.contains(Axis::FOLLOWING) {
        out.extend(Following::new(context));
    }
    if axis.contains(Axis::PRECEDING) {
        out.extend(Preceding::new(context));
    }
}

/// Descendants reached only through nodes passing the step's node test
fn nested(element: &PathElement, context: &Node, out: &mut Vec<Node>) {
    let mut seen = HashSet::new();
    let mut stack: Vec<Node> = context
        .children()
        .into_iter()
        .rev()
        .filter(|c| element.matches_type(c))
        .collect();
    while let Some(node) = stack.pop() {
        if !seen.insert(node.referent()) && node.is_reference() {
            continue;
        }
        for child in node.children().into_iter().rev() {
            if element.matches_type(&child) {
                stack.push(child);
            }
        }
        out.push(node);
    }
}

/// Evaluate `element` from `context`, appending unseen results to `out`
pub(crate) fn evaluate_step(
    element: &PathElement,
    context: &Node,
    seen: &mut HashSet<NodeKey>,
    out: &mut Vec<Node>,
) {
    let mut candidates = Vec::new();
    axis_candidates(element, context, &mut candidates);

    let mut local = HashSet::new();
    let matching: Vec<Node> = candidates
        .into_iter()
        .filter(|node| element.matches_type(node) && local.insert(node.key()))
        .collect();

    let size = matching.len();
    for (index, node) in matching.into_iter().enumerate() {
        if let Some(predicate) = &element.predicate {
            if !predicate_holds(element, predicate.as_ref(), &node, index + 1, size) {
                continue;
            }
        }
        if seen.insert(node.key()) {
            out.push(node);
        }
    }
}

fn predicate_holds(
    element: &PathElement,
    predicate: &dyn Predicate,
    node: &Node,
    position: usize,
    size: usize,
) -> bool {
    if predicate.is_position_sensitive() {
        if let Some(origin) = element.origin {
            return selected_along(origin, element, node);
        }
    }
    predicate.test(&PredicateContext {
        node,
        position,
        size,
    })
}

/// Whether the forward step of an inverted element selects `node`
///
/// Positions in an inverted path are meaningless, so position-sensitive
/// predicates re-run the original step from every context that could have
/// produced `node`.
fn selected_along(origin: Axis, element: &PathElement, node: &Node) -> bool {
    let forward = PathElement {
        axis: origin,
        node_type: element.node_type.clone(),
        predicate: element.predicate.clone(),
        origin: None,
    };
    let contexts = if origin.contains(Axis::ROOT) {
        vec![node.root()]
    } else {
        match origin.inverse() {
            Some(back) if !back.is_empty() => {
                let mut contexts = Vec::new();
                axis_candidates(&PathElement::new(back, None), node, &mut contexts);
                contexts
            }
            _ => vec![node.clone()],
        }
    };
    let target = node.key();
    contexts.iter().any(|context| {
        let mut seen = HashSet::new();
        let mut selected = Vec::new();
        evaluate_step(&forward, context, &mut seen, &mut selected);
        selected.iter().any(|n| n.key() == target)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path::predicate::PositionPredicate;
    use crate::traversal::fixtures::{find, sample, types};
    use crate::update::Model;

    fn step(element: &PathElement, context: &Node) -> Vec<Node> {
        let mut out = Vec::new();
        evaluate_step(element, context, &mut HashSet::new(), &mut out);
        out
    }

    #[test]
    fn test_root_axis_selects_root() {
        let model = Model::new();
        let r = sample(&model);
        let a1 = find(&r, "a1");
        let result = step(&PathElement::new(Axis::ROOT, None), &a1);
        assert_eq!(result.len(), 1);
        assert!(result[0].ptr_eq(&r));
    }

    #[test]
    fn test_descendant_or_self_from_root() {
        let model = Model::new();
        let r = sample(&model);
        let element = PathElement::new(Axis::ROOT | Axis::SELF | Axis::DESCENDANT, None);
        assert_eq!(types(step(&element, &find(&r, "b"))).len(), 7);
    }

    #[test]
    fn test_ancestor_position_is_nearest_first() {
        let model = Model::new();
        let r = sample(&model);
        let element =
            PathElement::new(Axis::ANCESTOR, None).with_predicate(PositionPredicate::Index(1));
        assert_eq!(types(step(&element, &find(&r, "a2"))), vec!["a"]);
    }

    #[test]
    fn test_nested_follows_same_type_chain() {
        let model = Model::new();
        let root = model.create_node("folder");
        let inner = model.create_node("folder");
        let file = model.create_node("file");
        let deep = model.create_node("folder");
        root.add_child(&inner, None).unwrap();
        root.add_child(&file, None).unwrap();
        file.add_child(&deep, None).unwrap();

        let element = PathElement::new(Axis::NESTED, Some("folder"));
        let result = step(&element, &root);
        assert_eq!(result.len(), 1);
        assert!(result[0].ptr_eq(&inner));
    }

    #[test]
    fn test_attribute_axis() {
        let model = Model::new();
        let node = model.create_node("item");
        node.set_attribute("a", 1).unwrap();
        node.set_attribute("b", 2).unwrap();

        let all = step(&PathElement::new(Axis::ATTRIBUTE, None), &node);
        assert_eq!(types(all), vec!["a", "b"]);
        let one = step(&PathElement::new(Axis::ATTRIBUTE, Some("b")), &node);
        assert_eq!(one[0].value(), Some(serde_json::json!(2)));
    }
}
