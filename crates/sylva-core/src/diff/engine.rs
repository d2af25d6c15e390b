//! Tree diff computation engine.
//!
//! The core entry point is [`diff_trees`], which walks two trees in step and
//! reports to a [`ChangeSink`] the mutations that would turn the left tree
//! into the right one. Records always target nodes of the left tree; added
//! subtrees are deep copies of the right tree's nodes.

use std::collections::HashSet;
use std::time::Instant;

use crate::change::ChangeSink;
use crate::node::{value_text, Node, ID_ATTRIBUTE};
use crate::{log_op_end, log_op_start};

/// Identity of a child for matching: type plus `id` attribute when present,
/// otherwise type plus ordinal among id-less siblings of that type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum ChildKey {
    Id(String, String),
    Ordinal(String, usize),
}

fn child_keys(children: &[Node]) -> Vec<ChildKey> {
    let mut ordinals: Vec<(String, usize)> = Vec::new();
    children
        .iter()
        .map(|child| {
            let node_type = child.node_type().to_string();
            match child.attribute(ID_ATTRIBUTE) {
                Some(id) => ChildKey::Id(node_type, value_text(&id)),
                None => {
                    let ordinal = match ordinals.iter_mut().find(|(t, _)| *t == node_type) {
                        Some((_, count)) => {
                            *count += 1;
                            *count
                        }
                        None => {
                            ordinals.push((node_type.clone(), 0));
                            0
                        }
                    };
                    ChildKey::Ordinal(node_type, ordinal)
                }
            }
        })
        .collect()
}

/// Report the changes turning `lhs` into `rhs`
///
/// Child order is not compared: matched children are diffed in place and
/// only unmatched children are added or removed.
pub fn diff_trees(lhs: &Node, rhs: &Node, sink: &mut dyn ChangeSink) {
    let started = Instant::now();
    log_op_start!("diff_trees", node_type = lhs.node_type());
    let mut visited = HashSet::new();
    diff_node(lhs, rhs, sink, &mut visited);
    log_op_end!(
        "diff_trees",
        duration_ms = started.elapsed().as_millis() as u64
    );
}

fn diff_node(lhs: &Node, rhs: &Node, sink: &mut dyn ChangeSink, visited: &mut HashSet<Node>) {
    // Aliases are compared by referent only once
    if !visited.insert(lhs.referent()) {
        return;
    }

    // 1. Attributes
    let lhs_attributes = lhs.attributes();
    let rhs_attributes = rhs.attributes();
    for (name, value) in &rhs_attributes {
        if lhs_attributes.get(name) != Some(value) {
            sink.set_attribute(lhs, name, value.clone());
        }
    }
    for name in lhs_attributes.keys() {
        if !rhs_attributes.contains_key(name) {
            sink.remove_attribute(lhs, name);
        }
    }

    if lhs.is_reference() || rhs.is_reference() {
        return;
    }

    // 2. Match children
    let lhs_children = lhs.children();
    let rhs_children = rhs.children();
    let lhs_keys = child_keys(&lhs_children);
    let rhs_keys = child_keys(&rhs_children);

    // 3. Removals: left children with no counterpart
    for (child, key) in lhs_children.iter().zip(&lhs_keys) {
        if !rhs_keys.contains(key) {
            sink.remove_child(lhs, child);
        }
    }

    // 4. Additions and recursion, in right-hand order
    for (index, (child, key)) in rhs_children.iter().zip(&rhs_keys).enumerate() {
        match lhs_keys.iter().position(|k| k == key) {
            Some(position) => diff_node(&lhs_children[position], child, sink, visited),
            None => sink.add_child(lhs, &child.clone_tree(), Some(index)),
        }
    }
}
