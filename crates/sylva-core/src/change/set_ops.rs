//! Filtering change sinks used to merge trees
//!
//! Diffing `lhs` against `rhs` into a [`UnionChangeSet`] and applying it
//! leaves `lhs` holding everything from both trees; an
//! [`IntersectChangeSet`] leaves only what both trees share.

use std::ops::{Deref, DerefMut};

use crate::node::{Node, Value};

use super::change_set::{ChangeSet, ChangeSink};

/// Keeps additions and attribute writes, drops removals
#[derive(Debug, Clone, Default)]
pub struct UnionChangeSet(ChangeSet);

impl UnionChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_inner(self) -> ChangeSet {
        self.0
    }
}

impl Deref for UnionChangeSet {
    type Target = ChangeSet;

    fn deref(&self) -> &ChangeSet {
        &self.0
    }
}

impl DerefMut for UnionChangeSet {
    fn deref_mut(&mut self) -> &mut ChangeSet {
        &mut self.0
    }
}

impl ChangeSink for UnionChangeSet {
    fn set_attribute(&mut self, node: &Node, name: &str, value: Value) {
        self.0.set_attribute(node, name, value);
    }

    fn remove_attribute(&mut self, _node: &Node, _name: &str) {}

    fn add_child(&mut self, parent: &Node, child: &Node, index: Option<usize>) {
        self.0.add_child(parent, child, index);
    }

    fn remove_child(&mut self, _parent: &Node, _child: &Node) {}
}

/// Keeps removals, drops additions and attribute writes
#[derive(Debug, Clone, Default)]
pub struct IntersectChangeSet(ChangeSet);

impl IntersectChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_inner(self) -> ChangeSet {
        self.0
    }
}

impl Deref for IntersectChangeSet {
    type Target = ChangeSet;

    fn deref(&self) -> &ChangeSet {
        &self.0
    }
}

impl DerefMut for IntersectChangeSet {
    fn deref_mut(&mut self) -> &mut ChangeSet {
        &mut self.0
    }
}

impl ChangeSink for IntersectChangeSet {
    fn set_attribute(&mut self, _node: &Node, _name: &str, _value: Value) {}

    fn remove_attribute(&mut self, node: &Node, name: &str) {
        self.0.remove_attribute(node, name);
    }

    fn add_child(&mut self, _parent: &Node, _child: &Node, _index: Option<usize>) {}

    fn remove_child(&mut self, parent: &Node, child: &Node) {
        self.0.remove_child(parent, child);
    }
}
