//! Ordered lists of change records

use std::time::Instant;

use crate::errors::Result;
use crate::node::{Node, Value};
use crate::{log_op_end, log_op_error, log_op_start};

use super::record::ChangeRecord;

/// Receiver of mutations reported by the tree differ
pub trait ChangeSink {
    fn set_attribute(&mut self, node: &Node, name: &str, value: Value);
    fn remove_attribute(&mut self, node: &Node, name: &str);
    fn add_child(&mut self, parent: &Node, child: &Node, index: Option<usize>);
    fn remove_child(&mut self, parent: &Node, child: &Node);
}

/// An ordered, replayable list of [`ChangeRecord`]s
#[derive(Debug, Clone, Default)]
pub struct ChangeSet {
    records: Vec<ChangeRecord>,
}

impl ChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, record: ChangeRecord) {
        self.records.push(record);
    }

    pub fn records(&self) -> &[ChangeRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn clear_changes(&mut self) {
        self.records.clear();
    }

    /// Apply every record in order, stopping at the first failure
    ///
    /// # Errors
    /// The first error raised by a record.
    pub fn apply_changes(&self) -> Result<()> {
        self.apply_with(|record| record.apply())
    }

    /// Apply every record under `root`, resolving unbound targets
    ///
    /// # Errors
    /// The first error raised by a record.
    pub fn apply_changes_to(&self, root: &Node) -> Result<()> {
        self.apply_with(|record| record.apply_to(root))
    }

    fn apply_with(&self, apply: impl Fn(&ChangeRecord) -> Result<()>) -> Result<()> {
        let started = Instant::now();
        log_op_start!("apply_changes", record_count = self.records.len());
        for record in &self.records {
            if let Err(err) = apply(record) {
                log_op_error!(
                    "apply_changes",
                    err.clone(),
                    duration_ms = started.elapsed().as_millis() as u64
                );
                return Err(err);
            }
        }
        log_op_end!(
            "apply_changes",
            duration_ms = started.elapsed().as_millis() as u64
        );
        Ok(())
    }

    /// Drop records whose effect is overwritten or cancelled later on
    ///
    /// Only the last attribute record per (target, name) is kept, and an
    /// add-child later undone by a remove of the same child from the same
    /// parent is dropped together with that remove.
    pub fn normalize(&mut self) {
        let n = self.records.len();
        let mut keep = vec![true; n];

        for i in 0..n {
            let name = match &self.records[i] {
                ChangeRecord::ChangeAttribute { name, .. }
                | ChangeRecord::ClearAttribute { name, .. } => name,
                _ => continue,
            };
            let superseded = self.records[i + 1..].iter().any(|later| match later {
                ChangeRecord::ChangeAttribute { name: other, .. }
                | ChangeRecord::ClearAttribute { name: other, .. } => {
                    other == name && later.same_target(&self.records[i])
                }
                _ => false,
            });
            if superseded {
                keep[i] = false;
            }
        }

        for i in 0..n {
            let ChangeRecord::AddChild { child, .. } = &self.records[i] else {
                continue;
            };
            if !keep[i] {
                continue;
            }
            let cancel = (i + 1..n).find(|&j| {
                keep[j]
                    && matches!(
                        &self.records[j],
                        ChangeRecord::RemoveChild { child: Some(removed), .. }
                            if removed.ptr_eq(child) && self.records[j].same_target(&self.records[i])
                    )
            });
            if let Some(j) = cancel {
                keep[i] = false;
                keep[j] = false;
            }
        }

        let mut flags = keep.into_iter();
        self.records.retain(|_| flags.next().unwrap_or(true));
    }
}

impl ChangeSink for ChangeSet {
    fn set_attribute(&mut self, node: &Node, name: &str, value: Value) {
        self.push(ChangeRecord::change_attribute(node, name, value));
    }

    fn remove_attribute(&mut self, node: &Node, name: &str) {
        self.push(ChangeRecord::clear_attribute(node, name));
    }

    fn add_child(&mut self, parent: &Node, child: &Node, index: Option<usize>) {
        self.push(ChangeRecord::add_child(parent, child, index));
    }

    fn remove_child(&mut self, parent: &Node, child: &Node) {
        self.push(ChangeRecord::remove_child(parent, child));
    }
}

impl IntoIterator for ChangeSet {
    type Item = ChangeRecord;
    type IntoIter = std::vec::IntoIter<ChangeRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.into_iter()
    }
}

impl<'a> IntoIterator for &'a ChangeSet {
    type Item = &'a ChangeRecord;
    type IntoIter = std::slice::Iter<'a, ChangeRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}
