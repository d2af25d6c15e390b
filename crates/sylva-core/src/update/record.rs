//! One in-flight update

use crate::change::ChangeSet;

use super::memento::Memento;

/// Memento log plus the changes deferred against frozen nodes
///
/// Retired updates are pooled by the model and reused; `id == 0` marks an
/// update that is not on the stack.
#[derive(Default)]
pub(crate) struct Update {
    pub(crate) id: u64,
    pub(crate) reverted: bool,
    mementos: Vec<Memento>,
    pub(crate) deferred: ChangeSet,
}

impl Update {
    pub(crate) fn activate(&mut self, id: u64) {
        self.id = id;
        self.reverted = false;
    }

    pub(crate) fn record(&mut self, memento: Memento) {
        self.mementos.push(memento);
    }

    pub(crate) fn memento_count(&self) -> usize {
        self.mementos.len()
    }

    /// Undo every recorded mutation, newest first; idempotent
    pub(crate) fn revert(&mut self) {
        if self.reverted {
            return;
        }
        for memento in self.mementos.iter().rev() {
            memento.revert();
        }
        self.reverted = true;
    }

    /// Redo every recorded mutation, oldest first; idempotent
    pub(crate) fn restore(&mut self) {
        if !self.reverted {
            return;
        }
        for memento in &self.mementos {
            memento.restore();
        }
        self.reverted = false;
    }

    /// Reset for the pool and hand back the deferred changes
    pub(crate) fn retire(&mut self) -> ChangeSet {
        self.id = 0;
        self.reverted = false;
        self.mementos.clear();
        std::mem::take(&mut self.deferred)
    }
}
