//! The model: update stack, freezing and deferred replay
//!
//! Every mutation runs inside an update. Updates nest; each records mementos
//! so the innermost update can be reverted (the tree is shown as it was
//! before the update) and restored again. While a node's listeners are being
//! notified the node is *frozen*: further mutations touching it are queued on
//! the freezing update and replayed in order when that update ends.
//!
//! A model and every node in it belong to one thread. Work from other
//! threads goes through [`Model::dispatch`].

mod dispatch;
pub(crate) mod memento;
mod record;

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use sylva_core_types::ModelId;

use crate::change::ChangeRecord;
use crate::config::ModelOptions;
use crate::errors::{Result, SylvaError};
use crate::listener::{ExceptionSink, LoggingExceptionSink};
use crate::node::{DefaultFactory, Node, NodeFactory};

pub use dispatch::{Dispatcher, Task};
pub(crate) use memento::Memento;
use record::Update;

/// Shared handle to a model
#[derive(Clone)]
pub struct Model {
    inner: Rc<ModelInner>,
}

struct ModelInner {
    id: ModelId,
    options: ModelOptions,
    state: RefCell<ModelState>,
    hooks: RefCell<ModelHooks>,
}

struct ModelHooks {
    factory: Rc<dyn NodeFactory>,
    exception_sink: Rc<dyn ExceptionSink>,
    dispatcher: Option<Arc<dyn Dispatcher>>,
}

#[derive(Default)]
struct ModelState {
    stack: Vec<Update>,
    pool: Vec<Update>,
    frozen: HashMap<Node, u64>,
    next_id: u64,
    types: HashSet<Rc<str>>,
}

/// Builder for [`Model`]
pub struct ModelBuilder {
    options: ModelOptions,
    factory: Rc<dyn NodeFactory>,
    exception_sink: Rc<dyn ExceptionSink>,
    dispatcher: Option<Arc<dyn Dispatcher>>,
}

impl Default for ModelBuilder {
    fn default() -> Self {
        Self {
            options: ModelOptions::default(),
            factory: Rc::new(DefaultFactory),
            exception_sink: Rc::new(LoggingExceptionSink),
            dispatcher: None,
        }
    }
}

impl ModelBuilder {
    pub fn options(mut self, options: ModelOptions) -> Self {
        self.options = options;
        self
    }

    pub fn factory(mut self, factory: Rc<dyn NodeFactory>) -> Self {
        self.factory = factory;
        self
    }

    pub fn exception_sink(mut self, sink: Rc<dyn ExceptionSink>) -> Self {
        self.exception_sink = sink;
        self
    }

    pub fn dispatcher(mut self, dispatcher: Arc<dyn Dispatcher>) -> Self {
        self.dispatcher = Some(dispatcher);
        self
    }

    pub fn build(self) -> Model {
        let model = Model {
            inner: Rc::new(ModelInner {
                id: ModelId::new(),
                options: self.options,
                state: RefCell::new(ModelState::default()),
                hooks: RefCell::new(ModelHooks {
                    factory: self.factory,
                    exception_sink: self.exception_sink,
                    dispatcher: self.dispatcher,
                }),
            }),
        };
        tracing::debug!(model_id = %model.id(), "model created");
        model
    }
}

/// Closes an update when dropped
pub(crate) struct UpdateScope<'a> {
    model: &'a Model,
}

impl Drop for UpdateScope<'_> {
    fn drop(&mut self) {
        self.model.end_update();
    }
}

/// Unfreezes the nodes it froze when dropped
pub(crate) struct FreezeScope<'a> {
    model: &'a Model,
    nodes: Vec<Node>,
}

impl Drop for FreezeScope<'_> {
    fn drop(&mut self) {
        for node in &self.nodes {
            self.model.unfreeze(node);
        }
    }
}

thread_local! {
    static CURRENT: RefCell<Vec<Model>> = const { RefCell::new(Vec::new()) };
}

struct EnterGuard;

impl Drop for EnterGuard {
    fn drop(&mut self) {
        CURRENT.with(|current| {
            current.borrow_mut().pop();
        });
    }
}

impl Default for Model {
    fn default() -> Self {
        Self::new()
    }
}

impl Model {
    /// Model with default options, factory and exception sink
    pub fn new() -> Self {
        ModelBuilder::default().build()
    }

    pub fn builder() -> ModelBuilder {
        ModelBuilder::default()
    }

    pub fn id(&self) -> &ModelId {
        &self.inner.id
    }

    pub fn options(&self) -> &ModelOptions {
        &self.inner.options
    }

    pub fn ptr_eq(&self, other: &Model) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    // ===== Ambient model =====

    /// Run `f` with this model as the thread's current model
    pub fn enter<R>(&self, f: impl FnOnce() -> R) -> R {
        CURRENT.with(|current| current.borrow_mut().push(self.clone()));
        let _guard = EnterGuard;
        f()
    }

    /// Innermost model entered on this thread
    pub fn current() -> Option<Model> {
        CURRENT.with(|current| current.borrow().last().cloned())
    }

    // ===== Collaborators =====

    pub fn factory(&self) -> Rc<dyn NodeFactory> {
        self.inner.hooks.borrow().factory.clone()
    }

    pub fn set_factory(&self, factory: Rc<dyn NodeFactory>) {
        self.inner.hooks.borrow_mut().factory = factory;
    }

    pub fn exception_sink(&self) -> Rc<dyn ExceptionSink> {
        self.inner.hooks.borrow().exception_sink.clone()
    }

    pub fn set_exception_sink(&self, sink: Rc<dyn ExceptionSink>) {
        self.inner.hooks.borrow_mut().exception_sink = sink;
    }

    pub fn dispatcher(&self) -> Option<Arc<dyn Dispatcher>> {
        self.inner.hooks.borrow().dispatcher.clone()
    }

    pub fn set_dispatcher(&self, dispatcher: Option<Arc<dyn Dispatcher>>) {
        self.inner.hooks.borrow_mut().dispatcher = dispatcher;
    }

    /// Route an error to the exception sink
    pub fn handle_exception(&self, error: &SylvaError) {
        let sink = self.exception_sink();
        sink.handle_exception(error);
    }

    /// Run `task` through the dispatcher, or inline when none is installed
    ///
    /// # Errors
    /// * `DispatchFailed` - If the dispatcher cannot accept the task
    pub fn dispatch(&self, task: Task) -> Result<()> {
        match self.dispatcher() {
            Some(dispatcher) => dispatcher.execute(task),
            None => {
                task(self);
                Ok(())
            }
        }
    }

    // ===== Node creation =====

    /// Create a detached node through the installed factory
    pub fn create_node(&self, node_type: &str) -> Node {
        self.factory().create_object(self, None, node_type)
    }

    /// Create a detached external node through the installed factory
    pub fn create_external_node(&self, node_type: &str) -> Node {
        self.factory().create_external_object(self, None, node_type)
    }

    pub(crate) fn intern(&self, node_type: &str) -> Rc<str> {
        let mut state = self.inner.state.borrow_mut();
        if let Some(existing) = state.types.get(node_type) {
            return existing.clone();
        }
        let interned: Rc<str> = Rc::from(node_type);
        state.types.insert(interned.clone());
        interned
    }

    // ===== Update stack =====

    /// Open a nested update and return its id
    pub fn start_update(&self) -> u64 {
        let mut state = self.inner.state.borrow_mut();
        if let Some(top) = state.stack.last() {
            if top.reverted {
                tracing::warn!(
                    model_id = %self.inner.id,
                    update_id = top.id,
                    "update started while the enclosing update is reverted"
                );
            }
        }
        state.next_id += 1;
        let id = state.next_id;
        let mut update = state.pool.pop().unwrap_or_default();
        update.activate(id);
        state.stack.push(update);
        if self.inner.options.trace_updates {
            tracing::trace!(
                model_id = %self.inner.id,
                update_id = id,
                stack_depth = state.stack.len(),
                "update started"
            );
        }
        id
    }

    /// Close the innermost update and replay its deferred changes
    ///
    /// Calling this with no open update is logged and ignored.
    pub fn end_update(&self) {
        let (id, deferred) = {
            let mut state = self.inner.state.borrow_mut();
            let Some(mut update) = state.stack.pop() else {
                tracing::error!(
                    model_id = %self.inner.id,
                    "end_update called with no open update"
                );
                return;
            };
            if update.reverted {
                tracing::warn!(
                    model_id = %self.inner.id,
                    update_id = update.id,
                    "update ended while reverted; restoring"
                );
                update.restore();
            }
            let id = update.id;
            let mementos = update.memento_count();
            let deferred = update.retire();
            if state.pool.len() < self.inner.options.update_pool_size {
                state.pool.push(update);
            }
            if self.inner.options.trace_updates {
                tracing::trace!(
                    model_id = %self.inner.id,
                    update_id = id,
                    memento_count = mementos,
                    record_count = deferred.len(),
                    "update ended"
                );
            }
            (id, deferred)
        };

        if deferred.is_empty() {
            return;
        }
        tracing::debug!(
            model_id = %self.inner.id,
            update_id = id,
            record_count = deferred.len(),
            "replaying deferred changes"
        );
        for record in deferred.records() {
            if let Err(err) = record.apply() {
                self.handle_exception(&err);
            }
        }
    }

    pub(crate) fn begin(&self) -> UpdateScope<'_> {
        self.start_update();
        UpdateScope { model: self }
    }

    /// Id of the innermost open update, or 0
    pub fn current_update_id(&self) -> u64 {
        self.inner
            .state
            .borrow()
            .stack
            .last()
            .map_or(0, |update| update.id)
    }

    /// Number of open updates
    pub fn update_depth(&self) -> usize {
        self.inner.state.borrow().stack.len()
    }

    /// Changes recorded so far by the innermost open update
    pub fn memento_count(&self) -> usize {
        self.inner
            .state
            .borrow()
            .stack
            .last()
            .map_or(0, |update| update.memento_count())
    }

    pub(crate) fn record(&self, memento: Memento) {
        let mut state = self.inner.state.borrow_mut();
        match state.stack.last_mut() {
            Some(update) => update.record(memento),
            None => tracing::error!(
                model_id = %self.inner.id,
                "memento recorded with no open update"
            ),
        }
    }

    /// Show the tree as it was before the innermost update
    ///
    /// Idempotent: reverting an already reverted update does nothing.
    pub fn revert(&self) {
        let mut state = self.inner.state.borrow_mut();
        if let Some(update) = state.stack.last_mut() {
            update.revert();
        }
    }

    /// Undo every revert on the stack, oldest update first
    pub fn restore(&self) {
        let mut state = self.inner.state.borrow_mut();
        for update in state.stack.iter_mut() {
            update.restore();
        }
    }

    /// True while the innermost update is reverted
    pub fn is_reverted(&self) -> bool {
        self.inner
            .state
            .borrow()
            .stack
            .last()
            .is_some_and(|update| update.reverted)
    }

    // ===== Freezing =====

    /// Freeze `node` against the innermost update
    ///
    /// A node frozen outside any update is tracked but nothing is deferred
    /// against it.
    pub fn freeze(&self, node: &Node) {
        let mut state = self.inner.state.borrow_mut();
        let id = state.stack.last().map_or(0, |update| update.id);
        state.frozen.entry(node.clone()).or_insert(id);
    }

    pub fn unfreeze(&self, node: &Node) {
        self.inner.state.borrow_mut().frozen.remove(node);
    }

    pub fn is_frozen(&self, node: &Node) -> bool {
        self.inner.state.borrow().frozen.contains_key(node)
    }

    /// Number of changes queued on the update that froze `node`
    pub fn pending_changes(&self, node: &Node) -> usize {
        let state = self.inner.state.borrow();
        let Some(id) = state.frozen.get(node) else {
            return 0;
        };
        state
            .stack
            .iter()
            .find(|update| update.id == *id)
            .map_or(0, |update| update.deferred.len())
    }

    /// Freeze every node not already frozen, for the guard's lifetime
    pub(crate) fn freeze_scope(&self, nodes: &[&Node]) -> FreezeScope<'_> {
        let mut newly = Vec::new();
        for node in nodes {
            if !self.is_frozen(node) {
                self.freeze(node);
                newly.push((*node).clone());
            }
        }
        FreezeScope {
            model: self,
            nodes: newly,
        }
    }

    /// Queue a change when any of `nodes` is frozen; returns whether queued
    pub(crate) fn try_defer(
        &self,
        nodes: &[&Node],
        record: impl FnOnce() -> ChangeRecord,
    ) -> bool {
        let mut state = self.inner.state.borrow_mut();
        if state.frozen.is_empty() {
            return false;
        }
        let Some(id) = nodes.iter().find_map(|node| state.frozen.get(*node).copied()) else {
            return false;
        };
        match state.stack.iter_mut().find(|update| update.id == id) {
            Some(update) => {
                update.deferred.push(record());
                true
            }
            None => false,
        }
    }
}

impl fmt::Debug for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let depth = self
            .inner
            .state
            .try_borrow()
            .map(|state| state.stack.len())
            .unwrap_or_default();
        f.debug_struct("Model")
            .field("id", &self.inner.id)
            .field("update_depth", &depth)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_update_ids_increase_from_one() {
        let model = Model::new();
        assert_eq!(model.current_update_id(), 0);

        let first = model.start_update();
        let second = model.start_update();
        assert_eq!(first, 1);
        assert_eq!(second, 2);
        assert_eq!(model.current_update_id(), 2);

        model.end_update();
        model.end_update();
        assert_eq!(model.current_update_id(), 0);
    }

    #[test]
    fn test_end_update_on_empty_stack_is_ignored() {
        let model = Model::new();
        model.end_update();
        assert_eq!(model.update_depth(), 0);
    }

    #[test]
    fn test_revert_and_restore_are_idempotent() {
        let model = Model::new();
        let node = model.create_node("item");
        node.set_attribute("a", 1).unwrap();

        let scope = model.begin();
        model.record(Memento::SetAttribute {
            node: node.clone(),
            name: "a".to_string(),
            old: Some(json!(1)),
            new: json!(2),
        });
        node.raw_set_attribute("a", Some(json!(2)));

        model.revert();
        model.revert();
        assert_eq!(node.attribute("a"), Some(json!(1)));

        model.restore();
        model.restore();
        assert_eq!(node.attribute("a"), Some(json!(2)));

        drop(scope);
        assert_eq!(model.update_depth(), 0);
    }

    #[test]
    fn test_freeze_scope_only_unfreezes_what_it_froze() {
        let model = Model::new();
        let a = model.create_node("a");
        let b = model.create_node("b");
        model.freeze(&a);

        {
            let _scope = model.freeze_scope(&[&a, &b]);
            assert!(model.is_frozen(&a));
            assert!(model.is_frozen(&b));
        }

        assert!(model.is_frozen(&a));
        assert!(!model.is_frozen(&b));
    }

    #[test]
    fn test_enter_sets_current_model() {
        let model = Model::new();
        assert!(Model::current().is_none());
        let inside = model.enter(|| Model::current().map(|m| m.ptr_eq(&model)));
        assert_eq!(inside, Some(true));
        assert!(Model::current().is_none());
    }

    #[test]
    fn test_dispatch_without_dispatcher_runs_inline() {
        let model = Model::new();
        let node = model.create_node("item");
        let counter = std::sync::Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let seen = counter.clone();
        model
            .dispatch(Box::new(move |_model: &Model| {
                seen.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            }))
            .unwrap();
        assert_eq!(counter.load(std::sync::atomic::Ordering::SeqCst), 1);
        assert!(node.parent().is_none());
    }
}
