//! Dedicated model thread
//!
//! [`ModelThread::spawn`] starts a named thread that builds a [`Model`] with
//! a [`QueueDispatcher`] installed, runs an init closure to construct the
//! thread's state (typically the document root), and then runs submitted
//! work until shut down. Nodes never cross the thread boundary; jobs are
//! `Send` closures that receive the model and the state by reference.

use std::any::Any;
use std::cell::RefCell;
use std::marker::PhantomData;
use std::rc::Rc;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use sylva_core::listener::panic_message;
use sylva_core::{log_op_end, log_op_error, log_op_start};
use sylva_core::{Model, ModelOptions, Result, SylvaError};
use sylva_core_types::correlation::ModelId;

use crate::config::QueueConfig;
use crate::queue::{task_queue, QueueDispatcher};

thread_local! {
    static STATE: RefCell<Option<Rc<dyn Any>>> = const { RefCell::new(None) };
}

/// Summary returned when a model thread finishes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub model_id: ModelId,
    pub tasks_run: usize,
}

/// Handle to a thread owning a model and state of type `S`
pub struct ModelThread<S: 'static> {
    dispatcher: QueueDispatcher,
    handle: Option<JoinHandle<Result<RunReport>>>,
    _state: PhantomData<fn() -> S>,
}

impl<S: 'static> ModelThread<S> {
    /// Spawn the thread and build its model and state
    ///
    /// `init` runs on the new thread with the model entered. If it fails the
    /// thread exits and [`join`](Self::join) returns its error.
    ///
    /// # Errors
    /// * `DispatchFailed` - If the OS refuses to spawn the thread
    pub fn spawn<I>(name: &str, config: &QueueConfig, options: ModelOptions, init: I) -> Result<Self>
    where
        I: FnOnce(&Model) -> Result<S> + Send + 'static,
    {
        let (dispatcher, queue) = task_queue(config);
        let installed = dispatcher.clone();
        let handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                let start = Instant::now();
                let model = Model::builder()
                    .options(options)
                    .dispatcher(Arc::new(installed))
                    .build();
                log_op_start!("model_thread", model_id = %model.id());

                let state = match model.enter(|| init(&model)) {
                    Ok(state) => state,
                    Err(err) => {
                        log_op_error!(
                            "model_thread",
                            err.clone(),
                            duration_ms = start.elapsed().as_millis() as u64
                        );
                        return Err(err);
                    }
                };
                STATE.with(|slot| *slot.borrow_mut() = Some(Rc::new(state) as Rc<dyn Any>));
                let tasks_run = queue.run(&model);
                STATE.with(|slot| slot.borrow_mut().take());

                log_op_end!(
                    "model_thread",
                    duration_ms = start.elapsed().as_millis() as u64,
                    model_id = %model.id(),
                    tasks_run = tasks_run
                );
                Ok(RunReport {
                    model_id: model.id().clone(),
                    tasks_run,
                })
            })
            .map_err(|err| SylvaError::DispatchFailed {
                message: format!("cannot spawn model thread: {}", err),
            })?;

        Ok(Self {
            dispatcher,
            handle: Some(handle),
            _state: PhantomData,
        })
    }

    /// Run `job` on the model thread with its model and state
    ///
    /// # Errors
    /// * `DispatchFailed` - If the thread has stopped
    pub fn submit<F>(&self, job: F) -> Result<()>
    where
        F: FnOnce(&Model, &S) + Send + 'static,
    {
        self.dispatcher.put(Box::new(move |model: &Model| {
            let state = STATE.with(|slot| slot.borrow().clone());
            match state.as_ref().and_then(|s| s.downcast_ref::<S>()) {
                Some(state) => job(model, state),
                None => tracing::error!(model_id = %model.id(), "model thread has no state"),
            }
        }))
    }

    /// Dispatcher for raw tasks, usable from any thread
    pub fn dispatcher(&self) -> &QueueDispatcher {
        &self.dispatcher
    }

    /// Ask the thread to stop after the work already queued
    ///
    /// # Errors
    /// * `DispatchFailed` - If the thread has already stopped
    pub fn shutdown(&self) -> Result<()> {
        self.dispatcher.close()
    }

    /// Stop the thread and wait for it
    ///
    /// # Errors
    /// * Whatever `init` returned, if it failed
    /// * `DispatchFailed` - If the thread panicked
    pub fn join(mut self) -> Result<RunReport> {
        self.finish()
    }

    fn finish(&mut self) -> Result<RunReport> {
        let Some(handle) = self.handle.take() else {
            return Err(SylvaError::DispatchFailed {
                message: "model thread already joined".to_string(),
            });
        };
        // the thread may already be gone after a failed init
        let _ = self.dispatcher.close();
        handle.join().map_err(|payload| SylvaError::DispatchFailed {
            message: format!(
                "model thread panicked: {}",
                panic_message(payload.as_ref())
            ),
        })?
    }
}

impl<S: 'static> Drop for ModelThread<S> {
    fn drop(&mut self) {
        if self.handle.is_some() {
            if let Err(err) = self.finish() {
                tracing::warn!(error = %err, "model thread ended with an error");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    #[test]
    fn test_submit_runs_against_state() {
        let worker = ModelThread::spawn(
            "sylva-test",
            &QueueConfig::default(),
            ModelOptions::default(),
            |model: &Model| Ok(model.create_node("root")),
        )
        .unwrap();

        let (tx, rx) = mpsc::channel();
        worker
            .submit(move |_model, root| {
                tx.send(root.node_type().to_string()).unwrap();
            })
            .unwrap();

        assert_eq!(rx.recv().unwrap(), "root");
        let report = worker.join().unwrap();
        assert_eq!(report.tasks_run, 1);
    }

    #[test]
    fn test_failed_init_surfaces_on_join() {
        let worker: ModelThread<()> = ModelThread::spawn(
            "sylva-test-init",
            &QueueConfig::default(),
            ModelOptions::default(),
            |_model: &Model| {
                Err(SylvaError::InvalidOperation {
                    reason: "no document".to_string(),
                })
            },
        )
        .unwrap();

        assert!(matches!(
            worker.join(),
            Err(SylvaError::InvalidOperation { .. })
        ));
    }
}
