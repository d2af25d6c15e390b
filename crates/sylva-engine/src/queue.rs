//! Bounded task queue between submitters and a model's owning thread
//!
//! [`task_queue`] returns the two halves. The [`QueueDispatcher`] is
//! `Send + Sync + Clone` and is installed as the model's dispatcher; the
//! [`TaskQueue`] stays on the owning thread, which either blocks in
//! [`TaskQueue::run`] or drains what is ready with [`TaskQueue::pump`] from
//! its own loop.
//!
//! `put` blocks while the queue is full. The owning thread must not `put`
//! into its own full queue; it uses [`QueueDispatcher::try_put`] instead.

use std::cell::Cell;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::mpsc::{self, Receiver, SyncSender, TryRecvError, TrySendError};

use sylva_core::listener::panic_message;
use sylva_core::{Dispatcher, Model, Result, SylvaError, Task};

use crate::config::QueueConfig;

enum Message {
    Run(Task),
    Stop,
}

/// Create a bounded queue sized by `config`
pub fn task_queue(config: &QueueConfig) -> (QueueDispatcher, TaskQueue) {
    let (sender, receiver) = mpsc::sync_channel(config.bound());
    (
        QueueDispatcher { sender },
        TaskQueue {
            receiver,
            stopped: Cell::new(false),
        },
    )
}

/// Sending half of a task queue
#[derive(Clone)]
pub struct QueueDispatcher {
    sender: SyncSender<Message>,
}

fn closed() -> SylvaError {
    SylvaError::DispatchFailed {
        message: "task queue is closed".to_string(),
    }
}

impl QueueDispatcher {
    /// Enqueue `task`, blocking while the queue is full
    ///
    /// # Errors
    /// * `DispatchFailed` - If the receiving half is gone
    pub fn put(&self, task: Task) -> Result<()> {
        self.sender.send(Message::Run(task)).map_err(|_| closed())
    }

    /// Enqueue `task` without blocking; a full queue hands it back
    ///
    /// # Errors
    /// * `DispatchFailed` - If the receiving half is gone
    pub fn try_put(&self, task: Task) -> Result<Option<Task>> {
        match self.sender.try_send(Message::Run(task)) {
            Ok(()) => Ok(None),
            Err(TrySendError::Full(Message::Run(task))) => Ok(Some(task)),
            Err(TrySendError::Full(Message::Stop)) => Ok(None),
            Err(TrySendError::Disconnected(_)) => Err(closed()),
        }
    }

    /// Ask the owning thread to stop once earlier tasks have run
    ///
    /// # Errors
    /// * `DispatchFailed` - If the receiving half is gone
    pub fn close(&self) -> Result<()> {
        self.sender.send(Message::Stop).map_err(|_| closed())
    }
}

impl Dispatcher for QueueDispatcher {
    fn execute(&self, task: Task) -> Result<()> {
        self.put(task)
    }
}

impl fmt::Debug for QueueDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueueDispatcher").finish_non_exhaustive()
    }
}

/// Receiving half of a task queue, owned by the model's thread
pub struct TaskQueue {
    receiver: Receiver<Message>,
    stopped: Cell<bool>,
}

impl TaskQueue {
    /// Block until a task arrives; `None` once closed or disconnected
    pub fn take(&self) -> Option<Task> {
        if self.stopped.get() {
            return None;
        }
        match self.receiver.recv() {
            Ok(Message::Run(task)) => Some(task),
            Ok(Message::Stop) | Err(_) => {
                self.stopped.set(true);
                None
            }
        }
    }

    /// Run every task that is ready without blocking; returns how many ran
    pub fn pump(&self, model: &Model) -> usize {
        let mut ran = 0;
        while !self.stopped.get() {
            match self.receiver.try_recv() {
                Ok(Message::Run(task)) => {
                    run_task(model, task);
                    ran += 1;
                }
                Ok(Message::Stop) | Err(TryRecvError::Disconnected) => self.stopped.set(true),
                Err(TryRecvError::Empty) => break,
            }
        }
        ran
    }

    /// Run tasks until the queue is closed; returns how many ran
    pub fn run(&self, model: &Model) -> usize {
        let mut ran = 0;
        while let Some(task) = self.take() {
            run_task(model, task);
            ran += 1;
        }
        ran
    }

    /// True once a close request or disconnection has been seen
    pub fn is_stopped(&self) -> bool {
        self.stopped.get()
    }
}

/// Run `task` with `model` entered; a panic is reported to the model's sink
pub(crate) fn run_task(model: &Model, task: Task) {
    let outcome = model.enter(|| catch_unwind(AssertUnwindSafe(|| task(model))));
    if let Err(payload) = outcome {
        let err = SylvaError::DispatchFailed {
            message: format!("task panicked: {}", panic_message(payload.as_ref())),
        };
        tracing::error!(model_id = %model.id(), error = %err, "dispatched task failed");
        model.handle_exception(&err);
    }
}
