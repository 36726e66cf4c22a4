//! Observable, Cancelable Tasks
//!
//! A [`Task`] is a named unit of blocking work producing a typed result. The
//! body reports incremental state through the [`TaskControl`] it receives;
//! every update is broadcast as a [`TaskEvent`] on the channels of the
//! current subscribers before the update call returns.
//!
//! Cancellation is cooperative: [`TaskHandle::cancel`] only raises a flag,
//! and the body stops when it next calls [`TaskControl::checkpoint`].
//!
//! ```
//! use appma::task::{Task, TaskEvent};
//!
//! let task = Task::cancelable("count", |control| {
//!     for done in 1..=3 {
//!         control.checkpoint()?;
//!         control.update_progress(done, 3);
//!     }
//!     Ok(3)
//! });
//! let events = task.subscribe();
//! assert_eq!(task.execute().unwrap(), 3);
//! assert!(matches!(events.recv().unwrap(), TaskEvent::Progress { done: 1, max: 3 }));
//! ```

pub mod progress;

use std::fmt;
use std::sync::Arc;
use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;

use crate::core::error::{AppError, AppResult};

pub use progress::{attach, progress_fraction, LogProgress, ProgressListener, ProgressSink, INDETERMINATE};

/// Event broadcast to task subscribers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskEvent {
    Progress { done: i64, max: i64 },
    Message(String),
    Canceled,
    /// Last event of every task, sent once the task has run or been dropped
    Finished,
}

#[derive(Debug, Default)]
struct TaskStatus {
    done: i64,
    max: i64,
    message: Option<String>,
    canceled: bool,
    finished: bool,
}

/// Shared state of a task, handed to its body while it runs
pub struct TaskControl {
    name: String,
    cancelable: bool,
    status: Mutex<TaskStatus>,
    subscribers: Mutex<Vec<Sender<TaskEvent>>>,
}

impl TaskControl {
    fn new(name: String, cancelable: bool) -> Self {
        Self {
            name,
            cancelable,
            status: Mutex::new(TaskStatus::default()),
            subscribers: Mutex::new(Vec::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Record the amount of work done out of `max` and notify subscribers
    pub fn update_progress(&self, done: i64, max: i64) {
        let mut status = self.status.lock();
        status.done = done;
        status.max = max;
        self.broadcast(TaskEvent::Progress { done, max });
    }

    /// Record a status message and notify subscribers
    pub fn update_message<S: Into<String>>(&self, message: S) {
        let message = message.into();
        let mut status = self.status.lock();
        status.message = Some(message.clone());
        self.broadcast(TaskEvent::Message(message));
    }

    pub fn is_canceled(&self) -> bool {
        self.status.lock().canceled
    }

    /// Fail with [`AppError::Interrupted`] if the task has been canceled
    pub fn checkpoint(&self) -> AppResult<()> {
        if self.is_canceled() {
            Err(AppError::interrupted(&self.name))
        } else {
            Ok(())
        }
    }

    pub fn work_done(&self) -> i64 {
        self.status.lock().done
    }

    pub fn max(&self) -> i64 {
        self.status.lock().max
    }

    pub fn message(&self) -> Option<String> {
        self.status.lock().message.clone()
    }

    fn cancel(&self) -> bool {
        if !self.cancelable {
            return false;
        }
        let mut status = self.status.lock();
        if status.canceled {
            return true;
        }
        status.canceled = true;
        self.broadcast(TaskEvent::Canceled);
        true
    }

    fn finish(&self) {
        let mut status = self.status.lock();
        if !status.finished {
            status.finished = true;
            self.broadcast(TaskEvent::Finished);
        }
    }

    fn subscribe(&self) -> Receiver<TaskEvent> {
        let (sender, receiver) = crossbeam_channel::unbounded();
        let status = self.status.lock();
        if status.finished {
            let _ = sender.send(TaskEvent::Finished);
        } else {
            self.subscribers.lock().push(sender);
        }
        receiver
    }

    // Called with the status lock held so events keep the order of the updates
    fn broadcast(&self, event: TaskEvent) {
        let mut subscribers = self.subscribers.lock();
        subscribers.retain(|sender| sender.send(event.clone()).is_ok());
    }
}

impl fmt::Debug for TaskControl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskControl")
            .field("name", &self.name)
            .field("cancelable", &self.cancelable)
            .field("status", &*self.status.lock())
            .finish()
    }
}

/// Cloneable handle used to observe or cancel a task from another thread
#[derive(Debug, Clone)]
pub struct TaskHandle {
    control: Arc<TaskControl>,
}

impl TaskHandle {
    pub fn name(&self) -> &str {
        self.control.name()
    }

    pub fn cancelable(&self) -> bool {
        self.control.cancelable
    }

    /// Request cancellation. No-op for tasks that are not cancelable.
    ///
    /// Returns whether the task is now flagged as canceled.
    pub fn cancel(&self) -> bool {
        self.control.cancel()
    }

    pub fn is_canceled(&self) -> bool {
        self.control.is_canceled()
    }

    pub fn work_done(&self) -> i64 {
        self.control.work_done()
    }

    pub fn max(&self) -> i64 {
        self.control.max()
    }

    pub fn message(&self) -> Option<String> {
        self.control.message()
    }

    pub fn subscribe(&self) -> Receiver<TaskEvent> {
        self.control.subscribe()
    }
}

type TaskBody<T> = Box<dyn FnOnce(&TaskControl) -> AppResult<T> + Send>;

/// A named unit of work, executed exactly once
pub struct Task<T> {
    control: Arc<TaskControl>,
    body: Option<TaskBody<T>>,
}

impl<T> Task<T> {
    /// Create a task that ignores cancellation requests
    pub fn new<S, F>(name: S, body: F) -> Self
    where
        S: Into<String>,
        F: FnOnce(&TaskControl) -> AppResult<T> + Send + 'static,
    {
        Self::build(name.into(), false, Box::new(body))
    }

    /// Create a task that can be canceled through its handle
    pub fn cancelable<S, F>(name: S, body: F) -> Self
    where
        S: Into<String>,
        F: FnOnce(&TaskControl) -> AppResult<T> + Send + 'static,
    {
        Self::build(name.into(), true, Box::new(body))
    }

    fn build(name: String, cancelable: bool, body: TaskBody<T>) -> Self {
        Self {
            control: Arc::new(TaskControl::new(name, cancelable)),
            body: Some(body),
        }
    }

    pub fn name(&self) -> &str {
        self.control.name()
    }

    pub fn is_cancelable(&self) -> bool {
        self.control.cancelable
    }

    pub fn handle(&self) -> TaskHandle {
        TaskHandle { control: Arc::clone(&self.control) }
    }

    pub fn subscribe(&self) -> Receiver<TaskEvent> {
        self.control.subscribe()
    }

    /// Run the task body on the calling thread
    pub fn execute(mut self) -> AppResult<T> {
        match self.body.take() {
            Some(body) => body(&self.control),
            None => Err(AppError::application(format!("The task '{}' has no body", self.name()))),
        }
        // Finished is emitted when self drops
    }
}

impl<T> Drop for Task<T> {
    fn drop(&mut self) {
        self.control.finish();
    }
}

impl<T> fmt::Debug for Task<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("control", &self.control)
            .field("executed", &self.body.is_none())
            .finish()
    }
}
