//! Single Worker Executor
//!
//! Serial queue running lifecycle-mutating work off the caller's thread.
//! Submitted closures run one at a time, in submission order, on a single
//! dedicated worker thread.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::thread::{self, JoinHandle, ThreadId};
use std::time::Duration;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use log::{debug, warn};
use parking_lot::Mutex;

use crate::core::error::{AppError, AppResult};

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Outcome of a submitted closure, available once the worker has run it
#[derive(Debug)]
pub struct TaskFuture<T> {
    receiver: Receiver<thread::Result<T>>,
}

impl<T> TaskFuture<T> {
    /// Block until the work has run and return its value
    pub fn wait(self) -> AppResult<T> {
        match self.receiver.recv() {
            Ok(outcome) => unwrap_outcome(outcome),
            Err(_) => Err(AppError::rejected("The executor stopped before running the work")),
        }
    }

    /// Wait at most `timeout`; `None` if the work has not completed yet
    pub fn wait_timeout(&self, timeout: Duration) -> Option<AppResult<T>> {
        match self.receiver.recv_timeout(timeout) {
            Ok(outcome) => Some(unwrap_outcome(outcome)),
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => {
                Some(Err(AppError::rejected("The executor stopped before running the work")))
            }
        }
    }
}

fn unwrap_outcome<T>(outcome: Result<T, Box<dyn Any + Send>>) -> AppResult<T> {
    outcome.map_err(|payload| AppError::from_panic("The submitted work panicked", payload))
}

/// Strictly serial executor backed by one worker thread
pub struct AsyncTaskExecutor {
    name: String,
    sender: Mutex<Option<Sender<Job>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    worker_id: ThreadId,
}

impl AsyncTaskExecutor {
    /// Start the worker thread
    pub fn new<S: Into<String>>(name: S) -> AppResult<Self> {
        let name = name.into();
        let (sender, receiver) = crossbeam_channel::unbounded::<Job>();
        let worker = thread::Builder::new()
            .name(name.clone())
            .spawn(move || {
                for job in receiver.iter() {
                    job();
                }
            })
            .map_err(|e| AppError::io(format!("Could not start the worker '{}'", name), e))?;
        debug!("Started the worker '{}'", name);

        Ok(Self {
            worker_id: worker.thread().id(),
            name,
            sender: Mutex::new(Some(sender)),
            worker: Mutex::new(Some(worker)),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Queue `work` behind every previously submitted closure.
    ///
    /// Fails with [`AppError::Rejected`] once the executor has been stopped.
    pub fn submit<T, F>(&self, work: F) -> AppResult<TaskFuture<T>>
    where
        T: Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        let guard = self.sender.lock();
        let sender = guard
            .as_ref()
            .ok_or_else(|| AppError::rejected(format!("The executor '{}' has been stopped", self.name)))?;

        let (result_tx, result_rx) = crossbeam_channel::bounded(1);
        let job: Job = Box::new(move || {
            let outcome = panic::catch_unwind(AssertUnwindSafe(work));
            // The caller may have dropped its future
            let _ = result_tx.send(outcome);
        });
        sender
            .send(job)
            .map_err(|_| AppError::rejected(format!("The worker '{}' is gone", self.name)))?;
        Ok(TaskFuture { receiver: result_rx })
    }

    /// Refuse further submissions; queued work still runs.
    ///
    /// Returns `false` when the executor was already stopped.
    pub fn stop(&self) -> bool {
        let stopped = self.sender.lock().take().is_some();
        if stopped {
            debug!("Stopped the worker '{}'", self.name);
        }
        stopped
    }

    pub fn is_stopped(&self) -> bool {
        self.sender.lock().is_none()
    }

    /// Whether the calling thread is the worker itself
    pub fn is_worker_thread(&self) -> bool {
        thread::current().id() == self.worker_id
    }

    /// Stop the executor and wait for the queued work to drain.
    ///
    /// Does not wait when called from the worker thread.
    pub fn join(&self) {
        self.stop();
        if self.is_worker_thread() {
            return;
        }
        let worker = self.worker.lock().take();
        if let Some(worker) = worker {
            if worker.join().is_err() {
                warn!("The worker '{}' terminated abnormally", self.name);
            }
        }
    }
}

impl Drop for AsyncTaskExecutor {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for AsyncTaskExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsyncTaskExecutor")
            .field("name", &self.name)
            .field("stopped", &self.is_stopped())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_submit_returns_value() {
        let executor = AsyncTaskExecutor::new("test-worker").unwrap();
        let future = executor.submit(|| 21 * 2).unwrap();
        assert_eq!(future.wait().unwrap(), 42);
    }

    #[test]
    fn test_work_runs_serially_in_order() {
        let executor = AsyncTaskExecutor::new("serial").unwrap();
        let running = Arc::new(AtomicUsize::new(0));
        let order = Arc::new(Mutex::new(Vec::new()));

        let futures: Vec<_> = (0..5)
            .map(|index| {
                let running = Arc::clone(&running);
                let order = Arc::clone(&order);
                executor
                    .submit(move || {
                        let overlapping = running.fetch_add(1, Ordering::SeqCst);
                        thread::sleep(Duration::from_millis(5));
                        order.lock().push(index);
                        running.fetch_sub(1, Ordering::SeqCst);
                        overlapping
                    })
                    .unwrap()
            })
            .collect();

        for future in futures {
            assert_eq!(future.wait().unwrap(), 0);
        }
        assert_eq!(*order.lock(), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_stop_rejects_new_work_but_drains_queue() {
        let executor = AsyncTaskExecutor::new("drain").unwrap();
        let queued = executor
            .submit(|| {
                thread::sleep(Duration::from_millis(20));
                "done"
            })
            .unwrap();
        assert!(executor.stop());
        assert!(!executor.stop());
        assert!(executor.is_stopped());

        let error = executor.submit(|| ()).unwrap_err();
        assert!(matches!(error, AppError::Rejected { .. }));
        assert_eq!(queued.wait().unwrap(), "done");
    }

    #[test]
    fn test_panicking_work_is_reported() {
        let executor = AsyncTaskExecutor::new("panicky").unwrap();
        let future = executor.submit(|| -> u8 { panic!("worker boom") }).unwrap();
        let error = future.wait().unwrap_err();
        assert!(matches!(error, AppError::Application { .. }));

        // The worker survives
        assert_eq!(executor.submit(|| 7).unwrap().wait().unwrap(), 7);
    }

    #[test]
    fn test_join_from_worker_does_not_deadlock() {
        let executor = Arc::new(AsyncTaskExecutor::new("self-join").unwrap());
        let inner = Arc::clone(&executor);
        let future = executor
            .submit(move || {
                inner.join();
                inner.is_worker_thread()
            })
            .unwrap();
        assert!(future.wait().unwrap());
        assert!(executor.is_stopped());
        executor.join();
    }

    #[test]
    fn test_wait_timeout() {
        let executor = AsyncTaskExecutor::new("timeout").unwrap();
        let future = executor
            .submit(|| thread::sleep(Duration::from_millis(50)))
            .unwrap();
        assert!(future.wait_timeout(Duration::from_millis(1)).is_none());
        assert!(future.wait_timeout(Duration::from_secs(5)).unwrap().is_ok());
    }
}
