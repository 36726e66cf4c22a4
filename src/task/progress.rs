//! Progress Sinks
//!
//! Consumers of [`TaskEvent`]s. A sink is attached to a task through
//! [`attach`], which drains the task's event channel on a dedicated thread
//! until the task finishes.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use log::{info, warn};

use super::{TaskEvent, TaskHandle};
use crate::core::error::{AppError, AppResult};

/// Progress value reported when done/max do not describe a valid fraction
pub const INDETERMINATE: f64 = -1.0;

/// Progress fraction of a task.
///
/// The quotient is computed with integer division before widening, so any
/// `done < max` reports `0.0` and only completed work reports `1.0`.
pub fn progress_fraction(done: i64, max: i64) -> f64 {
    if done >= 0 && done <= max && max > 0 {
        (done / max) as f64
    } else {
        INDETERMINATE
    }
}

/// Observer of task progress
pub trait ProgressSink: Send + Sync {
    /// Called once before any other notification, with a handle that can cancel the task
    fn started(&self, _task: &TaskHandle) {}

    fn update_progress(&self, task: &str, done: i64, max: i64);

    fn update_message(&self, task: &str, message: &str);

    fn canceled(&self, task: &str);

    fn finished(&self, _task: &str) {}
}

/// Sink writing every notification to the log
#[derive(Debug, Default, Clone, Copy)]
pub struct LogProgress;

impl ProgressSink for LogProgress {
    fn update_progress(&self, task: &str, done: i64, max: i64) {
        info!("Task '{}': {}", task, describe_progress(done, max));
    }

    fn update_message(&self, task: &str, message: &str) {
        info!("Task '{}': {}", task, message);
    }

    fn canceled(&self, task: &str) {
        info!("The task '{}' has been canceled", task);
    }
}

fn describe_progress(done: i64, max: i64) -> String {
    let fraction = progress_fraction(done, max);
    if fraction == INDETERMINATE {
        format!("{} out of {} has been done", done, max)
    } else {
        format!("{} out of {} has been done ({:.0}%)", done, max, fraction * 100.0)
    }
}

/// Running listener forwarding task events to a sink
#[derive(Debug)]
pub struct ProgressListener {
    handle: Option<JoinHandle<()>>,
}

impl ProgressListener {
    /// Wait until every event of the task has been delivered to the sink
    pub fn join(mut self) {
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("A progress sink panicked while handling task events");
            }
        }
    }
}

/// Forward the events of `task` to `sink` on a dedicated thread.
///
/// The subscription is taken before this returns, so no event emitted
/// afterwards can be missed.
pub fn attach(task: TaskHandle, sink: Arc<dyn ProgressSink>) -> AppResult<ProgressListener> {
    let events = task.subscribe();
    let thread_name = format!("progress-{}", task.name());
    let handle = thread::Builder::new()
        .name(thread_name)
        .spawn(move || {
            sink.started(&task);
            let name = task.name().to_string();
            // Release the handle so the channel disconnects once the task is gone
            drop(task);
            for event in events.iter() {
                match event {
                    TaskEvent::Progress { done, max } => sink.update_progress(&name, done, max),
                    TaskEvent::Message(message) => sink.update_message(&name, &message),
                    TaskEvent::Canceled => sink.canceled(&name),
                    TaskEvent::Finished => {
                        sink.finished(&name);
                        break;
                    }
                }
            }
        })
        .map_err(|e| AppError::io("Could not start the progress listener", e))?;

    Ok(ProgressListener { handle: Some(handle) })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::Task;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct RecordingSink {
        lines: Mutex<Vec<String>>,
    }

    impl ProgressSink for RecordingSink {
        fn update_progress(&self, task: &str, done: i64, max: i64) {
            self.lines.lock().push(format!("{}:{}/{}", task, done, max));
        }

        fn update_message(&self, task: &str, message: &str) {
            self.lines.lock().push(format!("{}:{}", task, message));
        }

        fn canceled(&self, task: &str) {
            self.lines.lock().push(format!("{}:canceled", task));
        }

        fn finished(&self, task: &str) {
            self.lines.lock().push(format!("{}:finished", task));
        }
    }

    struct CancelOnStart;

    impl ProgressSink for CancelOnStart {
        fn started(&self, task: &TaskHandle) {
            task.cancel();
        }
        fn update_progress(&self, _task: &str, _done: i64, _max: i64) {}
        fn update_message(&self, _task: &str, _message: &str) {}
        fn canceled(&self, _task: &str) {}
    }

    #[test]
    fn test_fraction_truncates() {
        assert_eq!(progress_fraction(1, 3), 0.0);
        assert_eq!(progress_fraction(2, 3), 0.0);
        assert_eq!(progress_fraction(3, 3), 1.0);
        assert_eq!(progress_fraction(0, 5), 0.0);
    }

    #[test]
    fn test_fraction_indeterminate() {
        assert_eq!(progress_fraction(4, 3), INDETERMINATE);
        assert_eq!(progress_fraction(0, 0), INDETERMINATE);
        assert_eq!(progress_fraction(-1, 3), INDETERMINATE);
        assert_eq!(progress_fraction(1, -3), INDETERMINATE);
    }

    #[test]
    fn test_log_progress_reports_fraction() {
        assert_eq!(describe_progress(1, 3), "1 out of 3 has been done (0%)");
        assert_eq!(describe_progress(3, 3), "3 out of 3 has been done (100%)");
        assert_eq!(describe_progress(5, 3), "5 out of 3 has been done");
    }

    #[test]
    fn test_attach_forwards_all_events() {
        let sink = Arc::new(RecordingSink::default());
        let task = Task::new("copy", |control| {
            control.update_message("copying");
            control.update_progress(1, 2);
            control.update_progress(2, 2);
            Ok(())
        });
        let listener = attach(task.handle(), sink.clone()).unwrap();
        task.execute().unwrap();
        listener.join();

        assert_eq!(
            *sink.lines.lock(),
            vec![
                "copy:copying".to_string(),
                "copy:1/2".to_string(),
                "copy:2/2".to_string(),
                "copy:finished".to_string(),
            ]
        );
    }

    #[test]
    fn test_sink_can_cancel_task() {
        let task: Task<()> = Task::cancelable("wait", |control| {
            for _ in 0..1000 {
                control.checkpoint()?;
                std::thread::sleep(std::time::Duration::from_millis(2));
            }
            Ok(())
        });
        let listener = attach(task.handle(), Arc::new(CancelOnStart)).unwrap();
        let error = task.execute().unwrap_err();
        listener.join();
        assert!(error.is_interrupted());
    }

    #[test]
    fn test_log_progress_accepts_events() {
        let task = Task::new("logged", |control| {
            control.update_message("hello");
            control.update_progress(1, 1);
            Ok(())
        });
        let listener = attach(task.handle(), Arc::new(LogProgress)).unwrap();
        task.execute().unwrap();
        listener.join();
    }
}
