//! Background task supervision and crash reporting.
//!
//! # Responsibilities
//! - Run every listener task in its own tokio task
//! - Collect each task's terminal result (ok, fatal error, panic) over a channel
//! - Forward failures to a crash reporter without touching sibling tasks
//! - Escalate fatal failures to the process-wide shutdown

use std::any::Any;
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::lifecycle::Shutdown;
use crate::observability::metrics;

/// Terminal error returned by a supervised task.
#[derive(Debug, Error)]
pub enum TaskError {
    /// The task hit a condition the service cannot run without.
    #[error("fatal: {0}")]
    Fatal(String),
}

/// How a supervised task ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskFailure {
    /// Returned a fatal error.
    Fatal(String),
    /// Panicked; carries the panic payload when it was a string.
    Panic(String),
}

impl std::fmt::Display for TaskFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskFailure::Fatal(msg) => write!(f, "fatal error: {}", msg),
            TaskFailure::Panic(msg) => write!(f, "panic: {}", msg),
        }
    }
}

/// A failure recovered from a background task.
#[derive(Debug, Clone)]
pub struct CrashReport {
    pub hostname: String,
    pub task: &'static str,
    pub failure: TaskFailure,
}

/// Destination for recovered task failures.
pub trait CrashReporter: Send + Sync + 'static {
    fn report(&self, report: &CrashReport);
}

/// Reports crashes to the log and the failure counter.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogCrashReporter;

impl CrashReporter for LogCrashReporter {
    fn report(&self, report: &CrashReport) {
        tracing::error!(
            hostname = %report.hostname,
            task = report.task,
            failure = %report.failure,
            "Background task failed"
        );
        metrics::record_task_failure(report.task);
    }
}

#[derive(Debug)]
struct TaskExit {
    task: &'static str,
    failure: Option<TaskFailure>,
}

/// Spawns supervised tasks. Cheap to clone.
#[derive(Clone)]
pub struct Supervisor {
    tx: mpsc::UnboundedSender<TaskExit>,
}

impl Supervisor {
    /// Start the collector task. Must be called inside a tokio runtime.
    pub fn start(hostname: String, reporter: Arc<dyn CrashReporter>, shutdown: Shutdown) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<TaskExit>();

        tokio::spawn(async move {
            while let Some(exit) = rx.recv().await {
                let Some(failure) = exit.failure else {
                    tracing::debug!(task = exit.task, "Task finished");
                    continue;
                };
                let fatal = matches!(failure, TaskFailure::Fatal(_));
                reporter.report(&CrashReport {
                    hostname: hostname.clone(),
                    task: exit.task,
                    failure,
                });
                if fatal {
                    shutdown.trigger();
                }
            }
        });

        Self { tx }
    }

    /// Run `fut` as a supervised task.
    ///
    /// The returned handle resolves after the task's result has been
    /// handed to the collector.
    pub fn spawn<F>(&self, task: &'static str, fut: F) -> JoinHandle<()>
    where
        F: Future<Output = Result<(), TaskError>> + Send + 'static,
    {
        let inner = tokio::spawn(fut);
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let failure = match inner.await {
                Ok(Ok(())) => None,
                Ok(Err(TaskError::Fatal(msg))) => Some(TaskFailure::Fatal(msg)),
                Err(e) if e.is_panic() => Some(TaskFailure::Panic(panic_message(e.into_panic()))),
                // Cancelled by runtime shutdown.
                Err(_) => None,
            };
            let _ = tx.send(TaskExit { task, failure });
        })
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
