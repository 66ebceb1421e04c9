//! Offloads one check onto a dedicated thread.
//!
//! The thread owns its copy of the encoded buffers and reports through a
//! oneshot channel. Cancellation stops waiting immediately; the thread is
//! detached and whatever it produces afterwards is discarded.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use tokio::sync::oneshot;
use tracing::warn;

use crate::abort::AbortSignal;
use crate::error::{Result, ReviewError};

pub struct CheckWorker<T> {
    name: String,
    rx: oneshot::Receiver<std::thread::Result<T>>,
}

impl<T: Send + 'static> CheckWorker<T> {
    pub fn spawn<F>(name: &str, job: F) -> Result<Self>
    where
        F: FnOnce() -> T + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let thread_name = format!("netreview-{name}");
        std::thread::Builder::new()
            .name(thread_name.clone())
            .spawn(move || {
                let outcome = panic::catch_unwind(AssertUnwindSafe(job));
                // The receiver is gone when the run was cancelled.
                let _ = tx.send(outcome);
            })
            .map_err(ReviewError::WorkerSpawn)?;

        Ok(Self {
            name: thread_name,
            rx,
        })
    }

    /// Waits for the result, or for `signal` to abort.
    pub async fn join(mut self, signal: Option<&AbortSignal>) -> Result<T> {
        let outcome = match signal {
            Some(signal) => {
                tokio::select! {
                    biased;
                    _ = signal.aborted() => {
                        warn!(worker = %self.name, "abandoning review worker after cancellation");
                        return Err(ReviewError::Cancelled);
                    }
                    outcome = &mut self.rx => outcome,
                }
            }
            None => (&mut self.rx).await,
        };

        match outcome {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(payload)) => Err(ReviewError::WorkerFailed(format!(
                "{} panicked: {}",
                self.name,
                panic_message(payload.as_ref())
            ))),
            Err(_) => Err(ReviewError::WorkerFailed(format!(
                "{} exited without a result",
                self.name
            ))),
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
