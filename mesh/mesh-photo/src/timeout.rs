//! Wall-clock limit for a pipeline run.

use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;

use mesh_io::IoError;
use tracing::{info, warn};

use crate::error::{PipelineError, PipelineResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum Phase {
    #[default]
    Running,
    Cancelled,
    Committed,
}

/// Shared flag telling a running pipeline that its result is unwanted.
///
/// The pipeline checks it before exporting, and publishes its files through
/// [`commit`](Self::commit). Cancelling and committing exclude each other,
/// so a run either publishes a whole bundle or nothing.
#[derive(Debug, Clone, Default)]
pub struct Cancellation(Arc<Mutex<Phase>>);

impl Cancellation {
    /// A flag that is not yet raised.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn phase(&self) -> MutexGuard<'_, Phase> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Raise the flag.
    ///
    /// Waits for a commit in progress. Returns `false` if the run has
    /// already committed its results, which then stand.
    pub fn cancel(&self) -> bool {
        let mut phase = self.phase();
        if *phase == Phase::Committed {
            return false;
        }
        *phase = Phase::Cancelled;
        true
    }

    /// Whether the flag has been raised.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        *self.phase() == Phase::Cancelled
    }

    /// Run `publish` unless the flag is raised, holding off cancellation
    /// until it returns.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Cancelled`] without calling `publish` if the
    /// flag is already raised, otherwise whatever `publish` returns.
    pub fn commit<T>(&self, publish: impl FnOnce() -> PipelineResult<T>) -> PipelineResult<T> {
        let mut phase = self.phase();
        if *phase == Phase::Cancelled {
            return Err(PipelineError::Cancelled);
        }
        let published = publish()?;
        *phase = Phase::Committed;
        Ok(published)
    }
}

/// Run `job` on a worker thread and wait at most `timeout` for it.
///
/// The job receives a [`Cancellation`] that is raised when the limit
/// passes. The worker itself is detached and runs until it next checks
/// the flag; its result is discarded. A job that has already committed
/// when the limit passes is waited for, and its result returned.
///
/// # Errors
///
/// Returns [`PipelineError::Timeout`] if the limit is exceeded,
/// [`PipelineError::WorkerLost`] if the worker panics, and otherwise
/// whatever `job` returns.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use mesh_photo::run_with_timeout;
///
/// let answer = run_with_timeout(Duration::from_secs(5), |_| Ok(42)).unwrap();
/// assert_eq!(answer, 42);
/// ```
pub fn run_with_timeout<T, F>(timeout: Duration, job: F) -> PipelineResult<T>
where
    T: Send + 'static,
    F: FnOnce(&Cancellation) -> PipelineResult<T> + Send + 'static,
{
    let cancel = Cancellation::new();
    let worker_cancel = cancel.clone();
    let (tx, rx) = mpsc::channel();
    thread::Builder::new()
        .name("photo2mesh-worker".to_string())
        .spawn(move || {
            // The receiver is gone after a timeout
            let _ = tx.send(job(&worker_cancel));
        })
        .map_err(IoError::from)?;

    match rx.recv_timeout(timeout) {
        Ok(result) => result,
        Err(RecvTimeoutError::Timeout) => {
            if !cancel.cancel() {
                info!("Limit reached after the outputs were committed");
                return rx.recv().unwrap_or_else(|_| Err(PipelineError::WorkerLost));
            }
            warn!(seconds = timeout.as_secs_f64(), "Pipeline timed out");
            Err(PipelineError::Timeout {
                seconds: timeout.as_secs_f64(),
            })
        }
        Err(RecvTimeoutError::Disconnected) => Err(PipelineError::WorkerLost),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use super::*;

    #[test]
    fn returns_job_result() {
        assert_eq!(run_with_timeout(Duration::from_secs(5), |_| Ok("done")).unwrap(), "done");
    }

    #[test]
    fn passes_job_errors_through() {
        let result: PipelineResult<()> = run_with_timeout(Duration::from_secs(5), |_| {
            Err(PipelineError::DegenerateGeometry { stage: "test" })
        });
        assert!(matches!(result, Err(PipelineError::DegenerateGeometry { stage: "test" })));
    }

    #[test]
    fn slow_job_times_out() {
        let result = run_with_timeout(Duration::from_millis(20), |_| {
            thread::sleep(Duration::from_millis(500));
            Ok(())
        });
        match result {
            Err(PipelineError::Timeout { seconds }) => assert_eq!(seconds, 0.02),
            other => panic!("expected timeout, got {other:?}"),
        }
    }

    #[test]
    fn timeout_raises_the_flag() {
        let (tx, rx) = mpsc::channel();
        let result = run_with_timeout(Duration::from_millis(20), move |cancel| {
            let cancel = cancel.clone();
            while !cancel.is_cancelled() {
                thread::sleep(Duration::from_millis(5));
            }
            tx.send(()).unwrap();
            Ok(())
        });
        assert!(matches!(result, Err(PipelineError::Timeout { .. })));
        assert!(rx.recv_timeout(Duration::from_secs(5)).is_ok());
    }

    #[test]
    fn commit_in_progress_outlasts_the_limit() {
        let result = run_with_timeout(Duration::from_millis(100), |cancel| {
            cancel.commit(|| {
                thread::sleep(Duration::from_millis(400));
                Ok("published")
            })
        });
        assert_eq!(result.unwrap(), "published");
    }

    #[test]
    fn cancelled_flag_blocks_commit() {
        let cancel = Cancellation::new();
        assert!(cancel.cancel());
        assert!(cancel.is_cancelled());

        let mut called = false;
        let result = cancel.commit(|| {
            called = true;
            Ok(())
        });
        assert!(matches!(result, Err(PipelineError::Cancelled)));
        assert!(!called);
    }

    #[test]
    fn committed_run_cannot_be_cancelled() {
        let cancel = Cancellation::new();
        cancel.commit(|| Ok(())).unwrap();
        assert!(!cancel.cancel());
        assert!(!cancel.is_cancelled());
    }

    #[test]
    fn failed_commit_can_still_be_cancelled() {
        let cancel = Cancellation::new();
        let result: PipelineResult<()> = cancel.commit(|| Err(PipelineError::WorkerLost));
        assert!(result.is_err());
        assert!(cancel.cancel());
    }

    #[test]
    fn panicking_job_is_reported() {
        let result: PipelineResult<()> =
            run_with_timeout(Duration::from_secs(5), |_| panic!("worker exploded"));
        assert!(matches!(result, Err(PipelineError::WorkerLost)));
    }
}
