//! Blocking wait for CloudStack async jobs.
//!
//! Deploy and destroy calls return immediately with a job handle. The
//! resource is only addressable once the job leaves the in-progress state,
//! so callers block here until it does or the timeout expires. A timeout is
//! a failure, never "maybe still pending".

use std::time::Duration;

use thiserror::Error;
use tokio::time::{MissedTickBehavior, interval, timeout};
use tracing::debug;

use crate::control_plane::{AsyncJobResult, ControlPlane, JobId, JobStatus};

/// Default delay between job status queries.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Default upper bound for a single job wait.
pub const DEFAULT_JOB_TIMEOUT: Duration = Duration::from_secs(300);

/// Poll cadence and timeout for async job waits.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct WaitSettings {
    /// Delay between status queries.
    pub poll_interval: Duration,
    /// Maximum time to wait for a terminal status.
    pub timeout: Duration,
}

impl WaitSettings {
    /// Creates settings from an interval and a timeout.
    #[must_use]
    pub const fn new(poll_interval: Duration, timeout: Duration) -> Self {
        Self {
            poll_interval,
            timeout,
        }
    }
}

impl Default for WaitSettings {
    fn default() -> Self {
        Self::new(DEFAULT_POLL_INTERVAL, DEFAULT_JOB_TIMEOUT)
    }
}

/// Errors raised while waiting for an async job.
#[derive(Debug, Error)]
pub enum JobWaitError<E>
where
    E: std::error::Error + 'static,
{
    /// Raised when the job did not finish before the timeout.
    #[error("async job {job_id} did not complete within {timeout:?}")]
    Timeout {
        /// Job being waited on.
        job_id: JobId,
        /// Configured timeout.
        timeout: Duration,
    },
    /// Raised when the job finished with an error status.
    #[error("async job {job_id} failed with code {code}: {message}")]
    Failed {
        /// Job being waited on.
        job_id: JobId,
        /// Result code reported by the control plane.
        code: i64,
        /// Error text reported by the control plane.
        message: String,
    },
    /// Raised when the poll interval is zero.
    #[error("async job {job_id} cannot be polled with a zero interval")]
    ZeroPollInterval {
        /// Job being waited on.
        job_id: JobId,
    },
    /// Raised when a status query itself fails.
    #[error("failed to query async job {job_id}: {source}")]
    Query {
        /// Job being waited on.
        job_id: JobId,
        /// Client error.
        #[source]
        source: E,
    },
}

/// Waits until `job_id` reaches a terminal status.
///
/// The first status query is issued immediately; later queries follow the
/// configured interval. The job handle is consumed: once the wait returns
/// it carries no further meaning.
///
/// # Errors
///
/// Returns [`JobWaitError::Timeout`] when the deadline passes,
/// [`JobWaitError::Failed`] when the job reports failure,
/// [`JobWaitError::ZeroPollInterval`] when `settings` has no poll interval,
/// and [`JobWaitError::Query`] when the status query errors.
pub async fn wait_for_job<C>(
    plane: &C,
    job_id: JobId,
    settings: WaitSettings,
) -> Result<AsyncJobResult, JobWaitError<C::Error>>
where
    C: ControlPlane + ?Sized,
{
    if settings.poll_interval.is_zero() {
        return Err(JobWaitError::ZeroPollInterval { job_id });
    }

    let polled = timeout(
        settings.timeout,
        poll_until_terminal(plane, &job_id, settings.poll_interval),
    )
    .await;

    let result = match polled {
        Ok(Ok(result)) => result,
        Ok(Err(source)) => return Err(JobWaitError::Query { job_id, source }),
        Err(_elapsed) => {
            return Err(JobWaitError::Timeout {
                job_id,
                timeout: settings.timeout,
            });
        }
    };

    if result.status == JobStatus::Failed {
        return Err(JobWaitError::Failed {
            message: result
                .error_text()
                .unwrap_or("no error text reported")
                .to_owned(),
            code: result.result_code,
            job_id,
        });
    }
    Ok(result)
}

async fn poll_until_terminal<C>(
    plane: &C,
    job_id: &JobId,
    poll_interval: Duration,
) -> Result<AsyncJobResult, C::Error>
where
    C: ControlPlane + ?Sized,
{
    let mut ticker = interval(poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut attempts: u32 = 0;

    loop {
        ticker.tick().await;
        attempts = attempts.saturating_add(1);
        let result = plane.query_async_job(job_id).await?;
        if result.status.is_terminal() {
            debug!(job_id = %job_id, attempts, status = ?result.status, "async job finished");
            return Ok(result);
        }
        debug!(job_id = %job_id, attempts, "async job still pending");
    }
}
