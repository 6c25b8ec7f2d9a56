//! Retry and terminal-failure policy.
//!
//! A failed attempt always increments `retry_count`. Once the count reaches
//! the job's effective limit the job is FAILED; otherwise it goes straight
//! back to PENDING with its original `created_at`, so it keeps its place in
//! the priority-then-age order. There is no delay between attempts beyond the
//! cadence of invocations.

use crate::job::{ActionJob, JobStatus};
use serde::{Deserialize, Serialize};

/// What happens to a job whose handler failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "disposition", rename_all = "snake_case")]
pub enum FailureDisposition {
    /// Back to PENDING for another attempt.
    Retry { retry_count: u32, max_retries: u32 },
    /// Retries exhausted.
    Fail { retry_count: u32 },
}

impl FailureDisposition {
    /// Status the job moves to.
    pub fn status(&self) -> JobStatus {
        match self {
            FailureDisposition::Retry { .. } => JobStatus::Pending,
            FailureDisposition::Fail { .. } => JobStatus::Failed,
        }
    }

    /// `retry_count` after this failure.
    pub fn retry_count(&self) -> u32 {
        match self {
            FailureDisposition::Retry { retry_count, .. } | FailureDisposition::Fail { retry_count } => {
                *retry_count
            }
        }
    }

    /// Returns true if the job is now terminally failed.
    pub fn is_terminal(&self) -> bool {
        matches!(self, FailureDisposition::Fail { .. })
    }
}

/// Retry policy for one invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Invocation-wide cap applied on top of each job's own `max_retries`.
    pub max_retries_cap: u32,
}

impl RetryPolicy {
    /// Creates a policy with the given cap.
    pub fn new(max_retries_cap: u32) -> Self {
        Self { max_retries_cap }
    }

    /// Decides the disposition of a failed attempt on `job` (as claimed).
    pub fn decide(&self, job: &ActionJob) -> FailureDisposition {
        let max_retries = job.effective_max_retries(self.max_retries_cap);
        let retry_count = job.retry_count.saturating_add(1);

        if retry_count >= max_retries {
            FailureDisposition::Fail { retry_count }
        } else {
            FailureDisposition::Retry {
                retry_count,
                max_retries,
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::ActionType;
    use serde_json::json;

    fn job(retry_count: u32, max_retries: u32) -> ActionJob {
        ActionJob::new(ActionType::SettingsUpdate, json!({}))
            .with_retry_count(retry_count)
            .with_max_retries(max_retries)
    }

    #[test]
    fn test_first_failure_retries() {
        let policy = RetryPolicy::new(3);
        assert_eq!(
            policy.decide(&job(0, 3)),
            FailureDisposition::Retry {
                retry_count: 1,
                max_retries: 3
            }
        );
    }

    #[test]
    fn test_last_attempt_fails() {
        let policy = RetryPolicy::new(3);
        let disposition = policy.decide(&job(2, 3));
        assert_eq!(disposition, FailureDisposition::Fail { retry_count: 3 });
        assert_eq!(disposition.status(), JobStatus::Failed);
        assert!(disposition.is_terminal());
    }

    #[test]
    fn test_cap_lowers_job_limit() {
        let policy = RetryPolicy::new(2);
        assert!(policy.decide(&job(1, 5)).is_terminal());
    }

    #[test]
    fn test_job_limit_below_cap() {
        let policy = RetryPolicy::new(10);
        assert!(policy.decide(&job(0, 1)).is_terminal());
    }

    #[test]
    fn test_retry_count_never_exceeds_limit() {
        for max in 1..=6 {
            let policy = RetryPolicy::new(max);
            let mut current = job(0, max);
            let mut attempts = 0;
            loop {
                attempts += 1;
                let d = policy.decide(&current);
                assert!(d.retry_count() <= max);
                if d.is_terminal() {
                    assert_eq!(d.retry_count(), max);
                    break;
                }
                assert_eq!(d.status(), JobStatus::Pending);
                current.retry_count = d.retry_count();
            }
            assert_eq!(attempts, max);
        }
    }
}
