//! In-memory job store.
//!
//! Each operation runs in one critical section of a `parking_lot` mutex,
//! which gives the same single-statement atomicity the MySQL store gets from
//! conditional updates. Used by the test suite and for local dry runs.

use crate::error::{JobError, JobResult};
use crate::health::HealthRecord;
use crate::job::{ActionJob, JobId, JobStatus};
use crate::retry::FailureDisposition;
use crate::store::{JobStore, UnitOfWork};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde_json::Value as JsonValue;
use std::cmp::Reverse;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A side effect committed through a [`MemoryUnit`].
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryEffect {
    pub target: String,
    pub value: JsonValue,
}

#[derive(Default)]
struct MemoryState {
    jobs: BTreeMap<JobId, ActionJob>,
    health: HashMap<(String, String), HealthRecord>,
    effects: Vec<MemoryEffect>,
    next_id: i64,
}

/// Moves `job` to `next`, which must be an edge of the job state machine.
fn transition(job: &mut ActionJob, next: JobStatus) {
    debug_assert!(
        job.status.can_transition_to(next),
        "illegal transition {} -> {} for job {}",
        job.status,
        next,
        job.id
    );
    job.status = next;
}

impl MemoryState {
    fn holds_claim(&self, claimed: &ActionJob) -> bool {
        self.jobs.get(&claimed.id).is_some_and(|job| {
            job.status == JobStatus::Processing
                && job.started_at == claimed.started_at
                && job.retry_count == claimed.retry_count
        })
    }
}

/// In-memory [`JobStore`].
#[derive(Clone)]
pub struct MemoryJobStore {
    state: Arc<Mutex<MemoryState>>,
    available: Arc<AtomicBool>,
    fail_commits: Arc<AtomicBool>,
    fail_claims: Arc<AtomicBool>,
    fail_begins: Arc<AtomicBool>,
}

impl MemoryJobStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MemoryState::default())),
            available: Arc::new(AtomicBool::new(true)),
            fail_commits: Arc::new(AtomicBool::new(false)),
            fail_claims: Arc::new(AtomicBool::new(false)),
            fail_begins: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Inserts a job as an enqueuer would, assigning its id.
    pub fn insert(&self, mut job: ActionJob) -> JobId {
        let mut state = self.state.lock();
        state.next_id += 1;
        let id = JobId(state.next_id);
        job.id = id;
        state.jobs.insert(id, job);
        id
    }

    /// Returns a snapshot of one job.
    pub fn get(&self, id: JobId) -> Option<ActionJob> {
        self.state.lock().jobs.get(&id).cloned()
    }

    /// Returns a snapshot of every job, by id.
    pub fn jobs(&self) -> Vec<ActionJob> {
        self.state.lock().jobs.values().cloned().collect()
    }

    /// Counts jobs in a status.
    pub fn count_status(&self, status: JobStatus) -> usize {
        self.state
            .lock()
            .jobs
            .values()
            .filter(|job| job.status == status)
            .count()
    }

    /// Every stored health record.
    pub fn health_records(&self) -> Vec<HealthRecord> {
        self.state.lock().health.values().cloned().collect()
    }

    /// Side effects committed by handlers so far.
    pub fn committed_effects(&self) -> Vec<MemoryEffect> {
        self.state.lock().effects.clone()
    }

    /// Simulates the store going away (every operation fails).
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Makes every unit commit fail.
    pub fn set_fail_commits(&self, fail: bool) {
        self.fail_commits.store(fail, Ordering::SeqCst);
    }

    /// Makes every claim fail with a store error.
    pub fn set_fail_claims(&self, fail: bool) {
        self.fail_claims.store(fail, Ordering::SeqCst);
    }

    /// Makes opening a unit of work fail.
    pub fn set_fail_begins(&self, fail: bool) {
        self.fail_begins.store(fail, Ordering::SeqCst);
    }

    fn check_available(&self) -> JobResult<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(JobError::Persistence("memory store unavailable".to_string()))
        }
    }
}

impl Default for MemoryJobStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    type Unit = MemoryUnit;

    async fn ping(&self) -> JobResult<()> {
        self.check_available()
    }

    async fn recover_stuck(&self, cutoff: DateTime<Utc>) -> JobResult<u64> {
        self.check_available()?;
        let mut state = self.state.lock();
        let mut reset = 0;
        for job in state.jobs.values_mut() {
            if job.status == JobStatus::Processing && job.started_at.is_some_and(|t| t < cutoff) {
                transition(job, JobStatus::Pending);
                job.started_at = None;
                reset += 1;
            }
        }
        Ok(reset)
    }

    async fn expire_stale(&self, cutoff: DateTime<Utc>) -> JobResult<u64> {
        self.check_available()?;
        let mut state = self.state.lock();
        let mut expired = 0;
        for job in state.jobs.values_mut() {
            if matches!(job.status, JobStatus::Pending | JobStatus::Failed) && job.created_at < cutoff {
                transition(job, JobStatus::Expired);
                expired += 1;
            }
        }
        Ok(expired)
    }

    async fn select_batch(&self, limit: u32, retry_cap: u32) -> JobResult<Vec<ActionJob>> {
        self.check_available()?;
        let state = self.state.lock();
        let mut eligible: Vec<ActionJob> = state
            .jobs
            .values()
            .filter(|job| job.is_selectable(retry_cap))
            .cloned()
            .collect();
        eligible.sort_by_key(|job| (Reverse(job.priority), job.created_at, job.id));
        eligible.truncate(limit as usize);
        Ok(eligible)
    }

    async fn claim(&self, id: JobId, now: DateTime<Utc>) -> JobResult<bool> {
        self.check_available()?;
        if self.fail_claims.load(Ordering::SeqCst) {
            return Err(JobError::Persistence("claim update failed".to_string()));
        }
        let mut state = self.state.lock();
        match state.jobs.get_mut(&id) {
            Some(job) if job.status == JobStatus::Pending => {
                transition(job, JobStatus::Processing);
                job.started_at = Some(now);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn begin(&self) -> JobResult<MemoryUnit> {
        self.check_available()?;
        if self.fail_begins.load(Ordering::SeqCst) {
            return Err(JobError::Persistence("could not open transaction".to_string()));
        }
        Ok(MemoryUnit {
            state: Arc::clone(&self.state),
            fail_commit: self.fail_commits.load(Ordering::SeqCst),
            completion: None,
            effects: Vec::new(),
        })
    }

    async fn record_failure(
        &self,
        claimed: &ActionJob,
        disposition: &FailureDisposition,
        error: &str,
        now: DateTime<Utc>,
    ) -> JobResult<bool> {
        self.check_available()?;
        let mut state = self.state.lock();
        if !state.holds_claim(claimed) {
            return Ok(false);
        }
        let Some(job) = state.jobs.get_mut(&claimed.id) else {
            return Ok(false);
        };

        job.retry_count = disposition.retry_count();
        job.error_message = Some(error.to_string());
        transition(job, disposition.status());
        match disposition {
            FailureDisposition::Retry { .. } => job.started_at = None,
            FailureDisposition::Fail { .. } => job.completed_at = Some(now),
        }
        Ok(true)
    }

    async fn pending_count(&self) -> JobResult<u64> {
        self.check_available()?;
        Ok(self.count_status(JobStatus::Pending) as u64)
    }

    async fn upsert_health(&self, record: &HealthRecord) -> JobResult<()> {
        self.check_available()?;
        let key = (record.check_type.clone(), record.check_name.clone());
        self.state.lock().health.insert(key, record.clone());
        Ok(())
    }

    async fn latest_health(&self, check_type: &str, check_name: &str) -> JobResult<Option<HealthRecord>> {
        self.check_available()?;
        let key = (check_type.to_string(), check_name.to_string());
        Ok(self.state.lock().health.get(&key).cloned())
    }
}

/// Unit of work over [`MemoryJobStore`]; nothing is visible until commit.
pub struct MemoryUnit {
    state: Arc<Mutex<MemoryState>>,
    fail_commit: bool,
    completion: Option<(ActionJob, JsonValue, DateTime<Utc>)>,
    effects: Vec<MemoryEffect>,
}

impl MemoryUnit {
    /// Stages a handler side effect.
    pub fn record_effect(&mut self, target: impl Into<String>, value: JsonValue) {
        self.effects.push(MemoryEffect {
            target: target.into(),
            value,
        });
    }
}

#[async_trait]
impl UnitOfWork for MemoryUnit {
    async fn complete(&mut self, claimed: &ActionJob, result: &JsonValue, now: DateTime<Utc>) -> JobResult<bool> {
        if !self.state.lock().holds_claim(claimed) {
            return Ok(false);
        }
        self.completion = Some((claimed.clone(), result.clone(), now));
        Ok(true)
    }

    async fn commit(self) -> JobResult<()> {
        if self.fail_commit {
            return Err(JobError::Persistence("commit failed".to_string()));
        }

        let mut state = self.state.lock();
        if let Some((claimed, result, now)) = self.completion {
            if !state.holds_claim(&claimed) {
                return Err(JobError::Persistence(format!(
                    "claim on job {} superseded before commit",
                    claimed.id
                )));
            }
            if let Some(job) = state.jobs.get_mut(&claimed.id) {
                transition(job, JobStatus::Completed);
                job.completed_at = Some(now);
                job.result = Some(result);
            }
        }
        state.effects.extend(self.effects);
        Ok(())
    }

    async fn rollback(self) -> JobResult<()> {
        Ok(())
    }
}
