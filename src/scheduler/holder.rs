//! Job holder and the fire-time ordering rule.
//!
//! A [`JobHolder`] binds a job, its schedule, and its execution context
//! under a stable process-unique id. The queue orders holders by
//! [`FireKey`]: earliest fire time first, holders with no fire time last,
//! ascending id as the final tie-break so distinct jobs with identical
//! fire times are never collapsed by the ordered set.

use std::cmp::Ordering;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};

use crate::core::context::JobContext;
use crate::core::job::Job;
use crate::core::schedule::Schedule;

static NEXT_HOLDER_ID: AtomicU64 = AtomicU64::new(1);

/// Binding of a job, its schedule, and its execution context.
///
/// Holders are identified by a strictly increasing per-process id, used
/// solely as a deterministic ordering tie-break. Unschedule lookups match
/// by the wrapped job's own equality ([`Job::matches`]), not by id.
///
/// The schedule sits behind the holder's own lock and is only mutated
/// while the holder is out of the queue (at registration and after an
/// execution completes), so a queued entry's ordering key never shifts
/// under the ordered set.
pub struct JobHolder {
    id: u64,
    job: Arc<dyn Job>,
    context: JobContext,
    schedule: Mutex<Box<dyn Schedule>>,
}

impl JobHolder {
    pub(crate) fn new(job: Arc<dyn Job>, schedule: Box<dyn Schedule>, context: JobContext) -> Self {
        Self {
            id: NEXT_HOLDER_ID.fetch_add(1, AtomicOrdering::Relaxed),
            job,
            context,
            schedule: Mutex::new(schedule),
        }
    }

    /// The holder's process-unique id.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// The wrapped job.
    pub fn job(&self) -> &dyn Job {
        self.job.as_ref()
    }

    /// The job's execution context.
    pub fn context(&self) -> &JobContext {
        &self.context
    }

    /// When the job next fires, or `None` once the schedule terminated.
    pub fn next_fire_time(&self) -> Option<DateTime<Utc>> {
        self.lock_schedule().next_fire_time()
    }

    /// The instant used to compute the current next fire time.
    pub fn previous_fire_time(&self) -> Option<DateTime<Utc>> {
        self.lock_schedule().previous_fire_time()
    }

    /// Completed fires of the wrapped schedule.
    pub fn times_run(&self) -> u32 {
        self.lock_schedule().times_run()
    }

    /// The schedule's configured retry budget.
    pub fn retry_attempts(&self) -> u32 {
        self.lock_schedule().retry_attempts()
    }

    /// Instant the wrapped schedule was constructed.
    pub fn created_on(&self) -> DateTime<Utc> {
        self.lock_schedule().created_on()
    }

    /// Arm the schedule. Called once, at registration.
    pub(crate) fn arm(&self) {
        self.lock_schedule().set_initial_fire_time();
    }

    /// Advance the schedule past a completed fire.
    pub(crate) fn advance_schedule(&self) {
        self.lock_schedule().set_next_fire_time();
    }

    pub(crate) fn fire_key(&self) -> FireKey {
        FireKey {
            fire_time: self.next_fire_time(),
            id: self.id,
        }
    }

    fn lock_schedule(&self) -> MutexGuard<'_, Box<dyn Schedule>> {
        self.schedule
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl std::fmt::Debug for JobHolder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobHolder")
            .field("id", &self.id)
            .field("job", &self.job.name())
            .field("next_fire_time", &self.next_fire_time())
            .finish()
    }
}

/// Ordering key for queued holders: `(next_fire_time, id)`.
///
/// A `None` fire time sorts after any concrete time; equal concrete times
/// (or two `None`s) fall through to ascending id. Ids are process-unique,
/// so two keys compare `Equal` only for the same holder, which is what a
/// sorted-set representation requires to avoid silently collapsing
/// distinct jobs that share a fire time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct FireKey {
    pub(crate) fire_time: Option<DateTime<Utc>>,
    pub(crate) id: u64,
}

impl Ord for FireKey {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.fire_time, other.fire_time) {
            (Some(a), Some(b)) => a.cmp(&b).then_with(|| self.id.cmp(&other.id)),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => self.id.cmp(&other.id),
        }
    }
}

impl PartialOrd for FireKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
