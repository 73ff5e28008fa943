//! Lock-guarded ordered queue of job holders.
//!
//! The queue is the single ownership boundary around the mutable ordered
//! set: every read, peek, insert, and removal goes through its lock. The
//! set is keyed by the fire-time ordering rule ([`FireKey`]); entries
//! snapshot their key at insertion, and schedules are only mutated while
//! their holder is out of the queue, so keys stay stable in the set.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::core::job::Job;

use super::holder::{FireKey, JobHolder};

struct QueueEntry {
    key: FireKey,
    holder: Arc<JobHolder>,
}

impl PartialEq for QueueEntry {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for QueueEntry {}

impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueueEntry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.key.cmp(&other.key)
    }
}

/// Time-ordered set of job holders, guarded by a single lock.
pub(crate) struct JobQueue {
    entries: Mutex<BTreeSet<QueueEntry>>,
}

impl JobQueue {
    pub(crate) fn new() -> Self {
        Self {
            entries: Mutex::new(BTreeSet::new()),
        }
    }

    /// Insert a holder keyed by its current next fire time.
    pub(crate) fn insert(&self, holder: Arc<JobHolder>) {
        let entry = QueueEntry {
            key: holder.fire_key(),
            holder,
        };
        self.lock().insert(entry);
    }

    /// Move every holder due at `now` out of the queue, earliest first.
    ///
    /// Holders whose schedule has terminated (no next fire time) are
    /// pruned permanently along the way.
    pub(crate) fn extract_due(&self, now: DateTime<Utc>) -> Vec<Arc<JobHolder>> {
        let mut entries = self.lock();
        let mut due = Vec::new();
        loop {
            let earliest = match entries.first() {
                Some(entry) => entry.key,
                None => break,
            };
            match earliest.fire_time {
                Some(fire_time) if fire_time > now => break,
                Some(_) => {
                    if let Some(entry) = entries.pop_first() {
                        due.push(entry.holder);
                    }
                }
                None => {
                    if let Some(entry) = entries.pop_first() {
                        debug!(
                            job = %entry.holder.job().name(),
                            holder_id = entry.holder.id(),
                            "pruning terminated schedule"
                        );
                    }
                }
            }
        }
        due
    }

    /// Return extracted holders to the queue, e.g. when a pause arrived
    /// between extraction and dispatch.
    pub(crate) fn push_back(&self, holders: Vec<Arc<JobHolder>>) {
        let mut entries = self.lock();
        for holder in holders {
            let entry = QueueEntry {
                key: holder.fire_key(),
                holder,
            };
            entries.insert(entry);
        }
    }

    /// Remove every holder whose wrapped job matches the given job.
    /// Returns true if anything was removed.
    pub(crate) fn remove_matching(&self, job: &dyn Job) -> bool {
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|entry| !entry.holder.job().matches(job));
        entries.len() < before
    }

    pub(crate) fn len(&self) -> usize {
        self.lock().len()
    }

    #[cfg(test)]
    pub(crate) fn contains(&self, holder: &JobHolder) -> bool {
        self.lock().iter().any(|e| e.holder.id() == holder.id())
    }

    fn lock(&self) -> MutexGuard<'_, BTreeSet<QueueEntry>> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
