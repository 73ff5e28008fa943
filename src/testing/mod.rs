//! Testing utilities for users of the Metronome library.
//!
//! This module provides job helpers for exercising scheduling behavior:
//!
//! - [`CountingJob`]: A job that counts its executions
//! - [`FlakyJob`]: A job that fails N times then succeeds
//! - [`SlowJob`]: A job that sleeps for a fixed duration and tracks how
//!   many copies of itself ran at once

use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;

use crate::core::context::JobContext;
use crate::core::job::{Job, JobError};

/// A job that does nothing but count how many times it has run.
///
/// # Example
///
/// ```
/// use metronome::testing::CountingJob;
///
/// let job = CountingJob::new("heartbeat");
/// assert_eq!(job.count(), 0);
/// ```
pub struct CountingJob {
    name: String,
    count: AtomicU32,
}

impl CountingJob {
    /// Create a counting job.
    pub fn new(name: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            count: AtomicU32::new(0),
        })
    }

    /// Number of completed executions.
    pub fn count(&self) -> u32 {
        self.count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Job for CountingJob {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, _ctx: &JobContext) -> Result<(), JobError> {
        self.count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn description(&self) -> Option<&str> {
        Some("counts executions")
    }
}

/// A job that fails a configurable number of times before succeeding.
///
/// Useful for testing retry logic and fault handling.
///
/// The failure counting is protected by a mutex so the check-and-decrement
/// stays atomic under concurrent execution.
///
/// # Example
///
/// ```
/// use metronome::testing::FlakyJob;
///
/// // Fails 2 times, then succeeds on the 3rd attempt
/// let job = FlakyJob::new("flaky", 2);
/// ```
pub struct FlakyJob {
    name: String,
    state: Mutex<FlakyJobState>,
    total_failures: u32,
    error_message: String,
}

struct FlakyJobState {
    failures_remaining: u32,
    call_count: u32,
}

impl FlakyJob {
    /// Create a job that fails `fail_count` times then succeeds.
    pub fn new(name: impl Into<String>, fail_count: u32) -> Arc<Self> {
        Self::with_error(name, fail_count, "intentional test failure")
    }

    /// Create a job that fails with a custom error message.
    pub fn with_error(
        name: impl Into<String>,
        fail_count: u32,
        message: impl Into<String>,
    ) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            state: Mutex::new(FlakyJobState {
                failures_remaining: fail_count,
                call_count: 0,
            }),
            total_failures: fail_count,
            error_message: message.into(),
        })
    }

    /// Get the number of failures remaining before success.
    ///
    /// Note: This is an async method because it acquires a lock.
    pub async fn failures_remaining(&self) -> u32 {
        self.state.lock().await.failures_remaining
    }

    /// Get the number of times this job has been called.
    ///
    /// Note: This is an async method because it acquires a lock.
    pub async fn call_count(&self) -> u32 {
        self.state.lock().await.call_count
    }

    /// Reset the failure counter for reuse.
    ///
    /// Note: This is an async method because it acquires a lock.
    pub async fn reset(&self) {
        let mut state = self.state.lock().await;
        state.failures_remaining = self.total_failures;
        state.call_count = 0;
    }
}

#[async_trait]
impl Job for FlakyJob {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, _ctx: &JobContext) -> Result<(), JobError> {
        let mut state = self.state.lock().await;
        state.call_count += 1;

        if state.failures_remaining > 0 {
            state.failures_remaining -= 1;
            Err(JobError::ExecutionFailed(self.error_message.clone()))
        } else {
            Ok(())
        }
    }
}

/// A job that sleeps for a fixed duration before completing.
///
/// Tracks the number of copies currently in flight and the highest
/// in-flight count ever observed, which makes it easy to assert that the
/// engine never overlaps fires of the same job.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use metronome::testing::SlowJob;
///
/// let job = SlowJob::new("slow", Duration::from_millis(500));
/// assert_eq!(job.max_in_flight(), 0);
/// ```
pub struct SlowJob {
    name: String,
    duration: Duration,
    in_flight: AtomicU32,
    max_in_flight: AtomicU32,
    completed: AtomicU32,
}

impl SlowJob {
    /// Create a job that sleeps for `duration` on every execution.
    pub fn new(name: impl Into<String>, duration: Duration) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            duration,
            in_flight: AtomicU32::new(0),
            max_in_flight: AtomicU32::new(0),
            completed: AtomicU32::new(0),
        })
    }

    /// Highest number of concurrent executions observed so far.
    pub fn max_in_flight(&self) -> u32 {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// Number of completed executions.
    pub fn completed(&self) -> u32 {
        self.completed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Job for SlowJob {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, _ctx: &JobContext) -> Result<(), JobError> {
        let now_in_flight = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight
            .fetch_max(now_in_flight, Ordering::SeqCst);

        tokio::time::sleep(self.duration).await;

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.completed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
