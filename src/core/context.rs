//! Per-job execution context.
//!
//! Each registered job owns one [`JobContext`]. It tracks how many times
//! the job has completed, how many retry attempts have been consumed, and
//! the most recent error, and carries the two completion callbacks the
//! engine invokes: `on_job_executed` after a successful run (advancing the
//! schedule) and `on_job_faulted` once the retry budget is exhausted.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use crate::core::job::JobError;
use crate::scheduler::holder::JobHolder;

/// Callback invoked after each successful execution.
pub type ExecutedCallback = Arc<dyn Fn(&JobHolder) + Send + Sync>;

/// Callback invoked once a job's retry budget is exhausted.
pub type FaultedCallback = Arc<dyn Fn(&JobError, &JobHolder) + Send + Sync>;

struct ContextInner {
    executions: AtomicU32,
    retry_count: AtomicU32,
    last_error: Mutex<Option<String>>,
    on_executed: Option<ExecutedCallback>,
    on_faulted: Option<FaultedCallback>,
}

/// Execution context for a single registered job.
///
/// `JobContext` is a cheap-clone handle; all clones observe the same
/// counters and error slot. The engine passes it to [`Job::execute`] on
/// every dispatch.
///
/// [`Job::execute`]: crate::core::job::Job::execute
#[derive(Clone)]
pub struct JobContext {
    inner: Arc<ContextInner>,
}

impl JobContext {
    /// Create a context with no completion callbacks.
    pub fn new() -> Self {
        JobContextBuilder::default().build()
    }

    /// Start building a context with completion callbacks.
    pub fn builder() -> JobContextBuilder {
        JobContextBuilder::default()
    }

    /// Number of completed (successful) executions.
    pub fn executions(&self) -> u32 {
        self.inner.executions.load(Ordering::SeqCst)
    }

    /// Number of retry attempts consumed across all dispatches.
    pub fn retry_count(&self) -> u32 {
        self.inner.retry_count.load(Ordering::SeqCst)
    }

    /// Record one retry attempt.
    pub fn increment_retry_attempt(&self) {
        self.inner.retry_count.fetch_add(1, Ordering::SeqCst);
    }

    /// The most recent error recorded for this job, if any.
    pub fn last_error(&self) -> Option<String> {
        self.lock_error().clone()
    }

    /// Record the most recent error.
    pub fn set_last_error(&self, err: &JobError) {
        *self.lock_error() = Some(err.to_string());
    }

    /// Invoked by the engine after a successful execution.
    ///
    /// Advances the holder's schedule to its next fire time, bumps the
    /// execution counter, and then runs the caller-supplied executed
    /// callback, if any.
    pub fn on_job_executed(&self, holder: &JobHolder) {
        holder.advance_schedule();
        self.inner.executions.fetch_add(1, Ordering::SeqCst);
        if let Some(callback) = &self.inner.on_executed {
            callback(holder);
        }
    }

    /// Invoked by the engine once all retries are exhausted.
    ///
    /// Records the final error and runs the caller-supplied faulted
    /// callback, if any. The engine does not reinsert the holder after
    /// this call; the job stops firing.
    pub fn on_job_faulted(&self, err: &JobError, holder: &JobHolder) {
        self.set_last_error(err);
        if let Some(callback) = &self.inner.on_faulted {
            callback(err, holder);
        }
    }

    fn lock_error(&self) -> std::sync::MutexGuard<'_, Option<String>> {
        self.inner
            .last_error
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for JobContext {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for JobContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobContext")
            .field("executions", &self.executions())
            .field("retry_count", &self.retry_count())
            .field("last_error", &self.last_error())
            .finish()
    }
}

/// Builder for [`JobContext`].
#[derive(Default)]
pub struct JobContextBuilder {
    on_executed: Option<ExecutedCallback>,
    on_faulted: Option<FaultedCallback>,
}

impl JobContextBuilder {
    /// Set the callback invoked after each successful execution.
    pub fn on_executed<F>(mut self, f: F) -> Self
    where
        F: Fn(&JobHolder) + Send + Sync + 'static,
    {
        self.on_executed = Some(Arc::new(f));
        self
    }

    /// Set the callback invoked once a job's retries are exhausted.
    pub fn on_faulted<F>(mut self, f: F) -> Self
    where
        F: Fn(&JobError, &JobHolder) + Send + Sync + 'static,
    {
        self.on_faulted = Some(Arc::new(f));
        self
    }

    /// Build the context.
    pub fn build(self) -> JobContext {
        JobContext {
            inner: Arc::new(ContextInner {
                executions: AtomicU32::new(0),
                retry_count: AtomicU32::new(0),
                last_error: Mutex::new(None),
                on_executed: self.on_executed,
                on_faulted: self.on_faulted,
            }),
        }
    }
}
