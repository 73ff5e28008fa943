//! Scheduling engine implementation.
//!
//! The engine owns the time-ordered queue of job holders and runs a
//! single long-lived loop that:
//! - extracts every holder whose schedule says "due now"
//! - dispatches each on its own task, concurrently
//! - reinserts holders after a successful execution (advancing their
//!   schedule) or drops them once their retry budget is exhausted
//! - honors pause/resume and stop requests without losing or duplicating
//!   work
//!
//! A holder is removed from the queue before dispatch and only reinserted
//! after its execution (including retries) fully completes, so two fires
//! of the same job never overlap.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::{Mutex, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::core::context::JobContext;
use crate::core::job::{FnJob, Job, JobError};
use crate::core::schedule::Schedule;

use super::holder::JobHolder;
use super::queue::JobQueue;

/// Errors that can occur when controlling the scheduler.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Pause or resume was requested while the scheduler is stopped.
    #[error("scheduler is not running")]
    NotRunning,
}

/// State of the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    /// Scheduler is stopped.
    Stopped,
    /// Scheduler is running.
    Running,
    /// Scheduler is paused.
    Paused,
}

/// Timing configuration for the scheduler loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// How often the loop polls the queue for due jobs.
    pub tick_interval: Duration,
    /// Upper bound on how long a paused loop sleeps before re-checking
    /// the running flag, so a stop issued while paused is observed
    /// promptly even without a resume signal.
    pub pause_poll_interval: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_millis(250),
            pause_poll_interval: Duration::from_millis(1000),
        }
    }
}

struct EngineInner {
    queue: JobQueue,
    config: SchedulerConfig,
    running: AtomicBool,
    paused: AtomicBool,
    resume: Notify,
    loop_task: Mutex<Option<JoinHandle<()>>>,
}

/// In-process job scheduling engine.
///
/// `Scheduler` is a cheap-clone handle; all clones control the same
/// engine. Register work with [`schedule`](Self::schedule) (or the
/// closure conveniences), then [`start`](Self::start) the loop.
///
/// # Example
///
/// ```ignore
/// use metronome::{PeriodicSchedule, Scheduler};
///
/// #[tokio::main]
/// async fn main() {
///     let scheduler = Scheduler::new();
///     scheduler.schedule_fn(
///         "heartbeat",
///         Box::new(PeriodicSchedule::minutes(5).unwrap()),
///         || async {
///             println!("still alive");
///             Ok(())
///         },
///     );
///     scheduler.start().await;
///     // ... later
///     scheduler.stop().await;
/// }
/// ```
#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<EngineInner>,
}

impl Scheduler {
    /// Create a scheduler with default timing.
    pub fn new() -> Self {
        Self::with_config(SchedulerConfig::default())
    }

    /// Create a scheduler with explicit timing configuration.
    pub fn with_config(config: SchedulerConfig) -> Self {
        Self {
            inner: Arc::new(EngineInner {
                queue: JobQueue::new(),
                config,
                running: AtomicBool::new(false),
                paused: AtomicBool::new(false),
                resume: Notify::new(),
                loop_task: Mutex::new(None),
            }),
        }
    }

    /// Register a job with a fresh execution context.
    ///
    /// The job is wrapped in a holder, its schedule is armed
    /// (`set_initial_fire_time`), and the holder enters the queue. The
    /// call returns immediately; it never waits for the first fire.
    pub fn schedule(&self, job: Arc<dyn Job>, schedule: Box<dyn Schedule>) -> Arc<JobHolder> {
        self.schedule_with_context(job, schedule, JobContext::new())
    }

    /// Register a job with a caller-supplied execution context, typically
    /// one carrying completion callbacks.
    pub fn schedule_with_context(
        &self,
        job: Arc<dyn Job>,
        schedule: Box<dyn Schedule>,
        context: JobContext,
    ) -> Arc<JobHolder> {
        let holder = Arc::new(JobHolder::new(job, schedule, context));
        holder.arm();
        self.inner.queue.insert(Arc::clone(&holder));
        info!(
            job = %holder.job().name(),
            holder_id = holder.id(),
            next_fire = ?holder.next_fire_time(),
            "job scheduled"
        );
        holder
    }

    /// Register a plain async closure as a job.
    pub fn schedule_fn<F, Fut>(
        &self,
        name: impl Into<String>,
        schedule: Box<dyn Schedule>,
        f: F,
    ) -> Arc<JobHolder>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), JobError>> + Send + 'static,
    {
        self.schedule(Arc::new(FnJob::new(name, f)), schedule)
    }

    /// Register an async closure that receives the job's execution
    /// context.
    pub fn schedule_fn_with_context<F, Fut>(
        &self,
        name: impl Into<String>,
        schedule: Box<dyn Schedule>,
        f: F,
    ) -> Arc<JobHolder>
    where
        F: Fn(JobContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), JobError>> + Send + 'static,
    {
        self.schedule(Arc::new(FnJob::with_context(name, f)), schedule)
    }

    /// Remove every holder whose wrapped job equals the given job
    /// ([`Job::matches`]). Returns true if anything was removed.
    ///
    /// A job that is mid-execution is not in the queue and is missed by
    /// this call; its holder is reinserted once the execution completes
    /// and must be unscheduled again.
    pub fn unschedule(&self, job: &dyn Job) -> bool {
        let removed = self.inner.queue.remove_matching(job);
        if removed {
            info!(job = %job.name(), "job unscheduled");
        }
        removed
    }

    /// Start the scheduler loop. Idempotent: a second call while running
    /// is a no-op.
    pub async fn start(&self) {
        let mut slot = self.inner.loop_task.lock().await;
        if self.inner.running.load(Ordering::SeqCst) {
            return;
        }
        self.inner.running.store(true, Ordering::SeqCst);
        self.inner.paused.store(false, Ordering::SeqCst);
        let inner = Arc::clone(&self.inner);
        *slot = Some(tokio::spawn(run_loop(inner)));
        info!("scheduler started");
    }

    /// Stop the scheduler loop and wait for it to exit. No-op if not
    /// running. In-flight job executions are not cancelled; only the
    /// intake of new due batches stops.
    pub async fn stop(&self) {
        // The slot lock stays held across the drain: a concurrent start()
        // queues behind it and cannot flip the running flag back on while
        // the old loop is still observing it.
        let mut slot = self.inner.loop_task.lock().await;
        if !self.inner.running.swap(false, Ordering::SeqCst) {
            return;
        }
        // Wake the loop if it is parked in the paused wait.
        self.inner.resume.notify_one();
        if let Some(handle) = slot.take() {
            if handle.await.is_err() {
                warn!("scheduler loop task panicked");
            }
        }
        info!("scheduler stopped");
    }

    /// Pause the loop. Due jobs are held in the queue (or pushed back if
    /// already extracted) until [`resume`](Self::resume).
    pub fn pause(&self) -> Result<(), SchedulerError> {
        if !self.inner.running.load(Ordering::SeqCst) {
            return Err(SchedulerError::NotRunning);
        }
        self.inner.paused.store(true, Ordering::SeqCst);
        info!("scheduler paused");
        Ok(())
    }

    /// Resume a paused loop.
    pub fn resume(&self) -> Result<(), SchedulerError> {
        if !self.inner.running.load(Ordering::SeqCst) {
            return Err(SchedulerError::NotRunning);
        }
        self.inner.paused.store(false, Ordering::SeqCst);
        self.inner.resume.notify_one();
        info!("scheduler resumed");
        Ok(())
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SchedulerState {
        if !self.inner.running.load(Ordering::SeqCst) {
            SchedulerState::Stopped
        } else if self.inner.paused.load(Ordering::SeqCst) {
            SchedulerState::Paused
        } else {
            SchedulerState::Running
        }
    }

    /// Check if the scheduler is running (and not paused).
    pub fn is_running(&self) -> bool {
        self.state() == SchedulerState::Running
    }

    /// Check if the scheduler is paused.
    pub fn is_paused(&self) -> bool {
        self.state() == SchedulerState::Paused
    }

    /// Number of holders currently in the queue. Holders are absent while
    /// their job executes.
    pub fn job_count(&self) -> usize {
        self.inner.queue.len()
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

/// Main scheduler loop.
async fn run_loop(inner: Arc<EngineInner>) {
    debug!("scheduler loop entered");
    while inner.running.load(Ordering::SeqCst) {
        // Paused: bounded wait so a stop without a resume signal is still
        // observed within one poll interval.
        while inner.paused.load(Ordering::SeqCst) && inner.running.load(Ordering::SeqCst) {
            let _ = tokio::time::timeout(
                inner.config.pause_poll_interval,
                inner.resume.notified(),
            )
            .await;
        }
        if !inner.running.load(Ordering::SeqCst) {
            break;
        }

        let due = inner.queue.extract_due(Utc::now());
        dispatch_batch(&inner, due);

        tokio::time::sleep(inner.config.tick_interval).await;
    }
    debug!("scheduler loop exited");
}

/// Dispatch an extracted due batch, re-checking the pause flag first: a
/// pause that arrived between extraction and this point returns the whole
/// batch to the queue, preserving it for the next resume.
fn dispatch_batch(inner: &Arc<EngineInner>, due: Vec<Arc<JobHolder>>) {
    if due.is_empty() {
        return;
    }
    if inner.paused.load(Ordering::SeqCst) {
        debug!(count = due.len(), "pause during extraction, pushing batch back");
        inner.queue.push_back(due);
        return;
    }
    debug!(count = due.len(), "dispatching due jobs");
    for holder in due {
        let inner = Arc::clone(inner);
        tokio::spawn(async move {
            dispatch(inner, holder).await;
        });
    }
}

/// Execute one due holder: run the job, apply its retry budget, and
/// either reinsert the holder or declare the job faulted.
async fn dispatch(inner: Arc<EngineInner>, holder: Arc<JobHolder>) {
    let context = holder.context().clone();
    debug!(job = %holder.job().name(), holder_id = holder.id(), "executing job");

    let first_error = match holder.job().execute(&context).await {
        Ok(()) => {
            complete(&inner, &holder);
            return;
        }
        Err(err) => err,
    };

    let budget = holder.retry_attempts();
    let mut last_error = first_error;
    for attempt in 1..=budget {
        context.set_last_error(&last_error);
        context.increment_retry_attempt();
        debug!(
            job = %holder.job().name(),
            attempt,
            budget,
            error = %last_error,
            "retrying failed job"
        );
        match holder.job().execute(&context).await {
            Ok(()) => {
                complete(&inner, &holder);
                return;
            }
            Err(err) => last_error = err,
        }
    }

    warn!(
        job = %holder.job().name(),
        holder_id = holder.id(),
        error = %last_error,
        "job faulted, retries exhausted"
    );
    context.on_job_faulted(&last_error, &holder);
    // The holder is not reinserted: a faulted job stops firing.
}

fn complete(inner: &EngineInner, holder: &Arc<JobHolder>) {
    holder.context().on_job_executed(holder);
    // Reinsert even if the schedule just terminated; the next iteration
    // prunes it under the queue lock.
    inner.queue.insert(Arc::clone(holder));
}
