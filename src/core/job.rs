//! Job trait and error types.
//!
//! The `Job` trait is the unit of work handed to the scheduling engine.
//! Implement it directly, or wrap a plain async closure with [`FnJob`].

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use super::context::JobContext;

/// Errors that can occur during job execution.
#[derive(Debug, Error)]
pub enum JobError {
    /// Job execution failed with a message.
    #[error("execution failed: {0}")]
    ExecutionFailed(String),

    /// Generic error wrapper.
    #[error(transparent)]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

/// The core trait for schedulable units of work.
///
/// A job is executed against its [`JobContext`] each time its schedule
/// fires. Jobs must be safe to share across tasks; the engine guarantees
/// that two fires of the same registered job never overlap.
///
/// # Example
///
/// ```ignore
/// use metronome::{Job, JobContext, JobError};
/// use async_trait::async_trait;
///
/// struct Heartbeat;
///
/// #[async_trait]
/// impl Job for Heartbeat {
///     fn name(&self) -> &str {
///         "heartbeat"
///     }
///
///     async fn execute(&self, _ctx: &JobContext) -> Result<(), JobError> {
///         // ping something
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait Job: Send + Sync {
    /// Returns the name identifying this job.
    fn name(&self) -> &str;

    /// Execute the job.
    ///
    /// # Returns
    /// * `Ok(())` - Job completed successfully
    /// * `Err(JobError)` - Job failed; the engine applies the schedule's
    ///   retry budget before declaring the job faulted
    async fn execute(&self, ctx: &JobContext) -> Result<(), JobError>;

    /// Value equality used by `unschedule` to match registered jobs.
    ///
    /// Default implementation compares by name.
    fn matches(&self, other: &dyn Job) -> bool {
        self.name() == other.name()
    }

    /// Optional description for display/logging purposes.
    fn description(&self) -> Option<&str> {
        None
    }
}

/// Boxed future returned by the closures wrapped in [`FnJob`].
pub type JobFuture = Pin<Box<dyn Future<Output = Result<(), JobError>> + Send>>;

/// Adapter that turns a plain async closure into a [`Job`].
///
/// Two flavors are supported: a closure taking no arguments
/// ([`FnJob::new`]) and a closure receiving the job's [`JobContext`]
/// ([`FnJob::with_context`]). Equality for unschedule matching is by name.
pub struct FnJob {
    name: String,
    func: Arc<dyn Fn(JobContext) -> JobFuture + Send + Sync>,
}

impl FnJob {
    /// Wrap a plain async closure that ignores the execution context.
    pub fn new<F, Fut>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), JobError>> + Send + 'static,
    {
        Self {
            name: name.into(),
            func: Arc::new(move |_ctx| Box::pin(f()) as JobFuture),
        }
    }

    /// Wrap an async closure that receives the job's execution context.
    pub fn with_context<F, Fut>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(JobContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), JobError>> + Send + 'static,
    {
        Self {
            name: name.into(),
            func: Arc::new(move |ctx| Box::pin(f(ctx)) as JobFuture),
        }
    }
}

#[async_trait]
impl Job for FnJob {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, ctx: &JobContext) -> Result<(), JobError> {
        (self.func)(ctx.clone()).await
    }
}
