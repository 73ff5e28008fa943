//! Metronome is an in-process job scheduling engine built on tokio.
//!
//! Jobs implement the [`Job`] trait (or are plain async closures via
//! [`FnJob`]), schedules describe when they fire, and the [`Scheduler`]
//! runs them: due jobs are dispatched concurrently, failed executions are
//! retried up to their schedule's budget, and exhausted jobs are reported
//! through their [`JobContext`] callbacks.

pub mod core;
pub mod scheduler;
pub mod testing;

pub use crate::core::context::{ExecutedCallback, FaultedCallback, JobContext, JobContextBuilder};
pub use crate::core::job::{FnJob, Job, JobError, JobFuture};
pub use crate::core::schedule::{
    PeriodUnit, PeriodicSchedule, PeriodicScheduleBuilder, Schedule, ScheduleError,
};
pub use crate::scheduler::holder::JobHolder;
pub use crate::scheduler::{Scheduler, SchedulerConfig, SchedulerError, SchedulerState};
