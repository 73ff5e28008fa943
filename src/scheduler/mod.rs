//! The scheduling engine and its supporting pieces.

mod engine;
pub mod holder;
pub(crate) mod queue;

pub use engine::{Scheduler, SchedulerConfig, SchedulerError, SchedulerState};
