//! Core building blocks: jobs, execution contexts, and schedules.

pub mod context;
pub mod job;
pub mod schedule;
