//! Common test utilities shared across integration tests.

use chrono::{Duration as ChronoDuration, Utc};
use metronome::{PeriodUnit, PeriodicSchedule, Schedule, Scheduler, SchedulerConfig};
use std::time::Duration;

/// A scheduler with a short tick so tests observe fires quickly.
pub fn fast_scheduler() -> Scheduler {
    Scheduler::with_config(SchedulerConfig {
        tick_interval: Duration::from_millis(20),
        pause_poll_interval: Duration::from_millis(20),
    })
}

/// A one-second periodic schedule whose first fire is already due.
pub fn due_schedule() -> Box<dyn Schedule> {
    due_schedule_with(|b| b)
}

/// Like [`due_schedule`] but lets the test tweak the builder, e.g. to set
/// `retry_attempts` or `max_repeats`.
pub fn due_schedule_with(
    f: impl FnOnce(metronome::PeriodicScheduleBuilder) -> metronome::PeriodicScheduleBuilder,
) -> Box<dyn Schedule> {
    let builder = PeriodicSchedule::builder(PeriodUnit::Seconds)
        .first_fire_time(Utc::now() - ChronoDuration::seconds(1));
    Box::new(f(builder).build().unwrap())
}

/// Wait for a condition to become true, polling every 10ms.
///
/// This is more reliable than fixed sleeps since execution time can vary.
///
/// # Panics
///
/// Panics if the timeout is reached before the condition holds.
pub async fn wait_until(what: &str, timeout: Duration, mut condition: impl FnMut() -> bool) {
    let start = tokio::time::Instant::now();
    loop {
        if condition() {
            return;
        }
        if start.elapsed() > timeout {
            panic!("Timeout waiting for {what}");
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
