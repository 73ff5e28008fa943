//! Periodic firing integration tests.
//!
//! Verify interval repetition, termination via max_repeats, holder state
//! after fires, completion callbacks, and that fires of one job never
//! overlap while distinct jobs run concurrently.

use metronome::testing::{CountingJob, SlowJob};
use metronome::JobContext;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use crate::common::{due_schedule, due_schedule_with, fast_scheduler, wait_until};

#[tokio::test]
async fn test_job_fires_repeatedly_on_interval() {
    let scheduler = fast_scheduler();
    let job = CountingJob::new("ticker");
    scheduler.schedule(job.clone(), due_schedule());

    scheduler.start().await;
    wait_until("two fires one second apart", Duration::from_secs(4), || {
        job.count() >= 2
    })
    .await;
    scheduler.stop().await;
}

#[tokio::test]
async fn test_max_repeats_terminates_and_prunes_job() {
    let scheduler = fast_scheduler();
    let job = CountingJob::new("one_shot");
    let holder = scheduler.schedule(job.clone(), due_schedule_with(|b| b.max_repeats(1)));

    scheduler.start().await;
    wait_until("single fire", Duration::from_secs(2), || job.count() == 1).await;
    wait_until("terminated holder pruned", Duration::from_secs(2), || {
        scheduler.job_count() == 0
    })
    .await;

    // Extra loop iterations must not fire the job again.
    tokio::time::sleep(Duration::from_millis(150)).await;
    scheduler.stop().await;

    assert_eq!(job.count(), 1);
    assert_eq!(holder.times_run(), 1);
    assert!(holder.next_fire_time().is_none());
}

#[tokio::test]
async fn test_holder_reflects_fire_history() {
    let scheduler = fast_scheduler();
    let job = CountingJob::new("tracked");
    let holder = scheduler.schedule(job.clone(), due_schedule());

    let armed_at = holder.next_fire_time().expect("schedule should be armed");

    scheduler.start().await;
    wait_until("first fire", Duration::from_secs(2), || holder.times_run() >= 1).await;
    scheduler.stop().await;

    assert_eq!(holder.previous_fire_time(), Some(armed_at));
    let next = holder.next_fire_time().expect("periodic schedule stays armed");
    assert!(next > armed_at);
}

#[tokio::test]
async fn test_executed_callback_runs_per_completion() {
    let scheduler = fast_scheduler();
    let notified = Arc::new(AtomicU32::new(0));
    let notified_clone = Arc::clone(&notified);
    let context = JobContext::builder()
        .on_executed(move |_holder| {
            notified_clone.fetch_add(1, Ordering::SeqCst);
        })
        .build();

    let job = CountingJob::new("observed");
    scheduler.schedule_with_context(job.clone(), due_schedule_with(|b| b.max_repeats(1)), context.clone());

    scheduler.start().await;
    wait_until("executed callback", Duration::from_secs(2), || {
        notified.load(Ordering::SeqCst) == 1
    })
    .await;
    scheduler.stop().await;

    assert_eq!(context.executions(), 1);
}

#[tokio::test]
async fn test_same_job_fires_never_overlap() {
    let scheduler = fast_scheduler();
    // Each execution outlasts the one-second interval, so an engine that
    // reinserted the holder before completion would overlap fires.
    let job = SlowJob::new("long_runner", Duration::from_millis(1300));
    scheduler.schedule(job.clone(), due_schedule());

    scheduler.start().await;
    wait_until("two completions", Duration::from_secs(6), || job.completed() >= 2).await;
    scheduler.stop().await;

    assert_eq!(job.max_in_flight(), 1);
}

#[tokio::test]
async fn test_distinct_due_jobs_dispatch_concurrently() {
    let scheduler = fast_scheduler();
    let a = SlowJob::new("slow_a", Duration::from_millis(400));
    let b = SlowJob::new("slow_b", Duration::from_millis(400));
    scheduler.schedule(a.clone(), due_schedule());
    scheduler.schedule(b.clone(), due_schedule());

    scheduler.start().await;
    // Serial dispatch would need over 800ms; concurrent dispatch finishes
    // both well inside the window.
    wait_until("both slow jobs complete", Duration::from_millis(700), || {
        a.completed() >= 1 && b.completed() >= 1
    })
    .await;
    scheduler.stop().await;
}
