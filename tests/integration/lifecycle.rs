//! Scheduler lifecycle integration tests.
//!
//! Verify that pause holds due work without losing it, resume releases
//! it, stop is prompt in every state, and unschedule only removes the
//! named job.

use metronome::testing::{CountingJob, SlowJob};
use metronome::{FnJob, SchedulerState};
use std::sync::Arc;
use std::time::Duration;

use crate::common::{due_schedule, fast_scheduler, wait_until};

#[tokio::test]
async fn test_state_follows_lifecycle() {
    let scheduler = fast_scheduler();
    assert_eq!(scheduler.state(), SchedulerState::Stopped);

    scheduler.start().await;
    assert_eq!(scheduler.state(), SchedulerState::Running);

    scheduler.pause().unwrap();
    assert_eq!(scheduler.state(), SchedulerState::Paused);

    scheduler.resume().unwrap();
    assert_eq!(scheduler.state(), SchedulerState::Running);

    scheduler.stop().await;
    assert_eq!(scheduler.state(), SchedulerState::Stopped);
}

#[tokio::test]
async fn test_pause_holds_due_jobs_until_resume() {
    let scheduler = fast_scheduler();
    scheduler.start().await;
    scheduler.pause().unwrap();

    let job = CountingJob::new("held");
    scheduler.schedule(job.clone(), due_schedule());

    // The job is due, but a paused scheduler must not dispatch it.
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(job.count(), 0);
    assert_eq!(scheduler.job_count(), 1);

    scheduler.resume().unwrap();
    wait_until("held job to fire after resume", Duration::from_secs(2), || {
        job.count() >= 1
    })
    .await;

    scheduler.stop().await;
}

#[tokio::test]
async fn test_stop_preserves_queued_jobs() {
    let scheduler = fast_scheduler();
    let job = CountingJob::new("survivor");
    scheduler.schedule(job.clone(), due_schedule());

    scheduler.start().await;
    wait_until("first fire", Duration::from_secs(2), || job.count() >= 1).await;
    scheduler.stop().await;

    // The holder went back into the queue after its run; stopping the
    // loop must not drop it.
    assert_eq!(scheduler.job_count(), 1);
}

#[tokio::test]
async fn test_restart_after_stop_resumes_firing() {
    let scheduler = fast_scheduler();
    let job = CountingJob::new("restarted");
    scheduler.schedule(job.clone(), due_schedule());

    scheduler.start().await;
    wait_until("fire before stop", Duration::from_secs(2), || job.count() >= 1).await;
    scheduler.stop().await;
    let before = job.count();

    scheduler.start().await;
    wait_until("fire after restart", Duration::from_secs(3), || {
        job.count() > before
    })
    .await;
    scheduler.stop().await;
}

#[tokio::test]
async fn test_unschedule_removes_only_named_job() {
    let scheduler = fast_scheduler();
    let keep = CountingJob::new("keep");
    let drop = CountingJob::new("drop");
    scheduler.schedule(keep.clone(), due_schedule());
    scheduler.schedule(drop.clone(), due_schedule());
    assert_eq!(scheduler.job_count(), 2);

    let lookup = FnJob::new("drop", || async { Ok(()) });
    assert!(scheduler.unschedule(&lookup));
    assert_eq!(scheduler.job_count(), 1);

    scheduler.start().await;
    wait_until("kept job to fire", Duration::from_secs(2), || keep.count() >= 1).await;
    scheduler.stop().await;

    assert_eq!(drop.count(), 0);
}

#[tokio::test]
async fn test_unschedule_misses_job_mid_execution() {
    let scheduler = fast_scheduler();
    let job = SlowJob::new("busy", Duration::from_millis(300));
    scheduler.schedule(job.clone(), due_schedule());
    scheduler.start().await;

    // The holder leaves the queue for the whole execution, so a removal
    // issued mid-run finds nothing.
    wait_until("job to be in flight", Duration::from_secs(2), || {
        scheduler.job_count() == 0
    })
    .await;
    let lookup = FnJob::new("busy", || async { Ok(()) });
    assert!(!scheduler.unschedule(&lookup));

    // Completion reinserts the holder; a second removal sticks.
    wait_until("holder to be reinserted", Duration::from_secs(2), || {
        scheduler.job_count() == 1
    })
    .await;
    scheduler.stop().await;
    assert!(scheduler.unschedule(&lookup));
    assert_eq!(scheduler.job_count(), 0);
}

#[tokio::test]
async fn test_scheduler_handle_clones_share_state() {
    let scheduler = fast_scheduler();
    let handle = scheduler.clone();

    let job: Arc<dyn metronome::Job> = CountingJob::new("shared");
    scheduler.schedule(job, due_schedule());
    assert_eq!(handle.job_count(), 1);

    handle.start().await;
    assert_eq!(scheduler.state(), SchedulerState::Running);
    scheduler.stop().await;
    assert_eq!(handle.state(), SchedulerState::Stopped);
}
