//! Schedule state machine and the periodic schedule implementation.
//!
//! A schedule moves through three states, implicit in its fields:
//! unarmed (constructed), armed (`next_fire_time` holds an instant), and
//! terminated (`next_fire_time` is `None`, permanently). Arming happens
//! exactly once at registration via [`Schedule::set_initial_fire_time`];
//! each successful fire advances the schedule via
//! [`Schedule::set_next_fire_time`].

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Months, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur when building a schedule.
#[derive(Debug, Error)]
pub enum ScheduleError {
    /// The repeat interval must be at least 1.
    #[error("interval must be positive, got {0}")]
    InvalidInterval(u32),
}

/// Calendar unit for a periodic schedule's repeat interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PeriodUnit {
    Seconds,
    Minutes,
    Hours,
    Days,
    Weeks,
    Months,
    Years,
}

/// Per-job state machine deciding when the job next fires.
///
/// Implementations own all runtime state (`next_fire_time`,
/// `previous_fire_time`, `times_run`); the engine only drives the two
/// transitions and reads the results. Once `next_fire_time` becomes
/// `None` the schedule is terminated and must never re-arm.
#[async_trait]
pub trait Schedule: Send + Sync {
    /// Instant this schedule object was constructed.
    fn created_on(&self) -> DateTime<Utc>;

    /// When the job should next fire; `None` means it never will again.
    fn next_fire_time(&self) -> Option<DateTime<Utc>>;

    /// The instant used to compute the current `next_fire_time`.
    fn previous_fire_time(&self) -> Option<DateTime<Utc>>;

    /// Count of completed fires. Incremented once per scheduled fire,
    /// never per retry.
    fn times_run(&self) -> u32;

    /// Maximum immediate re-executions allowed after a failure (0 = none).
    fn retry_attempts(&self) -> u32;

    /// Arm the schedule. Called exactly once, at registration.
    fn set_initial_fire_time(&mut self);

    /// Advance past a completed fire: increment `times_run`, shift
    /// `previous_fire_time` to the fire that just completed, and recompute
    /// `next_fire_time`. Success path only.
    fn set_next_fire_time(&mut self);

    /// Compute the fire time that would follow the current state, without
    /// mutating anything. `None` means the schedule would terminate.
    fn calculate_next_fire_time(&self) -> Option<DateTime<Utc>>;

    /// Hook for a variant to adjust state when a fire happened later than
    /// scheduled. `behind` is how far past the scheduled instant the fire
    /// was attempted. The default leaves the next fire time unchanged
    /// (no catch-up).
    fn handle_misfire(&mut self, _misfire_time: DateTime<Utc>, _behind: ChronoDuration) {}

    /// Independent copy with the same configuration and reset runtime
    /// state, for reuse across multiple registrations.
    fn clone_reset(&self) -> Box<dyn Schedule>;

    /// Suspend until `next_fire_time` is reached.
    ///
    /// Returns immediately if the schedule is unarmed, terminated, or the
    /// fire time is already past. Cancellable by dropping the future. The
    /// run loop polls instead of awaiting this; it exists for direct or
    /// manual firing.
    async fn wait_for_fire_time(&self) {
        let Some(next) = self.next_fire_time() else {
            return;
        };
        let now = Utc::now();
        if next <= now {
            return;
        }
        if let Ok(delay) = (next - now).to_std() {
            tokio::time::sleep(delay).await;
        }
    }
}

/// A schedule firing repeatedly at a fixed interval of one calendar unit.
///
/// One implementation covers every unit from seconds to years,
/// parameterized by [`PeriodUnit`]; the per-unit constructors
/// ([`seconds`](Self::seconds), [`minutes`](Self::minutes), ...) are
/// one-line specializations.
///
/// Sub-day units and days/weeks advance by simple elapsed time
/// (weeks = 7 days); months and years use calendar-aware addition, so a
/// fire on Jan 31 plus one month lands on the last day of February.
///
/// Misfire policy: no catch-up. A late fire still advances from the
/// *scheduled* instant, so the fire-time chain stays exact, and
/// [`handle_misfire`](Schedule::handle_misfire) keeps the default no-op.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeriodicSchedule {
    unit: PeriodUnit,
    interval: u32,
    first_fire_time: Option<DateTime<Utc>>,
    final_fire_time: Option<DateTime<Utc>>,
    max_repeats: Option<u32>,
    retry_attempts: u32,
    #[serde(skip, default = "Utc::now")]
    created_on: DateTime<Utc>,
    #[serde(skip)]
    next_fire_time: Option<DateTime<Utc>>,
    #[serde(skip)]
    previous_fire_time: Option<DateTime<Utc>>,
    #[serde(skip)]
    times_run: u32,
}

impl PeriodicSchedule {
    /// Start building a schedule for the given unit.
    pub fn builder(unit: PeriodUnit) -> PeriodicScheduleBuilder {
        PeriodicScheduleBuilder::new(unit)
    }

    /// Fire every `interval` seconds.
    pub fn seconds(interval: u32) -> Result<Self, ScheduleError> {
        Self::builder(PeriodUnit::Seconds).interval(interval).build()
    }

    /// Fire every `interval` minutes.
    pub fn minutes(interval: u32) -> Result<Self, ScheduleError> {
        Self::builder(PeriodUnit::Minutes).interval(interval).build()
    }

    /// Fire every `interval` hours.
    pub fn hours(interval: u32) -> Result<Self, ScheduleError> {
        Self::builder(PeriodUnit::Hours).interval(interval).build()
    }

    /// Fire every `interval` days.
    pub fn days(interval: u32) -> Result<Self, ScheduleError> {
        Self::builder(PeriodUnit::Days).interval(interval).build()
    }

    /// Fire every `interval` weeks.
    pub fn weeks(interval: u32) -> Result<Self, ScheduleError> {
        Self::builder(PeriodUnit::Weeks).interval(interval).build()
    }

    /// Fire every `interval` calendar months.
    pub fn months(interval: u32) -> Result<Self, ScheduleError> {
        Self::builder(PeriodUnit::Months).interval(interval).build()
    }

    /// Fire every `interval` calendar years.
    pub fn years(interval: u32) -> Result<Self, ScheduleError> {
        Self::builder(PeriodUnit::Years).interval(interval).build()
    }

    /// The repeat interval.
    pub fn interval(&self) -> u32 {
        self.interval
    }

    /// The calendar unit of the repeat interval.
    pub fn unit(&self) -> PeriodUnit {
        self.unit
    }

    /// Cap on `times_run`, if any (`None` = unlimited).
    pub fn max_repeats(&self) -> Option<u32> {
        self.max_repeats
    }

    /// Hard cutoff after which the schedule stops, if any.
    pub fn final_fire_time(&self) -> Option<DateTime<Utc>> {
        self.final_fire_time
    }

    fn advance_from(&self, previous: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let interval = i64::from(self.interval);
        match self.unit {
            PeriodUnit::Seconds => Some(previous + ChronoDuration::seconds(interval)),
            PeriodUnit::Minutes => Some(previous + ChronoDuration::minutes(interval)),
            PeriodUnit::Hours => Some(previous + ChronoDuration::hours(interval)),
            PeriodUnit::Days => Some(previous + ChronoDuration::days(interval)),
            PeriodUnit::Weeks => Some(previous + ChronoDuration::weeks(interval)),
            PeriodUnit::Months => previous.checked_add_months(Months::new(self.interval)),
            PeriodUnit::Years => {
                let months = self.interval.checked_mul(12)?;
                previous.checked_add_months(Months::new(months))
            }
        }
    }
}

#[async_trait]
impl Schedule for PeriodicSchedule {
    fn created_on(&self) -> DateTime<Utc> {
        self.created_on
    }

    fn next_fire_time(&self) -> Option<DateTime<Utc>> {
        self.next_fire_time
    }

    fn previous_fire_time(&self) -> Option<DateTime<Utc>> {
        self.previous_fire_time
    }

    fn times_run(&self) -> u32 {
        self.times_run
    }

    fn retry_attempts(&self) -> u32 {
        self.retry_attempts
    }

    fn set_initial_fire_time(&mut self) {
        // Arming is a one-shot transition; a schedule that has already
        // fired or terminated must not be re-armed.
        if self.previous_fire_time.is_some() || self.times_run > 0 {
            return;
        }
        self.next_fire_time = Some(self.first_fire_time.unwrap_or(self.created_on));
    }

    fn set_next_fire_time(&mut self) {
        // Terminated stays terminated.
        let Some(fired_at) = self.next_fire_time else {
            return;
        };
        self.times_run += 1;
        self.previous_fire_time = Some(fired_at);
        self.next_fire_time = self.calculate_next_fire_time();
    }

    fn calculate_next_fire_time(&self) -> Option<DateTime<Utc>> {
        let previous = self.previous_fire_time?;
        if let Some(cutoff) = self.final_fire_time {
            if cutoff < Utc::now() {
                return None;
            }
        }
        if let Some(max) = self.max_repeats {
            if self.times_run >= max {
                return None;
            }
        }
        self.advance_from(previous)
    }

    fn clone_reset(&self) -> Box<dyn Schedule> {
        Box::new(Self {
            created_on: Utc::now(),
            next_fire_time: None,
            previous_fire_time: None,
            times_run: 0,
            ..self.clone()
        })
    }
}

/// Builder for [`PeriodicSchedule`].
///
/// Validates the configuration at [`build`](Self::build); an interval of
/// zero is rejected before any engine state is touched.
#[derive(Debug, Clone)]
pub struct PeriodicScheduleBuilder {
    unit: PeriodUnit,
    interval: u32,
    first_fire_time: Option<DateTime<Utc>>,
    final_fire_time: Option<DateTime<Utc>>,
    max_repeats: Option<u32>,
    retry_attempts: u32,
}

impl PeriodicScheduleBuilder {
    fn new(unit: PeriodUnit) -> Self {
        Self {
            unit,
            interval: 1,
            first_fire_time: None,
            final_fire_time: None,
            max_repeats: None,
            retry_attempts: 0,
        }
    }

    /// Set the repeat interval (default 1).
    pub fn interval(mut self, interval: u32) -> Self {
        self.interval = interval;
        self
    }

    /// Override the exact instant of the first fire. Without this, the
    /// first fire is the schedule's construction instant.
    pub fn first_fire_time(mut self, at: DateTime<Utc>) -> Self {
        self.first_fire_time = Some(at);
        self
    }

    /// Hard cutoff after which the schedule stops firing.
    pub fn final_fire_time(mut self, at: DateTime<Utc>) -> Self {
        self.final_fire_time = Some(at);
        self
    }

    /// Cap the number of completed fires.
    pub fn max_repeats(mut self, max: u32) -> Self {
        self.max_repeats = Some(max);
        self
    }

    /// Number of immediate re-executions allowed after a failure.
    pub fn retry_attempts(mut self, attempts: u32) -> Self {
        self.retry_attempts = attempts;
        self
    }

    /// Build the schedule.
    pub fn build(self) -> Result<PeriodicSchedule, ScheduleError> {
        if self.interval == 0 {
            return Err(ScheduleError::InvalidInterval(self.interval));
        }
        Ok(PeriodicSchedule {
            unit: self.unit,
            interval: self.interval,
            first_fire_time: self.first_fire_time,
            final_fire_time: self.final_fire_time,
            max_repeats: self.max_repeats,
            retry_attempts: self.retry_attempts,
            created_on: Utc::now(),
            next_fire_time: None,
            previous_fire_time: None,
            times_run: 0,
        })
    }
}
