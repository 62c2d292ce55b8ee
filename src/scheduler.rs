//! Poll scheduler.
//!
//! Ticks on a fixed period aligned to wall-clock boundaries in the display
//! offset (with a 30 minute period: :00 and :30). Ticks never overlap; one
//! that overruns causes the missed slots to be skipped, not queued. Each tick
//! runs on its own task so a panic inside it is logged and the loop goes on.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, FixedOffset, Timelike, Utc};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::alert::dispatcher::AlertDispatcher;
use crate::controller::SessionController;
use crate::logging::Component;
use crate::model::AlertOutcome;

pub struct PollScheduler {
    controller: Arc<SessionController>,
    dispatcher: Arc<AlertDispatcher>,
    period: Duration,
    display_offset: FixedOffset,
}

impl PollScheduler {
    pub fn new(
        controller: Arc<SessionController>,
        dispatcher: Arc<AlertDispatcher>,
        period: Duration,
        display_offset: FixedOffset,
    ) -> Self {
        Self {
            controller,
            dispatcher,
            period,
            display_offset,
        }
    }

    /// One check: decide, and dispatch if the threshold was reached.
    pub async fn tick(&self) -> AlertOutcome {
        let outcome = self.controller.check_and_alert().await;

        match &outcome {
            AlertOutcome::ShouldAlert { session, reading } => {
                tracing::warn!(
                    component = %Component::Scheduler,
                    baseline = session.baseline_rate,
                    rate = reading.rate,
                    "alert threshold reached"
                );
                if let Err(e) = self.dispatcher.dispatch(session, reading).await {
                    tracing::error!(component = %Component::Scheduler, error = %e, "alert dispatch failed");
                }
            }
            AlertOutcome::FetchFailed(e) => {
                tracing::warn!(component = %Component::Scheduler, error = %e, "tick skipped: fetch failed");
            }
            AlertOutcome::Safe { decrease } => {
                tracing::info!(component = %Component::Scheduler, decrease, "below threshold");
            }
            AlertOutcome::NoOp(state) => {
                tracing::debug!(component = %Component::Scheduler, ?state, "nothing to check");
            }
        }

        outcome
    }

    /// Runs until `cancel` fires.
    pub async fn run(self: Arc<Self>, cancel: CancellationToken) {
        let delay = delay_until_aligned(Utc::now(), self.period, self.display_offset);
        tracing::info!(
            component = %Component::Scheduler,
            period_secs = self.period.as_secs(),
            first_tick_in_secs = delay.as_secs(),
            "poll scheduler started"
        );

        let mut ticks = tokio::time::interval_at(Instant::now() + delay, self.period);
        ticks.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!(component = %Component::Scheduler, "poll scheduler stopping");
                    break;
                }
                _ = ticks.tick() => {
                    let this = Arc::clone(&self);
                    match tokio::spawn(async move { this.tick().await }).await {
                        Ok(outcome) => {
                            tracing::debug!(component = %Component::Scheduler, outcome = outcome.label(), "tick finished");
                        }
                        Err(e) => {
                            tracing::error!(component = %Component::Scheduler, error = %e, "tick aborted");
                        }
                    }
                }
            }
        }
    }
}

/// Time from `now` until the next multiple of `period` counted from local
/// midnight in `offset`. Zero when `now` is exactly on a boundary.
pub fn delay_until_aligned(now: DateTime<Utc>, period: Duration, offset: FixedOffset) -> Duration {
    let period_secs = period.as_secs().max(1);
    let local = now.with_timezone(&offset);
    let since_midnight = u64::from(local.num_seconds_from_midnight());
    let nanos = u64::from(local.nanosecond().min(999_999_999));

    let into_period = since_midnight % period_secs;
    if into_period == 0 && nanos == 0 {
        return Duration::ZERO;
    }
    Duration::from_secs(period_secs - into_period).saturating_sub(Duration::from_nanos(nanos))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn jst() -> FixedOffset {
        FixedOffset::east_opt(9 * 3600).unwrap()
    }

    #[test]
    fn test_delay_to_next_half_hour() {
        // 01:10:00 UTC == 10:10 JST; next :30 boundary is 20 minutes away.
        let now = Utc.with_ymd_and_hms(2026, 10, 17, 1, 10, 0).unwrap();
        assert_eq!(
            delay_until_aligned(now, Duration::from_secs(1800), jst()),
            Duration::from_secs(20 * 60)
        );
    }

    #[test]
    fn test_on_boundary_fires_immediately() {
        let now = Utc.with_ymd_and_hms(2026, 10, 17, 1, 30, 0).unwrap();
        assert_eq!(
            delay_until_aligned(now, Duration::from_secs(1800), jst()),
            Duration::ZERO
        );
    }

    #[test]
    fn test_subsecond_offset_is_subtracted() {
        let now = Utc.with_ymd_and_hms(2026, 10, 17, 1, 29, 59).unwrap()
            + chrono::Duration::milliseconds(500);
        assert_eq!(
            delay_until_aligned(now, Duration::from_secs(1800), jst()),
            Duration::from_millis(500)
        );
    }

    #[test]
    fn test_alignment_uses_display_offset() {
        // Hourly period, offset +05:30: 00:00 UTC is 05:30 local, half way
        // through the local hour.
        let now = Utc.with_ymd_and_hms(2026, 10, 17, 0, 0, 0).unwrap();
        let ist = FixedOffset::east_opt(5 * 3600 + 1800).unwrap();
        assert_eq!(
            delay_until_aligned(now, Duration::from_secs(3600), ist),
            Duration::from_secs(1800)
        );
    }
}
