//! Session controller: the monitoring state machine.
//!
//! Session lifecycle:
//!
//! ```text
//!   Absent --start--> Active --decrease >= threshold--> Armed --dispatch--> Notified
//!                       ^                                                      |
//!                       +---------------------------start (reset)--------------+
//! ```
//!
//! The controller holds no authoritative state. Every operation re-reads the
//! session store, and concurrent callers (scheduler ticks, operator commands)
//! are not serialized here; the store's atomic writes and the idempotent
//! notified latch are what keep alerting at most once per session.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::alert::stalenesses::is_stale_at;
use crate::alert::thresholds::AlertPolicy;
use crate::cache::SessionCache;
use crate::error::{FetchError, StartError, StatusError};
use crate::ingest::{ReadingSource, SessionStore};
use crate::logging::Component;
use crate::model::{AlertOutcome, Reading, Session, SessionState, SessionStatus, StartOutcome};

pub struct SessionController {
    source: Arc<dyn ReadingSource>,
    store: Arc<dyn SessionStore>,
    policy: AlertPolicy,
    cache: SessionCache,
    stale_after_minutes: u64,
}

impl SessionController {
    pub fn new(
        source: Arc<dyn ReadingSource>,
        store: Arc<dyn SessionStore>,
        policy: AlertPolicy,
    ) -> Self {
        Self {
            source,
            store,
            policy,
            cache: SessionCache::new(),
            stale_after_minutes: crate::config::DEFAULT_STALE_AFTER_MINUTES,
        }
    }

    pub fn with_stale_after(mut self, minutes: u64) -> Self {
        self.stale_after_minutes = minutes;
        self
    }

    pub fn policy(&self) -> &AlertPolicy {
        &self.policy
    }

    /// Display-only view of the last session seen.
    pub fn cache(&self) -> &SessionCache {
        &self.cache
    }

    /// Classifies where a session sits in its lifecycle given a reading.
    pub fn lifecycle_state(&self, session: Option<&Session>, reading: Option<&Reading>) -> SessionState {
        match (session, reading) {
            (None, _) => SessionState::Absent,
            (Some(s), _) if s.notified => SessionState::Notified,
            (Some(s), Some(r)) if self.policy.is_breached(AlertPolicy::decrease(s, r)) => {
                SessionState::Armed
            }
            (Some(_), _) => SessionState::Active,
        }
    }

    // -----------------------------------------------------------------------
    // start
    // -----------------------------------------------------------------------

    /// Creates or resets the session with the current rate as its baseline.
    ///
    /// The reading is fetched first; if that fails, the store is never
    /// touched, so an existing session keeps its baseline.
    pub async fn start(&self, initiator: &str) -> Result<StartOutcome, StartError> {
        let reading = self
            .source
            .fetch_reading()
            .await
            .map_err(StartError::Reading)?;

        let created = self
            .store
            .create_or_reset(reading.rate, initiator)
            .await
            .map_err(StartError::Store)?;
        self.cache.observe(Some(&created.session), Utc::now()).await;

        let notify_line = self.policy.notify_line(created.session.baseline_rate);
        tracing::info!(
            component = %Component::Store,
            initiator,
            baseline = created.session.baseline_rate,
            notify_line,
            was_reset = created.was_reset,
            "monitoring session started"
        );

        Ok(StartOutcome {
            session: created.session,
            notify_line,
            was_reset: created.was_reset,
            reading,
        })
    }

    // -----------------------------------------------------------------------
    // status
    // -----------------------------------------------------------------------

    pub async fn status(&self) -> Result<SessionStatus, StatusError> {
        self.status_at(Utc::now()).await
    }

    /// Reports the session against a fresh reading, with `now` injected for
    /// elapsed-time and staleness computation.
    pub async fn status_at(&self, now: DateTime<Utc>) -> Result<SessionStatus, StatusError> {
        let (session, reading) =
            tokio::join!(self.store.get_session(), self.source.fetch_reading());

        let session = session?;
        self.cache.observe(session.as_ref(), now).await;
        let session = session.ok_or(StatusError::NoActiveSession)?;
        let reading = reading?;

        let decrease = AlertPolicy::decrease(&session, &reading);
        let remaining = self.policy.remaining(&session, &reading);

        Ok(SessionStatus {
            decrease,
            remaining,
            progress: self.policy.progress(decrease),
            elapsed: now - session.started_at,
            tier: self.policy.tier(remaining),
            notify_line: self.policy.notify_line(session.baseline_rate),
            stale: is_stale_at(&reading, self.stale_after_minutes, now),
            session,
            reading,
        })
    }

    // -----------------------------------------------------------------------
    // now
    // -----------------------------------------------------------------------

    /// Current reading without any session context.
    pub async fn current_reading(&self) -> Result<Reading, FetchError> {
        self.source.fetch_reading().await
    }

    pub fn is_stale(&self, reading: &Reading, now: DateTime<Utc>) -> bool {
        is_stale_at(reading, self.stale_after_minutes, now)
    }

    // -----------------------------------------------------------------------
    // check_and_alert
    // -----------------------------------------------------------------------

    /// One poll decision. Reads the session, then the reading, then decides;
    /// never writes. A failed fetch is reported as such, never as safe.
    pub async fn check_and_alert(&self) -> AlertOutcome {
        let session = match self.store.get_session().await {
            Ok(session) => session,
            Err(e) => return AlertOutcome::FetchFailed(e),
        };
        self.cache.observe(session.as_ref(), Utc::now()).await;

        let session = match session {
            Some(s) if !s.notified => s,
            other => return AlertOutcome::NoOp(self.lifecycle_state(other.as_ref(), None)),
        };

        let reading = match self.source.fetch_reading().await {
            Ok(reading) => reading,
            Err(e) => return AlertOutcome::FetchFailed(e),
        };

        let decrease = AlertPolicy::decrease(&session, &reading);
        match self.lifecycle_state(Some(&session), Some(&reading)) {
            SessionState::Armed => AlertOutcome::ShouldAlert { session, reading },
            _ => AlertOutcome::Safe { decrease },
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::{CreatedSession, MockReadingSource, MockSessionStore};
    use chrono::TimeZone;
    use std::time::Duration;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 17, 0, 0, 0).unwrap()
    }

    fn session(baseline: f64, notified: bool) -> Session {
        Session {
            baseline_rate: baseline,
            started_at: t0(),
            started_by: "operator".to_string(),
            notified,
        }
    }

    fn reading(rate: f64) -> Reading {
        Reading {
            rate,
            volume: 30_000.0,
            inflow: 10.0,
            outflow: 14.0,
            observed_at: t0() + chrono::Duration::hours(3),
        }
    }

    fn controller(source: MockReadingSource, store: MockSessionStore) -> SessionController {
        SessionController::new(Arc::new(source), Arc::new(store), AlertPolicy::default())
    }

    #[tokio::test]
    async fn test_start_failure_leaves_store_untouched() {
        let mut source = MockReadingSource::new();
        source
            .expect_fetch_reading()
            .returning(|| Err(FetchError::Timeout(Duration::from_secs(20))));
        let mut store = MockSessionStore::new();
        store.expect_create_or_reset().never();

        let result = controller(source, store).start("operator").await;
        assert_eq!(
            result,
            Err(StartError::Reading(FetchError::Timeout(Duration::from_secs(20))))
        );
    }

    #[tokio::test]
    async fn test_start_store_failure_is_reported_as_store() {
        let mut source = MockReadingSource::new();
        source.expect_fetch_reading().returning(|| Ok(reading(78.0)));
        let mut store = MockSessionStore::new();
        store
            .expect_create_or_reset()
            .times(1)
            .returning(|_, _| Err(FetchError::Upstream("HTTP 503".to_string())));

        let result = controller(source, store).start("operator").await;
        assert_eq!(
            result,
            Err(StartError::Store(FetchError::Upstream("HTTP 503".to_string())))
        );
    }

    #[tokio::test]
    async fn test_start_uses_fetched_rate_as_baseline() {
        let mut source = MockReadingSource::new();
        source.expect_fetch_reading().returning(|| Ok(reading(78.0)));
        let mut store = MockSessionStore::new();
        store
            .expect_create_or_reset()
            .times(1)
            .returning(|rate, initiator| {
                Ok(CreatedSession {
                    session: Session {
                        baseline_rate: rate,
                        started_at: t0(),
                        started_by: initiator.to_string(),
                        notified: false,
                    },
                    was_reset: true,
                })
            });

        let ctl = controller(source, store);
        let outcome = ctl.start("kaito").await.expect("start succeeds");
        assert_eq!(outcome.session.baseline_rate, 78.0);
        assert_eq!(outcome.session.started_by, "kaito");
        assert_eq!(outcome.notify_line, 74.0);
        assert!(outcome.was_reset);
        assert!(ctl.cache().peek().await.is_some());
    }

    #[tokio::test]
    async fn test_status_without_session_is_no_active_session() {
        let mut source = MockReadingSource::new();
        source.expect_fetch_reading().returning(|| Ok(reading(70.0)));
        let mut store = MockSessionStore::new();
        store.expect_get_session().returning(|| Ok(None));

        let result = controller(source, store).status_at(t0()).await;
        assert_eq!(result, Err(StatusError::NoActiveSession));
    }

    #[tokio::test]
    async fn test_status_without_session_ignores_reading_failure() {
        let mut source = MockReadingSource::new();
        source
            .expect_fetch_reading()
            .returning(|| Err(FetchError::Network("reset".to_string())));
        let mut store = MockSessionStore::new();
        store.expect_get_session().returning(|| Ok(None));

        let result = controller(source, store).status_at(t0()).await;
        assert_eq!(result, Err(StatusError::NoActiveSession));
    }

    #[tokio::test]
    async fn test_status_computes_derived_quantities() {
        let mut source = MockReadingSource::new();
        source.expect_fetch_reading().returning(|| Ok(reading(72.5)));
        let mut store = MockSessionStore::new();
        store.expect_get_session().returning(|| Ok(Some(session(75.0, false))));

        let now = t0() + chrono::Duration::minutes(150);
        let status = controller(source, store).status_at(now).await.unwrap();
        assert_eq!(status.decrease, 2.5);
        assert_eq!(status.remaining, 1.5);
        assert_eq!(status.progress, 62.5);
        assert_eq!(status.notify_line, 71.0);
        assert_eq!(status.elapsed, chrono::Duration::minutes(150));
        assert_eq!(status.tier, crate::model::Tier::Caution);
        assert!(!status.stale);
    }

    #[tokio::test]
    async fn test_status_reading_failure_is_reported() {
        let mut source = MockReadingSource::new();
        source
            .expect_fetch_reading()
            .returning(|| Err(FetchError::Upstream("HTTP 502".to_string())));
        let mut store = MockSessionStore::new();
        store.expect_get_session().returning(|| Ok(Some(session(75.0, false))));

        let result = controller(source, store).status_at(t0()).await;
        assert_eq!(
            result,
            Err(StatusError::Fetch(FetchError::Upstream("HTTP 502".to_string())))
        );
    }

    #[tokio::test]
    async fn test_check_exact_threshold_should_alert() {
        let mut source = MockReadingSource::new();
        source.expect_fetch_reading().returning(|| Ok(reading(66.0)));
        let mut store = MockSessionStore::new();
        store.expect_get_session().returning(|| Ok(Some(session(70.0, false))));
        store.expect_mark_notified().never();

        let outcome = controller(source, store).check_and_alert().await;
        assert_eq!(
            outcome,
            AlertOutcome::ShouldAlert {
                session: session(70.0, false),
                reading: reading(66.0),
            }
        );
    }

    #[tokio::test]
    async fn test_check_below_threshold_is_safe() {
        let mut source = MockReadingSource::new();
        source.expect_fetch_reading().returning(|| Ok(reading(72.0)));
        let mut store = MockSessionStore::new();
        store.expect_get_session().returning(|| Ok(Some(session(75.0, false))));

        let outcome = controller(source, store).check_and_alert().await;
        assert_eq!(outcome, AlertOutcome::Safe { decrease: 3.0 });
    }

    #[tokio::test]
    async fn test_check_notified_session_is_noop_without_reading() {
        let mut source = MockReadingSource::new();
        source.expect_fetch_reading().never();
        let mut store = MockSessionStore::new();
        store.expect_get_session().returning(|| Ok(Some(session(75.0, true))));

        let outcome = controller(source, store).check_and_alert().await;
        assert_eq!(outcome, AlertOutcome::NoOp(SessionState::Notified));
    }

    #[tokio::test]
    async fn test_check_absent_session_is_noop() {
        let mut source = MockReadingSource::new();
        source.expect_fetch_reading().never();
        let mut store = MockSessionStore::new();
        store.expect_get_session().returning(|| Ok(None));

        let outcome = controller(source, store).check_and_alert().await;
        assert_eq!(outcome, AlertOutcome::NoOp(SessionState::Absent));
    }

    #[tokio::test]
    async fn test_check_reading_timeout_is_fetch_failed_and_writes_nothing() {
        let mut source = MockReadingSource::new();
        source
            .expect_fetch_reading()
            .returning(|| Err(FetchError::Timeout(Duration::from_secs(20))));
        let mut store = MockSessionStore::new();
        store.expect_get_session().returning(|| Ok(Some(session(75.0, false))));
        store.expect_mark_notified().never();
        store.expect_create_or_reset().never();

        let outcome = controller(source, store).check_and_alert().await;
        assert_eq!(
            outcome,
            AlertOutcome::FetchFailed(FetchError::Timeout(Duration::from_secs(20)))
        );
    }

    #[tokio::test]
    async fn test_check_store_failure_is_fetch_failed() {
        let mut source = MockReadingSource::new();
        source.expect_fetch_reading().never();
        let mut store = MockSessionStore::new();
        store
            .expect_get_session()
            .returning(|| Err(FetchError::Network("dns".to_string())));

        let outcome = controller(source, store).check_and_alert().await;
        assert!(matches!(outcome, AlertOutcome::FetchFailed(FetchError::Network(_))));
    }

    #[test]
    fn test_lifecycle_states() {
        let ctl = controller(MockReadingSource::new(), MockSessionStore::new());
        assert_eq!(ctl.lifecycle_state(None, None), SessionState::Absent);
        assert_eq!(
            ctl.lifecycle_state(Some(&session(70.0, false)), Some(&reading(69.0))),
            SessionState::Active
        );
        assert_eq!(
            ctl.lifecycle_state(Some(&session(70.0, false)), Some(&reading(66.0))),
            SessionState::Armed
        );
        assert_eq!(
            ctl.lifecycle_state(Some(&session(70.0, true)), Some(&reading(60.0))),
            SessionState::Notified
        );
    }
}
