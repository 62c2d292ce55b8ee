//! One-shot alert delivery.
//!
//! Sends the broadcast first and latches the session's notified flag only
//! after the send succeeded. A failed send leaves the latch open so the next
//! tick tries again; a crash between send and latch can at worst repeat the
//! alert once.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::FixedOffset;
#[cfg(test)]
use mockall::automock;

use crate::alert::thresholds::AlertPolicy;
use crate::chat::render;
use crate::error::{DispatchError, PlatformError};
use crate::ingest::SessionStore;
use crate::logging::{Component, log_fetch_failure, log_platform_failure};
use crate::model::{Reading, Session};

/// Destination for broadcast alerts.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait AlertSink: Send + Sync {
    async fn broadcast(&self, message: &str) -> Result<(), PlatformError>;
}

pub struct AlertDispatcher {
    sink: Arc<dyn AlertSink>,
    store: Arc<dyn SessionStore>,
    policy: AlertPolicy,
    reservoir_name: String,
    display_offset: FixedOffset,
}

impl AlertDispatcher {
    pub fn new(
        sink: Arc<dyn AlertSink>,
        store: Arc<dyn SessionStore>,
        policy: AlertPolicy,
        reservoir_name: &str,
        display_offset: FixedOffset,
    ) -> Self {
        Self {
            sink,
            store,
            policy,
            reservoir_name: reservoir_name.to_string(),
            display_offset,
        }
    }

    pub async fn dispatch(&self, session: &Session, reading: &Reading) -> Result<(), DispatchError> {
        let message = render::alert_message(
            &self.reservoir_name,
            session,
            reading,
            &self.policy,
            self.display_offset,
        );

        if let Err(e) = self.sink.broadcast(&message).await {
            log_platform_failure("broadcast_alert", &e);
            return Err(DispatchError::Send(e));
        }

        if let Err(e) = self.store.mark_notified().await {
            log_fetch_failure(Component::Store, "mark_notified", &e);
            return Err(DispatchError::MarkNotified(e));
        }

        tracing::info!(
            component = %Component::Chat,
            baseline = session.baseline_rate,
            rate = reading.rate,
            "threshold alert delivered and session marked notified"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FetchError;
    use crate::ingest::MockSessionStore;
    use chrono::{TimeZone, Utc};
    use mockall::Sequence;

    fn session() -> Session {
        Session {
            baseline_rate: 75.0,
            started_at: Utc.with_ymd_and_hms(2026, 10, 17, 0, 0, 0).unwrap(),
            started_by: "operator".to_string(),
            notified: false,
        }
    }

    fn reading() -> Reading {
        Reading {
            rate: 70.5,
            volume: 28_000.0,
            inflow: 5.0,
            outflow: 19.0,
            observed_at: Utc.with_ymd_and_hms(2026, 10, 17, 6, 0, 0).unwrap(),
        }
    }

    fn dispatcher(sink: MockAlertSink, store: MockSessionStore) -> AlertDispatcher {
        AlertDispatcher::new(
            Arc::new(sink),
            Arc::new(store),
            AlertPolicy::default(),
            "Sameura Dam",
            FixedOffset::east_opt(9 * 3600).unwrap(),
        )
    }

    #[tokio::test]
    async fn test_send_then_mark_in_order() {
        let mut seq = Sequence::new();
        let mut sink = MockAlertSink::new();
        sink.expect_broadcast()
            .withf(|message: &str| message.contains("Sameura Dam") && message.contains("70.5"))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));
        let mut store = MockSessionStore::new();
        store
            .expect_mark_notified()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| Ok(()));

        dispatcher(sink, store)
            .dispatch(&session(), &reading())
            .await
            .expect("dispatch succeeds");
    }

    #[tokio::test]
    async fn test_failed_send_does_not_mark_notified() {
        let mut sink = MockAlertSink::new();
        sink.expect_broadcast().returning(|_| {
            Err(PlatformError::Rejected {
                status: 403,
                body: "Missing Access".to_string(),
            })
        });
        let mut store = MockSessionStore::new();
        store.expect_mark_notified().never();

        let result = dispatcher(sink, store).dispatch(&session(), &reading()).await;
        assert!(matches!(result, Err(DispatchError::Send(_))));
    }

    #[tokio::test]
    async fn test_mark_failure_after_send_is_reported() {
        let mut sink = MockAlertSink::new();
        sink.expect_broadcast().times(1).returning(|_| Ok(()));
        let mut store = MockSessionStore::new();
        store
            .expect_mark_notified()
            .returning(|| Err(FetchError::Network("reset".to_string())));

        let result = dispatcher(sink, store).dispatch(&session(), &reading()).await;
        assert_eq!(
            result,
            Err(DispatchError::MarkNotified(FetchError::Network("reset".to_string())))
        );
    }
}
