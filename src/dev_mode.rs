//! Development mode utilities for running without the live provider
//!
//! When the provider is unavailable, `DEV_READINGS` swaps in a scripted
//! reading sequence and an in-process session store so the scheduler and
//! commands can be exercised end to end.

use std::collections::VecDeque;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;

use crate::error::FetchError;
use crate::ingest::{CreatedSession, ReadingSource, SessionStore};
use crate::model::{Reading, Session};

/// Replays a fixed list of rates, one per fetch. The last rate repeats once
/// the list is exhausted.
pub struct ScriptedReadings {
    remaining: Mutex<VecDeque<Result<f64, FetchError>>>,
    last: Mutex<Option<f64>>,
}

impl ScriptedReadings {
    pub fn new(rates: &[f64]) -> Self {
        Self::with_results(rates.iter().copied().map(Ok).collect())
    }

    /// Like `new`, but individual fetches may fail.
    pub fn with_results(script: Vec<Result<f64, FetchError>>) -> Self {
        Self {
            remaining: Mutex::new(script.into()),
            last: Mutex::new(None),
        }
    }
}

#[async_trait]
impl ReadingSource for ScriptedReadings {
    async fn fetch_reading(&self) -> Result<Reading, FetchError> {
        let next = self.remaining.lock().await.pop_front();
        let mut last = self.last.lock().await;

        let rate = match next {
            Some(Ok(rate)) => {
                *last = Some(rate);
                rate
            }
            Some(Err(e)) => return Err(e),
            None => (*last).ok_or_else(|| FetchError::Upstream("script is empty".to_string()))?,
        };

        Ok(Reading {
            rate,
            volume: 0.0,
            inflow: 0.0,
            outflow: 0.0,
            observed_at: Utc::now(),
        })
    }
}

/// Session store held in process memory.
///
/// The mutex gives the same atomicity the remote store provides for
/// `create_or_reset` and `mark_notified`.
#[derive(Default)]
pub struct MemorySessionStore {
    session: Mutex<Option<Session>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_session(session: Session) -> Self {
        Self {
            session: Mutex::new(Some(session)),
        }
    }

    pub async fn snapshot(&self) -> Option<Session> {
        self.session.lock().await.clone()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn create_or_reset(
        &self,
        baseline_rate: f64,
        initiator: &str,
    ) -> Result<CreatedSession, FetchError> {
        let mut slot = self.session.lock().await;
        let was_reset = slot.is_some();
        let session = Session {
            baseline_rate,
            started_at: Utc::now(),
            started_by: initiator.to_string(),
            notified: false,
        };
        *slot = Some(session.clone());
        Ok(CreatedSession { session, was_reset })
    }

    async fn get_session(&self) -> Result<Option<Session>, FetchError> {
        Ok(self.session.lock().await.clone())
    }

    async fn mark_notified(&self) -> Result<(), FetchError> {
        match self.session.lock().await.as_mut() {
            Some(session) => {
                session.notified = true;
                Ok(())
            }
            None => Err(FetchError::Upstream("no session to mark".to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_script_replays_then_repeats_last() {
        let source = ScriptedReadings::new(&[75.0, 74.0]);
        assert_eq!(source.fetch_reading().await.unwrap().rate, 75.0);
        assert_eq!(source.fetch_reading().await.unwrap().rate, 74.0);
        assert_eq!(source.fetch_reading().await.unwrap().rate, 74.0);
    }

    #[tokio::test]
    async fn test_scripted_failure_is_returned_once() {
        let source = ScriptedReadings::with_results(vec![
            Ok(70.0),
            Err(FetchError::Network("unplugged".to_string())),
        ]);
        assert!(source.fetch_reading().await.is_ok());
        assert!(source.fetch_reading().await.is_err());
        assert_eq!(source.fetch_reading().await.unwrap().rate, 70.0);
    }

    #[tokio::test]
    async fn test_mark_notified_twice_is_harmless() {
        let store = MemorySessionStore::new();
        store.create_or_reset(70.0, "op").await.unwrap();

        store.mark_notified().await.expect("first mark");
        let after_first = store.snapshot().await.unwrap();
        store.mark_notified().await.expect("second mark");
        let after_second = store.snapshot().await.unwrap();

        assert!(after_first.notified);
        assert_eq!(after_first, after_second);
    }

    #[tokio::test]
    async fn test_reset_clears_notified_and_reports_reset() {
        let store = MemorySessionStore::new();
        let first = store.create_or_reset(80.0, "a").await.unwrap();
        assert!(!first.was_reset);
        store.mark_notified().await.unwrap();

        let second = store.create_or_reset(78.0, "b").await.unwrap();
        assert!(second.was_reset);
        assert!(!second.session.notified);
        assert_eq!(second.session.baseline_rate, 78.0);
    }
}
