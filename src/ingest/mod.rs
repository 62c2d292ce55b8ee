//! Data acquisition seams.
//!
//! The controller depends only on these two traits. `provider` implements
//! both against the remote HTTP service; `dev_mode` has offline stand-ins.

pub mod provider;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use crate::error::FetchError;
use crate::model::{Reading, Session};

/// Source of live reservoir readings.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ReadingSource: Send + Sync {
    /// Fetches the current reading. Never panics; all failures are values.
    async fn fetch_reading(&self) -> Result<Reading, FetchError>;
}

/// A freshly written session and whether it replaced an earlier one.
#[derive(Debug, Clone, PartialEq)]
pub struct CreatedSession {
    pub session: Session,
    pub was_reset: bool,
}

/// Durable holder of the single monitoring session.
///
/// The store is the only arbiter of session state. Implementations must make
/// `create_or_reset` atomic and `mark_notified` idempotent; callers may race.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Writes a new session with `notified = false`, replacing any existing one.
    async fn create_or_reset(
        &self,
        baseline_rate: f64,
        initiator: &str,
    ) -> Result<CreatedSession, FetchError>;

    /// Returns `Ok(None)` when no session has ever been started.
    async fn get_session(&self) -> Result<Option<Session>, FetchError>;

    /// Latches `notified = true`. Calling it again is harmless.
    async fn mark_notified(&self) -> Result<(), FetchError>;
}
