//! Core data types for the reservoir monitoring service.
//!
//! This module defines the shared domain model imported by all other modules.
//! It contains no I/O. Derived quantities (decrease, remaining margin,
//! progress) are never stored here; see `alert::thresholds`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::FetchError;

// ---------------------------------------------------------------------------
// Reading types
// ---------------------------------------------------------------------------

/// A single observation of the reservoir, fetched fresh on every call.
///
/// `rate` is the stored-water percentage (0–100). Volume and flows are passed
/// through for display only; no decision depends on them.
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    pub rate: f64,
    pub volume: f64,
    pub inflow: f64,
    pub outflow: f64,
    pub observed_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Session types
// ---------------------------------------------------------------------------

/// The durable record of one monitoring period.
///
/// Owned by the remote session store. `baseline_rate` is fixed when the
/// session is created; `notified` only ever moves from `false` to `true`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub baseline_rate: f64,
    pub started_at: DateTime<Utc>,
    pub started_by: String,
    pub notified: bool,
}

/// Lifecycle position of the single monitored session.
///
/// `Armed` is transient: it exists only between the threshold decision and
/// the dispatcher marking the session notified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Absent,
    Active,
    Armed,
    Notified,
}

/// Qualitative position of the current reading relative to the alert line.
///
/// Ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Tier {
    Normal,
    Caution,
    Imminent,
    Alerted,
}

impl Tier {
    pub fn label(&self) -> &'static str {
        match self {
            Tier::Normal => "normal",
            Tier::Caution => "caution",
            Tier::Imminent => "imminent",
            Tier::Alerted => "alerted",
        }
    }
}

// ---------------------------------------------------------------------------
// Controller results
// ---------------------------------------------------------------------------

/// Result of a successful `start` command.
#[derive(Debug, Clone, PartialEq)]
pub struct StartOutcome {
    pub session: Session,
    /// Rate at which an alert fires: `baseline_rate - alert_decrease`.
    pub notify_line: f64,
    /// True iff a session existed before this start.
    pub was_reset: bool,
    pub reading: Reading,
}

/// Everything a status report needs, recomputed on every request.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionStatus {
    pub session: Session,
    pub reading: Reading,
    pub decrease: f64,
    pub remaining: f64,
    pub progress: f64,
    pub elapsed: chrono::Duration,
    pub tier: Tier,
    pub notify_line: f64,
    /// Whether the provider's observation is older than the configured limit.
    pub stale: bool,
}

/// Decision produced by one poll of `check_and_alert`.
#[derive(Debug, Clone, PartialEq)]
pub enum AlertOutcome {
    /// No session, or the session has already been notified.
    NoOp(SessionState),
    /// The session or reading could not be fetched; nothing was decided.
    FetchFailed(FetchError),
    /// The decrease reached the threshold and the alert must be dispatched.
    ShouldAlert { session: Session, reading: Reading },
    /// Below threshold.
    Safe { decrease: f64 },
}

impl AlertOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            AlertOutcome::NoOp(_) => "noop",
            AlertOutcome::FetchFailed(_) => "fetch_failed",
            AlertOutcome::ShouldAlert { .. } => "should_alert",
            AlertOutcome::Safe { .. } => "safe",
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
