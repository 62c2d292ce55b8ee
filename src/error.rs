//! Error taxonomy for the monitoring service.
//!
//! Remote failures are values, not faults: the controller converts them into
//! reported results and the scheduler logs and swallows them.

use std::time::Duration;

use thiserror::Error;

/// Failure of a call to the reading/session provider.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FetchError {
    /// Connect, send, or body read failed.
    #[error("network failure: {0}")]
    Network(String),

    /// The bounded wait elapsed before a response arrived.
    #[error("timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    /// Non-success HTTP status, `success: false`, or a malformed payload.
    #[error("upstream error: {0}")]
    Upstream(String),
}

impl FetchError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, FetchError::Timeout(_))
    }
}

/// The chat platform rejected or never received a request.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PlatformError {
    #[error("platform rejected request with status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("platform unreachable: {0}")]
    Network(String),
}

/// Reasons a status report could not be produced.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StatusError {
    /// Expected empty state; rendered as information, not as a failure.
    #[error("no active monitoring session")]
    NoActiveSession,

    #[error(transparent)]
    Fetch(#[from] FetchError),
}

/// Which step of starting a session failed.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StartError {
    /// No reading, so the store was never touched.
    #[error("could not fetch the baseline reading: {0}")]
    Reading(FetchError),

    /// The reading arrived but the session could not be written.
    #[error("could not write the session: {0}")]
    Store(FetchError),
}

/// Failures while delivering an alert.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DispatchError {
    /// The broadcast was not delivered; the session stays un-notified.
    #[error("alert send failed: {0}")]
    Send(#[from] PlatformError),

    /// The broadcast went out but the latch could not be written.
    #[error("alert sent but marking notified failed: {0}")]
    MarkNotified(FetchError),
}

/// Invalid or missing configuration, reported at startup.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing required setting {0}")]
    Missing(&'static str),

    #[error("invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },

    #[error("could not read config file {path}: {reason}")]
    File { path: String, reason: String },
}
