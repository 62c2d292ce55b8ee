//! Structured logging for the reservoir monitoring service
//!
//! Sets up a `tracing` subscriber with console output and optional
//! append-mode file output for daemon operation, and provides failure
//! classification so transient provider trouble is logged differently
//! from faults that need attention.

use std::fmt;
use std::fs::OpenOptions;
use std::sync::Mutex;

use tracing_subscriber::{EnvFilter, fmt as tracing_fmt, prelude::*};

use crate::error::{FetchError, PlatformError};

// ---------------------------------------------------------------------------
// Components
// ---------------------------------------------------------------------------

/// The part of the service a log line originates from. Emitted as the
/// `component` field on every structured event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Component {
    Provider,
    Store,
    Chat,
    Scheduler,
    System,
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Component::Provider => write!(f, "provider"),
            Component::Store => write!(f, "store"),
            Component::Chat => write!(f, "chat"),
            Component::Scheduler => write!(f, "scheduler"),
            Component::System => write!(f, "system"),
        }
    }
}

// ---------------------------------------------------------------------------
// Failure Classification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureType {
    /// Expected failure - the provider is known to be slow at times
    Expected,
    /// Unexpected failure - indicates service degradation or configuration issue
    Unexpected,
    /// Unknown - cannot determine if this is expected or not
    Unknown,
}

impl fmt::Display for FailureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureType::Expected => write!(f, "EXPECTED"),
            FailureType::Unexpected => write!(f, "UNEXPECTED"),
            FailureType::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

/// Classify a provider failure.
pub fn classify_fetch_failure(err: &FetchError) -> FailureType {
    match err {
        FetchError::Timeout(_) => FailureType::Expected,
        FetchError::Upstream(msg) if msg.starts_with("HTTP 5") => FailureType::Unknown,
        FetchError::Upstream(_) | FetchError::Network(_) => FailureType::Unexpected,
    }
}

/// Classify a chat platform failure. Expired interaction tokens surface as
/// 404 and are routine when a reply arrives after the platform's window.
pub fn classify_platform_failure(err: &PlatformError) -> FailureType {
    match err {
        PlatformError::Rejected { status: 404, .. } => FailureType::Expected,
        PlatformError::Rejected { status: 429, .. } => FailureType::Unknown,
        PlatformError::Rejected { .. } | PlatformError::Network(_) => FailureType::Unexpected,
    }
}

// ---------------------------------------------------------------------------
// Structured Failure Logging
// ---------------------------------------------------------------------------

/// Log a provider failure with automatic classification
pub fn log_fetch_failure(component: Component, operation: &str, err: &FetchError) {
    let failure_type = classify_fetch_failure(err);
    match failure_type {
        FailureType::Expected => tracing::warn!(
            component = %component, operation, failure = %failure_type, error = %err,
            "remote call failed"
        ),
        FailureType::Unexpected => tracing::error!(
            component = %component, operation, failure = %failure_type, error = %err,
            "remote call failed"
        ),
        FailureType::Unknown => tracing::warn!(
            component = %component, operation, failure = %failure_type, error = %err,
            "remote call failed"
        ),
    }
}

/// Log a chat platform failure with classification
pub fn log_platform_failure(operation: &str, err: &PlatformError) {
    let failure_type = classify_platform_failure(err);
    match failure_type {
        FailureType::Expected => tracing::info!(
            component = %Component::Chat, operation, failure = %failure_type, error = %err,
            "platform call failed"
        ),
        FailureType::Unexpected => tracing::error!(
            component = %Component::Chat, operation, failure = %failure_type, error = %err,
            "platform call failed"
        ),
        FailureType::Unknown => tracing::warn!(
            component = %Component::Chat, operation, failure = %failure_type, error = %err,
            "platform call failed"
        ),
    }
}

// ---------------------------------------------------------------------------
// Subscriber Setup
// ---------------------------------------------------------------------------

/// Initialize the global subscriber.
///
/// `RUST_LOG` takes precedence over `level`. When `log_file` is set, events
/// are also appended to it without ANSI colouring.
pub fn init_logging(
    level: &str,
    log_file: Option<&str>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(level))?;

    let file_layer = match log_file {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            Some(
                tracing_fmt::layer()
                    .with_ansi(false)
                    .with_writer(Mutex::new(file)),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_fmt::layer().with_target(false))
        .with(file_layer)
        .try_init()?;

    Ok(())
}

/// Route panics through the subscriber so they land in the log file too.
/// The runtime keeps running; a panicking task only loses its own work.
pub fn install_panic_hook() {
    std::panic::set_hook(Box::new(|info| {
        let location = info
            .location()
            .map(|l| format!("{}:{}", l.file(), l.line()))
            .unwrap_or_default();
        tracing::error!(component = %Component::System, %location, "panic: {}", info);
    }));
}
