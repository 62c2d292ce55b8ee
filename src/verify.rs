//! Provider Verification Module
//!
//! Probes the configured provider once: a live reading and the session
//! record. Run with `resmon_service verify` before pointing the bot at a new
//! deployment; the report is printed as JSON and summarised on stdout.

use std::time::Instant;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::ingest::{ReadingSource, SessionStore};

// ============================================================================
// Verification Results
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationReport {
    pub timestamp: String,
    pub provider_url: String,
    pub reading: CheckResult,
    pub session: CheckResult,
    pub status: VerificationStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckResult {
    pub status: VerificationStatus,
    pub latency_ms: u64,
    pub detail: Option<String>,
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub enum VerificationStatus {
    Success,
    PartialSuccess,
    Failed,
}

impl CheckResult {
    fn passed(started: Instant, detail: String) -> Self {
        Self {
            status: VerificationStatus::Success,
            latency_ms: elapsed_ms(started),
            detail: Some(detail),
            error_message: None,
        }
    }

    fn failed(started: Instant, error: String) -> Self {
        Self {
            status: VerificationStatus::Failed,
            latency_ms: elapsed_ms(started),
            detail: None,
            error_message: Some(error),
        }
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

// ============================================================================
// Checks
// ============================================================================

pub async fn verify_reading(source: &dyn ReadingSource) -> CheckResult {
    let started = Instant::now();
    match source.fetch_reading().await {
        Ok(reading) => CheckResult::passed(
            started,
            format!("rate {:.1}% observed {}", reading.rate, reading.observed_at.to_rfc3339()),
        ),
        Err(e) => CheckResult::failed(started, e.to_string()),
    }
}

pub async fn verify_session(store: &dyn SessionStore) -> CheckResult {
    let started = Instant::now();
    match store.get_session().await {
        Ok(Some(session)) => CheckResult::passed(
            started,
            format!(
                "baseline {:.1}% by {} (notified: {})",
                session.baseline_rate, session.started_by, session.notified
            ),
        ),
        Ok(None) => CheckResult::passed(started, "no session stored".to_string()),
        Err(e) => CheckResult::failed(started, e.to_string()),
    }
}

/// Both checks run; the overall status is Success only if both pass and
/// Failed only if both fail.
pub async fn verify_provider(
    source: &dyn ReadingSource,
    store: &dyn SessionStore,
    provider_url: &str,
) -> VerificationReport {
    let (reading, session) = tokio::join!(verify_reading(source), verify_session(store));

    let status = match (reading.status, session.status) {
        (VerificationStatus::Success, VerificationStatus::Success) => VerificationStatus::Success,
        (VerificationStatus::Failed, VerificationStatus::Failed) => VerificationStatus::Failed,
        _ => VerificationStatus::PartialSuccess,
    };

    VerificationReport {
        timestamp: Utc::now().to_rfc3339(),
        provider_url: provider_url.to_string(),
        reading,
        session,
        status,
    }
}

pub fn print_summary(report: &VerificationReport) {
    println!("\n═══════════════════════════════════════════════════════════");
    println!("📊 PROVIDER VERIFICATION");
    println!("═══════════════════════════════════════════════════════════");
    println!("Provider: {}", report.provider_url);
    print_check("Reading", &report.reading);
    print_check("Session", &report.session);
    println!("Overall:  {:?}", report.status);
    println!("═══════════════════════════════════════════════════════════\n");
}

fn print_check(label: &str, check: &CheckResult) {
    match check.status {
        VerificationStatus::Failed => println!(
            "{label}:  ✗ FAILED in {} ms: {}",
            check.latency_ms,
            check.error_message.as_deref().unwrap_or("Unknown")
        ),
        _ => println!(
            "{label}:  ✓ OK in {} ms ({})",
            check.latency_ms,
            check.detail.as_deref().unwrap_or("")
        ),
    }
}
