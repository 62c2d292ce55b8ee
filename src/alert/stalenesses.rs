//! Reading staleness detection.
//!
//! The provider normally refreshes the reservoir figures several times a
//! day. A reading far older than that usually means the upstream source
//! stopped updating, which is worth showing next to any status report.
//! Staleness is informational only: it never suppresses or triggers alerts.
//!
//! # Clock injection
//! `is_stale_at` accepts a `now: DateTime<Utc>` parameter rather than calling
//! `Utc::now()` internally, so tests stay deterministic.

use chrono::{DateTime, Utc};

use crate::model::Reading;

// ---------------------------------------------------------------------------
// Staleness check
// ---------------------------------------------------------------------------

/// Returns `true` if the reading was observed more than `max_age_minutes`
/// before `now`.
///
/// Staleness is defined as strictly greater than the threshold:
///   age > max_age_minutes  →  stale
///   age == max_age_minutes →  not stale
///
/// A reading stamped in the future (clock skew upstream) is not stale.
pub fn is_stale_at(reading: &Reading, max_age_minutes: u64, now: DateTime<Utc>) -> bool {
    let age_minutes = (now - reading.observed_at).num_minutes();
    age_minutes > 0 && age_minutes as u64 > max_age_minutes
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
