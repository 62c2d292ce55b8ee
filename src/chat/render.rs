//! Display text for command replies and broadcast alerts.
//!
//! This is the only place values are rounded. Percentages are shown to one
//! decimal place; decisions upstream use the unrounded figures.

use chrono::{DateTime, FixedOffset, Utc};

use crate::alert::thresholds::AlertPolicy;
use crate::cache::CachedSession;
use crate::error::{FetchError, StartError};
use crate::model::{Reading, Session, SessionStatus, StartOutcome, Tier};

const BAR_CELLS: usize = 10;

// ---------------------------------------------------------------------------
// Primitives
// ---------------------------------------------------------------------------

pub fn format_rate(rate: f64) -> String {
    format!("{rate:.1}%")
}

pub fn format_time(at: DateTime<Utc>, offset: FixedOffset) -> String {
    at.with_timezone(&offset).format("%Y-%m-%d %H:%M (UTC%:z)").to_string()
}

/// Compact elapsed time, e.g. `2d 3h 5m`. Negative spans show as `0m`.
pub fn format_elapsed(elapsed: chrono::Duration) -> String {
    let total_minutes = elapsed.num_minutes().max(0);
    let days = total_minutes / (24 * 60);
    let hours = (total_minutes / 60) % 24;
    let minutes = total_minutes % 60;

    match (days, hours) {
        (0, 0) => format!("{minutes}m"),
        (0, _) => format!("{hours}h {minutes}m"),
        _ => format!("{days}d {hours}h {minutes}m"),
    }
}

/// Ten-cell bar for a 0–100 progress value.
pub fn progress_bar(progress: f64) -> String {
    let filled = ((progress.clamp(0.0, 100.0) / 100.0) * BAR_CELLS as f64).round() as usize;
    format!(
        "{}{} {:.0}%",
        "■".repeat(filled),
        "□".repeat(BAR_CELLS - filled),
        progress
    )
}

fn tier_line(tier: Tier) -> String {
    let marker = match tier {
        Tier::Normal => "🟢",
        Tier::Caution => "🟡",
        Tier::Imminent => "🟠",
        Tier::Alerted => "🔴",
    };
    format!("{marker} {}", tier.label())
}

fn reading_lines(reading: &Reading, offset: FixedOffset) -> String {
    format!(
        "Storage: **{}** (volume {:.0}, inflow {:.2}, outflow {:.2})\nObserved: {}",
        format_rate(reading.rate),
        reading.volume,
        reading.inflow,
        reading.outflow,
        format_time(reading.observed_at, offset),
    )
}

// ---------------------------------------------------------------------------
// Command replies
// ---------------------------------------------------------------------------

pub fn start_reply(outcome: &StartOutcome, offset: FixedOffset) -> String {
    let heading = if outcome.was_reset {
        "🔄 Monitoring session reset."
    } else {
        "▶️ Monitoring session started."
    };
    format!(
        "{heading}\nBaseline: **{}** (set by {})\nAlert line: **{}**\n{}",
        format_rate(outcome.session.baseline_rate),
        outcome.session.started_by,
        format_rate(outcome.notify_line),
        reading_lines(&outcome.reading, offset),
    )
}

pub fn status_reply(status: &SessionStatus, offset: FixedOffset) -> String {
    let mut text = format!(
        "📊 Monitoring status: {}\nBaseline: {} → now **{}**\nDecrease: {:.1} pt (alert at {:.1} pt, line {})\nRemaining margin: {:.1} pt\nProgress: {}\nRunning for {} since {} (by {})",
        tier_line(status.tier),
        format_rate(status.session.baseline_rate),
        format_rate(status.reading.rate),
        status.decrease,
        status.session.baseline_rate - status.notify_line,
        format_rate(status.notify_line),
        status.remaining.max(0.0),
        progress_bar(status.progress),
        format_elapsed(status.elapsed),
        format_time(status.session.started_at, offset),
        status.session.started_by,
    );
    if status.session.notified {
        text.push_str("\nAlert already sent for this session.");
    }
    if status.stale {
        text.push_str(&format!(
            "\n⚠️ Reading is stale (observed {}).",
            format_time(status.reading.observed_at, offset)
        ));
    }
    text
}

pub fn now_reply(
    reading: &Reading,
    cached: Option<&CachedSession>,
    stale: bool,
    now: DateTime<Utc>,
    offset: FixedOffset,
) -> String {
    let mut text = format!("💧 Current reading\n{}", reading_lines(reading, offset));
    if stale {
        text.push_str("\n⚠️ This reading is stale.");
    }
    if let Some(cached) = cached {
        text.push_str(&format!(
            "\nLast known baseline: {} (as of {} ago; use status for live figures)",
            format_rate(cached.session.baseline_rate),
            format_elapsed(cached.age(now)),
        ));
    }
    text
}

pub fn no_session_reply() -> String {
    "ℹ️ No monitoring session is active. Use `start` to record the current level as the baseline."
        .to_string()
}

pub fn fetch_failed_reply(action: &str, err: &FetchError) -> String {
    match err {
        FetchError::Timeout(_) => format!(
            "⏳ Sorry, the reservoir data source did not respond in time, so {action} could not complete. Please try again shortly."
        ),
        _ => format!(
            "❌ Sorry, {action} failed because the reservoir data could not be retrieved."
        ),
    }
}

pub fn internal_error_reply() -> String {
    "❌ Sorry, something went wrong while handling that command. Please try again.".to_string()
}

/// Store failures are worded apart from reading failures.
pub fn start_failed_reply(err: &StartError) -> String {
    match err {
        StartError::Reading(e) => fetch_failed_reply("start", e),
        StartError::Store(FetchError::Timeout(_)) => {
            "⏳ Sorry, the session store did not respond in time, so the baseline may not have been saved. Please try `start` again shortly.".to_string()
        }
        StartError::Store(_) => {
            "❌ Sorry, the current level was read but the session store could not save the new baseline. Please try `start` again.".to_string()
        }
    }
}

// ---------------------------------------------------------------------------
// Broadcast alert
// ---------------------------------------------------------------------------

pub fn alert_message(
    reservoir_name: &str,
    session: &Session,
    reading: &Reading,
    policy: &AlertPolicy,
    offset: FixedOffset,
) -> String {
    format!(
        "@everyone 🚨 **{reservoir_name}: storage has dropped {:.1} pt from the baseline.**\nBaseline {} → now **{}** (alert line {})\nSession started {} by {}\nObserved: {}",
        AlertPolicy::decrease(session, reading),
        format_rate(session.baseline_rate),
        format_rate(reading.rate),
        format_rate(policy.notify_line(session.baseline_rate)),
        format_time(session.started_at, offset),
        session.started_by,
        format_time(reading.observed_at, offset),
    )
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
