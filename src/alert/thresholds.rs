//! Alert threshold math.
//!
//! Every derived quantity is a pure function of a session and a reading and
//! is recomputed on demand; nothing here is persisted. No rounding happens in
//! this module; display rounding belongs to `chat::render`.

use crate::config::Config;
use crate::model::{Reading, Session, Tier};

/// Alert threshold and the display margins for status tiers, all in
/// percentage points of the same units as the baseline.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlertPolicy {
    pub alert_decrease: f64,
    pub caution_margin: f64,
    pub imminent_margin: f64,
}

impl Default for AlertPolicy {
    fn default() -> Self {
        Self {
            alert_decrease: crate::config::DEFAULT_ALERT_DECREASE,
            caution_margin: crate::config::DEFAULT_CAUTION_MARGIN,
            imminent_margin: crate::config::DEFAULT_IMMINENT_MARGIN,
        }
    }
}

impl AlertPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            alert_decrease: config.alert_decrease,
            caution_margin: config.caution_margin,
            imminent_margin: config.imminent_margin,
        }
    }

    /// The rate at which an alert fires for a given baseline.
    pub fn notify_line(&self, baseline_rate: f64) -> f64 {
        baseline_rate - self.alert_decrease
    }

    /// Signed drop since the baseline; negative when the reservoir has risen.
    pub fn decrease(session: &Session, reading: &Reading) -> f64 {
        session.baseline_rate - reading.rate
    }

    /// Distance left before the alert line; zero or negative once crossed.
    pub fn remaining(&self, session: &Session, reading: &Reading) -> f64 {
        reading.rate - self.notify_line(session.baseline_rate)
    }

    /// Share of the alert threshold already consumed, in 0..=100.
    ///
    /// A rise since the baseline counts as no progress.
    pub fn progress(&self, decrease: f64) -> f64 {
        (decrease / self.alert_decrease * 100.0).clamp(0.0, 100.0)
    }

    /// Inclusive comparison: a decrease of exactly the threshold alerts.
    pub fn is_breached(&self, decrease: f64) -> bool {
        decrease >= self.alert_decrease
    }

    pub fn tier(&self, remaining: f64) -> Tier {
        if remaining <= 0.0 {
            Tier::Alerted
        } else if remaining <= self.imminent_margin {
            Tier::Imminent
        } else if remaining <= self.caution_margin {
            Tier::Caution
        } else {
            Tier::Normal
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
