//! Alerting: threshold math, reading staleness, and the one-shot dispatcher.

pub mod dispatcher;
pub mod stalenesses;
pub mod thresholds;
