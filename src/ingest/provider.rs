//! Reservoir Provider API Client
//!
//! The provider is a single HTTP GET endpoint that both reports the current
//! reservoir reading and stores the monitoring session. Requests select an
//! operation with the `action` query parameter:
//!
//! - `status`: current reading
//! - `start`: create or reset the session (`username`, `baseline`)
//! - `session`: current session, or `null`
//! - `notify`: latch the session's notified flag
//!
//! Every response is a JSON object with a top-level `success` flag.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde::de::{DeserializeOwned, IgnoredAny};

use crate::error::FetchError;
use crate::ingest::{CreatedSession, ReadingSource, SessionStore};
use crate::logging::{Component, log_fetch_failure};
use crate::model::{Reading, Session};
use crate::remote::{bounded, from_reqwest};

// ============================================================================
// Provider API Response Structures
// ============================================================================

/// Response to `action=status`
#[derive(Debug, Deserialize)]
pub struct StatusResponse {
    pub data: Option<ReadingPayload>,
}

/// Reading as reported by the provider
#[derive(Debug, Deserialize)]
pub struct ReadingPayload {
    pub rate: f64,
    pub volume: f64,
    pub inflow: f64,
    pub outflow: f64,
    pub timestamp: String, // RFC 3339
}

/// Response to `action=start`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartResponse {
    pub was_reset: bool,
    pub session: Session,
}

/// Response to `action=session`
#[derive(Debug, Deserialize)]
pub struct SessionResponse {
    #[serde(default)]
    pub session: Option<Session>,
}

// ============================================================================
// API Client
// ============================================================================

pub struct ProviderClient {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl ProviderClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FetchError::Network(format!("could not build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.to_string(),
            timeout,
        })
    }

    /// Issues one `action` request and decodes its success envelope.
    async fn call<T: DeserializeOwned>(
        &self,
        action: &str,
        params: &[(&str, String)],
    ) -> Result<T, FetchError> {
        let result = bounded(self.timeout, async {
            let response = self
                .client
                .get(&self.base_url)
                .header("Accept", "application/json")
                .query(&[("action", action)])
                .query(params)
                .send()
                .await
                .map_err(|e| from_reqwest(e, self.timeout))?;

            if !response.status().is_success() {
                return Err(FetchError::Upstream(format!(
                    "HTTP {}",
                    response.status().as_u16()
                )));
            }

            let body = response
                .text()
                .await
                .map_err(|e| from_reqwest(e, self.timeout))?;
            parse_envelope(&body)
        })
        .await;

        if let Err(ref e) = result {
            let component = if action == "status" {
                Component::Provider
            } else {
                Component::Store
            };
            log_fetch_failure(component, action, e);
        }
        result
    }
}

#[async_trait]
impl ReadingSource for ProviderClient {
    async fn fetch_reading(&self) -> Result<Reading, FetchError> {
        let response: StatusResponse = self.call("status", &[]).await?;
        let payload = response
            .data
            .ok_or_else(|| FetchError::Upstream("status response has no data".to_string()))?;
        parse_reading(payload)
    }
}

#[async_trait]
impl SessionStore for ProviderClient {
    async fn create_or_reset(
        &self,
        baseline_rate: f64,
        initiator: &str,
    ) -> Result<CreatedSession, FetchError> {
        let params = [
            ("username", initiator.to_string()),
            ("baseline", baseline_rate.to_string()),
        ];
        let response: StartResponse = self.call("start", &params).await?;
        Ok(CreatedSession {
            session: response.session,
            was_reset: response.was_reset,
        })
    }

    async fn get_session(&self) -> Result<Option<Session>, FetchError> {
        let response: SessionResponse = self.call("session", &[]).await?;
        Ok(response.session)
    }

    async fn mark_notified(&self) -> Result<(), FetchError> {
        let _: IgnoredAny = self.call("notify", &[]).await?;
        Ok(())
    }
}

// ============================================================================
// Parsing
// ============================================================================

/// Decode a provider body, turning `success: false` into an upstream error.
pub fn parse_envelope<T: DeserializeOwned>(body: &str) -> Result<T, FetchError> {
    let value: serde_json::Value = serde_json::from_str(body)
        .map_err(|e| FetchError::Upstream(format!("malformed payload: {e}")))?;

    match value.get("success").and_then(serde_json::Value::as_bool) {
        Some(true) => serde_json::from_value(value)
            .map_err(|e| FetchError::Upstream(format!("malformed payload: {e}"))),
        Some(false) => {
            let reason = value
                .get("error")
                .and_then(serde_json::Value::as_str)
                .unwrap_or("provider reported failure");
            Err(FetchError::Upstream(reason.to_string()))
        }
        None => Err(FetchError::Upstream(
            "response has no success flag".to_string(),
        )),
    }
}

/// Validate a provider reading and convert it into our format
pub fn parse_reading(payload: ReadingPayload) -> Result<Reading, FetchError> {
    if !payload.rate.is_finite() || !(0.0..=100.0).contains(&payload.rate) {
        return Err(FetchError::Upstream(format!(
            "rate out of range: {}",
            payload.rate
        )));
    }

    let observed_at = DateTime::parse_from_rfc3339(&payload.timestamp)
        .map_err(|e| {
            FetchError::Upstream(format!("bad timestamp {:?}: {e}", payload.timestamp))
        })?
        .with_timezone(&Utc);

    Ok(Reading {
        rate: payload.rate,
        volume: payload.volume,
        inflow: payload.inflow,
        outflow: payload.outflow,
        observed_at,
    })
}

// ============================================================================
// Tests
// ============================================================================
