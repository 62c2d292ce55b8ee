//! Bounded remote calls.
//!
//! Every provider request goes through [`bounded`], so a slow upstream
//! resolves to [`FetchError::Timeout`] instead of hanging the caller.

use std::future::Future;
use std::time::Duration;

use crate::error::FetchError;

/// Runs `call` with an upper bound on its duration.
pub async fn bounded<T, F>(timeout: Duration, call: F) -> Result<T, FetchError>
where
    F: Future<Output = Result<T, FetchError>>,
{
    match tokio::time::timeout(timeout, call).await {
        Ok(result) => result,
        Err(_) => Err(FetchError::Timeout(timeout)),
    }
}

/// Maps a transport error onto the fetch taxonomy.
pub fn from_reqwest(err: reqwest::Error, timeout: Duration) -> FetchError {
    if err.is_timeout() {
        FetchError::Timeout(timeout)
    } else if err.is_decode() {
        FetchError::Upstream(format!("malformed payload: {err}"))
    } else if let Some(status) = err.status() {
        FetchError::Upstream(format!("HTTP {}", status.as_u16()))
    } else {
        FetchError::Network(err.to_string())
    }
}
