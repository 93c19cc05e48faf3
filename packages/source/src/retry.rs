//! HTTP retry helpers for transient errors.
//!
//! Provider fetchers use [`send_json`] or [`send_json_mirrored`] instead of
//! calling `reqwest::RequestBuilder::send()` directly, so every request
//! gets a bounded retry loop with exponential backoff for transient
//! failures (timeouts, connection resets, server errors, rate limiting,
//! truncated bodies).
//!
//! # Usage
//!
//! ```ignore
//! use backcountry_source::retry::{self, RetryPolicy};
//!
//! let policy = RetryPolicy::default();
//!
//! // One host
//! let body = retry::send_json(|| client.get(&url), &policy).await?;
//!
//! // Mirrored hosts, tried in order until one answers
//! let (body, host) = retry::send_json_mirrored(&hosts, |host| {
//!     client.get(format!("{host}/v1/forecast")).query(&params)
//! }, &policy).await?;
//! ```

use std::time::Duration;

use crate::SourceError;

/// Maximum length of the response body preview included in error logs.
const BODY_PREVIEW_LEN: usize = 300;

/// Bounds for one retry loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts per host, including the first. Never less than one.
    pub attempts: u32,
    /// Delay before the second attempt; doubles on each further attempt.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            base_delay: Duration::from_millis(250),
        }
    }
}

impl RetryPolicy {
    /// A policy that retries without sleeping. Used in tests.
    #[must_use]
    pub const fn immediate(attempts: u32) -> Self {
        Self {
            attempts,
            base_delay: Duration::ZERO,
        }
    }

    fn delay_before(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        self.base_delay
            .saturating_mul(1u32 << (attempt - 1).min(10))
    }
}

/// Sends an HTTP request and parses the response body as JSON.
///
/// The `build_request` closure is called on each attempt to construct a
/// fresh [`reqwest::RequestBuilder`] (since builders are consumed by
/// `.send()`).
///
/// Retries connection errors, timeouts, HTTP 429, HTTP 5xx, and bodies
/// that fail to decode as JSON, up to `policy.attempts` total attempts.
/// HTTP 4xx (except 429) is permanent and returned immediately.
///
/// # Errors
///
/// Returns the last [`SourceError`] once every attempt has failed, or the
/// first permanent error.
#[allow(clippy::future_not_send)]
pub async fn send_json<F>(
    build_request: F,
    policy: &RetryPolicy,
) -> Result<serde_json::Value, SourceError>
where
    F: Fn() -> reqwest::RequestBuilder,
{
    let attempts = policy.attempts.max(1);
    let mut last_error: Option<SourceError> = None;

    for attempt in 0..attempts {
        let delay = policy.delay_before(attempt);
        if attempt > 0 {
            log::warn!("  retry {attempt}/{} in {delay:?}...", attempts - 1);
            tokio::time::sleep(delay).await;
        }

        match attempt_json(&build_request).await {
            Ok(value) => return Ok(value),
            Err(Attempt::Permanent(e)) => return Err(e),
            Err(Attempt::Transient(e)) => {
                log::warn!("  transient error: {e}");
                last_error = Some(e);
            }
        }
    }

    Err(last_error.unwrap_or_else(|| {
        SourceError::normalization("request failed after all retries")
    }))
}

/// Sends the same logical request against each mirrored host in order,
/// with a full [`send_json`] retry loop per host.
///
/// Returns the parsed body together with the host that answered.
///
/// # Errors
///
/// Returns the error from the last host once every host has been
/// exhausted, or a normalization error if `hosts` is empty.
#[allow(clippy::future_not_send)]
pub async fn send_json_mirrored<'a, F>(
    hosts: &'a [String],
    build_request: F,
    policy: &RetryPolicy,
) -> Result<(serde_json::Value, &'a str), SourceError>
where
    F: Fn(&str) -> reqwest::RequestBuilder,
{
    let mut last_error = None;

    for host in hosts {
        match send_json(|| build_request(host), policy).await {
            Ok(value) => return Ok((value, host.as_str())),
            Err(e) => {
                log::warn!("host {host} exhausted: {e}");
                last_error = Some(e);
            }
        }
    }

    Err(last_error.unwrap_or_else(|| SourceError::normalization("no hosts configured")))
}

enum Attempt {
    Transient(SourceError),
    Permanent(SourceError),
}

#[allow(clippy::future_not_send)]
async fn attempt_json<F>(build_request: &F) -> Result<serde_json::Value, Attempt>
where
    F: Fn() -> reqwest::RequestBuilder,
{
    let response = match build_request().send().await {
        Ok(response) => response,
        Err(e) if is_transient(&e) => return Err(Attempt::Transient(SourceError::Http(e))),
        Err(e) => return Err(Attempt::Permanent(SourceError::Http(e))),
    };

    let status = response.status();
    let url = response.url().to_string();

    // 429 Too Many Requests and 5xx are retried; other 4xx are permanent.
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        return Err(Attempt::Transient(SourceError::Status {
            status: status.as_u16(),
            url,
        }));
    }
    if status.is_client_error() {
        return Err(Attempt::Permanent(SourceError::Status {
            status: status.as_u16(),
            url,
        }));
    }

    // Read the raw body as text first so the log can show what arrived.
    let text = response
        .text()
        .await
        .map_err(|e| Attempt::Transient(SourceError::Http(e)))?;

    serde_json::from_str(&text).map_err(|json_err| {
        let preview: String = text.chars().take(BODY_PREVIEW_LEN).collect();
        log::warn!(
            "JSON parse failed\n  \
             url: {url}\n  \
             status: {status}\n  \
             received: {} bytes\n  \
             parse error: {json_err}\n  \
             body preview: {preview}",
            text.len(),
        );
        Attempt::Transient(SourceError::Json(json_err))
    })
}

/// Returns `true` if the error is likely transient and worth retrying.
fn is_transient(e: &reqwest::Error) -> bool {
    e.is_timeout() || e.is_connect() || e.is_body() || e.is_decode() || e.is_request()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_from_base_delay() {
        let policy = RetryPolicy {
            attempts: 4,
            base_delay: Duration::from_millis(100),
        };
        assert_eq!(policy.delay_before(0), Duration::ZERO);
        assert_eq!(policy.delay_before(1), Duration::from_millis(100));
        assert_eq!(policy.delay_before(2), Duration::from_millis(200));
        assert_eq!(policy.delay_before(3), Duration::from_millis(400));
    }

    #[test]
    fn immediate_policy_never_sleeps() {
        let policy = RetryPolicy::immediate(3);
        assert_eq!(policy.delay_before(2), Duration::ZERO);
    }

    #[tokio::test]
    async fn mirrored_send_with_no_hosts_is_an_error() {
        let client = reqwest::Client::new();
        let result = send_json_mirrored(
            &[],
            |host| client.get(host.to_string()),
            &RetryPolicy::immediate(1),
        )
        .await;
        assert!(matches!(result, Err(SourceError::Normalization { .. })));
    }
}
