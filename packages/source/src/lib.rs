#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Shared plumbing for upstream data providers.
//!
//! Every provider fetch goes through the helpers in this crate:
//!
//! - [`retry`]: bounded retry loops, including fail-over across mirrored
//!   hosts.
//! - [`deadline`]: per-call timeouts composed with an optional caller
//!   [`deadline::CancelSignal`].
//! - [`cache`]: TTL-bounded snapshot caches with atomic replace-on-refresh
//!   and stale reads.
//! - [`service_registry`]: compile-time embedded service configurations.

pub mod cache;
pub mod deadline;
pub mod retry;
pub mod service_registry;

use std::time::Duration;

/// Errors that can occur while talking to an upstream provider.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// The provider answered with a non-success status.
    #[error("HTTP {status} from {url}")]
    Status {
        /// Response status code.
        status: u16,
        /// Requested URL.
        url: String,
    },

    /// The response could not be normalized into a signal record.
    #[error("Normalization error: {message}")]
    Normalization {
        /// Description of what went wrong.
        message: String,
    },

    /// The call did not finish within its deadline.
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// The caller cancelled the request.
    #[error("cancelled by caller")]
    Cancelled,
}

impl SourceError {
    /// Shorthand for a [`SourceError::Normalization`] error.
    #[must_use]
    pub fn normalization(message: impl Into<String>) -> Self {
        Self::Normalization {
            message: message.into(),
        }
    }
}

/// Builds the shared HTTP client used by every provider.
///
/// # Errors
///
/// Returns [`SourceError::Http`] if the TLS backend cannot be initialised.
pub fn build_client(user_agent: &str, timeout: Duration) -> Result<reqwest::Client, SourceError> {
    Ok(reqwest::Client::builder()
        .user_agent(user_agent)
        .timeout(timeout)
        .build()?)
}
