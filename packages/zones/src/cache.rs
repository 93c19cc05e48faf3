//! TTL cache of the avalanche forecast map layer.
//!
//! The map layer is one payload for the whole continent, so the cache has
//! a single slot. Refresh failures fall back to the last good layer; only
//! a cold cache surfaces the error.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use backcountry_source::SourceError;
use backcountry_source::cache::{Snapshot, SnapshotCache};
use backcountry_source::deadline::{CancelSignal, with_deadline};
use backcountry_source::retry::{self, RetryPolicy};
use chrono::{DateTime, Duration, Utc};

use crate::layer::parse_map_layer;
use crate::{ForecastZoneFeature, ZoneError};

/// A parsed map layer with its fetch time.
pub type ZoneLayer = Arc<Snapshot<Vec<ForecastZoneFeature>>>;

/// Fetches and parses the current map layer.
#[async_trait]
pub trait ZoneLayerFetcher: Send + Sync {
    /// # Errors
    ///
    /// Returns [`ZoneError`] if the upstream call fails or the payload is
    /// malformed.
    async fn fetch_layer(&self) -> Result<Vec<ForecastZoneFeature>, ZoneError>;
}

/// [`ZoneLayerFetcher`] backed by the avalanche map-layer HTTP endpoint.
#[derive(Debug, Clone)]
pub struct HttpZoneLayerFetcher {
    client: reqwest::Client,
    url: String,
    policy: RetryPolicy,
    timeout: StdDuration,
}

impl HttpZoneLayerFetcher {
    #[must_use]
    pub const fn new(
        client: reqwest::Client,
        url: String,
        policy: RetryPolicy,
        timeout: StdDuration,
    ) -> Self {
        Self {
            client,
            url,
            policy,
            timeout,
        }
    }
}

#[async_trait]
impl ZoneLayerFetcher for HttpZoneLayerFetcher {
    async fn fetch_layer(&self) -> Result<Vec<ForecastZoneFeature>, ZoneError> {
        log::debug!("Fetching avalanche map layer from {}", self.url);
        let body = retry::send_json(
            || self.client.get(&self.url).timeout(self.timeout),
            &self.policy,
        )
        .await?;
        parse_map_layer(&body)
    }
}

/// Single-slot TTL cache of the parsed map layer.
#[derive(Debug)]
pub struct ZoneLayerCache {
    inner: SnapshotCache<(), Vec<ForecastZoneFeature>>,
}

impl ZoneLayerCache {
    #[must_use]
    pub const fn new(ttl: Duration) -> Self {
        Self {
            inner: SnapshotCache::new(ttl),
        }
    }

    /// Returns the cached layer if fresh at `now`, otherwise refreshes it.
    ///
    /// The refresh runs under `timeout`; a refresh that times out falls
    /// back to the last good layer like any other failure.
    ///
    /// # Errors
    ///
    /// Returns the refresh error if no layer was ever fetched, or
    /// [`SourceError::Cancelled`] if `cancel` fires.
    pub async fn get_or_refresh(
        &self,
        fetcher: &dyn ZoneLayerFetcher,
        now: DateTime<Utc>,
        timeout: StdDuration,
        cancel: Option<&CancelSignal>,
    ) -> Result<ZoneLayer, ZoneError> {
        if let Some(layer) = self.inner.fresh(&(), now) {
            return Ok(layer);
        }

        match with_deadline(fetcher.fetch_layer(), timeout, cancel).await {
            Ok(features) => {
                log::info!("Refreshed avalanche map layer: {} zones", features.len());
                Ok(self.inner.replace((), features, now))
            }
            Err(e @ ZoneError::Source(SourceError::Cancelled)) => Err(e),
            Err(e) => match self.inner.any(&()) {
                Some(stale) => {
                    log::warn!(
                        "Map layer refresh failed, serving layer from {}: {e}",
                        stale.fetched_at
                    );
                    Ok(stale)
                }
                None => Err(e),
            },
        }
    }

    /// The last good layer regardless of age.
    #[must_use]
    pub fn last_good(&self) -> Option<ZoneLayer> {
        self.inner.any(&())
    }
}
