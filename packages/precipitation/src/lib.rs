#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Precipitation accumulation over irregular hourly series.
//!
//! [`series::accumulate`] is the pure core: rolling look-back and forward
//! look-ahead sums where an empty window is unknown rather than zero.
//! [`acquire::PrecipitationAcquirer`] wraps it in the live / cache /
//! archive / stale / fallback acquisition chain.

pub mod acquire;
pub mod feed;
pub mod series;
pub mod summary;

use backcountry_source::SourceError;

pub use series::{AccumulationMode, HourlySeries, SeriesError, accumulate};
pub use summary::{PrecipitationPayload, summarize_precipitation};

/// Errors from precipitation feeds.
#[derive(Debug, thiserror::Error)]
pub enum PrecipitationError {
    #[error(transparent)]
    Source(#[from] SourceError),

    #[error("Invalid hourly series: {0}")]
    Series(#[from] SeriesError),

    #[error("Missing field in precipitation payload: {field}")]
    MissingField { field: &'static str },
}
