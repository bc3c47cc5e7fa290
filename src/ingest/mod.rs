//! Data ingestion for the air quality monitoring service.
//!
//! Submodules:
//! - `iqair`: HTTP client for the IQAir AirVisual API.
//! - `job`: the per-tick fetch-then-store task driven by the scheduler.

pub mod iqair;
pub mod job;

use crate::model::{AirQualityError, Reading};
use async_trait::async_trait;

/// A source of current air-quality readings.
///
/// One call is one upstream request: implementations do not retry,
/// back off, or cache.
#[async_trait]
pub trait AirQualityProvider: Send + Sync {
    /// Fetch the current reading nearest to the given point.
    ///
    /// Fails with `InvalidCoordinates` when the provider rejects the point
    /// and `ProviderUnavailable` for everything else.
    async fn fetch_current(&self, longitude: f64, latitude: f64)
    -> Result<Reading, AirQualityError>;

    /// Name used in log lines.
    fn provider_name(&self) -> &str {
        "provider"
    }
}
