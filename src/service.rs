//! Read-only query facade used by the HTTP surface.

use crate::db::ReadingStore;
use crate::ingest::AirQualityProvider;
use crate::model::{AirQualityError, AirQualityResponse};
use chrono::{DateTime, Utc};
use std::sync::Arc;

#[derive(Clone)]
pub struct QueryService {
    provider: Arc<dyn AirQualityProvider>,
    store: Arc<dyn ReadingStore>,
}

impl QueryService {
    pub fn new(provider: Arc<dyn AirQualityProvider>, store: Arc<dyn ReadingStore>) -> Self {
        QueryService { provider, store }
    }

    pub fn provider_name(&self) -> &str {
        self.provider.provider_name()
    }

    /// Live passthrough to the provider; errors propagate unchanged.
    pub async fn get_current(
        &self,
        longitude: f64,
        latitude: f64,
    ) -> Result<AirQualityResponse, AirQualityError> {
        let reading = self.provider.fetch_current(longitude, latitude).await?;
        Ok(AirQualityResponse::from(reading))
    }

    /// Timestamp of the most polluted stored reading. `Ok(None)` means the
    /// store is empty, which is not an error.
    pub async fn get_historical_peak(&self) -> Result<Option<DateTime<Utc>>, AirQualityError> {
        self.store.most_polluted().await
    }
}
