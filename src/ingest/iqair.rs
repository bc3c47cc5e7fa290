/// IQAir (AirVisual) Data API Client
///
/// Retrieves the current pollution block for the city nearest to a
/// coordinate pair. Used both by the scheduled ingestion job and by the
/// live lookup route.
///
/// API Documentation: https://api-docs.iqair.com/
/// Nearest city: GET {base}/v2/nearest_city?lat=..&lon=..&key=..

use crate::config::ProviderConfig;
use crate::ingest::AirQualityProvider;
use crate::model::{
    AirQualityError, NearestCityResponse, Reading, INVALID_COORDINATES_MESSAGE,
    NON_NUMERIC_COORDINATES_MESSAGE,
};
use async_trait::async_trait;
use reqwest::StatusCode;

// ============================================================================
// API Client
// ============================================================================

/// Stateless client; each `fetch_current` is exactly one GET.
#[derive(Debug, Clone)]
pub struct IqAirClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl IqAirClient {
    /// Build a client with the transport defaults (no timeout override).
    pub fn new(config: &ProviderConfig) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder().build()?;
        Ok(Self::with_http_client(http, config))
    }

    pub fn with_http_client(http: reqwest::Client, config: &ProviderConfig) -> Self {
        IqAirClient {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        }
    }

    /// Endpoint without the query string (the query carries the key).
    pub fn nearest_city_url(&self) -> String {
        format!("{}/v2/nearest_city", self.base_url)
    }
}

/// reqwest puts the full URL in its messages; ours contains the API key.
fn unavailable(err: reqwest::Error) -> AirQualityError {
    AirQualityError::ProviderUnavailable(err.without_url().to_string())
}

#[async_trait]
impl AirQualityProvider for IqAirClient {
    async fn fetch_current(
        &self,
        longitude: f64,
        latitude: f64,
    ) -> Result<Reading, AirQualityError> {
        if !longitude.is_finite() || !latitude.is_finite() {
            return Err(AirQualityError::InvalidCoordinates(
                NON_NUMERIC_COORDINATES_MESSAGE.to_string(),
            ));
        }

        let response = self
            .http
            .get(self.nearest_city_url())
            .query(&[
                ("lat", latitude.to_string()),
                ("lon", longitude.to_string()),
                ("key", self.api_key.clone()),
            ])
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(unavailable)?;

        let status = response.status();
        if status == StatusCode::BAD_REQUEST {
            return Err(AirQualityError::InvalidCoordinates(
                INVALID_COORDINATES_MESSAGE.to_string(),
            ));
        }
        if !status.is_success() {
            return Err(AirQualityError::ProviderUnavailable(format!(
                "Request failed with status code {}",
                status.as_u16()
            )));
        }

        let body: NearestCityResponse = response.json().await.map_err(unavailable)?;
        Ok(body.data.current.pollution)
    }

    fn provider_name(&self) -> &str {
        "iqair"
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn client(base_url: &str) -> IqAirClient {
        IqAirClient::new(&ProviderConfig {
            api_key: "test-key".to_string(),
            base_url: base_url.to_string(),
        })
        .unwrap()
    }

    #[test]
    fn test_nearest_city_url_strips_trailing_slash() {
        assert_eq!(
            client("http://api.airvisual.com/").nearest_city_url(),
            "http://api.airvisual.com/v2/nearest_city"
        );
        assert_eq!(
            client("http://api.airvisual.com").nearest_city_url(),
            "http://api.airvisual.com/v2/nearest_city"
        );
    }

    #[test]
    fn test_provider_name_tags_log_lines() {
        let client = client("http://api.airvisual.com");
        let query = crate::service::QueryService::new(
            std::sync::Arc::new(client),
            std::sync::Arc::new(crate::db::MemoryReadingStore::new()),
        );
        assert_eq!(query.provider_name(), "iqair");
    }

    #[tokio::test]
    async fn test_non_finite_coordinates_fail_before_any_request() {
        // Unroutable base URL: reaching the network would yield ProviderUnavailable.
        let client = client("http://127.0.0.1:9");
        let err = client.fetch_current(f64::NAN, 48.856613).await.unwrap_err();
        assert_eq!(
            err,
            AirQualityError::InvalidCoordinates(NON_NUMERIC_COORDINATES_MESSAGE.to_string())
        );

        let err = client.fetch_current(2.352222, f64::INFINITY).await.unwrap_err();
        assert!(matches!(err, AirQualityError::InvalidCoordinates(_)));
    }

    #[tokio::test]
    async fn test_transport_failure_is_provider_unavailable_without_key() {
        let client = client("http://127.0.0.1:9");
        let err = client.fetch_current(2.352222, 48.856613).await.unwrap_err();
        match err {
            AirQualityError::ProviderUnavailable(msg) => {
                assert!(!msg.contains("test-key"), "message leaked the API key: {}", msg);
            }
            other => panic!("expected ProviderUnavailable, got {:?}", other),
        }
    }
}
