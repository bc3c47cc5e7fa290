//! HTTP surface.
//!
//! `GET /` welcome payload, and under `/api/get-air-quality`:
//! - `GET /{longitude}/{latitude}` live lookup through the provider;
//! - `GET /paris-most-polluted-time` historical peak from the store.
//!
//! Every failure becomes a `{"error": "<message>"}` body.

use crate::logging::{self, DataSource};
use crate::model::{AirQualityResponse, Coordinate, format_timestamp};
use crate::service::QueryService;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{Value, json};

/// Mount point of the query routes; existing clients call them under this prefix.
pub const API_PREFIX: &str = "/api/get-air-quality";
pub const NOT_A_NUMBER_MESSAGE: &str = "Longitude and Latitude must be a Number";
pub const NO_DATA_MESSAGE: &str = "No data Found";

#[derive(Clone)]
pub struct AppState {
    pub query: QueryService,
}

/// A status plus the message placed in `{"error": ...}`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        ApiError {
            status,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route("/paris-most-polluted-time", get(most_polluted_time))
        .route("/:longitude/:latitude", get(air_quality));

    Router::new()
        .route("/", get(welcome))
        .nest(API_PREFIX, api)
        .with_state(state)
}

async fn welcome() -> Json<Value> {
    Json(json!({ "message": "Hello There!" }))
}

/// Both segments must parse as numbers and form a finite `Coordinate`.
fn parse_coordinate(longitude: &str, latitude: &str) -> Option<Coordinate> {
    let longitude = longitude.trim().parse::<f64>().ok()?;
    let latitude = latitude.trim().parse::<f64>().ok()?;
    Coordinate::new(longitude, latitude)
}

async fn air_quality(
    State(state): State<AppState>,
    Path((longitude, latitude)): Path<(String, String)>,
) -> Result<Json<AirQualityResponse>, ApiError> {
    let Some(at) = parse_coordinate(&longitude, &latitude) else {
        return Err(ApiError::new(StatusCode::BAD_REQUEST, NOT_A_NUMBER_MESSAGE));
    };

    match state.query.get_current(at.longitude, at.latitude).await {
        Ok(response) => Ok(Json(response)),
        Err(err) => {
            let location = format!("{},{}", at.longitude, at.latitude);
            let operation = format!("Live lookup via {}", state.query.provider_name());
            logging::log_failure(Some(location.as_str()), &operation, &err, &err.to_string());
            Err(ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, err.to_string()))
        }
    }
}

async fn most_polluted_time(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    match state.query.get_historical_peak().await {
        Ok(Some(ts)) => Ok(Json(json!({ "data": format_timestamp(&ts) }))),
        Ok(None) => Err(ApiError::new(StatusCode::NOT_FOUND, NO_DATA_MESSAGE)),
        Err(err) => {
            logging::error(DataSource::Http, None, &format!("Peak query failed: {}", err));
            Err(ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, err.to_string()))
        }
    }
}
