//! HTTP surface of the booking service.
//!
//! JSON endpoints:
//! - `GET  /rooms`                  all rooms, or free rooms for `checkIn`/`checkOut`/`type`
//! - `GET  /bookings`               bookings newest first plus occupancy stats
//! - `POST /bookings/{id}/status`   move a booking through its lifecycle
//! - `GET  /calls`                  latest call log entries
//! - `POST /chat`                   chat concierge reply
//! - `POST /call`                   start an outbound assistant call
//! - `GET  /call/transcript`        live transcript as server-sent events
//! - `POST /assistant/tools`        voice assistant function calls
//!
//! Call control (TeXML): `POST /voice/inbound`, `/voice/gather`, `/voice/confirm`.
//! HTML: `GET /dashboard`.

use std::sync::Arc;

use axum::{
    extract::{FromRequest, Request},
    http::{header, StatusCode},
    routing::{get, post},
    Form, Json, Router,
};
use serde::Serialize;
use serde_json::{Map, Value};
use tera::Tera;
use tracing::error;
use uuid::Uuid;

use horizon_agent::{ConciergeRuntime, ToolRegistry};
use horizon_core::config::TranscriptConfig;
use horizon_core::errors::{ApplicationError, InterfaceError};
use horizon_db::repositories::{
    BookingRepository, CallLogRepository, RepositoryError, RoomRepository,
};
use horizon_telnyx::Telephony;

pub mod assistant;
pub mod calls;
pub mod chat;
pub mod dashboard;
pub mod hotel;
pub mod voice;

#[derive(Clone)]
pub struct AppState {
    pub rooms: Arc<dyn RoomRepository>,
    pub bookings: Arc<dyn BookingRepository>,
    pub call_logs: Arc<dyn CallLogRepository>,
    pub telephony: Arc<dyn Telephony>,
    pub concierge: Arc<ConciergeRuntime>,
    pub tools: Arc<ToolRegistry>,
    pub templates: Arc<Tera>,
    pub transcript: TranscriptConfig,
    pub public_base_url: Option<String>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/rooms", get(hotel::list_rooms))
        .route("/bookings", get(hotel::list_bookings))
        .route("/bookings/{id}/status", post(hotel::update_booking_status))
        .route("/calls", get(calls::list_calls))
        .route("/chat", post(chat::chat))
        .route("/call", post(calls::start_call))
        .route("/call/transcript", get(calls::transcript))
        .route("/assistant/tools", post(assistant::tools))
        .route("/voice/inbound", post(voice::inbound))
        .route("/voice/gather", post(voice::gather))
        .route("/voice/confirm", post(voice::confirm))
        .route("/dashboard", get(dashboard::dashboard))
        .with_state(state)
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
}

pub type ApiFailure = (StatusCode, Json<ApiError>);

pub(crate) fn bad_request(message: impl Into<String>) -> ApiFailure {
    (StatusCode::BAD_REQUEST, Json(ApiError { error: message.into(), correlation_id: None }))
}

pub(crate) fn interface_failure(error: InterfaceError) -> ApiFailure {
    let status = match &error {
        InterfaceError::BadRequest { .. } => StatusCode::BAD_REQUEST,
        InterfaceError::NotFound { .. } => StatusCode::NOT_FOUND,
        InterfaceError::Conflict { .. } => StatusCode::CONFLICT,
        InterfaceError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
        InterfaceError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status.is_server_error() {
        error!(
            event_name = "http.request.failed",
            correlation_id = error.correlation_id(),
            error = %error,
        );
    }
    (
        status,
        Json(ApiError {
            error: error.message().to_string(),
            correlation_id: Some(error.correlation_id().to_string()),
        }),
    )
}

pub(crate) fn application_failure(error: ApplicationError) -> ApiFailure {
    interface_failure(error.into_interface(correlation_id()))
}

pub(crate) fn repository_failure(error: RepositoryError) -> ApiFailure {
    application_failure(match error {
        RepositoryError::Domain(domain) => ApplicationError::Domain(domain),
        other => ApplicationError::Persistence(other.to_string()),
    })
}

pub(crate) fn correlation_id() -> String {
    Uuid::new_v4().simple().to_string()
}

/// A webhook body that may arrive as JSON or as a urlencoded form. Bodies that
/// fail to decode are treated as empty.
pub struct WebhookPayload(pub Value);

impl<S> FromRequest<S> for WebhookPayload
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_form = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value.starts_with("application/x-www-form-urlencoded"));

        let value = if is_form {
            match Form::<Vec<(String, String)>>::from_request(req, state).await {
                Ok(Form(fields)) => Value::Object(
                    fields.into_iter().map(|(key, value)| (key, Value::String(value))).collect::<Map<_, _>>(),
                ),
                Err(_) => Value::Null,
            }
        } else {
            match Json::<Value>::from_request(req, state).await {
                Ok(Json(value)) => value,
                Err(_) => Value::Null,
            }
        };
        Ok(Self(value))
    }
}

impl WebhookPayload {
    /// First non-empty string found at any of the JSON pointers.
    pub fn text(&self, pointers: &[&str]) -> Option<String> {
        pointers
            .iter()
            .find_map(|pointer| self.0.pointer(pointer).and_then(Value::as_str))
            .map(str::trim)
            .filter(|text| !text.is_empty())
            .map(str::to_string)
    }
}
