use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use futures_util::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use horizon_core::domain::call_log::CallLog;
use horizon_telnyx::{GatewayError, TranscriptPoller};

use super::{bad_request, repository_failure, ApiError, ApiFailure, AppState};

const MIN_PHONE_LENGTH: usize = 8;
const CALL_LOG_PAGE: u32 = 50;

#[derive(Debug, Deserialize)]
pub struct CallRequest {
    #[serde(default)]
    pub phone: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CallResponse {
    pub success: bool,
    pub conversation_id: Option<String>,
    pub message: &'static str,
}

pub async fn start_call(
    State(state): State<AppState>,
    Json(request): Json<CallRequest>,
) -> Result<Json<CallResponse>, ApiFailure> {
    let phone = request.phone.unwrap_or_default();
    if phone.trim().len() < MIN_PHONE_LENGTH {
        return Err(bad_request("Valid phone number required"));
    }
    let to = normalize_phone(&phone);

    if state.telephony.sending_number().is_none() {
        return Err(server_error("Server not configured for calls".to_string()));
    }

    let call = state.telephony.start_assistant_call(&to).await.map_err(|error| match error {
        GatewayError::Api { detail, .. } => bad_request(detail),
        GatewayError::NotConfigured(_) => server_error("Server not configured for calls".to_string()),
        other => {
            error!(event_name = "call.start.failed", error = %other);
            server_error(other.to_string())
        }
    })?;

    if let Err(error) = state.call_logs.record(CallLog::initiated(to.clone())).await {
        warn!(event_name = "call.log.not_recorded", caller_phone = %to, error = %error);
    }
    info!(
        event_name = "call.started",
        conversation_id = call.conversation_id.as_deref().unwrap_or("unknown"),
        "outbound assistant call placed"
    );

    Ok(Json(CallResponse {
        success: true,
        conversation_id: call.conversation_id,
        message: "Calling you now! Pick up to speak with Aria.",
    }))
}

#[derive(Debug, Deserialize)]
pub struct TranscriptQuery {
    pub phone: Option<String>,
}

pub async fn transcript(
    State(state): State<AppState>,
    Query(query): Query<TranscriptQuery>,
) -> Result<Sse<impl Stream<Item = Result<Event, axum::Error>>>, ApiFailure> {
    let Some(phone) = query.phone.filter(|phone| !phone.trim().is_empty()) else {
        return Err(bad_request("Missing phone"));
    };

    let events = TranscriptPoller::new(state.telephony.clone(), state.transcript.clone(), &phone)
        .into_stream()
        .map(|event| Event::default().json_data(event));
    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}

#[derive(Debug, Serialize)]
pub struct CallsResponse {
    pub calls: Vec<CallLog>,
}

pub async fn list_calls(State(state): State<AppState>) -> Result<Json<CallsResponse>, ApiFailure> {
    let calls = state.call_logs.list_latest(CALL_LOG_PAGE).await.map_err(repository_failure)?;
    Ok(Json(CallsResponse { calls }))
}

/// `+` followed by the digits of `phone`, dropping spaces and punctuation.
pub fn normalize_phone(phone: &str) -> String {
    let digits: String = phone.chars().filter(char::is_ascii_digit).collect();
    format!("+{digits}")
}

fn server_error(message: String) -> ApiFailure {
    (StatusCode::INTERNAL_SERVER_ERROR, Json(ApiError { error: message, correlation_id: None }))
}
