use axum::{extract::State, Json};
use serde::Serialize;

use super::{AppState, WebhookPayload};

#[derive(Debug, Serialize)]
pub struct ToolResponse {
    pub result: String,
}

/// Function-call webhook for the voice assistant. Always answers 200; failures
/// are described inside `result` so the assistant can relay them.
pub async fn tools(
    State(state): State<AppState>,
    WebhookPayload(payload): WebhookPayload,
) -> Json<ToolResponse> {
    Json(ToolResponse { result: state.tools.dispatch(&payload).await })
}
