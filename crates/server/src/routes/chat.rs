use axum::{extract::State, Json};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use horizon_agent::ChatMessage;

use super::{bad_request, repository_failure, ApiFailure, AppState};

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub history: Vec<ChatMessage>,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub reply: String,
}

pub async fn chat(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiFailure> {
    let message = request.message.trim();
    if message.is_empty() {
        return Err(bad_request("Message is required"));
    }

    let reply = state
        .concierge
        .reply(message, &request.history, Utc::now().date_naive())
        .await
        .map_err(repository_failure)?;
    Ok(Json(ChatResponse { reply }))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{extract::State, http::StatusCode, Json};
    use serde_json::json;

    use horizon_agent::ChatMessage;
    use horizon_db::repositories::BookingRepository;

    use super::{chat, ChatRequest};
    use crate::routes::test_support::{hotel, json_post, send, state, state_with, FakeTelephony};

    fn turn(role: &str, text: &str) -> ChatMessage {
        ChatMessage { role: role.to_string(), text: text.to_string() }
    }

    #[tokio::test]
    async fn empty_message_is_rejected() {
        let (status, Json(body)) = chat(
            State(state()),
            Json(ChatRequest { message: "   ".to_string(), history: Vec::new() }),
        )
        .await
        .expect_err("empty");
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body.error, "Message is required");
    }

    #[tokio::test]
    async fn rates_question_returns_rate_card() {
        let Json(response) = chat(
            State(state()),
            Json(ChatRequest { message: "How much is a room?".to_string(), history: Vec::new() }),
        )
        .await
        .expect("reply");
        assert!(response.reply.starts_with("Our nightly rates:"));
    }

    #[tokio::test]
    async fn guest_details_complete_a_booking_and_text_the_guest() {
        let store = hotel();
        let telephony = Arc::new(FakeTelephony::configured());
        let app = state_with(store.clone(), telephony.clone());
        let history = vec![
            turn("user", "Is a room available 2030-03-10 to 2030-03-12?"),
            turn("assistant", "Which would you prefer?"),
            turn("user", "The suite please"),
            turn("assistant", "To book, I'll need your full name, phone number, and number of guests."),
        ];

        let Json(response) = chat(
            State(app),
            Json(ChatRequest {
                message: "My name is Grace Hopper, +1 415 555 0199, 2 adults".to_string(),
                history,
            }),
        )
        .await
        .expect("reply");

        assert!(response.reply.contains("GH-"), "{}", response.reply);
        let bookings = store.list_recent().await.expect("bookings");
        assert_eq!(bookings.len(), 1);
        assert_eq!(bookings[0].guest_name, "Grace Hopper");
        assert_eq!(telephony.sms.lock().expect("lock").len(), 1);
    }

    #[tokio::test]
    async fn chat_route_accepts_missing_history() {
        let (response, body) = send(state(), json_post("/chat", json!({ "message": "hello" }))).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body: serde_json::Value = serde_json::from_str(&body).expect("json");
        assert!(body["reply"].as_str().is_some_and(|reply| reply.starts_with("Welcome")));
    }
}
