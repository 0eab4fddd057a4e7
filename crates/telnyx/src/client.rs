use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{info, warn};

use horizon_core::config::TelnyxConfig;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("telnyx gateway is not configured: {0}")]
    NotConfigured(&'static str),
    #[error("telnyx request failed: {0}")]
    Transport(String),
    #[error("telnyx rejected the request ({status}): {detail}")]
    Api { status: u16, detail: String },
    #[error("could not decode telnyx response: {0}")]
    Decode(String),
}

/// A started assistant conversation. The vendor does not always echo an id back.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutboundCall {
    pub conversation_id: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SentMessage {
    pub id: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct ConversationMetadata {
    #[serde(default)]
    pub to: Option<String>,
    #[serde(default)]
    pub telnyx_end_user_target: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct Conversation {
    pub id: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub metadata: ConversationMetadata,
}

impl Conversation {
    /// The dialled number, under whichever metadata key the vendor used.
    pub fn callee(&self) -> Option<&str> {
        self.metadata.to.as_deref().or(self.metadata.telnyx_end_user_target.as_deref())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct ConversationMessage {
    pub role: String,
    #[serde(default)]
    pub text: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Deserialize)]
struct ListEnvelope<T> {
    #[serde(default = "Vec::new")]
    data: Vec<T>,
}

/// Outbound telephony used by the concierge: SMS, AI assistant calls and
/// the conversation history those calls produce.
#[async_trait]
pub trait Telephony: Send + Sync {
    /// The number messages and calls are placed from, when one is configured.
    fn sending_number(&self) -> Option<&str>;

    async fn send_sms(&self, to: &str, text: &str) -> Result<SentMessage, GatewayError>;

    async fn start_assistant_call(&self, to: &str) -> Result<OutboundCall, GatewayError>;

    async fn recent_conversations(&self, limit: u32) -> Result<Vec<Conversation>, GatewayError>;

    async fn conversation_messages(
        &self,
        conversation_id: &str,
        limit: u32,
    ) -> Result<Vec<ConversationMessage>, GatewayError>;
}

#[derive(Default)]
pub struct NoopTelephony;

#[async_trait]
impl Telephony for NoopTelephony {
    fn sending_number(&self) -> Option<&str> {
        None
    }

    async fn send_sms(&self, _to: &str, _text: &str) -> Result<SentMessage, GatewayError> {
        Err(GatewayError::NotConfigured("no sending number"))
    }

    async fn start_assistant_call(&self, _to: &str) -> Result<OutboundCall, GatewayError> {
        Err(GatewayError::NotConfigured("no sending number"))
    }

    async fn recent_conversations(&self, _limit: u32) -> Result<Vec<Conversation>, GatewayError> {
        Ok(Vec::new())
    }

    async fn conversation_messages(
        &self,
        _conversation_id: &str,
        _limit: u32,
    ) -> Result<Vec<ConversationMessage>, GatewayError> {
        Ok(Vec::new())
    }
}

pub struct TelnyxClient {
    client: Client,
    api_key: Option<SecretString>,
    phone_number: Option<String>,
    assistant_id: String,
    base_url: String,
}

impl std::fmt::Debug for TelnyxClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelnyxClient")
            .field("phone_number", &self.phone_number)
            .field("assistant_id", &self.assistant_id)
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl TelnyxClient {
    pub fn from_config(config: &TelnyxConfig) -> Result<Self, GatewayError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|error| GatewayError::Transport(error.to_string()))?;

        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            phone_number: config.phone_number.clone(),
            assistant_id: config.assistant_id.clone(),
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn bearer(&self) -> Result<String, GatewayError> {
        let key = self.api_key.as_ref().ok_or(GatewayError::NotConfigured("no api key"))?;
        Ok(format!("Bearer {}", key.expose_secret()))
    }

    fn from_number(&self) -> Result<&str, GatewayError> {
        self.phone_number.as_deref().ok_or(GatewayError::NotConfigured("no sending number"))
    }

    async fn get_json(&self, path: &str, query: &[(&str, String)]) -> Result<Value, GatewayError> {
        let response = self
            .client
            .get(self.url(path))
            .header("Authorization", self.bearer()?)
            .query(query)
            .send()
            .await
            .map_err(|error| GatewayError::Transport(error.to_string()))?;
        read_body(response).await
    }

    async fn post_json(&self, path: &str, body: &Value) -> Result<Value, GatewayError> {
        let response = self
            .client
            .post(self.url(path))
            .header("Authorization", self.bearer()?)
            .json(body)
            .send()
            .await
            .map_err(|error| GatewayError::Transport(error.to_string()))?;
        read_body(response).await
    }
}

/// Decodes a vendor response, surfacing the first `errors[].detail` the vendor reports.
async fn read_body(response: reqwest::Response) -> Result<Value, GatewayError> {
    let status = response.status();
    let body: Value = response.json().await.map_err(|error| {
        if status.is_success() {
            GatewayError::Decode(error.to_string())
        } else {
            GatewayError::Api { status: status.as_u16(), detail: status.to_string() }
        }
    })?;

    if let Some(errors) = body.get("errors") {
        let detail = errors
            .get(0)
            .and_then(|first| first.get("detail").or_else(|| first.get("title")))
            .and_then(Value::as_str)
            .unwrap_or("request rejected")
            .to_string();
        warn!(event_name = "telnyx.api.rejected", status = status.as_u16(), %detail);
        return Err(GatewayError::Api { status: status.as_u16(), detail });
    }
    if !status.is_success() {
        return Err(GatewayError::Api { status: status.as_u16(), detail: status.to_string() });
    }
    Ok(body)
}

fn decode_list<T: serde::de::DeserializeOwned>(body: Value) -> Result<Vec<T>, GatewayError> {
    serde_json::from_value::<ListEnvelope<T>>(body)
        .map(|envelope| envelope.data)
        .map_err(|error| GatewayError::Decode(error.to_string()))
}

fn conversation_id(body: &Value) -> Option<String> {
    body.get("id")
        .or_else(|| body.pointer("/data/id"))
        .and_then(Value::as_str)
        .map(str::to_string)
}

#[async_trait]
impl Telephony for TelnyxClient {
    fn sending_number(&self) -> Option<&str> {
        self.phone_number.as_deref()
    }

    async fn send_sms(&self, to: &str, text: &str) -> Result<SentMessage, GatewayError> {
        let body = json!({ "from": self.from_number()?, "to": to, "text": text });
        let response = self.post_json("messages", &body).await?;
        let id = response.pointer("/data/id").and_then(Value::as_str).unwrap_or("sent").to_string();
        info!(event_name = "telnyx.sms.sent", message_id = %id);
        Ok(SentMessage { id })
    }

    async fn start_assistant_call(&self, to: &str) -> Result<OutboundCall, GatewayError> {
        let body = json!({
            "channel": "voice",
            "voice": { "from": self.from_number()?, "to": to },
        });
        let path = format!("ai/assistants/{}/conversations", self.assistant_id);
        let response = self.post_json(&path, &body).await?;
        let call = OutboundCall { conversation_id: conversation_id(&response) };
        info!(
            event_name = "telnyx.call.initiated",
            conversation_id = call.conversation_id.as_deref().unwrap_or("unknown"),
        );
        Ok(call)
    }

    async fn recent_conversations(&self, limit: u32) -> Result<Vec<Conversation>, GatewayError> {
        let body = self.get_json("ai/conversations", &[("page[size]", limit.to_string())]).await?;
        decode_list(body)
    }

    async fn conversation_messages(
        &self,
        conversation_id: &str,
        limit: u32,
    ) -> Result<Vec<ConversationMessage>, GatewayError> {
        let path = format!("ai/conversations/{conversation_id}/messages");
        let body = self.get_json(&path, &[("page[size]", limit.to_string())]).await?;
        decode_list(body)
    }
}

#[cfg(test)]
mod tests {
    use secrecy::SecretString;
    use serde_json::json;

    use horizon_core::config::TelnyxConfig;

    use super::*;

    fn config() -> TelnyxConfig {
        TelnyxConfig {
            api_key: Some(SecretString::from("KEY_live_secret".to_string())),
            phone_number: Some("+15550001111".to_string()),
            assistant_id: "assistant-test".to_string(),
            api_base_url: "https://api.telnyx.com/v2/".to_string(),
            timeout_secs: 5,
        }
    }

    #[test]
    fn debug_output_redacts_the_api_key() {
        let client = TelnyxClient::from_config(&config()).expect("client");
        let rendered = format!("{client:?}");
        assert!(!rendered.contains("KEY_live_secret"));
        assert!(rendered.contains("+15550001111"));
    }

    #[test]
    fn urls_join_without_double_slashes() {
        let client = TelnyxClient::from_config(&config()).expect("client");
        assert_eq!(client.url("/messages"), "https://api.telnyx.com/v2/messages");
    }

    #[test]
    fn conversation_id_is_read_from_either_envelope() {
        assert_eq!(conversation_id(&json!({"id": "c-1"})), Some("c-1".to_string()));
        assert_eq!(conversation_id(&json!({"data": {"id": "c-2"}})), Some("c-2".to_string()));
        assert_eq!(conversation_id(&json!({"data": {}})), None);
    }

    #[test]
    fn conversations_decode_with_sparse_metadata() {
        let body = json!({
            "data": [
                {"id": "a", "created_at": "2026-02-18T10:00:00Z", "metadata": {"to": "+14155550100"}},
                {"id": "b", "metadata": {"telnyx_end_user_target": "+14155550199"}},
                {"id": "c"}
            ]
        });
        let conversations: Vec<Conversation> = decode_list(body).expect("decode");
        assert_eq!(conversations.len(), 3);
        assert_eq!(conversations[0].callee(), Some("+14155550100"));
        assert_eq!(conversations[1].callee(), Some("+14155550199"));
        assert_eq!(conversations[2].callee(), None);
        assert!(conversations[1].created_at.is_none());
    }

    #[test]
    fn missing_data_decodes_as_empty() {
        let messages: Vec<ConversationMessage> = decode_list(json!({})).expect("decode");
        assert!(messages.is_empty());
    }

    #[tokio::test]
    async fn requests_without_credentials_fail_before_the_network() {
        let mut unconfigured = config();
        unconfigured.api_key = None;
        let client = TelnyxClient::from_config(&unconfigured).expect("client");
        let error = client.recent_conversations(5).await.expect_err("no key");
        assert!(matches!(error, GatewayError::NotConfigured(_)));

        let mut no_number = config();
        no_number.phone_number = None;
        let client = TelnyxClient::from_config(&no_number).expect("client");
        assert!(client.sending_number().is_none());
        let error = client.send_sms("+14155550100", "hi").await.expect_err("no number");
        assert!(matches!(error, GatewayError::NotConfigured(_)));
    }

    #[tokio::test]
    async fn noop_telephony_never_sends() {
        let noop = NoopTelephony;
        assert!(noop.sending_number().is_none());
        assert!(noop.start_assistant_call("+14155550100").await.is_err());
        assert!(noop.recent_conversations(5).await.expect("list").is_empty());
    }
}
