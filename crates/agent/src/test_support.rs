use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use horizon_db::repositories::InMemoryHotelStore;
use horizon_db::HotelSeedDataset;
use horizon_telnyx::{
    Conversation, ConversationMessage, GatewayError, OutboundCall, SentMessage, Telephony,
};

pub fn hotel() -> Arc<InMemoryHotelStore> {
    Arc::new(InMemoryHotelStore::with_rooms(HotelSeedDataset::rooms()))
}

/// Records outgoing texts instead of sending them.
pub struct RecordingTelephony {
    number: Option<String>,
    fail_with: Option<String>,
    pub sent: Mutex<Vec<(String, String)>>,
}

impl RecordingTelephony {
    pub fn configured() -> Self {
        Self { number: Some("+15550001111".to_string()), fail_with: None, sent: Mutex::default() }
    }

    pub fn without_number() -> Self {
        Self { number: None, fail_with: None, sent: Mutex::default() }
    }

    pub fn failing(reason: &str) -> Self {
        Self { fail_with: Some(reason.to_string()), ..Self::configured() }
    }

    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().expect("lock").clone()
    }
}

#[async_trait]
impl Telephony for RecordingTelephony {
    fn sending_number(&self) -> Option<&str> {
        self.number.as_deref()
    }

    async fn send_sms(&self, to: &str, text: &str) -> Result<SentMessage, GatewayError> {
        if let Some(reason) = &self.fail_with {
            return Err(GatewayError::Transport(reason.clone()));
        }
        let mut sent = self.sent.lock().expect("lock");
        sent.push((to.to_string(), text.to_string()));
        Ok(SentMessage { id: format!("msg-{}", sent.len()) })
    }

    async fn start_assistant_call(&self, _to: &str) -> Result<OutboundCall, GatewayError> {
        Ok(OutboundCall { conversation_id: Some("conv-test".to_string()) })
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
