//! Live transcript of an assistant call, reconstructed by polling the vendor's
//! conversation history.
//!
//! The poller first waits for a conversation addressed to the caller's number to
//! appear, then relays each new message once. A call is considered over when the
//! newest message has been idle past the configured threshold on two consecutive
//! polls.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures_util::stream::{self, Stream, StreamExt};
use serde::Serialize;
use tracing::{debug, warn};

use horizon_core::config::TranscriptConfig;

use crate::client::{Conversation, ConversationMessage, Telephony};

const CONVERSATION_PAGE: u32 = 5;
const MESSAGE_PAGE: u32 = 50;
const MATCHED_DIGITS: usize = 10;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TranscriptEvent {
    Status { text: String },
    Message { role: String, text: String, timestamp: DateTime<Utc> },
    Ended { text: String },
}

impl TranscriptEvent {
    fn status(text: &str) -> Self {
        Self::Status { text: text.to_string() }
    }

    fn ended(text: &str) -> Self {
        Self::Ended { text: text.to_string() }
    }
}

/// Events produced by one poll and how long to wait before the next one.
/// `next_delay` is `None` once the transcript is finished.
#[derive(Debug, PartialEq, Eq)]
pub struct PollStep {
    pub events: Vec<TranscriptEvent>,
    pub next_delay: Option<Duration>,
}

pub struct TranscriptPoller {
    telephony: Arc<dyn Telephony>,
    config: TranscriptConfig,
    phone_digits: String,
    conversation_id: Option<String>,
    relayed: usize,
    idle_once: bool,
    attempts: u32,
    started: bool,
    finished: bool,
}

impl TranscriptPoller {
    pub fn new(telephony: Arc<dyn Telephony>, config: TranscriptConfig, phone: &str) -> Self {
        Self {
            telephony,
            config,
            phone_digits: trailing_digits(phone, MATCHED_DIGITS),
            conversation_id: None,
            relayed: 0,
            idle_once: false,
            attempts: 0,
            started: false,
            finished: false,
        }
    }

    pub fn conversation_id(&self) -> Option<&str> {
        self.conversation_id.as_deref()
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub async fn poll(&mut self, now: DateTime<Utc>) -> PollStep {
        let mut events = Vec::new();
        if self.finished {
            return PollStep { events, next_delay: None };
        }
        if !self.started {
            self.started = true;
            events.push(TranscriptEvent::status("Connecting..."));
        }
        if self.attempts >= self.config.max_attempts {
            return self.finish(events, "Stream closed");
        }
        self.attempts += 1;

        if self.conversation_id.is_none() {
            match self.telephony.recent_conversations(CONVERSATION_PAGE).await {
                Ok(conversations) => match self.find_conversation(&conversations, now) {
                    Some(id) => {
                        debug!(event_name = "transcript.conversation.matched", conversation_id = %id);
                        self.conversation_id = Some(id);
                        events.push(TranscriptEvent::status("Call connected — listening..."));
                    }
                    None => {
                        events.push(TranscriptEvent::status("Ringing..."));
                        return PollStep {
                            events,
                            next_delay: Some(self.config.ringing_interval()),
                        };
                    }
                },
                Err(error) => {
                    warn!(event_name = "transcript.poll.failed", error = %error);
                    return self.wait(events);
                }
            }
        }

        let Some(conversation_id) = self.conversation_id.clone() else {
            return self.wait(events);
        };
        let mut messages =
            match self.telephony.conversation_messages(&conversation_id, MESSAGE_PAGE).await {
                Ok(messages) => messages,
                Err(error) => {
                    warn!(event_name = "transcript.poll.failed", error = %error);
                    return self.wait(events);
                }
            };
        messages.sort_by_key(|message| message.created_at);

        if messages.len() > self.relayed {
            events.extend(messages[self.relayed..].iter().filter_map(relay));
            self.relayed = messages.len();
        }

        if self.relayed > 0 {
            if let Some(last) = messages.last() {
                let idle = now.signed_duration_since(last.created_at).num_seconds();
                if idle > self.config.idle_after_secs {
                    if self.idle_once {
                        return self.finish(events, "Call ended");
                    }
                    self.idle_once = true;
                } else {
                    self.idle_once = false;
                }
            }
        }

        self.wait(events)
    }

    /// Drives the poller on the tokio clock until it finishes. Dropping the
    /// stream stops polling.
    pub fn into_stream(self) -> impl Stream<Item = TranscriptEvent> + Send {
        stream::unfold(Some((self, Duration::ZERO)), |state| async move {
            let (mut poller, delay) = state?;
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            let step = poller.poll(Utc::now()).await;
            let next = step.next_delay.map(|delay| (poller, delay));
            Some((stream::iter(step.events), next))
        })
        .flatten()
    }

    fn find_conversation(&self, conversations: &[Conversation], now: DateTime<Utc>) -> Option<String> {
        if self.phone_digits.is_empty() {
            return None;
        }
        conversations
            .iter()
            .find(|conversation| {
                let addressed = conversation
                    .callee()
                    .is_some_and(|callee| callee.contains(self.phone_digits.as_str()));
                let recent = conversation.created_at.is_some_and(|created| {
                    now.signed_duration_since(created).num_seconds() < self.config.match_window_secs
                });
                addressed && recent
            })
            .map(|conversation| conversation.id.clone())
    }

    fn wait(&self, events: Vec<TranscriptEvent>) -> PollStep {
        PollStep { events, next_delay: Some(self.config.poll_interval()) }
    }

    fn finish(&mut self, mut events: Vec<TranscriptEvent>, text: &str) -> PollStep {
        self.finished = true;
        events.push(TranscriptEvent::ended(text));
        PollStep { events, next_delay: None }
    }
}

/// Assistant tool invocations surface as raw JSON text and are not part of the dialogue.
fn relay(message: &ConversationMessage) -> Option<TranscriptEvent> {
    let text = message.text.clone().unwrap_or_default();
    if text.starts_with('{') && text.contains("\"name\"") {
        return None;
    }
    let role = if message.role == "assistant" { "assistant" } else { "user" };
    Some(TranscriptEvent::Message { role: role.to_string(), text, timestamp: message.created_at })
}

fn trailing_digits(phone: &str, count: usize) -> String {
    let digits: Vec<char> = phone.chars().filter(char::is_ascii_digit).collect();
    digits[digits.len().saturating_sub(count)..].iter().collect()
}
