//! Voice-AI and SMS gateway for the Grand Horizon concierge.

pub mod client;
pub mod transcript;

pub use client::{
    Conversation, ConversationMessage, GatewayError, NoopTelephony, OutboundCall, SentMessage,
    TelnyxClient, Telephony,
};
pub use transcript::{PollStep, TranscriptEvent, TranscriptPoller};
