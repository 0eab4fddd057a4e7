//! Guest-facing concierge for the Grand Horizon.
//!
//! Two entry points share the same booking rules:
//! 1. **Chat** (`runtime`) - a keyword-routed responder for the web widget. It
//!    reads dates, names and room types out of free text (`conversation`) and
//!    books through the repositories.
//! 2. **Assistant tools** (`tools`) - the functions the hosted voice assistant
//!    calls mid-conversation: `check_availability`, `create_booking` and
//!    `send_confirmation`.
//!
//! Prices and room assignment always come from the store, never from the text.

pub mod conversation;
pub mod runtime;
pub mod tools;

#[cfg(test)]
mod test_support;

pub use conversation::{ChatIntent, ChatMessage, GuestCount, MessageParser};
pub use runtime::ConciergeRuntime;
pub use tools::{confirmation_sms, Tool, ToolCall, ToolError, ToolRegistry};
