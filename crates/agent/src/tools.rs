use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{error, info};

use horizon_core::availability::{format_usd, summarize_by_type};
use horizon_core::domain::booking::NewBooking;
use horizon_core::domain::room::RoomType;
use horizon_core::domain::stay::StayDates;
use horizon_core::errors::DomainError;
use horizon_db::repositories::{BookingRepository, RepositoryError, RoomRepository};
use horizon_telnyx::Telephony;

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("missing argument `{0}`")]
    MissingArgument(&'static str),
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &'static str;
    async fn execute(&self, args: Value) -> Result<Value, ToolError>;
}

/// A function call as delivered by the assistant webhook. The vendor has used
/// several envelope shapes, so both the name and the arguments are looked up
/// in each of them.
#[derive(Clone, Debug, PartialEq)]
pub struct ToolCall {
    pub name: Option<String>,
    pub arguments: Value,
}

impl ToolCall {
    pub fn from_payload(payload: &Value) -> Result<Self, ToolError> {
        let name = ["/function_name", "/name", "/tool_call/function/name", "/function/name"]
            .iter()
            .find_map(|pointer| payload.pointer(pointer).and_then(Value::as_str))
            .filter(|name| !name.is_empty())
            .map(str::to_string);

        let raw = [
            "/function_args",
            "/arguments",
            "/tool_call/function/arguments",
            "/function/arguments",
            "/parameters",
        ]
        .iter()
        .find_map(|pointer| payload.pointer(pointer).filter(|value| !value.is_null()));

        let arguments = match raw {
            None => json!({}),
            Some(Value::String(encoded)) => serde_json::from_str(encoded)
                .map_err(|error| ToolError::InvalidArguments(error.to_string()))?,
            Some(value) => value.clone(),
        };

        Ok(Self { name, arguments })
    }
}

#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn hotel(
        rooms: Arc<dyn RoomRepository>,
        bookings: Arc<dyn BookingRepository>,
        telephony: Arc<dyn Telephony>,
    ) -> Self {
        let mut registry = Self::default();
        registry.register(CheckAvailabilityTool { rooms });
        registry.register(CreateBookingTool { bookings });
        registry.register(SendConfirmationTool { telephony });
        registry
    }

    pub fn register<T>(&mut self, tool: T)
    where
        T: Tool + 'static,
    {
        self.tools.insert(tool.name().to_string(), Box::new(tool));
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Runs the call in `payload` and renders the assistant-facing result string.
    /// Failures are reported in the string rather than as an error.
    pub async fn dispatch(&self, payload: &Value) -> String {
        let call = match ToolCall::from_payload(payload) {
            Ok(call) => call,
            Err(error) => return format!("Error: {error}"),
        };
        let name = call.name.as_deref().unwrap_or("none");
        let Some(tool) = self.tools.get(name) else {
            return format!("Unknown tool: {name}");
        };

        info!(event_name = "assistant.tool.invoked", tool = name);
        match tool.execute(call.arguments).await {
            Ok(result) => result.to_string(),
            Err(error) => {
                error!(event_name = "assistant.tool.failed", tool = name, error = %error);
                format!("Error: {error}")
            }
        }
    }
}

/// Text message sent to a guest once a booking is confirmed.
pub fn confirmation_sms(confirmation_code: &str, summary: &str) -> String {
    format!(
        "🏨 Grand Horizon Hotel\n\n✅ Booking Confirmed!\n📋 {confirmation_code}\n\n{summary}\n\nWe look forward to your stay!"
    )
}

struct CheckAvailabilityTool {
    rooms: Arc<dyn RoomRepository>,
}

#[async_trait]
impl Tool for CheckAvailabilityTool {
    fn name(&self) -> &'static str {
        "check_availability"
    }

    async fn execute(&self, args: Value) -> Result<Value, ToolError> {
        let check_in = required_str(&args, "check_in")?;
        let check_out = required_str(&args, "check_out")?;
        let stay = StayDates::parse(check_in, check_out)?;
        let room_type = optional_room_type(&args)?;

        let rooms = self.rooms.list_available(&stay, room_type).await?;
        if rooms.is_empty() {
            return Ok(json!({
                "message": "No rooms available for those dates",
                "check_in": check_in,
                "check_out": check_out,
            }));
        }

        let nights = stay.nights();
        let available: Vec<_> = rooms.iter().collect();
        let summary: Vec<Value> = summarize_by_type(&available, nights)
            .into_iter()
            .map(|entry| {
                json!({
                    "type": entry.room_type.as_str(),
                    "available_rooms": entry.count,
                    "price_per_night": format_usd(entry.price_per_night),
                    "total_for_stay": format_usd(entry.stay_total),
                    "nights": nights,
                    "amenities": entry.amenities.join(", "),
                })
            })
            .collect();

        Ok(json!({
            "available_rooms": summary,
            "check_in": check_in,
            "check_out": check_out,
            "nights": nights,
        }))
    }
}

struct CreateBookingTool {
    bookings: Arc<dyn BookingRepository>,
}

#[async_trait]
impl Tool for CreateBookingTool {
    fn name(&self) -> &'static str {
        "create_booking"
    }

    async fn execute(&self, args: Value) -> Result<Value, ToolError> {
        let raw_type = required_str(&args, "room_type")?;
        let room_type: RoomType = raw_type.parse()?;
        let stay = StayDates::parse(required_str(&args, "check_in")?, required_str(&args, "check_out")?)?;
        let request = NewBooking {
            room_type,
            guest_name: required_str(&args, "guest_name")?.to_string(),
            guest_phone: required_str(&args, "phone")?.to_string(),
            stay,
            adults: optional_count(&args, "adults").filter(|adults| *adults > 0).unwrap_or(1),
            children: optional_count(&args, "children").unwrap_or(0),
        };

        let Some(booking) = self.bookings.allocate(request).await? else {
            return Ok(json!({
                "error": true,
                "message": format!("No {raw_type} rooms available for those dates"),
            }));
        };

        Ok(json!({
            "success": true,
            "confirmation_code": booking.confirmation_code.0,
            "room_number": booking.room_number,
            "room_type": booking.room_type.as_str(),
            "floor": booking.floor,
            "check_in": booking.stay.check_in_str(),
            "check_out": booking.stay.check_out_str(),
            "nights": booking.stay.nights(),
            "guest_name": booking.guest_name,
            "adults": booking.adults,
            "children": booking.children,
            "total_price": format_usd(booking.total_price),
        }))
    }
}

struct SendConfirmationTool {
    telephony: Arc<dyn Telephony>,
}

#[async_trait]
impl Tool for SendConfirmationTool {
    fn name(&self) -> &'static str {
        "send_confirmation"
    }

    async fn execute(&self, args: Value) -> Result<Value, ToolError> {
        if self.telephony.sending_number().is_none() {
            return Ok(json!({ "sent": false, "reason": "No sending number configured" }));
        }

        let phone = required_str(&args, "phone")?;
        let code = required_str(&args, "confirmation_code")?;
        let summary = args.get("summary").and_then(Value::as_str).unwrap_or_default();

        match self.telephony.send_sms(phone, &confirmation_sms(code, summary)).await {
            Ok(message) => Ok(json!({ "sent": true, "message_id": message.id })),
            Err(error) => Ok(json!({ "sent": false, "reason": error.to_string() })),
        }
    }
}

fn required_str<'a>(args: &'a Value, key: &'static str) -> Result<&'a str, ToolError> {
    args.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or(ToolError::MissingArgument(key))
}

fn optional_room_type(args: &Value) -> Result<Option<RoomType>, ToolError> {
    match args.get("room_type").and_then(Value::as_str).map(str::trim) {
        None | Some("") => Ok(None),
        Some(raw) => Ok(Some(raw.parse()?)),
    }
}

/// Guest counts arrive as numbers or numeric strings depending on the caller.
fn optional_count(args: &Value, key: &str) -> Option<u32> {
    match args.get(key)? {
        Value::Number(number) => number.as_u64().and_then(|count| u32::try_from(count).ok()),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use horizon_db::repositories::BookingRepository;
    use serde_json::{json, Value};

    use super::{ToolCall, ToolRegistry};
    use crate::test_support::{hotel, RecordingTelephony};

    fn registry(telephony: Arc<RecordingTelephony>) -> ToolRegistry {
        let store = hotel();
        ToolRegistry::hotel(store.clone(), store, telephony)
    }

    async fn run(registry: &ToolRegistry, payload: Value) -> Value {
        let rendered = registry.dispatch(&payload).await;
        serde_json::from_str(&rendered).unwrap_or(Value::String(rendered))
    }

    #[test]
    fn reads_every_supported_envelope() {
        let shapes = [
            json!({"function_name": "check_availability", "function_args": {"check_in": "2026-03-01"}}),
            json!({"name": "check_availability", "arguments": "{\"check_in\": \"2026-03-01\"}"}),
            json!({"tool_call": {"function": {"name": "check_availability", "arguments": {"check_in": "2026-03-01"}}}}),
            json!({"function": {"name": "check_availability", "arguments": "{\"check_in\":\"2026-03-01\"}"}}),
            json!({"name": "check_availability", "parameters": {"check_in": "2026-03-01"}}),
        ];

        for shape in shapes {
            let call = ToolCall::from_payload(&shape).expect("call");
            assert_eq!(call.name.as_deref(), Some("check_availability"), "{shape}");
            assert_eq!(call.arguments["check_in"], "2026-03-01", "{shape}");
        }

        let bare = ToolCall::from_payload(&json!({})).expect("call");
        assert_eq!(bare.name, None);
        assert_eq!(bare.arguments, json!({}));
        assert!(ToolCall::from_payload(&json!({"name": "x", "arguments": "{oops"})).is_err());
    }

    #[tokio::test]
    async fn check_availability_summarizes_free_inventory() {
        let registry = registry(Arc::new(RecordingTelephony::configured()));
        let result = run(
            &registry,
            json!({"name": "check_availability", "arguments": {"check_in": "2026-03-01", "check_out": "2026-03-04"}}),
        )
        .await;

        assert_eq!(result["nights"], 3);
        let rooms = result["available_rooms"].as_array().expect("rooms");
        assert_eq!(rooms.len(), 4);
        assert_eq!(rooms[0]["type"], "Standard");
        assert_eq!(rooms[0]["available_rooms"], 10);
        assert_eq!(rooms[0]["price_per_night"], "$99");
        assert_eq!(rooms[0]["total_for_stay"], "$297");
        assert_eq!(rooms[3]["amenities"], "Wi-Fi, TV, Mini Bar, Terrace, Jacuzzi, Butler Service, Kitchen");
    }

    #[tokio::test]
    async fn create_booking_fills_the_penthouses_then_reports_none_left() {
        let registry = registry(Arc::new(RecordingTelephony::configured()));
        let booking = json!({
            "function_name": "create_booking",
            "function_args": {
                "guest_name": "Ada Lovelace",
                "phone": "+14155550100",
                "room_type": "penthouse",
                "check_in": "2026-03-01",
                "check_out": "2026-03-03",
                "adults": "2"
            }
        });

        let first = run(&registry, booking.clone()).await;
        assert_eq!(first["success"], true);
        assert_eq!(first["room_number"], "501");
        assert_eq!(first["room_type"], "Penthouse");
        assert_eq!(first["floor"], 5);
        assert_eq!(first["nights"], 2);
        assert_eq!(first["adults"], 2);
        assert_eq!(first["children"], 0);
        assert_eq!(first["total_price"], "$998");
        assert!(first["confirmation_code"].as_str().expect("code").starts_with("GH-"));

        let second = run(&registry, booking.clone()).await;
        assert_eq!(second["room_number"], "502");

        let third = run(&registry, booking).await;
        assert_eq!(third["error"], true);
        assert_eq!(third["message"], "No penthouse rooms available for those dates");

        let after = run(
            &registry,
            json!({"name": "check_availability", "arguments": {"check_in": "2026-03-02", "check_out": "2026-03-05", "room_type": "Penthouse"}}),
        )
        .await;
        assert_eq!(after["message"], "No rooms available for those dates");
    }

    #[tokio::test]
    async fn adults_default_to_one() {
        let registry = registry(Arc::new(RecordingTelephony::configured()));
        let result = run(
            &registry,
            json!({"name": "create_booking", "arguments": {
                "guest_name": "Solo Guest", "phone": "+14155550100", "room_type": "Suite",
                "check_in": "2026-03-01", "check_out": "2026-03-02"
            }}),
        )
        .await;
        assert_eq!(result["adults"], 1);
        assert_eq!(result["total_price"], "$249");
    }

    #[tokio::test]
    async fn oversized_parties_are_rejected_before_booking() {
        let store = hotel();
        let registry =
            ToolRegistry::hotel(store.clone(), store.clone(), Arc::new(RecordingTelephony::configured()));
        let rendered = registry
            .dispatch(&json!({"name": "create_booking", "arguments": {
                "guest_name": "Big Party", "phone": "+14155550100", "room_type": "Suite",
                "check_in": "2026-03-01", "check_out": "2026-03-02",
                "adults": 4294967295u64, "children": 1
            }}))
            .await;

        assert!(rendered.starts_with("Error: domain invariant violation"), "{rendered}");
        assert!(store.list_recent().await.expect("bookings").is_empty());
    }

    #[tokio::test]
    async fn failures_render_as_error_strings() {
        let registry = registry(Arc::new(RecordingTelephony::configured()));

        let unknown = registry.dispatch(&json!({"name": "cancel_booking"})).await;
        assert_eq!(unknown, "Unknown tool: cancel_booking");

        let missing = registry.dispatch(&json!({"name": "check_availability", "arguments": {}})).await;
        assert_eq!(missing, "Error: missing argument `check_in`");

        let inverted = registry
            .dispatch(&json!({"name": "check_availability", "arguments": {"check_in": "2026-03-04", "check_out": "2026-03-01"}}))
            .await;
        assert!(inverted.starts_with("Error: check-out"), "{inverted}");

        let bad_type = registry
            .dispatch(&json!({"name": "create_booking", "arguments": {
                "guest_name": "A B", "phone": "1", "room_type": "Cabin",
                "check_in": "2026-03-01", "check_out": "2026-03-02"
            }}))
            .await;
        assert_eq!(bad_type, "Error: unknown room type `cabin`");
    }

    #[tokio::test]
    async fn send_confirmation_reports_delivery() {
        let telephony = Arc::new(RecordingTelephony::configured());
        let registry = registry(telephony.clone());
        let result = run(
            &registry,
            json!({"name": "send_confirmation", "arguments": {
                "phone": "+14155550100", "confirmation_code": "GH-TEST", "summary": "Suite, Mar 1 to Mar 3"
            }}),
        )
        .await;
        assert_eq!(result, json!({"sent": true, "message_id": "msg-1"}));

        let sent = telephony.sent();
        assert_eq!(sent[0].0, "+14155550100");
        assert!(sent[0].1.contains("📋 GH-TEST"));
        assert!(sent[0].1.contains("Suite, Mar 1 to Mar 3"));
    }

    #[tokio::test]
    async fn send_confirmation_without_a_number_or_with_a_failing_gateway() {
        let payload = json!({"name": "send_confirmation", "arguments": {"phone": "+1", "confirmation_code": "GH-X"}});

        let unconfigured = registry(Arc::new(RecordingTelephony::without_number()));
        assert_eq!(
            run(&unconfigured, payload.clone()).await,
            json!({"sent": false, "reason": "No sending number configured"})
        );

        let failing = registry(Arc::new(RecordingTelephony::failing("connection reset")));
        let result = run(&failing, payload).await;
        assert_eq!(result["sent"], false);
        assert_eq!(result["reason"], "telnyx request failed: connection reset");
    }
}
