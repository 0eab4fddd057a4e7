use axum::{
    extract::{Query, State},
    response::Html,
};
use chrono::{NaiveDate, Utc};
use serde::Serialize;
use tera::Context;

use horizon_core::availability::{format_usd, occupancy_stats};
use horizon_core::domain::booking::Booking;
use horizon_core::domain::call_log::CallLog;
use horizon_core::domain::stay::DATE_FORMAT;
use horizon_core::errors::InterfaceError;

use super::hotel::BookingsQuery;
use super::{
    bad_request, correlation_id, interface_failure, repository_failure, ApiFailure, AppState,
};
use crate::templates;

const RECENT_CALLS: u32 = 20;

#[derive(Serialize)]
struct BookingRow {
    code: String,
    guest_name: String,
    guest_phone: String,
    room_type: &'static str,
    room_number: String,
    check_in: String,
    check_out: String,
    guests: u32,
    total: String,
    status: &'static str,
}

impl From<&Booking> for BookingRow {
    fn from(booking: &Booking) -> Self {
        Self {
            code: booking.confirmation_code.0.clone(),
            guest_name: booking.guest_name.clone(),
            guest_phone: booking.guest_phone.clone(),
            room_type: booking.room_type.as_str(),
            room_number: booking.room_number.clone(),
            check_in: booking.stay.check_in_str(),
            check_out: booking.stay.check_out_str(),
            guests: booking.guests(),
            total: format_usd(booking.total_price),
            status: booking.status.as_str(),
        }
    }
}

#[derive(Serialize)]
struct CallRow {
    caller_phone: String,
    outcome: String,
    duration: String,
    created_at: String,
}

impl From<&CallLog> for CallRow {
    fn from(call: &CallLog) -> Self {
        Self {
            caller_phone: call.caller_phone.clone(),
            outcome: call.outcome.to_string(),
            duration: format!("{}m {:02}s", call.duration_secs / 60, call.duration_secs % 60),
            created_at: call.created_at.format("%b %-d, %H:%M").to_string(),
        }
    }
}

/// Front-desk overview: occupancy for `asOf` (default today), every booking and
/// the latest calls.
pub async fn dashboard(
    State(state): State<AppState>,
    Query(query): Query<BookingsQuery>,
) -> Result<Html<String>, ApiFailure> {
    let as_of = match query.as_of.as_deref().map(str::trim).filter(|value| !value.is_empty()) {
        Some(value) => NaiveDate::parse_from_str(value, DATE_FORMAT)
            .map_err(|_| bad_request(format!("asOf must be a YYYY-MM-DD date, got `{value}`")))?,
        None => Utc::now().date_naive(),
    };

    let rooms = state.rooms.list_all().await.map_err(repository_failure)?;
    let bookings = state.bookings.list_recent().await.map_err(repository_failure)?;
    let calls = state.call_logs.list_latest(RECENT_CALLS).await.map_err(repository_failure)?;
    let stats = occupancy_stats(&rooms, &bookings, as_of);

    let mut context = Context::new();
    context.insert("as_of", &as_of.format(DATE_FORMAT).to_string());
    context.insert("generated_at", &Utc::now().format("%H:%M:%S UTC").to_string());
    context.insert("revenue", &format_usd(stats.total_revenue));
    context.insert("stats", &stats);
    context.insert("bookings", &bookings.iter().map(BookingRow::from).collect::<Vec<_>>());
    context.insert("calls", &calls.iter().map(CallRow::from).collect::<Vec<_>>());

    let html = state.templates.render(templates::DASHBOARD, &context).map_err(|error| {
        interface_failure(InterfaceError::Internal {
            message: error.to_string(),
            correlation_id: correlation_id(),
        })
    })?;
    Ok(Html(html))
}
