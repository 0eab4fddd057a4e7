use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use horizon_core::availability::{occupancy_stats, OccupancyStats};
use horizon_core::domain::booking::{Booking, BookingId, BookingStatus};
use horizon_core::domain::room::{Room, RoomType};
use horizon_core::domain::stay::{StayDates, DATE_FORMAT};
use horizon_core::errors::{ApplicationError, DomainError};

use super::{application_failure, bad_request, repository_failure, ApiFailure, AppState};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomsQuery {
    pub check_in: Option<String>,
    pub check_out: Option<String>,
    #[serde(rename = "type")]
    pub room_type: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RoomsResponse {
    pub rooms: Vec<Room>,
}

pub async fn list_rooms(
    State(state): State<AppState>,
    Query(query): Query<RoomsQuery>,
) -> Result<Json<RoomsResponse>, ApiFailure> {
    let (Some(check_in), Some(check_out)) = (query.check_in, query.check_out) else {
        let rooms = state.rooms.list_all().await.map_err(repository_failure)?;
        return Ok(Json(RoomsResponse { rooms }));
    };

    let stay = StayDates::parse(&check_in, &check_out).map_err(domain_failure)?;
    let room_type = query
        .room_type
        .filter(|value| !value.trim().is_empty())
        .map(|value| value.parse::<RoomType>())
        .transpose()
        .map_err(domain_failure)?;

    let rooms = state.rooms.list_available(&stay, room_type).await.map_err(repository_failure)?;
    Ok(Json(RoomsResponse { rooms }))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingsQuery {
    pub as_of: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct BookingsResponse {
    pub bookings: Vec<Booking>,
    pub stats: OccupancyStats,
}

pub async fn list_bookings(
    State(state): State<AppState>,
    Query(query): Query<BookingsQuery>,
) -> Result<Json<BookingsResponse>, ApiFailure> {
    let as_of = match query.as_of.as_deref().map(str::trim).filter(|value| !value.is_empty()) {
        Some(value) => NaiveDate::parse_from_str(value, DATE_FORMAT)
            .map_err(|_| bad_request(format!("asOf must be a YYYY-MM-DD date, got `{value}`")))?,
        None => Utc::now().date_naive(),
    };

    let rooms = state.rooms.list_all().await.map_err(repository_failure)?;
    let bookings = state.bookings.list_recent().await.map_err(repository_failure)?;
    let stats = occupancy_stats(&rooms, &bookings, as_of);
    Ok(Json(BookingsResponse { bookings, stats }))
}

#[derive(Debug, Deserialize)]
pub struct StatusChange {
    pub status: String,
}

pub async fn update_booking_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(change): Json<StatusChange>,
) -> Result<Json<Booking>, ApiFailure> {
    let next = change.status.parse::<BookingStatus>().map_err(domain_failure)?;
    let id = BookingId(id);

    let Some(mut booking) = state.bookings.find_by_id(&id).await.map_err(repository_failure)?
    else {
        return Err(application_failure(ApplicationError::NotFound(format!("booking `{}`", id.0))));
    };

    let previous = booking.status;
    booking.transition_to(next).map_err(domain_failure)?;

    let applied =
        state.bookings.update_status(&id, previous, next).await.map_err(repository_failure)?;
    if !applied {
        // Another request moved the booking first.
        return Err(domain_failure(DomainError::InvalidBookingTransition { from: previous, to: next }));
    }

    info!(
        event_name = "booking.status_changed",
        booking_id = %id.0,
        from = %previous,
        to = %next,
        "booking status updated"
    );
    Ok(Json(booking))
}

fn domain_failure(error: DomainError) -> ApiFailure {
    application_failure(ApplicationError::Domain(error))
}
