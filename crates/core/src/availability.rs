//! Pure room availability, pricing and occupancy rules.
//!
//! Everything here works over in-memory slices so the same logic backs the
//! in-memory store, the chat concierge and the dashboard statistics. The SQL
//! repository mirrors `filter_available` with an equivalent `NOT EXISTS` query.

use chrono::NaiveDate;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::domain::booking::Booking;
use crate::domain::room::{Room, RoomType};
use crate::domain::stay::StayDates;

/// Rooms of the optional `room_type` with no room-holding booking overlapping `stay`,
/// ordered by room number.
pub fn filter_available<'a>(
    rooms: &'a [Room],
    bookings: &[Booking],
    stay: &StayDates,
    room_type: Option<RoomType>,
) -> Vec<&'a Room> {
    let mut available: Vec<&Room> = rooms
        .iter()
        .filter(|room| room_type.map_or(true, |wanted| room.room_type == wanted))
        .filter(|room| !is_room_taken(room, bookings, stay))
        .collect();
    available.sort_by(|left, right| room_number_order(&left.number, &right.number));
    available
}

pub fn is_room_taken(room: &Room, bookings: &[Booking], stay: &StayDates) -> bool {
    bookings.iter().any(|booking| {
        booking.room_id == room.id && booking.status.holds_room() && booking.stay.overlaps(stay)
    })
}

/// Numeric room-number order, falling back to text for non-numeric labels.
pub fn room_number_order(left: &str, right: &str) -> std::cmp::Ordering {
    match (left.parse::<u32>(), right.parse::<u32>()) {
        (Ok(left), Ok(right)) => left.cmp(&right),
        _ => left.cmp(right),
    }
}

/// Free inventory of one room type for a stay.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeAvailability {
    pub room_type: RoomType,
    pub count: usize,
    #[serde(with = "rust_decimal::serde::float")]
    pub price_per_night: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub stay_total: Decimal,
    pub nights: i64,
    pub amenities: Vec<String>,
}

/// Groups already-filtered rooms by type. The first room seen for a type supplies
/// its price and amenities; types come out cheapest first.
pub fn summarize_by_type(rooms: &[&Room], nights: i64) -> Vec<TypeAvailability> {
    RoomType::ALL
        .iter()
        .filter_map(|room_type| {
            let mut of_type = rooms.iter().filter(|room| room.room_type == *room_type);
            let first = of_type.next()?;
            Some(TypeAvailability {
                room_type: *room_type,
                count: 1 + of_type.count(),
                price_per_night: first.price_per_night,
                stay_total: first.stay_price(nights),
                nights,
                amenities: first.amenities.clone(),
            })
        })
        .collect()
}

/// What a specific room would cost for a stay.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StayQuote {
    pub room: Room,
    pub nights: i64,
    pub total: Decimal,
}

pub fn quote_stay(room: &Room, stay: &StayDates) -> StayQuote {
    let nights = stay.nights();
    StayQuote { room: room.clone(), nights, total: room.stay_price(nights) }
}

/// Formats whole-dollar amounts as `$297`, keeping cents only when present.
pub fn format_usd(amount: Decimal) -> String {
    format!("${}", amount.normalize())
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OccupancyStats {
    pub total_rooms: usize,
    pub occupied_rooms: usize,
    pub available_rooms: usize,
    pub occupancy_rate: u32,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_revenue: Decimal,
    pub total_guests: u32,
    pub total_bookings: usize,
}

pub fn occupancy_stats(rooms: &[Room], bookings: &[Booking], as_of: NaiveDate) -> OccupancyStats {
    let occupied_rooms = rooms
        .iter()
        .filter(|room| {
            bookings.iter().any(|booking| {
                booking.room_id == room.id
                    && booking.status.holds_room()
                    && booking.stay.covers(as_of)
            })
        })
        .count();

    let total_rooms = rooms.len();
    let occupancy_rate = if total_rooms == 0 {
        0
    } else {
        let ratio = Decimal::from(occupied_rooms * 100) / Decimal::from(total_rooms);
        ratio.round().to_u32().unwrap_or(0)
    };

    OccupancyStats {
        total_rooms,
        occupied_rooms,
        available_rooms: total_rooms - occupied_rooms,
        occupancy_rate,
        total_revenue: bookings
            .iter()
            .filter(|booking| booking.status.holds_room())
            .map(|booking| booking.total_price)
            .sum(),
        total_guests: bookings
            .iter()
            .filter(|booking| booking.status.is_active())
            .map(Booking::guests)
            .fold(0, u32::saturating_add),
        total_bookings: bookings.len(),
    }
}
