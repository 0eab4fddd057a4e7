use std::collections::BTreeMap;

use chrono::Utc;
use tokio::sync::RwLock;

use horizon_core::availability::{filter_available, quote_stay, room_number_order};
use horizon_core::domain::booking::{
    Booking, BookingId, BookingStatus, ConfirmationCode, NewBooking,
};
use horizon_core::domain::call_log::CallLog;
use horizon_core::domain::room::{Room, RoomId, RoomType};
use horizon_core::domain::stay::StayDates;

use super::{
    BookingRepository, CallLogRepository, RepositoryError, RoomRepository, MAX_CODE_ATTEMPTS,
};

#[derive(Default)]
struct HotelState {
    rooms: BTreeMap<String, Room>,
    bookings: Vec<Booking>,
    call_logs: Vec<CallLog>,
}

/// Process-local store implementing every hotel repository behind one lock.
#[derive(Default)]
pub struct InMemoryHotelStore {
    state: RwLock<HotelState>,
}

impl InMemoryHotelStore {
    pub fn with_rooms(rooms: impl IntoIterator<Item = Room>) -> Self {
        let rooms = rooms.into_iter().map(|room| (room.id.0.clone(), room)).collect();
        Self { state: RwLock::new(HotelState { rooms, ..HotelState::default() }) }
    }
}

#[async_trait::async_trait]
impl RoomRepository for InMemoryHotelStore {
    async fn list_all(&self) -> Result<Vec<Room>, RepositoryError> {
        let state = self.state.read().await;
        let mut rooms: Vec<Room> = state.rooms.values().cloned().collect();
        rooms.sort_by(|left, right| room_number_order(&left.number, &right.number));
        Ok(rooms)
    }

    async fn find_by_id(&self, id: &RoomId) -> Result<Option<Room>, RepositoryError> {
        let state = self.state.read().await;
        Ok(state.rooms.get(&id.0).cloned())
    }

    async fn list_available(
        &self,
        stay: &StayDates,
        room_type: Option<RoomType>,
    ) -> Result<Vec<Room>, RepositoryError> {
        let state = self.state.read().await;
        let rooms: Vec<Room> = state.rooms.values().cloned().collect();
        Ok(filter_available(&rooms, &state.bookings, stay, room_type).into_iter().cloned().collect())
    }

    async fn save(&self, room: Room) -> Result<(), RepositoryError> {
        room.validate()?;
        let mut state = self.state.write().await;
        state.rooms.insert(room.id.0.clone(), room);
        Ok(())
    }
}

#[async_trait::async_trait]
impl BookingRepository for InMemoryHotelStore {
    async fn list_recent(&self) -> Result<Vec<Booking>, RepositoryError> {
        let state = self.state.read().await;
        let mut bookings = state.bookings.clone();
        bookings.sort_by(|left, right| right.created_at.cmp(&left.created_at));
        Ok(bookings)
    }

    async fn find_by_id(&self, id: &BookingId) -> Result<Option<Booking>, RepositoryError> {
        let state = self.state.read().await;
        Ok(state.bookings.iter().find(|booking| booking.id == *id).cloned())
    }

    async fn find_by_confirmation_code(
        &self,
        code: &ConfirmationCode,
    ) -> Result<Option<Booking>, RepositoryError> {
        let state = self.state.read().await;
        Ok(state.bookings.iter().find(|booking| booking.confirmation_code == *code).cloned())
    }

    async fn allocate(&self, request: NewBooking) -> Result<Option<Booking>, RepositoryError> {
        request.validate()?;

        let mut state = self.state.write().await;
        let rooms: Vec<Room> = state.rooms.values().cloned().collect();
        let Some(room) = filter_available(&rooms, &state.bookings, &request.stay, Some(request.room_type))
            .first()
            .map(|room| (*room).clone())
        else {
            return Ok(None);
        };

        let code = (0..MAX_CODE_ATTEMPTS)
            .map(|_| ConfirmationCode::generate(&mut rand::thread_rng()))
            .find(|code| state.bookings.iter().all(|booking| booking.confirmation_code != *code))
            .ok_or_else(|| {
                RepositoryError::Conflict(format!(
                    "no unique confirmation code after {MAX_CODE_ATTEMPTS} attempts"
                ))
            })?;

        let quote = quote_stay(&room, &request.stay);
        let now = Utc::now();
        let booking = Booking {
            id: BookingId::generate(),
            room_id: room.id.clone(),
            room_type: room.room_type,
            room_number: room.number.clone(),
            floor: room.floor,
            guest_name: request.guest_name.trim().to_string(),
            guest_phone: request.guest_phone,
            stay: request.stay,
            adults: request.adults,
            children: request.children,
            total_price: quote.total,
            status: BookingStatus::Confirmed,
            confirmation_code: code,
            created_at: now,
            updated_at: now,
        };
        state.bookings.push(booking.clone());
        Ok(Some(booking))
    }

    async fn update_status(
        &self,
        id: &BookingId,
        expected: BookingStatus,
        next: BookingStatus,
    ) -> Result<bool, RepositoryError> {
        let mut state = self.state.write().await;
        match state.bookings.iter_mut().find(|booking| booking.id == *id) {
            Some(booking) if booking.status == expected => {
                booking.status = next;
                booking.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn save(&self, booking: Booking) -> Result<(), RepositoryError> {
        let mut state = self.state.write().await;
        match state.bookings.iter_mut().find(|existing| existing.id == booking.id) {
            Some(existing) => *existing = booking,
            None => state.bookings.push(booking),
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl CallLogRepository for InMemoryHotelStore {
    async fn list_latest(&self, limit: u32) -> Result<Vec<CallLog>, RepositoryError> {
        let state = self.state.read().await;
        let mut calls = state.call_logs.clone();
        calls.sort_by(|left, right| right.created_at.cmp(&left.created_at));
        calls.truncate(limit as usize);
        Ok(calls)
    }

    async fn record(&self, call: CallLog) -> Result<(), RepositoryError> {
        let mut state = self.state.write().await;
        state.call_logs.push(call);
        Ok(())
    }
}
