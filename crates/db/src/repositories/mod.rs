use async_trait::async_trait;
use thiserror::Error;

use horizon_core::domain::booking::{Booking, BookingId, BookingStatus, ConfirmationCode, NewBooking};
use horizon_core::domain::call_log::CallLog;
use horizon_core::domain::room::{Room, RoomId, RoomType};
use horizon_core::domain::stay::StayDates;
use horizon_core::errors::DomainError;

pub mod booking;
pub mod call_log;
pub mod memory;
pub mod room;

pub use booking::SqlBookingRepository;
pub use call_log::SqlCallLogRepository;
pub use memory::InMemoryHotelStore;
pub use room::SqlRoomRepository;

/// Confirmation codes are short, so allocation retries on a collision.
pub const MAX_CODE_ATTEMPTS: usize = 8;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("conflict: {0}")]
    Conflict(String),
}

pub(crate) fn decode_error(error: impl std::fmt::Display) -> RepositoryError {
    RepositoryError::Decode(error.to_string())
}

#[async_trait]
pub trait RoomRepository: Send + Sync {
    async fn list_all(&self) -> Result<Vec<Room>, RepositoryError>;
    async fn find_by_id(&self, id: &RoomId) -> Result<Option<Room>, RepositoryError>;
    /// Rooms free for the whole stay, ordered by room number.
    async fn list_available(
        &self,
        stay: &StayDates,
        room_type: Option<RoomType>,
    ) -> Result<Vec<Room>, RepositoryError>;
    async fn save(&self, room: Room) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait BookingRepository: Send + Sync {
    /// All bookings, newest first.
    async fn list_recent(&self) -> Result<Vec<Booking>, RepositoryError>;
    async fn find_by_id(&self, id: &BookingId) -> Result<Option<Booking>, RepositoryError>;
    async fn find_by_confirmation_code(
        &self,
        code: &ConfirmationCode,
    ) -> Result<Option<Booking>, RepositoryError>;
    /// Reserves the first free room of the requested type in one atomic step.
    /// Returns `None` when every room of that type is taken for the stay.
    async fn allocate(&self, request: NewBooking) -> Result<Option<Booking>, RepositoryError>;
    /// Compare-and-set status change; `false` when the booking is missing or no
    /// longer in `expected`.
    async fn update_status(
        &self,
        id: &BookingId,
        expected: BookingStatus,
        next: BookingStatus,
    ) -> Result<bool, RepositoryError>;
    async fn save(&self, booking: Booking) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait CallLogRepository: Send + Sync {
    async fn list_latest(&self, limit: u32) -> Result<Vec<CallLog>, RepositoryError>;
    async fn record(&self, call: CallLog) -> Result<(), RepositoryError>;
}
