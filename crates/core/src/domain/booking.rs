use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rand::Rng;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::room::{RoomId, RoomType};
use crate::domain::stay::StayDates;
use crate::errors::DomainError;

const CODE_PREFIX: &str = "GH-";
const CODE_ALPHABET: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const CODE_LENGTH: usize = 4;
/// Upper bound on adults, and separately on children, in one room.
pub const MAX_GUESTS_PER_KIND: u32 = 8;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BookingId(pub String);

impl BookingId {
    pub fn generate() -> Self {
        Self(format!("bk-{}", &uuid::Uuid::new_v4().simple().to_string()[..12]))
    }
}

/// Short guest-facing booking reference, e.g. `GH-A7K3`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConfirmationCode(pub String);

impl ConfirmationCode {
    pub fn generate<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let suffix: String = (0..CODE_LENGTH)
            .map(|_| CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char)
            .collect();
        Self(format!("{CODE_PREFIX}{suffix}"))
    }

    pub fn is_well_formed(&self) -> bool {
        self.0.strip_prefix(CODE_PREFIX).is_some_and(|suffix| {
            suffix.len() == CODE_LENGTH && suffix.bytes().all(|byte| CODE_ALPHABET.contains(&byte))
        })
    }
}

impl fmt::Display for ConfirmationCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BookingStatus {
    Confirmed,
    CheckedIn,
    CheckedOut,
    Cancelled,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Confirmed => "confirmed",
            Self::CheckedIn => "checked-in",
            Self::CheckedOut => "checked-out",
            Self::Cancelled => "cancelled",
        }
    }

    /// Whether a booking in this status still holds its room for its dates.
    pub fn holds_room(&self) -> bool {
        !matches!(self, Self::Cancelled)
    }

    /// Guests counted as in-house or arriving.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Confirmed | Self::CheckedIn)
    }

    pub fn can_transition_to(&self, next: BookingStatus) -> bool {
        matches!(
            (self, next),
            (Self::Confirmed, Self::CheckedIn)
                | (Self::Confirmed, Self::Cancelled)
                | (Self::CheckedIn, Self::CheckedOut)
        )
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BookingStatus {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "confirmed" => Ok(Self::Confirmed),
            "checked-in" => Ok(Self::CheckedIn),
            "checked-out" => Ok(Self::CheckedOut),
            "cancelled" | "canceled" => Ok(Self::Cancelled),
            other => Err(DomainError::UnknownBookingStatus(other.to_string())),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    pub id: BookingId,
    pub room_id: RoomId,
    pub room_type: RoomType,
    pub room_number: String,
    pub floor: u32,
    pub guest_name: String,
    pub guest_phone: String,
    #[serde(flatten)]
    pub stay: StayDates,
    pub adults: u32,
    pub children: u32,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_price: Decimal,
    pub status: BookingStatus,
    pub confirmation_code: ConfirmationCode,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    pub fn guests(&self) -> u32 {
        self.adults.saturating_add(self.children)
    }

    pub fn transition_to(&mut self, next: BookingStatus) -> Result<(), DomainError> {
        if self.status.can_transition_to(next) {
            self.status = next;
            self.updated_at = Utc::now();
            return Ok(());
        }

        Err(DomainError::InvalidBookingTransition { from: self.status, to: next })
    }
}

/// A reservation request for any free room of `room_type`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewBooking {
    pub room_type: RoomType,
    pub guest_name: String,
    pub guest_phone: String,
    pub stay: StayDates,
    pub adults: u32,
    pub children: u32,
}

impl NewBooking {
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.guest_name.trim().is_empty() {
            return Err(DomainError::InvariantViolation("guest name is required".to_string()));
        }
        if self.adults == 0 {
            return Err(DomainError::InvariantViolation(
                "a booking needs at least one adult".to_string(),
            ));
        }
        if self.adults > MAX_GUESTS_PER_KIND || self.children > MAX_GUESTS_PER_KIND {
            return Err(DomainError::InvariantViolation(format!(
                "a room holds at most {MAX_GUESTS_PER_KIND} adults and {MAX_GUESTS_PER_KIND} children"
            )));
        }
        Ok(())
    }
}
