use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(pub String);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RoomType {
    Standard,
    Deluxe,
    Suite,
    Penthouse,
}

impl RoomType {
    /// Ordered from cheapest to most expensive.
    pub const ALL: [RoomType; 4] =
        [RoomType::Standard, RoomType::Deluxe, RoomType::Suite, RoomType::Penthouse];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Standard => "Standard",
            Self::Deluxe => "Deluxe",
            Self::Suite => "Suite",
            Self::Penthouse => "Penthouse",
        }
    }

    pub fn id_prefix(&self) -> &'static str {
        match self {
            Self::Standard => "std",
            Self::Deluxe => "dlx",
            Self::Suite => "ste",
            Self::Penthouse => "ph",
        }
    }
}

impl fmt::Display for RoomType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RoomType {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "standard" => Ok(Self::Standard),
            "deluxe" => Ok(Self::Deluxe),
            "suite" => Ok(Self::Suite),
            "penthouse" => Ok(Self::Penthouse),
            other => Err(DomainError::UnknownRoomType(other.to_string())),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Room {
    pub id: RoomId,
    #[serde(rename = "type")]
    pub room_type: RoomType,
    pub number: String,
    pub floor: u32,
    #[serde(with = "rust_decimal::serde::float")]
    pub price_per_night: Decimal,
    pub amenities: Vec<String>,
}

impl Room {
    /// Prices are whole cents so every store computes identical stay totals.
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.price_per_night.is_sign_negative() || self.price_per_night.normalize().scale() > 2 {
            return Err(DomainError::InvariantViolation(format!(
                "room {} price must be a non-negative amount in whole cents, got {}",
                self.number, self.price_per_night
            )));
        }
        Ok(())
    }

    pub fn stay_price(&self, nights: i64) -> Decimal {
        self.price_per_night * Decimal::from(nights.max(0))
    }
}
