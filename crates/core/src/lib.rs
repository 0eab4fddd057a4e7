pub mod availability;
pub mod config;
pub mod domain;
pub mod errors;

pub use availability::{
    filter_available, format_usd, occupancy_stats, quote_stay, summarize_by_type, OccupancyStats,
    StayQuote, TypeAvailability,
};
pub use domain::booking::{Booking, BookingId, BookingStatus, ConfirmationCode, NewBooking};
pub use domain::call_log::{CallLog, CallLogId, CallOutcome};
pub use domain::room::{Room, RoomId, RoomType};
pub use domain::stay::StayDates;
pub use errors::{ApplicationError, DomainError, InterfaceError};
