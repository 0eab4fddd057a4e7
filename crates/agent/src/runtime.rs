use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{info, warn};

use horizon_core::availability::{format_usd, quote_stay, summarize_by_type};
use horizon_core::domain::booking::{Booking, NewBooking};
use horizon_core::domain::room::RoomType;
use horizon_db::repositories::{BookingRepository, RepositoryError, RoomRepository};
use horizon_telnyx::Telephony;

use crate::conversation::{
    find_room_type, parse_room_type, short_date, ChatIntent, ChatMessage, MessageParser,
};
use crate::tools::confirmation_sms;

const PLACEHOLDER_PHONE: &str = "+1 (555) 000-0000";
const DEFAULT_ADULTS: u32 = 2;
const DIVIDER: &str = "━━━━━━━━━━━━━━━━━━━━━";

const RATE_CARD: &str = "Our nightly rates:\n\n🛏️ Standard — $99 · City view, Wi-Fi, TV\n✨ Deluxe — $149 · Balcony, bathrobe, breakfast\n🏰 Suite — $249 · Jacuzzi, living room, minibar\n👑 Penthouse — $499 · Terrace, butler, full kitchen\n\nWhich dates would you like me to check?";
const AMENITIES: &str = "Grand Horizon amenities:\n\n🏊 Rooftop infinity pool\n🧖 Full-service spa & sauna\n💪 24/7 fitness center\n🍳 Complimentary breakfast buffet\n🍷 3 restaurants & sky bar\n🅿️ Valet parking\n📶 High-speed Wi-Fi\n\nAll included with your stay. Shall I check room availability?";
const ASK_FOR_DATES: &str = "I'd be happy to check availability! What dates are you looking at? For example: \"February 20 to 23\"";
const FAREWELL: &str = "Thank you for choosing Grand Horizon Hotel! We look forward to your stay. Have a wonderful day! 🌟";
const GREETING: &str = "Welcome to Grand Horizon Hotel! I can help you with:\n\n📅 Room availability & booking\n💰 Rates & room types\n🏨 Hotel amenities\n\nWhat can I do for you?";
const FALLBACK: &str = "I'm here to help with room bookings, availability, rates, or hotel information. What would you like to know?";

/// Rule-based chat concierge backing the booking widget.
pub struct ConciergeRuntime {
    parser: MessageParser,
    rooms: Arc<dyn RoomRepository>,
    bookings: Arc<dyn BookingRepository>,
    telephony: Arc<dyn Telephony>,
}

impl ConciergeRuntime {
    pub fn new(
        parser: MessageParser,
        rooms: Arc<dyn RoomRepository>,
        bookings: Arc<dyn BookingRepository>,
        telephony: Arc<dyn Telephony>,
    ) -> Self {
        Self { parser, rooms, bookings, telephony }
    }

    pub fn parser(&self) -> &MessageParser {
        &self.parser
    }

    /// Answers `message` given the earlier turns. Month-name dates resolve
    /// relative to `today`.
    pub async fn reply(
        &self,
        message: &str,
        history: &[ChatMessage],
        today: NaiveDate,
    ) -> Result<String, RepositoryError> {
        let mut conversation = history.to_vec();
        conversation.push(ChatMessage::user(message));

        match self.parser.classify(message, &conversation) {
            ChatIntent::Rates => Ok(RATE_CARD.to_string()),
            ChatIntent::Amenities => Ok(AMENITIES.to_string()),
            ChatIntent::Availability => self.availability(message, today).await,
            ChatIntent::ChooseRoom(room_type) => {
                self.choose_room(room_type, &conversation, today).await
            }
            ChatIntent::GuestDetails => self.book(message, &conversation, today).await,
            ChatIntent::Farewell => Ok(FAREWELL.to_string()),
            ChatIntent::Greeting => Ok(GREETING.to_string()),
            ChatIntent::Fallback => Ok(FALLBACK.to_string()),
        }
    }

    async fn availability(&self, message: &str, today: NaiveDate) -> Result<String, RepositoryError> {
        let Some(stay) = self.parser.parse_dates(message, today) else {
            return Ok(ASK_FOR_DATES.to_string());
        };
        let room_type = parse_room_type(&message.to_lowercase());
        let rooms = self.rooms.list_available(&stay, room_type).await?;
        let (from, to) = (short_date(stay.check_in), short_date(stay.check_out));

        if rooms.is_empty() {
            return Ok(format!(
                "Unfortunately we're fully booked {from} to {to}. Would you like to try nearby dates?"
            ));
        }

        let nights = stay.nights();
        let free: Vec<_> = rooms.iter().collect();
        let lines = summarize_by_type(&free, nights)
            .iter()
            .map(|entry| {
                format!(
                    "• {} — {}/night ({} for {nights} nights) — {} available",
                    entry.room_type,
                    format_usd(entry.price_per_night),
                    format_usd(entry.stay_total),
                    entry.count
                )
            })
            .collect::<Vec<_>>()
            .join("\n");

        Ok(format!(
            "For {from} to {to} ({nights} night{}):\n\n{lines}\n\nWhich would you prefer?",
            plural(nights)
        ))
    }

    async fn choose_room(
        &self,
        room_type: RoomType,
        conversation: &[ChatMessage],
        today: NaiveDate,
    ) -> Result<String, RepositoryError> {
        let Some(stay) = self.parser.find_dates(conversation, today) else {
            return Ok("Which dates are you interested in?".to_string());
        };
        let rooms = self.rooms.list_available(&stay, Some(room_type)).await?;
        let Some(room) = rooms.first() else {
            return Ok(format!(
                "All {room_type} rooms are taken for those dates. Would you like a different room type?"
            ));
        };

        let quote = quote_stay(room, &stay);
        Ok(format!(
            "Great choice! {room_type} Room {} on Floor {}.\n\n💰 {} × {} = {}\n🛎️ {}\n\nTo book, I'll need your full name, phone number, and number of guests.",
            room.number,
            room.floor,
            quote.nights,
            format_usd(room.price_per_night),
            format_usd(quote.total),
            room.amenities.join(" · ")
        ))
    }

    async fn book(
        &self,
        message: &str,
        conversation: &[ChatMessage],
        today: NaiveDate,
    ) -> Result<String, RepositoryError> {
        let Some(name) = self.parser.extract_name(message) else {
            return Ok("Could you share your full name for the reservation?".to_string());
        };
        let dates = self.parser.find_dates(conversation, today);
        let room_type = find_room_type(conversation);
        let (Some(stay), Some(room_type)) = (dates, room_type) else {
            return Ok(format!("Thanks, {name}! What dates and room type would you like?"));
        };

        let phone = self.parser.extract_phone(message);
        let guests = self.parser.extract_guests(message);
        let request = NewBooking {
            room_type,
            guest_name: name.clone(),
            guest_phone: phone.clone().unwrap_or_else(|| PLACEHOLDER_PHONE.to_string()),
            stay,
            adults: guests.map_or(DEFAULT_ADULTS, |guests| guests.adults).max(1),
            children: guests.map_or(0, |guests| guests.children),
        };

        let Some(booking) = self.bookings.allocate(request).await? else {
            return Ok("That room was just booked! Let me find alternatives...".to_string());
        };
        info!(
            event_name = "chat.booking.created",
            confirmation_code = %booking.confirmation_code,
            room_number = %booking.room_number,
        );

        let delivery = match phone {
            Some(phone) if self.text_confirmation(&phone, &booking).await => {
                format!("📱 Confirmation sent to {phone}")
            }
            Some(phone) => format!("📱 Confirmation saved for {phone}"),
            None => "Would you like a confirmation text?".to_string(),
        };

        Ok(format!(
            "✅ Reservation confirmed!\n\n{DIVIDER}\n🔑  {}\n🏨  {} Room {}, Floor {}\n📅  {} → {} ({} nights)\n👤  {} · {}\n💰  {}\n{DIVIDER}\n\n{delivery}\n\nIs there anything else I can help with?",
            booking.confirmation_code,
            booking.room_type,
            booking.room_number,
            booking.floor,
            short_date(booking.stay.check_in),
            short_date(booking.stay.check_out),
            booking.stay.nights(),
            booking.guest_name,
            party(booking.adults, booking.children),
            format_usd(booking.total_price),
        ))
    }

    /// Texts the confirmation when a sending number is configured. Returns
    /// whether the message went out.
    async fn text_confirmation(&self, phone: &str, booking: &Booking) -> bool {
        if self.telephony.sending_number().is_none() {
            return false;
        }
        let summary = format!(
            "{} Room {}, {} → {} ({} nights), {}",
            booking.room_type,
            booking.room_number,
            short_date(booking.stay.check_in),
            short_date(booking.stay.check_out),
            booking.stay.nights(),
            format_usd(booking.total_price)
        );
        match self.telephony.send_sms(phone, &confirmation_sms(&booking.confirmation_code.0, &summary)).await {
            Ok(_) => true,
            Err(error) => {
                warn!(event_name = "chat.confirmation.not_sent", error = %error);
                false
            }
        }
    }
}

fn plural(count: i64) -> &'static str {
    if count == 1 {
        ""
    } else {
        "s"
    }
}

fn party(adults: u32, children: u32) -> String {
    let mut party = format!("{adults} adult{}", plural(i64::from(adults)));
    match children {
        0 => {}
        1 => party.push_str(", 1 child"),
        many => party.push_str(&format!(", {many} children")),
    }
    party
}
