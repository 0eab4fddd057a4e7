use chrono::{Datelike, NaiveDate};
use regex::Regex;
use serde::{Deserialize, Serialize};

use horizon_core::domain::room::RoomType;
use horizon_core::domain::stay::StayDates;

const MONTH_PATTERN: &str = "jan(?:uary)?|feb(?:ruary)?|mar(?:ch)?|apr(?:il)?|may|june?|july?|aug(?:ust)?|sep(?:t(?:ember)?)?|oct(?:ober)?|nov(?:ember)?|dec(?:ember)?";

const RATE_KEYWORDS: &[&str] = &["price", "cost", "rate", "how much"];
const AMENITY_KEYWORDS: &[&str] = &["amenities", "facilities", "pool", "spa", "gym", "breakfast"];
const AVAILABILITY_KEYWORDS: &[&str] =
    &["available", "availability", "book", "reserve", "room", "stay", "looking for", "need a"];
const CONTEXT_KEYWORDS: &[&str] =
    &["room", "book", "night", "available", "standard", "deluxe", "suite", "penthouse"];
const FAREWELL_KEYWORDS: &[&str] = &["thank", "thanks", "bye", "goodbye", "that's all"];
const GREETING_KEYWORDS: &[&str] =
    &["hello", "hi ", "hey", "good morning", "good evening", "good afternoon"];

/// One turn of the chat transcript the widget sends back with each message.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub text: String,
}

impl ChatMessage {
    pub fn user(text: impl Into<String>) -> Self {
        Self { role: "user".to_string(), text: text.into() }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GuestCount {
    pub adults: u32,
    pub children: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChatIntent {
    Rates,
    Amenities,
    Availability,
    ChooseRoom(RoomType),
    GuestDetails,
    Farewell,
    Greeting,
    Fallback,
}

/// Keyword and pattern extraction for free-text booking messages.
#[derive(Clone, Debug)]
pub struct MessageParser {
    iso_range: Regex,
    month_range: Regex,
    name_intro: Regex,
    leading_name: Regex,
    phone: Regex,
    adults: Regex,
    children: Regex,
}

impl MessageParser {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            iso_range: Regex::new(
                r"(\d{4}-\d{2}-\d{2})\s*(?:to|-|through)\s*(\d{4}-\d{2}-\d{2})",
            )?,
            month_range: Regex::new(&format!(
                r"(?i)\b({MONTH_PATTERN})\.?\s+(\d{{1,2}})(?:st|nd|rd|th)?\s*(?:to|-|through|until)\s*(?:({MONTH_PATTERN})\.?\s+)?(\d{{1,2}})(?:st|nd|rd|th)?"
            ))?,
            name_intro: Regex::new(
                r"(?i)(?:name is|i'm|i am)\s+([a-z]+(?:\s+[a-z]+)?)",
            )?,
            leading_name: Regex::new(r"^([A-Z][a-z]+\s+[A-Z][a-z]+)")?,
            phone: Regex::new(r"\+?[\d\s()-]{10,}")?,
            adults: Regex::new(r"(?i)(\d+)\s*adult")?,
            children: Regex::new(r"(?i)(\d+)\s*(?:child|kid)")?,
        })
    }

    /// Routes a message to the first matching intent. `conversation` is the
    /// history with the current message appended.
    pub fn classify(&self, message: &str, conversation: &[ChatMessage]) -> ChatIntent {
        let lower = message.to_lowercase();

        if contains_any(&lower, RATE_KEYWORDS) {
            ChatIntent::Rates
        } else if contains_any(&lower, AMENITY_KEYWORDS) {
            ChatIntent::Amenities
        } else if contains_any(&lower, AVAILABILITY_KEYWORDS) {
            ChatIntent::Availability
        } else if let Some(room_type) =
            parse_room_type(&lower).filter(|_| has_booking_context(conversation))
        {
            ChatIntent::ChooseRoom(room_type)
        } else if self.has_name(message) && has_booking_context(conversation) {
            ChatIntent::GuestDetails
        } else if contains_any(&lower, FAREWELL_KEYWORDS) {
            ChatIntent::Farewell
        } else if contains_any(&format!("{lower} "), GREETING_KEYWORDS) {
            ChatIntent::Greeting
        } else {
            ChatIntent::Fallback
        }
    }

    /// Finds a stay in `text`. Month-name dates take the year of `today`, moving
    /// to next year when already past; a check-out before check-in wraps into
    /// the following year.
    pub fn parse_dates(&self, text: &str, today: NaiveDate) -> Option<StayDates> {
        if let Some(captures) = self.iso_range.captures(text) {
            return StayDates::parse(&captures[1], &captures[2]).ok();
        }

        let captures = self.month_range.captures(text)?;
        let check_in_month = month_number(&captures[1])?;
        let check_out_month =
            captures.get(3).map_or(Some(check_in_month), |month| month_number(month.as_str()))?;
        let check_in_day: u32 = captures[2].parse().ok()?;
        let check_out_day: u32 = captures[4].parse().ok()?;

        let mut check_in = NaiveDate::from_ymd_opt(today.year(), check_in_month, check_in_day)?;
        if check_in < today {
            check_in = NaiveDate::from_ymd_opt(today.year() + 1, check_in_month, check_in_day)?;
        }
        let mut check_out =
            NaiveDate::from_ymd_opt(check_in.year(), check_out_month, check_out_day)?;
        if check_out < check_in {
            check_out =
                NaiveDate::from_ymd_opt(check_in.year() + 1, check_out_month, check_out_day)?;
        }
        StayDates::new(check_in, check_out).ok()
    }

    /// Most recent stay mentioned anywhere in the conversation.
    pub fn find_dates(&self, conversation: &[ChatMessage], today: NaiveDate) -> Option<StayDates> {
        conversation.iter().rev().find_map(|turn| self.parse_dates(&turn.text, today))
    }

    pub fn has_name(&self, text: &str) -> bool {
        let lower = text.to_lowercase();
        ["name is", "i'm ", "i am "].iter().any(|prefix| lower.contains(prefix))
            || self.leading_name.is_match(text.trim())
    }

    pub fn extract_name(&self, text: &str) -> Option<String> {
        self.name_intro
            .captures(text)
            .or_else(|| self.leading_name.captures(text.trim()))
            .map(|captures| title_case(&captures[1]))
    }

    pub fn extract_phone(&self, text: &str) -> Option<String> {
        self.phone
            .find_iter(text)
            .map(|found| found.as_str().trim())
            .find(|candidate| candidate.chars().filter(char::is_ascii_digit).count() >= 7)
            .map(str::to_string)
    }

    pub fn extract_guests(&self, text: &str) -> Option<GuestCount> {
        let count = |pattern: &Regex| {
            pattern.captures(text).and_then(|captures| captures[1].parse::<u32>().ok())
        };
        let adults = count(&self.adults);
        let children = count(&self.children);
        if adults.is_none() && children.is_none() {
            return None;
        }
        Some(GuestCount { adults: adults.unwrap_or(2), children: children.unwrap_or(0) })
    }
}

pub fn contains_any(lower: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|keyword| lower.contains(keyword))
}

/// The most premium room type named in `lower`.
pub fn parse_room_type(lower: &str) -> Option<RoomType> {
    [RoomType::Penthouse, RoomType::Suite, RoomType::Deluxe, RoomType::Standard]
        .into_iter()
        .find(|room_type| lower.contains(&room_type.as_str().to_lowercase()))
}

pub fn find_room_type(conversation: &[ChatMessage]) -> Option<RoomType> {
    conversation.iter().rev().find_map(|turn| parse_room_type(&turn.text.to_lowercase()))
}

pub fn has_booking_context(conversation: &[ChatMessage]) -> bool {
    conversation.iter().any(|turn| contains_any(&turn.text.to_lowercase(), CONTEXT_KEYWORDS))
}

/// `Feb 20` style short date.
pub fn short_date(date: NaiveDate) -> String {
    date.format("%b %-d").to_string()
}

fn month_number(name: &str) -> Option<u32> {
    let prefix: String = name.chars().take(3).collect::<String>().to_lowercase();
    let month = match prefix.as_str() {
        "jan" => 1,
        "feb" => 2,
        "mar" => 3,
        "apr" => 4,
        "may" => 5,
        "jun" => 6,
        "jul" => 7,
        "aug" => 8,
        "sep" => 9,
        "oct" => 10,
        "nov" => 11,
        "dec" => 12,
        _ => return None,
    };
    Some(month)
}

/// `jane DOE` becomes `Jane Doe`.
fn title_case(name: &str) -> String {
    name.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            chars
                .next()
                .map(|first| first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect::<String>())
                .unwrap_or_default()
        })
        .collect::<Vec<String>>()
        .join(" ")
}
