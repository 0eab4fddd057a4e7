//! TeXML call control for inbound calls: greet, gather dates by speech, offer the
//! first free room and book it on a spoken "yes".

use axum::{
    extract::{Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use serde_json::json;
use tera::Context;
use tracing::{error, info, warn};

use horizon_agent::conversation::parse_room_type;
use horizon_core::availability::{format_usd, quote_stay};
use horizon_core::domain::booking::NewBooking;
use horizon_core::domain::call_log::{CallLog, CallOutcome};
use horizon_core::domain::room::RoomType;
use horizon_core::domain::stay::StayDates;

use super::{AppState, WebhookPayload};
use crate::templates;

const ANSWERING_EVENTS: [&str; 2] = ["call.initiated", "call.answered"];
const AFFIRMATIVE: [&str; 6] = ["yes", "yeah", "yep", "sure", "confirm", "correct"];
const VOICE_GUEST_NAME: &str = "Phone Guest";
const UNKNOWN_CALLER: &str = "unknown";

pub async fn inbound(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: WebhookPayload,
) -> Response {
    let event = payload.text(&["/data/event_type", "/event_type"]).unwrap_or_default();
    if !ANSWERING_EVENTS.contains(&event.as_str()) {
        return Json(json!({ "status": "ok" })).into_response();
    }

    if event == "call.initiated" {
        let caller = caller(&payload);
        let log = CallLog { outcome: CallOutcome::Inbound, ..CallLog::initiated(caller) };
        if let Err(error) = state.call_logs.record(log).await {
            warn!(event_name = "voice.call_log.not_recorded", error = %error);
        }
    }

    let mut context = Context::new();
    context.insert("gather_url", &format!("{}/voice/gather", base_url(&state, &headers)));
    render(&state, templates::GREETING, &context)
}

pub async fn gather(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: WebhookPayload,
) -> Response {
    let Some(speech) = payload.text(&["/SpeechResult", "/data/payload/speech"]) else {
        return render(&state, templates::NO_SPEECH, &Context::new());
    };
    let base = base_url(&state, &headers);

    let today = Utc::now().date_naive();
    let Some(stay) = state.concierge.parser().parse_dates(&speech, today) else {
        let mut context = Context::new();
        context.insert("gather_url", &format!("{base}/voice/gather"));
        return render(&state, templates::REPROMPT, &context);
    };
    let room_type = parse_room_type(&speech.to_lowercase());

    let rooms = match state.rooms.list_available(&stay, room_type).await {
        Ok(rooms) => rooms,
        Err(error) => return failure("voice.gather.failed", error),
    };
    let Some(room) = rooms.first() else {
        return render(&state, templates::FULLY_BOOKED, &Context::new());
    };

    let quote = quote_stay(room, &stay);
    let mut context = Context::new();
    context.insert("check_in", &spoken_date(stay.check_in));
    context.insert("check_out", &spoken_date(stay.check_out));
    context.insert("room_type", room.room_type.as_str());
    context.insert("room_number", &room.number);
    context.insert("price_per_night", &format_usd(room.price_per_night));
    context.insert("nights", &quote.nights);
    context.insert("total", &format_usd(quote.total));
    context.insert(
        "confirm_url",
        &format!(
            "{base}/voice/confirm?check_in={}&check_out={}&room_type={}",
            stay.check_in_str(),
            stay.check_out_str(),
            room.room_type
        ),
    );
    render(&state, templates::OFFER, &context)
}

#[derive(Debug, Default, Deserialize)]
pub struct ConfirmQuery {
    pub check_in: Option<String>,
    pub check_out: Option<String>,
    pub room_type: Option<String>,
}

pub async fn confirm(
    State(state): State<AppState>,
    Query(query): Query<ConfirmQuery>,
    payload: WebhookPayload,
) -> Response {
    let speech = payload.text(&["/SpeechResult", "/data/payload/speech"]).unwrap_or_default();
    if !is_affirmative(&speech) {
        return render(&state, templates::DECLINED, &Context::new());
    }

    let Some((stay, room_type)) = offered_stay(&query) else {
        warn!(event_name = "voice.confirm.invalid_offer", ?query);
        return render(&state, templates::DECLINED, &Context::new());
    };

    let caller = caller(&payload);
    let request = NewBooking {
        room_type,
        guest_name: VOICE_GUEST_NAME.to_string(),
        guest_phone: caller.clone(),
        stay,
        adults: 1,
        children: 0,
    };
    let booking = match state.bookings.allocate(request).await {
        Ok(Some(booking)) => booking,
        Ok(None) => return render(&state, templates::FULLY_BOOKED, &Context::new()),
        Err(error) => return failure("voice.confirm.failed", error),
    };
    info!(
        event_name = "voice.booking.created",
        confirmation_code = %booking.confirmation_code,
        room_number = %booking.room_number,
    );

    let log = CallLog {
        outcome: CallOutcome::Booked,
        transcript: Some(format!("Booked {} via voice", booking.confirmation_code)),
        ..CallLog::initiated(caller)
    };
    if let Err(error) = state.call_logs.record(log).await {
        warn!(event_name = "voice.call_log.not_recorded", error = %error);
    }

    let mut context = Context::new();
    context.insert("room_type", booking.room_type.as_str());
    context.insert("room_number", &booking.room_number);
    context.insert("check_in", &spoken_date(booking.stay.check_in));
    context.insert("check_out", &spoken_date(booking.stay.check_out));
    context.insert("spoken_code", &spell_out(&booking.confirmation_code.0));
    context.insert("total", &format_usd(booking.total_price));
    render(&state, templates::CONFIRMED, &context)
}

fn caller(payload: &WebhookPayload) -> String {
    payload
        .text(&["/From", "/data/payload/from"])
        .unwrap_or_else(|| UNKNOWN_CALLER.to_string())
}

fn offered_stay(query: &ConfirmQuery) -> Option<(StayDates, RoomType)> {
    let stay = StayDates::parse(query.check_in.as_deref()?, query.check_out.as_deref()?).ok()?;
    let room_type = query.room_type.as_deref()?.parse().ok()?;
    Some((stay, room_type))
}

fn is_affirmative(speech: &str) -> bool {
    let lower = speech.to_lowercase();
    lower
        .split(|c: char| !c.is_alphanumeric())
        .any(|word| AFFIRMATIVE.contains(&word))
}

/// Configured public URL, else rebuilt from the proxy headers.
fn base_url(state: &AppState, headers: &HeaderMap) -> String {
    if let Some(url) = state.public_base_url.as_deref().filter(|url| !url.trim().is_empty()) {
        return url.trim_end_matches('/').to_string();
    }
    let read = |name: &str| headers.get(name).and_then(|value| value.to_str().ok());
    let proto = read("x-forwarded-proto").unwrap_or("https");
    let host = read(header::HOST.as_str()).unwrap_or("localhost:3000");
    format!("{proto}://{host}")
}

fn spoken_date(date: NaiveDate) -> String {
    date.format("%B %-d").to_string()
}

/// `GH-A7K3` becomes `G H dash A 7 K 3` so text-to-speech reads each character.
fn spell_out(code: &str) -> String {
    code.chars()
        .map(|c| if c == '-' { "dash".to_string() } else { c.to_string() })
        .collect::<Vec<_>>()
        .join(" ")
}

fn render(state: &AppState, template: &str, context: &Context) -> Response {
    match state.templates.render(template, context) {
        Ok(xml) => ([(header::CONTENT_TYPE, "application/xml")], xml).into_response(),
        Err(error) => failure("voice.render.failed", error),
    }
}

fn failure(event_name: &'static str, error: impl std::fmt::Display) -> Response {
    error!(event_name = event_name, error = %error);
    (StatusCode::INTERNAL_SERVER_ERROR, "voice flow unavailable").into_response()
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde_json::json;

    use horizon_core::domain::call_log::CallOutcome;
    use horizon_db::repositories::{BookingRepository, CallLogRepository};

    use super::{is_affirmative, spell_out};
    use crate::routes::test_support::{hotel, json_post, send, state, state_with, FakeTelephony};

    fn form_post(uri: &str, body: &'static str) -> Request<Body> {
        Request::post(uri)
            .header("content-type", "application/x-www-form-urlencoded")
            .header("host", "hotel.example")
            .body(Body::from(body))
            .expect("request")
    }

    #[test]
    fn confirmation_codes_are_spelled_out() {
        assert_eq!(spell_out("GH-A7K3"), "G H dash A 7 K 3");
    }

    #[test]
    fn affirmative_answers_are_whole_words() {
        assert!(is_affirmative("Yes, please."));
        assert!(is_affirmative("yeah sure"));
        assert!(!is_affirmative("no thanks"));
        assert!(!is_affirmative("yesterday"));
    }

    #[tokio::test]
    async fn answered_call_gets_a_greeting_with_forwarded_base_url() {
        let request = Request::post("/voice/inbound")
            .header("content-type", "application/json")
            .header("host", "hotel.example")
            .header("x-forwarded-proto", "http")
            .body(Body::from(json!({ "data": { "event_type": "call.answered" } }).to_string()))
            .expect("request");
        let (response, body) = send(state(), request).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get("content-type").and_then(|value| value.to_str().ok()),
            Some("application/xml")
        );
        assert!(body.contains("Welcome to Grand Horizon Hotel!"));
        assert!(body.contains("http:&#x2F;&#x2F;hotel.example&#x2F;voice&#x2F;gather"), "{body}");
    }

    #[tokio::test]
    async fn initiated_call_is_logged_and_other_events_are_acknowledged() {
        let store = hotel();
        let app = state_with(store.clone(), std::sync::Arc::new(FakeTelephony::configured()));

        let (_, body) = send(
            app.clone(),
            json_post(
                "/voice/inbound",
                json!({ "data": { "event_type": "call.initiated", "payload": { "from": "+14155550142" } } }),
            ),
        )
        .await;
        assert!(body.contains("<Gather"));
        let logs = store.list_latest(5).await.expect("logs");
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].outcome, CallOutcome::Inbound);
        assert_eq!(logs[0].caller_phone, "+14155550142");

        let (_, body) =
            send(app, json_post("/voice/inbound", json!({ "event_type": "call.hangup" }))).await;
        assert_eq!(body, r#"{"status":"ok"}"#);
    }

    #[tokio::test]
    async fn gather_branches_on_speech() {
        struct Case {
            name: &'static str,
            body: &'static str,
            expected: &'static str,
        }

        let cases = [
            Case { name: "silence", body: "SpeechResult=", expected: "I didn't catch that. Please call back" },
            Case { name: "no dates", body: "SpeechResult=next+weekend", expected: "Sorry, I didn't get the dates." },
            Case {
                name: "dates",
                body: "SpeechResult=2030-02-20+to+2030-02-23",
                expected: "We have a Standard Room 201 available at $99 per night.",
            },
        ];

        for case in cases {
            let (response, body) = send(state(), form_post("/voice/gather", case.body)).await;
            assert_eq!(response.status(), StatusCode::OK, "{}", case.name);
            assert!(body.contains(case.expected), "{}: {body}", case.name);
        }
    }

    #[tokio::test]
    async fn gather_offers_the_requested_type_and_links_to_confirm() {
        let (_, body) = send(
            state(),
            form_post("/voice/gather", "SpeechResult=2030-02-20+to+2030-02-23+penthouse+please"),
        )
        .await;
        assert!(body.contains("Penthouse Room 501"), "{body}");
        assert!(body.contains("your total would be $1497"), "{body}");
        assert!(
            body.contains("confirm?check_in=2030-02-20&amp;check_out=2030-02-23&amp;room_type=Penthouse"),
            "{body}"
        );
    }

    #[tokio::test]
    async fn confirm_books_on_yes_and_declines_otherwise() {
        let store = hotel();
        let app = state_with(store.clone(), std::sync::Arc::new(FakeTelephony::configured()));
        let uri = "/voice/confirm?check_in=2030-02-20&check_out=2030-02-23&room_type=Suite";

        let (_, body) = send(app.clone(), form_post(uri, "SpeechResult=no+thanks")).await;
        assert!(body.contains("No problem."), "{body}");
        assert!(store.list_recent().await.expect("bookings").is_empty());

        let (_, body) =
            send(app, form_post(uri, "SpeechResult=Yes+please&From=%2B14155550177")).await;
        assert!(body.contains("You're all set! Your Suite Room 401"), "{body}");
        assert!(body.contains("G H dash"), "{body}");

        let bookings = store.list_recent().await.expect("bookings");
        assert_eq!(bookings.len(), 1);
        assert_eq!(bookings[0].guest_phone, "+14155550177");
        let logs = store.list_latest(5).await.expect("logs");
        assert_eq!(logs[0].outcome, CallOutcome::Booked);
    }
}
