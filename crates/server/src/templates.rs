use std::sync::Arc;

use tera::Tera;

pub const GREETING: &str = "voice/greeting.xml";
pub const REPROMPT: &str = "voice/reprompt.xml";
pub const OFFER: &str = "voice/offer.xml";
pub const FULLY_BOOKED: &str = "voice/fully_booked.xml";
pub const NO_SPEECH: &str = "voice/no_speech.xml";
pub const CONFIRMED: &str = "voice/confirmed.xml";
pub const DECLINED: &str = "voice/declined.xml";
pub const DASHBOARD: &str = "dashboard.html";

const SOURCES: [(&str, &str); 8] = [
    (GREETING, include_str!("../../../templates/voice/greeting.xml")),
    (REPROMPT, include_str!("../../../templates/voice/reprompt.xml")),
    (OFFER, include_str!("../../../templates/voice/offer.xml")),
    (FULLY_BOOKED, include_str!("../../../templates/voice/fully_booked.xml")),
    (NO_SPEECH, include_str!("../../../templates/voice/no_speech.xml")),
    (CONFIRMED, include_str!("../../../templates/voice/confirmed.xml")),
    (DECLINED, include_str!("../../../templates/voice/declined.xml")),
    (DASHBOARD, include_str!("../../../templates/dashboard.html")),
];

/// Compiles the embedded call-control and dashboard templates. Names ending in
/// `.xml` and `.html` are autoescaped.
pub fn load() -> Result<Arc<Tera>, tera::Error> {
    let mut tera = Tera::default();
    tera.add_raw_templates(SOURCES)?;
    Ok(Arc::new(tera))
}

#[cfg(test)]
mod tests {
    use tera::Context;

    use super::{load, GREETING, NO_SPEECH, OFFER};

    #[test]
    fn all_templates_compile() {
        let tera = load().expect("templates");
        let names: Vec<&str> = tera.get_template_names().collect();
        assert_eq!(names.len(), 8);
        assert!(tera.render(NO_SPEECH, &Context::new()).expect("render").contains("<Hangup/>"));
    }

    #[test]
    fn interpolated_values_are_escaped() {
        let tera = load().expect("templates");
        let mut context = Context::new();
        context.insert("gather_url", "https://hotel.test/voice/gather?a=1&b=2");
        let xml = tera.render(GREETING, &context).expect("render");
        assert!(xml.contains("action=\"https:&#x2F;&#x2F;hotel.test&#x2F;voice&#x2F;gather?a=1&amp;b=2\""));
    }

    #[test]
    fn offer_pluralizes_nights() {
        let tera = load().expect("templates");
        let mut context = Context::new();
        context.insert("check_in", "February 20");
        context.insert("check_out", "February 21");
        context.insert("room_type", "Standard");
        context.insert("room_number", "201");
        context.insert("price_per_night", "$99");
        context.insert("nights", &1);
        context.insert("total", "$99");
        context.insert("confirm_url", "/voice/confirm");
        let xml = tera.render(OFFER, &context).expect("render");
        assert!(xml.contains("For 1 night, your total would be $99."));
    }
}
