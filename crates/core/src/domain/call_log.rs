use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CallLogId(pub String);

impl CallLogId {
    pub fn generate() -> Self {
        Self(format!("call-{}", &uuid::Uuid::new_v4().simple().to_string()[..12]))
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallOutcome {
    Initiated,
    Inbound,
    Booked,
    Inquiry,
    Completed,
    Abandoned,
    #[serde(untagged)]
    Other(String),
}

impl CallOutcome {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Initiated => "initiated",
            Self::Inbound => "inbound",
            Self::Booked => "booked",
            Self::Inquiry => "inquiry",
            Self::Completed => "completed",
            Self::Abandoned => "abandoned",
            Self::Other(value) => value,
        }
    }

    /// Unknown stored values are kept verbatim rather than rejected.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "initiated" => Self::Initiated,
            "inbound" => Self::Inbound,
            "booked" => Self::Booked,
            "inquiry" => Self::Inquiry,
            "completed" => Self::Completed,
            "abandoned" => Self::Abandoned,
            _ => Self::Other(value.to_string()),
        }
    }
}

impl fmt::Display for CallOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallLog {
    pub id: CallLogId,
    pub caller_phone: String,
    pub duration_secs: u32,
    pub outcome: CallOutcome,
    pub transcript: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl CallLog {
    pub fn initiated(caller_phone: impl Into<String>) -> Self {
        Self {
            id: CallLogId::generate(),
            caller_phone: caller_phone.into(),
            duration_secs: 0,
            outcome: CallOutcome::Initiated,
            transcript: None,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{CallLog, CallOutcome};

    #[test]
    fn unknown_outcomes_round_trip_verbatim() {
        assert_eq!(CallOutcome::parse("Booked"), CallOutcome::Booked);
        assert_eq!(CallOutcome::parse("transferred").as_str(), "transferred");

        let json = serde_json::to_value(CallOutcome::Other("transferred".to_string()))
            .expect("serialize");
        assert_eq!(json, "transferred");
    }

    #[test]
    fn initiated_log_starts_empty() {
        let log = CallLog::initiated("+14155550000");
        assert_eq!(log.outcome, CallOutcome::Initiated);
        assert_eq!(log.duration_secs, 0);
        assert!(log.transcript.is_none());
        assert!(log.id.0.starts_with("call-"));
    }
}
