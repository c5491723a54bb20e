use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Location recorded when a scan carries no payload.
pub const UNKNOWN_LOCATION: &str = "UNKNOWN";

/// Direction of a punch.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum PunchType {
    #[serde(rename = "IN", alias = "in")]
    In,
    #[serde(rename = "OUT", alias = "out")]
    Out,
}

impl std::fmt::Display for PunchType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::In => "IN",
            Self::Out => "OUT",
        })
    }
}

/// One IN/OUT event, as stored in a user's ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PunchRecord {
    pub email: String,
    #[serde(rename = "type")]
    pub kind: PunchType,
    pub location: String,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

impl PunchRecord {
    /// Builds a record from a scan; empty payloads become [`UNKNOWN_LOCATION`].
    pub fn from_scan(
        email: &str,
        kind: PunchType,
        decoded: Option<&str>,
        timestamp: OffsetDateTime,
    ) -> Self {
        let location = match decoded {
            Some(text) if !text.is_empty() => text.to_string(),
            _ => UNKNOWN_LOCATION.to_string(),
        };
        Self {
            email: email.to_string(),
            kind,
            location,
            timestamp,
        }
    }
}
