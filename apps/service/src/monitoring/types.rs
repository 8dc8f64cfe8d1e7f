use std::fmt;

use serde::{Deserialize, Serialize};

use crate::store::records::Check;

/// Up/down classification of a check, derived from its latest outcome.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckState {
    Up,
    #[default]
    Down,
}

impl fmt::Display for CheckState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CheckState::Up => write!(f, "up"),
            CheckState::Down => write!(f, "down"),
        }
    }
}

/// Result of a single probe attempt. Exactly one of `error` or
/// `response_code` is set; probe failures are data, not errors.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Outcome {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_code: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
}

impl Outcome {
    /// The target answered with a status code.
    pub fn response(code: u16, latency_ms: u64) -> Self {
        Self { error: None, response_code: Some(code), latency_ms: Some(latency_ms) }
    }

    /// The request failed before a response arrived.
    pub fn failure(detail: impl Into<String>) -> Self {
        Self { error: Some(detail.into()), response_code: None, latency_ms: None }
    }

    /// The configured timeout elapsed first.
    pub fn timeout() -> Self {
        Self::failure("timeout")
    }
}

/// One line of a check's audit log: the full check snapshot plus what the
/// probe saw. Never mutated after being appended.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub check: Check,
    pub outcome: Outcome,
    pub state: CheckState,
    pub alert: bool,
    pub time: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_serializes_lowercase() {
        assert_eq!(serde_json::to_value(CheckState::Up).unwrap(), "up");
        assert_eq!(serde_json::to_value(CheckState::Down).unwrap(), "down");
        assert_eq!(CheckState::default(), CheckState::Down);
    }

    #[test]
    fn outcome_omits_absent_fields() {
        let value = serde_json::to_value(Outcome::timeout()).unwrap();
        assert_eq!(value, serde_json::json!({ "error": "timeout" }));

        let value = serde_json::to_value(Outcome::response(200, 12)).unwrap();
        assert_eq!(value, serde_json::json!({ "responseCode": 200, "latencyMs": 12 }));
    }
}
