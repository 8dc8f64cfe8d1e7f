use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::monitoring::types::CheckState;

/// A registered account. The phone number doubles as the record id.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    pub hashed_password: String,
    pub tos_agreement: bool,
    /// Ids of the checks this user owns.
    #[serde(default)]
    pub checks: Vec<String>,
}

/// Short-lived bearer credential tied to a user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Token {
    pub id: String,
    pub phone: String,
    /// Expiry as epoch milliseconds.
    pub expires: i64,
}

/// A user-configured probe target.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Check {
    pub id: String,
    pub phone: String,
    pub protocol: Protocol,
    pub url: String,
    pub method: HttpMethod,
    pub success_codes: Vec<u16>,
    pub timeout_seconds: u64,
    #[serde(default)]
    pub state: CheckState,
    /// Epoch ms of the last completed probe; 0 means never probed.
    #[serde(default)]
    pub last_checked: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Http,
    Https,
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::Http => write!(f, "http"),
            Protocol::Https => write!(f, "https"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "get",
            HttpMethod::Post => "post",
            HttpMethod::Put => "put",
            HttpMethod::Delete => "delete",
        }
    }

    pub fn as_reqwest(&self) -> reqwest::Method {
        match self {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Delete => reqwest::Method::DELETE,
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Current time as epoch milliseconds.
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Random lowercase-alphanumeric identifier, used for token and check ids.
pub fn random_id(len: usize) -> String {
    const ALPHANUMERIC: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| ALPHANUMERIC[rng.gen_range(0..ALPHANUMERIC.len())] as char)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_serializes_with_camel_case_fields() {
        let check = Check {
            id: "a".repeat(20),
            phone: "01234567890".into(),
            protocol: Protocol::Http,
            url: "example.com".into(),
            method: HttpMethod::Get,
            success_codes: vec![200],
            timeout_seconds: 3,
            state: CheckState::Down,
            last_checked: 0,
        };

        let value = serde_json::to_value(&check).unwrap();
        assert_eq!(value["successCodes"], serde_json::json!([200]));
        assert_eq!(value["timeoutSeconds"], 3);
        assert_eq!(value["lastChecked"], 0);
        assert_eq!(value["state"], "down");
        assert_eq!(value["method"], "get");
    }

    #[test]
    fn check_deserializes_missing_state_to_down() {
        let raw = serde_json::json!({
            "id": "b".repeat(20),
            "phone": "01234567890",
            "protocol": "https",
            "url": "example.com",
            "method": "put",
            "successCodes": [200, 201],
            "timeoutSeconds": 5,
        });

        let check: Check = serde_json::from_value(raw).unwrap();
        assert_eq!(check.state, CheckState::Down);
        assert_eq!(check.last_checked, 0);
    }

    #[test]
    fn random_ids_have_requested_length_and_alphabet() {
        let id = random_id(20);
        assert_eq!(id.len(), 20);
        assert!(id.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
        // Two mints colliding would mean a broken generator.
        assert_ne!(random_id(20), random_id(20));
    }
}
