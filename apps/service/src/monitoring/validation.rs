//! Re-validation of stored check records before execution.
//!
//! Records are read from durable storage that may have been written by an
//! older or buggy build, so every field is treated as untrusted input.

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::Error;
use crate::store::records::{Check, HttpMethod, Protocol};

pub const CHECK_ID_LEN: usize = 20;
pub const PHONE_LEN: usize = 11;
pub const MIN_TIMEOUT_SECONDS: u64 = 1;
pub const MAX_TIMEOUT_SECONDS: u64 = 5;

/// Re-derive a check from its stored representation.
///
/// Identity and targeting fields must all be present and well-formed or the
/// record is rejected (callers skip it for the tick, they do not abort).
/// `state` and `lastChecked` are coerced to safe defaults instead.
pub fn validate(raw: &Value) -> Result<Check, Error> {
    let id = str_field(raw, "id")
        .filter(|id| id.len() == CHECK_ID_LEN)
        .ok_or_else(|| invalid("id"))?;
    let phone = str_field(raw, "phone")
        .filter(|phone| phone.len() == PHONE_LEN)
        .ok_or_else(|| invalid("phone"))?;
    let protocol: Protocol = enum_field(raw, "protocol").ok_or_else(|| invalid("protocol"))?;
    let url = str_field(raw, "url").ok_or_else(|| invalid("url"))?;
    let method: HttpMethod = enum_field(raw, "method").ok_or_else(|| invalid("method"))?;
    let success_codes = success_codes_field(raw).ok_or_else(|| invalid("successCodes"))?;
    let timeout_seconds = timeout_field(raw).ok_or_else(|| invalid("timeoutSeconds"))?;

    // Worker-owned fields fall back to defaults rather than rejecting.
    let state = raw
        .get("state")
        .and_then(|value| serde_json::from_value(value.clone()).ok())
        .unwrap_or_default();
    let last_checked = raw.get("lastChecked").and_then(Value::as_i64).unwrap_or(0);

    Ok(Check {
        id: id.to_string(),
        phone: phone.to_string(),
        protocol,
        url: url.to_string(),
        method,
        success_codes,
        timeout_seconds,
        state,
        last_checked,
    })
}

fn invalid(field: &str) -> Error {
    Error::Validation(format!("missing or malformed {field}"))
}

pub(crate) fn str_field<'a>(raw: &'a Value, key: &str) -> Option<&'a str> {
    raw.get(key).and_then(Value::as_str).map(str::trim).filter(|value| !value.is_empty())
}

pub(crate) fn enum_field<T: DeserializeOwned>(raw: &Value, key: &str) -> Option<T> {
    raw.get(key).cloned().and_then(|value| serde_json::from_value(value).ok())
}

/// Non-empty array of status codes, every entry a valid u16.
pub(crate) fn success_codes_field(raw: &Value) -> Option<Vec<u16>> {
    raw.get("successCodes")
        .and_then(Value::as_array)
        .and_then(|codes| {
            codes
                .iter()
                .map(|code| code.as_u64().and_then(|code| u16::try_from(code).ok()))
                .collect::<Option<Vec<u16>>>()
        })
        .filter(|codes| !codes.is_empty())
}

/// Timeout in whole seconds, within the 1..=5 ceiling.
pub(crate) fn timeout_field(raw: &Value) -> Option<u64> {
    raw.get("timeoutSeconds")
        .and_then(Value::as_u64)
        .filter(|timeout| (MIN_TIMEOUT_SECONDS..=MAX_TIMEOUT_SECONDS).contains(timeout))
}
