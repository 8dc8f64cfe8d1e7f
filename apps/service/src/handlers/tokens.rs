use std::sync::Arc;

use serde_json::{Value, json};

use crate::auth::{TOKEN_ID_LEN, TokenAuthority};
use crate::error::Error;
use crate::monitoring::validation::{PHONE_LEN, str_field};
use crate::store::{RecordStore, TOKENS};

use super::{ApiError, ApiResult, missing_fields};

/// Token operations: issue on login, inspect, extend, revoke.
pub struct TokenHandlers {
    store: Arc<dyn RecordStore>,
    auth: Arc<TokenAuthority>,
}

impl TokenHandlers {
    pub fn new(store: Arc<dyn RecordStore>, auth: Arc<TokenAuthority>) -> Self {
        Self { store, auth }
    }

    /// Issue a token for a phone + password pair.
    pub async fn create(&self, payload: &Value) -> ApiResult<Value> {
        let phone = str_field(payload, "phone")
            .filter(|phone| phone.len() == PHONE_LEN)
            .ok_or_else(missing_fields)?;
        let password =
            payload.get("password").and_then(Value::as_str).ok_or_else(missing_fields)?;

        match self.auth.issue(phone, password).await {
            Ok(token) => serde_json::to_value(&token).map_err(|_| ApiError::internal()),
            Err(Error::NotFound) => {
                Err(ApiError::not_found("No user found with the phone number"))
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Look up a token by id.
    pub async fn get(&self, id: &str) -> ApiResult<Value> {
        if id.len() != TOKEN_ID_LEN {
            return Err(ApiError::bad_request("Missing required field"));
        }
        Ok(self.store.read(TOKENS, id).await?)
    }

    /// Extend a live token by one TTL. Payload must carry `extend: true`.
    pub async fn extend(&self, payload: &Value) -> ApiResult<Value> {
        let id = str_field(payload, "id")
            .filter(|id| id.len() == TOKEN_ID_LEN)
            .ok_or_else(missing_fields)?;
        if payload.get("extend").and_then(Value::as_bool) != Some(true) {
            return Err(missing_fields());
        }

        match self.auth.extend(id).await {
            Ok(()) => Ok(json!({})),
            Err(Error::NotFound) => Err(ApiError::not_found("Specified token does not exist")),
            Err(err) => Err(err.into()),
        }
    }

    /// Revoke a token by id.
    pub async fn revoke(&self, id: &str) -> ApiResult<Value> {
        if id.len() != TOKEN_ID_LEN {
            return Err(ApiError::bad_request("Missing required field"));
        }
        self.auth.revoke(id).await?;
        Ok(json!({}))
    }
}
