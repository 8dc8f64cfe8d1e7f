use std::sync::Arc;

use serde_json::{Value, json};

use crate::auth::TokenAuthority;
use crate::error::Error;
use crate::monitoring::types::CheckState;
use crate::monitoring::validation::{
    CHECK_ID_LEN, enum_field, str_field, success_codes_field, timeout_field,
};
use crate::store::records::{Check, HttpMethod, Protocol, Token, User, random_id};
use crate::store::{CHECKS, RecordStore, TOKENS, USERS};

use super::{ApiError, ApiResult, missing_fields};

/// Check CRUD, keyed by bearer-token ownership.
pub struct CheckHandlers {
    store: Arc<dyn RecordStore>,
    auth: Arc<TokenAuthority>,
    max_checks: usize,
}

impl CheckHandlers {
    pub fn new(store: Arc<dyn RecordStore>, auth: Arc<TokenAuthority>, max_checks: usize) -> Self {
        Self { store, auth, max_checks }
    }

    /// Resolve a token header to its owning phone, enforcing validity.
    async fn owner_of_token(&self, token_id: Option<&str>) -> ApiResult<String> {
        let token_id = token_id.ok_or_else(ApiError::forbidden)?;
        let token: Token = self
            .store
            .read(TOKENS, token_id)
            .await
            .ok()
            .and_then(|raw| serde_json::from_value(raw).ok())
            .ok_or_else(ApiError::forbidden)?;
        if !self.auth.validate(token_id, &token.phone).await {
            return Err(ApiError::forbidden());
        }
        Ok(token.phone)
    }

    async fn owned_check(&self, id: &str, token_id: Option<&str>) -> ApiResult<Check> {
        if id.len() != CHECK_ID_LEN {
            return Err(ApiError::bad_request("Missing required field"));
        }
        let check: Check = serde_json::from_value(self.store.read(CHECKS, id).await?)
            .map_err(|_| ApiError::internal())?;

        let token_id = token_id.ok_or_else(ApiError::forbidden)?;
        if !self.auth.validate(token_id, &check.phone).await {
            return Err(ApiError::forbidden());
        }
        Ok(check)
    }

    /// Register a new check for the token's owner, capped at max_checks.
    pub async fn create(&self, token_id: Option<&str>, payload: &Value) -> ApiResult<Value> {
        let protocol: Protocol = enum_field(payload, "protocol").ok_or_else(missing_fields)?;
        let url = str_field(payload, "url").ok_or_else(missing_fields)?;
        let method: HttpMethod = enum_field(payload, "method").ok_or_else(missing_fields)?;
        let success_codes = success_codes_field(payload).ok_or_else(missing_fields)?;
        let timeout_seconds = timeout_field(payload).ok_or_else(missing_fields)?;

        let phone = self.owner_of_token(token_id).await?;
        let mut user: User = serde_json::from_value(self.store.read(USERS, &phone).await?)
            .map_err(|_| ApiError::internal())?;

        if user.checks.len() >= self.max_checks {
            return Err(ApiError::bad_request(format!(
                "The user already has the maximum number of checks ({})",
                self.max_checks
            )));
        }

        let check = Check {
            id: random_id(CHECK_ID_LEN),
            phone,
            protocol,
            url: url.to_string(),
            method,
            success_codes,
            timeout_seconds,
            state: CheckState::Down,
            last_checked: 0,
        };
        let record = serde_json::to_value(&check).map_err(|_| ApiError::internal())?;
        self.store.create(CHECKS, &check.id, record.clone()).await?;

        user.checks.push(check.id.clone());
        self.store
            .update(USERS, &check.phone, json!({ "checks": user.checks }))
            .await?;

        Ok(record)
    }

    /// Fetch a check the token owner is allowed to see.
    pub async fn get(&self, id: &str, token_id: Option<&str>) -> ApiResult<Value> {
        let check = self.owned_check(id, token_id).await?;
        serde_json::to_value(&check).map_err(|_| ApiError::internal())
    }

    /// Update targeting fields of an owned check. At least one required.
    pub async fn update(
        &self,
        id: &str,
        token_id: Option<&str>,
        payload: &Value,
    ) -> ApiResult<Value> {
        self.owned_check(id, token_id).await?;

        let mut patch = serde_json::Map::new();
        if let Some(protocol) = enum_field::<Protocol>(payload, "protocol") {
            patch.insert("protocol".into(), json!(protocol));
        }
        if let Some(url) = str_field(payload, "url") {
            patch.insert("url".into(), json!(url));
        }
        if let Some(method) = enum_field::<HttpMethod>(payload, "method") {
            patch.insert("method".into(), json!(method));
        }
        if let Some(success_codes) = success_codes_field(payload) {
            patch.insert("successCodes".into(), json!(success_codes));
        }
        if let Some(timeout_seconds) = timeout_field(payload) {
            patch.insert("timeoutSeconds".into(), json!(timeout_seconds));
        }
        if patch.is_empty() {
            return Err(ApiError::bad_request("Missing field(s) to update!"));
        }

        self.store.update(CHECKS, id, Value::Object(patch)).await?;
        Ok(json!({}))
    }

    /// Delete an owned check and unlink it from the user's list.
    pub async fn delete(&self, id: &str, token_id: Option<&str>) -> ApiResult<Value> {
        let check = self.owned_check(id, token_id).await?;

        self.store.delete(CHECKS, id).await?;

        match self.store.read(USERS, &check.phone).await {
            Ok(raw) => {
                let mut user: User =
                    serde_json::from_value(raw).map_err(|_| ApiError::internal())?;
                user.checks.retain(|check_id| check_id != id);
                self.store
                    .update(USERS, &check.phone, json!({ "checks": user.checks }))
                    .await?;
                Ok(json!({}))
            }
            Err(Error::NotFound) => Err(ApiError::internal()),
            Err(err) => Err(err.into()),
        }
    }
}
