use std::sync::Arc;

use serde_json::{Value, json};
use tracing::warn;

use crate::auth::TokenAuthority;
use crate::monitoring::validation::{PHONE_LEN, str_field};
use crate::store::records::User;
use crate::store::{CHECKS, RecordStore, USERS};

use super::{ApiError, ApiResult, missing_fields};

const MIN_PASSWORD_LEN: usize = 8;

/// User operations. Everything except registration is gated on a valid
/// token for the phone being operated on.
pub struct UserHandlers {
    store: Arc<dyn RecordStore>,
    auth: Arc<TokenAuthority>,
}

impl UserHandlers {
    pub fn new(store: Arc<dyn RecordStore>, auth: Arc<TokenAuthority>) -> Self {
        Self { store, auth }
    }

    async fn gate(&self, token_id: Option<&str>, phone: &str) -> ApiResult<()> {
        let token_id = token_id.ok_or_else(ApiError::forbidden)?;
        if self.auth.validate(token_id, phone).await {
            Ok(())
        } else {
            Err(ApiError::forbidden())
        }
    }

    /// Register a new user. Required: firstName, lastName, phone (11
    /// chars), password (8+ chars), tosAgreement set to true.
    pub async fn create(&self, payload: &Value) -> ApiResult<Value> {
        let first_name = str_field(payload, "firstName").ok_or_else(missing_fields)?;
        let last_name = str_field(payload, "lastName").ok_or_else(missing_fields)?;
        let phone = str_field(payload, "phone")
            .filter(|phone| phone.len() == PHONE_LEN)
            .ok_or_else(missing_fields)?;
        let password = payload
            .get("password")
            .and_then(Value::as_str)
            .filter(|password| password.len() >= MIN_PASSWORD_LEN)
            .ok_or_else(missing_fields)?;
        if payload.get("tosAgreement").and_then(Value::as_bool) != Some(true) {
            return Err(missing_fields());
        }

        let user = User {
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
            phone: phone.to_string(),
            hashed_password: self.auth.hash_password(password),
            tos_agreement: true,
            checks: Vec::new(),
        };
        let record = serde_json::to_value(&user).map_err(|_| ApiError::internal())?;

        match self.store.create(USERS, phone, record).await {
            Ok(()) => Ok(sanitize(serde_json::to_value(&user).map_err(|_| ApiError::internal())?)),
            Err(crate::error::Error::Conflict) => {
                Err(ApiError::bad_request("A user with that phone number already exists"))
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Fetch a user record, with the password hash stripped.
    pub async fn get(&self, phone: &str, token_id: Option<&str>) -> ApiResult<Value> {
        self.gate(token_id, phone).await?;
        Ok(sanitize(self.store.read(USERS, phone).await?))
    }

    /// Update firstName, lastName and/or password. At least one required.
    pub async fn update(
        &self,
        phone: &str,
        token_id: Option<&str>,
        payload: &Value,
    ) -> ApiResult<Value> {
        self.gate(token_id, phone).await?;

        let mut patch = serde_json::Map::new();
        if let Some(first_name) = str_field(payload, "firstName") {
            patch.insert("firstName".into(), json!(first_name));
        }
        if let Some(last_name) = str_field(payload, "lastName") {
            patch.insert("lastName".into(), json!(last_name));
        }
        if let Some(password) = payload
            .get("password")
            .and_then(Value::as_str)
            .filter(|password| password.len() >= MIN_PASSWORD_LEN)
        {
            patch.insert("hashedPassword".into(), json!(self.auth.hash_password(password)));
        }
        if patch.is_empty() {
            return Err(ApiError::bad_request("Missing field(s) to update!"));
        }

        self.store.update(USERS, phone, Value::Object(patch)).await?;
        Ok(json!({}))
    }

    /// Delete a user and cascade to every check they own.
    pub async fn delete(&self, phone: &str, token_id: Option<&str>) -> ApiResult<Value> {
        self.gate(token_id, phone).await?;

        let user: User = serde_json::from_value(self.store.read(USERS, phone).await?)
            .map_err(|_| ApiError::internal())?;
        self.store.delete(USERS, phone).await?;

        for check_id in &user.checks {
            if let Err(err) = self.store.delete(CHECKS, check_id).await {
                warn!(check = %check_id, "failed to delete check of removed user: {err}");
            }
        }
        Ok(json!({}))
    }
}

/// The stored hash must never travel back to API callers.
fn sanitize(mut record: Value) -> Value {
    if let Some(fields) = record.as_object_mut() {
        fields.remove("hashedPassword");
    }
    record
}
