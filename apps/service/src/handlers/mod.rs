//! Operations exposed to the HTTP layer (which lives outside this service).
//!
//! Each operation returns a structured success payload or an [`ApiError`]
//! carrying an HTTP-style status code and a client-safe message. Internal
//! failure detail never leaks past a 500.

pub mod checks;
pub mod tokens;
pub mod users;

use serde_json::{Value, json};

use crate::error::Error;

pub use checks::CheckHandlers;
pub use tokens::TokenHandlers;
pub use users::UserHandlers;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    pub status: u16,
    pub message: String,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self { status: 400, message: message.into() }
    }

    pub fn forbidden() -> Self {
        Self {
            status: 403,
            message: "Missing required token in header, or token is invalid".into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self { status: 404, message: message.into() }
    }

    pub fn internal() -> Self {
        Self { status: 500, message: "Something went wrong".into() }
    }

    /// JSON body in the `{"Error": …}` shape the API contract promises.
    pub fn body(&self) -> Value {
        json!({ "Error": self.message })
    }
}

/// Default mapping onto the status contract. Operations that can say
/// something more specific match on the error themselves first.
impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        match err {
            Error::NotFound => ApiError::not_found("Not Found"),
            Error::Conflict => ApiError::bad_request("A record with that id already exists"),
            Error::InvalidCredential => {
                ApiError::bad_request("Password did not match the specified user's stored password")
            }
            Error::Expired => {
                ApiError::bad_request("The token has expired, and cannot be extended")
            }
            _ => ApiError::internal(),
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

pub(crate) fn missing_fields() -> ApiError {
    ApiError::bad_request("Missing required field(s)!")
}
