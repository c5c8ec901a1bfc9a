use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

use crate::{
    auth::{password::HashError, session::SessionError},
    users::repo::RepoError,
    validation::ValidationErrors,
};

pub const RESP_JSON_DECODE_FAILURE: &str = "json decode failure";
pub const RESP_JSON_ENCODE_FAILURE: &str = "json encode failure";
pub const RESP_DB_DATA_ACCESS_FAILURE: &str = "db data access failure";
pub const RESP_DB_DATA_INSERT_FAILURE: &str = "db data insert failure";
pub const RESP_DB_DATA_UPDATE_FAILURE: &str = "db data update failure";
pub const RESP_DB_DATA_REMOVE_FAILURE: &str = "db data remove failure";
pub const RESP_PASSWORD_HASH_FAILURE: &str = "password hash failure";
pub const RESP_SESSION_STORE_FAILURE: &str = "session store failure";

/// Every failure a handler can answer with. Clients see only the category
/// message; the underlying error goes to the log.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("json decode failure: {0}")]
    Decode(String),
    /// Malformed path parameter, named by the parameter.
    #[error("invalid url param-{0}")]
    InvalidParam(&'static str),
    #[error(transparent)]
    Validation(#[from] ValidationErrors),
    #[error("not found")]
    NotFound,
    #[error("unauthorized: {0}")]
    Unauthorized(&'static str),
    #[error("{message}: {source}")]
    Storage {
        message: &'static str,
        source: RepoError,
    },
    #[error(transparent)]
    Hash(#[from] HashError),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error("json encode failure: {0}")]
    Encode(#[from] serde_json::Error),
}

impl ApiError {
    /// Classifies a repository error; `NotFound` always becomes a 404.
    pub fn storage(message: &'static str) -> impl FnOnce(RepoError) -> Self {
        move |source| match source {
            RepoError::NotFound => Self::NotFound,
            source => Self::Storage { message, source },
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Decode(_) | ApiError::InvalidParam(_) => StatusCode::BAD_REQUEST,
            ApiError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Storage { .. }
            | ApiError::Hash(_)
            | ApiError::Session(_)
            | ApiError::Encode(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Logs the failure under `operation` and hands it back.
    pub fn logged(self, operation: &str) -> Self {
        if self.status().is_server_error() {
            error!(error = %self, "{operation} failed");
        } else {
            warn!(error = %self, "{operation} failed");
        }
        self
    }

    fn public_message(&self) -> String {
        match self {
            ApiError::Decode(_) => RESP_JSON_DECODE_FAILURE.into(),
            ApiError::InvalidParam(param) => format!("invalid url param-{param}"),
            ApiError::Unauthorized(msg) => (*msg).into(),
            ApiError::Storage { message, .. } => (*message).into(),
            ApiError::Hash(_) => RESP_PASSWORD_HASH_FAILURE.into(),
            ApiError::Session(_) => RESP_SESSION_STORE_FAILURE.into(),
            ApiError::Encode(_) => RESP_JSON_ENCODE_FAILURE.into(),
            ApiError::Validation(_) | ApiError::NotFound => String::new(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        match self {
            ApiError::NotFound => status.into_response(),
            ApiError::Validation(v) => (status, Json(json!({ "errors": v.errors }))).into_response(),
            other => (status, Json(json!({ "error": other.public_message() }))).into_response(),
        }
    }
}
