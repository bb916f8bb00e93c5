use crate::calendar::MonthContext;
use crate::catalog::ActivityKind;
use axum::{http::StatusCode, Json};
use serde_json::json;
use thiserror::Error;

/// Misuse of the local store; never caused by the network.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("{name} is not a {expected:?} activity")]
    InvalidKind { name: String, expected: ActivityKind },

    #[error("day {day} is outside {month}")]
    DayOutOfRange { day: u32, month: MonthContext },

    #[error("{count} unsynced cell(s) must be synced before switching month")]
    UnsyncedChanges { count: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Server rejected request: {0}")]
    ServerRejected(String),
}

impl SyncError {
    /// Network and server failures leave the store consistent and can be retried.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, SyncError::Store(_))
    }
}

impl From<reqwest::Error> for SyncError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            SyncError::ServerRejected(format!("invalid response body: {err}"))
        } else {
            SyncError::Network(err.to_string())
        }
    }
}

#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
}

impl AppError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    pub fn internal(err: impl std::error::Error) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: err.to_string(),
        }
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::internal(err)
    }
}

impl axum::response::IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let body = json!({ "success": false, "message": self.message });
        (self.status, Json(body)).into_response()
    }
}
