// SPDX-License-Identifier: EUPL-1.2

//! Error types for the client certificate registry.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::coordinator::Domain;

/// Errors surfaced by stores, workflows and handlers.
#[derive(Debug, thiserror::Error)]
pub enum CscError {
    /// Another workflow holds the domain lock. Nothing was touched.
    #[error("Concurrent access prevented on {0}! Try again in a minute.")]
    Busy(Domain),

    #[error("Transport failure: {0}")]
    Transport(String),

    /// The commit exists locally but never reached the remote.
    #[error("Push failed, commit {commit} was not published: {reason}")]
    PushFailed { commit: String, reason: String },

    #[error("{description} failed! Return-Code was: {code}")]
    Process { description: String, code: String },

    #[error("Unexpected output from {0}")]
    UnexpectedOutput(String),

    #[error("Inconsistent data: {0}")]
    Inconsistent(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Duplicate entry: {0}")]
    Duplicate(String),

    #[error("Missing caller identity")]
    Unauthenticated,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl CscError {
    /// Infrastructure failures leave the workspace undefined; the next
    /// reset discards it.
    pub fn is_infrastructure(&self) -> bool {
        matches!(
            self,
            CscError::Transport(_)
                | CscError::PushFailed { .. }
                | CscError::Process { .. }
                | CscError::UnexpectedOutput(_)
                | CscError::Io(_)
                | CscError::Internal(_)
        )
    }
}

impl IntoResponse for CscError {
    fn into_response(self) -> Response {
        let status = match &self {
            CscError::Busy(_) => StatusCode::LOCKED,
            CscError::Inconsistent(_) => StatusCode::CONFLICT,
            CscError::NotFound(_) => StatusCode::NOT_FOUND,
            CscError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            CscError::Duplicate(_) => StatusCode::CONFLICT,
            CscError::Unauthenticated => StatusCode::UNAUTHORIZED,
            CscError::Transport(_) | CscError::PushFailed { .. } => StatusCode::BAD_GATEWAY,
            CscError::Process { .. }
            | CscError::UnexpectedOutput(_)
            | CscError::Io(_)
            | CscError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
