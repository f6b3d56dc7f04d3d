//! Request-level error type and its HTTP mapping.
//!
//! Validation failures are the caller's fault and are reported with the
//! offending field. Everything else is logged in full and surfaced as a
//! generic 500 so provider details never reach the browser.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::error;

use crate::generation::GenerationError;
use crate::profile::form::ValidationError;
use crate::providers::ProviderError;
use crate::relay::RelayError;

/// Errors a handler can return before a response body starts.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// The submitted profile was rejected.
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// The completion call failed.
    #[error(transparent)]
    Provider(#[from] GenerationError),
    /// The relay itself faulted before a stream was committed.
    ///
    /// Once a stream has started, relay faults are reported in-band as a
    /// `Failed` frame (see [`crate::relay::Relay::drain`]) and never reach
    /// this type.
    #[error(transparent)]
    RelayInternal(#[from] RelayError),
}

impl From<ProviderError> for AppError {
    fn from(err: ProviderError) -> Self {
        Self::Provider(GenerationError::Provider(err))
    }
}

impl AppError {
    /// HTTP status for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Provider(_) | Self::RelayInternal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            Self::Validation(e) => json!({ "error": e.to_string(), "field": e.field() }),
            Self::Provider(_) | Self::RelayInternal(_) => {
                error!(error = %self, "request failed");
                json!({ "error": "internal server error" })
            }
        };
        (status, Json(body)).into_response()
    }
}
