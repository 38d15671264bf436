//! Mapping of gateway failures to HTTP responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use netmon_auth::IdpError;
use netmon_storage::StorageError;

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error(transparent)]
    Identity(#[from] IdpError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl GatewayError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Identity(_) => StatusCode::BAD_GATEWAY,
            Self::Storage(e) if e.is_unavailable() => StatusCode::SERVICE_UNAVAILABLE,
            Self::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn public_message(&self) -> &'static str {
        match self {
            Self::Identity(_) => "The identity provider could not be reached.",
            Self::Storage(e) if e.is_unavailable() => "The device store is unavailable.",
            Self::Storage(_) => "Device records could not be decoded.",
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status();
        tracing::error!(error = %self, status = status.as_u16(), "Request failed");
        (status, self.public_message()).into_response()
    }
}
