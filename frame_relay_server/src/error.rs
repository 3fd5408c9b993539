use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use frame_relay::RelayError;
use thiserror::Error;
use tracing::warn;

/// A request-level failure, rendered as a plain-text response.
#[derive(Debug, Error)]
#[error(transparent)]
pub struct ApiError(#[from] RelayError);

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            RelayError::UnknownTransform(_) => StatusCode::NOT_FOUND,
            RelayError::UnsupportedKernel(_) => StatusCode::BAD_REQUEST,
            RelayError::UpstreamConnect { .. } | RelayError::UpstreamStatus { .. } | RelayError::UpstreamRead(_) => {
                StatusCode::BAD_GATEWAY
            }
            RelayError::Decode(_)
            | RelayError::Encode(_)
            | RelayError::Filter(_)
            | RelayError::Worker(_)
            | RelayError::StaticImage { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn inner(&self) -> &RelayError {
        &self.0
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            warn!(%status, error = %self.0, "request failed");
        }
        (status, self.0.to_string()).into_response()
    }
}
