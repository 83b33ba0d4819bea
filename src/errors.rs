use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::{error::Error as _, fmt};
use thiserror::Error;

type Cause = Box<dyn std::error::Error + Send + Sync>;

/// Every way an ingestion request can fail.
///
/// The `Display` text is the terse message sent to the caller. The
/// underlying cause, when there is one, is only logged.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("{message}")]
    InputValidation {
        message: &'static str,
        #[source]
        source: Option<Cause>,
    },

    #[error("{message}")]
    Unauthorized {
        message: &'static str,
        #[source]
        source: Option<Cause>,
    },

    #[error("{0}")]
    Forbidden(&'static str),

    #[error("{0}")]
    NotFound(&'static str),

    #[error("{message}")]
    Staging {
        message: &'static str,
        #[source]
        source: Cause,
    },

    #[error("{message}")]
    Processing {
        message: &'static str,
        #[source]
        source: Cause,
    },

    #[error("{message}")]
    Storage {
        message: &'static str,
        #[source]
        source: Cause,
    },

    #[error("{message}")]
    Signing {
        message: &'static str,
        #[source]
        source: Cause,
    },

    #[error("{message}")]
    Database {
        message: &'static str,
        #[source]
        source: sqlx::Error,
    },
}

impl PipelineError {
    pub fn invalid(message: &'static str) -> Self {
        Self::InputValidation {
            message,
            source: None,
        }
    }

    pub fn invalid_with(message: &'static str, source: impl Into<Cause>) -> Self {
        Self::InputValidation {
            message,
            source: Some(source.into()),
        }
    }

    pub fn unauthorized(message: &'static str, source: impl Into<Cause>) -> Self {
        Self::Unauthorized {
            message,
            source: Some(source.into()),
        }
    }

    pub fn staging(message: &'static str, source: impl Into<Cause>) -> Self {
        Self::Staging {
            message,
            source: source.into(),
        }
    }

    pub fn processing(message: &'static str, source: impl Into<Cause>) -> Self {
        Self::Processing {
            message,
            source: source.into(),
        }
    }

    pub fn storage(message: &'static str, source: impl Into<Cause>) -> Self {
        Self::Storage {
            message,
            source: source.into(),
        }
    }

    pub fn signing(message: &'static str, source: impl Into<Cause>) -> Self {
        Self::Signing {
            message,
            source: source.into(),
        }
    }

    pub fn database(message: &'static str, source: sqlx::Error) -> Self {
        Self::Database { message, source }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::InputValidation { .. } => StatusCode::BAD_REQUEST,
            Self::Unauthorized { .. } | Self::Forbidden(_) => StatusCode::UNAUTHORIZED,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Staging { .. }
            | Self::Processing { .. }
            | Self::Storage { .. }
            | Self::Signing { .. }
            | Self::Database { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// A lightweight wrapper for general errors that keeps the message local.
#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
}

impl AppError {
    /// Create a new AppError with a specific status and message.
    pub fn new(status: StatusCode, msg: impl Into<String>) -> Self {
        Self {
            status,
            message: msg.into(),
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": self.message,
            "status": self.status.as_u16()
        }));

        (self.status, body).into_response()
    }
}

impl From<PipelineError> for AppError {
    fn from(err: PipelineError) -> Self {
        let status = err.status();
        let cause = err.source().map(ToString::to_string);
        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), cause = ?cause, "{}", err);
        } else {
            tracing::warn!(status = status.as_u16(), cause = ?cause, "{}", err);
        }
        AppError::new(status, err.to_string())
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn taxonomy_maps_to_status_codes() {
        let io_err = || io::Error::other("disk");
        let cases = [
            (PipelineError::invalid("Invalid ID"), StatusCode::BAD_REQUEST),
            (
                PipelineError::unauthorized("Couldn't validate JWT", io_err()),
                StatusCode::UNAUTHORIZED,
            ),
            (
                PipelineError::Forbidden("You do not own this video"),
                StatusCode::UNAUTHORIZED,
            ),
            (PipelineError::NotFound("Video not found"), StatusCode::NOT_FOUND),
            (
                PipelineError::staging("Failed to create temp file", io_err()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                PipelineError::processing("Failed to process video", io_err()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                PipelineError::storage("Failed to upload video", io_err()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                PipelineError::signing("Failed to generate presigned URL", io_err()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, expected) in cases {
            assert_eq!(err.status(), expected, "{err}");
        }
    }

    #[test]
    fn caller_message_omits_the_cause() {
        let err = PipelineError::storage("Failed to upload video", io::Error::other("secret-host"));
        let app: AppError = err.into();
        assert_eq!(app.message, "Failed to upload video");
        assert_eq!(app.status, StatusCode::INTERNAL_SERVER_ERROR);
    }
}
