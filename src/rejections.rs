use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

use crate::envelope::Envelope;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Missing fields: {}", .0.join(", "))]
    MissingFields(Vec<&'static str>),
    #[error("{0}")]
    Input(&'static str),
    #[error("{0}")]
    Invalid(String),
    #[error("Unauthorized")]
    Unauthorized,
    #[error("{0}")]
    Forbidden(&'static str),
    #[error("{0}")]
    NotFound(&'static str),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    PayloadTooLarge(&'static str),
    #[error("{0}")]
    UnsupportedMediaType(&'static str),
    #[error("{0}")]
    Internal(&'static str),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::MissingFields(_) | AppError::Input(_) | AppError::Invalid(_) => {
                StatusCode::BAD_REQUEST
            }
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::UnsupportedMediaType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(serde::Serialize)]
struct ErrorBody {
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("request failed: {self}");
        } else {
            tracing::debug!("request rejected ({status}): {self}");
        }

        let body = Envelope {
            body: ErrorBody {
                message: self.to_string(),
            },
            status_code: status.as_u16(),
        };
        (status, Json(body)).into_response()
    }
}

/// Maps internal errors onto request rejections, logging the cause.
pub trait ResultExt<T> {
    fn reject(self, message: &'static str) -> Result<T, AppError>;
}

impl<T, E: std::fmt::Display> ResultExt<T> for Result<T, E> {
    fn reject(self, message: &'static str) -> Result<T, AppError> {
        self.map_err(|e| {
            tracing::error!("{message}: {e}");
            AppError::Internal(message)
        })
    }
}

/// Collects the names of required request fields that are absent or blank,
/// so they can be reported together in one 400.
#[derive(Default)]
pub struct Required {
    missing: Vec<&'static str>,
}

impl Required {
    pub fn new() -> Self {
        Self::default()
    }

    /// Trimmed text; blank counts as missing.
    pub fn text(&mut self, name: &'static str, value: Option<String>) -> String {
        match value.map(|v| v.trim().to_string()) {
            Some(v) if !v.is_empty() => v,
            _ => {
                self.missing.push(name);
                String::new()
            }
        }
    }

    pub fn id(&mut self, name: &'static str, value: Option<i64>) -> i64 {
        value.unwrap_or_else(|| {
            self.missing.push(name);
            0
        })
    }

    pub fn value<T: Default>(&mut self, name: &'static str, value: Option<T>) -> T {
        value.unwrap_or_else(|| {
            self.missing.push(name);
            T::default()
        })
    }

    pub fn check(self) -> Result<(), AppError> {
        if self.missing.is_empty() {
            Ok(())
        } else {
            Err(AppError::MissingFields(self.missing))
        }
    }
}
