//! Error types for the mailer domain.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use sea_orm::SqlErr;
use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

/// Result type for mailer operations.
pub type MailerResult<T> = Result<T, MailerError>;

/// Errors that can occur in the mailer domain.
#[derive(Debug, Error)]
pub enum MailerError {
    /// A requested record does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Input failed validation.
    #[error("Invalid input: {0}")]
    Validation(String),

    /// Write would break a uniqueness rule (template name, user email, default SMTP profile).
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Template failed to compile or render.
    #[error("Template error: {0}")]
    Template(String),

    /// Message could not be built or the SMTP server rejected it.
    #[error("Transport error: {0}")]
    Transport(String),

    /// Dispatch prerequisites are missing (no default SMTP profile).
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A scheduled send references a template, user or cluster that is gone.
    #[error("Integrity error: {0}")]
    Integrity(String),

    /// Database error.
    #[error("Database error: {0}")]
    Database(String),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl MailerError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        MailerError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    fn status_code(&self) -> StatusCode {
        match self {
            MailerError::NotFound { .. } => StatusCode::NOT_FOUND,
            MailerError::Validation(_) | MailerError::Template(_) => StatusCode::BAD_REQUEST,
            MailerError::Conflict(_) => StatusCode::CONFLICT,
            MailerError::Integrity(_) => StatusCode::UNPROCESSABLE_ENTITY,
            MailerError::Configuration(_) | MailerError::Transport(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            MailerError::Database(_) | MailerError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            MailerError::NotFound { .. } => "NOT_FOUND",
            MailerError::Validation(_) => "VALIDATION_ERROR",
            MailerError::Conflict(_) => "CONFLICT",
            MailerError::Template(_) => "TEMPLATE_ERROR",
            MailerError::Transport(_) => "TRANSPORT_ERROR",
            MailerError::Configuration(_) => "CONFIGURATION_ERROR",
            MailerError::Integrity(_) => "INTEGRITY_ERROR",
            MailerError::Database(_) => "DATABASE_ERROR",
            MailerError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

/// JSON body returned for every failed request.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Machine-readable error kind, e.g. `NOT_FOUND`
    pub error: String,
    /// Human-readable message
    pub message: String,
}

impl IntoResponse for MailerError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        } else {
            tracing::debug!(error = %self, "Request rejected");
        }

        let body = Json(ErrorResponse {
            error: self.kind().to_string(),
            message: self.to_string(),
        });

        (status, body).into_response()
    }
}

impl From<sea_orm::DbErr> for MailerError {
    fn from(err: sea_orm::DbErr) -> Self {
        match err.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(detail)) => MailerError::Conflict(detail),
            Some(SqlErr::ForeignKeyConstraintViolation(detail)) => MailerError::Integrity(detail),
            _ => MailerError::Database(err.to_string()),
        }
    }
}

impl From<handlebars::RenderError> for MailerError {
    fn from(err: handlebars::RenderError) -> Self {
        MailerError::Template(err.to_string())
    }
}

impl From<handlebars::TemplateError> for MailerError {
    fn from(err: handlebars::TemplateError) -> Self {
        MailerError::Template(err.to_string())
    }
}

impl From<lettre::error::Error> for MailerError {
    fn from(err: lettre::error::Error) -> Self {
        MailerError::Transport(format!("Failed to build email message: {}", err))
    }
}

impl From<lettre::address::AddressError> for MailerError {
    fn from(err: lettre::address::AddressError) -> Self {
        MailerError::Transport(format!("Invalid email address: {}", err))
    }
}

impl From<lettre::transport::smtp::Error> for MailerError {
    fn from(err: lettre::transport::smtp::Error) -> Self {
        MailerError::Transport(format!("SMTP send failed: {}", err))
    }
}

impl From<validator::ValidationErrors> for MailerError {
    fn from(err: validator::ValidationErrors) -> Self {
        MailerError::Validation(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            MailerError::not_found("Template", "x").status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            MailerError::Conflict("dup".into()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            MailerError::Configuration("none".into()).status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn test_not_found_message() {
        let err = MailerError::not_found("Scheduled email", "abc");
        assert_eq!(err.to_string(), "Scheduled email not found: abc");
    }

    #[test]
    fn test_db_err_maps_to_database() {
        let err: MailerError = sea_orm::DbErr::Custom("boom".into()).into();
        assert!(matches!(err, MailerError::Database(_)));
    }
}
