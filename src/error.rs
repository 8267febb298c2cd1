//! Errores de la API HTTP. Siempre se responden como `{"error": "..."}`.

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::{
    accounts::{AccountError, AuthError},
    contact::FieldErrors,
    view::ViewError,
};

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Unauthorized")]
    Unauthorized,
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    AuthFailed(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    Unprocessable(String),
    #[error("Validation failed")]
    Validation(FieldErrors),
    /// `public` es lo único que ve el cliente; la causa solo va al log.
    #[error("{public}")]
    Internal {
        public: &'static str,
        cause: anyhow::Error,
    },
}

impl AppError {
    pub fn internal(public: &'static str, cause: impl Into<anyhow::Error>) -> Self {
        Self::Internal {
            public,
            cause: cause.into(),
        }
    }

    /// Cuerpo JSON que no se pudo leer. Un tipo de dato incorrecto o la falta
    /// de `Content-Type` son 400; un cuerpo ilegible se responde con `public`.
    pub fn from_json_rejection(rejection: JsonRejection, public: &'static str) -> Self {
        match rejection {
            JsonRejection::JsonDataError(_) | JsonRejection::MissingJsonContentType(_) => {
                AppError::BadRequest(rejection.body_text())
            }
            other => AppError::internal(public, anyhow::anyhow!(other.body_text())),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Unauthorized | AppError::AuthFailed(_) => StatusCode::UNAUTHORIZED,
            AppError::BadRequest(_) | AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Unprocessable(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = match &self {
            AppError::Validation(details) => json!({
                "error": self.to_string(),
                "details": details,
            }),
            AppError::Internal { public, cause } => {
                error!("{public}: {cause:#}");
                json!({ "error": public })
            }
            other => json!({ "error": other.to_string() }),
        };
        (status, Json(body)).into_response()
    }
}

impl From<AccountError> for AppError {
    fn from(err: AccountError) -> Self {
        match err {
            AccountError::MissingCredentials | AccountError::InvalidDateOfBirth => {
                AppError::BadRequest(err.to_string())
            }
            AccountError::AlreadyExists => AppError::Conflict(err.to_string()),
            AccountError::Internal(cause) => AppError::internal("Server error.", cause),
        }
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::MissingFields => AppError::BadRequest(err.to_string()),
            AuthError::Inactive => AppError::Forbidden(err.to_string()),
            AuthError::UnknownEmail | AuthError::NoPassword | AuthError::InvalidPassword => {
                AppError::AuthFailed(err.to_string())
            }
            AuthError::Internal(cause) => AppError::internal("Internal server error", cause),
        }
    }
}

impl From<ViewError> for AppError {
    fn from(err: ViewError) -> Self {
        AppError::Unprocessable(err.to_string())
    }
}
