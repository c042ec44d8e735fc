//! HTTP error mapping.
//!
//! DESIGN
//! ======
//! Handlers return `Result<_, ApiError>` and use `?` on service errors. An
//! `ApiError` carries status, grepable code and a message key, never the
//! underlying error text; backend failures are logged where they are
//! converted. The response is first rendered in the default locale and the
//! error is stashed in the response extensions, so [`localize_errors`] can
//! re-render it for the caller's `Accept-Language`.

use axum::extract::{Request, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Json, Response};
use serde_json::json;

use crate::frame::ErrorCode;
use crate::locale::{Locale, Message};
use crate::services::auth::AuthError;
use crate::services::error::{Conflict, ServiceError, ValidationError};
use crate::state::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: Message,
}

impl ApiError {
    #[must_use]
    pub fn new(status: StatusCode, code: &'static str, message: Message) -> Self {
        Self { status, code, message }
    }

    #[must_use]
    pub fn unauthorized() -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "E_UNAUTHORIZED", Message::Unauthorized)
    }

    #[must_use]
    pub fn forbidden() -> Self {
        Self::new(StatusCode::FORBIDDEN, "E_FORBIDDEN", Message::Forbidden)
    }

    #[must_use]
    pub fn bad_request(message: Message) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "E_VALIDATION", message)
    }

    #[must_use]
    pub fn render(self, locale: Locale) -> Response {
        let body = json!({ "code": self.code, "message": locale.text(self.message) });
        let mut response = (self.status, Json(body)).into_response();
        response.extensions_mut().insert(self);
        response
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        self.render(Locale::default())
    }
}

fn validation_message(err: &ValidationError) -> Message {
    match err {
        ValidationError::Required(_) | ValidationError::UnknownReference(_) => Message::RequiredFields,
        ValidationError::OutOfRange { .. } | ValidationError::Negative(_) => Message::OutOfRange,
        ValidationError::RejectionNotesRequired => Message::RejectionNotesRequired,
        ValidationError::PhotoRequired => Message::PhotoRequired,
        ValidationError::InvalidEmail => Message::InvalidEmail,
        ValidationError::PasswordTooShort => Message::PasswordTooShort,
        ValidationError::Upload(_) => Message::UploadRejected,
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        let code = err.error_code();
        match &err {
            ServiceError::NotFound { .. } => Self::new(StatusCode::NOT_FOUND, code, Message::NotFound),
            ServiceError::Forbidden(reason) => {
                tracing::debug!(reason, "request forbidden");
                Self::new(StatusCode::FORBIDDEN, code, Message::Forbidden)
            }
            ServiceError::Validation(v) => {
                let status = match v {
                    ValidationError::Upload(_) => StatusCode::UNPROCESSABLE_ENTITY,
                    _ => StatusCode::BAD_REQUEST,
                };
                Self::new(status, code, validation_message(v))
            }
            ServiceError::Conflict(c) => {
                let message = match c {
                    Conflict::AlreadyCheckedIn => Message::AlreadyCheckedIn,
                    Conflict::NoActiveCheckIn => Message::NoActiveCheckIn,
                    Conflict::AlreadyResolved | Conflict::StatusChanged => Message::Conflict,
                };
                Self::new(StatusCode::CONFLICT, code, message)
            }
            ServiceError::InvalidTransition { .. } => Self::new(StatusCode::CONFLICT, code, Message::InvalidTransition),
            ServiceError::Storage(e) => {
                tracing::error!(error = %e, "photo storage failed");
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, code, Message::UploadRejected)
            }
            ServiceError::Database(e) => {
                tracing::error!(error = %e, "database query failed");
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, code, Message::Internal)
            }
        }
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        ServiceError::from(err).into()
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        ServiceError::from(err).into()
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        let code = err.error_code();
        let (status, message) = match &err {
            AuthError::InvalidCredentials => (StatusCode::UNAUTHORIZED, Message::InvalidCredentials),
            AuthError::AccountDisabled => (StatusCode::FORBIDDEN, Message::AccountDisabled),
            AuthError::InvalidEmail => (StatusCode::BAD_REQUEST, Message::InvalidEmail),
            AuthError::PasswordTooShort => (StatusCode::BAD_REQUEST, Message::PasswordTooShort),
            AuthError::NameRequired => (StatusCode::BAD_REQUEST, Message::RequiredFields),
            AuthError::EmailTaken => (StatusCode::CONFLICT, Message::EmailTaken),
            AuthError::RoleNotAllowed(_) => (StatusCode::FORBIDDEN, Message::Forbidden),
            AuthError::Hash(_) | AuthError::Db(_) => {
                tracing::error!(error = %err, "auth backend failed");
                (StatusCode::INTERNAL_SERVER_ERROR, Message::Internal)
            }
        };
        Self::new(status, code, message)
    }
}

// =============================================================================
// LOCALIZATION
// =============================================================================

/// Caller's locale from `Accept-Language`, else `fallback`.
#[must_use]
pub fn request_locale(headers: &HeaderMap, fallback: Locale) -> Locale {
    headers
        .get(header::ACCEPT_LANGUAGE)
        .and_then(|v| v.to_str().ok())
        .and_then(Locale::from_accept_language)
        .unwrap_or(fallback)
}

/// Re-render error bodies in the caller's locale.
pub async fn localize_errors(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let locale = request_locale(req.headers(), state.config.default_locale);
    let response = next.run(req).await;
    match response.extensions().get::<ApiError>().copied() {
        Some(err) if locale != Locale::default() => err.render(locale),
        _ => response,
    }
}

#[cfg(test)]
#[path = "error_test.rs"]
mod tests;
