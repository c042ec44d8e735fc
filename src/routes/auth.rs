//! Auth routes: sign-up, sign-in, session management, WS tickets.

use axum::extract::{FromRef, FromRequestParts, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Json};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::{Deserialize, Serialize};
use time::Duration;

use super::error::ApiError;
use super::publish;
use crate::model::{Profile, UserRole};
use crate::services::auth::{self as auth_svc, AuthError, SignUp, SignUpOrigin};
use crate::services::realtime::{ChangeOp, Table};
use crate::services::session::{self, SessionUser};
use crate::state::AppState;

pub(crate) const COOKIE_NAME: &str = "session_token";

fn session_cookie(token: String, secure: bool, ttl_hours: i64) -> Cookie<'static> {
    Cookie::build((COOKIE_NAME, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .max_age(Duration::hours(ttl_hours))
        .build()
}

fn cleared_cookie(secure: bool) -> Cookie<'static> {
    Cookie::build((COOKIE_NAME, ""))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .max_age(Duration::ZERO)
        .build()
}

/// Session token from the cookie, else from `Authorization: Bearer`.
fn token_from_parts(parts: &axum::http::request::Parts) -> Option<String> {
    let jar = CookieJar::from_headers(&parts.headers);
    if let Some(cookie) = jar.get(COOKIE_NAME).filter(|c| !c.value().is_empty()) {
        return Some(cookie.value().to_owned());
    }
    parts
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_owned)
}

// =============================================================================
// AUTH EXTRACTORS
// =============================================================================

/// Authenticated account extracted from the session cookie or bearer token.
/// Use as a handler parameter to require authentication.
pub struct AuthUser {
    pub user: SessionUser,
    pub token: String,
}

impl<S> FromRequestParts<S> for AuthUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut axum::http::request::Parts, state: &S) -> Result<Self, Self::Rejection> {
        let token = token_from_parts(parts).ok_or_else(ApiError::unauthorized)?;
        let app_state = AppState::from_ref(state);
        let user = session::validate_session(&app_state.pool, &token)
            .await?
            .ok_or_else(ApiError::unauthorized)?;
        Ok(Self { user, token })
    }
}

/// Authenticated account with an active profile.
pub struct Caller {
    pub user: SessionUser,
    pub profile: Profile,
}

impl Caller {
    #[must_use]
    pub fn id(&self) -> uuid::Uuid {
        self.profile.id
    }

    #[must_use]
    pub fn role(&self) -> UserRole {
        self.profile.role
    }

    pub fn require(&self, role: UserRole) -> Result<(), ApiError> {
        if self.profile.role == role {
            Ok(())
        } else {
            Err(ApiError::forbidden())
        }
    }

    pub fn require_any(&self, roles: &[UserRole]) -> Result<(), ApiError> {
        if roles.contains(&self.profile.role) {
            Ok(())
        } else {
            Err(ApiError::forbidden())
        }
    }
}

impl<S> FromRequestParts<S> for Caller
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut axum::http::request::Parts, state: &S) -> Result<Self, Self::Rejection> {
        let AuthUser { user, .. } = AuthUser::from_request_parts(parts, state).await?;
        let app_state = AppState::from_ref(state);
        let profile = auth_svc::ensure_profile(&app_state.pool, &user).await?;
        if !profile.is_active {
            return Err(AuthError::AccountDisabled.into());
        }
        Ok(Self { user, profile })
    }
}

// =============================================================================
// HANDLERS
// =============================================================================

/// `POST /api/auth/sign-up`: public self-service account creation.
pub async fn sign_up(State(state): State<AppState>, Json(input): Json<SignUp>) -> Result<impl IntoResponse, ApiError> {
    let profile = auth_svc::sign_up(&state.pool, &input, SignUpOrigin::Public).await?;
    publish(&state, Table::Profiles, ChangeOp::Insert, profile.id, &profile);
    Ok((StatusCode::CREATED, Json(profile)))
}

#[derive(Debug, Deserialize)]
pub struct SignInBody {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct SessionBody {
    pub user: SessionUser,
    pub profile: Option<Profile>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

/// `POST /api/auth/sign-in`: verify credentials, set the session cookie.
pub async fn sign_in(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(body): Json<SignInBody>,
) -> Result<impl IntoResponse, ApiError> {
    let ttl = state.config.session_ttl_hours;
    let signed_in = auth_svc::sign_in(&state.pool, &body.email, &body.password, ttl).await?;
    let jar = jar.add(session_cookie(signed_in.token.clone(), state.config.cookie_secure, ttl));
    let body = SessionBody { user: signed_in.user, profile: signed_in.profile, token: Some(signed_in.token) };
    Ok((jar, Json(body)))
}

/// `POST /api/auth/sign-out`: delete session, clear cookie.
pub async fn sign_out(State(state): State<AppState>, auth: AuthUser) -> impl IntoResponse {
    if let Err(e) = session::delete_session(&state.pool, &auth.token).await {
        tracing::warn!(error = %e, account_id = %auth.user.id, "session delete failed");
    }
    let jar = CookieJar::new().add(cleared_cookie(state.config.cookie_secure));
    (jar, StatusCode::NO_CONTENT)
}

/// `GET /api/auth/me`: current account and its profile, created on first use.
pub async fn me(State(state): State<AppState>, auth: AuthUser) -> Json<SessionBody> {
    let profile = match auth_svc::ensure_profile(&state.pool, &auth.user).await {
        Ok(profile) => Some(profile),
        Err(e) => {
            tracing::error!(error = %e, account_id = %auth.user.id, "profile fetch or create failed");
            None
        }
    };
    Json(SessionBody { user: auth.user, profile, token: None })
}

/// `POST /api/auth/ws-ticket`: create a one-time WS ticket.
pub async fn ws_ticket(State(state): State<AppState>, auth: AuthUser) -> Result<Json<serde_json::Value>, ApiError> {
    let ticket = session::create_ws_ticket(&state.pool, auth.user.id).await?;
    Ok(Json(serde_json::json!({ "ticket": ticket })))
}

#[cfg(test)]
#[path = "auth_test.rs"]
mod tests;
