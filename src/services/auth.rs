//! Password auth service: sign-up, sign-in, lazy profile creation and demo
//! account seeding.
//!
//! DESIGN
//! ======
//! An account (email + bcrypt hash) and its profile share one id. Sign-up
//! writes both in one transaction; a session created by sign-in refers to the
//! account only, so a profile row can be missing and is created on first
//! `me` call.
//!
//! bcrypt is CPU-bound and runs on the blocking pool.

use sqlx::{PgPool, Row};
use uuid::Uuid;

use super::error::is_unique_violation;
use super::session::{self, SessionUser};
use crate::frame::ErrorCode;
use crate::model::{Profile, UserRole};

pub const MIN_PASSWORD_LEN: usize = 6;

const ACCOUNTS_EMAIL_KEY: &str = "accounts_email_key";

/// Quick-login accounts created when `SEED_DEMO_ACCOUNTS` is on.
pub const DEMO_ACCOUNTS: [(&str, &str, &str, UserRole); 3] = [
    ("admin@alaobra.com", "admin123", "Admin AlaObra", UserRole::Admin),
    ("worker@alaobra.com", "worker123", "Trabajador AlaObra", UserRole::Worker),
    ("client@alaobra.com", "client123", "Cliente AlaObra", UserRole::Client),
];

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("account disabled")]
    AccountDisabled,
    #[error("invalid email")]
    InvalidEmail,
    #[error("password must have at least {MIN_PASSWORD_LEN} characters")]
    PasswordTooShort,
    #[error("full name is required")]
    NameRequired,
    #[error("email already registered")]
    EmailTaken,
    #[error("role {0} cannot be chosen at sign-up")]
    RoleNotAllowed(UserRole),
    #[error("password hashing failed: {0}")]
    Hash(String),
    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),
}

impl ErrorCode for AuthError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidCredentials => "E_INVALID_CREDENTIALS",
            Self::AccountDisabled => "E_ACCOUNT_DISABLED",
            Self::InvalidEmail => "E_INVALID_EMAIL",
            Self::PasswordTooShort => "E_PASSWORD_TOO_SHORT",
            Self::NameRequired => "E_VALIDATION",
            Self::EmailTaken => "E_EMAIL_TAKEN",
            Self::RoleNotAllowed(_) => "E_FORBIDDEN",
            Self::Hash(_) => "E_INTERNAL",
            Self::Db(_) => "E_DATABASE",
        }
    }
}

/// Who is creating the account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignUpOrigin {
    /// Self-service sign-up; `admin` only while no admin exists.
    Public,
    /// An admin creating a user from the panel; any role.
    Admin,
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct SignUp {
    pub email: String,
    pub password: String,
    pub full_name: String,
    #[serde(default = "default_role")]
    pub role: UserRole,
    #[serde(default)]
    pub phone: Option<String>,
}

fn default_role() -> UserRole {
    UserRole::Worker
}

/// Result of a successful sign-in.
#[derive(Debug, Clone)]
pub struct SignedIn {
    pub token: String,
    pub user: SessionUser,
    pub profile: Option<Profile>,
}

// =============================================================================
// PURE HELPERS
// =============================================================================

#[must_use]
pub fn normalize_email(email: &str) -> Option<String> {
    let normalized = email.trim().to_ascii_lowercase();
    let (local, domain) = normalized.split_once('@')?;
    if local.is_empty() || domain.is_empty() || domain.contains('@') {
        return None;
    }
    Some(normalized)
}

/// Display name derived from the local part of an email.
#[must_use]
pub fn name_from_email(email: &str) -> String {
    email
        .split('@')
        .next()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or("user")
        .to_owned()
}

pub fn validate_password(password: &str) -> Result<(), AuthError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AuthError::PasswordTooShort);
    }
    Ok(())
}

pub async fn hash_password(password: String) -> Result<String, AuthError> {
    tokio::task::spawn_blocking(move || bcrypt::hash(password, bcrypt::DEFAULT_COST))
        .await
        .map_err(|e| AuthError::Hash(e.to_string()))?
        .map_err(|e| AuthError::Hash(e.to_string()))
}

/// Verify a password against a stored hash. Malformed hashes never match.
pub async fn verify_password(password: String, hash: String) -> bool {
    tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash).unwrap_or(false))
        .await
        .unwrap_or(false)
}

// =============================================================================
// ACCOUNTS
// =============================================================================

/// Advisory lock key serializing public admin sign-ups.
const ADMIN_BOOTSTRAP_LOCK: i64 = 0x616c_616f_6272_61;

async fn admin_exists<'e>(executor: impl sqlx::PgExecutor<'e>) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM profiles WHERE role = 'admin')")
        .fetch_one(executor)
        .await
}

/// Create an account and its profile.
///
/// # Errors
///
/// Validation failures, a taken email, a disallowed role, or database errors.
pub async fn sign_up(pool: &PgPool, input: &SignUp, origin: SignUpOrigin) -> Result<Profile, AuthError> {
    let email = normalize_email(&input.email).ok_or(AuthError::InvalidEmail)?;
    validate_password(&input.password)?;
    let full_name = input.full_name.trim();
    if full_name.is_empty() {
        return Err(AuthError::NameRequired);
    }
    let bootstrap = origin == SignUpOrigin::Public && input.role == UserRole::Admin;
    if bootstrap && admin_exists(pool).await? {
        return Err(AuthError::RoleNotAllowed(UserRole::Admin));
    }

    let password_hash = hash_password(input.password.clone()).await?;

    let mut tx = pool.begin().await?;
    if bootstrap {
        // Held until commit; a second bootstrap waits, then sees the first admin.
        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(ADMIN_BOOTSTRAP_LOCK)
            .execute(&mut *tx)
            .await?;
        if admin_exists(&mut *tx).await? {
            return Err(AuthError::RoleNotAllowed(UserRole::Admin));
        }
    }
    let account_id: Uuid = sqlx::query_scalar("INSERT INTO accounts (email, password_hash) VALUES ($1, $2) RETURNING id")
        .bind(&email)
        .bind(&password_hash)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e, ACCOUNTS_EMAIL_KEY) {
                AuthError::EmailTaken
            } else {
                AuthError::Db(e)
            }
        })?;

    let profile = sqlx::query_as::<_, Profile>(
        "INSERT INTO profiles (id, full_name, role, phone) VALUES ($1, $2, $3, $4) RETURNING *",
    )
    .bind(account_id)
    .bind(full_name)
    .bind(input.role.as_str())
    .bind(super::error::optional_text(input.phone.as_deref()))
    .fetch_one(&mut *tx)
    .await?;
    tx.commit().await?;

    tracing::info!(%account_id, role = %profile.role, "account created");
    Ok(profile)
}

/// Verify credentials and open a session.
///
/// Unknown email and wrong password are indistinguishable to the caller.
pub async fn sign_in(pool: &PgPool, email: &str, password: &str, ttl_hours: i64) -> Result<SignedIn, AuthError> {
    let email = normalize_email(email).ok_or(AuthError::InvalidCredentials)?;

    let row = sqlx::query("SELECT id, email, password_hash FROM accounts WHERE email = $1")
        .bind(&email)
        .fetch_optional(pool)
        .await?
        .ok_or(AuthError::InvalidCredentials)?;

    let user = SessionUser { id: row.get("id"), email: row.get("email") };
    let hash: String = row.get("password_hash");
    if !verify_password(password.to_owned(), hash).await {
        return Err(AuthError::InvalidCredentials);
    }

    let profile = super::profile::get_profile(pool, user.id).await?;
    if profile.as_ref().is_some_and(|p| !p.is_active) {
        return Err(AuthError::AccountDisabled);
    }

    let token = session::create_session(pool, user.id, ttl_hours).await?;
    tracing::info!(account_id = %user.id, "signed in");
    Ok(SignedIn { token, user, profile })
}

/// Fetch the profile for a signed-in account, creating a worker profile named
/// after the email local part when none exists.
pub async fn ensure_profile(pool: &PgPool, user: &SessionUser) -> Result<Profile, sqlx::Error> {
    if let Some(profile) = super::profile::get_profile(pool, user.id).await? {
        return Ok(profile);
    }

    // A concurrent request may create it first; the conflict then re-reads.
    let created = sqlx::query_as::<_, Profile>(
        "INSERT INTO profiles (id, full_name, role) VALUES ($1, $2, 'worker') ON CONFLICT (id) DO NOTHING RETURNING *",
    )
    .bind(user.id)
    .bind(name_from_email(&user.email))
    .fetch_optional(pool)
    .await?;

    match created {
        Some(profile) => {
            tracing::info!(account_id = %user.id, "profile created on first use");
            Ok(profile)
        }
        None => sqlx::query_as::<_, Profile>("SELECT * FROM profiles WHERE id = $1")
            .bind(user.id)
            .fetch_one(pool)
            .await,
    }
}

/// Create any missing demo account. Returns how many were created.
pub async fn seed_demo_accounts(pool: &PgPool) -> Result<usize, AuthError> {
    let mut created = 0;
    for (email, password, full_name, role) in DEMO_ACCOUNTS {
        let input = SignUp {
            email: email.to_owned(),
            password: password.to_owned(),
            full_name: full_name.to_owned(),
            role,
            phone: None,
        };
        match sign_up(pool, &input, SignUpOrigin::Admin).await {
            Ok(_) => created += 1,
            Err(AuthError::EmailTaken) => {}
            Err(e) => return Err(e),
        }
    }
    if created > 0 {
        tracing::info!(created, "demo accounts seeded");
    }
    Ok(created)
}

#[cfg(test)]
#[path = "auth_test.rs"]
mod tests;
