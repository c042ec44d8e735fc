//! Profile queries and user management.

use serde::Deserialize;
use sqlx::PgPool;
use uuid::Uuid;

use super::cascade::{self, Removed};
use super::error::{ServiceError, ValidationError, optional_text, required_text};
use crate::model::{Profile, UserRole};

/// Partial profile update. `phone: Some("")` clears the phone.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfilePatch {
    pub full_name: Option<String>,
    pub role: Option<UserRole>,
    pub phone: Option<String>,
    pub is_active: Option<bool>,
}

impl ProfilePatch {
    /// True when the patch only touches fields a user may edit on their own profile.
    #[must_use]
    pub fn is_self_editable(&self) -> bool {
        self.role.is_none() && self.is_active.is_none()
    }
}

pub async fn get_profile(pool: &PgPool, id: Uuid) -> Result<Option<Profile>, sqlx::Error> {
    sqlx::query_as::<_, Profile>("SELECT * FROM profiles WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn list_profiles(pool: &PgPool) -> Result<Vec<Profile>, sqlx::Error> {
    sqlx::query_as::<_, Profile>("SELECT * FROM profiles ORDER BY created_at DESC")
        .fetch_all(pool)
        .await
}

/// Active workers, by name. Used for task assignment.
pub async fn list_active_workers(pool: &PgPool) -> Result<Vec<Profile>, sqlx::Error> {
    sqlx::query_as::<_, Profile>("SELECT * FROM profiles WHERE role = 'worker' AND is_active ORDER BY full_name")
        .fetch_all(pool)
        .await
}

pub async fn update_profile(pool: &PgPool, id: Uuid, patch: &ProfilePatch) -> Result<Profile, ServiceError> {
    let full_name = patch
        .full_name
        .as_deref()
        .map(|name| required_text("full_name", name))
        .transpose()?;
    let phone_set = patch.phone.is_some();
    let phone = optional_text(patch.phone.as_deref());

    sqlx::query_as::<_, Profile>(
        r"UPDATE profiles SET
              full_name = COALESCE($2, full_name),
              role = COALESCE($3, role),
              phone = CASE WHEN $4 THEN $5 ELSE phone END,
              is_active = COALESCE($6, is_active)
          WHERE id = $1
          RETURNING *",
    )
    .bind(id)
    .bind(full_name)
    .bind(patch.role.map(UserRole::as_str))
    .bind(phone_set)
    .bind(phone)
    .bind(patch.is_active)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| ServiceError::not_found("profile", id))
}

/// Delete a user (account and profile). An admin cannot delete themself.
/// The user's own rows go with them; tasks and projects are detached.
pub async fn delete_profile(pool: &PgPool, actor_id: Uuid, id: Uuid) -> Result<Removed<Profile>, ServiceError> {
    if actor_id == id {
        return Err(ServiceError::Forbidden("cannot delete own account"));
    }
    let mut tx = pool.begin().await?;
    let profile = sqlx::query_as::<_, Profile>("SELECT * FROM profiles WHERE id = $1 FOR UPDATE")
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| ServiceError::not_found("profile", id))?;
    let cascade = cascade::remove_profile_dependents(&mut *tx, id).await?;
    sqlx::query("DELETE FROM accounts WHERE id = $1").bind(id).execute(&mut *tx).await?;
    tx.commit().await?;
    Ok(Removed { value: profile, cascade })
}
/// Reject a patch a non-admin tries to apply to their own profile.
pub fn check_self_patch(patch: &ProfilePatch) -> Result<(), ServiceError> {
    if !patch.is_self_editable() {
        return Err(ServiceError::Forbidden("only full_name and phone may be self-edited"));
    }
    if patch.full_name.as_deref().is_some_and(|n| n.trim().is_empty()) {
        return Err(ValidationError::Required("full_name").into());
    }
    Ok(())
}

#[cfg(test)]
#[path = "profile_test.rs"]
mod tests;
