//! Project CRUD.
//!
//! `progress_percentage` is entered by admins; it is not derived from tasks.
//! Budget and spent are validated as non-negative amounts but `spent` may
//! exceed `budget`; portal summaries flag that case instead.

use std::collections::HashSet;

use chrono::NaiveDate;
use serde::Deserialize;
use sqlx::PgPool;
use uuid::Uuid;

use super::cascade::{self, Removed};
use super::error::{ServiceError, ValidationError, check_amount, check_range, is_foreign_key_violation, optional_text, required_text};
use crate::model::{Project, ProjectStatus, nullable};

#[derive(Debug, Clone, Deserialize)]
pub struct NewProject {
    pub name: String,
    pub address: String,
    #[serde(default)]
    pub client_id: Option<Uuid>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: Option<ProjectStatus>,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub expected_end_date: Option<NaiveDate>,
    #[serde(default)]
    pub budget: f64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProjectPatch {
    pub name: Option<String>,
    pub address: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub client_id: Option<Option<Uuid>>,
    #[serde(default, deserialize_with = "nullable")]
    pub description: Option<Option<String>>,
    pub status: Option<ProjectStatus>,
    #[serde(default, deserialize_with = "nullable")]
    pub start_date: Option<Option<NaiveDate>>,
    #[serde(default, deserialize_with = "nullable")]
    pub expected_end_date: Option<Option<NaiveDate>>,
    pub budget: Option<f64>,
    pub spent: Option<f64>,
    pub progress_percentage: Option<i32>,
}

impl ProjectPatch {
    /// Validate numeric ranges and required text. Returns trimmed name/address.
    pub fn validate(&self) -> Result<(Option<String>, Option<String>), ValidationError> {
        if let Some(budget) = self.budget {
            check_amount("budget", budget)?;
        }
        if let Some(spent) = self.spent {
            check_amount("spent", spent)?;
        }
        if let Some(progress) = self.progress_percentage {
            check_range("progress_percentage", i64::from(progress), 0, 100)?;
        }
        let name = self.name.as_deref().map(|v| required_text("name", v)).transpose()?;
        let address = self.address.as_deref().map(|v| required_text("address", v)).transpose()?;
        Ok((name, address))
    }
}

fn map_client_fk(err: sqlx::Error, client_id: Option<Uuid>) -> ServiceError {
    match client_id {
        Some(id) if is_foreign_key_violation(&err) => ServiceError::not_found("profile", id),
        _ => err.into(),
    }
}

// =============================================================================
// QUERIES
// =============================================================================

/// All projects, newest first.
pub async fn list_projects(pool: &PgPool) -> Result<Vec<Project>, sqlx::Error> {
    sqlx::query_as::<_, Project>("SELECT * FROM projects ORDER BY created_at DESC")
        .fetch_all(pool)
        .await
}

/// Planning and in-progress projects, most recently updated first.
pub async fn list_active_projects(pool: &PgPool) -> Result<Vec<Project>, sqlx::Error> {
    let active: Vec<&str> = ProjectStatus::ACTIVE.iter().map(|s| s.as_str()).collect();
    sqlx::query_as::<_, Project>("SELECT * FROM projects WHERE status = ANY($1) ORDER BY updated_at DESC")
        .bind(active)
        .fetch_all(pool)
        .await
}

pub async fn get_project(pool: &PgPool, id: Uuid) -> Result<Project, ServiceError> {
    sqlx::query_as::<_, Project>("SELECT * FROM projects WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| ServiceError::not_found("project", id))
}

// =============================================================================
// MUTATIONS
// =============================================================================

pub async fn create_project(pool: &PgPool, input: &NewProject) -> Result<Project, ServiceError> {
    let name = required_text("name", &input.name)?;
    let address = required_text("address", &input.address)?;
    check_amount("budget", input.budget)?;
    let status = input.status.unwrap_or(ProjectStatus::InProgress);

    let project = sqlx::query_as::<_, Project>(
        r"INSERT INTO projects
              (name, address, client_id, description, status, start_date, expected_end_date, budget)
          VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
          RETURNING *",
    )
    .bind(name)
    .bind(address)
    .bind(input.client_id)
    .bind(optional_text(input.description.as_deref()))
    .bind(status.as_str())
    .bind(input.start_date)
    .bind(input.expected_end_date)
    .bind(input.budget)
    .fetch_one(pool)
    .await
    .map_err(|e| map_client_fk(e, input.client_id))?;

    tracing::info!(project_id = %project.id, "project created");
    Ok(project)
}

pub async fn update_project(pool: &PgPool, id: Uuid, patch: &ProjectPatch) -> Result<Project, ServiceError> {
    let (name, address) = patch.validate()?;
    let description = patch.description.as_ref().map(|d| optional_text(d.as_deref()));
    let client_id = patch.client_id.flatten();

    sqlx::query_as::<_, Project>(
        r"UPDATE projects SET
              name = COALESCE($2, name),
              address = COALESCE($3, address),
              client_id = CASE WHEN $4 THEN $5 ELSE client_id END,
              description = CASE WHEN $6 THEN $7 ELSE description END,
              status = COALESCE($8, status),
              start_date = CASE WHEN $9 THEN $10 ELSE start_date END,
              expected_end_date = CASE WHEN $11 THEN $12 ELSE expected_end_date END,
              budget = COALESCE($13, budget),
              spent = COALESCE($14, spent),
              progress_percentage = COALESCE($15, progress_percentage),
              updated_at = now()
          WHERE id = $1
          RETURNING *",
    )
    .bind(id)
    .bind(name)
    .bind(address)
    .bind(patch.client_id.is_some())
    .bind(client_id)
    .bind(description.is_some())
    .bind(description.flatten())
    .bind(patch.status.map(ProjectStatus::as_str))
    .bind(patch.start_date.is_some())
    .bind(patch.start_date.flatten())
    .bind(patch.expected_end_date.is_some())
    .bind(patch.expected_end_date.flatten())
    .bind(patch.budget)
    .bind(patch.spent)
    .bind(patch.progress_percentage)
    .fetch_optional(pool)
    .await
    .map_err(|e| map_client_fk(e, client_id))?
    .ok_or_else(|| ServiceError::not_found("project", id))
}

/// Ids of the projects a client owns.
pub async fn client_project_ids(pool: &PgPool, client_id: Uuid) -> Result<HashSet<Uuid>, sqlx::Error> {
    let ids: Vec<Uuid> = sqlx::query_scalar("SELECT id FROM projects WHERE client_id = $1")
        .bind(client_id)
        .fetch_all(pool)
        .await?;
    Ok(ids.into_iter().collect())
}

/// Delete a project together with its tasks, check-ins, photos and issues.
pub async fn delete_project(pool: &PgPool, id: Uuid) -> Result<Removed<Project>, ServiceError> {
    let mut tx = pool.begin().await?;
    let project = sqlx::query_as::<_, Project>("SELECT * FROM projects WHERE id = $1 FOR UPDATE")
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| ServiceError::not_found("project", id))?;
    let cascade = cascade::remove_project_dependents(&mut *tx, id).await?;
    sqlx::query("DELETE FROM projects WHERE id = $1").bind(id).execute(&mut *tx).await?;
    tx.commit().await?;

    tracing::info!(project_id = %id, tasks = cascade.tasks.len(), photos = cascade.photos.len(), "project deleted");
    Ok(Removed { value: project, cascade })
}
#[cfg(test)]
#[path = "project_test.rs"]
mod tests;
