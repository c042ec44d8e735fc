//! Site issues: worker reports, admin triage.

use serde::{Deserialize, Serialize};
use sqlx::postgres::PgRow;
use sqlx::{FromRow, PgPool, Row};
use uuid::Uuid;

use super::error::{Conflict, ServiceError, ValidationError, is_foreign_key_violation, optional_text, required_text};
use super::notification::{self, Notified};
use super::photo::worker_has_task_on;
use crate::locale::{Locale, NotificationText};
use crate::model::{Issue, IssueSeverity, IssueStatus, Profile, UserRole};

/// Issues shown on the admin dashboard.
pub const OPEN_ISSUES_LIMIT: i64 = 5;

#[derive(Debug, Clone, Deserialize)]
pub struct NewIssue {
    pub project_id: Uuid,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub severity: IssueSeverity,
    #[serde(default)]
    pub photo_urls: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IssueSummary {
    #[serde(flatten)]
    pub issue: Issue,
    pub reporter_name: String,
    pub project_name: String,
}

impl FromRow<'_, PgRow> for IssueSummary {
    fn from_row(row: &PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            issue: Issue::from_row(row)?,
            reporter_name: row.try_get("reporter_name")?,
            project_name: row.try_get("project_name")?,
        })
    }
}

/// Blank entries dropped; an empty list becomes `None`.
fn clean_photo_urls(urls: Option<&[String]>) -> Option<Vec<String>> {
    let cleaned: Vec<String> = urls?
        .iter()
        .map(|u| u.trim())
        .filter(|u| !u.is_empty())
        .map(str::to_owned)
        .collect();
    (!cleaned.is_empty()).then_some(cleaned)
}

/// Open and in-progress issues, newest first.
pub async fn list_open(pool: &PgPool, limit: i64) -> Result<Vec<IssueSummary>, sqlx::Error> {
    sqlx::query_as::<_, IssueSummary>(
        r"SELECT i.*, r.full_name AS reporter_name, p.name AS project_name
          FROM issues i
          JOIN profiles r ON r.id = i.reported_by
          JOIN projects p ON p.id = i.project_id
          WHERE i.status IN ('open', 'in_progress')
          ORDER BY i.created_at DESC
          LIMIT $1",
    )
    .bind(limit)
    .fetch_all(pool)
    .await
}

/// File an issue and alert every active admin in the same transaction.
pub async fn report_issue(
    pool: &PgPool,
    locale: Locale,
    reporter: &Profile,
    input: &NewIssue,
) -> Result<Notified<Issue>, ServiceError> {
    let title = required_text("title", &input.title)?;
    match reporter.role {
        UserRole::Admin => {}
        UserRole::Worker => {
            if !worker_has_task_on(pool, reporter.id, input.project_id).await? {
                return Err(ServiceError::Forbidden("worker has no task on this project"));
            }
        }
        UserRole::Client => return Err(ServiceError::Forbidden("clients cannot report issues")),
    }

    let mut tx = pool.begin().await?;
    let issue = sqlx::query_as::<_, Issue>(
        r"INSERT INTO issues (project_id, reported_by, title, description, severity, photo_urls)
          VALUES ($1, $2, $3, $4, $5, $6)
          RETURNING *",
    )
    .bind(input.project_id)
    .bind(reporter.id)
    .bind(&title)
    .bind(optional_text(input.description.as_deref()))
    .bind(input.severity.as_str())
    .bind(clean_photo_urls(input.photo_urls.as_deref()))
    .fetch_one(&mut *tx)
    .await
    .map_err(|e| {
        if is_foreign_key_violation(&e) {
            ServiceError::Validation(ValidationError::UnknownReference("project_id"))
        } else {
            e.into()
        }
    })?;

    let admins: Vec<Uuid> = sqlx::query_scalar("SELECT id FROM profiles WHERE role = 'admin' AND is_active")
        .fetch_all(&mut *tx)
        .await?;
    let template = NotificationText::IssueReported { reporter: &reporter.full_name, title: &title };
    let mut notifications = Vec::with_capacity(admins.len());
    for admin_id in admins {
        notifications.push(notification::notify(&mut *tx, locale, admin_id, &template, None).await?);
    }
    tx.commit().await?;

    tracing::info!(issue_id = %issue.id, severity = %issue.severity, admins = notifications.len(), "issue reported");
    Ok(Notified::new(issue, notifications))
}

async fn current_status(pool: &PgPool, id: Uuid) -> Result<IssueStatus, ServiceError> {
    let issue = sqlx::query_as::<_, Issue>("SELECT * FROM issues WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| ServiceError::not_found("issue", id))?;
    Ok(issue.status)
}

/// open -> in_progress. Already in progress is returned unchanged.
pub async fn mark_in_progress(pool: &PgPool, id: Uuid) -> Result<Issue, ServiceError> {
    let updated = sqlx::query_as::<_, Issue>(
        "UPDATE issues SET status = 'in_progress' WHERE id = $1 AND status IN ('open', 'in_progress') RETURNING *",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;
    match updated {
        Some(issue) => Ok(issue),
        None => match current_status(pool, id).await? {
            IssueStatus::Resolved => Err(Conflict::AlreadyResolved.into()),
            IssueStatus::Open | IssueStatus::InProgress => Err(Conflict::StatusChanged.into()),
        },
    }
}

/// Resolve an issue once; resolving again is a conflict, not a second write.
pub async fn resolve(pool: &PgPool, id: Uuid) -> Result<Issue, ServiceError> {
    let updated = sqlx::query_as::<_, Issue>(
        "UPDATE issues SET status = 'resolved', resolved_at = now() WHERE id = $1 AND status <> 'resolved' RETURNING *",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;
    match updated {
        Some(issue) => {
            tracing::info!(issue_id = %id, "issue resolved");
            Ok(issue)
        }
        None => {
            current_status(pool, id).await?;
            Err(Conflict::AlreadyResolved.into())
        }
    }
}

#[cfg(test)]
#[path = "issue_test.rs"]
mod tests;
