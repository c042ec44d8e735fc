//! Worker check-in / check-out and the worker home state machine.
//!
//! DESIGN
//! ======
//! A worker is `Idle` or `Working`; the state is derived from whether an
//! open check-in row exists, never stored separately. The partial unique
//! index `check_ins_one_open_per_worker` makes a second concurrent check-in
//! fail at the database, which is reported as a conflict.

use std::fmt;

use chrono::{DateTime, NaiveTime, Utc};
use serde::Serialize;
use sqlx::postgres::PgRow;
use sqlx::{FromRow, PgPool, Row};
use uuid::Uuid;

use super::error::{Conflict, ServiceError, is_unique_violation, optional_text};
use super::photo::worker_has_task_on;
use crate::model::{CheckIn, Project};

const ONE_OPEN_PER_WORKER: &str = "check_ins_one_open_per_worker";

/// Whole hours and minutes between two instants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WorkDuration {
    pub hours: i64,
    pub minutes: i64,
}

impl WorkDuration {
    /// Duration from `start` to `end`; zero when `end` precedes `start`.
    #[must_use]
    pub fn between(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        let total = (end - start).num_minutes().max(0);
        Self { hours: total / 60, minutes: total % 60 }
    }
}

impl fmt::Display for WorkDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}h {}m", self.hours, self.minutes)
    }
}

#[must_use]
pub fn start_of_utc_day(now: DateTime<Utc>) -> DateTime<Utc> {
    now.date_naive().and_time(NaiveTime::MIN).and_utc()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum WorkerHome {
    Idle { projects: Vec<Project> },
    Working { check_in: CheckIn, project_name: String, elapsed: WorkDuration },
}

/// One row of the admin "today's activity" panel.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActivityEntry {
    #[serde(flatten)]
    pub check_in: CheckIn,
    pub worker_name: String,
    pub project_name: String,
    pub worked: WorkDuration,
}

struct ActivityRow {
    check_in: CheckIn,
    worker_name: String,
    project_name: String,
}

impl FromRow<'_, PgRow> for ActivityRow {
    fn from_row(row: &PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            check_in: CheckIn::from_row(row)?,
            worker_name: row.try_get("worker_name")?,
            project_name: row.try_get("project_name")?,
        })
    }
}

// =============================================================================
// QUERIES
// =============================================================================

pub async fn active_check_in(pool: &PgPool, worker_id: Uuid) -> Result<Option<CheckIn>, sqlx::Error> {
    sqlx::query_as::<_, CheckIn>("SELECT * FROM check_ins WHERE worker_id = $1 AND check_out_time IS NULL")
        .bind(worker_id)
        .fetch_optional(pool)
        .await
}

/// In-progress projects on which the worker has at least one task.
pub async fn selectable_projects(pool: &PgPool, worker_id: Uuid) -> Result<Vec<Project>, sqlx::Error> {
    sqlx::query_as::<_, Project>(
        r"SELECT p.* FROM projects p
          WHERE p.status = 'in_progress'
            AND EXISTS (SELECT 1 FROM tasks t WHERE t.project_id = p.id AND t.assigned_to = $1)
          ORDER BY p.name",
    )
    .bind(worker_id)
    .fetch_all(pool)
    .await
}

pub async fn worker_home(pool: &PgPool, worker_id: Uuid, now: DateTime<Utc>) -> Result<WorkerHome, sqlx::Error> {
    let Some(check_in) = active_check_in(pool, worker_id).await? else {
        let projects = selectable_projects(pool, worker_id).await?;
        return Ok(WorkerHome::Idle { projects });
    };
    let project_name: String = sqlx::query_scalar("SELECT name FROM projects WHERE id = $1")
        .bind(check_in.project_id)
        .fetch_one(pool)
        .await?;
    let elapsed = WorkDuration::between(check_in.check_in_time, now);
    Ok(WorkerHome::Working { check_in, project_name, elapsed })
}

/// Check-ins started since UTC midnight, newest first, with time worked so far.
pub async fn today_activity(pool: &PgPool, now: DateTime<Utc>) -> Result<Vec<ActivityEntry>, sqlx::Error> {
    let rows = sqlx::query_as::<_, ActivityRow>(
        r"SELECT c.*, w.full_name AS worker_name, p.name AS project_name
          FROM check_ins c
          JOIN profiles w ON w.id = c.worker_id
          JOIN projects p ON p.id = c.project_id
          WHERE c.check_in_time >= $1
          ORDER BY c.check_in_time DESC",
    )
    .bind(start_of_utc_day(now))
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|row| {
            let end = row.check_in.check_out_time.unwrap_or(now);
            ActivityEntry {
                worked: WorkDuration::between(row.check_in.check_in_time, end),
                check_in: row.check_in,
                worker_name: row.worker_name,
                project_name: row.project_name,
            }
        })
        .collect())
}

// =============================================================================
// TRANSITIONS
// =============================================================================

/// Idle -> Working.
pub async fn check_in(pool: &PgPool, worker_id: Uuid, project_id: Uuid) -> Result<CheckIn, ServiceError> {
    if !worker_has_task_on(pool, worker_id, project_id).await? {
        return Err(ServiceError::Forbidden("worker has no task on this project"));
    }

    let row = sqlx::query_as::<_, CheckIn>("INSERT INTO check_ins (worker_id, project_id) VALUES ($1, $2) RETURNING *")
        .bind(worker_id)
        .bind(project_id)
        .fetch_one(pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e, ONE_OPEN_PER_WORKER) {
                ServiceError::Conflict(Conflict::AlreadyCheckedIn)
            } else {
                e.into()
            }
        })?;

    tracing::info!(%worker_id, %project_id, "checked in");
    Ok(row)
}

/// Working -> Idle.
pub async fn check_out(pool: &PgPool, worker_id: Uuid, notes: Option<&str>) -> Result<CheckIn, ServiceError> {
    let row = sqlx::query_as::<_, CheckIn>(
        r"UPDATE check_ins SET check_out_time = now(), notes = COALESCE($2, notes)
          WHERE worker_id = $1 AND check_out_time IS NULL
          RETURNING *",
    )
    .bind(worker_id)
    .bind(optional_text(notes))
    .fetch_optional(pool)
    .await?
    .ok_or(ServiceError::Conflict(Conflict::NoActiveCheckIn))?;

    tracing::info!(%worker_id, check_in_id = %row.id, "checked out");
    Ok(row)
}

#[cfg(test)]
#[path = "check_in_test.rs"]
mod tests;
