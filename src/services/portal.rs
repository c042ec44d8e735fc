//! Client portal: a client's own projects with progress, budget and gallery.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

use super::error::ServiceError;
use super::task::TaskSummary;
use crate::model::{Photo, Project, TaskStatus};

const SECONDS_PER_DAY: i64 = 86_400;

/// Budget and schedule figures derived from a project row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BudgetSummary {
    pub completed_tasks: usize,
    pub total_tasks: usize,
    /// Share of the budget spent, 0 when the budget is not positive.
    pub budget_percent: f64,
    pub over_budget: bool,
    pub remaining: f64,
    /// Whole days until the expected end, rounded up. Negative when late.
    pub days_remaining: Option<i64>,
}

impl BudgetSummary {
    #[must_use]
    pub fn compute(project: &Project, tasks: &[TaskSummary], now: DateTime<Utc>) -> Self {
        let budget_percent = if project.budget > 0.0 { project.spent / project.budget * 100.0 } else { 0.0 };
        Self {
            completed_tasks: tasks.iter().filter(|t| t.task.status == TaskStatus::Approved).count(),
            total_tasks: tasks.len(),
            budget_percent,
            over_budget: project.spent > project.budget,
            remaining: project.budget - project.spent,
            days_remaining: project.expected_end_date.map(|end| days_until(end, now)),
        }
    }
}

/// Days from `now` to midnight UTC of `end`, rounded up.
#[must_use]
pub fn days_until(end: NaiveDate, now: DateTime<Utc>) -> i64 {
    let end = end.and_time(NaiveTime::MIN).and_utc();
    let seconds = (end - now).num_seconds();
    -(-seconds).div_euclid(SECONDS_PER_DAY)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClientProject {
    pub project: Project,
    pub tasks: Vec<TaskSummary>,
    pub photos: Vec<Photo>,
    pub active_check_ins: i64,
    pub summary: BudgetSummary,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Portal {
    pub projects: Vec<ClientProject>,
}

/// Every project owned by `client_id`, newest first.
pub async fn client_portal(pool: &PgPool, client_id: Uuid, now: DateTime<Utc>) -> Result<Portal, sqlx::Error> {
    let projects = sqlx::query_as::<_, Project>(
        "SELECT * FROM projects WHERE client_id = $1 ORDER BY created_at DESC",
    )
    .bind(client_id)
    .fetch_all(pool)
    .await?;
    let projects = assemble(pool, projects, now).await?;
    Ok(Portal { projects })
}

/// One owned project. Someone else's project is reported as missing.
pub async fn client_project(
    pool: &PgPool,
    client_id: Uuid,
    project_id: Uuid,
    now: DateTime<Utc>,
) -> Result<ClientProject, ServiceError> {
    let project = sqlx::query_as::<_, Project>("SELECT * FROM projects WHERE id = $1 AND client_id = $2")
        .bind(project_id)
        .bind(client_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| ServiceError::not_found("project", project_id))?;
    let mut assembled = assemble(pool, vec![project], now).await?;
    assembled.pop().ok_or_else(|| ServiceError::not_found("project", project_id))
}

async fn assemble(pool: &PgPool, projects: Vec<Project>, now: DateTime<Utc>) -> Result<Vec<ClientProject>, sqlx::Error> {
    if projects.is_empty() {
        return Ok(Vec::new());
    }
    let ids: Vec<Uuid> = projects.iter().map(|p| p.id).collect();

    let (tasks, photos, check_ins) = tokio::try_join!(
        sqlx::query_as::<_, TaskSummary>(
            r"SELECT t.*, p.name AS project_name, w.full_name AS worker_name
              FROM tasks t
              JOIN projects p ON p.id = t.project_id
              LEFT JOIN profiles w ON w.id = t.assigned_to
              WHERE t.project_id = ANY($1)
              ORDER BY t.created_at DESC",
        )
        .bind(&ids)
        .fetch_all(pool),
        sqlx::query_as::<_, Photo>(
            "SELECT * FROM photos WHERE project_id = ANY($1) AND is_approved ORDER BY created_at DESC",
        )
        .bind(&ids)
        .fetch_all(pool),
        sqlx::query_as::<_, (Uuid, i64)>(
            r"SELECT project_id, count(*) FROM check_ins
              WHERE project_id = ANY($1) AND check_out_time IS NULL
              GROUP BY project_id",
        )
        .bind(&ids)
        .fetch_all(pool),
    )?;

    let mut tasks_by: HashMap<Uuid, Vec<TaskSummary>> = HashMap::new();
    for task in tasks {
        tasks_by.entry(task.task.project_id).or_default().push(task);
    }
    let mut photos_by: HashMap<Uuid, Vec<Photo>> = HashMap::new();
    for photo in photos {
        photos_by.entry(photo.project_id).or_default().push(photo);
    }
    let check_ins: HashMap<Uuid, i64> = check_ins.into_iter().collect();

    Ok(projects
        .into_iter()
        .map(|project| {
            let tasks = tasks_by.remove(&project.id).unwrap_or_default();
            let summary = BudgetSummary::compute(&project, &tasks, now);
            ClientProject {
                photos: photos_by.remove(&project.id).unwrap_or_default(),
                active_check_ins: check_ins.get(&project.id).copied().unwrap_or(0),
                tasks,
                summary,
                project,
            }
        })
        .collect())
}

#[cfg(test)]
#[path = "portal_test.rs"]
mod tests;
