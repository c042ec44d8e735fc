//! Rows removed or detached together with a deleted parent.
//!
//! DESIGN
//! ======
//! The schema's foreign keys cascade silently, so a delete that relied on
//! them would leave realtime subscribers holding rows that no longer exist.
//! Parent deletes run in one transaction that first removes (or detaches)
//! the dependents with `RETURNING *`. The parent delete then finds nothing
//! left to cascade, and the caller gets every affected row to publish.

use sqlx::PgConnection;
use uuid::Uuid;

use crate::model::{CheckIn, Issue, Notification, Photo, Project, Task};

/// A deleted row and what went with it.
#[derive(Debug, Clone)]
pub struct Removed<T> {
    pub value: T,
    pub cascade: Cascade,
}

/// Dependents of a deleted row.
#[derive(Debug, Clone, Default)]
pub struct Cascade {
    pub tasks: Vec<Task>,
    pub check_ins: Vec<CheckIn>,
    pub photos: Vec<Photo>,
    pub issues: Vec<Issue>,
    pub notifications: Vec<Notification>,
    /// Tasks kept with `assigned_to` cleared.
    pub unassigned_tasks: Vec<Task>,
    /// Projects kept with `client_id` cleared.
    pub orphaned_projects: Vec<Project>,
}

impl Cascade {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
            && self.check_ins.is_empty()
            && self.photos.is_empty()
            && self.issues.is_empty()
            && self.notifications.is_empty()
            && self.unassigned_tasks.is_empty()
            && self.orphaned_projects.is_empty()
    }

    /// Stored URLs of the removed photos.
    pub fn photo_urls(&self) -> impl Iterator<Item = &str> {
        self.photos.iter().map(|p| p.photo_url.as_str())
    }
}

/// Remove everything hanging off a project. Photos go first so task photos
/// are returned once.
pub(crate) async fn remove_project_dependents(conn: &mut PgConnection, project_id: Uuid) -> Result<Cascade, sqlx::Error> {
    let photos = sqlx::query_as::<_, Photo>("DELETE FROM photos WHERE project_id = $1 RETURNING *")
        .bind(project_id)
        .fetch_all(&mut *conn)
        .await?;
    let check_ins = sqlx::query_as::<_, CheckIn>("DELETE FROM check_ins WHERE project_id = $1 RETURNING *")
        .bind(project_id)
        .fetch_all(&mut *conn)
        .await?;
    let issues = sqlx::query_as::<_, Issue>("DELETE FROM issues WHERE project_id = $1 RETURNING *")
        .bind(project_id)
        .fetch_all(&mut *conn)
        .await?;
    let tasks = sqlx::query_as::<_, Task>("DELETE FROM tasks WHERE project_id = $1 RETURNING *")
        .bind(project_id)
        .fetch_all(&mut *conn)
        .await?;
    Ok(Cascade { tasks, check_ins, photos, issues, ..Cascade::default() })
}

pub(crate) async fn remove_task_dependents(conn: &mut PgConnection, task_id: Uuid) -> Result<Cascade, sqlx::Error> {
    let photos = sqlx::query_as::<_, Photo>("DELETE FROM photos WHERE task_id = $1 RETURNING *")
        .bind(task_id)
        .fetch_all(&mut *conn)
        .await?;
    Ok(Cascade { photos, ..Cascade::default() })
}

/// Remove a profile's own rows and detach the tasks and projects that only
/// reference it.
pub(crate) async fn remove_profile_dependents(conn: &mut PgConnection, profile_id: Uuid) -> Result<Cascade, sqlx::Error> {
    let photos = sqlx::query_as::<_, Photo>("DELETE FROM photos WHERE uploaded_by = $1 RETURNING *")
        .bind(profile_id)
        .fetch_all(&mut *conn)
        .await?;
    let check_ins = sqlx::query_as::<_, CheckIn>("DELETE FROM check_ins WHERE worker_id = $1 RETURNING *")
        .bind(profile_id)
        .fetch_all(&mut *conn)
        .await?;
    let issues = sqlx::query_as::<_, Issue>("DELETE FROM issues WHERE reported_by = $1 RETURNING *")
        .bind(profile_id)
        .fetch_all(&mut *conn)
        .await?;
    let notifications = sqlx::query_as::<_, Notification>("DELETE FROM notifications WHERE user_id = $1 RETURNING *")
        .bind(profile_id)
        .fetch_all(&mut *conn)
        .await?;
    let unassigned_tasks =
        sqlx::query_as::<_, Task>("UPDATE tasks SET assigned_to = NULL WHERE assigned_to = $1 RETURNING *")
            .bind(profile_id)
            .fetch_all(&mut *conn)
            .await?;
    let orphaned_projects = sqlx::query_as::<_, Project>(
        "UPDATE projects SET client_id = NULL, updated_at = now() WHERE client_id = $1 RETURNING *",
    )
    .bind(profile_id)
    .fetch_all(&mut *conn)
    .await?;
    Ok(Cascade {
        check_ins,
        photos,
        issues,
        notifications,
        unassigned_tasks,
        orphaned_projects,
        ..Cascade::default()
    })
}

#[cfg(test)]
#[path = "cascade_test.rs"]
mod tests;
