//! Domain rows shared by services, routes and the realtime feed.
//!
//! DESIGN
//! ======
//! Enumerated columns are stored as TEXT with CHECK constraints and mapped
//! through `as_str` / `parse` here, so the SQL stays readable and the Rust
//! side stays closed over the known variants. `FromRow` impls are written by
//! hand to route every enum through the same decode path.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgRow;
use sqlx::{FromRow, Row};
use uuid::Uuid;

// =============================================================================
// ENUMS
// =============================================================================

macro_rules! text_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            #[must_use]
            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }

            #[must_use]
            pub fn parse(raw: &str) -> Option<Self> {
                match raw {
                    $($text => Some($name::$variant),)+
                    _ => None,
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

text_enum!(
    /// Application role of a profile. Selects the dashboard and every permission gate.
    UserRole {
        Admin => "admin",
        Worker => "worker",
        Client => "client",
    }
);

text_enum!(ProjectStatus {
    Planning => "planning",
    InProgress => "in_progress",
    Paused => "paused",
    Completed => "completed",
});

text_enum!(
    /// Task workflow position. See [`TaskStatus::can_transition`].
    TaskStatus {
        Pending => "pending",
        InProgress => "in_progress",
        Review => "review",
        Approved => "approved",
        Rejected => "rejected",
    }
);

text_enum!(Priority {
    Low => "low",
    Medium => "medium",
    High => "high",
    Urgent => "urgent",
});

text_enum!(IssueSeverity {
    Low => "low",
    Medium => "medium",
    High => "high",
    Critical => "critical",
});

text_enum!(IssueStatus {
    Open => "open",
    InProgress => "in_progress",
    Resolved => "resolved",
});

text_enum!(PhotoType {
    Progress => "progress",
    Issue => "issue",
    Completion => "completion",
    Before => "before",
    After => "after",
});

text_enum!(NotificationKind {
    Alert => "alert",
    Info => "info",
    Warning => "warning",
    Success => "success",
});

impl ProjectStatus {
    /// Statuses counted as "active" by the admin dashboard and project list.
    pub const ACTIVE: [ProjectStatus; 2] = [ProjectStatus::InProgress, ProjectStatus::Planning];
}

impl TaskStatus {
    /// Statuses shown on a worker's task list.
    pub const OPEN_FOR_WORKER: [TaskStatus; 3] = [TaskStatus::Pending, TaskStatus::InProgress, TaskStatus::Review];

    /// Workflow edges driven by worker and review actions.
    ///
    /// Admin edits through the task form bypass this and may set any status.
    #[must_use]
    pub fn can_transition(self, to: TaskStatus) -> bool {
        use TaskStatus::*;
        matches!(
            (self, to),
            (Pending, InProgress)
                | (InProgress, Review)
                | (Rejected, Review)
                | (Rejected, InProgress)
                | (Review, Approved)
                | (Review, Rejected)
        )
    }
}

impl Default for Priority {
    fn default() -> Self {
        Self::Medium
    }
}

impl Default for IssueSeverity {
    fn default() -> Self {
        Self::Medium
    }
}

impl Default for PhotoType {
    fn default() -> Self {
        Self::Progress
    }
}

/// Deserialize a PATCH field where an absent key and an explicit `null` differ:
/// absent is `None`, `null` is `Some(None)`.
pub(crate) fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

fn decode_text<T>(row: &PgRow, column: &str, parse: fn(&str) -> Option<T>) -> Result<T, sqlx::Error> {
    let raw: String = row.try_get(column)?;
    parse(&raw).ok_or_else(|| sqlx::Error::ColumnDecode {
        index: column.to_owned(),
        source: format!("unexpected value {raw:?}").into(),
    })
}

// =============================================================================
// ROWS
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: Uuid,
    pub full_name: String,
    pub role: UserRole,
    pub phone: Option<String>,
    pub avatar_url: Option<String>,
    pub rating: f64,
    pub total_ratings: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl FromRow<'_, PgRow> for Profile {
    fn from_row(row: &PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            full_name: row.try_get("full_name")?,
            role: decode_text(row, "role", UserRole::parse)?,
            phone: row.try_get("phone")?,
            avatar_url: row.try_get("avatar_url")?,
            rating: row.try_get("rating")?,
            total_ratings: row.try_get("total_ratings")?,
            is_active: row.try_get("is_active")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: Uuid,
    pub name: String,
    pub client_id: Option<Uuid>,
    pub address: String,
    pub description: Option<String>,
    pub status: ProjectStatus,
    pub start_date: Option<NaiveDate>,
    pub expected_end_date: Option<NaiveDate>,
    pub budget: f64,
    pub spent: f64,
    pub progress_percentage: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl FromRow<'_, PgRow> for Project {
    fn from_row(row: &PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            client_id: row.try_get("client_id")?,
            address: row.try_get("address")?,
            description: row.try_get("description")?,
            status: decode_text(row, "status", ProjectStatus::parse)?,
            start_date: row.try_get("start_date")?,
            expected_end_date: row.try_get("expected_end_date")?,
            budget: row.try_get("budget")?,
            spent: row.try_get("spent")?,
            progress_percentage: row.try_get("progress_percentage")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub project_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub specifications: Option<String>,
    pub assigned_to: Option<Uuid>,
    pub status: TaskStatus,
    pub priority: Priority,
    pub due_date: Option<NaiveDate>,
    pub quality_score: Option<i16>,
    pub review_notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl FromRow<'_, PgRow> for Task {
    fn from_row(row: &PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            project_id: row.try_get("project_id")?,
            title: row.try_get("title")?,
            description: row.try_get("description")?,
            specifications: row.try_get("specifications")?,
            assigned_to: row.try_get("assigned_to")?,
            status: decode_text(row, "status", TaskStatus::parse)?,
            priority: decode_text(row, "priority", Priority::parse)?,
            due_date: row.try_get("due_date")?,
            quality_score: row.try_get("quality_score")?,
            review_notes: row.try_get("review_notes")?,
            created_at: row.try_get("created_at")?,
            completed_at: row.try_get("completed_at")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct CheckIn {
    pub id: Uuid,
    pub worker_id: Uuid,
    pub project_id: Uuid,
    pub check_in_time: DateTime<Utc>,
    pub check_out_time: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Photo {
    pub id: Uuid,
    pub project_id: Uuid,
    pub task_id: Option<Uuid>,
    pub uploaded_by: Uuid,
    pub photo_url: String,
    pub description: Option<String>,
    pub photo_type: PhotoType,
    pub is_approved: bool,
    pub created_at: DateTime<Utc>,
}

impl FromRow<'_, PgRow> for Photo {
    fn from_row(row: &PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            project_id: row.try_get("project_id")?,
            task_id: row.try_get("task_id")?,
            uploaded_by: row.try_get("uploaded_by")?,
            photo_url: row.try_get("photo_url")?,
            description: row.try_get("description")?,
            photo_type: decode_text(row, "photo_type", PhotoType::parse)?,
            is_approved: row.try_get("is_approved")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    pub id: Uuid,
    pub project_id: Uuid,
    pub reported_by: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub severity: IssueSeverity,
    pub status: IssueStatus,
    pub photo_urls: Option<Vec<String>>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl FromRow<'_, PgRow> for Issue {
    fn from_row(row: &PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            project_id: row.try_get("project_id")?,
            reported_by: row.try_get("reported_by")?,
            title: row.try_get("title")?,
            description: row.try_get("description")?,
            severity: decode_text(row, "severity", IssueSeverity::parse)?,
            status: decode_text(row, "status", IssueStatus::parse)?,
            photo_urls: row.try_get("photo_urls")?,
            resolved_at: row.try_get("resolved_at")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub message: String,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub is_read: bool,
    pub link: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl FromRow<'_, PgRow> for Notification {
    fn from_row(row: &PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            title: row.try_get("title")?,
            message: row.try_get("message")?,
            kind: decode_text(row, "type", NotificationKind::parse)?,
            is_read: row.try_get("is_read")?,
            link: row.try_get("link")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

#[cfg(test)]
#[path = "model_test.rs"]
mod tests;
