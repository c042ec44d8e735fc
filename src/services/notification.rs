//! In-app notifications.
//!
//! Writers take a `&mut PgConnection` so a notification commits in the same
//! transaction as the change it reports. Text is rendered from the locale
//! table at write time.

use serde::Serialize;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use super::error::ServiceError;
use crate::locale::{Locale, NotificationText};
use crate::model::{Notification, NotificationKind};

/// Number of notifications returned by the bell dropdown.
pub const LATEST_LIMIT: i64 = 10;

#[derive(Debug, Clone, Serialize)]
pub struct NotificationFeed {
    pub notifications: Vec<Notification>,
    pub unread: i64,
}

/// A committed write plus the notifications written in its transaction.
#[derive(Debug, Clone)]
pub struct Notified<T> {
    pub value: T,
    pub notifications: Vec<Notification>,
}

impl<T> Notified<T> {
    #[must_use]
    pub fn new(value: T, notifications: Vec<Notification>) -> Self {
        Self { value, notifications }
    }
}

/// Severity shown for each notification template.
#[must_use]
pub fn kind_of(template: &NotificationText<'_>) -> NotificationKind {
    match template {
        NotificationText::TaskAssigned { .. } | NotificationText::TaskSubmitted { .. } => NotificationKind::Info,
        NotificationText::TaskApproved { .. } => NotificationKind::Success,
        NotificationText::TaskRejected { .. } => NotificationKind::Warning,
        NotificationText::IssueReported { .. } => NotificationKind::Alert,
    }
}

/// Render `template` in `locale` and insert it for `user_id`.
pub async fn notify(
    conn: &mut PgConnection,
    locale: Locale,
    user_id: Uuid,
    template: &NotificationText<'_>,
    link: Option<&str>,
) -> Result<Notification, sqlx::Error> {
    let (title, message) = locale.notification(template);
    sqlx::query_as::<_, Notification>(
        "INSERT INTO notifications (user_id, title, message, type, link) VALUES ($1, $2, $3, $4, $5) RETURNING *",
    )
    .bind(user_id)
    .bind(title)
    .bind(message)
    .bind(kind_of(template).as_str())
    .bind(link)
    .fetch_one(conn)
    .await
}

pub async fn latest(pool: &PgPool, user_id: Uuid) -> Result<NotificationFeed, sqlx::Error> {
    let (notifications, unread) = tokio::try_join!(
        sqlx::query_as::<_, Notification>(
            "SELECT * FROM notifications WHERE user_id = $1 ORDER BY created_at DESC LIMIT $2",
        )
        .bind(user_id)
        .bind(LATEST_LIMIT)
        .fetch_all(pool),
        unread_count(pool, user_id),
    )?;
    Ok(NotificationFeed { notifications, unread })
}

pub async fn unread_count(pool: &PgPool, user_id: Uuid) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar("SELECT count(*) FROM notifications WHERE user_id = $1 AND NOT is_read")
        .bind(user_id)
        .fetch_one(pool)
        .await
}

/// Mark one of the caller's notifications read.
pub async fn mark_read(pool: &PgPool, user_id: Uuid, id: Uuid) -> Result<Notification, ServiceError> {
    sqlx::query_as::<_, Notification>(
        "UPDATE notifications SET is_read = true WHERE id = $1 AND user_id = $2 RETURNING *",
    )
    .bind(id)
    .bind(user_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| ServiceError::not_found("notification", id))
}

/// Returns the number of notifications that changed.
pub async fn mark_all_read(pool: &PgPool, user_id: Uuid) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("UPDATE notifications SET is_read = true WHERE user_id = $1 AND NOT is_read")
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

#[cfg(test)]
#[path = "notification_test.rs"]
mod tests;
