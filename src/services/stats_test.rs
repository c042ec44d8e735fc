use super::*;
use chrono::Duration as ChronoDuration;
use serde_json::json;
use uuid::Uuid;

use crate::model::{Priority, UserRole};
use crate::services::realtime::ChangeOp;

fn worker() -> Profile {
    Profile {
        id: Uuid::new_v4(),
        full_name: "Pedro".into(),
        role: UserRole::Worker,
        phone: None,
        avatar_url: None,
        rating: 0.0,
        total_ratings: 0,
        is_active: true,
        created_at: Utc::now(),
    }
}

fn task(status: TaskStatus, score: Option<i16>, age_hours: i64) -> Task {
    Task {
        id: Uuid::new_v4(),
        project_id: Uuid::new_v4(),
        title: format!("{status} {age_hours}"),
        description: None,
        specifications: None,
        assigned_to: None,
        status,
        priority: Priority::Medium,
        due_date: None,
        quality_score: score,
        review_notes: None,
        created_at: Utc::now() - ChronoDuration::hours(age_hours),
        completed_at: None,
    }
}

#[test]
fn summary_counts_and_averages_scored_approvals() {
    let tasks = vec![
        task(TaskStatus::Approved, Some(8), 5),
        task(TaskStatus::Approved, Some(10), 4),
        task(TaskStatus::Approved, None, 3),
        task(TaskStatus::Rejected, Some(2), 2),
        task(TaskStatus::Pending, None, 1),
    ];
    let stats = summarize_worker(worker(), tasks);
    assert_eq!(stats.total_tasks, 5);
    assert_eq!(stats.approved_tasks, 3);
    assert_eq!(stats.rejected_tasks, 1);
    assert_eq!(stats.average_quality, Some(9.0));
}

#[test]
fn summary_keeps_three_newest_tasks() {
    let tasks = (0..6).map(|age| task(TaskStatus::Pending, None, age)).collect();
    let stats = summarize_worker(worker(), tasks);
    let titles: Vec<&str> = stats.recent_tasks.iter().map(|t| t.title.as_str()).collect();
    assert_eq!(titles, ["pending 0", "pending 1", "pending 2"]);
}

#[test]
fn worker_without_tasks_has_no_average() {
    let stats = summarize_worker(worker(), Vec::new());
    assert_eq!(stats.total_tasks, 0);
    assert_eq!(stats.average_quality, None);
    assert!(stats.recent_tasks.is_empty());
}

#[test]
fn only_counter_tables_mark_stats_dirty() {
    let id = Uuid::new_v4();
    assert!(affects_dashboard(&Change::new(Table::Tasks, ChangeOp::Update, id, &json!({}))));
    assert!(affects_dashboard(&Change::new(Table::CheckIns, ChangeOp::Insert, id, &json!({}))));
    assert!(!affects_dashboard(&Change::new(Table::Notifications, ChangeOp::Insert, id, &json!({}))));
    assert!(!affects_dashboard(&Change::new(Table::Photos, ChangeOp::Insert, id, &json!({}))));
}

#[tokio::test]
async fn cache_starts_cold_and_serves_stored_value() {
    let cache = StatsCache::new();
    let now = Utc::now();
    assert!(cache.fresh(now).await.is_none());

    let stats = DashboardStats { active_projects: 3, open_issues: 1, computed_at: now, ..DashboardStats::default() };
    cache.store(stats.clone()).await;
    assert_eq!(cache.clone().fresh(now).await, Some(stats.clone()));

    // A valid snapshot never touches the pool.
    let state = crate::state::test_helpers::test_app_state();
    assert_eq!(cache.get_or_refresh(&state.pool).await.expect("cached"), stats);
}

#[tokio::test]
async fn snapshot_from_an_earlier_day_is_stale() {
    let cache = StatsCache::new();
    let now = Utc::now();
    let yesterday = DashboardStats { completed_today: 7, computed_at: now - chrono::Duration::hours(26), ..DashboardStats::default() };
    cache.store(yesterday).await;
    assert!(cache.fresh(now).await.is_none());
}

#[tokio::test]
async fn invalidate_drops_the_snapshot_for_every_clone() {
    let cache = StatsCache::new();
    let now = Utc::now();
    cache.store(DashboardStats { active_projects: 2, computed_at: now, ..DashboardStats::default() }).await;

    let handler_view = cache.clone();
    cache.invalidate();
    assert!(handler_view.fresh(now).await.is_none());

    // A snapshot stored after the write is valid again.
    handler_view.store(DashboardStats { active_projects: 3, computed_at: now, ..DashboardStats::default() }).await;
    assert_eq!(cache.fresh(now).await.map(|s| s.active_projects), Some(3));
}

#[cfg(feature = "live-db-tests")]
#[tokio::test]
#[ignore = "requires TEST_DATABASE_URL/live Postgres"]
async fn dashboard_counts_match_rows() {
    use crate::state::test_helpers;

    let pool = test_helpers::integration_pool().await;
    let worker_id = test_helpers::insert_profile(&pool, "obrero@alaobra.com", UserRole::Worker).await;
    test_helpers::insert_profile(&pool, "admin@alaobra.com", UserRole::Admin).await;
    let project = test_helpers::insert_project(&pool, "Casa", None).await;
    test_helpers::insert_project(&pool, "Edificio", None).await;
    test_helpers::insert_task(&pool, project, Some(worker_id), TaskStatus::Review).await;
    test_helpers::insert_task(&pool, project, Some(worker_id), TaskStatus::Pending).await;
    sqlx::query("UPDATE projects SET progress_percentage = 40 WHERE id = $1")
        .bind(project)
        .execute(&pool)
        .await
        .expect("progress");

    let stats = dashboard_stats(&pool, Utc::now()).await.expect("stats");
    assert_eq!(stats.active_projects, 2);
    assert_eq!(stats.total_workers, 1);
    assert_eq!(stats.pending_reviews, 1);
    assert_eq!(stats.active_check_ins, 0);
    assert_eq!(stats.completed_today, 0);
    assert!((stats.average_progress - 20.0).abs() < f64::EPSILON);

    let per_worker = worker_stats(&pool).await.expect("worker stats");
    assert_eq!(per_worker.len(), 1);
    assert_eq!(per_worker[0].total_tasks, 2);
}
