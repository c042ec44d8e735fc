use super::*;
use crate::state::test_helpers;
use chrono::Utc;

fn task(status: TaskStatus, assigned_to: Option<Uuid>) -> Task {
    Task {
        id: Uuid::new_v4(),
        project_id: Uuid::new_v4(),
        title: "Alicatado baño".into(),
        description: None,
        specifications: None,
        assigned_to,
        status,
        priority: Priority::Medium,
        due_date: None,
        quality_score: None,
        review_notes: None,
        created_at: Utc::now(),
        completed_at: None,
    }
}

// =============================================================================
// RULES
// =============================================================================

#[test]
fn transitions_outside_the_workflow_are_rejected() {
    assert!(check_transition(TaskStatus::Pending, TaskStatus::InProgress).is_ok());
    assert!(check_transition(TaskStatus::Rejected, TaskStatus::Review).is_ok());
    assert!(matches!(
        check_transition(TaskStatus::Pending, TaskStatus::Approved),
        Err(ServiceError::InvalidTransition { from: TaskStatus::Pending, to: TaskStatus::Approved })
    ));
    assert!(check_transition(TaskStatus::Approved, TaskStatus::Review).is_err());
    assert!(check_transition(TaskStatus::InProgress, TaskStatus::InProgress).is_err());
}

#[test]
fn only_the_assignee_may_act() {
    let worker = Uuid::new_v4();
    assert!(check_assignee(&task(TaskStatus::Pending, Some(worker)), worker).is_ok());
    assert!(matches!(
        check_assignee(&task(TaskStatus::Pending, Some(Uuid::new_v4())), worker),
        Err(ServiceError::Forbidden(_))
    ));
    assert!(check_assignee(&task(TaskStatus::Pending, None), worker).is_err());
}

#[test]
fn quality_score_bounds() {
    assert!(check_quality_score(0).is_ok());
    assert!(check_quality_score(10).is_ok());
    assert!(check_quality_score(11).is_err());
    assert!(check_quality_score(-1).is_err());
}

#[test]
fn rejection_requires_notes() {
    assert_eq!(
        rejection_notes(&Rejection { review_notes: "   ".into() }),
        Err(ValidationError::RejectionNotesRequired)
    );
    assert_eq!(rejection_notes(&Rejection { review_notes: " Falta sellado ".into() }), Ok("Falta sellado".into()));
}

#[test]
fn rejection_body_without_notes_deserializes_to_empty() {
    let rejection: Rejection = serde_json::from_str("{}").expect("deserialize");
    assert!(rejection_notes(&rejection).is_err());
}

#[test]
fn summary_serializes_flat() {
    let summary = TaskSummary {
        task: task(TaskStatus::Review, None),
        project_name: "Casa Norte".into(),
        worker_name: Some("Juan".into()),
    };
    let detail = TaskDetail { summary, photos: Vec::new() };
    let json = serde_json::to_value(&detail).unwrap();
    assert_eq!(json["title"], "Alicatado baño");
    assert_eq!(json["status"], "review");
    assert_eq!(json["project_name"], "Casa Norte");
    assert_eq!(json["worker_name"], "Juan");
    assert!(json["photos"].is_array());
}

#[tokio::test]
async fn reject_without_notes_fails_before_touching_db() {
    let state = test_helpers::test_app_state();
    let result = reject_task(&state.pool, Locale::Pt, Uuid::new_v4(), &Rejection { review_notes: String::new() }).await;
    assert!(matches!(result, Err(ServiceError::Validation(ValidationError::RejectionNotesRequired))));
}

#[tokio::test]
async fn approve_out_of_range_fails_before_touching_db() {
    let state = test_helpers::test_app_state();
    let approval = Approval { quality_score: 11, review_notes: None };
    let result = approve_task(&state.pool, Locale::Pt, Uuid::new_v4(), &approval).await;
    assert!(matches!(result, Err(ServiceError::Validation(ValidationError::OutOfRange { .. }))));
}

#[tokio::test]
async fn create_requires_title() {
    let state = test_helpers::test_app_state();
    let input = NewTask {
        project_id: Uuid::new_v4(),
        title: " ".into(),
        description: None,
        specifications: None,
        assigned_to: None,
        priority: Priority::default(),
        due_date: None,
    };
    let result = create_task(&state.pool, Locale::Pt, &input).await;
    assert!(matches!(result, Err(ServiceError::Validation(ValidationError::Required("title")))));
}

// =============================================================================
// LIVE DATABASE
// =============================================================================

#[cfg(feature = "live-db-tests")]
async fn seed_photo(pool: &PgPool, project: Uuid, task: Uuid, worker: Uuid) {
    sqlx::query("INSERT INTO photos (project_id, task_id, uploaded_by, photo_url) VALUES ($1, $2, $3, '/media/x.jpg')")
        .bind(project)
        .bind(task)
        .bind(worker)
        .execute(pool)
        .await
        .expect("seed photo");
}

#[cfg(feature = "live-db-tests")]
#[tokio::test]
#[ignore = "requires TEST_DATABASE_URL/live Postgres"]
async fn full_workflow_with_notifications() {
    use crate::model::UserRole;

    let pool = test_helpers::integration_pool().await;
    let client = test_helpers::insert_profile(&pool, "cliente@alaobra.com", UserRole::Client).await;
    let worker = test_helpers::insert_profile(&pool, "obrero@alaobra.com", UserRole::Worker).await;
    let project = test_helpers::insert_project(&pool, "Casa Norte", Some(client)).await;

    let input = NewTask {
        project_id: project,
        title: "Pintar fachada".into(),
        description: None,
        specifications: None,
        assigned_to: Some(worker),
        priority: Priority::High,
        due_date: None,
    };
    let created = create_task(&pool, Locale::Pt, &input).await.expect("create");
    assert_eq!(created.value.status, TaskStatus::Pending);
    assert_eq!(created.notifications.len(), 1);
    assert_eq!(created.notifications[0].user_id, worker);
    let id = created.value.id;

    let other = test_helpers::insert_profile(&pool, "otro@alaobra.com", UserRole::Worker).await;
    assert!(matches!(start_task(&pool, other, id).await, Err(ServiceError::Forbidden(_))));

    let started = start_task(&pool, worker, id).await.expect("start");
    assert_eq!(started.status, TaskStatus::InProgress);
    assert!(matches!(start_task(&pool, worker, id).await, Err(ServiceError::InvalidTransition { .. })));

    let blocked = submit_task(&pool, Locale::Pt, worker, id).await;
    assert!(matches!(blocked, Err(ServiceError::Validation(ValidationError::PhotoRequired))));
    assert_eq!(get_task(&pool, id).await.expect("get").status, TaskStatus::InProgress);

    seed_photo(&pool, project, id, worker).await;
    let submitted = submit_task(&pool, Locale::Pt, worker, id).await.expect("submit");
    assert_eq!(submitted.value.status, TaskStatus::Review);
    assert_eq!(submitted.notifications[0].user_id, client);

    let queue = review_queue(&pool, REVIEW_QUEUE_LIMIT).await.expect("queue");
    assert_eq!(queue.len(), 1);
    assert_eq!(queue[0].photos.len(), 1);
    assert_eq!(queue[0].summary.worker_name.as_deref(), Some("obrero"));

    let rejected = reject_task(&pool, Locale::Pt, id, &Rejection { review_notes: "Falta segunda mano".into() })
        .await
        .expect("reject");
    assert_eq!(rejected.value.status, TaskStatus::Rejected);
    assert_eq!(rejected.value.review_notes.as_deref(), Some("Falta segunda mano"));

    submit_task(&pool, Locale::Pt, worker, id).await.expect("resubmit");
    let approved = approve_task(&pool, Locale::Pt, id, &Approval { quality_score: 8, review_notes: None })
        .await
        .expect("approve");
    assert_eq!(approved.value.status, TaskStatus::Approved);
    assert_eq!(approved.value.quality_score, Some(8));
    assert!(approved.value.completed_at.is_some());
    assert_eq!(approved.notifications[0].kind, crate::model::NotificationKind::Success);

    let approved_photos: bool = sqlx::query_scalar("SELECT bool_and(is_approved) FROM photos WHERE task_id = $1")
        .bind(id)
        .fetch_one(&pool)
        .await
        .expect("photos");
    assert!(approved_photos);

    let (rating, total): (f64, i32) = sqlx::query_as("SELECT rating, total_ratings FROM profiles WHERE id = $1")
        .bind(worker)
        .fetch_one(&pool)
        .await
        .expect("rating");
    assert!((rating - 8.0).abs() < f64::EPSILON);
    assert_eq!(total, 1);

    let again = approve_task(&pool, Locale::Pt, id, &Approval { quality_score: 9, review_notes: None }).await;
    assert!(matches!(again, Err(ServiceError::InvalidTransition { .. })));
}

#[cfg(feature = "live-db-tests")]
#[tokio::test]
#[ignore = "requires TEST_DATABASE_URL/live Postgres"]
async fn admin_edit_may_set_any_status() {
    let pool = test_helpers::integration_pool().await;
    let project = test_helpers::insert_project(&pool, "Obra", None).await;
    let id = test_helpers::insert_task(&pool, project, None, TaskStatus::Pending).await;

    let patch = TaskPatch { status: Some(TaskStatus::Approved), ..Default::default() };
    let updated = update_task(&pool, id, &patch).await.expect("update");
    assert_eq!(updated.status, TaskStatus::Approved);
    assert!(updated.completed_at.is_some());

    let patch = TaskPatch { status: Some(TaskStatus::Pending), due_date: Some(None), ..Default::default() };
    let reopened = update_task(&pool, id, &patch).await.expect("reopen");
    assert!(reopened.completed_at.is_none());

    delete_task(&pool, id).await.expect("delete");
    assert!(matches!(get_task(&pool, id).await, Err(ServiceError::NotFound { .. })));
}
