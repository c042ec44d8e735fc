use super::*;
use chrono::{Duration, TimeZone};

#[test]
fn work_duration_splits_hours_and_minutes() {
    let start = Utc.with_ymd_and_hms(2026, 3, 2, 8, 0, 0).unwrap();
    let end = start + Duration::minutes(135);
    let worked = WorkDuration::between(start, end);
    assert_eq!(worked, WorkDuration { hours: 2, minutes: 15 });
    assert_eq!(worked.to_string(), "2h 15m");
}

#[test]
fn work_duration_ignores_partial_minutes_and_clock_skew() {
    let start = Utc.with_ymd_and_hms(2026, 3, 2, 8, 0, 0).unwrap();
    assert_eq!(WorkDuration::between(start, start + Duration::seconds(59)), WorkDuration { hours: 0, minutes: 0 });
    assert_eq!(WorkDuration::between(start, start - Duration::hours(1)), WorkDuration { hours: 0, minutes: 0 });
}

#[test]
fn start_of_day_is_utc_midnight() {
    let now = Utc.with_ymd_and_hms(2026, 3, 2, 17, 45, 12).unwrap();
    assert_eq!(start_of_utc_day(now), Utc.with_ymd_and_hms(2026, 3, 2, 0, 0, 0).unwrap());
}

#[test]
fn worker_home_serializes_with_state_tag() {
    let idle = WorkerHome::Idle { projects: Vec::new() };
    let json = serde_json::to_value(&idle).unwrap();
    assert_eq!(json["state"], "idle");
    assert!(json["projects"].is_array());

    let now = Utc::now();
    let working = WorkerHome::Working {
        check_in: CheckIn {
            id: Uuid::new_v4(),
            worker_id: Uuid::new_v4(),
            project_id: Uuid::new_v4(),
            check_in_time: now,
            check_out_time: None,
            notes: None,
            created_at: now,
        },
        project_name: "Casa".into(),
        elapsed: WorkDuration { hours: 1, minutes: 5 },
    };
    let json = serde_json::to_value(&working).unwrap();
    assert_eq!(json["state"], "working");
    assert_eq!(json["elapsed"]["hours"], 1);
    assert_eq!(json["project_name"], "Casa");
}

#[cfg(feature = "live-db-tests")]
#[tokio::test]
#[ignore = "requires TEST_DATABASE_URL/live Postgres"]
async fn idle_working_idle_cycle() {
    use crate::model::{TaskStatus, UserRole};
    use crate::state::test_helpers;

    let pool = test_helpers::integration_pool().await;
    let worker = test_helpers::insert_profile(&pool, "obrero@alaobra.com", UserRole::Worker).await;
    let project = test_helpers::insert_project(&pool, "Casa Norte", None).await;
    let elsewhere = test_helpers::insert_project(&pool, "Otra Obra", None).await;
    test_helpers::insert_task(&pool, project, Some(worker), TaskStatus::Pending).await;

    let WorkerHome::Idle { projects } = worker_home(&pool, worker, Utc::now()).await.expect("home") else {
        panic!("expected idle");
    };
    assert_eq!(projects.iter().map(|p| p.id).collect::<Vec<_>>(), vec![project]);

    assert!(matches!(check_in(&pool, worker, elsewhere).await, Err(ServiceError::Forbidden(_))));

    let row = check_in(&pool, worker, project).await.expect("check in");
    assert!(row.check_out_time.is_none());
    assert!(matches!(
        check_in(&pool, worker, project).await,
        Err(ServiceError::Conflict(Conflict::AlreadyCheckedIn))
    ));

    let later = Utc::now() + Duration::minutes(90);
    let WorkerHome::Working { check_in: active, elapsed, project_name } =
        worker_home(&pool, worker, later).await.expect("home")
    else {
        panic!("expected working");
    };
    assert_eq!(active.id, row.id);
    assert_eq!(project_name, "Casa Norte");
    assert!(elapsed.hours * 60 + elapsed.minutes >= 89);

    let activity = today_activity(&pool, Utc::now()).await.expect("activity");
    assert_eq!(activity.len(), 1);
    assert_eq!(activity[0].worker_name, "obrero");

    let closed = check_out(&pool, worker, Some(" Terminado ")).await.expect("check out");
    assert!(closed.check_out_time.is_some());
    assert_eq!(closed.notes.as_deref(), Some("Terminado"));
    assert!(matches!(
        check_out(&pool, worker, None).await,
        Err(ServiceError::Conflict(Conflict::NoActiveCheckIn))
    ));
    assert!(matches!(worker_home(&pool, worker, Utc::now()).await.expect("home"), WorkerHome::Idle { .. }));
}
