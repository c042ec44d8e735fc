use super::*;
use serde_json::json;

fn task_change(op: ChangeOp, assigned_to: Uuid, project_id: Uuid) -> Change {
    let id = Uuid::new_v4();
    Change::new(
        Table::Tasks,
        op,
        id,
        &json!({ "id": id, "assigned_to": assigned_to, "project_id": project_id, "status": "in_progress" }),
    )
}

// =============================================================================
// TABLES & FRAMES
// =============================================================================

#[test]
fn table_names_round_trip() {
    for table in Table::ALL {
        assert_eq!(Table::parse(table.as_str()), Some(table));
    }
    assert_eq!(Table::parse("accounts"), None);
    assert_eq!(Table::parse("sessions"), None);
}

#[test]
fn change_frame_carries_row_keyed_by_id() {
    let change = task_change(ChangeOp::Update, Uuid::new_v4(), Uuid::new_v4());
    let sub = Uuid::new_v4();
    let frame = change.to_frame(&[sub]);
    assert_eq!(frame.syscall, "change:update");
    assert_eq!(frame.data_str("table"), Some("tasks"));
    assert_eq!(frame.data_str("id"), Some(change.id.to_string().as_str()));
    assert_eq!(frame.data["row"]["status"], "in_progress");
    assert_eq!(frame.data["subscriptions"][0], sub.to_string());
}

#[test]
fn resync_frame_reports_skipped() {
    let frame = resync_frame(7);
    assert_eq!(frame.syscall, "change:resync");
    assert_eq!(frame.data["skipped"], 7);
}

// =============================================================================
// HUB
// =============================================================================

#[tokio::test]
async fn hub_fans_out_to_every_receiver() {
    let hub = ChangeHub::new(8);
    let mut a = hub.subscribe();
    let mut b = hub.subscribe();
    let change = task_change(ChangeOp::Insert, Uuid::new_v4(), Uuid::new_v4());

    assert_eq!(hub.publish(change.clone()), 2);
    assert_eq!(*a.recv().await.expect("a"), change);
    assert_eq!(*b.recv().await.expect("b"), change);
}

#[test]
fn publish_without_receivers_is_not_an_error() {
    let hub = ChangeHub::new(8);
    assert_eq!(hub.publish(task_change(ChangeOp::Insert, Uuid::new_v4(), Uuid::new_v4())), 0);
}

#[tokio::test]
async fn slow_receiver_observes_lag() {
    let hub = ChangeHub::new(2);
    let mut rx = hub.subscribe();
    for _ in 0..5 {
        hub.publish(task_change(ChangeOp::Insert, Uuid::new_v4(), Uuid::new_v4()));
    }
    assert!(matches!(rx.recv().await, Err(broadcast::error::RecvError::Lagged(3))));
}

// =============================================================================
// SUBSCRIPTIONS
// =============================================================================

#[test]
fn subscription_matches_table_and_filter() {
    let worker = Uuid::new_v4();
    let project = Uuid::new_v4();
    let mut subs = Subscriptions::new(Scope::Admin);
    let sub_id = subs
        .subscribe("tasks", Some(Filter { column: "project_id".into(), value: json!(project.to_string()) }))
        .expect("subscribe")
        .id;

    let frame = subs.frame_for(&task_change(ChangeOp::Update, worker, project)).expect("matching change");
    assert_eq!(frame.data["subscriptions"][0], sub_id.to_string());

    assert!(subs.frame_for(&task_change(ChangeOp::Update, worker, Uuid::new_v4())).is_none());

    let issue_id = Uuid::new_v4();
    let issue = Change::new(Table::Issues, ChangeOp::Insert, issue_id, &json!({ "project_id": project }));
    assert!(subs.frame_for(&issue).is_none());
}

#[test]
fn unsubscribe_stops_delivery() {
    let mut subs = Subscriptions::new(Scope::Admin);
    let id = subs.subscribe("tasks", None).expect("subscribe").id;
    assert_eq!(subs.list().count(), 1);

    subs.unsubscribe(id).expect("unsubscribe");
    assert!(subs.is_empty());
    assert!(subs.frame_for(&task_change(ChangeOp::Insert, Uuid::new_v4(), Uuid::new_v4())).is_none());
    assert!(matches!(subs.unsubscribe(id), Err(RealtimeError::UnknownSubscription(_))));
}

#[test]
fn subscribe_rejects_unknown_tables_and_empty_filters() {
    let mut subs = Subscriptions::new(Scope::Admin);
    assert!(matches!(subs.subscribe("accounts", None), Err(RealtimeError::UnknownTable(_))));
    assert!(matches!(
        subs.subscribe("tasks", Some(Filter { column: " ".into(), value: json!(1) })),
        Err(RealtimeError::InvalidFilter(_))
    ));
}

// =============================================================================
// ROLE SCOPING
// =============================================================================

#[test]
fn worker_only_sees_own_rows() {
    let me = Uuid::new_v4();
    let mut subs = Subscriptions::new(Scope::Worker { id: me });
    subs.subscribe("tasks", None).expect("subscribe");

    assert!(subs.frame_for(&task_change(ChangeOp::Update, me, Uuid::new_v4())).is_some());
    assert!(subs.frame_for(&task_change(ChangeOp::Update, Uuid::new_v4(), Uuid::new_v4())).is_none());
}

#[test]
fn worker_cannot_watch_projects_or_profiles() {
    let mut subs = Subscriptions::new(Scope::Worker { id: Uuid::new_v4() });
    assert_eq!(subs.subscribe("projects", None).err(), Some(RealtimeError::TableNotAllowed("projects")));
    assert_eq!(subs.subscribe("profiles", None).err(), Some(RealtimeError::TableNotAllowed("profiles")));
}

#[test]
fn client_scope_follows_owned_projects() {
    let me = Uuid::new_v4();
    let owned = Uuid::new_v4();
    let mut subs = Subscriptions::new(Scope::for_role(UserRole::Client, me, HashSet::from([owned])));
    subs.subscribe("tasks", None).expect("subscribe tasks");
    subs.subscribe("projects", None).expect("subscribe projects");
    subs.subscribe("photos", None).expect("subscribe photos");

    assert!(subs.frame_for(&task_change(ChangeOp::Insert, Uuid::new_v4(), owned)).is_some());
    assert!(subs.frame_for(&task_change(ChangeOp::Insert, Uuid::new_v4(), Uuid::new_v4())).is_none());

    let pending_photo = Change::new(
        Table::Photos,
        ChangeOp::Insert,
        Uuid::new_v4(),
        &json!({ "project_id": owned, "is_approved": false }),
    );
    assert!(subs.frame_for(&pending_photo).is_none());
    let approved_photo = Change::new(
        Table::Photos,
        ChangeOp::Update,
        Uuid::new_v4(),
        &json!({ "project_id": owned, "is_approved": true }),
    );
    assert!(subs.frame_for(&approved_photo).is_some());

    let new_project = Uuid::new_v4();
    let assigned = Change::new(Table::Projects, ChangeOp::Insert, new_project, &json!({ "client_id": me }));
    assert!(subs.frame_for(&assigned).is_some());
    assert!(subs.frame_for(&task_change(ChangeOp::Insert, Uuid::new_v4(), new_project)).is_some());

    let moved_away = Change::new(Table::Projects, ChangeOp::Update, new_project, &json!({ "client_id": Uuid::new_v4() }));
    assert!(subs.frame_for(&moved_away).is_some(), "client is told the project left");
    assert!(subs.frame_for(&task_change(ChangeOp::Insert, Uuid::new_v4(), new_project)).is_none());
}

#[tokio::test]
async fn reassignment_missed_during_lag_is_dropped_by_a_reloaded_scope() {
    let me = Uuid::new_v4();
    let project = Uuid::new_v4();
    let hub = ChangeHub::new(1);
    let mut rx = hub.subscribe();
    let mut subs = Subscriptions::new(Scope::for_role(UserRole::Client, me, HashSet::from([project])));
    subs.subscribe("tasks", None).expect("subscribe tasks");

    hub.publish(Change::new(Table::Projects, ChangeOp::Update, project, &json!({ "client_id": Uuid::new_v4() })));
    hub.publish(task_change(ChangeOp::Insert, Uuid::new_v4(), Uuid::new_v4()));
    assert!(matches!(rx.recv().await, Err(broadcast::error::RecvError::Lagged(1))));

    // The skipped reassignment never reached `observe`.
    assert!(subs.frame_for(&task_change(ChangeOp::Update, Uuid::new_v4(), project)).is_some());

    subs.replace_scope(Scope::for_role(UserRole::Client, me, HashSet::new()));
    assert!(subs.frame_for(&task_change(ChangeOp::Update, Uuid::new_v4(), project)).is_none());
    assert!(!subs.is_empty(), "subscriptions survive the reload");
}

#[test]
fn admin_scope_allows_everything() {
    let scope = Scope::for_role(UserRole::Admin, Uuid::new_v4(), HashSet::new());
    for table in Table::ALL {
        assert!(scope.can_watch(table));
    }
    assert!(scope.allows(&task_change(ChangeOp::Delete, Uuid::new_v4(), Uuid::new_v4())));
}

#[test]
fn realtime_error_codes() {
    assert_eq!(RealtimeError::TableNotAllowed("projects").error_code(), "E_FORBIDDEN");
    assert_eq!(RealtimeError::UnknownTable("x".into()).error_code(), "E_NOT_FOUND");
    assert_eq!(RealtimeError::MissingField("table").error_code(), "E_VALIDATION");
}
