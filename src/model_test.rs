use super::*;

#[test]
fn enum_text_round_trips_for_every_variant() {
    for role in UserRole::ALL {
        assert_eq!(UserRole::parse(role.as_str()), Some(*role));
    }
    for status in TaskStatus::ALL {
        assert_eq!(TaskStatus::parse(status.as_str()), Some(*status));
    }
    for status in ProjectStatus::ALL {
        assert_eq!(ProjectStatus::parse(status.as_str()), Some(*status));
    }
    for severity in IssueSeverity::ALL {
        assert_eq!(IssueSeverity::parse(severity.as_str()), Some(*severity));
    }
}

#[test]
fn enum_parse_rejects_unknown_text() {
    assert_eq!(UserRole::parse("superuser"), None);
    assert_eq!(TaskStatus::parse("done"), None);
    assert_eq!(PhotoType::parse(""), None);
}

#[test]
fn serde_matches_database_text() {
    assert_eq!(serde_json::to_string(&TaskStatus::InProgress).unwrap(), "\"in_progress\"");
    assert_eq!(serde_json::to_string(&ProjectStatus::InProgress).unwrap(), "\"in_progress\"");
    let parsed: IssueSeverity = serde_json::from_str("\"critical\"").unwrap();
    assert_eq!(parsed, IssueSeverity::Critical);
}

#[test]
fn display_uses_database_text() {
    assert_eq!(TaskStatus::Review.to_string(), "review");
    assert_eq!(NotificationKind::Success.to_string(), "success");
}

#[test]
fn worker_flow_transitions_are_allowed() {
    assert!(TaskStatus::Pending.can_transition(TaskStatus::InProgress));
    assert!(TaskStatus::InProgress.can_transition(TaskStatus::Review));
    assert!(TaskStatus::Rejected.can_transition(TaskStatus::Review));
    assert!(TaskStatus::Rejected.can_transition(TaskStatus::InProgress));
}

#[test]
fn review_outcomes_only_leave_review() {
    assert!(TaskStatus::Review.can_transition(TaskStatus::Approved));
    assert!(TaskStatus::Review.can_transition(TaskStatus::Rejected));
    assert!(!TaskStatus::InProgress.can_transition(TaskStatus::Approved));
    assert!(!TaskStatus::Pending.can_transition(TaskStatus::Rejected));
}

#[test]
fn skipping_and_reopening_are_not_transitions() {
    assert!(!TaskStatus::Pending.can_transition(TaskStatus::Review));
    assert!(!TaskStatus::Approved.can_transition(TaskStatus::InProgress));
    assert!(!TaskStatus::Approved.can_transition(TaskStatus::Review));
    for status in TaskStatus::ALL {
        assert!(!status.can_transition(*status), "{status} -> {status}");
    }
}

#[test]
fn active_project_statuses() {
    assert!(ProjectStatus::ACTIVE.contains(&ProjectStatus::Planning));
    assert!(ProjectStatus::ACTIVE.contains(&ProjectStatus::InProgress));
    assert!(!ProjectStatus::ACTIVE.contains(&ProjectStatus::Paused));
}

#[test]
fn defaults_match_form_defaults() {
    assert_eq!(Priority::default(), Priority::Medium);
    assert_eq!(IssueSeverity::default(), IssueSeverity::Medium);
    assert_eq!(PhotoType::default(), PhotoType::Progress);
}

#[test]
fn notification_kind_serializes_as_type() {
    let notification = Notification {
        id: Uuid::nil(),
        user_id: Uuid::nil(),
        title: "t".into(),
        message: "m".into(),
        kind: NotificationKind::Warning,
        is_read: false,
        link: None,
        created_at: Utc::now(),
    };
    let value = serde_json::to_value(&notification).unwrap();
    assert_eq!(value["type"], "warning");
    assert!(value.get("kind").is_none());
}

#[test]
fn check_in_open_until_checked_out() {
    let mut check_in = CheckIn {
        id: Uuid::new_v4(),
        worker_id: Uuid::new_v4(),
        project_id: Uuid::new_v4(),
        check_in_time: Utc::now(),
        check_out_time: None,
        notes: None,
        created_at: Utc::now(),
    };
    assert!(check_in.check_out_time.is_none());
    check_in.check_out_time = Some(Utc::now());
    assert!(check_in.check_out_time.is_some());
}

#[test]
fn nullable_distinguishes_absent_from_null() {
    #[derive(Deserialize)]
    struct Patch {
        #[serde(default, deserialize_with = "nullable")]
        client_id: Option<Option<Uuid>>,
    }

    let absent: Patch = serde_json::from_str("{}").unwrap();
    assert_eq!(absent.client_id, None);

    let cleared: Patch = serde_json::from_str(r#"{"client_id":null}"#).unwrap();
    assert_eq!(cleared.client_id, Some(None));

    let id = Uuid::new_v4();
    let set: Patch = serde_json::from_str(&format!(r#"{{"client_id":"{id}"}}"#)).unwrap();
    assert_eq!(set.client_id, Some(Some(id)));
}
