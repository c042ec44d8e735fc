use super::*;
use crate::state::test_helpers;

fn new_project(name: &str, address: &str, budget: f64) -> NewProject {
    NewProject {
        name: name.into(),
        address: address.into(),
        client_id: None,
        description: None,
        status: None,
        start_date: None,
        expected_end_date: None,
        budget,
    }
}

#[test]
fn patch_validation_checks_ranges() {
    let patch = ProjectPatch { progress_percentage: Some(101), ..Default::default() };
    assert_eq!(
        patch.validate(),
        Err(ValidationError::OutOfRange { field: "progress_percentage", min: 0, max: 100 })
    );

    let patch = ProjectPatch { spent: Some(-5.0), ..Default::default() };
    assert_eq!(patch.validate(), Err(ValidationError::Negative("spent")));

    let patch = ProjectPatch { name: Some(" ".into()), ..Default::default() };
    assert_eq!(patch.validate(), Err(ValidationError::Required("name")));
}

#[test]
fn patch_validation_trims_text() {
    let patch = ProjectPatch {
        name: Some(" Casa Norte ".into()),
        address: Some(" Calle 1 ".into()),
        progress_percentage: Some(100),
        spent: Some(2_000.0),
        budget: Some(1_000.0),
        ..Default::default()
    };
    assert_eq!(patch.validate(), Ok((Some("Casa Norte".into()), Some("Calle 1".into()))));
}

#[test]
fn patch_distinguishes_cleared_client() {
    let patch: ProjectPatch = serde_json::from_str(r#"{"client_id":null,"spent":10}"#).expect("deserialize");
    assert_eq!(patch.client_id, Some(None));
    assert_eq!(patch.spent, Some(10.0));
    assert!(patch.expected_end_date.is_none());
}

#[tokio::test]
async fn create_requires_name_and_address() {
    let state = test_helpers::test_app_state();

    let result = create_project(&state.pool, &new_project("", "Calle 1", 0.0)).await;
    assert!(matches!(result, Err(ServiceError::Validation(ValidationError::Required("name")))));

    let result = create_project(&state.pool, &new_project("Obra", "  ", 0.0)).await;
    assert!(matches!(result, Err(ServiceError::Validation(ValidationError::Required("address")))));
}

#[tokio::test]
async fn create_rejects_negative_budget() {
    let state = test_helpers::test_app_state();
    let result = create_project(&state.pool, &new_project("Obra", "Calle 1", -1.0)).await;
    assert!(matches!(result, Err(ServiceError::Validation(ValidationError::Negative("budget")))));
}

#[cfg(feature = "live-db-tests")]
#[tokio::test]
#[ignore = "requires TEST_DATABASE_URL/live Postgres"]
async fn project_crud_round_trip() {
    let pool = test_helpers::integration_pool().await;

    let project = create_project(&pool, &new_project(" Reforma Centro ", "Av. Principal 10", 50_000.0))
        .await
        .expect("create");
    assert_eq!(project.name, "Reforma Centro");
    assert_eq!(project.status, ProjectStatus::InProgress);
    assert_eq!(project.progress_percentage, 0);

    let patch = ProjectPatch { spent: Some(60_000.0), progress_percentage: Some(40), ..Default::default() };
    let updated = update_project(&pool, project.id, &patch).await.expect("update");
    assert!((updated.spent - 60_000.0).abs() < f64::EPSILON);
    assert_eq!(updated.progress_percentage, 40);
    assert!(updated.updated_at >= project.updated_at);

    assert!(list_active_projects(&pool).await.expect("active").iter().any(|p| p.id == project.id));

    delete_project(&pool, project.id).await.expect("delete");
    assert!(!list_projects(&pool).await.expect("list").iter().any(|p| p.id == project.id));
    assert!(matches!(get_project(&pool, project.id).await, Err(ServiceError::NotFound { .. })));
}

#[cfg(feature = "live-db-tests")]
#[tokio::test]
#[ignore = "requires TEST_DATABASE_URL/live Postgres"]
async fn unknown_client_is_not_found() {
    let pool = test_helpers::integration_pool().await;
    let mut input = new_project("Obra", "Calle 1", 0.0);
    input.client_id = Some(Uuid::new_v4());
    assert!(matches!(create_project(&pool, &input).await, Err(ServiceError::NotFound { entity: "profile", .. })));
}

#[cfg(feature = "live-db-tests")]
#[tokio::test]
#[ignore = "requires TEST_DATABASE_URL/live Postgres"]
async fn client_project_ids_lists_only_owned() {
    let pool = test_helpers::integration_pool().await;
    let client = test_helpers::insert_profile(&pool, "cliente@obra.test", crate::model::UserRole::Client).await;
    let owned = test_helpers::insert_project(&pool, "Casa Azul", Some(client)).await;
    test_helpers::insert_project(&pool, "Casa Verde", None).await;

    let ids = client_project_ids(&pool, client).await.expect("ids");
    assert_eq!(ids.len(), 1);
    assert!(ids.contains(&owned));
}
