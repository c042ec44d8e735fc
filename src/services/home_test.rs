use super::*;
use uuid::Uuid;

fn user() -> SessionUser {
    SessionUser { id: Uuid::new_v4(), email: "someone@alaobra.com".into() }
}

fn profile(role: UserRole, is_active: bool) -> Profile {
    Profile {
        id: Uuid::new_v4(),
        full_name: "Someone".into(),
        role,
        phone: None,
        avatar_url: None,
        rating: 0.0,
        total_ratings: 0,
        is_active,
        created_at: Utc::now(),
    }
}

#[test]
fn view_follows_role() {
    let u = user();
    assert_eq!(select_view(Some(&u), Some(&profile(UserRole::Admin, true))), View::Admin);
    assert_eq!(select_view(Some(&u), Some(&profile(UserRole::Worker, true))), View::Worker);
    assert_eq!(select_view(Some(&u), Some(&profile(UserRole::Client, true))), View::Client);
}

#[test]
fn missing_session_or_profile_means_login() {
    let u = user();
    assert_eq!(select_view(None, None), View::Login);
    assert_eq!(select_view(Some(&u), None), View::Login);
    assert_eq!(select_view(None, Some(&profile(UserRole::Admin, true))), View::Login);
}

#[test]
fn inactive_profile_means_login() {
    assert_eq!(select_view(Some(&user()), Some(&profile(UserRole::Admin, false))), View::Login);
}

#[tokio::test]
async fn login_home_needs_no_database() {
    let state = crate::state::test_helpers::test_app_state();
    let home = load_home(&state.pool, &state.stats, None, None, Utc::now()).await.expect("home");
    assert_eq!(home, Home::Login);
    assert_eq!(serde_json::to_value(&home).expect("json")["view"], "login");
}
