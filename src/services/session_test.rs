use super::*;

// =============================================================================
// bytes_to_hex
// =============================================================================

#[test]
fn bytes_to_hex_empty() {
    assert_eq!(bytes_to_hex(&[]), "");
}

#[test]
fn bytes_to_hex_leading_zero() {
    assert_eq!(bytes_to_hex(&[0x0a]), "0a");
}

#[test]
fn bytes_to_hex_multi_byte() {
    assert_eq!(bytes_to_hex(&[0xde, 0xad, 0xbe, 0xef]), "deadbeef");
}

// =============================================================================
// generate_token / generate_ws_ticket
// =============================================================================

#[test]
fn generate_token_is_64_hex_chars() {
    let token = generate_token();
    assert_eq!(token.len(), 64);
    assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
}

#[test]
fn generate_token_two_calls_differ() {
    assert_ne!(generate_token(), generate_token());
}

#[test]
fn generate_ws_ticket_is_32_hex_chars() {
    let ticket = generate_ws_ticket();
    assert_eq!(ticket.len(), 32);
    assert!(ticket.chars().all(|c| c.is_ascii_hexdigit()));
}

// =============================================================================
// hash_token
// =============================================================================

#[test]
fn hash_token_is_sha256_hex() {
    assert_eq!(hash_token("abc"), "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad");
}

#[test]
fn hash_token_never_equals_token() {
    let token = generate_token();
    let hashed = hash_token(&token);
    assert_eq!(hashed.len(), 64);
    assert_ne!(hashed, token);
    assert_eq!(hashed, hash_token(&token));
}

// =============================================================================
// SessionUser
// =============================================================================

#[test]
fn session_user_serializes_id_and_email() {
    let user = SessionUser { id: Uuid::nil(), email: "admin@alaobra.com".into() };
    let json = serde_json::to_value(&user).unwrap();
    assert_eq!(json["email"], "admin@alaobra.com");
    assert_eq!(json["id"], Uuid::nil().to_string());
}

// =============================================================================
// LIVE DATABASE
// =============================================================================

#[cfg(feature = "live-db-tests")]
#[tokio::test]
#[ignore = "requires TEST_DATABASE_URL/live Postgres"]
async fn session_and_ticket_lifecycle() {
    let pool = crate::state::test_helpers::integration_pool().await;
    let account = crate::state::test_helpers::insert_account(&pool, "session@alaobra.com").await;

    let token = create_session(&pool, account, 1).await.expect("create session");
    let user = validate_session(&pool, &token).await.expect("validate").expect("session exists");
    assert_eq!(user.id, account);
    assert_eq!(user.email, "session@alaobra.com");

    let stored: String = sqlx::query_scalar("SELECT token_hash FROM sessions WHERE account_id = $1")
        .bind(account)
        .fetch_one(&pool)
        .await
        .expect("stored row");
    assert_eq!(stored, hash_token(&token));

    delete_session(&pool, &token).await.expect("delete");
    assert!(validate_session(&pool, &token).await.expect("validate").is_none());

    let ticket = create_ws_ticket(&pool, account).await.expect("ticket");
    assert_eq!(consume_ws_ticket(&pool, &ticket).await.expect("consume"), Some(account));
    assert_eq!(consume_ws_ticket(&pool, &ticket).await.expect("consume again"), None);
}

#[cfg(feature = "live-db-tests")]
#[tokio::test]
#[ignore = "requires TEST_DATABASE_URL/live Postgres"]
async fn expired_sessions_are_rejected_and_purged() {
    let pool = crate::state::test_helpers::integration_pool().await;
    let account = crate::state::test_helpers::insert_account(&pool, "expired@alaobra.com").await;

    let token = create_session(&pool, account, -1).await.expect("create session");
    assert!(validate_session(&pool, &token).await.expect("validate").is_none());
    assert!(purge_expired(&pool).await.expect("purge") >= 1);
}
