//! Test helper utilities for E2E testing

use jsonwebtoken::{encode, EncodingKey, Header};
use sqlx::PgPool;
use uuid::Uuid;

use photo_restore::services::auth::Claims;

/// Get base URL from env or default to localhost
pub fn get_base_url() -> String {
    std::env::var("API_BASE_URL").unwrap_or_else(|_| "http://localhost:3000".to_string())
}

/// Mint a bearer token for a test user, signed with the server's JWT secret
pub fn make_token(user_id: Uuid) -> String {
    let secret = std::env::var("JWT_SECRET").expect("JWT_SECRET must be set");
    let claims = Claims {
        sub: user_id,
        exp: chrono::Utc::now().timestamp() + 3600,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .expect("Failed to encode token")
}

/// Seed a fresh test user with the given credit balance
pub async fn seed_user(pool: &PgPool, credits: i32) -> Uuid {
    let user_id = Uuid::new_v4();
    sqlx::query("INSERT INTO user_credits (user_id, credits) VALUES ($1, $2)")
        .bind(user_id)
        .bind(credits)
        .execute(pool)
        .await
        .expect("Failed to seed credits");
    user_id
}

/// Remove everything the test user created
pub async fn cleanup_user(pool: &PgPool, user_id: Uuid) {
    sqlx::query("DELETE FROM photo_restorations WHERE user_id = $1")
        .bind(user_id)
        .execute(pool)
        .await
        .expect("Failed to clean up jobs");
    sqlx::query("DELETE FROM user_credits WHERE user_id = $1")
        .bind(user_id)
        .execute(pool)
        .await
        .expect("Failed to clean up credits");
}

/// A public image URL under the configured bucket prefix
pub fn test_image_url() -> String {
    let base = std::env::var("PUBLIC_BASE_URL")
        .unwrap_or_else(|_| "http://localhost:9000/restorations".to_string());
    format!(
        "{}/uploads/{}_old_photo.jpg",
        base.trim_end_matches('/'),
        Uuid::new_v4().simple()
    )
}
