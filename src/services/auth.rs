use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::app_state::AppState;
use crate::error::ApiError;

/// JWT claims carried in every bearer token.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject -- the user's id.
    pub sub: Uuid,
    /// Expiration time (UTC Unix timestamp).
    pub exp: i64,
}

/// Validate and decode a bearer token, returning the embedded [`Claims`].
pub fn validate_token(token: &str, secret: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(), // HS256, validates exp
    )?;
    Ok(token_data.claims)
}

/// Authenticated user extracted from a JWT bearer token in the
/// `Authorization` header. Use as an extractor parameter in any handler that
/// requires authentication.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: Uuid,
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .ok_or(ApiError::Unauthorized)?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or(ApiError::Unauthorized)?;

        let claims =
            validate_token(token, &state.config.jwt_secret).map_err(|_| ApiError::Unauthorized)?;

        Ok(AuthUser {
            user_id: claims.sub,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};

    fn make_token(claims: &Claims, secret: &str) -> String {
        encode(
            &Header::default(),
            claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .expect("encoding should succeed")
    }

    #[test]
    fn test_valid_token_round_trip() {
        let user_id = Uuid::new_v4();
        let claims = Claims {
            sub: user_id,
            exp: chrono::Utc::now().timestamp() + 3600,
        };
        let token = make_token(&claims, "test-secret");

        let decoded = validate_token(&token, "test-secret").expect("validation should succeed");
        assert_eq!(decoded.sub, user_id);
    }

    #[test]
    fn test_expired_token_fails() {
        // Expired well past the default 60-second leeway.
        let claims = Claims {
            sub: Uuid::new_v4(),
            exp: chrono::Utc::now().timestamp() - 300,
        };
        let token = make_token(&claims, "test-secret");

        assert!(validate_token(&token, "test-secret").is_err());
    }

    #[test]
    fn test_wrong_secret_fails() {
        let claims = Claims {
            sub: Uuid::new_v4(),
            exp: chrono::Utc::now().timestamp() + 3600,
        };
        let token = make_token(&claims, "secret-alpha");

        assert!(validate_token(&token, "secret-bravo").is_err());
    }
}
