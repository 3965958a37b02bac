use argon2::Argon2;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use axum::{
    Json,
    extract::State,
    http::{HeaderMap, header},
};
use chrono::Utc;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use rand_core::OsRng;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::{
    config::TOKEN_TTL_HOURS,
    web::{
        AppState,
        errors::{ApiError, ApiResult},
        responses::{ApiData, json_success},
    },
};

#[derive(Clone, sqlx::FromRow)]
pub struct AdminRow {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub password_hash: String,
}

/// Password-free projection returned to clients.
#[derive(Debug, Clone, Serialize)]
pub struct PublicUser {
    pub id: i64,
    pub username: String,
    pub email: String,
}

/// Claims embedded in every admin access token (HS256).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: i64,
    pub username: String,
    pub email: String,
    pub iat: i64,
    pub exp: i64,
}

/// Identity attached to a request after token verification.
#[derive(Debug, Clone)]
pub struct AdminUser {
    pub id: i64,
    pub username: String,
    pub email: String,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: PublicUser,
}

pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> ApiResult<Json<ApiData<LoginResponse>>> {
    let username = request.username.trim();
    if username.is_empty() || request.password.is_empty() {
        return Err(ApiError::Validation(
            "Username and password are required".into(),
        ));
    }

    let admin = fetch_admin_by_username(state.pool_ref(), username)
        .await?
        .ok_or(ApiError::InvalidCredentials)?;

    if !verify_password(&request.password, &admin.password_hash) {
        return Err(ApiError::InvalidCredentials);
    }

    let token = issue_token(&admin, &state.config().jwt_secret)?;

    Ok(json_success(LoginResponse {
        token,
        user: PublicUser {
            id: admin.id,
            username: admin.username,
            email: admin.email,
        },
    }))
}

/// Gate for protected handlers: read the bearer token from the
/// `Authorization` header and verify signature and expiry.
pub fn require_admin(state: &AppState, headers: &HeaderMap) -> Result<AdminUser, ApiError> {
    let header_value = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .ok_or(ApiError::MissingToken)?;

    let token = header_value
        .strip_prefix("Bearer ")
        .ok_or(ApiError::InvalidToken)?;

    let claims = verify_token(token, &state.config().jwt_secret)?;

    Ok(AdminUser {
        id: claims.sub,
        username: claims.username,
        email: claims.email,
    })
}

pub fn issue_token(admin: &AdminRow, secret: &str) -> Result<String, ApiError> {
    let now = Utc::now().timestamp();
    let claims = Claims {
        sub: admin.id,
        username: admin.username.clone(),
        email: admin.email.clone(),
        iat: now,
        exp: now + TOKEN_TTL_HOURS * 3600,
    };

    encode(
        &Header::default(), // HS256
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|err| ApiError::Internal(anyhow::anyhow!("failed to sign token: {err}")))
}

pub fn verify_token(token: &str, secret: &str) -> Result<Claims, ApiError> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(), // HS256, validates exp
    )
    .map(|data| data.claims)
    .map_err(|_| ApiError::InvalidToken)
}

pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
}

pub fn verify_password(password: &str, password_hash: &str) -> bool {
    match PasswordHash::new(password_hash) {
        Ok(hash) => Argon2::default()
            .verify_password(password.as_bytes(), &hash)
            .is_ok(),
        Err(_) => false,
    }
}

pub async fn fetch_admin_by_username(
    pool: &PgPool,
    username: &str,
) -> sqlx::Result<Option<AdminRow>> {
    sqlx::query_as::<_, AdminRow>(
        "SELECT id, username, email, password_hash FROM admin_users WHERE username = $1",
    )
    .bind(username)
    .fetch_optional(pool)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_admin() -> AdminRow {
        AdminRow {
            id: 7,
            username: "admin".to_string(),
            email: "admin@example.com".to_string(),
            password_hash: String::new(),
        }
    }

    #[test]
    fn issue_and_verify_roundtrip() {
        let secret = "test-secret-that-is-long-enough-for-hmac";
        let token = issue_token(&test_admin(), secret).expect("token issuance should succeed");

        let claims = verify_token(&token, secret).expect("token verification should succeed");
        assert_eq!(claims.sub, 7);
        assert_eq!(claims.username, "admin");
        assert_eq!(claims.email, "admin@example.com");
        assert_eq!(claims.exp - claims.iat, TOKEN_TTL_HOURS * 3600);
    }

    #[test]
    fn expired_token_fails() {
        let secret = "test-secret";
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: 1,
            username: "admin".to_string(),
            email: "admin@example.com".to_string(),
            iat: now - 600,
            // Expired well past jsonwebtoken's default 60-second leeway.
            exp: now - 300,
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .expect("encoding should succeed");

        assert!(matches!(
            verify_token(&token, secret),
            Err(ApiError::InvalidToken)
        ));
    }

    #[test]
    fn token_signed_with_other_secret_fails() {
        let token = issue_token(&test_admin(), "secret-alpha").expect("issuance should succeed");
        assert!(matches!(
            verify_token(&token, "secret-bravo"),
            Err(ApiError::InvalidToken)
        ));
    }

    #[test]
    fn password_hash_verifies() {
        let hash = hash_password("hunter2").expect("hashing should succeed");
        assert!(verify_password("hunter2", &hash));
        assert!(!verify_password("hunter3", &hash));
        assert!(!verify_password("hunter2", "not-a-phc-string"));
    }
}
