use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{
    async_trait,
    body::Body,
    extract::{FromRequestParts, State},
    http::{request::Parts, HeaderMap, Request, StatusCode},
    middleware::Next,
    response::Response,
    Json,
};
use rand::Rng;
use sha2::{Digest, Sha256};
use std::sync::Arc;

use crate::db::{
    DbPool, LoginRequest, LoginResponse, RegisterRequest, Session, User, UserResponse, UserStatus,
};
use crate::AppState;

use super::error::{ApiError, ValidationErrorBuilder};
use super::validation::{validate_email, validate_name, validate_password, validate_uuid};

/// Hash a password using Argon2
pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let hash = argon2.hash_password(password.as_bytes(), &salt)?;
    Ok(hash.to_string())
}

/// Verify a password against a hash
pub fn verify_password(password: &str, hash: &str) -> bool {
    let parsed_hash = match PasswordHash::new(hash) {
        Ok(h) => h,
        Err(_) => return false,
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok()
}

/// Generate a random bearer token
fn generate_token() -> String {
    let mut rng = rand::rng();
    let bytes: [u8; 32] = rng.random();
    hex::encode(bytes)
}

/// Hash a token for storage; only the hash ever touches the database
fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

/// Extract the bearer token from request headers
fn extract_token(headers: &HeaderMap) -> Option<String> {
    let auth_header = headers.get("Authorization").and_then(|h| h.to_str().ok())?;
    auth_header
        .strip_prefix("Bearer ")
        .map(|token| token.to_string())
}

/// Create a session for a user and return the raw token
async fn create_session(db: &DbPool, user_id: &str, ttl_days: i64) -> Result<String, ApiError> {
    let token = generate_token();
    let token_hash = hash_token(&token);

    let expires_at = chrono::Utc::now()
        .checked_add_signed(chrono::Duration::days(ttl_days))
        .ok_or_else(|| ApiError::internal("Invalid session expiry"))?
        .to_rfc3339();

    let session_id = uuid::Uuid::new_v4().to_string();
    sqlx::query("INSERT INTO sessions (id, user_id, token_hash, expires_at) VALUES (?, ?, ?, ?)")
        .bind(&session_id)
        .bind(user_id)
        .bind(&token_hash)
        .bind(&expires_at)
        .execute(db)
        .await?;

    Ok(token)
}

/// Delete sessions whose expiry has passed. Only logout and rejection remove
/// rows otherwise, so this runs at startup and before each login to keep the
/// table from accumulating dead sessions.
pub async fn purge_expired_sessions(db: &DbPool) -> Result<u64, sqlx::Error> {
    let now = chrono::Utc::now().to_rfc3339();
    let result = sqlx::query("DELETE FROM sessions WHERE expires_at <= ?")
        .bind(&now)
        .execute(db)
        .await?;
    Ok(result.rows_affected())
}

/// Register a new account.
///
/// All registrations create a student in `pending` status; the account is
/// unusable until an admin approves it, so there is no auto-login.
pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(request): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<UserResponse>), ApiError> {
    let mut errors = ValidationErrorBuilder::new();
    if let Err(e) = validate_name(&request.name) {
        errors.add("name", e);
    }
    if let Err(e) = validate_email(&request.email) {
        errors.add("email", e);
    }
    if let Err(e) = validate_password(&request.password) {
        errors.add("password", e);
    }
    if let Some(course_id) = &request.course_id {
        if let Err(e) = validate_uuid(course_id, "course_id") {
            errors.add("course_id", e);
        }
    }
    errors.finish()?;

    // The selected course must exist
    if let Some(course_id) = &request.course_id {
        let exists: Option<(String,)> = sqlx::query_as("SELECT id FROM courses WHERE id = ?")
            .bind(course_id)
            .fetch_optional(&state.db)
            .await?;
        if exists.is_none() {
            return Err(ApiError::validation_field(
                "course_id",
                "Selected course does not exist",
            ));
        }
    }

    let existing: Option<(String,)> = sqlx::query_as("SELECT id FROM users WHERE email = ?")
        .bind(&request.email)
        .fetch_optional(&state.db)
        .await?;
    if existing.is_some() {
        return Err(ApiError::conflict("An account with this email already exists"));
    }

    let id = uuid::Uuid::new_v4().to_string();
    let now = chrono::Utc::now().to_rfc3339();
    let password_hash = hash_password(&request.password)
        .map_err(|e| ApiError::internal(format!("Failed to hash password: {}", e)))?;

    sqlx::query(
        r#"
        INSERT INTO users (id, name, email, password_hash, role, status, course_id, created_at, updated_at)
        VALUES (?, ?, ?, ?, 'student', 'pending', ?, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(request.name.trim())
    .bind(&request.email)
    .bind(&password_hash)
    .bind(&request.course_id)
    .bind(&now)
    .bind(&now)
    .execute(&state.db)
    .await?;

    tracing::info!(email = %request.email, "New registration pending approval");

    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
        .bind(&id)
        .fetch_one(&state.db)
        .await?;

    Ok((StatusCode::CREATED, Json(UserResponse::from(user))))
}

/// Login endpoint
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let user: Option<User> = sqlx::query_as("SELECT * FROM users WHERE email = ?")
        .bind(&request.email)
        .fetch_optional(&state.db)
        .await?;

    let user = user.ok_or_else(|| ApiError::unauthorized("Invalid credentials"))?;

    if !verify_password(&request.password, &user.password_hash) {
        return Err(ApiError::unauthorized("Invalid credentials"));
    }

    // Credentials are right, but the account may not be usable yet
    match user.status_enum() {
        UserStatus::Pending => return Err(ApiError::forbidden("Account pending approval")),
        UserStatus::Rejected => return Err(ApiError::forbidden("Account request rejected")),
        UserStatus::Active => {}
    }

    // A failed purge must not block the login itself
    if let Err(e) = purge_expired_sessions(&state.db).await {
        tracing::warn!(error = %e, "Failed to purge expired sessions");
    }

    let token = create_session(&state.db, &user.id, state.config.auth.session_ttl_days).await?;

    tracing::info!(user_id = %user.id, "User logged in");

    Ok(Json(LoginResponse {
        token,
        user: UserResponse::from(user),
    }))
}

/// Logout endpoint; invalidates the presented session
pub async fn logout(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<StatusCode, ApiError> {
    let token =
        extract_token(&headers).ok_or_else(|| ApiError::unauthorized("Missing bearer token"))?;
    let token_hash = hash_token(&token);

    sqlx::query("DELETE FROM sessions WHERE token_hash = ?")
        .bind(&token_hash)
        .execute(&state.db)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

/// Return the authenticated user
pub async fn me(user: User) -> Json<UserResponse> {
    Json(UserResponse::from(user))
}

/// Auth middleware that validates session tokens
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_token(request.headers())
        .ok_or_else(|| ApiError::unauthorized("Missing bearer token"))?;

    let token_hash = hash_token(&token);
    let session: Option<Session> = sqlx::query_as(
        "SELECT * FROM sessions WHERE token_hash = ? AND expires_at > datetime('now')",
    )
    .bind(&token_hash)
    .fetch_optional(&state.db)
    .await?;

    match session {
        Some(_) => Ok(next.run(request).await),
        None => Err(ApiError::unauthorized("Invalid or expired session")),
    }
}

/// Get the current user from a token
pub async fn get_current_user(pool: &DbPool, token: &str) -> Result<User, ApiError> {
    let token_hash = hash_token(token);
    let session: Option<Session> = sqlx::query_as(
        "SELECT * FROM sessions WHERE token_hash = ? AND expires_at > datetime('now')",
    )
    .bind(&token_hash)
    .fetch_optional(pool)
    .await?;

    let session = session.ok_or_else(|| ApiError::unauthorized("Invalid or expired session"))?;

    let user: Option<User> = sqlx::query_as("SELECT * FROM users WHERE id = ?")
        .bind(&session.user_id)
        .fetch_optional(pool)
        .await?;

    let user = user.ok_or_else(|| ApiError::unauthorized("Invalid or expired session"))?;

    // A rejected account loses access even with a live session
    if user.status_enum() != UserStatus::Active {
        return Err(ApiError::unauthorized("Account is not active"));
    }

    Ok(user)
}

/// Extractor for getting the current authenticated user from a request
#[async_trait]
impl FromRequestParts<Arc<AppState>> for User {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = extract_token(&parts.headers)
            .ok_or_else(|| ApiError::unauthorized("Missing bearer token"))?;
        get_current_user(&state.db, &token).await
    }
}

/// Ensure the configured admin account exists. Runs at startup; if no
/// password was configured one is generated and logged once.
pub async fn ensure_admin_user(
    db: &DbPool,
    admin_email: &str,
    admin_password: Option<&str>,
) -> anyhow::Result<()> {
    let existing: Option<(String,)> =
        sqlx::query_as("SELECT id FROM users WHERE role = 'admin' LIMIT 1")
            .fetch_optional(db)
            .await?;
    if existing.is_some() {
        return Ok(());
    }

    let generated;
    let password = match admin_password {
        Some(p) => p,
        None => {
            let mut rng = rand::rng();
            let bytes: [u8; 12] = rng.random();
            generated = hex::encode(bytes);
            tracing::warn!("Generated admin password: {}", generated);
            &generated
        }
    };

    let id = uuid::Uuid::new_v4().to_string();
    let now = chrono::Utc::now().to_rfc3339();
    let password_hash =
        hash_password(password).map_err(|e| anyhow::anyhow!("Failed to hash password: {}", e))?;

    sqlx::query(
        r#"
        INSERT INTO users (id, name, email, password_hash, role, status, course_id, created_at, updated_at)
        VALUES (?, 'Administrator', ?, ?, 'admin', 'active', NULL, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(admin_email)
    .bind(&password_hash)
    .bind(&now)
    .bind(&now)
    .execute(db)
    .await?;

    tracing::info!(email = %admin_email, "Created admin user");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util;
    use axum::response::IntoResponse;

    #[test]
    fn test_password_hash_roundtrip() {
        let hash = hash_password("correct horse battery").unwrap();
        assert!(verify_password("correct horse battery", &hash));
        assert!(!verify_password("wrong password", &hash));
    }

    #[test]
    fn test_verify_rejects_malformed_hash() {
        assert!(!verify_password("anything", "not-a-phc-string"));
    }

    #[test]
    fn test_token_hash_is_stable_and_opaque() {
        let token = "abcdef0123456789";
        assert_eq!(hash_token(token), hash_token(token));
        assert_ne!(hash_token(token), token);
        assert_eq!(hash_token(token).len(), 64);
    }

    fn register_request(email: &str) -> RegisterRequest {
        RegisterRequest {
            name: "Ada Lovelace".to_string(),
            email: email.to_string(),
            password: "longenough".to_string(),
            course_id: None,
        }
    }

    fn login_request(email: &str) -> LoginRequest {
        LoginRequest {
            email: email.to_string(),
            password: "longenough".to_string(),
        }
    }

    #[tokio::test]
    async fn test_register_duplicate_email_conflicts() {
        let (_dir, state) = test_util::test_state(|_| {}).await;
        register(
            State(state.clone()),
            Json(register_request("ada@example.com")),
        )
        .await
        .unwrap();

        let err = register(State(state), Json(register_request("ada@example.com")))
            .await
            .unwrap_err();
        assert_eq!(err.into_response().status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_login_pending_account_is_forbidden() {
        let (_dir, state) = test_util::test_state(|_| {}).await;
        register(
            State(state.clone()),
            Json(register_request("new@example.com")),
        )
        .await
        .unwrap();

        let err = login(State(state), Json(login_request("new@example.com")))
            .await
            .unwrap_err();
        let message = err.to_string();
        assert_eq!(err.into_response().status(), StatusCode::FORBIDDEN);
        assert!(message.contains("pending approval"));
    }

    #[tokio::test]
    async fn test_login_rejected_account_is_forbidden() {
        let (_dir, state) = test_util::test_state(|_| {}).await;
        let (_, Json(user)) = register(
            State(state.clone()),
            Json(register_request("denied@example.com")),
        )
        .await
        .unwrap();
        sqlx::query("UPDATE users SET status = 'rejected' WHERE id = ?")
            .bind(&user.id)
            .execute(&state.db)
            .await
            .unwrap();

        let err = login(State(state), Json(login_request("denied@example.com")))
            .await
            .unwrap_err();
        let message = err.to_string();
        assert_eq!(err.into_response().status(), StatusCode::FORBIDDEN);
        assert!(message.contains("rejected"));
    }

    #[tokio::test]
    async fn test_login_active_account_gets_session() {
        let (_dir, state) = test_util::test_state(|_| {}).await;
        let (_, Json(user)) = register(
            State(state.clone()),
            Json(register_request("ok@example.com")),
        )
        .await
        .unwrap();
        sqlx::query("UPDATE users SET status = 'active' WHERE id = ?")
            .bind(&user.id)
            .execute(&state.db)
            .await
            .unwrap();

        let response = login(State(state.clone()), Json(login_request("ok@example.com")))
            .await
            .unwrap();
        assert_eq!(response.0.token.len(), 64);

        let sessions: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM sessions")
            .fetch_one(&state.db)
            .await
            .unwrap();
        assert_eq!(sessions.0, 1);
    }

    #[tokio::test]
    async fn test_expired_session_does_not_authenticate() {
        let (_dir, state) = test_util::test_state(|_| {}).await;
        let user = test_util::seed_user(&state.db, "student", "active").await;
        let token = "deadbeefdeadbeef";
        sqlx::query(
            "INSERT INTO sessions (id, user_id, token_hash, expires_at) VALUES ('s1', ?, ?, '2000-01-01 00:00:00')",
        )
        .bind(&user.id)
        .bind(hash_token(token))
        .execute(&state.db)
        .await
        .unwrap();

        let err = get_current_user(&state.db, token).await.unwrap_err();
        assert_eq!(err.into_response().status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_purge_expired_sessions_keeps_live_ones() {
        let (_dir, state) = test_util::test_state(|_| {}).await;
        let user = test_util::seed_user(&state.db, "student", "active").await;

        let expired = (chrono::Utc::now() - chrono::Duration::days(1)).to_rfc3339();
        sqlx::query(
            "INSERT INTO sessions (id, user_id, token_hash, expires_at) VALUES ('s1', ?, 'old-hash', ?)",
        )
        .bind(&user.id)
        .bind(&expired)
        .execute(&state.db)
        .await
        .unwrap();
        let _live = test_util::seed_session(&state.db, &user.id).await;

        let purged = purge_expired_sessions(&state.db).await.unwrap();
        assert_eq!(purged, 1);

        let remaining: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM sessions")
            .fetch_one(&state.db)
            .await
            .unwrap();
        assert_eq!(remaining.0, 1);
    }
}
