//! Shared fixtures for handler and router tests: an in-memory database with
//! the schema applied, a throwaway `AppState`, and helpers to mint rows the
//! auth layer accepts.

use std::sync::Arc;

use rand::Rng;
use sha2::{Digest, Sha256};
use sqlx::sqlite::SqlitePoolOptions;

use crate::config::Config;
use crate::db::{self, DbPool, User};
use crate::storage::LocalStore;
use crate::AppState;

/// In-memory SQLite pool with the schema applied. A single connection keeps
/// every query on the same in-memory database.
pub(crate) async fn memory_db() -> DbPool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    sqlx::query("PRAGMA foreign_keys = ON")
        .execute(&pool)
        .await
        .unwrap();
    db::run_migrations(&pool).await.unwrap();
    pool
}

/// Build an `AppState` over a temp directory and an in-memory database. The
/// returned `TempDir` must outlive the state or the local store loses its root.
pub(crate) async fn test_state(
    tweak: impl FnOnce(&mut Config),
) -> (tempfile::TempDir, Arc<AppState>) {
    let dir = tempfile::tempdir().unwrap();
    let mut config = Config::default();
    config.server.data_dir = dir.path().to_path_buf();
    tweak(&mut config);

    let db = memory_db().await;
    let files = Arc::new(LocalStore::new(dir.path().join("files")).await.unwrap());
    let state = Arc::new(AppState::new(config, db, files));
    (dir, state)
}

/// Insert a user row directly. The password hash is a placeholder; tests that
/// exercise login go through the register handler instead.
pub(crate) async fn seed_user(db: &DbPool, role: &str, status: &str) -> User {
    let id = uuid::Uuid::new_v4().to_string();
    let now = chrono::Utc::now().to_rfc3339();
    sqlx::query(
        r#"
        INSERT INTO users (id, name, email, password_hash, role, status, course_id, created_at, updated_at)
        VALUES (?, ?, ?, 'x', ?, ?, NULL, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(format!("{} user", role))
    .bind(format!("{}@example.com", id))
    .bind(role)
    .bind(status)
    .bind(&now)
    .bind(&now)
    .execute(db)
    .await
    .unwrap();

    sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
        .bind(&id)
        .fetch_one(db)
        .await
        .unwrap()
}

/// Insert a live session for a user and return the raw bearer token.
pub(crate) async fn seed_session(db: &DbPool, user_id: &str) -> String {
    let token = hex::encode(rand::rng().random::<[u8; 16]>());
    let token_hash = hex::encode(Sha256::digest(token.as_bytes()));
    let expires_at = (chrono::Utc::now() + chrono::Duration::days(1)).to_rfc3339();
    sqlx::query("INSERT INTO sessions (id, user_id, token_hash, expires_at) VALUES (?, ?, ?, ?)")
        .bind(uuid::Uuid::new_v4().to_string())
        .bind(user_id)
        .bind(&token_hash)
        .bind(&expires_at)
        .execute(db)
        .await
        .unwrap();
    token
}
