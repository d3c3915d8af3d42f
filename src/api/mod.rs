pub mod auth;
mod courses;
mod downloads;
mod error;
mod materials;
mod users;
mod validation;

pub use error::ApiError;

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{delete, get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    // Auth routes (public; logout validates its own token)
    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/logout", post(auth::logout));

    // Protected API routes
    let api_routes = Router::new()
        // Current user
        .route("/auth/me", get(auth::me))
        // Courses
        .route("/courses", get(courses::list_courses))
        .route("/courses", post(courses::create_course))
        .route("/courses/:id", get(courses::get_course))
        .route("/courses/:id", delete(courses::delete_course))
        .route("/courses/:id/materials", get(materials::list_course_materials))
        // Materials
        .route("/materials", get(materials::list_materials))
        .route("/materials", post(materials::upload_material))
        .route("/materials/:id", get(materials::get_material))
        .route("/materials/:id", delete(materials::delete_material))
        .route("/materials/:id/download", get(materials::download_material))
        // Admin: account approvals
        .route("/admin/users", get(users::list_users))
        .route("/admin/users/pending", get(users::list_pending_users))
        .route("/admin/users/:id/status", put(users::update_user_status))
        // Admin: download logs
        .route("/admin/downloads", get(downloads::list_logs))
        .route("/admin/downloads", delete(downloads::clear_logs))
        // Protected by auth
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::auth_middleware,
        ));

    // Leave headroom above the file limit for the other multipart fields
    let body_limit = state.config.storage.max_upload_bytes + 64 * 1024;

    Router::new()
        .route("/health", get(health_check))
        .nest("/api/auth", auth_routes)
        .nest("/api", api_routes)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check() -> &'static str {
    "OK"
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    const BOUNDARY: &str = "lectern-test-boundary";

    fn text_part(body: &mut Vec<u8>, name: &str, value: &str) {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }

    fn upload_body(course_id: &str, file_bytes: &[u8]) -> Vec<u8> {
        let mut body = Vec::new();
        text_part(&mut body, "course_id", course_id);
        text_part(&mut body, "title", "Week 1 notes");
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"notes.bin\"\r\nContent-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(file_bytes);
        body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
        body
    }

    fn upload_request(token: &str, body: Vec<u8>) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/materials")
            .header("Authorization", format!("Bearer {}", token))
            .header(
                "Content-Type",
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(body))
            .unwrap()
    }

    async fn seeded_course_id(db: &crate::db::DbPool) -> String {
        let row: (String,) = sqlx::query_as("SELECT id FROM courses LIMIT 1")
            .fetch_one(db)
            .await
            .unwrap();
        row.0
    }

    #[tokio::test]
    async fn test_protected_routes_require_token() {
        let (_dir, state) = test_util::test_state(|_| {}).await;
        let app = create_router(state);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/courses")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_upload_within_limit_succeeds() {
        let (_dir, state) =
            test_util::test_state(|c| c.storage.max_upload_bytes = 16 * 1024).await;
        let instructor = test_util::seed_user(&state.db, "instructor", "active").await;
        let token = test_util::seed_session(&state.db, &instructor.id).await;
        let course_id = seeded_course_id(&state.db).await;
        let app = create_router(state);

        let body = upload_body(&course_id, &[7u8; 1024]);
        let response = app.oneshot(upload_request(&token, body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    // A file just over the limit still fits inside the request body cap, so
    // the explicit size check is what rejects it.
    #[tokio::test]
    async fn test_upload_over_limit_is_413() {
        let (_dir, state) =
            test_util::test_state(|c| c.storage.max_upload_bytes = 16 * 1024).await;
        let instructor = test_util::seed_user(&state.db, "instructor", "active").await;
        let token = test_util::seed_session(&state.db, &instructor.id).await;
        let course_id = seeded_course_id(&state.db).await;
        let app = create_router(state);

        let body = upload_body(&course_id, &[7u8; 20 * 1024]);
        let response = app.oneshot(upload_request(&token, body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    // A file far over the limit trips the request body cap while the
    // multipart stream is still being read; that must also surface as 413
    // rather than a generic bad request.
    #[tokio::test]
    async fn test_upload_past_body_cap_is_413() {
        let (_dir, state) =
            test_util::test_state(|c| c.storage.max_upload_bytes = 16 * 1024).await;
        let instructor = test_util::seed_user(&state.db, "instructor", "active").await;
        let token = test_util::seed_session(&state.db, &instructor.id).await;
        let course_id = seeded_course_id(&state.db).await;
        let app = create_router(state);

        let body = upload_body(&course_id, &[7u8; 256 * 1024]);
        let response = app.oneshot(upload_request(&token, body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn test_download_records_log_entry() {
        let (_dir, state) = test_util::test_state(|_| {}).await;
        let instructor = test_util::seed_user(&state.db, "instructor", "active").await;
        let upload_token = test_util::seed_session(&state.db, &instructor.id).await;
        let course_id = seeded_course_id(&state.db).await;
        let app = create_router(state.clone());

        let body = upload_body(&course_id, b"lecture slides");
        let response = app
            .clone()
            .oneshot(upload_request(&upload_token, body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let material: (String,) = sqlx::query_as("SELECT id FROM materials LIMIT 1")
            .fetch_one(&state.db)
            .await
            .unwrap();

        let student = test_util::seed_user(&state.db, "student", "active").await;
        let download_token = test_util::seed_session(&state.db, &student.id).await;
        let response = app
            .oneshot(
                Request::builder()
                    .uri(format!("/api/materials/{}/download", material.0))
                    .header("Authorization", format!("Bearer {}", download_token))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let logs: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM download_logs WHERE user_id = ?")
            .bind(&student.id)
            .fetch_one(&state.db)
            .await
            .unwrap();
        assert_eq!(logs.0, 1);
    }
}
