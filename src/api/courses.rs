//! Course catalogue API endpoints.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::db::{Course, CreateCourseRequest, Material, User};
use crate::AppState;

use super::error::{ApiError, ValidationErrorBuilder};
use super::validation::{
    validate_course_code, validate_description, validate_title, validate_uuid,
};

fn validate_create_request(req: &CreateCourseRequest) -> Result<(), ApiError> {
    let mut errors = ValidationErrorBuilder::new();

    if let Err(e) = validate_title(&req.title) {
        errors.add("title", e);
    }
    if let Err(e) = validate_course_code(&req.code) {
        errors.add("code", e);
    }
    if let Err(e) = validate_description(&req.description) {
        errors.add("description", e);
    }

    errors.finish()
}

pub async fn list_courses(State(state): State<Arc<AppState>>) -> Result<Json<Vec<Course>>, ApiError> {
    let courses = sqlx::query_as::<_, Course>("SELECT * FROM courses ORDER BY code")
        .fetch_all(&state.db)
        .await?;

    Ok(Json(courses))
}

pub async fn get_course(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Course>, ApiError> {
    if let Err(e) = validate_uuid(&id, "course_id") {
        return Err(ApiError::validation_field("course_id", e));
    }

    let course = sqlx::query_as::<_, Course>("SELECT * FROM courses WHERE id = ?")
        .bind(&id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| ApiError::not_found("Course not found"))?;

    Ok(Json(course))
}

pub async fn create_course(
    State(state): State<Arc<AppState>>,
    user: User,
    Json(req): Json<CreateCourseRequest>,
) -> Result<(StatusCode, Json<Course>), ApiError> {
    if !user.role_enum().can_manage_courses() {
        return Err(ApiError::forbidden("Only admins can create courses"));
    }

    validate_create_request(&req)?;

    let id = Uuid::new_v4().to_string();
    let now = chrono::Utc::now().to_rfc3339();

    sqlx::query(
        "INSERT INTO courses (id, title, code, description, created_at) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(req.title.trim())
    .bind(&req.code)
    .bind(&req.description)
    .bind(&now)
    .execute(&state.db)
    .await
    .map_err(|e| {
        if e.to_string().contains("UNIQUE constraint failed") {
            ApiError::conflict("A course with this code already exists")
        } else {
            tracing::error!("Failed to create course: {}", e);
            ApiError::database("Failed to create course")
        }
    })?;

    tracing::info!(course_id = %id, code = %req.code, "Course created");

    let course = sqlx::query_as::<_, Course>("SELECT * FROM courses WHERE id = ?")
        .bind(&id)
        .fetch_one(&state.db)
        .await?;

    Ok((StatusCode::CREATED, Json(course)))
}

/// Delete a course along with its materials and their stored files
pub async fn delete_course(
    State(state): State<Arc<AppState>>,
    user: User,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    if !user.role_enum().can_manage_courses() {
        return Err(ApiError::forbidden("Only admins can delete courses"));
    }

    if let Err(e) = validate_uuid(&id, "course_id") {
        return Err(ApiError::validation_field("course_id", e));
    }

    let course: Option<Course> = sqlx::query_as("SELECT * FROM courses WHERE id = ?")
        .bind(&id)
        .fetch_optional(&state.db)
        .await?;
    let course = course.ok_or_else(|| ApiError::not_found("Course not found"))?;

    // Collect the blobs before the cascade removes their rows
    let materials = sqlx::query_as::<_, Material>("SELECT * FROM materials WHERE course_id = ?")
        .bind(&id)
        .fetch_all(&state.db)
        .await?;

    sqlx::query("DELETE FROM courses WHERE id = ?")
        .bind(&id)
        .execute(&state.db)
        .await?;

    // A missing blob is logged, not fatal; the metadata is already gone
    for material in &materials {
        if let Err(e) = state.files.delete(&material.file_key).await {
            tracing::warn!(
                material_id = %material.id,
                key = %material.file_key,
                error = %e,
                "Failed to delete stored file during course deletion"
            );
        }
    }

    tracing::info!(
        course_id = %id,
        code = %course.code,
        materials = materials.len(),
        "Course deleted"
    );

    Ok(StatusCode::NO_CONTENT)
}
