//! Material API endpoints: metadata CRUD, file upload and download.

use axum::{
    extract::{multipart::MultipartError, Multipart, Path, Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::IntoResponse,
    Json,
};
use bytes::Bytes;
use std::sync::Arc;
use uuid::Uuid;

use crate::db::{log_download, Course, Material, MaterialQuery, User};
use crate::storage::sanitize_file_name;
use crate::AppState;

use super::error::{ApiError, ValidationErrorBuilder};
use super::validation::{validate_description, validate_title, validate_uuid};

/// List materials, optionally filtered by course
pub async fn list_materials(
    State(state): State<Arc<AppState>>,
    Query(query): Query<MaterialQuery>,
) -> Result<Json<Vec<Material>>, ApiError> {
    let materials = match &query.course_id {
        Some(course_id) => {
            sqlx::query_as::<_, Material>(
                "SELECT * FROM materials WHERE course_id = ? ORDER BY created_at DESC",
            )
            .bind(course_id)
            .fetch_all(&state.db)
            .await?
        }
        None => {
            sqlx::query_as::<_, Material>("SELECT * FROM materials ORDER BY created_at DESC")
                .fetch_all(&state.db)
                .await?
        }
    };

    Ok(Json(materials))
}

/// List materials for a course (nested route)
pub async fn list_course_materials(
    State(state): State<Arc<AppState>>,
    Path(course_id): Path<String>,
) -> Result<Json<Vec<Material>>, ApiError> {
    if let Err(e) = validate_uuid(&course_id, "course_id") {
        return Err(ApiError::validation_field("course_id", e));
    }

    let exists: Option<(String,)> = sqlx::query_as("SELECT id FROM courses WHERE id = ?")
        .bind(&course_id)
        .fetch_optional(&state.db)
        .await?;
    if exists.is_none() {
        return Err(ApiError::not_found("Course not found"));
    }

    let materials = sqlx::query_as::<_, Material>(
        "SELECT * FROM materials WHERE course_id = ? ORDER BY created_at DESC",
    )
    .bind(&course_id)
    .fetch_all(&state.db)
    .await?;

    Ok(Json(materials))
}

pub async fn get_material(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Material>, ApiError> {
    if let Err(e) = validate_uuid(&id, "material_id") {
        return Err(ApiError::validation_field("material_id", e));
    }

    let material = sqlx::query_as::<_, Material>("SELECT * FROM materials WHERE id = ?")
        .bind(&id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| ApiError::not_found("Material not found"))?;

    Ok(Json(material))
}

/// Fields collected from the upload form
struct UploadForm {
    course_id: Option<String>,
    title: Option<String>,
    description: String,
    file_name: Option<String>,
    content_type: Option<String>,
    data: Option<Bytes>,
}

/// Map a multipart read failure. The request body cap trips inside the
/// multipart reader, so a too-large upload surfaces here as a multipart
/// error carrying a 413 status; preserve it instead of flattening to 400.
fn multipart_error(context: &str, err: MultipartError) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::payload_too_large("Upload exceeds the maximum allowed size")
    } else {
        ApiError::bad_request(format!("{}: {}", context, err))
    }
}

async fn read_upload_form(
    multipart: &mut Multipart,
    max_upload_bytes: usize,
) -> Result<UploadForm, ApiError> {
    let mut form = UploadForm {
        course_id: None,
        title: None,
        description: String::new(),
        file_name: None,
        content_type: None,
        data: None,
    };

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error("Invalid multipart payload", e))?
    {
        let name = field.name().map(|s| s.to_string());
        match name.as_deref() {
            Some("course_id") => {
                form.course_id = Some(
                    field
                        .text()
                        .await
                        .map_err(|e| multipart_error("Invalid course_id field", e))?,
                );
            }
            Some("title") => {
                form.title = Some(
                    field
                        .text()
                        .await
                        .map_err(|e| multipart_error("Invalid title field", e))?,
                );
            }
            Some("description") => {
                form.description = field
                    .text()
                    .await
                    .map_err(|e| multipart_error("Invalid description field", e))?;
            }
            Some("file") => {
                form.file_name = field.file_name().map(|s| s.to_string());
                form.content_type = field.content_type().map(|s| s.to_string());
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| multipart_error("Failed to read file", e))?;
                if data.len() > max_upload_bytes {
                    return Err(ApiError::payload_too_large(format!(
                        "File exceeds the maximum upload size of {} bytes",
                        max_upload_bytes
                    )));
                }
                form.data = Some(data);
            }
            _ => {}
        }
    }

    Ok(form)
}

/// Upload a material: multipart form with course_id, title, description and
/// the file itself. The blob goes through the storage adapter; metadata is
/// recorded here.
pub async fn upload_material(
    State(state): State<Arc<AppState>>,
    user: User,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<Material>), ApiError> {
    if !user.role_enum().can_manage_materials() {
        return Err(ApiError::forbidden(
            "Only instructors and admins can upload materials",
        ));
    }

    let form = read_upload_form(&mut multipart, state.config.storage.max_upload_bytes).await?;

    let mut errors = ValidationErrorBuilder::new();
    let course_id = form.course_id.unwrap_or_default();
    if let Err(e) = validate_uuid(&course_id, "course_id") {
        errors.add("course_id", e);
    }
    let title = form.title.unwrap_or_default();
    if let Err(e) = validate_title(&title) {
        errors.add("title", e);
    }
    if let Err(e) = validate_description(&form.description) {
        errors.add("description", e);
    }
    if form.data.is_none() {
        errors.add("file", "A file is required");
    }
    errors.finish()?;

    let data = form.data.unwrap_or_default();
    if data.is_empty() {
        return Err(ApiError::validation_field("file", "Uploaded file is empty"));
    }

    let course: Option<Course> = sqlx::query_as("SELECT * FROM courses WHERE id = ?")
        .bind(&course_id)
        .fetch_optional(&state.db)
        .await?;
    if course.is_none() {
        return Err(ApiError::not_found("Course not found"));
    }

    let file_name = sanitize_file_name(form.file_name.as_deref().unwrap_or("file"));
    let file_type = form.content_type.unwrap_or_else(|| {
        mime_guess::from_path(&file_name)
            .first_or_octet_stream()
            .to_string()
    });

    let id = Uuid::new_v4().to_string();
    let file_key = format!("{}/{}/{}", course_id, id, file_name);
    let file_size = data.len() as i64;
    let now = chrono::Utc::now().to_rfc3339();

    state.files.put(&file_key, data, &file_type).await?;

    let insert = sqlx::query(
        r#"
        INSERT INTO materials (id, course_id, title, description, file_name, file_key, file_type, file_size, uploaded_by, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(&course_id)
    .bind(title.trim())
    .bind(&form.description)
    .bind(&file_name)
    .bind(&file_key)
    .bind(&file_type)
    .bind(file_size)
    .bind(&user.id)
    .bind(&now)
    .execute(&state.db)
    .await;

    if let Err(e) = insert {
        // Don't leave an orphaned blob behind
        if let Err(del_err) = state.files.delete(&file_key).await {
            tracing::warn!(key = %file_key, error = %del_err, "Failed to clean up blob after insert failure");
        }
        return Err(e.into());
    }

    tracing::info!(
        material_id = %id,
        course_id = %course_id,
        file = %file_name,
        size = file_size,
        "Material uploaded"
    );

    let material = sqlx::query_as::<_, Material>("SELECT * FROM materials WHERE id = ?")
        .bind(&id)
        .fetch_one(&state.db)
        .await?;

    Ok((StatusCode::CREATED, Json(material)))
}

/// Download a material's file. Appends a download log entry once the blob
/// has actually been fetched.
pub async fn download_material(
    State(state): State<Arc<AppState>>,
    user: User,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    if let Err(e) = validate_uuid(&id, "material_id") {
        return Err(ApiError::validation_field("material_id", e));
    }

    let material = sqlx::query_as::<_, Material>("SELECT * FROM materials WHERE id = ?")
        .bind(&id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| ApiError::not_found("Material not found"))?;

    let data = state.files.get(&material.file_key).await?;

    // The file is being served; record it. A logging failure must not turn a
    // successful download into an error.
    if let Err(e) = log_download(&state.db, &user.id, &user.name, &material.id, &material.title).await
    {
        tracing::warn!(material_id = %material.id, error = %e, "Failed to record download");
    }

    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(&material.file_type)
            .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream")),
    );
    let disposition = format!("attachment; filename=\"{}\"", material.file_name);
    headers.insert(
        header::CONTENT_DISPOSITION,
        HeaderValue::from_str(&disposition)
            .unwrap_or_else(|_| HeaderValue::from_static("attachment")),
    );

    Ok((headers, data))
}

pub async fn delete_material(
    State(state): State<Arc<AppState>>,
    user: User,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    if !user.role_enum().can_manage_materials() {
        return Err(ApiError::forbidden(
            "Only instructors and admins can delete materials",
        ));
    }

    if let Err(e) = validate_uuid(&id, "material_id") {
        return Err(ApiError::validation_field("material_id", e));
    }

    let material: Option<Material> = sqlx::query_as("SELECT * FROM materials WHERE id = ?")
        .bind(&id)
        .fetch_optional(&state.db)
        .await?;
    let material = material.ok_or_else(|| ApiError::not_found("Material not found"))?;

    sqlx::query("DELETE FROM materials WHERE id = ?")
        .bind(&id)
        .execute(&state.db)
        .await?;

    if let Err(e) = state.files.delete(&material.file_key).await {
        tracing::warn!(
            material_id = %material.id,
            key = %material.file_key,
            error = %e,
            "Failed to delete stored file"
        );
    }

    tracing::info!(material_id = %id, "Material deleted");

    Ok(StatusCode::NO_CONTENT)
}
