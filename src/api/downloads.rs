//! Download log API endpoints.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;

use crate::db::{list_download_logs, DownloadLogListResponse, DownloadLogQuery, User};
use crate::AppState;

use super::error::ApiError;

fn require_admin(user: &User) -> Result<(), ApiError> {
    if !user.role_enum().can_administer() {
        return Err(ApiError::forbidden("This action requires admin role"));
    }
    Ok(())
}

/// List download logs with filtering and pagination
///
/// Query parameters:
/// - user_id: Filter by user
/// - material_id: Filter by material
/// - start_date / end_date: Date range filter (ISO 8601)
/// - page: Page number (1-indexed, defaults to 1)
/// - per_page: Items per page (defaults to 50, max 100)
pub async fn list_logs(
    State(state): State<Arc<AppState>>,
    user: User,
    Query(query): Query<DownloadLogQuery>,
) -> Result<Json<DownloadLogListResponse>, ApiError> {
    require_admin(&user)?;

    let result = list_download_logs(&state.db, &query).await?;
    Ok(Json(result))
}

/// Delete all download log entries
pub async fn clear_logs(
    State(state): State<Arc<AppState>>,
    user: User,
) -> Result<StatusCode, ApiError> {
    require_admin(&user)?;

    let result = sqlx::query("DELETE FROM download_logs")
        .execute(&state.db)
        .await?;

    tracing::info!(
        deleted = result.rows_affected(),
        by = %user.id,
        "Download logs cleared"
    );

    Ok(StatusCode::NO_CONTENT)
}
