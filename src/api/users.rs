//! Admin user-management endpoints: listing accounts and working the
//! approval queue.

use axum::{
    extract::{Path, State},
    Json,
};
use std::sync::Arc;

use crate::db::{UpdateUserStatusRequest, User, UserResponse, UserStatus};
use crate::AppState;

use super::error::ApiError;
use super::validation::validate_uuid;

fn require_admin(user: &User) -> Result<(), ApiError> {
    if !user.role_enum().can_administer() {
        return Err(ApiError::forbidden("This action requires admin role"));
    }
    Ok(())
}

pub async fn list_users(
    State(state): State<Arc<AppState>>,
    user: User,
) -> Result<Json<Vec<UserResponse>>, ApiError> {
    require_admin(&user)?;

    let users = sqlx::query_as::<_, User>("SELECT * FROM users ORDER BY created_at DESC")
        .fetch_all(&state.db)
        .await?;

    Ok(Json(users.into_iter().map(UserResponse::from).collect()))
}

pub async fn list_pending_users(
    State(state): State<Arc<AppState>>,
    user: User,
) -> Result<Json<Vec<UserResponse>>, ApiError> {
    require_admin(&user)?;

    let users = sqlx::query_as::<_, User>(
        "SELECT * FROM users WHERE status = 'pending' ORDER BY created_at ASC",
    )
    .fetch_all(&state.db)
    .await?;

    Ok(Json(users.into_iter().map(UserResponse::from).collect()))
}

/// Approve or reject an account. The only accepted target states are
/// `active` and `rejected`.
pub async fn update_user_status(
    State(state): State<Arc<AppState>>,
    user: User,
    Path(id): Path<String>,
    Json(req): Json<UpdateUserStatusRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    require_admin(&user)?;

    if let Err(e) = validate_uuid(&id, "user_id") {
        return Err(ApiError::validation_field("user_id", e));
    }

    let status: UserStatus = req
        .status
        .parse()
        .map_err(|e: String| ApiError::validation_field("status", e))?;
    if status == UserStatus::Pending {
        return Err(ApiError::validation_field(
            "status",
            "Status can only be set to active or rejected",
        ));
    }

    let target: Option<User> = sqlx::query_as("SELECT * FROM users WHERE id = ?")
        .bind(&id)
        .fetch_optional(&state.db)
        .await?;
    let target = target.ok_or_else(|| ApiError::not_found("User not found"))?;

    if target.id == user.id {
        return Err(ApiError::bad_request("Cannot change your own status"));
    }

    let now = chrono::Utc::now().to_rfc3339();
    sqlx::query("UPDATE users SET status = ?, updated_at = ? WHERE id = ?")
        .bind(status.to_string())
        .bind(&now)
        .bind(&id)
        .execute(&state.db)
        .await?;

    // A rejection cuts off any sessions the account still holds
    if status == UserStatus::Rejected {
        sqlx::query("DELETE FROM sessions WHERE user_id = ?")
            .bind(&id)
            .execute(&state.db)
            .await?;
    }

    tracing::info!(
        user_id = %id,
        status = %status,
        by = %user.id,
        "User status updated"
    );

    let updated = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
        .bind(&id)
        .fetch_one(&state.db)
        .await?;

    Ok(Json(UserResponse::from(updated)))
}
