//! Download log models for tracking who fetched which material.

use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

/// Download log entry. Write-once; there is no retention policy beyond the
/// admin's manual clear-all.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct DownloadLog {
    pub id: String,
    pub user_id: String,
    pub user_name: String,
    pub material_id: String,
    pub material_name: String,
    pub created_at: String,
}

/// Response for listing download logs with pagination
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadLogListResponse {
    pub items: Vec<DownloadLog>,
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
    pub total_pages: i64,
}

/// Query parameters for filtering download logs
#[derive(Debug, Clone, Deserialize, Default)]
pub struct DownloadLogQuery {
    /// Filter by user ID
    pub user_id: Option<String>,
    /// Filter by material ID
    pub material_id: Option<String>,
    /// Start date for filtering (ISO 8601)
    pub start_date: Option<String>,
    /// End date for filtering (ISO 8601)
    pub end_date: Option<String>,
    /// Page number (1-indexed, defaults to 1)
    pub page: Option<i64>,
    /// Items per page (defaults to 50, max 100)
    pub per_page: Option<i64>,
}

/// Record a download to the database
pub async fn log_download(
    db: &SqlitePool,
    user_id: &str,
    user_name: &str,
    material_id: &str,
    material_name: &str,
) -> Result<(), sqlx::Error> {
    let id = uuid::Uuid::new_v4().to_string();
    let now = chrono::Utc::now().to_rfc3339();

    sqlx::query(
        r#"
        INSERT INTO download_logs (id, user_id, user_name, material_id, material_name, created_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(user_id)
    .bind(user_name)
    .bind(material_id)
    .bind(material_name)
    .bind(&now)
    .execute(db)
    .await?;

    tracing::debug!(
        user_id = user_id,
        material_id = material_id,
        "Download recorded"
    );

    Ok(())
}

/// List download logs with filtering and pagination, newest first
pub async fn list_download_logs(
    db: &SqlitePool,
    query: &DownloadLogQuery,
) -> Result<DownloadLogListResponse, sqlx::Error> {
    let page = query.page.unwrap_or(1).max(1);
    let per_page = query.per_page.unwrap_or(50).clamp(1, 100);
    let offset = (page - 1) * per_page;

    // Build dynamic WHERE clause
    let mut conditions = Vec::new();
    let mut bindings: Vec<String> = Vec::new();

    if let Some(user_id) = &query.user_id {
        conditions.push("user_id = ?");
        bindings.push(user_id.clone());
    }

    if let Some(material_id) = &query.material_id {
        conditions.push("material_id = ?");
        bindings.push(material_id.clone());
    }

    if let Some(start_date) = &query.start_date {
        conditions.push("created_at >= ?");
        bindings.push(start_date.clone());
    }

    if let Some(end_date) = &query.end_date {
        conditions.push("created_at <= ?");
        bindings.push(end_date.clone());
    }

    let where_clause = if conditions.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", conditions.join(" AND "))
    };

    let count_sql = format!("SELECT COUNT(*) FROM download_logs {}", where_clause);
    let mut count_query = sqlx::query_scalar::<_, i64>(&count_sql);
    for binding in &bindings {
        count_query = count_query.bind(binding);
    }
    let total = count_query.fetch_one(db).await?;

    let sql = format!(
        "SELECT * FROM download_logs {} ORDER BY created_at DESC LIMIT ? OFFSET ?",
        where_clause
    );
    let mut query_builder = sqlx::query_as::<_, DownloadLog>(&sql);
    for binding in &bindings {
        query_builder = query_builder.bind(binding);
    }
    query_builder = query_builder.bind(per_page).bind(offset);

    let items = query_builder.fetch_all(db).await?;

    let total_pages = (total as f64 / per_page as f64).ceil() as i64;

    Ok(DownloadLogListResponse {
        items,
        total,
        page,
        per_page,
        total_pages,
    })
}
