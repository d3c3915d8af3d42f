//! Course material models.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A file shared within a course. The blob itself lives in the file store
/// under `file_key`; this row only carries metadata.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Material {
    pub id: String,
    pub course_id: String,
    pub title: String,
    pub description: String,
    pub file_name: String,
    #[serde(skip_serializing, default)]
    pub file_key: String,
    pub file_type: String,
    pub file_size: i64,
    pub uploaded_by: Option<String>,
    pub created_at: String,
}

/// Query parameters for listing materials
#[derive(Debug, Clone, Deserialize, Default)]
pub struct MaterialQuery {
    /// Restrict the listing to a single course
    pub course_id: Option<String>,
}
