//! Database seeders for initial data
//!
//! Seeds the course catalogue on first run so a fresh install has something
//! to register against.

use anyhow::Result;
use sqlx::SqlitePool;
use tracing::info;

/// Seed the initial course catalogue (only when the table is empty)
pub async fn seed_courses(pool: &SqlitePool) -> Result<()> {
    let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM courses")
        .fetch_one(pool)
        .await?;

    if count.0 > 0 {
        return Ok(());
    }

    info!("Seeding initial course catalogue...");

    // (code, title, description)
    let courses: Vec<(&str, &str, &str)> = vec![
        (
            "CS101",
            "Introduction to Programming",
            "Fundamentals of programming and problem solving",
        ),
        (
            "CS102",
            "Data Structures",
            "Lists, trees, hash tables and the algorithms around them",
        ),
        (
            "DS101",
            "Web Design Principles",
            "UI/UX fundamentals",
        ),
    ];

    let seeded = courses.len();
    for (code, title, description) in courses {
        let id = uuid::Uuid::new_v4().to_string();
        let now = chrono::Utc::now().to_rfc3339();
        sqlx::query(
            "INSERT INTO courses (id, title, code, description, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(title)
        .bind(code)
        .bind(description)
        .bind(&now)
        .execute(pool)
        .await?;
    }

    info!("Seeded {} courses", seeded);
    Ok(())
}
