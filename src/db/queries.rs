use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use std::str::FromStr;

use crate::models::generation::{Generation, GenerationStatus};

const GENERATION_COLUMNS: &str = "id, job_id, user_id, template_id, status, progress, image_url, \
     error, started_at, completed_at, created_at, updated_at";

fn generation_from_row(row: &SqliteRow) -> Result<Generation, sqlx::Error> {
    let status_str: String = row.try_get("status")?;
    let status =
        GenerationStatus::from_str(&status_str).map_err(|e| sqlx::Error::Decode(Box::new(e)))?;

    Ok(Generation {
        id: row.try_get("id")?,
        job_id: row.try_get("job_id")?,
        user_id: row.try_get("user_id")?,
        template_id: row.try_get("template_id")?,
        status,
        progress: row.try_get("progress")?,
        image_url: row.try_get("image_url")?,
        error: row.try_get("error")?,
        started_at: row.try_get("started_at")?,
        completed_at: row.try_get("completed_at")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

/// Insert a new generation record in `pending` with zero progress.
///
/// A duplicate `job_id` violates the unique constraint and surfaces as a database error.
pub async fn create_generation(
    pool: &SqlitePool,
    job_id: &str,
    user_id: i64,
    template_id: i64,
) -> Result<Generation, sqlx::Error> {
    let now = Utc::now();
    let row = sqlx::query(&format!(
        r#"
        INSERT INTO generations (job_id, user_id, template_id, status, progress, created_at, updated_at)
        VALUES (?1, ?2, ?3, 'pending', 0, ?4, ?4)
        RETURNING {GENERATION_COLUMNS}
        "#
    ))
    .bind(job_id)
    .bind(user_id)
    .bind(template_id)
    .bind(now)
    .fetch_one(pool)
    .await?;

    generation_from_row(&row)
}

/// Get a generation by its job id
pub async fn get_generation(
    pool: &SqlitePool,
    job_id: &str,
) -> Result<Option<Generation>, sqlx::Error> {
    let row = sqlx::query(&format!(
        "SELECT {GENERATION_COLUMNS} FROM generations WHERE job_id = ?1"
    ))
    .bind(job_id)
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(generation_from_row).transpose()
}

/// Set status and progress.
///
/// `started_at` is stamped the first time the record enters `processing`. Progress
/// may move backwards and `processing` may be re-entered; neither is rejected.
pub async fn update_status(
    pool: &SqlitePool,
    job_id: &str,
    status: GenerationStatus,
    progress: i64,
) -> Result<(), sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE generations
        SET status = ?1,
            progress = ?2,
            updated_at = ?3,
            started_at = CASE WHEN ?1 = 'processing' AND started_at IS NULL THEN ?3 ELSE started_at END
        WHERE job_id = ?4
        "#,
    )
    .bind(status.as_ref())
    .bind(progress)
    .bind(Utc::now())
    .bind(job_id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(sqlx::Error::RowNotFound);
    }
    Ok(())
}

/// Terminal success write. Progress is pinned to 100.
pub async fn update_with_result(
    pool: &SqlitePool,
    job_id: &str,
    status: GenerationStatus,
    image_url: &str,
    completed_at: DateTime<Utc>,
) -> Result<(), sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE generations
        SET status = ?1,
            progress = 100,
            image_url = ?2,
            completed_at = ?3,
            updated_at = ?4
        WHERE job_id = ?5
        "#,
    )
    .bind(status.as_ref())
    .bind(image_url)
    .bind(completed_at)
    .bind(Utc::now())
    .bind(job_id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(sqlx::Error::RowNotFound);
    }
    Ok(())
}

/// Terminal failure write. Always forces `failed`.
pub async fn update_with_error(
    pool: &SqlitePool,
    job_id: &str,
    error: &str,
    completed_at: DateTime<Utc>,
) -> Result<(), sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE generations
        SET status = 'failed',
            error = ?1,
            completed_at = ?2,
            updated_at = ?3
        WHERE job_id = ?4
        "#,
    )
    .bind(error)
    .bind(completed_at)
    .bind(Utc::now())
    .bind(job_id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(sqlx::Error::RowNotFound);
    }
    Ok(())
}

/// A user's generations, newest first
pub async fn list_by_user(
    pool: &SqlitePool,
    user_id: i64,
    limit: i64,
    offset: i64,
) -> Result<Vec<Generation>, sqlx::Error> {
    let rows = sqlx::query(&format!(
        r#"
        SELECT {GENERATION_COLUMNS}
        FROM generations
        WHERE user_id = ?1
        ORDER BY created_at DESC, id DESC
        LIMIT ?2 OFFSET ?3
        "#
    ))
    .bind(user_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    rows.iter().map(generation_from_row).collect()
}
