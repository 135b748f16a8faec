use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use crate::models::template::Template;

fn template_from_row(row: &SqliteRow) -> Result<Template, sqlx::Error> {
    Ok(Template {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        preview_image_url: row.try_get("preview_image_url")?,
        credit_cost: row.try_get("credit_cost")?,
        is_active: row.try_get("is_active")?,
        created_at: row.try_get("created_at")?,
    })
}

pub async fn get_template(
    pool: &SqlitePool,
    template_id: i64,
) -> Result<Option<Template>, sqlx::Error> {
    let row = sqlx::query(
        r#"
        SELECT id, name, description, preview_image_url, credit_cost, is_active, created_at
        FROM templates
        WHERE id = ?1
        "#,
    )
    .bind(template_id)
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(template_from_row).transpose()
}

pub async fn list_active_templates(pool: &SqlitePool) -> Result<Vec<Template>, sqlx::Error> {
    let rows = sqlx::query(
        r#"
        SELECT id, name, description, preview_image_url, credit_cost, is_active, created_at
        FROM templates
        WHERE is_active = 1
        ORDER BY id ASC
        "#,
    )
    .fetch_all(pool)
    .await?;

    rows.iter().map(template_from_row).collect()
}

pub async fn insert_template(
    pool: &SqlitePool,
    name: &str,
    description: &str,
    preview_image_url: &str,
    credit_cost: i64,
) -> Result<Template, sqlx::Error> {
    let row = sqlx::query(
        r#"
        INSERT INTO templates (name, description, preview_image_url, credit_cost)
        VALUES (?1, ?2, ?3, ?4)
        RETURNING id, name, description, preview_image_url, credit_cost, is_active, created_at
        "#,
    )
    .bind(name)
    .bind(description)
    .bind(preview_image_url)
    .bind(credit_cost)
    .fetch_one(pool)
    .await?;

    template_from_row(&row)
}
