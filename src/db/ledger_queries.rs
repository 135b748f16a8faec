use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteExecutor, SqlitePool};
use std::str::FromStr;

use crate::models::template::Template;
use crate::models::transaction::{Transaction, TransactionType};
use crate::models::user::User;

fn user_from_row(row: &SqliteRow) -> Result<User, sqlx::Error> {
    Ok(User {
        id: row.try_get("id")?,
        wechat_openid: row.try_get("wechat_openid")?,
        nickname: row.try_get("nickname")?,
        credits: row.try_get("credits")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn transaction_from_row(row: &SqliteRow) -> Result<Transaction, sqlx::Error> {
    let kind_str: String = row.try_get("type")?;
    let kind =
        TransactionType::from_str(&kind_str).map_err(|e| sqlx::Error::Decode(Box::new(e)))?;

    Ok(Transaction {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        kind,
        amount: row.try_get("amount")?,
        description: row.try_get("description")?,
        external_payment_id: row.try_get("external_payment_id")?,
        related_template_id: row.try_get("related_template_id")?,
        created_at: row.try_get("created_at")?,
    })
}

/// Ledger entry to append.
#[derive(Debug, Clone)]
pub struct NewTransaction<'a> {
    pub user_id: i64,
    pub kind: TransactionType,
    pub amount: i64,
    pub description: &'a str,
    pub external_payment_id: Option<&'a str>,
    pub related_template_id: Option<i64>,
}

pub async fn create_user(
    pool: &SqlitePool,
    wechat_openid: &str,
    nickname: &str,
    credits: i64,
) -> Result<User, sqlx::Error> {
    let now = Utc::now();
    let row = sqlx::query(
        r#"
        INSERT INTO users (wechat_openid, nickname, credits, created_at, updated_at)
        VALUES (?1, ?2, ?3, ?4, ?4)
        RETURNING id, wechat_openid, nickname, credits, created_at, updated_at
        "#,
    )
    .bind(wechat_openid)
    .bind(nickname)
    .bind(credits)
    .bind(now)
    .fetch_one(pool)
    .await?;

    user_from_row(&row)
}

pub async fn get_user(pool: &SqlitePool, user_id: i64) -> Result<Option<User>, sqlx::Error> {
    let row = sqlx::query(
        r#"
        SELECT id, wechat_openid, nickname, credits, created_at, updated_at
        FROM users
        WHERE id = ?1
        "#,
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(user_from_row).transpose()
}

/// Additive balance adjustment (`credits = credits + delta`).
///
/// Never reads the balance first, so concurrent adjustments cannot lose updates.
/// Returns `RowNotFound` when the user does not exist.
pub async fn adjust_credits<'e, E>(executor: E, user_id: i64, delta: i64) -> Result<(), sqlx::Error>
where
    E: SqliteExecutor<'e>,
{
    let result = sqlx::query(
        r#"
        UPDATE users
        SET credits = credits + ?1,
            updated_at = ?2
        WHERE id = ?3
        "#,
    )
    .bind(delta)
    .bind(Utc::now())
    .bind(user_id)
    .execute(executor)
    .await?;

    if result.rows_affected() == 0 {
        return Err(sqlx::Error::RowNotFound);
    }
    Ok(())
}

/// Append a ledger entry, returning its id.
pub async fn append_transaction<'e, E>(
    executor: E,
    entry: &NewTransaction<'_>,
) -> Result<i64, sqlx::Error>
where
    E: SqliteExecutor<'e>,
{
    let row = sqlx::query(
        r#"
        INSERT INTO transactions
            (user_id, type, amount, description, external_payment_id, related_template_id, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        RETURNING id
        "#,
    )
    .bind(entry.user_id)
    .bind(entry.kind.as_ref())
    .bind(entry.amount)
    .bind(entry.description)
    .bind(entry.external_payment_id)
    .bind(entry.related_template_id)
    .bind(Utc::now())
    .fetch_one(executor)
    .await?;

    row.try_get("id")
}

/// Debit the template's cost and record the matching `generation` entry as one unit.
///
/// Either both writes land or neither does.
pub async fn charge_generation(
    pool: &SqlitePool,
    user_id: i64,
    template: &Template,
) -> Result<i64, sqlx::Error> {
    let description = format!("Used '{}' template", template.name);
    let mut tx = pool.begin().await?;

    adjust_credits(&mut *tx, user_id, -template.credit_cost).await?;
    let transaction_id = append_transaction(
        &mut *tx,
        &NewTransaction {
            user_id,
            kind: TransactionType::Generation,
            amount: -template.credit_cost,
            description: &description,
            external_payment_id: None,
            related_template_id: Some(template.id),
        },
    )
    .await?;

    tx.commit().await?;
    Ok(transaction_id)
}

/// Credit a purchase and record the matching `purchase` entry as one unit.
pub async fn grant_credits(
    pool: &SqlitePool,
    user_id: i64,
    amount: i64,
    description: &str,
    external_payment_id: Option<&str>,
) -> Result<i64, sqlx::Error> {
    let mut tx = pool.begin().await?;

    adjust_credits(&mut *tx, user_id, amount).await?;
    let transaction_id = append_transaction(
        &mut *tx,
        &NewTransaction {
            user_id,
            kind: TransactionType::Purchase,
            amount,
            description,
            external_payment_id,
            related_template_id: None,
        },
    )
    .await?;

    tx.commit().await?;
    Ok(transaction_id)
}

/// A user's ledger, newest first
pub async fn list_transactions(
    pool: &SqlitePool,
    user_id: i64,
    limit: i64,
    offset: i64,
) -> Result<Vec<Transaction>, sqlx::Error> {
    let rows = sqlx::query(
        r#"
        SELECT id, user_id, type, amount, description, external_payment_id,
               related_template_id, created_at
        FROM transactions
        WHERE user_id = ?1
        ORDER BY created_at DESC, id DESC
        LIMIT ?2 OFFSET ?3
        "#,
    )
    .bind(user_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    rows.iter().map(transaction_from_row).collect()
}
