//! Balance and ledger access for the authenticated user.

use sqlx::SqlitePool;

use crate::db::ledger_queries;
use crate::error::{AppError, Result};
use crate::models::transaction::Transaction;
use crate::models::user::User;

pub struct AccountService {
    db: SqlitePool,
}

impl AccountService {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    pub async fn profile(&self, user_id: i64) -> Result<User> {
        ledger_queries::get_user(&self.db, user_id)
            .await?
            .ok_or(AppError::UserNotFound(user_id))
    }

    /// Ledger entries, newest first.
    pub async fn transactions(&self, user_id: i64, limit: i64, offset: i64) -> Result<Vec<Transaction>> {
        Ok(ledger_queries::list_transactions(&self.db, user_id, limit, offset).await?)
    }

    /// Credit a confirmed payment. Returns the new balance.
    pub async fn add_credits(
        &self,
        user_id: i64,
        amount: i64,
        description: &str,
        external_payment_id: Option<&str>,
    ) -> Result<i64> {
        if amount <= 0 {
            return Err(AppError::Validation("credit amount must be positive".to_string()));
        }

        match ledger_queries::grant_credits(&self.db, user_id, amount, description, external_payment_id).await {
            Ok(transaction_id) => {
                tracing::info!(user_id, amount, transaction_id, "Credits added");
            }
            Err(sqlx::Error::RowNotFound) => return Err(AppError::UserNotFound(user_id)),
            Err(e) => return Err(e.into()),
        }

        Ok(self.profile(user_id).await?.credits)
    }
}
