use axum::extract::{Query, State};
use axum::Json;
use garde::Validate;

use crate::app_state::AppState;
use crate::error::Result;
use crate::models::transaction::{LedgerQuery, Transaction};
use crate::models::user::User;
use crate::routes::auth::AuthUser;

/// GET /api/v1/me — profile and current credit balance.
pub async fn get_profile(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<User>> {
    Ok(Json(state.accounts.profile(user_id).await?))
}

/// GET /api/v1/me/transactions — the caller's ledger, newest first.
pub async fn list_transactions(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Query(query): Query<LedgerQuery>,
) -> Result<Json<Vec<Transaction>>> {
    query.validate()?;
    let transactions = state
        .accounts
        .transactions(user_id, query.limit, query.offset)
        .await?;
    Ok(Json(transactions))
}
