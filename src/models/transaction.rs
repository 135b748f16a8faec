use chrono::{DateTime, Utc};
use garde::Validate;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Display, EnumString, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TransactionType {
    Purchase,
    Generation,
}

/// Append-only ledger entry. Debits carry a negative `amount`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: i64,
    pub user_id: i64,
    #[serde(rename = "type")]
    pub kind: TransactionType,
    pub amount: i64,
    pub description: String,
    pub external_payment_id: Option<String>,
    pub related_template_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

/// Pagination for the ledger listing.
#[derive(Debug, Deserialize, Validate)]
pub struct LedgerQuery {
    #[serde(default = "default_ledger_limit")]
    #[garde(range(min = 1, max = 100))]
    pub limit: i64,

    #[serde(default)]
    #[garde(range(min = 0))]
    pub offset: i64,
}

fn default_ledger_limit() -> i64 {
    10
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ledger_query_defaults_and_bounds() {
        let q: LedgerQuery = serde_json::from_str("{}").unwrap();
        assert_eq!(q.limit, 10);
        assert!(q.validate().is_ok());

        let q: LedgerQuery = serde_json::from_str(r#"{"limit": 500}"#).unwrap();
        assert!(q.validate().is_err());
    }
}
