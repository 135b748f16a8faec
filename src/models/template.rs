use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Catalog entry defining the style and credit cost of a generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Template {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub preview_image_url: String,
    pub credit_cost: i64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}
