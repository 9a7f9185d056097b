use crate::domain::symbol::Symbol;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A stock saved by a user. Rows are partitioned by `user_id` and keyed by
/// `(user_id, symbol)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatchlistEntry {
    pub user_id: Uuid,
    pub symbol: Symbol,
    pub company_name: String,
    pub is_favorite: bool,
    pub price: Option<f64>,
    pub dividend_yield: Option<f64>,
    pub next_dividend_date: Option<NaiveDate>,
    pub quantity: Option<i32>,
    pub created_at: DateTime<Utc>,
}

impl WatchlistEntry {
    pub fn new(user_id: Uuid, symbol: Symbol, company_name: impl Into<String>) -> Self {
        Self {
            user_id,
            symbol,
            company_name: company_name.into(),
            is_favorite: false,
            price: None,
            dividend_yield: None,
            next_dividend_date: None,
            quantity: None,
            created_at: Utc::now(),
        }
    }
}
