//! Record store boundary: one repository trait per entity, plus the realtime and
//! teardown surface shared by every store implementation.

use crate::domain::analysis::AnalysisRecord;
use crate::domain::company::CompanyReference;
use crate::domain::dividend::{DividendHistoryPoint, DividendRecord};
use crate::domain::notification::{DividendAnnouncement, NewsItem};
use crate::domain::watchlist::WatchlistEntry;
use crate::domain::Symbol;
use crate::storage::realtime::ChangeFeed;
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Table {
    WatchlistEntries,
    DividendRecords,
    DividendHistory,
    CompanyLogos,
    CompanyProfiles,
    StockAnalyses,
    DividendAnnouncements,
    NewsItems,
    Profiles,
}

impl Table {
    pub const ALL: [Table; 9] = [
        Table::WatchlistEntries,
        Table::DividendRecords,
        Table::DividendHistory,
        Table::CompanyLogos,
        Table::CompanyProfiles,
        Table::StockAnalyses,
        Table::DividendAnnouncements,
        Table::NewsItems,
        Table::Profiles,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Table::WatchlistEntries => "watchlist_entries",
            Table::DividendRecords => "dividend_records",
            Table::DividendHistory => "dividend_history",
            Table::CompanyLogos => "company_logos",
            Table::CompanyProfiles => "company_profiles",
            Table::StockAnalyses => "stock_analyses",
            Table::DividendAnnouncements => "dividend_announcements",
            Table::NewsItems => "news_items",
            Table::Profiles => "profiles",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        Self::ALL.into_iter().find(|t| t.as_str().eq_ignore_ascii_case(s))
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeOp {
    Insert,
    Update,
    Delete,
}

/// Row-level change notification. `symbol` and `user_id` are set when the row has them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub table: Table,
    pub op: ChangeOp,
    #[serde(default)]
    pub symbol: Option<Symbol>,
    #[serde(default)]
    pub user_id: Option<Uuid>,
}

#[async_trait]
pub trait WatchlistRepository: Send + Sync {
    /// Entries for one user, oldest first.
    async fn fetch_by_user(&self, user_id: Uuid) -> anyhow::Result<Vec<WatchlistEntry>>;

    /// Insert or replace the `(user_id, symbol)` row.
    async fn upsert_entry(&self, entry: &WatchlistEntry) -> anyhow::Result<()>;

    /// Returns `false` when no row matched.
    async fn set_favorite(&self, user_id: Uuid, symbol: &Symbol, favorite: bool) -> anyhow::Result<bool>;

    async fn set_quantity(&self, user_id: Uuid, symbol: &Symbol, quantity: i32) -> anyhow::Result<bool>;

    async fn delete(&self, user_id: Uuid, symbol: &Symbol) -> anyhow::Result<bool>;

    /// Distinct symbols across every user's watchlist, sorted.
    async fn watched_symbols(&self) -> anyhow::Result<Vec<Symbol>>;
}

#[async_trait]
pub trait DividendRepository: Send + Sync {
    async fn fetch_by_symbols(&self, symbols: &[Symbol]) -> anyhow::Result<Vec<DividendRecord>>;

    async fn fetch_by_symbol(&self, symbol: &Symbol) -> anyhow::Result<Option<DividendRecord>>;

    /// Records with an ex-dividend, dividend, payout or earnings date inside `[from, to]`.
    async fn fetch_by_date_range(&self, from: NaiveDate, to: NaiveDate) -> anyhow::Result<Vec<DividendRecord>>;

    /// Records whose earnings date falls inside `[from, to]`, earliest first.
    async fn fetch_earnings_between(&self, from: NaiveDate, to: NaiveDate) -> anyhow::Result<Vec<DividendRecord>>;

    /// Payment history for one symbol, oldest first.
    async fn fetch_history(&self, symbol: &Symbol) -> anyhow::Result<Vec<DividendHistoryPoint>>;
}

#[async_trait]
pub trait CompanyRepository: Send + Sync {
    async fn fetch_logos(&self) -> anyhow::Result<Vec<CompanyReference>>;

    async fn fetch_profiles(&self) -> anyhow::Result<Vec<CompanyReference>>;

    /// Returns the number of rows written.
    async fn upsert_logos(&self, logos: &[CompanyReference]) -> anyhow::Result<usize>;
}

#[async_trait]
pub trait AnalysisRepository: Send + Sync {
    async fn latest_analysis(&self, symbol: &Symbol) -> anyhow::Result<Option<AnalysisRecord>>;

    /// Last write wins; keyed by symbol.
    async fn upsert_analysis(&self, record: &AnalysisRecord) -> anyhow::Result<()>;
}

#[async_trait]
pub trait NotificationRepository: Send + Sync {
    /// Newest first by announcement date.
    async fn recent_announcements(&self, limit: usize) -> anyhow::Result<Vec<DividendAnnouncement>>;

    async fn recent_news(&self, limit: usize) -> anyhow::Result<Vec<NewsItem>>;
}

#[async_trait]
pub trait ProfileRepository: Send + Sync {
    async fn username(&self, user_id: Uuid) -> anyhow::Result<Option<String>>;
}

/// Everything a view needs from the external store, constructed once at start-up.
#[async_trait]
pub trait RecordStore:
    WatchlistRepository
    + DividendRepository
    + CompanyRepository
    + AnalysisRepository
    + NotificationRepository
    + ProfileRepository
{
    fn changes(&self) -> &ChangeFeed;

    /// Releases connections and subscriptions. Further calls may fail.
    async fn close(&self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_names_round_trip() {
        for t in Table::ALL {
            assert_eq!(Table::parse(t.as_str()), Some(t));
        }
        assert_eq!(Table::parse("WATCHLIST_ENTRIES"), Some(Table::WatchlistEntries));
        assert_eq!(Table::parse("nope"), None);
    }

    #[test]
    fn change_event_decodes_trigger_payload() {
        let payload = serde_json::json!({
            "table": "watchlist_entries",
            "op": "UPDATE",
            "symbol": "ko",
            "user_id": "00000000-0000-0000-0000-000000000000"
        });
        let ev: ChangeEvent = serde_json::from_value(payload).unwrap();
        assert_eq!(ev.table, Table::WatchlistEntries);
        assert_eq!(ev.op, ChangeOp::Update);
        assert_eq!(ev.symbol.unwrap().as_str(), "KO");
        assert_eq!(ev.user_id, Some(Uuid::nil()));
    }
}
