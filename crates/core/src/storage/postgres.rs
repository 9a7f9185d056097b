use crate::domain::analysis::{AnalysisRecord, Rating, RiskLevel};
use crate::domain::company::CompanyReference;
use crate::domain::dividend::{DividendHistoryPoint, DividendRecord};
use crate::domain::notification::{DividendAnnouncement, NewsItem};
use crate::domain::watchlist::WatchlistEntry;
use crate::domain::Symbol;
use crate::storage::realtime::ChangeFeed;
use crate::storage::repo::{
    AnalysisRepository, ChangeEvent, CompanyRepository, DividendRepository,
    NotificationRepository, ProfileRepository, RecordStore, Table, WatchlistRepository,
};
use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::postgres::{PgListener, PgPoolOptions};
use sqlx::{FromRow, PgPool};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Channel the `notify_record_change` trigger publishes on.
pub const CHANGE_CHANNEL: &str = "record_changes";

const DEFAULT_MAX_CONNECTIONS: u32 = 5;

pub struct PgRecordStore {
    pool: PgPool,
    feed: ChangeFeed,
    shutdown: CancellationToken,
    listeners: Mutex<Vec<JoinHandle<()>>>,
}

impl PgRecordStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            feed: ChangeFeed::default(),
            shutdown: CancellationToken::new(),
            listeners: Mutex::new(Vec::new()),
        }
    }

    pub async fn connect(database_url: &str) -> anyhow::Result<Self> {
        let max_connections = std::env::var("DATABASE_MAX_CONNECTIONS")
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
            .unwrap_or(DEFAULT_MAX_CONNECTIONS);
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .context("connect DATABASE_URL failed")?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Bridges `LISTEN record_changes` into the change feed until `close()`.
    pub async fn spawn_change_listener(&self) -> anyhow::Result<()> {
        let mut listener = PgListener::connect_with(&self.pool)
            .await
            .context("connect change listener failed")?;
        listener
            .listen(CHANGE_CHANNEL)
            .await
            .with_context(|| format!("LISTEN {CHANGE_CHANNEL} failed"))?;

        let feed = self.feed.clone();
        let token = self.shutdown.child_token();
        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    msg = listener.recv() => match msg {
                        Ok(notification) => match decode_change(notification.payload()) {
                            Ok(event) => {
                                feed.publish(event);
                            }
                            Err(err) => {
                                tracing::warn!(error = %err, "ignoring undecodable change notification");
                            }
                        },
                        Err(err) => {
                            tracing::warn!(error = %err, "change listener receive failed; retrying");
                            tokio::time::sleep(Duration::from_secs(1)).await;
                        }
                    },
                }
            }
            tracing::info!("change listener stopped");
        });

        self.listeners.lock().await.push(task);
        tracing::info!(channel = CHANGE_CHANNEL, "change listener started");
        Ok(())
    }
}

pub fn decode_change(payload: &str) -> anyhow::Result<ChangeEvent> {
    serde_json::from_str(payload)
        .with_context(|| format!("invalid change payload: {payload}"))
}

/// Raw store row with a single mapping into the canonical domain shape. `None` means
/// the row has no usable symbol.
trait IntoDomain {
    type Domain;

    fn into_domain(self) -> Option<Self::Domain>;
}

/// Parsed, sorted and deduplicated after normalisation, so `ko` and `KO` collapse.
fn distinct_symbols<I>(raw: I) -> Vec<Symbol>
where
    I: IntoIterator<Item = String>,
{
    let mut out: Vec<Symbol> = raw.into_iter().filter_map(|s| Symbol::parse(&s)).collect();
    out.sort();
    out.dedup();
    out
}

fn normalize_rows<R: IntoDomain>(table: Table, rows: Vec<R>) -> Vec<R::Domain> {
    let total = rows.len();
    let out: Vec<R::Domain> = rows.into_iter().filter_map(IntoDomain::into_domain).collect();
    if out.len() < total {
        tracing::debug!(%table, dropped = total - out.len(), "rows without a usable symbol dropped");
    }
    out
}

#[derive(Debug, FromRow)]
struct WatchlistRow {
    user_id: Uuid,
    symbol: String,
    company_name: Option<String>,
    is_favorite: Option<bool>,
    price: Option<f64>,
    dividend_yield: Option<f64>,
    next_dividend_date: Option<NaiveDate>,
    quantity: Option<i32>,
    created_at: DateTime<Utc>,
}

impl IntoDomain for WatchlistRow {
    type Domain = WatchlistEntry;

    fn into_domain(self) -> Option<WatchlistEntry> {
        Some(WatchlistEntry {
            user_id: self.user_id,
            symbol: Symbol::parse(&self.symbol)?,
            company_name: self.company_name.unwrap_or_default(),
            is_favorite: self.is_favorite.unwrap_or(false),
            price: self.price,
            dividend_yield: self.dividend_yield,
            next_dividend_date: self.next_dividend_date,
            quantity: self.quantity,
            created_at: self.created_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct DividendRow {
    symbol: String,
    short_name: Option<String>,
    ex_dividend_date: Option<NaiveDate>,
    dividend_date: Option<NaiveDate>,
    payout_date: Option<NaiveDate>,
    earnings_date: Option<NaiveDate>,
    dividend_rate: Option<f64>,
    dividend_yield: Option<f64>,
    payout_ratio: Option<f64>,
    earnings_average: Option<f64>,
    revenue_average: Option<f64>,
    current_price: Option<f64>,
    previous_close: Option<f64>,
}

impl IntoDomain for DividendRow {
    type Domain = DividendRecord;

    fn into_domain(self) -> Option<DividendRecord> {
        Some(DividendRecord {
            symbol: Symbol::parse(&self.symbol)?,
            short_name: self.short_name,
            ex_dividend_date: self.ex_dividend_date,
            dividend_date: self.dividend_date,
            payout_date: self.payout_date,
            earnings_date: self.earnings_date,
            dividend_rate: self.dividend_rate,
            dividend_yield: self.dividend_yield,
            payout_ratio: self.payout_ratio,
            earnings_average: self.earnings_average,
            revenue_average: self.revenue_average,
            current_price: self.current_price,
            previous_close: self.previous_close,
        })
    }
}

#[derive(Debug, FromRow)]
struct HistoryRow {
    symbol: String,
    date: NaiveDate,
    amount: Option<f64>,
}

impl IntoDomain for HistoryRow {
    type Domain = DividendHistoryPoint;

    fn into_domain(self) -> Option<DividendHistoryPoint> {
        Some(DividendHistoryPoint {
            symbol: Symbol::parse(&self.symbol)?,
            date: self.date,
            amount: self.amount.unwrap_or(0.0),
        })
    }
}

#[derive(Debug, FromRow)]
struct CompanyRow {
    symbol: String,
    company_name: Option<String>,
    logo_url: Option<String>,
    sector: Option<String>,
    industry: Option<String>,
}

impl IntoDomain for CompanyRow {
    type Domain = CompanyReference;

    fn into_domain(self) -> Option<CompanyReference> {
        Some(CompanyReference {
            symbol: Symbol::parse(&self.symbol)?,
            company_name: self.company_name,
            logo_url: self.logo_url,
            sector: self.sector,
            industry: self.industry,
        })
    }
}

#[derive(Debug, FromRow)]
struct AnalysisRow {
    symbol: String,
    analysis_date: DateTime<Utc>,
    provider: Option<String>,
    rating: Option<String>,
    price_target: Option<f64>,
    risk_level: Option<String>,
    financial_health: Option<String>,
    strengths: Option<Vec<String>>,
    weaknesses: Option<Vec<String>>,
    opportunities: Option<Vec<String>>,
    threats: Option<Vec<String>>,
    short_term_outlook: Option<String>,
    long_term_outlook: Option<String>,
    dividend_analysis: Option<String>,
    ai_recommendation: Option<String>,
}

impl IntoDomain for AnalysisRow {
    type Domain = AnalysisRecord;

    fn into_domain(self) -> Option<AnalysisRecord> {
        Some(AnalysisRecord {
            symbol: Symbol::parse(&self.symbol)?,
            analysis_date: self.analysis_date,
            provider: self.provider.unwrap_or_default(),
            rating: Rating::parse_loose(self.rating.as_deref().unwrap_or_default()),
            price_target: self.price_target,
            risk_level: RiskLevel::parse_loose(self.risk_level.as_deref().unwrap_or_default()),
            financial_health: self.financial_health.unwrap_or_default(),
            strengths: self.strengths.unwrap_or_default(),
            weaknesses: self.weaknesses.unwrap_or_default(),
            opportunities: self.opportunities.unwrap_or_default(),
            threats: self.threats.unwrap_or_default(),
            short_term_outlook: self.short_term_outlook.unwrap_or_default(),
            long_term_outlook: self.long_term_outlook.unwrap_or_default(),
            dividend_analysis: self.dividend_analysis,
            ai_recommendation: self.ai_recommendation.unwrap_or_default(),
        })
    }
}

#[derive(Debug, FromRow)]
struct AnnouncementRow {
    id: Uuid,
    symbol: String,
    header: Option<String>,
    message: Option<String>,
    amount: Option<f64>,
    date: NaiveDate,
    created_at: DateTime<Utc>,
}

impl IntoDomain for AnnouncementRow {
    type Domain = DividendAnnouncement;

    fn into_domain(self) -> Option<DividendAnnouncement> {
        Some(DividendAnnouncement {
            id: self.id,
            symbol: Symbol::parse(&self.symbol)?,
            header: self.header.unwrap_or_default(),
            message: self.message.unwrap_or_default(),
            amount: self.amount,
            date: self.date,
            created_at: self.created_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct NewsRow {
    id: Uuid,
    symbol: Option<String>,
    title: String,
    source: Option<String>,
    url: String,
    published_at: DateTime<Utc>,
}

impl IntoDomain for NewsRow {
    type Domain = NewsItem;

    // News may be market-wide; an unusable symbol just detaches it from a ticker.
    fn into_domain(self) -> Option<NewsItem> {
        Some(NewsItem {
            id: self.id,
            symbol: self.symbol.as_deref().and_then(Symbol::parse),
            title: self.title,
            source: self.source,
            url: self.url,
            published_at: self.published_at,
        })
    }
}

/// Symbol column as compared against a parsed `Symbol`. Rows loaded outside this crate
/// may carry any case or padding.
const SYMBOL_KEY: &str = "upper(btrim(symbol))";

const WATCHLIST_COLUMNS: &str = "user_id, symbol, company_name, is_favorite, price, dividend_yield, \
     next_dividend_date, quantity, created_at";

const DIVIDEND_COLUMNS: &str = "symbol, short_name, ex_dividend_date, dividend_date, payout_date, \
     earnings_date, dividend_rate, dividend_yield, payout_ratio, earnings_average, revenue_average, \
     current_price, previous_close";

const ANALYSIS_COLUMNS: &str = "symbol, analysis_date, provider, rating, price_target, risk_level, \
     financial_health, strengths, weaknesses, opportunities, threats, short_term_outlook, \
     long_term_outlook, dividend_analysis, ai_recommendation";

#[async_trait]
impl WatchlistRepository for PgRecordStore {
    async fn fetch_by_user(&self, user_id: Uuid) -> anyhow::Result<Vec<WatchlistEntry>> {
        let rows = sqlx::query_as::<_, WatchlistRow>(&format!(
            "SELECT {WATCHLIST_COLUMNS} FROM watchlist_entries WHERE user_id = $1 ORDER BY created_at"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .context("select watchlist_entries failed")?;
        Ok(normalize_rows(Table::WatchlistEntries, rows))
    }

    async fn upsert_entry(&self, entry: &WatchlistEntry) -> anyhow::Result<()> {
        sqlx::query(
            "INSERT INTO watchlist_entries (user_id, symbol, company_name, is_favorite, price, \
             dividend_yield, next_dividend_date, quantity, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
             ON CONFLICT (user_id, symbol) DO UPDATE SET \
             company_name = EXCLUDED.company_name, is_favorite = EXCLUDED.is_favorite, \
             price = EXCLUDED.price, dividend_yield = EXCLUDED.dividend_yield, \
             next_dividend_date = EXCLUDED.next_dividend_date, quantity = EXCLUDED.quantity",
        )
        .bind(entry.user_id)
        .bind(entry.symbol.as_str())
        .bind(&entry.company_name)
        .bind(entry.is_favorite)
        .bind(entry.price)
        .bind(entry.dividend_yield)
        .bind(entry.next_dividend_date)
        .bind(entry.quantity)
        .bind(entry.created_at)
        .execute(&self.pool)
        .await
        .context("upsert watchlist_entries failed")?;
        Ok(())
    }

    async fn set_favorite(&self, user_id: Uuid, symbol: &Symbol, favorite: bool) -> anyhow::Result<bool> {
        let res = sqlx::query(
            &format!("UPDATE watchlist_entries SET is_favorite = $3 WHERE user_id = $1 AND {SYMBOL_KEY} = $2"),
        )
        .bind(user_id)
        .bind(symbol.as_str())
        .bind(favorite)
        .execute(&self.pool)
        .await
        .context("update watchlist_entries.is_favorite failed")?;
        Ok(res.rows_affected() > 0)
    }

    async fn set_quantity(&self, user_id: Uuid, symbol: &Symbol, quantity: i32) -> anyhow::Result<bool> {
        let res = sqlx::query(
            &format!("UPDATE watchlist_entries SET quantity = $3 WHERE user_id = $1 AND {SYMBOL_KEY} = $2"),
        )
        .bind(user_id)
        .bind(symbol.as_str())
        .bind(quantity)
        .execute(&self.pool)
        .await
        .context("update watchlist_entries.quantity failed")?;
        Ok(res.rows_affected() > 0)
    }

    async fn delete(&self, user_id: Uuid, symbol: &Symbol) -> anyhow::Result<bool> {
        let res = sqlx::query(&format!("DELETE FROM watchlist_entries WHERE user_id = $1 AND {SYMBOL_KEY} = $2"))
            .bind(user_id)
            .bind(symbol.as_str())
            .execute(&self.pool)
            .await
            .context("delete watchlist_entries failed")?;
        Ok(res.rows_affected() > 0)
    }

    async fn watched_symbols(&self) -> anyhow::Result<Vec<Symbol>> {
        let rows: Vec<(String,)> = sqlx::query_as(&format!(
            "SELECT DISTINCT {SYMBOL_KEY} FROM watchlist_entries"
        ))
        .fetch_all(&self.pool)
        .await
        .context("select watched symbols failed")?;
        Ok(distinct_symbols(rows.into_iter().map(|(s,)| s)))
    }
}

#[async_trait]
impl DividendRepository for PgRecordStore {
    async fn fetch_by_symbols(&self, symbols: &[Symbol]) -> anyhow::Result<Vec<DividendRecord>> {
        if symbols.is_empty() {
            return Ok(Vec::new());
        }
        let keys: Vec<String> = symbols.iter().map(|s| s.as_str().to_string()).collect();
        let rows = sqlx::query_as::<_, DividendRow>(&format!(
            "SELECT {DIVIDEND_COLUMNS} FROM dividend_records WHERE {SYMBOL_KEY} = ANY($1)"
        ))
        .bind(keys)
        .fetch_all(&self.pool)
        .await
        .context("select dividend_records by symbols failed")?;
        Ok(normalize_rows(Table::DividendRecords, rows))
    }

    async fn fetch_by_symbol(&self, symbol: &Symbol) -> anyhow::Result<Option<DividendRecord>> {
        let row = sqlx::query_as::<_, DividendRow>(&format!(
            "SELECT {DIVIDEND_COLUMNS} FROM dividend_records WHERE {SYMBOL_KEY} = $1 \
             ORDER BY (symbol = $1) DESC LIMIT 1"
        ))
        .bind(symbol.as_str())
        .fetch_optional(&self.pool)
        .await
        .context("select dividend_records by symbol failed")?;
        Ok(row.and_then(IntoDomain::into_domain))
    }

    async fn fetch_by_date_range(&self, from: NaiveDate, to: NaiveDate) -> anyhow::Result<Vec<DividendRecord>> {
        let rows = sqlx::query_as::<_, DividendRow>(&format!(
            "SELECT {DIVIDEND_COLUMNS} FROM dividend_records \
             WHERE ex_dividend_date BETWEEN $1 AND $2 \
                OR dividend_date BETWEEN $1 AND $2 \
                OR payout_date BETWEEN $1 AND $2 \
                OR earnings_date BETWEEN $1 AND $2 \
             ORDER BY symbol"
        ))
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await
        .context("select dividend_records by date range failed")?;
        Ok(normalize_rows(Table::DividendRecords, rows))
    }

    async fn fetch_earnings_between(&self, from: NaiveDate, to: NaiveDate) -> anyhow::Result<Vec<DividendRecord>> {
        let rows = sqlx::query_as::<_, DividendRow>(&format!(
            "SELECT {DIVIDEND_COLUMNS} FROM dividend_records \
             WHERE earnings_date BETWEEN $1 AND $2 ORDER BY earnings_date, symbol"
        ))
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await
        .context("select dividend_records earnings window failed")?;
        Ok(normalize_rows(Table::DividendRecords, rows))
    }

    async fn fetch_history(&self, symbol: &Symbol) -> anyhow::Result<Vec<DividendHistoryPoint>> {
        let rows = sqlx::query_as::<_, HistoryRow>(&format!(
            "SELECT symbol, date, amount FROM dividend_history WHERE {SYMBOL_KEY} = $1 ORDER BY date"
        ))
        .bind(symbol.as_str())
        .fetch_all(&self.pool)
        .await
        .context("select dividend_history failed")?;
        Ok(normalize_rows(Table::DividendHistory, rows))
    }
}

#[async_trait]
impl CompanyRepository for PgRecordStore {
    async fn fetch_logos(&self) -> anyhow::Result<Vec<CompanyReference>> {
        let rows = sqlx::query_as::<_, CompanyRow>(
            "SELECT symbol, company_name, logo_url, NULL::text AS sector, NULL::text AS industry \
             FROM company_logos",
        )
        .fetch_all(&self.pool)
        .await
        .context("select company_logos failed")?;
        Ok(normalize_rows(Table::CompanyLogos, rows))
    }

    async fn fetch_profiles(&self) -> anyhow::Result<Vec<CompanyReference>> {
        let rows = sqlx::query_as::<_, CompanyRow>(
            "SELECT symbol, company_name, NULL::text AS logo_url, sector, industry \
             FROM company_profiles",
        )
        .fetch_all(&self.pool)
        .await
        .context("select company_profiles failed")?;
        Ok(normalize_rows(Table::CompanyProfiles, rows))
    }

    async fn upsert_logos(&self, logos: &[CompanyReference]) -> anyhow::Result<usize> {
        let mut tx = self.pool.begin().await.context("begin transaction failed")?;
        for logo in logos {
            sqlx::query(
                "INSERT INTO company_logos (symbol, company_name, logo_url) VALUES ($1, $2, $3) \
                 ON CONFLICT (symbol) DO UPDATE SET \
                 company_name = COALESCE(EXCLUDED.company_name, company_logos.company_name), \
                 logo_url = EXCLUDED.logo_url",
            )
            .bind(logo.symbol.as_str())
            .bind(&logo.company_name)
            .bind(&logo.logo_url)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("upsert company_logos failed for {}", logo.symbol))?;
        }
        tx.commit().await.context("commit transaction failed")?;
        Ok(logos.len())
    }
}

#[async_trait]
impl AnalysisRepository for PgRecordStore {
    async fn latest_analysis(&self, symbol: &Symbol) -> anyhow::Result<Option<AnalysisRecord>> {
        let row = sqlx::query_as::<_, AnalysisRow>(&format!(
            "SELECT {ANALYSIS_COLUMNS} FROM stock_analyses WHERE {SYMBOL_KEY} = $1 \
             ORDER BY analysis_date DESC LIMIT 1"
        ))
        .bind(symbol.as_str())
        .fetch_optional(&self.pool)
        .await
        .context("select stock_analyses failed")?;
        Ok(row.and_then(IntoDomain::into_domain))
    }

    async fn upsert_analysis(&self, record: &AnalysisRecord) -> anyhow::Result<()> {
        sqlx::query(
            "INSERT INTO stock_analyses (symbol, analysis_date, provider, rating, price_target, \
             risk_level, financial_health, strengths, weaknesses, opportunities, threats, \
             short_term_outlook, long_term_outlook, dividend_analysis, ai_recommendation) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15) \
             ON CONFLICT (symbol) DO UPDATE SET \
             analysis_date = EXCLUDED.analysis_date, provider = EXCLUDED.provider, \
             rating = EXCLUDED.rating, price_target = EXCLUDED.price_target, \
             risk_level = EXCLUDED.risk_level, financial_health = EXCLUDED.financial_health, \
             strengths = EXCLUDED.strengths, weaknesses = EXCLUDED.weaknesses, \
             opportunities = EXCLUDED.opportunities, threats = EXCLUDED.threats, \
             short_term_outlook = EXCLUDED.short_term_outlook, \
             long_term_outlook = EXCLUDED.long_term_outlook, \
             dividend_analysis = EXCLUDED.dividend_analysis, \
             ai_recommendation = EXCLUDED.ai_recommendation",
        )
        .bind(record.symbol.as_str())
        .bind(record.analysis_date)
        .bind(&record.provider)
        .bind(record.rating.as_str())
        .bind(record.price_target)
        .bind(record.risk_level.as_str())
        .bind(&record.financial_health)
        .bind(&record.strengths)
        .bind(&record.weaknesses)
        .bind(&record.opportunities)
        .bind(&record.threats)
        .bind(&record.short_term_outlook)
        .bind(&record.long_term_outlook)
        .bind(&record.dividend_analysis)
        .bind(&record.ai_recommendation)
        .execute(&self.pool)
        .await
        .context("upsert stock_analyses failed")?;
        Ok(())
    }
}

#[async_trait]
impl NotificationRepository for PgRecordStore {
    async fn recent_announcements(&self, limit: usize) -> anyhow::Result<Vec<DividendAnnouncement>> {
        let rows = sqlx::query_as::<_, AnnouncementRow>(
            "SELECT id, symbol, header, message, amount, date, created_at \
             FROM dividend_announcements ORDER BY date DESC, created_at DESC LIMIT $1",
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .context("select dividend_announcements failed")?;
        Ok(normalize_rows(Table::DividendAnnouncements, rows))
    }

    async fn recent_news(&self, limit: usize) -> anyhow::Result<Vec<NewsItem>> {
        let rows = sqlx::query_as::<_, NewsRow>(
            "SELECT id, symbol, title, source, url, published_at \
             FROM news_items ORDER BY published_at DESC LIMIT $1",
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .context("select news_items failed")?;
        Ok(normalize_rows(Table::NewsItems, rows))
    }
}

#[async_trait]
impl ProfileRepository for PgRecordStore {
    async fn username(&self, user_id: Uuid) -> anyhow::Result<Option<String>> {
        let row: Option<(Option<String>,)> =
            sqlx::query_as("SELECT username FROM profiles WHERE id = $1")
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await
                .context("select profiles.username failed")?;
        Ok(row.and_then(|(name,)| name))
    }
}

#[async_trait]
impl RecordStore for PgRecordStore {
    fn changes(&self) -> &ChangeFeed {
        &self.feed
    }

    async fn close(&self) {
        self.shutdown.cancel();
        let tasks: Vec<JoinHandle<()>> = self.listeners.lock().await.drain(..).collect();
        for task in tasks {
            if let Err(err) = task.await {
                tracing::warn!(error = %err, "change listener task failed");
            }
        }
        self.pool.close().await;
        tracing::info!("record store closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::repo::ChangeOp;

    #[test]
    fn decodes_trigger_payload_without_symbol() {
        let ev = decode_change(
            r#"{"table":"profiles","op":"UPDATE","symbol":null,"user_id":"00000000-0000-0000-0000-000000000000"}"#,
        )
        .unwrap();
        assert_eq!(ev.table, Table::Profiles);
        assert_eq!(ev.op, ChangeOp::Update);
        assert!(ev.symbol.is_none());
    }

    #[test]
    fn watched_symbols_collapse_case_variants() {
        let raw = ["KO", "PEP", "ko", " pep ", "", "T"].map(String::from);
        let symbols = distinct_symbols(raw);
        let keys: Vec<&str> = symbols.iter().map(Symbol::as_str).collect();
        assert_eq!(keys, vec!["KO", "PEP", "T"]);
    }

    #[test]
    fn rejects_unknown_table() {
        assert!(decode_change(r#"{"table":"secrets","op":"DELETE"}"#).is_err());
    }

    #[test]
    fn rows_with_blank_symbol_are_dropped() {
        let rows = vec![
            CompanyRow {
                symbol: " ko ".to_string(),
                company_name: Some("Coca-Cola".to_string()),
                logo_url: Some("https://logo/ko.png".to_string()),
                sector: None,
                industry: None,
            },
            CompanyRow {
                symbol: "  ".to_string(),
                company_name: None,
                logo_url: Some("https://logo/x.png".to_string()),
                sector: None,
                industry: None,
            },
        ];
        let out = normalize_rows(Table::CompanyLogos, rows);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].symbol.as_str(), "KO");
    }

    #[test]
    fn analysis_row_normalizes_loose_fields() {
        let row = AnalysisRow {
            symbol: "aapl".to_string(),
            analysis_date: chrono::TimeZone::with_ymd_and_hms(&Utc, 2026, 10, 16, 0, 0, 0).unwrap(),
            provider: None,
            rating: Some("strong buy".to_string()),
            price_target: Some(250.0),
            risk_level: None,
            financial_health: None,
            strengths: Some(vec!["brand".to_string()]),
            weaknesses: None,
            opportunities: None,
            threats: None,
            short_term_outlook: None,
            long_term_outlook: None,
            dividend_analysis: None,
            ai_recommendation: Some("hold core position".to_string()),
        };
        let record = row.into_domain().unwrap();
        assert_eq!(record.symbol.as_str(), "AAPL");
        assert_eq!(record.rating, Rating::Buy);
        assert_eq!(record.risk_level, RiskLevel::Medium);
        assert_eq!(record.strengths, vec!["brand"]);
        assert!(record.threats.is_empty());
    }
}
