//! Request-level operations behind the dashboard views: fetch from the record store,
//! join reference data, then hand the result to the pure view builders.

use crate::domain::dividend::{dividend_growth, filter_history, DividendHistoryPoint, HistoryRange};
use crate::domain::notification::NotificationKind;
use crate::domain::watchlist::WatchlistEntry;
use crate::domain::Symbol;
use crate::llm::{AnalysisGenerator, AnalysisInput};
use crate::prefs::LocalPrefs;
use crate::reference::cache::{ReferenceCache, ReferenceTables};
use crate::reference::{self, LogoEntry, ReferenceData, ReferenceMap};
use crate::staleness::{AnalysisOutcome, StalenessGate};
use crate::storage::repo::{
    CompanyRepository, DividendRepository, NotificationRepository, ProfileRepository, RecordStore,
    WatchlistRepository,
};
use crate::time::calendar::month_bounds;
use crate::view::calendar::CalendarMonth;
use crate::view::factor::{FactorScore, FactorWeights};
use crate::view::feed::{self, NotificationFeed, ANNOUNCEMENT_LIMIT, EARNINGS_WINDOW_DAYS, NEWS_LIMIT};
use crate::view::merge::{merge_watchlist, WatchlistView};
use crate::view::pipeline::{self, FilterSet, SortSpec};
use crate::view::{paginate, Page, DEFAULT_PER_PAGE};
use anyhow::Context;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

pub const FALLBACK_DISPLAY_NAME: &str = "User";

/// Returned by [`Dashboard::analysis`] when no generator was configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnalysisUnavailable;

impl fmt::Display for AnalysisUnavailable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("analysis provider is not configured")
    }
}

impl std::error::Error for AnalysisUnavailable {}

#[derive(Debug, Clone, PartialEq)]
pub struct WatchlistQuery {
    pub filters: FilterSet,
    pub sort: Option<SortSpec>,
    pub page: usize,
    pub per_page: usize,
}

impl Default for WatchlistQuery {
    fn default() -> Self {
        Self {
            filters: FilterSet::default(),
            sort: None,
            page: 1,
            per_page: DEFAULT_PER_PAGE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DividendHistoryView {
    pub symbol: Symbol,
    pub range: HistoryRange,
    pub points: Vec<DividendHistoryPoint>,
    /// Compound growth per payment across the points in range, in percent.
    pub growth_pct: f64,
}

pub struct Dashboard {
    store: Arc<dyn RecordStore>,
    file_logos: ReferenceMap<LogoEntry>,
    gate: StalenessGate,
    generator: Option<Arc<dyn AnalysisGenerator>>,
    prefs: LocalPrefs,
    weights: FactorWeights,
    cache: Option<ReferenceCache>,
}

impl Dashboard {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self {
            store,
            file_logos: ReferenceMap::new(),
            gate: StalenessGate::default(),
            generator: None,
            prefs: LocalPrefs::default(),
            weights: FactorWeights::default(),
            cache: None,
        }
    }

    /// Logos from the reference file. Store logos still win on conflict.
    pub fn with_file_logos(mut self, logos: ReferenceMap<LogoEntry>) -> Self {
        self.file_logos = logos;
        self
    }

    pub fn with_gate(mut self, gate: StalenessGate) -> Self {
        self.gate = gate;
        self
    }

    pub fn with_generator(mut self, generator: Arc<dyn AnalysisGenerator>) -> Self {
        self.generator = Some(generator);
        self
    }

    pub fn with_prefs(mut self, prefs: LocalPrefs) -> Self {
        self.prefs = prefs;
        self
    }

    /// Keeps logo and profile tables between requests, reloading after a change event
    /// on either table. Only useful when the store's change feed is live.
    pub fn with_reference_cache(mut self) -> Self {
        self.cache = Some(ReferenceCache::watch(self.store.changes()));
        self
    }

    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.store
    }

    /// Logo and profile tables (cached when enabled) plus dividend rows for `symbols`,
    /// fetched concurrently. A failed table is logged and left empty.
    pub async fn reference_data(&self, symbols: &[Symbol]) -> ReferenceData {
        let store = &self.store;
        let (tables, dividends) = tokio::join!(self.reference_tables(), async {
            if symbols.is_empty() {
                Ok(Vec::new())
            } else {
                store.fetch_by_symbols(symbols).await
            }
        });

        let dividends = dividends.unwrap_or_else(|err| {
            tracing::warn!(error = %err, "dividend fetch failed; dividend fields unavailable");
            Vec::new()
        });

        ReferenceData {
            logos: tables.logos,
            profiles: tables.profiles,
            dividends: reference::dividend_map(&dividends),
        }
    }

    async fn reference_tables(&self) -> ReferenceTables {
        match &self.cache {
            Some(cache) => cache.get_or_load(|| self.load_reference_tables()).await,
            None => self.load_reference_tables().await.0,
        }
    }

    /// The flag is false when either table failed and was replaced by an empty map.
    async fn load_reference_tables(&self) -> (ReferenceTables, bool) {
        let (logos, profiles) = tokio::join!(self.store.fetch_logos(), self.store.fetch_profiles());
        let mut complete = true;

        let logos = logos.unwrap_or_else(|err| {
            tracing::warn!(error = %err, "logo fetch failed; using reference file only");
            complete = false;
            Vec::new()
        });
        let profiles = profiles.unwrap_or_else(|err| {
            tracing::warn!(error = %err, "profile fetch failed; sector data unavailable");
            complete = false;
            Vec::new()
        });

        let tables = ReferenceTables {
            logos: Arc::new(self.file_logos.clone().overlay(reference::logo_map(&logos))),
            profiles: Arc::new(reference::profile_map(&profiles)),
        };
        (tables, complete)
    }

    pub async fn watchlist(&self, user_id: Uuid, query: &WatchlistQuery) -> anyhow::Result<Page<WatchlistView>> {
        let entries = self
            .store
            .fetch_by_user(user_id)
            .await
            .with_context(|| format!("failed to load watchlist for {user_id}"))?;
        let symbols: Vec<Symbol> = entries.iter().map(|e| e.symbol.clone()).collect();
        let refs = self.reference_data(&symbols).await;

        let views = merge_watchlist(&entries, &refs);
        let shown = pipeline::apply(&views, &query.filters, query.sort);
        Ok(paginate(shown, query.page, query.per_page))
    }

    pub async fn save(&self, entry: &WatchlistEntry) -> anyhow::Result<()> {
        self.store
            .upsert_entry(entry)
            .await
            .with_context(|| format!("failed to save {} for {}", entry.symbol, entry.user_id))?;
        tracing::info!(user_id = %entry.user_id, symbol = %entry.symbol, "watchlist entry saved");
        Ok(())
    }

    /// Returns `false` when the user has no entry for `symbol`.
    pub async fn toggle_favorite(&self, user_id: Uuid, symbol: &Symbol, favorite: bool) -> anyhow::Result<bool> {
        self.store
            .set_favorite(user_id, symbol, favorite)
            .await
            .with_context(|| format!("failed to update favorite for {symbol}"))
    }

    pub async fn set_quantity(&self, user_id: Uuid, symbol: &Symbol, quantity: i32) -> anyhow::Result<bool> {
        anyhow::ensure!(quantity > 0, "quantity must be positive, got {quantity}");
        self.store
            .set_quantity(user_id, symbol, quantity)
            .await
            .with_context(|| format!("failed to update quantity for {symbol}"))
    }

    pub async fn remove(&self, user_id: Uuid, symbol: &Symbol) -> anyhow::Result<bool> {
        let removed = self
            .store
            .delete(user_id, symbol)
            .await
            .with_context(|| format!("failed to remove {symbol} for {user_id}"))?;
        if removed {
            tracing::info!(user_id = %user_id, symbol = %symbol, "watchlist entry removed");
        }
        Ok(removed)
    }

    pub async fn calendar(&self, year: i32, month: u32) -> anyhow::Result<CalendarMonth> {
        let (first, last) = month_bounds(year, month)?;
        let records = self
            .store
            .fetch_by_date_range(first, last)
            .await
            .with_context(|| format!("failed to load dividend dates for {year}-{month:02}"))?;
        let refs = self.reference_data(&[]).await;
        CalendarMonth::build(year, month, &records, &refs)
    }

    /// Each source degrades to empty on failure so the feed still renders.
    pub async fn notifications(
        &self,
        kind: Option<NotificationKind>,
        highlight: Option<&str>,
        now: DateTime<Utc>,
    ) -> NotificationFeed {
        let today = now.date_naive();
        let store = &self.store;
        let (announcements, earnings, news) = tokio::join!(
            store.recent_announcements(ANNOUNCEMENT_LIMIT),
            store.fetch_earnings_between(today, today + Duration::days(EARNINGS_WINDOW_DAYS)),
            store.recent_news(NEWS_LIMIT),
        );

        let announcements = announcements.unwrap_or_else(|err| {
            tracing::warn!(error = %err, "announcement fetch failed");
            Vec::new()
        });
        let earnings = earnings.unwrap_or_else(|err| {
            tracing::warn!(error = %err, "earnings fetch failed");
            Vec::new()
        });
        let news = news.unwrap_or_else(|err| {
            tracing::warn!(error = %err, "news fetch failed");
            Vec::new()
        });

        let refs = self.reference_data(&[]).await;
        let items = feed::assemble(announcements, &earnings, news, &refs);
        feed::build_feed(items, kind, highlight, now)
    }

    /// `None` when the symbol has no dividend record.
    pub async fn factors(&self, symbol: &Symbol) -> anyhow::Result<Option<FactorScore>> {
        let record = self
            .store
            .fetch_by_symbol(symbol)
            .await
            .with_context(|| format!("failed to load dividend record for {symbol}"))?;
        Ok(record.map(|r| FactorScore::compute(&r, self.weights)))
    }

    pub async fn dividend_history(
        &self,
        symbol: &Symbol,
        range: HistoryRange,
        today: NaiveDate,
    ) -> anyhow::Result<DividendHistoryView> {
        let history = self
            .store
            .fetch_history(symbol)
            .await
            .with_context(|| format!("failed to load dividend history for {symbol}"))?;
        let points = filter_history(&history, range, today);
        let growth_pct = dividend_growth(&points, points.len().saturating_sub(1));
        Ok(DividendHistoryView {
            symbol: symbol.clone(),
            range,
            points,
            growth_pct,
        })
    }

    /// Profile username, then the locally saved one, then the e-mail local part.
    pub async fn display_name(&self, user_id: Uuid, email: Option<&str>) -> String {
        let stored = match self.store.username(user_id).await {
            Ok(name) => reference::non_blank(name.as_deref()),
            Err(err) => {
                tracing::warn!(user_id = %user_id, error = %err, "profile lookup failed");
                None
            }
        };

        stored
            .or_else(|| self.prefs.username().map(str::to_string))
            .or_else(|| {
                let local = email?.split('@').next()?;
                reference::non_blank(Some(local))
            })
            .unwrap_or_else(|| FALLBACK_DISPLAY_NAME.to_string())
    }

    pub async fn analysis(&self, symbol: &Symbol, now: DateTime<Utc>) -> anyhow::Result<AnalysisOutcome> {
        let Some(generator) = self.generator.as_deref() else {
            return Err(AnalysisUnavailable.into());
        };
        let input = self.analysis_input(symbol).await;
        self.gate
            .get_or_generate(self.store.as_ref(), generator, &input, now)
            .await
    }

    async fn analysis_input(&self, symbol: &Symbol) -> AnalysisInput {
        let refs = self.reference_data(std::slice::from_ref(symbol)).await;
        let key = symbol.as_str();
        let logo = refs.logos.get(key);
        let profile = refs.profiles.get(key);
        let dividend = refs.dividends.get(key);

        let mut input = AnalysisInput::new(symbol.clone());
        input.company_name = logo
            .and_then(|l| l.company_name.clone())
            .or_else(|| profile.and_then(|p| p.company_name.clone()))
            .or_else(|| dividend.and_then(|d| reference::non_blank(d.short_name.as_deref())));
        input.sector = profile.and_then(|p| p.sector.clone());
        input.industry = profile.and_then(|p| p.industry.clone());
        input.price = dividend.and_then(|d| d.current_price);
        input.dividend_yield = dividend.and_then(|d| d.dividend_yield);
        input.payout_ratio = dividend.and_then(|d| d.payout_ratio);
        input
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::analysis::{AnalysisRecord, Rating, RiskLevel};
    use crate::domain::company::CompanyReference;
    use crate::domain::dividend::DividendRecord;
    use crate::domain::notification::{DividendAnnouncement, NewsItem};
    use crate::llm::Provider;
    use crate::staleness::AnalysisSource;
    use crate::storage::memory::MemoryStore;
    use crate::storage::repo::Table;
    use crate::view::pipeline::{SortDirection, SortKey};
    use crate::view::{NOT_AVAILABLE, PLACEHOLDER_LOGO};
    use chrono::TimeZone;
    use std::sync::Mutex;

    fn sym(s: &str) -> Symbol {
        Symbol::parse(s).unwrap()
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 16, 12, 0, 0).unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn entry(user: Uuid, symbol: &str, price: f64, minute: u32) -> WatchlistEntry {
        let mut e = WatchlistEntry::new(user, sym(symbol), "");
        e.price = Some(price);
        e.created_at = Utc.with_ymd_and_hms(2026, 10, 1, 0, minute, 0).unwrap();
        e
    }

    fn profile(symbol: &str, sector: &str) -> CompanyReference {
        let mut p = CompanyReference::new(sym(symbol));
        p.sector = Some(sector.to_string());
        p
    }

    async fn seeded() -> (Arc<MemoryStore>, Uuid) {
        let store = Arc::new(MemoryStore::new());
        let user = Uuid::new_v4();
        store.upsert_entry(&entry(user, "KO", 62.0, 0)).await.unwrap();
        store.upsert_entry(&entry(user, "MSFT", 400.0, 1)).await.unwrap();
        store.upsert_entry(&entry(user, "PEP", 170.0, 2)).await.unwrap();
        store.put_profile(profile("KO", "Consumer Defensive")).await;
        store.put_profile(profile("PEP", "Consumer Defensive")).await;
        (store, user)
    }

    fn logo(symbol: &str, url: &str) -> CompanyReference {
        let mut c = CompanyReference::new(sym(symbol));
        c.logo_url = Some(url.to_string());
        c
    }

    #[tokio::test]
    async fn cached_reference_tables_reload_after_logo_change() {
        let store = Arc::new(MemoryStore::new());
        store.upsert_logos(&[logo("KO", "https://logo/ko-old.png")]).await.unwrap();
        let dashboard = Dashboard::new(store.clone()).with_reference_cache();

        let refs = dashboard.reference_data(&[]).await;
        assert_eq!(refs.logos.get("KO").unwrap().logo_url, "https://logo/ko-old.png");

        // Held copy is served without touching the store.
        store.fail_reads_on(Table::CompanyLogos).await;
        let refs = dashboard.reference_data(&[]).await;
        assert_eq!(refs.logos.get("KO").unwrap().logo_url, "https://logo/ko-old.png");
        store.restore(Table::CompanyLogos).await;

        store.upsert_logos(&[logo("KO", "https://logo/ko-new.png")]).await.unwrap();
        let reloaded = tokio::time::timeout(std::time::Duration::from_secs(1), async {
            loop {
                let refs = dashboard.reference_data(&[]).await;
                if refs.logos.get("KO").unwrap().logo_url == "https://logo/ko-new.png" {
                    break;
                }
                tokio::time::sleep(std::time::Duration::from_millis(5)).await;
            }
        })
        .await;
        assert!(reloaded.is_ok());
    }

    #[tokio::test]
    async fn failed_reference_load_is_retried_next_request() {
        let store = Arc::new(MemoryStore::new());
        store.upsert_logos(&[logo("KO", "https://logo/ko.png")]).await.unwrap();
        store.fail_reads_on(Table::CompanyLogos).await;
        let dashboard = Dashboard::new(store.clone()).with_reference_cache();

        assert!(dashboard.reference_data(&[]).await.logos.is_empty());

        store.restore(Table::CompanyLogos).await;
        assert_eq!(dashboard.reference_data(&[]).await.logos.len(), 1);
    }

    #[tokio::test]
    async fn watchlist_filters_sorts_and_paginates() {
        let (store, user) = seeded().await;
        let dashboard = Dashboard::new(store);

        let query = WatchlistQuery {
            filters: FilterSet {
                sector: Some("consumer defensive".to_string()),
                ..FilterSet::default()
            },
            sort: Some(SortSpec {
                key: SortKey::Price,
                direction: SortDirection::Desc,
            }),
            page: 1,
            per_page: 1,
        };
        let page = dashboard.watchlist(user, &query).await.unwrap();

        assert_eq!(page.total_items, 2);
        assert_eq!(page.total_pages, 2);
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].symbol.as_str(), "PEP");
    }

    #[tokio::test]
    async fn reference_outage_degrades_to_placeholders() {
        let (store, user) = seeded().await;
        store.fail_reads_on(Table::CompanyProfiles).await;
        store.fail_reads_on(Table::CompanyLogos).await;
        let dashboard = Dashboard::new(store);

        let page = dashboard
            .watchlist(user, &WatchlistQuery::default())
            .await
            .unwrap();

        assert_eq!(page.total_items, 3);
        for view in &page.items {
            assert_eq!(view.sector, NOT_AVAILABLE);
            assert_eq!(view.logo_url, PLACEHOLDER_LOGO);
        }
    }

    #[tokio::test]
    async fn primary_fetch_failure_propagates() {
        let (store, user) = seeded().await;
        store.fail_reads_on(Table::WatchlistEntries).await;
        let dashboard = Dashboard::new(store);

        assert!(dashboard
            .watchlist(user, &WatchlistQuery::default())
            .await
            .is_err());
    }

    #[tokio::test]
    async fn store_logos_override_file_logos() {
        let (store, user) = seeded().await;
        let mut db_logo = CompanyReference::new(sym("KO"));
        db_logo.logo_url = Some("https://db/ko.png".to_string());
        store.upsert_logos(&[db_logo]).await.unwrap();

        let file_logos: ReferenceMap<LogoEntry> = vec![
            (
                "KO".to_string(),
                LogoEntry {
                    logo_url: "https://file/ko.png".to_string(),
                    company_name: Some("Coca-Cola".to_string()),
                },
            ),
            (
                "PEP".to_string(),
                LogoEntry {
                    logo_url: "https://file/pep.png".to_string(),
                    company_name: None,
                },
            ),
        ]
        .into_iter()
        .collect();
        let dashboard = Dashboard::new(store).with_file_logos(file_logos);

        let page = dashboard
            .watchlist(user, &WatchlistQuery::default())
            .await
            .unwrap();
        let logo = |s: &str| {
            page.items
                .iter()
                .find(|v| v.symbol.as_str() == s)
                .map(|v| v.logo_url.clone())
                .unwrap()
        };
        assert_eq!(logo("KO"), "https://db/ko.png");
        assert_eq!(logo("PEP"), "https://file/pep.png");
        assert_eq!(logo("MSFT"), PLACEHOLDER_LOGO);
    }

    #[tokio::test]
    async fn mutations_report_missing_rows() {
        let (store, user) = seeded().await;
        let dashboard = Dashboard::new(store.clone());

        assert!(dashboard.toggle_favorite(user, &sym("KO"), true).await.unwrap());
        assert!(!dashboard.toggle_favorite(user, &sym("T"), true).await.unwrap());
        assert!(dashboard.set_quantity(user, &sym("KO"), 0).await.is_err());
        assert!(dashboard.set_quantity(user, &sym("KO"), 12).await.unwrap());
        assert!(dashboard.remove(user, &sym("MSFT")).await.unwrap());
        assert!(!dashboard.remove(user, &sym("MSFT")).await.unwrap());

        let query = WatchlistQuery {
            filters: FilterSet {
                favorites_only: true,
                ..FilterSet::default()
            },
            ..WatchlistQuery::default()
        };
        let page = dashboard.watchlist(user, &query).await.unwrap();
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].quantity, 12);
    }

    #[tokio::test]
    async fn calendar_places_events_on_their_days() {
        let store = Arc::new(MemoryStore::new());
        let mut ko = DividendRecord::empty(sym("KO"));
        ko.ex_dividend_date = Some(date(2026, 11, 14));
        ko.payout_date = Some(date(2026, 12, 1));
        ko.dividend_rate = Some(0.51);
        store.put_dividend(ko).await;
        let dashboard = Dashboard::new(store);

        let month = dashboard.calendar(2026, 11).await.unwrap();
        assert_eq!(month.event_count(), 1);
        let day = month.day(date(2026, 11, 14)).unwrap();
        assert_eq!(day.events[0].company_name, "KO");

        assert!(dashboard.calendar(2026, 13).await.is_err());
    }

    #[tokio::test]
    async fn notifications_survive_a_failing_source() {
        let store = Arc::new(MemoryStore::new());
        store
            .put_announcement(DividendAnnouncement {
                id: Uuid::new_v4(),
                symbol: sym("KO"),
                header: "Dividend declared".to_string(),
                message: "KO declares $0.51".to_string(),
                amount: Some(0.51),
                date: date(2026, 10, 15),
                created_at: now(),
            })
            .await;
        let news_id = Uuid::new_v4();
        store
            .put_news(NewsItem {
                id: news_id,
                symbol: None,
                title: "Markets rally".to_string(),
                source: None,
                url: "https://news/1".to_string(),
                published_at: now() - Duration::hours(2),
            })
            .await;
        let mut earnings = DividendRecord::empty(sym("PEP"));
        earnings.earnings_date = Some(date(2026, 10, 20));
        store.put_dividend(earnings).await;
        store.fail_reads_on(Table::NewsItems).await;
        let dashboard = Dashboard::new(store.clone());

        let feed = dashboard.notifications(None, None, now()).await;
        assert_eq!(feed.items.len(), 2);
        assert_eq!(feed.items[0].item.kind(), NotificationKind::Earnings);

        store.restore(Table::NewsItems).await;
        let highlight = news_id.to_string();
        let feed = dashboard
            .notifications(Some(NotificationKind::News), Some(&highlight), now())
            .await;
        assert_eq!(feed.items.len(), 1);
        assert_eq!(feed.highlighted_index, Some(0));
        assert_eq!(feed.items[0].age, "2 hours ago");
    }

    #[tokio::test]
    async fn factors_and_history_for_known_symbol() {
        let store = Arc::new(MemoryStore::new());
        let mut ko = DividendRecord::empty(sym("KO"));
        ko.dividend_yield = Some(3.0);
        ko.payout_ratio = Some(70.0);
        store.put_dividend(ko).await;
        for (y, amount) in [(2023, 1.0), (2024, 1.1), (2025, 1.21)] {
            store
                .put_history(DividendHistoryPoint {
                    symbol: sym("KO"),
                    date: date(y, 6, 1),
                    amount,
                })
                .await;
        }
        let dashboard = Dashboard::new(store);

        let score = dashboard.factors(&sym("KO")).await.unwrap().unwrap();
        assert_eq!(score.dividend_factor, 60);
        assert_eq!(score.risk_factor, 30);
        assert_eq!(score.total, 45);
        assert!(dashboard.factors(&sym("ZZZ")).await.unwrap().is_none());

        let history = dashboard
            .dividend_history(&sym("KO"), HistoryRange::Max, date(2026, 10, 16))
            .await
            .unwrap();
        assert_eq!(history.points.len(), 3);
        assert!((history.growth_pct - 10.0).abs() < 1e-9);

        let recent = dashboard
            .dividend_history(&sym("KO"), HistoryRange::OneYear, date(2026, 10, 16))
            .await
            .unwrap();
        assert!(recent.points.is_empty());
        assert_eq!(recent.growth_pct, 0.0);
    }

    #[tokio::test]
    async fn display_name_fallback_chain() {
        let store = Arc::new(MemoryStore::new());
        let known = Uuid::new_v4();
        store.put_username(known, "dividend_dana").await;
        let plain = Dashboard::new(store.clone());

        assert_eq!(plain.display_name(known, None).await, "dividend_dana");
        assert_eq!(
            plain.display_name(Uuid::new_v4(), Some("sam@example.com")).await,
            "sam"
        );
        assert_eq!(plain.display_name(Uuid::new_v4(), None).await, "User");

        let with_prefs = Dashboard::new(store).with_prefs(LocalPrefs {
            username: Some("local".to_string()),
        });
        assert_eq!(
            with_prefs.display_name(Uuid::new_v4(), Some("sam@example.com")).await,
            "local"
        );
    }

    struct RecordingGenerator {
        inputs: Mutex<Vec<AnalysisInput>>,
    }

    #[async_trait::async_trait]
    impl AnalysisGenerator for RecordingGenerator {
        fn provider(&self) -> Provider {
            Provider::Anthropic
        }

        async fn generate_analysis(
            &self,
            input: &AnalysisInput,
            generated_at: DateTime<Utc>,
        ) -> anyhow::Result<AnalysisRecord> {
            self.inputs.lock().unwrap().push(input.clone());
            Ok(AnalysisRecord {
                symbol: input.symbol.clone(),
                analysis_date: generated_at,
                provider: "anthropic".to_string(),
                rating: Rating::Buy,
                price_target: Some(70.0),
                risk_level: RiskLevel::Low,
                financial_health: "solid".to_string(),
                strengths: vec![],
                weaknesses: vec![],
                opportunities: vec![],
                threats: vec![],
                short_term_outlook: String::new(),
                long_term_outlook: String::new(),
                dividend_analysis: None,
                ai_recommendation: "Buy".to_string(),
            })
        }
    }

    #[tokio::test]
    async fn analysis_requires_a_generator() {
        let dashboard = Dashboard::new(Arc::new(MemoryStore::new()));
        let err = dashboard.analysis(&sym("KO"), now()).await.unwrap_err();
        assert!(err.downcast_ref::<AnalysisUnavailable>().is_some());
    }

    #[tokio::test]
    async fn analysis_sends_joined_context_and_caches() {
        let (store, _) = seeded().await;
        let mut ko = DividendRecord::empty(sym("KO"));
        ko.current_price = Some(62.5);
        ko.short_name = Some("Coca-Cola Co".to_string());
        store.put_dividend(ko).await;
        let generator = Arc::new(RecordingGenerator {
            inputs: Mutex::new(Vec::new()),
        });
        let dashboard = Dashboard::new(store).with_generator(generator.clone());

        let first = dashboard.analysis(&sym("ko"), now()).await.unwrap();
        let second = dashboard
            .analysis(&sym("KO"), now() + Duration::hours(1))
            .await
            .unwrap();

        assert_eq!(first.source, AnalysisSource::Generated);
        assert_eq!(second.source, AnalysisSource::Cached);
        let inputs = generator.inputs.lock().unwrap();
        assert_eq!(inputs.len(), 1);
        assert_eq!(inputs[0].sector.as_deref(), Some("Consumer Defensive"));
        assert_eq!(inputs[0].company_name.as_deref(), Some("Coca-Cola Co"));
        assert_eq!(inputs[0].price, Some(62.5));
    }
}
