use crate::domain::analysis::AnalysisRecord;
use crate::domain::company::CompanyReference;
use crate::domain::dividend::{DividendHistoryPoint, DividendRecord};
use crate::domain::notification::{DividendAnnouncement, NewsItem};
use crate::domain::watchlist::WatchlistEntry;
use crate::domain::Symbol;
use crate::storage::realtime::ChangeFeed;
use crate::storage::repo::{
    AnalysisRepository, ChangeEvent, ChangeOp, CompanyRepository, DividendRepository,
    NotificationRepository, ProfileRepository, RecordStore, Table, WatchlistRepository,
};
use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, Default)]
struct Tables {
    watchlist: Vec<WatchlistEntry>,
    dividends: BTreeMap<Symbol, DividendRecord>,
    history: Vec<DividendHistoryPoint>,
    logos: BTreeMap<Symbol, CompanyReference>,
    profiles: BTreeMap<Symbol, CompanyReference>,
    analyses: HashMap<Symbol, AnalysisRecord>,
    announcements: Vec<DividendAnnouncement>,
    news: Vec<NewsItem>,
    usernames: HashMap<Uuid, String>,
}

/// Process-local record store. Used by tests and `--dry-run` jobs; publishes a change
/// event for every write and can simulate an outage per table.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
    feed: ChangeFeed,
    failing_reads: RwLock<HashSet<Table>>,
    failing_writes: RwLock<HashSet<Table>>,
    analysis_writes: AtomicUsize,
    closed: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn fail_reads_on(&self, table: Table) {
        self.failing_reads.write().await.insert(table);
    }

    pub async fn fail_writes_on(&self, table: Table) {
        self.failing_writes.write().await.insert(table);
    }

    pub async fn restore(&self, table: Table) {
        self.failing_reads.write().await.remove(&table);
        self.failing_writes.write().await.remove(&table);
    }

    pub fn analysis_writes(&self) -> usize {
        self.analysis_writes.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub async fn put_dividend(&self, record: DividendRecord) {
        let symbol = record.symbol.clone();
        let op = match self.tables.write().await.dividends.insert(symbol.clone(), record) {
            Some(_) => ChangeOp::Update,
            None => ChangeOp::Insert,
        };
        self.emit(Table::DividendRecords, op, Some(symbol), None);
    }

    pub async fn put_history(&self, point: DividendHistoryPoint) {
        let symbol = point.symbol.clone();
        self.tables.write().await.history.push(point);
        self.emit(Table::DividendHistory, ChangeOp::Insert, Some(symbol), None);
    }

    pub async fn put_profile(&self, profile: CompanyReference) {
        let symbol = profile.symbol.clone();
        self.tables
            .write()
            .await
            .profiles
            .insert(symbol.clone(), profile);
        self.emit(Table::CompanyProfiles, ChangeOp::Insert, Some(symbol), None);
    }

    pub async fn put_announcement(&self, announcement: DividendAnnouncement) {
        let symbol = announcement.symbol.clone();
        self.tables.write().await.announcements.push(announcement);
        self.emit(Table::DividendAnnouncements, ChangeOp::Insert, Some(symbol), None);
    }

    pub async fn put_news(&self, item: NewsItem) {
        let symbol = item.symbol.clone();
        self.tables.write().await.news.push(item);
        self.emit(Table::NewsItems, ChangeOp::Insert, symbol, None);
    }

    pub async fn put_username(&self, user_id: Uuid, username: &str) {
        self.tables
            .write()
            .await
            .usernames
            .insert(user_id, username.to_string());
        self.emit(Table::Profiles, ChangeOp::Update, None, Some(user_id));
    }

    async fn check_read(&self, table: Table) -> anyhow::Result<()> {
        self.check_open()?;
        if self.failing_reads.read().await.contains(&table) {
            anyhow::bail!("simulated outage reading {table}");
        }
        Ok(())
    }

    async fn check_write(&self, table: Table) -> anyhow::Result<()> {
        self.check_open()?;
        if self.failing_writes.read().await.contains(&table) {
            anyhow::bail!("simulated outage writing {table}");
        }
        Ok(())
    }

    fn check_open(&self) -> anyhow::Result<()> {
        anyhow::ensure!(!self.is_closed(), "record store is closed");
        Ok(())
    }

    fn emit(&self, table: Table, op: ChangeOp, symbol: Option<Symbol>, user_id: Option<Uuid>) {
        self.feed.publish(ChangeEvent {
            table,
            op,
            symbol,
            user_id,
        });
    }
}

fn in_range(date: Option<NaiveDate>, from: NaiveDate, to: NaiveDate) -> bool {
    date.is_some_and(|d| d >= from && d <= to)
}

#[async_trait]
impl WatchlistRepository for MemoryStore {
    async fn fetch_by_user(&self, user_id: Uuid) -> anyhow::Result<Vec<WatchlistEntry>> {
        self.check_read(Table::WatchlistEntries).await?;
        let tables = self.tables.read().await;
        let mut out: Vec<WatchlistEntry> = tables
            .watchlist
            .iter()
            .filter(|e| e.user_id == user_id)
            .cloned()
            .collect();
        out.sort_by_key(|e| e.created_at);
        Ok(out)
    }

    async fn upsert_entry(&self, entry: &WatchlistEntry) -> anyhow::Result<()> {
        self.check_write(Table::WatchlistEntries).await?;
        let op = {
            let mut tables = self.tables.write().await;
            match tables
                .watchlist
                .iter()
                .position(|e| e.user_id == entry.user_id && e.symbol == entry.symbol)
            {
                Some(idx) => {
                    tables.watchlist[idx] = entry.clone();
                    ChangeOp::Update
                }
                None => {
                    tables.watchlist.push(entry.clone());
                    ChangeOp::Insert
                }
            }
        };
        self.emit(Table::WatchlistEntries, op, Some(entry.symbol.clone()), Some(entry.user_id));
        Ok(())
    }

    async fn set_favorite(&self, user_id: Uuid, symbol: &Symbol, favorite: bool) -> anyhow::Result<bool> {
        self.check_write(Table::WatchlistEntries).await?;
        let found = {
            let mut tables = self.tables.write().await;
            match tables
                .watchlist
                .iter_mut()
                .find(|e| e.user_id == user_id && &e.symbol == symbol)
            {
                Some(e) => {
                    e.is_favorite = favorite;
                    true
                }
                None => false,
            }
        };
        if found {
            self.emit(Table::WatchlistEntries, ChangeOp::Update, Some(symbol.clone()), Some(user_id));
        }
        Ok(found)
    }

    async fn set_quantity(&self, user_id: Uuid, symbol: &Symbol, quantity: i32) -> anyhow::Result<bool> {
        self.check_write(Table::WatchlistEntries).await?;
        let found = {
            let mut tables = self.tables.write().await;
            match tables
                .watchlist
                .iter_mut()
                .find(|e| e.user_id == user_id && &e.symbol == symbol)
            {
                Some(e) => {
                    e.quantity = Some(quantity);
                    true
                }
                None => false,
            }
        };
        if found {
            self.emit(Table::WatchlistEntries, ChangeOp::Update, Some(symbol.clone()), Some(user_id));
        }
        Ok(found)
    }

    async fn delete(&self, user_id: Uuid, symbol: &Symbol) -> anyhow::Result<bool> {
        self.check_write(Table::WatchlistEntries).await?;
        let removed = {
            let mut tables = self.tables.write().await;
            let before = tables.watchlist.len();
            tables
                .watchlist
                .retain(|e| !(e.user_id == user_id && &e.symbol == symbol));
            tables.watchlist.len() != before
        };
        if removed {
            self.emit(Table::WatchlistEntries, ChangeOp::Delete, Some(symbol.clone()), Some(user_id));
        }
        Ok(removed)
    }

    async fn watched_symbols(&self) -> anyhow::Result<Vec<Symbol>> {
        self.check_read(Table::WatchlistEntries).await?;
        let tables = self.tables.read().await;
        let set: BTreeSet<Symbol> = tables.watchlist.iter().map(|e| e.symbol.clone()).collect();
        Ok(set.into_iter().collect())
    }
}

#[async_trait]
impl DividendRepository for MemoryStore {
    async fn fetch_by_symbols(&self, symbols: &[Symbol]) -> anyhow::Result<Vec<DividendRecord>> {
        self.check_read(Table::DividendRecords).await?;
        let tables = self.tables.read().await;
        Ok(symbols
            .iter()
            .filter_map(|s| tables.dividends.get(s).cloned())
            .collect())
    }

    async fn fetch_by_symbol(&self, symbol: &Symbol) -> anyhow::Result<Option<DividendRecord>> {
        self.check_read(Table::DividendRecords).await?;
        Ok(self.tables.read().await.dividends.get(symbol).cloned())
    }

    async fn fetch_by_date_range(&self, from: NaiveDate, to: NaiveDate) -> anyhow::Result<Vec<DividendRecord>> {
        self.check_read(Table::DividendRecords).await?;
        let tables = self.tables.read().await;
        Ok(tables
            .dividends
            .values()
            .filter(|r| {
                in_range(r.ex_dividend_date, from, to)
                    || in_range(r.dividend_date, from, to)
                    || in_range(r.payout_date, from, to)
                    || in_range(r.earnings_date, from, to)
            })
            .cloned()
            .collect())
    }

    async fn fetch_earnings_between(&self, from: NaiveDate, to: NaiveDate) -> anyhow::Result<Vec<DividendRecord>> {
        self.check_read(Table::DividendRecords).await?;
        let tables = self.tables.read().await;
        let mut out: Vec<DividendRecord> = tables
            .dividends
            .values()
            .filter(|r| in_range(r.earnings_date, from, to))
            .cloned()
            .collect();
        out.sort_by_key(|r| r.earnings_date);
        Ok(out)
    }

    async fn fetch_history(&self, symbol: &Symbol) -> anyhow::Result<Vec<DividendHistoryPoint>> {
        self.check_read(Table::DividendHistory).await?;
        let tables = self.tables.read().await;
        let mut out: Vec<DividendHistoryPoint> = tables
            .history
            .iter()
            .filter(|p| &p.symbol == symbol)
            .cloned()
            .collect();
        out.sort_by_key(|p| p.date);
        Ok(out)
    }
}

#[async_trait]
impl CompanyRepository for MemoryStore {
    async fn fetch_logos(&self) -> anyhow::Result<Vec<CompanyReference>> {
        self.check_read(Table::CompanyLogos).await?;
        Ok(self.tables.read().await.logos.values().cloned().collect())
    }

    async fn fetch_profiles(&self) -> anyhow::Result<Vec<CompanyReference>> {
        self.check_read(Table::CompanyProfiles).await?;
        Ok(self.tables.read().await.profiles.values().cloned().collect())
    }

    async fn upsert_logos(&self, logos: &[CompanyReference]) -> anyhow::Result<usize> {
        self.check_write(Table::CompanyLogos).await?;
        let mut tables = self.tables.write().await;
        for logo in logos {
            tables.logos.insert(logo.symbol.clone(), logo.clone());
        }
        drop(tables);
        for logo in logos {
            self.emit(Table::CompanyLogos, ChangeOp::Update, Some(logo.symbol.clone()), None);
        }
        Ok(logos.len())
    }
}

#[async_trait]
impl AnalysisRepository for MemoryStore {
    async fn latest_analysis(&self, symbol: &Symbol) -> anyhow::Result<Option<AnalysisRecord>> {
        self.check_read(Table::StockAnalyses).await?;
        Ok(self.tables.read().await.analyses.get(symbol).cloned())
    }

    async fn upsert_analysis(&self, record: &AnalysisRecord) -> anyhow::Result<()> {
        self.check_write(Table::StockAnalyses).await?;
        let op = match self
            .tables
            .write()
            .await
            .analyses
            .insert(record.symbol.clone(), record.clone())
        {
            Some(_) => ChangeOp::Update,
            None => ChangeOp::Insert,
        };
        self.analysis_writes.fetch_add(1, Ordering::SeqCst);
        self.emit(Table::StockAnalyses, op, Some(record.symbol.clone()), None);
        Ok(())
    }
}

#[async_trait]
impl NotificationRepository for MemoryStore {
    async fn recent_announcements(&self, limit: usize) -> anyhow::Result<Vec<DividendAnnouncement>> {
        self.check_read(Table::DividendAnnouncements).await?;
        let mut out = self.tables.read().await.announcements.clone();
        out.sort_by(|a, b| b.date.cmp(&a.date));
        out.truncate(limit);
        Ok(out)
    }

    async fn recent_news(&self, limit: usize) -> anyhow::Result<Vec<NewsItem>> {
        self.check_read(Table::NewsItems).await?;
        let mut out = self.tables.read().await.news.clone();
        out.sort_by(|a, b| b.published_at.cmp(&a.published_at));
        out.truncate(limit);
        Ok(out)
    }
}

#[async_trait]
impl ProfileRepository for MemoryStore {
    async fn username(&self, user_id: Uuid) -> anyhow::Result<Option<String>> {
        self.check_read(Table::Profiles).await?;
        Ok(self.tables.read().await.usernames.get(&user_id).cloned())
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    fn changes(&self) -> &ChangeFeed {
        &self.feed
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use std::time::Duration;
    use tokio::sync::mpsc;

    fn sym(s: &str) -> Symbol {
        Symbol::parse(s).unwrap()
    }

    fn entry(user: Uuid, symbol: &str, day: u32) -> WatchlistEntry {
        let mut e = WatchlistEntry::new(user, sym(symbol), symbol);
        e.created_at = Utc.with_ymd_and_hms(2026, 10, day, 0, 0, 0).unwrap();
        e
    }

    #[tokio::test]
    async fn watchlist_is_partitioned_by_user() {
        let store = MemoryStore::new();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        store.upsert_entry(&entry(alice, "PEP", 2)).await.unwrap();
        store.upsert_entry(&entry(alice, "KO", 1)).await.unwrap();
        store.upsert_entry(&entry(bob, "T", 3)).await.unwrap();

        let mine = store.fetch_by_user(alice).await.unwrap();
        let symbols: Vec<_> = mine.iter().map(|e| e.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["KO", "PEP"]);

        assert!(store.set_favorite(alice, &sym("KO"), true).await.unwrap());
        assert!(!store.set_favorite(bob, &sym("KO"), true).await.unwrap());
        assert!(store.delete(alice, &sym("PEP")).await.unwrap());
        assert!(!store.delete(alice, &sym("PEP")).await.unwrap());

        let watched = store.watched_symbols().await.unwrap();
        assert_eq!(watched, vec![sym("KO"), sym("T")]);
    }

    #[tokio::test]
    async fn upsert_replaces_existing_row() {
        let store = MemoryStore::new();
        let user = Uuid::new_v4();
        let mut e = entry(user, "KO", 1);
        store.upsert_entry(&e).await.unwrap();
        e.quantity = Some(10);
        store.upsert_entry(&e).await.unwrap();

        let rows = store.fetch_by_user(user).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].quantity, Some(10));
    }

    #[tokio::test]
    async fn simulated_outage_fails_only_that_table() {
        let store = MemoryStore::new();
        store.fail_reads_on(Table::CompanyLogos).await;
        assert!(store.fetch_logos().await.is_err());
        assert!(store.fetch_profiles().await.unwrap().is_empty());

        store.restore(Table::CompanyLogos).await;
        assert!(store.fetch_logos().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn writes_publish_change_events() {
        let store = MemoryStore::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let handle = store.changes().subscribe(Table::WatchlistEntries, move |ev| {
            let _ = tx.send(ev);
        });

        let user = Uuid::new_v4();
        store.upsert_entry(&entry(user, "KO", 1)).await.unwrap();
        store.delete(user, &sym("KO")).await.unwrap();

        let first = tokio::time::timeout(Duration::from_secs(1), rx.recv()).await.unwrap().unwrap();
        let second = tokio::time::timeout(Duration::from_secs(1), rx.recv()).await.unwrap().unwrap();
        assert_eq!(first.op, ChangeOp::Insert);
        assert_eq!(second.op, ChangeOp::Delete);
        assert_eq!(second.user_id, Some(user));

        handle.unsubscribe().await;
    }

    #[tokio::test]
    async fn date_range_matches_any_calendar_date() {
        let store = MemoryStore::new();
        let d = |m, day| NaiveDate::from_ymd_opt(2026, m, day);
        let mut ko = DividendRecord::empty(sym("KO"));
        ko.ex_dividend_date = d(10, 14);
        let mut aapl = DividendRecord::empty(sym("AAPL"));
        aapl.earnings_date = d(10, 30);
        let mut t = DividendRecord::empty(sym("T"));
        t.payout_date = d(11, 2);
        for r in [ko, aapl, t] {
            store.put_dividend(r).await;
        }

        let (from, to) = (d(10, 1).unwrap(), d(10, 31).unwrap());
        let found = store.fetch_by_date_range(from, to).await.unwrap();
        let symbols: Vec<_> = found.iter().map(|r| r.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["AAPL", "KO"]);

        let earnings = store.fetch_earnings_between(from, to).await.unwrap();
        assert_eq!(earnings.len(), 1);
    }

    #[tokio::test]
    async fn closed_store_rejects_calls() {
        let store = MemoryStore::new();
        store.close().await;
        assert!(store.is_closed());
        assert!(store.fetch_logos().await.is_err());
    }
}
