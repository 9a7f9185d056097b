//! Logo and profile tables held between requests. Any change event on either table
//! bumps the generation, and the next read loads them again.

use crate::reference::{LogoEntry, ProfileEntry, ReferenceMap};
use crate::storage::realtime::{ChangeFeed, SubscriptionHandle};
use crate::storage::repo::Table;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, Clone, Default)]
pub struct ReferenceTables {
    pub logos: Arc<ReferenceMap<LogoEntry>>,
    pub profiles: Arc<ReferenceMap<ProfileEntry>>,
}

pub struct ReferenceCache {
    generation: Arc<AtomicU64>,
    held: RwLock<Option<(u64, ReferenceTables)>>,
    _subscriptions: Vec<SubscriptionHandle>,
}

impl ReferenceCache {
    /// Subscribes to logo and profile changes on `feed`. Must run inside a tokio runtime.
    pub fn watch(feed: &ChangeFeed) -> Self {
        let generation = Arc::new(AtomicU64::new(0));
        let subscriptions = [Table::CompanyLogos, Table::CompanyProfiles]
            .into_iter()
            .map(|table| {
                let generation = generation.clone();
                feed.subscribe(table, move |event| {
                    generation.fetch_add(1, Ordering::SeqCst);
                    tracing::debug!(table = %event.table, "reference tables invalidated");
                })
            })
            .collect();

        Self {
            generation,
            held: RwLock::new(None),
            _subscriptions: subscriptions,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Returns the held tables if no change arrived since they were loaded. Otherwise
    /// runs `load`; its result is kept only when it reports a complete load.
    pub async fn get_or_load<F, Fut>(&self, load: F) -> ReferenceTables
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = (ReferenceTables, bool)>,
    {
        // Read before loading: a change that lands mid-load leaves the copy stale.
        let current = self.generation();
        if let Some((loaded_at, tables)) = self.held.read().await.as_ref() {
            if *loaded_at == current {
                return tables.clone();
            }
        }

        let (tables, complete) = load().await;
        if complete {
            *self.held.write().await = Some((current, tables.clone()));
        }
        tables
    }
}
