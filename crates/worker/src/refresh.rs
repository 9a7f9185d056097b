use chrono::{DateTime, Utc};
use divtrack_core::dashboard::Dashboard;
use divtrack_core::domain::Symbol;
use divtrack_core::staleness::{AnalysisSource, StalenessGate};
use divtrack_core::storage::repo::{AnalysisRepository, WatchlistRepository};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    Fresh,
    Stale,
    Missing,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RefreshSummary {
    pub checked: usize,
    pub cached: usize,
    pub generated: usize,
    pub failed: usize,
}

/// Explicit symbols win; otherwise every symbol on any watchlist.
pub async fn target_symbols<R>(repo: &R, requested: &[String]) -> anyhow::Result<Vec<Symbol>>
where
    R: WatchlistRepository + ?Sized,
{
    if requested.is_empty() {
        return repo.watched_symbols().await;
    }
    let mut out: Vec<Symbol> = requested.iter().filter_map(|s| Symbol::parse(s)).collect();
    out.sort();
    out.dedup();
    Ok(out)
}

pub async fn plan<R>(
    repo: &R,
    gate: &StalenessGate,
    symbols: &[Symbol],
    now: DateTime<Utc>,
) -> anyhow::Result<Vec<(Symbol, Freshness)>>
where
    R: AnalysisRepository + ?Sized,
{
    let mut out = Vec::with_capacity(symbols.len());
    for symbol in symbols {
        let freshness = match repo.latest_analysis(symbol).await? {
            Some(record) if record.is_fresh(now, gate.threshold()) => Freshness::Fresh,
            Some(_) => Freshness::Stale,
            None => Freshness::Missing,
        };
        out.push((symbol.clone(), freshness));
    }
    Ok(out)
}

/// One symbol at a time; a failed symbol is reported and the run continues.
pub async fn run(dashboard: &Dashboard, symbols: &[Symbol], now: DateTime<Utc>) -> RefreshSummary {
    let mut summary = RefreshSummary::default();
    for symbol in symbols {
        summary.checked += 1;
        match dashboard.analysis(symbol, now).await {
            Ok(outcome) => match outcome.source {
                AnalysisSource::Cached => summary.cached += 1,
                AnalysisSource::Generated => {
                    summary.generated += 1;
                    tracing::info!(symbol = %symbol, rating = %outcome.record.rating, "analysis refreshed");
                }
            },
            Err(err) => {
                summary.failed += 1;
                sentry_anyhow::capture_anyhow(&err);
                tracing::error!(symbol = %symbol, error = %format!("{err:#}"), "analysis refresh failed");
            }
        }
    }
    summary
}
