use crate::domain::analysis::{AnalysisRecord, DEFAULT_STALENESS_HOURS};
use crate::domain::Symbol;
use crate::llm::{AnalysisGenerator, AnalysisInput};
use crate::storage::repo::AnalysisRepository;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisSource {
    Cached,
    Generated,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisOutcome {
    pub record: AnalysisRecord,
    pub source: AnalysisSource,
}

/// Context attached to errors raised by the generator, as opposed to the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationFailed {
    pub symbol: Symbol,
}

impl fmt::Display for GenerationFailed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "analysis generation failed for {}", self.symbol)
    }
}

/// Decides whether a stored analysis can be reused or must be regenerated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StalenessGate {
    threshold: Duration,
}

impl Default for StalenessGate {
    fn default() -> Self {
        Self::from_hours(DEFAULT_STALENESS_HOURS)
    }
}

impl StalenessGate {
    pub fn new(threshold: Duration) -> Self {
        Self { threshold }
    }

    pub fn from_hours(hours: i64) -> Self {
        Self::new(Duration::hours(hours))
    }

    pub fn threshold(&self) -> Duration {
        self.threshold
    }

    /// Returns the stored record while it is younger than the threshold. Otherwise asks
    /// `generator` once and upserts the result.
    ///
    /// A generation failure is returned under [`GenerationFailed`] and the store is not
    /// written. A failed
    /// upsert after a successful generation is logged; the fresh record is still
    /// returned.
    pub async fn get_or_generate<R>(
        &self,
        repo: &R,
        generator: &dyn AnalysisGenerator,
        input: &AnalysisInput,
        now: DateTime<Utc>,
    ) -> anyhow::Result<AnalysisOutcome>
    where
        R: AnalysisRepository + ?Sized,
    {
        let symbol = &input.symbol;
        let cached = repo.latest_analysis(symbol).await?;

        if let Some(record) = cached {
            if record.is_fresh(now, self.threshold) {
                tracing::debug!(symbol = %symbol, analysis_date = %record.analysis_date, "analysis cache hit");
                return Ok(AnalysisOutcome {
                    record,
                    source: AnalysisSource::Cached,
                });
            }
            tracing::info!(symbol = %symbol, analysis_date = %record.analysis_date, "analysis is stale; regenerating");
        } else {
            tracing::info!(symbol = %symbol, "no stored analysis; generating");
        }

        let record = match generator.generate_analysis(input, now).await {
            Ok(record) => record,
            Err(err) => {
                tracing::warn!(
                    symbol = %symbol,
                    provider = %generator.provider(),
                    error = %err,
                    "analysis generation failed"
                );
                return Err(err.context(GenerationFailed {
                    symbol: symbol.clone(),
                }));
            }
        };

        if let Err(err) = repo.upsert_analysis(&record).await {
            tracing::warn!(symbol = %symbol, error = %err, "failed to store generated analysis");
        }

        Ok(AnalysisOutcome {
            record,
            source: AnalysisSource::Generated,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::analysis::{Rating, RiskLevel};
    use crate::llm::Provider;
    use crate::storage::memory::MemoryStore;
    use crate::storage::repo::Table;
    use chrono::TimeZone;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StubGenerator {
        calls: AtomicUsize,
        fail: bool,
    }

    impl StubGenerator {
        fn ok() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail: false,
            }
        }

        fn failing() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail: true,
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait::async_trait]
    impl AnalysisGenerator for StubGenerator {
        fn provider(&self) -> Provider {
            Provider::Groq
        }

        async fn generate_analysis(
            &self,
            input: &AnalysisInput,
            generated_at: DateTime<Utc>,
        ) -> anyhow::Result<AnalysisRecord> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                anyhow::bail!("provider returned 500");
            }
            Ok(record(input.symbol.as_str(), generated_at, "fresh"))
        }
    }

    fn record(symbol: &str, at: DateTime<Utc>, recommendation: &str) -> AnalysisRecord {
        AnalysisRecord {
            symbol: Symbol::parse(symbol).unwrap(),
            analysis_date: at,
            provider: "stub".to_string(),
            rating: Rating::Hold,
            price_target: None,
            risk_level: RiskLevel::Medium,
            financial_health: String::new(),
            strengths: vec![],
            weaknesses: vec![],
            opportunities: vec![],
            threats: vec![],
            short_term_outlook: String::new(),
            long_term_outlook: String::new(),
            dividend_analysis: None,
            ai_recommendation: recommendation.to_string(),
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 16, 12, 0, 0).unwrap()
    }

    fn input(symbol: &str) -> AnalysisInput {
        AnalysisInput::new(Symbol::parse(symbol).unwrap())
    }

    #[tokio::test]
    async fn fresh_record_is_returned_without_generation() {
        let store = MemoryStore::new();
        let stored = record("KO", now() - Duration::hours(3), "cached");
        store.upsert_analysis(&stored).await.unwrap();
        let generator = StubGenerator::ok();

        let out = StalenessGate::default()
            .get_or_generate(&store, &generator, &input("KO"), now())
            .await
            .unwrap();

        assert_eq!(out.source, AnalysisSource::Cached);
        assert_eq!(out.record, stored);
        assert_eq!(generator.calls(), 0);
        assert_eq!(store.analysis_writes(), 1);
    }

    #[tokio::test]
    async fn stale_record_is_regenerated_and_upserted() {
        let store = MemoryStore::new();
        store
            .upsert_analysis(&record("KO", now() - Duration::hours(30), "old"))
            .await
            .unwrap();
        let generator = StubGenerator::ok();

        let out = StalenessGate::default()
            .get_or_generate(&store, &generator, &input("KO"), now())
            .await
            .unwrap();

        assert_eq!(out.source, AnalysisSource::Generated);
        assert_eq!(out.record.ai_recommendation, "fresh");
        assert_eq!(generator.calls(), 1);

        let latest = store
            .latest_analysis(&Symbol::parse("KO").unwrap())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(latest.ai_recommendation, "fresh");
    }

    #[tokio::test]
    async fn missing_record_triggers_generation() {
        let store = MemoryStore::new();
        let generator = StubGenerator::ok();

        let out = StalenessGate::from_hours(1)
            .get_or_generate(&store, &generator, &input("pep"), now())
            .await
            .unwrap();

        assert_eq!(out.source, AnalysisSource::Generated);
        assert_eq!(out.record.symbol.as_str(), "PEP");
        assert_eq!(store.analysis_writes(), 1);
    }

    #[tokio::test]
    async fn generation_failure_leaves_cache_untouched() {
        let store = MemoryStore::new();
        let old = record("KO", now() - Duration::hours(48), "old");
        store.upsert_analysis(&old).await.unwrap();
        let generator = StubGenerator::failing();

        let err = StalenessGate::default()
            .get_or_generate(&store, &generator, &input("KO"), now())
            .await
            .unwrap_err();

        assert!(err.downcast_ref::<GenerationFailed>().is_some());
        assert!(format!("{err:#}").contains("provider returned 500"));
        assert_eq!(generator.calls(), 1);
        assert_eq!(store.analysis_writes(), 1);
        let latest = store
            .latest_analysis(&Symbol::parse("KO").unwrap())
            .await
            .unwrap();
        assert_eq!(latest, Some(old));
    }

    #[tokio::test]
    async fn upsert_failure_still_returns_generated_record() {
        let store = MemoryStore::new();
        store.fail_writes_on(Table::StockAnalyses).await;
        let generator = StubGenerator::ok();

        let out = StalenessGate::default()
            .get_or_generate(&store, &generator, &input("KO"), now())
            .await
            .unwrap();

        assert_eq!(out.source, AnalysisSource::Generated);
        assert_eq!(store.analysis_writes(), 0);
    }
}
