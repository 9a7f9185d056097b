pub mod dashboard;
pub mod domain;
pub mod llm;
pub mod prefs;
pub mod reference;
pub mod staleness;
pub mod storage;
pub mod time;
pub mod view;

pub mod config {
    use crate::domain::analysis::DEFAULT_STALENESS_HOURS;
    use crate::llm::Provider;
    use crate::prefs::DEFAULT_PREFS_PATH;
    use anyhow::Context;
    use std::path::PathBuf;

    #[derive(Debug, Clone, Default)]
    pub struct Settings {
        pub database_url: Option<String>,
        pub sentry_dsn: Option<String>,
        pub analysis_provider: Option<String>,
        pub groq_api_key: Option<String>,
        pub anthropic_api_key: Option<String>,
        pub reference_file: Option<String>,
        pub analysis_staleness_hours: Option<i64>,
        pub prefs_path: Option<String>,
    }

    impl Settings {
        pub fn from_env() -> anyhow::Result<Self> {
            let analysis_staleness_hours = match std::env::var("ANALYSIS_STALENESS_HOURS").ok() {
                Some(raw) => Some(
                    raw.trim()
                        .parse::<i64>()
                        .with_context(|| format!("ANALYSIS_STALENESS_HOURS is not an integer: {raw}"))?,
                ),
                None => None,
            };

            Ok(Self {
                database_url: std::env::var("DATABASE_URL").ok(),
                sentry_dsn: std::env::var("SENTRY_DSN").ok(),
                analysis_provider: std::env::var("ANALYSIS_PROVIDER").ok(),
                groq_api_key: std::env::var("GROQ_API_KEY").ok(),
                anthropic_api_key: std::env::var("ANTHROPIC_API_KEY").ok(),
                reference_file: std::env::var("REFERENCE_FILE").ok(),
                analysis_staleness_hours,
                prefs_path: std::env::var("PREFS_PATH").ok(),
            })
        }

        pub fn require_database_url(&self) -> anyhow::Result<&str> {
            self.database_url
                .as_deref()
                .context("DATABASE_URL is required")
        }

        pub fn require_groq_api_key(&self) -> anyhow::Result<&str> {
            self.groq_api_key
                .as_deref()
                .context("GROQ_API_KEY is required")
        }

        pub fn require_anthropic_api_key(&self) -> anyhow::Result<&str> {
            self.anthropic_api_key
                .as_deref()
                .context("ANTHROPIC_API_KEY is required")
        }

        /// Defaults to Groq when unset; an unrecognised name is an error.
        pub fn analysis_provider(&self) -> anyhow::Result<Provider> {
            match self.analysis_provider.as_deref().map(str::trim) {
                None | Some("") => Ok(Provider::Groq),
                Some(raw) => Provider::parse(raw)
                    .with_context(|| format!("unknown ANALYSIS_PROVIDER: {raw}")),
            }
        }

        pub fn staleness_threshold(&self) -> chrono::Duration {
            chrono::Duration::hours(
                self.analysis_staleness_hours
                    .filter(|h| *h > 0)
                    .unwrap_or(DEFAULT_STALENESS_HOURS),
            )
        }

        pub fn prefs_path(&self) -> PathBuf {
            PathBuf::from(self.prefs_path.as_deref().unwrap_or(DEFAULT_PREFS_PATH))
        }
    }

}
