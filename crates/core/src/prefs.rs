use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const DEFAULT_PREFS_PATH: &str = ".divtrack/prefs.json";

/// Small per-installation state kept outside the record store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalPrefs {
    #[serde(default)]
    pub username: Option<String>,
}

impl LocalPrefs {
    /// Missing or unreadable files yield defaults.
    pub async fn load(path: &Path) -> Self {
        let text = match tokio::fs::read_to_string(path).await {
            Ok(text) => text,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no prefs file; using defaults");
                return Self::default();
            }
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "failed to read prefs; using defaults");
                return Self::default();
            }
        };

        match serde_json::from_str::<Self>(&text) {
            Ok(prefs) => prefs,
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "malformed prefs; using defaults");
                Self::default()
            }
        }
    }

    pub async fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(dir)
                .await
                .with_context(|| format!("failed to create {}", dir.display()))?;
        }
        let body = serde_json::to_vec_pretty(self).context("failed to encode prefs")?;
        tokio::fs::write(path, body)
            .await
            .with_context(|| format!("failed to write {}", path.display()))
    }

    pub fn username(&self) -> Option<&str> {
        self.username.as_deref().map(str::trim).filter(|u| !u.is_empty())
    }
}
