//! Reference data lookup tables keyed by normalized symbol.

pub mod cache;
pub mod loader;

use crate::domain::company::CompanyReference;
use crate::domain::dividend::DividendRecord;
use crate::domain::symbol::normalize;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

/// Map from uppercased symbol to a reference value. Lookups normalize the key, so
/// `get("aapl")` and `get("AAPL")` are equivalent; a miss is `None`.
#[derive(Debug, Clone)]
pub struct ReferenceMap<V> {
    entries: HashMap<String, V>,
}

impl<V> Default for ReferenceMap<V> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }
}

impl<V> ReferenceMap<V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts under the normalized key. Blank symbols are ignored and return `false`.
    /// A later insert for the same symbol replaces the earlier one.
    pub fn insert(&mut self, symbol: &str, value: V) -> bool {
        let key = normalize(symbol);
        if key.is_empty() {
            return false;
        }
        self.entries.insert(key, value);
        true
    }

    pub fn get(&self, symbol: &str) -> Option<&V> {
        self.entries.get(&normalize(symbol))
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.get(symbol).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &V)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Entries from `other` win over entries already present.
    pub fn overlay(mut self, other: ReferenceMap<V>) -> Self {
        self.entries.extend(other.entries);
        self
    }
}

impl<V> FromIterator<(String, V)> for ReferenceMap<V> {
    fn from_iter<I: IntoIterator<Item = (String, V)>>(iter: I) -> Self {
        let mut map = Self::new();
        for (symbol, value) in iter {
            map.insert(&symbol, value);
        }
        map
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogoEntry {
    pub logo_url: String,
    pub company_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProfileEntry {
    pub sector: Option<String>,
    pub industry: Option<String>,
    pub company_name: Option<String>,
}

/// Logo table rows with a usable URL.
pub fn logo_map(companies: &[CompanyReference]) -> ReferenceMap<LogoEntry> {
    let mut map = ReferenceMap::new();
    for c in companies {
        let Some(url) = c.logo_url.as_deref().map(str::trim).filter(|u| !u.is_empty()) else {
            continue;
        };
        map.insert(
            c.symbol.as_str(),
            LogoEntry {
                logo_url: url.to_string(),
                company_name: non_blank(c.company_name.as_deref()),
            },
        );
    }
    map
}

pub fn profile_map(companies: &[CompanyReference]) -> ReferenceMap<ProfileEntry> {
    companies
        .iter()
        .map(|c| {
            (
                c.symbol.as_str().to_string(),
                ProfileEntry {
                    sector: non_blank(c.sector.as_deref()),
                    industry: non_blank(c.industry.as_deref()),
                    company_name: non_blank(c.company_name.as_deref()),
                },
            )
        })
        .collect()
}

pub fn dividend_map(records: &[DividendRecord]) -> ReferenceMap<DividendRecord> {
    records
        .iter()
        .map(|r| (r.symbol.as_str().to_string(), r.clone()))
        .collect()
}

/// Every reference table a view may join against. Missing tables are simply empty.
/// Logos and profiles are shared with the reference cache.
#[derive(Debug, Clone, Default)]
pub struct ReferenceData {
    pub logos: Arc<ReferenceMap<LogoEntry>>,
    pub profiles: Arc<ReferenceMap<ProfileEntry>>,
    pub dividends: ReferenceMap<DividendRecord>,
}

pub(crate) fn non_blank(s: Option<&str>) -> Option<String> {
    s.map(str::trim).filter(|s| !s.is_empty()).map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Symbol;

    #[test]
    fn lookups_are_case_insensitive() {
        let mut map = ReferenceMap::new();
        assert!(map.insert("aapl", 1));
        assert_eq!(map.get("AAPL"), Some(&1));
        assert_eq!(map.get(" aapl "), Some(&1));
        assert_eq!(map.get("MSFT"), None);
    }

    #[test]
    fn blank_symbols_are_rejected() {
        let mut map = ReferenceMap::new();
        assert!(!map.insert("  ", 1));
        assert!(map.is_empty());
    }

    #[test]
    fn overlay_prefers_later_map() {
        let base: ReferenceMap<&str> =
            vec![("KO".to_string(), "file"), ("PEP".to_string(), "file")]
                .into_iter()
                .collect();
        let db: ReferenceMap<&str> = vec![("ko".to_string(), "db")].into_iter().collect();

        let merged = base.overlay(db);
        assert_eq!(merged.get("KO"), Some(&"db"));
        assert_eq!(merged.get("PEP"), Some(&"file"));
    }

    #[test]
    fn logo_map_skips_rows_without_url() {
        let mut with_url = CompanyReference::new(Symbol::parse("KO").unwrap());
        with_url.logo_url = Some("https://logo/ko.png".to_string());
        let mut blank_url = CompanyReference::new(Symbol::parse("PEP").unwrap());
        blank_url.logo_url = Some("  ".to_string());

        let map = logo_map(&[with_url, blank_url]);
        assert_eq!(map.len(), 1);
        assert_eq!(map.get("ko").unwrap().logo_url, "https://logo/ko.png");
    }
}
