use crate::reference::{non_blank, LogoEntry, ReferenceMap};
use anyhow::Context;
use std::time::Duration;

const DEFAULT_TIMEOUT_SECS: u64 = 15;

/// One data row of the static logo reference file.
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceRow {
    pub symbol: String,
    pub logo_url: String,
    pub company_name: Option<String>,
}

impl ReferenceRow {
    pub fn new(symbol: &str, logo_url: &str, company_name: Option<&str>) -> Self {
        Self {
            symbol: symbol.to_string(),
            logo_url: logo_url.to_string(),
            company_name: company_name.map(str::to_string),
        }
    }
}

#[derive(Debug, Default)]
pub struct ParsedReference {
    pub rows: Vec<ReferenceRow>,
    pub malformed: usize,
}

/// Rows missing a symbol or a logo URL are skipped.
pub fn build_logo_map<I>(rows: I) -> ReferenceMap<LogoEntry>
where
    I: IntoIterator<Item = ReferenceRow>,
{
    let mut map = ReferenceMap::new();
    let mut skipped: usize = 0;
    for row in rows {
        let url = row.logo_url.trim();
        if url.is_empty() || row.symbol.trim().is_empty() {
            skipped += 1;
            continue;
        }
        map.insert(
            &row.symbol,
            LogoEntry {
                logo_url: url.to_string(),
                company_name: non_blank(row.company_name.as_deref()),
            },
        );
    }
    if skipped > 0 {
        tracing::debug!(skipped, kept = map.len(), "reference rows without symbol or logo skipped");
    }
    map
}

/// Parses a delimited reference file (comma or pipe separated, header row first).
/// Short rows are padded with empty fields; rows the reader cannot decode are counted
/// and skipped.
pub fn parse_reference_text(text: &str) -> ParsedReference {
    let text = text.trim_start_matches('\u{feff}');
    let header_line = text.lines().next().unwrap_or_default();
    let delimiter = detect_delimiter(header_line);

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let columns = match reader.headers() {
        Ok(headers) => Columns::resolve(headers),
        Err(err) => {
            tracing::warn!(error = %err, "reference file header unreadable; using positional columns");
            Columns::positional()
        }
    };

    let mut out = ParsedReference::default();
    for (idx, record) in reader.records().enumerate() {
        let record = match record {
            Ok(r) => r,
            Err(err) => {
                out.malformed += 1;
                tracing::debug!(line = idx + 2, error = %err, "skipping malformed reference row");
                continue;
            }
        };

        let field = |i: Option<usize>| i.and_then(|i| record.get(i)).unwrap_or_default();
        out.rows.push(ReferenceRow {
            symbol: field(Some(columns.symbol)).to_string(),
            logo_url: field(Some(columns.logo_url)).to_string(),
            company_name: non_blank(Some(field(columns.company_name))),
        });
    }
    out
}

fn detect_delimiter(header_line: &str) -> u8 {
    let pipes = header_line.matches('|').count();
    let commas = header_line.matches(',').count();
    if pipes > commas {
        b'|'
    } else {
        b','
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Columns {
    symbol: usize,
    logo_url: usize,
    company_name: Option<usize>,
}

impl Columns {
    fn positional() -> Self {
        Self {
            symbol: 0,
            logo_url: 1,
            company_name: Some(2),
        }
    }

    fn resolve(headers: &csv::StringRecord) -> Self {
        let names: Vec<String> = headers
            .iter()
            .map(|h| h.to_ascii_lowercase().replace(['_', ' ', '-'], ""))
            .collect();
        let find = |candidates: &[&str]| names.iter().position(|n| candidates.contains(&n.as_str()));

        let symbol = find(&["symbol", "ticker"]);
        let logo_url = find(&["logourl", "logo", "logourls"]);
        let company_name = find(&["companyname", "company", "name", "title", "shortname"]);

        match (symbol, logo_url) {
            (Some(symbol), Some(logo_url)) => Self {
                symbol,
                logo_url,
                company_name,
            },
            _ => Self::positional(),
        }
    }
}

/// Reads the reference file from an `http(s)://` URL or a local path.
pub async fn fetch_reference_text(http: &reqwest::Client, source: &str) -> anyhow::Result<String> {
    if source.starts_with("http://") || source.starts_with("https://") {
        let res = http
            .get(source)
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .send()
            .await
            .with_context(|| format!("reference file request failed: {source}"))?;
        let status = res.status();
        let text = res
            .text()
            .await
            .context("failed to read reference file body")?;
        if !status.is_success() {
            anyhow::bail!("reference file HTTP {status}: {source}");
        }
        return Ok(text);
    }

    tokio::fs::read_to_string(source)
        .await
        .with_context(|| format!("failed to read reference file {source}"))
}

pub async fn load_logo_map(
    http: &reqwest::Client,
    source: &str,
) -> anyhow::Result<ReferenceMap<LogoEntry>> {
    let text = fetch_reference_text(http, source).await?;
    let parsed = parse_reference_text(&text);
    let total = parsed.rows.len();
    let malformed = parsed.malformed;
    let map = build_logo_map(parsed.rows);
    tracing::info!(source, total, malformed, loaded = map.len(), "reference logos loaded");
    Ok(map)
}
