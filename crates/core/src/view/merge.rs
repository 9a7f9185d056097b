use crate::domain::watchlist::WatchlistEntry;
use crate::domain::Symbol;
use crate::reference::{non_blank, ReferenceData};
use crate::view::{date_or_na, NOT_AVAILABLE, PLACEHOLDER_LOGO};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

/// A saved stock joined with its logo, profile and dividend metadata. Every display
/// field is populated; missing reference data becomes a fallback constant.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WatchlistView {
    pub symbol: Symbol,
    pub company_name: String,
    pub is_favorite: bool,
    pub price: f64,
    pub dividend_yield: f64,
    pub dividend_rate: f64,
    #[serde(serialize_with = "date_or_na")]
    pub ex_dividend_date: Option<NaiveDate>,
    #[serde(serialize_with = "date_or_na")]
    pub payout_date: Option<NaiveDate>,
    #[serde(serialize_with = "date_or_na")]
    pub earnings_date: Option<NaiveDate>,
    #[serde(serialize_with = "date_or_na")]
    pub next_dividend_date: Option<NaiveDate>,
    pub logo_url: String,
    pub sector: String,
    pub industry: String,
    pub quantity: i32,
    pub created_at: DateTime<Utc>,
}

/// Joins each entry with `refs`. Output has the same length and order as `entries`.
pub fn merge_watchlist(entries: &[WatchlistEntry], refs: &ReferenceData) -> Vec<WatchlistView> {
    entries.iter().map(|e| merge_entry(e, refs)).collect()
}

fn merge_entry(entry: &WatchlistEntry, refs: &ReferenceData) -> WatchlistView {
    let key = entry.symbol.as_str();
    let logo = refs.logos.get(key);
    let profile = refs.profiles.get(key);
    let dividend = refs.dividends.get(key);

    let company_name = logo
        .and_then(|l| l.company_name.clone())
        .or_else(|| profile.and_then(|p| p.company_name.clone()))
        .or_else(|| non_blank(Some(&entry.company_name)))
        .unwrap_or_else(|| NOT_AVAILABLE.to_string());

    WatchlistView {
        symbol: entry.symbol.clone(),
        company_name,
        is_favorite: entry.is_favorite,
        price: entry
            .price
            .or_else(|| dividend.and_then(|d| d.current_price))
            .unwrap_or(0.0),
        dividend_yield: entry
            .dividend_yield
            .or_else(|| dividend.and_then(|d| d.dividend_yield))
            .unwrap_or(0.0),
        dividend_rate: dividend.and_then(|d| d.dividend_rate).unwrap_or(0.0),
        ex_dividend_date: dividend.and_then(|d| d.ex_dividend_date),
        payout_date: dividend.and_then(|d| d.payout_date.or(d.dividend_date)),
        earnings_date: dividend.and_then(|d| d.earnings_date),
        next_dividend_date: entry
            .next_dividend_date
            .or_else(|| dividend.and_then(|d| d.dividend_date)),
        logo_url: logo_or_placeholder(refs, key),
        sector: profile
            .and_then(|p| p.sector.clone())
            .unwrap_or_else(|| NOT_AVAILABLE.to_string()),
        industry: profile
            .and_then(|p| p.industry.clone())
            .unwrap_or_else(|| NOT_AVAILABLE.to_string()),
        quantity: entry.quantity.filter(|q| *q > 0).unwrap_or(1),
        created_at: entry.created_at,
    }
}

pub fn logo_or_placeholder(refs: &ReferenceData, symbol: &str) -> String {
    refs.logos
        .get(symbol)
        .map(|l| l.logo_url.clone())
        .unwrap_or_else(|| PLACEHOLDER_LOGO.to_string())
}
