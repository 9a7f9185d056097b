use crate::view::merge::WatchlistView;
use crate::view::NOT_AVAILABLE;
use chrono::NaiveDate;
use std::cmp::Ordering;

/// Inclusive numeric bounds. Either side may be open.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct NumericRange {
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl NumericRange {
    pub fn new(min: Option<f64>, max: Option<f64>) -> Self {
        Self { min, max }
    }

    pub fn is_open(&self) -> bool {
        self.min.is_none() && self.max.is_none()
    }

    pub fn contains(&self, value: f64) -> bool {
        self.min.map_or(true, |m| value >= m) && self.max.map_or(true, |m| value <= m)
    }
}

/// User-controlled predicates. Inactive fields match everything; active ones are ANDed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterSet {
    pub search: Option<String>,
    pub sector: Option<String>,
    pub industry: Option<String>,
    pub price: NumericRange,
    pub dividend_yield: NumericRange,
    pub favorites_only: bool,
}

impl FilterSet {
    pub fn matches(&self, view: &WatchlistView) -> bool {
        if self.favorites_only && !view.is_favorite {
            return false;
        }
        if let Some(term) = active(&self.search) {
            let term = term.to_lowercase();
            let hit = view.symbol.as_str().to_lowercase().contains(&term)
                || view.company_name.to_lowercase().contains(&term);
            if !hit {
                return false;
            }
        }
        if let Some(sector) = active(&self.sector) {
            if !view.sector.eq_ignore_ascii_case(sector) {
                return false;
            }
        }
        if let Some(industry) = active(&self.industry) {
            if !view.industry.eq_ignore_ascii_case(industry) {
                return false;
            }
        }
        self.price.contains(view.price) && self.dividend_yield.contains(view.dividend_yield)
    }
}

// "all" is what the select boxes send for "no filter".
fn active(value: &Option<String>) -> Option<&str> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty() && !v.eq_ignore_ascii_case("all"))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    Symbol,
    CompanyName,
    Price,
    DividendYield,
    DividendRate,
    ExDividendDate,
    NextDividendDate,
    Sector,
    Industry,
    Quantity,
    CreatedAt,
}

impl SortKey {
    pub fn parse(s: &str) -> Option<Self> {
        let key = s.trim().to_ascii_lowercase().replace(['_', '-'], "");
        Some(match key.as_str() {
            "symbol" => Self::Symbol,
            "name" | "companyname" => Self::CompanyName,
            "price" => Self::Price,
            "yield" | "dividendyield" => Self::DividendYield,
            "rate" | "dividendrate" => Self::DividendRate,
            "exdividenddate" | "exdate" => Self::ExDividendDate,
            "nextdividenddate" | "nextdate" => Self::NextDividendDate,
            "sector" => Self::Sector,
            "industry" => Self::Industry,
            "quantity" => Self::Quantity,
            "createdat" | "added" => Self::CreatedAt,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "asc" | "ascending" => Some(Self::Asc),
            "desc" | "descending" => Some(Self::Desc),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortSpec {
    pub key: SortKey,
    pub direction: SortDirection,
}

/// Filters, then stable-sorts on one field. Ties keep input order in either direction.
pub fn apply(views: &[WatchlistView], filters: &FilterSet, sort: Option<SortSpec>) -> Vec<WatchlistView> {
    let mut out: Vec<WatchlistView> = views.iter().filter(|v| filters.matches(v)).cloned().collect();
    if let Some(spec) = sort {
        sort_views(&mut out, spec);
    }
    out
}

pub fn sort_views(views: &mut [WatchlistView], spec: SortSpec) {
    views.sort_by(|a, b| compare(a, b, spec));
}

fn compare(a: &WatchlistView, b: &WatchlistView, spec: SortSpec) -> Ordering {
    let directed = |ord: Ordering| match spec.direction {
        SortDirection::Asc => ord,
        SortDirection::Desc => ord.reverse(),
    };
    match spec.key {
        SortKey::Symbol => directed(compare_text(a.symbol.as_str(), b.symbol.as_str())),
        SortKey::CompanyName => directed(compare_text(&a.company_name, &b.company_name)),
        SortKey::Sector => compare_text_na_last(&a.sector, &b.sector, directed),
        SortKey::Industry => compare_text_na_last(&a.industry, &b.industry, directed),
        SortKey::Price => directed(a.price.total_cmp(&b.price)),
        SortKey::DividendYield => directed(a.dividend_yield.total_cmp(&b.dividend_yield)),
        SortKey::DividendRate => directed(a.dividend_rate.total_cmp(&b.dividend_rate)),
        SortKey::Quantity => directed(a.quantity.cmp(&b.quantity)),
        SortKey::CreatedAt => directed(a.created_at.cmp(&b.created_at)),
        SortKey::ExDividendDate => compare_dates(a.ex_dividend_date, b.ex_dividend_date, directed),
        SortKey::NextDividendDate => {
            compare_dates(a.next_dividend_date, b.next_dividend_date, directed)
        }
    }
}

fn compare_text(a: &str, b: &str) -> Ordering {
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| a.cmp(b))
}

// Placeholder values stay at the end regardless of direction.
fn compare_text_na_last(a: &str, b: &str, directed: impl Fn(Ordering) -> Ordering) -> Ordering {
    match (a == NOT_AVAILABLE, b == NOT_AVAILABLE) {
        (false, false) => directed(compare_text(a, b)),
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
    }
}

fn compare_dates(
    a: Option<NaiveDate>,
    b: Option<NaiveDate>,
    directed: impl Fn(Ordering) -> Ordering,
) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => directed(a.cmp(&b)),
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
    }
}
