use crate::domain::symbol::Symbol;
use chrono::{Months, NaiveDate};
use serde::{Deserialize, Serialize};

/// Per-symbol dividend metadata. Read-only here; refreshed by an external ingestion job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DividendRecord {
    pub symbol: Symbol,
    pub short_name: Option<String>,
    pub ex_dividend_date: Option<NaiveDate>,
    pub dividend_date: Option<NaiveDate>,
    pub payout_date: Option<NaiveDate>,
    pub earnings_date: Option<NaiveDate>,
    pub dividend_rate: Option<f64>,
    pub dividend_yield: Option<f64>,
    pub payout_ratio: Option<f64>,
    pub earnings_average: Option<f64>,
    pub revenue_average: Option<f64>,
    pub current_price: Option<f64>,
    pub previous_close: Option<f64>,
}

impl DividendRecord {
    pub fn empty(symbol: Symbol) -> Self {
        Self {
            symbol,
            short_name: None,
            ex_dividend_date: None,
            dividend_date: None,
            payout_date: None,
            earnings_date: None,
            dividend_rate: None,
            dividend_yield: None,
            payout_ratio: None,
            earnings_average: None,
            revenue_average: None,
            current_price: None,
            previous_close: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DividendHistoryPoint {
    pub symbol: Symbol,
    pub date: NaiveDate,
    pub amount: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HistoryRange {
    #[serde(rename = "1Y")]
    OneYear,
    #[serde(rename = "3Y")]
    ThreeYears,
    #[serde(rename = "5Y")]
    FiveYears,
    #[serde(rename = "10Y")]
    TenYears,
    #[serde(rename = "MAX")]
    Max,
}

impl HistoryRange {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "1Y" => Some(Self::OneYear),
            "3Y" => Some(Self::ThreeYears),
            "5Y" => Some(Self::FiveYears),
            "10Y" => Some(Self::TenYears),
            "MAX" | "" => Some(Self::Max),
            _ => None,
        }
    }

    fn years(self) -> Option<u32> {
        match self {
            Self::OneYear => Some(1),
            Self::ThreeYears => Some(3),
            Self::FiveYears => Some(5),
            Self::TenYears => Some(10),
            Self::Max => None,
        }
    }

    /// Earliest date included by this range, or `None` for an unbounded range.
    pub fn start(self, today: NaiveDate) -> Option<NaiveDate> {
        let years = self.years()?;
        today.checked_sub_months(Months::new(12 * years))
    }
}

/// Keeps points on or after the range start. Input order is preserved.
pub fn filter_history(
    points: &[DividendHistoryPoint],
    range: HistoryRange,
    today: NaiveDate,
) -> Vec<DividendHistoryPoint> {
    match range.start(today) {
        Some(start) => points.iter().filter(|p| p.date >= start).cloned().collect(),
        None => points.to_vec(),
    }
}

/// Compound growth (percent) between the latest payment and the payment `periods`
/// entries earlier (or the oldest available). Returns 0 when undefined.
pub fn dividend_growth(points: &[DividendHistoryPoint], periods: usize) -> f64 {
    if points.len() < 2 || periods == 0 {
        return 0.0;
    }

    let mut sorted: Vec<&DividendHistoryPoint> = points.iter().collect();
    sorted.sort_by(|a, b| b.date.cmp(&a.date));

    let latest = sorted[0].amount;
    let earliest = sorted[periods.min(sorted.len() - 1)].amount;
    if latest <= 0.0 || earliest <= 0.0 {
        return 0.0;
    }

    ((latest / earliest).powf(1.0 / periods as f64) - 1.0) * 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(y: i32, m: u32, d: u32, amount: f64) -> DividendHistoryPoint {
        DividendHistoryPoint {
            symbol: Symbol::parse("KO").unwrap(),
            date: NaiveDate::from_ymd_opt(y, m, d).unwrap(),
            amount,
        }
    }

    #[test]
    fn filter_history_keeps_points_inside_range() {
        let today = NaiveDate::from_ymd_opt(2026, 10, 16).unwrap();
        let points = vec![
            point(2020, 1, 1, 0.40),
            point(2024, 6, 1, 0.46),
            point(2026, 3, 1, 0.51),
        ];

        let one_year = filter_history(&points, HistoryRange::OneYear, today);
        assert_eq!(one_year.len(), 1);
        assert_eq!(one_year[0].amount, 0.51);

        let three_years = filter_history(&points, HistoryRange::ThreeYears, today);
        assert_eq!(three_years.len(), 2);

        let all = filter_history(&points, HistoryRange::Max, today);
        assert_eq!(all.len(), 3);
    }

    #[test]
    fn growth_uses_requested_period_offset() {
        let points = vec![
            point(2021, 1, 1, 1.0),
            point(2022, 1, 1, 1.1),
            point(2023, 1, 1, 1.21),
        ];
        let g = dividend_growth(&points, 2);
        assert!((g - 10.0).abs() < 1e-9, "got {g}");
    }

    #[test]
    fn growth_is_zero_when_undefined() {
        assert_eq!(dividend_growth(&[point(2021, 1, 1, 1.0)], 5), 0.0);
        let with_zero = vec![point(2021, 1, 1, 0.0), point(2022, 1, 1, 1.0)];
        assert_eq!(dividend_growth(&with_zero, 1), 0.0);
    }

    #[test]
    fn parses_range_labels() {
        assert_eq!(HistoryRange::parse("5y"), Some(HistoryRange::FiveYears));
        assert_eq!(HistoryRange::parse("max"), Some(HistoryRange::Max));
        assert_eq!(HistoryRange::parse("2Y"), None);
    }
}
