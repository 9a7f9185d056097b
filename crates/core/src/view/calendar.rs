use crate::domain::dividend::DividendRecord;
use crate::domain::Symbol;
use crate::reference::ReferenceData;
use crate::time::calendar::{leading_blanks, month_bounds};
use crate::view::merge::logo_or_placeholder;
use chrono::{Datelike, NaiveDate};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CalendarEventKind {
    ExDividend,
    Dividend,
    Payout,
    Earnings,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CalendarEvent {
    pub kind: CalendarEventKind,
    pub symbol: Symbol,
    pub company_name: String,
    pub logo_url: String,
    pub amount: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CalendarDay {
    pub date: NaiveDate,
    pub events: Vec<CalendarEvent>,
}

/// One month laid out as a Monday-first grid: `leading_blanks` empty cells, then one
/// cell per day.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CalendarMonth {
    pub year: i32,
    pub month: u32,
    pub leading_blanks: u32,
    pub days: Vec<CalendarDay>,
}

impl CalendarMonth {
    pub fn build(
        year: i32,
        month: u32,
        records: &[DividendRecord],
        refs: &ReferenceData,
    ) -> anyhow::Result<Self> {
        let (first, last) = month_bounds(year, month)?;
        let mut days: Vec<CalendarDay> = first
            .iter_days()
            .take_while(|d| *d <= last)
            .map(|date| CalendarDay {
                date,
                events: Vec::new(),
            })
            .collect();

        for record in records {
            // A payout on the dividend date itself is shown once, as the dividend.
            let payout = record.payout_date.filter(|d| Some(*d) != record.dividend_date);
            let dated = [
                (CalendarEventKind::ExDividend, record.ex_dividend_date, record.dividend_rate),
                (CalendarEventKind::Dividend, record.dividend_date, record.dividend_rate),
                (CalendarEventKind::Payout, payout, record.dividend_rate),
                (CalendarEventKind::Earnings, record.earnings_date, record.earnings_average),
            ];
            for (kind, date, amount) in dated {
                let Some(date) = date.filter(|d| *d >= first && *d <= last) else {
                    continue;
                };
                let idx = (date.day() - 1) as usize;
                days[idx].events.push(CalendarEvent {
                    kind,
                    symbol: record.symbol.clone(),
                    company_name: company_name(record, refs),
                    logo_url: logo_or_placeholder(refs, record.symbol.as_str()),
                    amount,
                });
            }
        }

        for day in &mut days {
            day.events
                .sort_by(|a, b| a.kind.cmp(&b.kind).then_with(|| a.symbol.cmp(&b.symbol)));
        }

        Ok(Self {
            year,
            month,
            leading_blanks: leading_blanks(first),
            days,
        })
    }

    pub fn event_count(&self) -> usize {
        self.days.iter().map(|d| d.events.len()).sum()
    }

    pub fn day(&self, date: NaiveDate) -> Option<&CalendarDay> {
        self.days.iter().find(|d| d.date == date)
    }
}

// Calendar cells show the ticker when no name is known.
fn company_name(record: &DividendRecord, refs: &ReferenceData) -> String {
    let key = record.symbol.as_str();
    refs.logos
        .get(key)
        .and_then(|l| l.company_name.clone())
        .or_else(|| refs.profiles.get(key).and_then(|p| p.company_name.clone()))
        .or_else(|| crate::reference::non_blank(record.short_name.as_deref()))
        .unwrap_or_else(|| key.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reference::LogoEntry;
    use std::sync::Arc;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn record(symbol: &str) -> DividendRecord {
        DividendRecord::empty(Symbol::parse(symbol).unwrap())
    }

    #[test]
    fn lays_out_month_with_monday_offset() {
        let cal = CalendarMonth::build(2026, 10, &[], &ReferenceData::default()).unwrap();
        assert_eq!(cal.days.len(), 31);
        assert_eq!(cal.leading_blanks, 3);
        assert_eq!(cal.days[0].date, date(2026, 10, 1));
        assert_eq!(cal.event_count(), 0);
    }

    #[test]
    fn places_events_on_their_days_and_ignores_other_months() {
        let mut ko = record("KO");
        ko.ex_dividend_date = Some(date(2026, 10, 14));
        ko.dividend_date = Some(date(2026, 11, 2));
        ko.dividend_rate = Some(0.51);

        let mut aapl = record("AAPL");
        aapl.earnings_date = Some(date(2026, 10, 14));
        aapl.payout_date = Some(date(2026, 10, 20));

        let mut refs = ReferenceData::default();
        Arc::make_mut(&mut refs.logos).insert(
            "AAPL",
            LogoEntry {
                logo_url: "http://logo/aapl.png".to_string(),
                company_name: Some("Apple".to_string()),
            },
        );

        let cal = CalendarMonth::build(2026, 10, &[ko, aapl], &refs).unwrap();
        assert_eq!(cal.event_count(), 3);

        let d14 = cal.day(date(2026, 10, 14)).unwrap();
        assert_eq!(d14.events.len(), 2);
        assert_eq!(d14.events[0].kind, CalendarEventKind::ExDividend);
        assert_eq!(d14.events[0].symbol.as_str(), "KO");
        assert_eq!(d14.events[0].company_name, "KO");
        assert_eq!(d14.events[0].logo_url, "/stock.avif");
        assert_eq!(d14.events[0].amount, Some(0.51));
        assert_eq!(d14.events[1].kind, CalendarEventKind::Earnings);
        assert_eq!(d14.events[1].company_name, "Apple");

        let d20 = cal.day(date(2026, 10, 20)).unwrap();
        assert_eq!(d20.events[0].kind, CalendarEventKind::Payout);
        assert_eq!(d20.events[0].logo_url, "http://logo/aapl.png");
    }

    #[test]
    fn dividend_date_shows_even_when_payout_falls_next_month() {
        let mut ko = record("KO");
        ko.dividend_date = Some(date(2026, 10, 20));
        ko.payout_date = Some(date(2026, 11, 2));

        let oct = CalendarMonth::build(2026, 10, &[ko.clone()], &ReferenceData::default()).unwrap();
        assert_eq!(oct.event_count(), 1);
        let d20 = oct.day(date(2026, 10, 20)).unwrap();
        assert_eq!(d20.events[0].kind, CalendarEventKind::Dividend);

        let nov = CalendarMonth::build(2026, 11, &[ko], &ReferenceData::default()).unwrap();
        assert_eq!(nov.event_count(), 1);
        assert_eq!(nov.day(date(2026, 11, 2)).unwrap().events[0].kind, CalendarEventKind::Payout);
    }

    #[test]
    fn same_day_dividend_and_payout_is_one_event() {
        let mut pep = record("PEP");
        pep.dividend_date = Some(date(2026, 10, 9));
        pep.payout_date = Some(date(2026, 10, 9));

        let cal = CalendarMonth::build(2026, 10, &[pep], &ReferenceData::default()).unwrap();
        assert_eq!(cal.event_count(), 1);
        assert_eq!(cal.days[8].events[0].kind, CalendarEventKind::Dividend);
    }

    #[test]
    fn rejects_bad_month() {
        assert!(CalendarMonth::build(2026, 13, &[], &ReferenceData::default()).is_err());
    }
}
