use anyhow::Context;
use chrono::{Datelike, Months, NaiveDate};

/// First and last day of a calendar month.
pub fn month_bounds(year: i32, month: u32) -> anyhow::Result<(NaiveDate, NaiveDate)> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)
        .with_context(|| format!("invalid calendar month {year}-{month:02}"))?;
    let last = first
        .checked_add_months(Months::new(1))
        .and_then(|next| next.pred_opt())
        .with_context(|| format!("calendar month {year}-{month:02} out of range"))?;
    Ok((first, last))
}

/// Blank cells before day 1 in a Monday-first grid.
pub fn leading_blanks(first_of_month: NaiveDate) -> u32 {
    first_of_month.weekday().num_days_from_monday()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handles_leap_february() {
        assert_eq!(month_bounds(2024, 2).unwrap().1.day(), 29);
        assert_eq!(month_bounds(2026, 2).unwrap().1.day(), 28);
        let (first, last) = month_bounds(2026, 12).unwrap();
        assert_eq!((first.day(), last.day(), last.year()), (1, 31, 2026));
    }

    #[test]
    fn rejects_invalid_month() {
        assert!(month_bounds(2026, 13).is_err());
        assert!(month_bounds(2026, 0).is_err());
    }

    #[test]
    fn monday_first_offset() {
        // 2026-10-01 is a Thursday.
        let first = NaiveDate::from_ymd_opt(2026, 10, 1).unwrap();
        assert_eq!(leading_blanks(first), 3);
        // 2026-06-01 is a Monday.
        let first = NaiveDate::from_ymd_opt(2026, 6, 1).unwrap();
        assert_eq!(leading_blanks(first), 0);
    }
}
