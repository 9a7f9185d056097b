//! Display-ready view models built from store records and reference maps.

pub mod calendar;
pub mod factor;
pub mod feed;
pub mod merge;
pub mod pipeline;

use chrono::NaiveDate;
use serde::{Serialize, Serializer};

pub const PLACEHOLDER_LOGO: &str = "/stock.avif";
pub const NOT_AVAILABLE: &str = "N/A";

pub const DEFAULT_PER_PAGE: usize = 10;
pub const MAX_PER_PAGE: usize = 100;

/// Serializes a missing date as `"N/A"` instead of `null`.
pub(crate) fn date_or_na<S>(date: &Option<NaiveDate>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match date {
        Some(d) => d.serialize(serializer),
        None => serializer.serialize_str(NOT_AVAILABLE),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: usize,
    pub per_page: usize,
    pub total_items: usize,
    pub total_pages: usize,
}

/// 1-based pagination. `page` is clamped into `1..=total_pages`; an empty input
/// yields page 1 of 1 with no items.
pub fn paginate<T>(items: Vec<T>, page: usize, per_page: usize) -> Page<T> {
    let per_page = per_page.clamp(1, MAX_PER_PAGE);
    let total_items = items.len();
    let total_pages = total_items.div_ceil(per_page).max(1);
    let page = page.clamp(1, total_pages);

    let items = items
        .into_iter()
        .skip((page - 1) * per_page)
        .take(per_page)
        .collect();

    Page {
        items,
        page,
        per_page,
        total_items,
        total_pages,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paginate_slices_and_counts() {
        let p = paginate((1..=25).collect::<Vec<_>>(), 3, 10);
        assert_eq!(p.items, vec![21, 22, 23, 24, 25]);
        assert_eq!(p.total_pages, 3);
        assert_eq!(p.total_items, 25);
    }

    #[test]
    fn paginate_clamps_out_of_range_pages() {
        let p = paginate((1..=5).collect::<Vec<_>>(), 9, 2);
        assert_eq!(p.page, 3);
        assert_eq!(p.items, vec![5]);

        let p = paginate((1..=5).collect::<Vec<_>>(), 0, 2);
        assert_eq!(p.page, 1);
        assert_eq!(p.items, vec![1, 2]);
    }

    #[test]
    fn paginate_empty_input() {
        let p = paginate(Vec::<u8>::new(), 4, 0);
        assert_eq!(p.page, 1);
        assert_eq!(p.per_page, 1);
        assert_eq!(p.total_pages, 1);
        assert!(p.items.is_empty());
    }
}
