use crate::domain::dividend::DividendRecord;
use crate::domain::notification::{DividendAnnouncement, NewsItem, NotificationItem, NotificationKind};
use crate::reference::ReferenceData;
use chrono::{DateTime, Utc};
use serde::Serialize;

pub const ANNOUNCEMENT_LIMIT: usize = 5;
pub const NEWS_LIMIT: usize = 20;
pub const EARNINGS_WINDOW_DAYS: i64 = 30;

/// Merges announcements (newest `ANNOUNCEMENT_LIMIT` by date), earnings reports and news
/// into one list ordered newest first. Items with equal timestamps keep source order:
/// dividends, then earnings, then news.
pub fn assemble(
    mut announcements: Vec<DividendAnnouncement>,
    earnings: &[DividendRecord],
    news: Vec<NewsItem>,
    refs: &ReferenceData,
) -> Vec<NotificationItem> {
    announcements.sort_by(|a, b| b.date.cmp(&a.date));
    announcements.truncate(ANNOUNCEMENT_LIMIT);

    let mut items: Vec<NotificationItem> = announcements.into_iter().map(Into::into).collect();

    items.extend(earnings.iter().filter_map(|r| {
        let earnings_date = r.earnings_date?;
        let key = r.symbol.as_str();
        let company_name = refs
            .logos
            .get(key)
            .and_then(|l| l.company_name.clone())
            .or_else(|| refs.profiles.get(key).and_then(|p| p.company_name.clone()))
            .or_else(|| r.short_name.clone());
        Some(NotificationItem::Earnings {
            id: format!("{}-{}", r.symbol, earnings_date),
            symbol: r.symbol.clone(),
            company_name,
            earnings_date,
            earnings_average: r.earnings_average,
            revenue_average: r.revenue_average,
        })
    }));

    items.extend(news.into_iter().map(Into::into));
    items.sort_by(|a, b| b.timestamp().cmp(&a.timestamp()));
    items
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeedEntry {
    #[serde(flatten)]
    pub item: NotificationItem,
    pub age: String,
    pub highlighted: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NotificationFeed {
    pub items: Vec<FeedEntry>,
    pub highlighted_index: Option<usize>,
}

/// Narrows `items` to one kind (if given) and marks the entry whose id equals
/// `highlight`. An unknown highlight id marks nothing.
pub fn build_feed(
    items: Vec<NotificationItem>,
    kind: Option<NotificationKind>,
    highlight: Option<&str>,
    now: DateTime<Utc>,
) -> NotificationFeed {
    let entries: Vec<FeedEntry> = items
        .into_iter()
        .filter(|item| kind.map_or(true, |k| item.kind() == k))
        .map(|item| {
            let highlighted = highlight.is_some_and(|h| h == item.id());
            FeedEntry {
                age: relative_age(now, item.timestamp()),
                item,
                highlighted,
            }
        })
        .collect();

    let highlighted_index = entries.iter().position(|e| e.highlighted);
    NotificationFeed {
        items: entries,
        highlighted_index,
    }
}

/// Human-readable distance between `now` and `ts` in either direction.
pub fn relative_age(now: DateTime<Utc>, ts: DateTime<Utc>) -> String {
    let diff = (now - ts).abs();
    let days = diff.num_days();
    match days {
        0 => {
            let hours = diff.num_hours();
            if hours == 0 {
                let minutes = diff.num_minutes();
                format!("{minutes} minute{} ago", plural(minutes))
            } else {
                format!("{hours} hour{} ago", plural(hours))
            }
        }
        1 => "Yesterday".to_string(),
        2..=6 => format!("{days} days ago"),
        _ => ts.format("%Y-%m-%d").to_string(),
    }
}

fn plural(n: i64) -> &'static str {
    if n == 1 {
        ""
    } else {
        "s"
    }
}
