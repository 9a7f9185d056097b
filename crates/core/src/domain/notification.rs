use crate::domain::symbol::Symbol;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stored dividend announcement (`dividend_announcements` table).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DividendAnnouncement {
    pub id: Uuid,
    pub symbol: Symbol,
    pub header: String,
    pub message: String,
    pub amount: Option<f64>,
    pub date: NaiveDate,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsItem {
    pub id: Uuid,
    pub symbol: Option<Symbol>,
    pub title: String,
    pub source: Option<String>,
    pub url: String,
    pub published_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Dividend,
    Earnings,
    News,
}

impl NotificationKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dividend" => Some(Self::Dividend),
            "earnings" => Some(Self::Earnings),
            "news" => Some(Self::News),
            _ => None,
        }
    }
}

/// One entry of the transient notification feed. Each variant keeps its own date field;
/// `timestamp()` gives the common ordering key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NotificationItem {
    Dividend {
        id: String,
        symbol: Symbol,
        header: String,
        message: String,
        amount: Option<f64>,
        date: NaiveDate,
    },
    Earnings {
        id: String,
        symbol: Symbol,
        company_name: Option<String>,
        earnings_date: NaiveDate,
        earnings_average: Option<f64>,
        revenue_average: Option<f64>,
    },
    News {
        id: String,
        symbol: Option<Symbol>,
        title: String,
        source: Option<String>,
        url: String,
        published_at: DateTime<Utc>,
    },
}

impl NotificationItem {
    pub fn kind(&self) -> NotificationKind {
        match self {
            Self::Dividend { .. } => NotificationKind::Dividend,
            Self::Earnings { .. } => NotificationKind::Earnings,
            Self::News { .. } => NotificationKind::News,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Self::Dividend { id, .. } | Self::Earnings { id, .. } | Self::News { id, .. } => id,
        }
    }

    pub fn symbol(&self) -> Option<&Symbol> {
        match self {
            Self::Dividend { symbol, .. } | Self::Earnings { symbol, .. } => Some(symbol),
            Self::News { symbol, .. } => symbol.as_ref(),
        }
    }

    /// Date-only variants sort at midnight UTC of their date.
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Self::Dividend { date, .. } => date.and_time(NaiveTime::MIN).and_utc(),
            Self::Earnings { earnings_date, .. } => earnings_date.and_time(NaiveTime::MIN).and_utc(),
            Self::News { published_at, .. } => *published_at,
        }
    }
}

impl From<DividendAnnouncement> for NotificationItem {
    fn from(a: DividendAnnouncement) -> Self {
        Self::Dividend {
            id: a.id.to_string(),
            symbol: a.symbol,
            header: a.header,
            message: a.message,
            amount: a.amount,
            date: a.date,
        }
    }
}

impl From<NewsItem> for NotificationItem {
    fn from(n: NewsItem) -> Self {
        Self::News {
            id: n.id.to_string(),
            symbol: n.symbol,
            title: n.title,
            source: n.source,
            url: n.url,
            published_at: n.published_at,
        }
    }
}
