use crate::error::ApiError;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{delete, get, put};
use axum::{Json, Router};
use chrono::{NaiveDate, Utc};
use divtrack_core::dashboard::{Dashboard, DividendHistoryView, WatchlistQuery};
use divtrack_core::domain::dividend::HistoryRange;
use divtrack_core::domain::notification::NotificationKind;
use divtrack_core::domain::watchlist::WatchlistEntry;
use divtrack_core::domain::Symbol;
use divtrack_core::staleness::AnalysisOutcome;
use divtrack_core::view::calendar::CalendarMonth;
use divtrack_core::view::factor::FactorScore;
use divtrack_core::view::feed::NotificationFeed;
use divtrack_core::view::merge::WatchlistView;
use divtrack_core::view::pipeline::{FilterSet, NumericRange, SortDirection, SortKey, SortSpec};
use divtrack_core::view::{Page, DEFAULT_PER_PAGE};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// `dashboard` is `None` when the API started without a record store.
#[derive(Clone)]
pub struct AppState {
    pub dashboard: Option<Arc<Dashboard>>,
}

impl AppState {
    fn dashboard(&self) -> Result<&Dashboard, ApiError> {
        self.dashboard.as_deref().ok_or(ApiError::Degraded)
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/users/:user_id/watchlist", get(get_watchlist).post(save_entry))
        .route("/users/:user_id/watchlist/:symbol", delete(remove_entry))
        .route("/users/:user_id/watchlist/:symbol/favorite", put(set_favorite))
        .route("/users/:user_id/watchlist/:symbol/quantity", put(set_quantity))
        .route("/users/:user_id/display-name", get(get_display_name))
        .route("/analysis/:symbol", get(get_analysis))
        .route("/calendar/:year/:month", get(get_calendar))
        .route("/notifications", get(get_notifications))
        .route("/stocks/:symbol/factors", get(get_factors))
        .route("/stocks/:symbol/dividends", get(get_dividend_history))
        .with_state(state)
}

async fn healthz() -> &'static str {
    "ok"
}

fn parse_symbol(raw: &str) -> Result<Symbol, ApiError> {
    Symbol::parse(raw).ok_or_else(|| ApiError::bad_request("symbol must not be empty"))
}

#[derive(Debug, Default, Deserialize)]
pub struct WatchlistParams {
    q: Option<String>,
    sector: Option<String>,
    industry: Option<String>,
    min_price: Option<f64>,
    max_price: Option<f64>,
    min_yield: Option<f64>,
    max_yield: Option<f64>,
    #[serde(default)]
    favorites: bool,
    sort: Option<String>,
    dir: Option<String>,
    page: Option<usize>,
    per_page: Option<usize>,
}

impl WatchlistParams {
    fn into_query(self) -> Result<WatchlistQuery, ApiError> {
        let direction = match self.dir.as_deref() {
            Some(raw) => SortDirection::parse(raw)
                .ok_or_else(|| ApiError::bad_request(format!("unknown sort direction: {raw}")))?,
            None => SortDirection::default(),
        };
        let sort = match self.sort.as_deref() {
            Some(raw) => Some(SortSpec {
                key: SortKey::parse(raw)
                    .ok_or_else(|| ApiError::bad_request(format!("unknown sort key: {raw}")))?,
                direction,
            }),
            None => None,
        };

        Ok(WatchlistQuery {
            filters: FilterSet {
                search: self.q,
                sector: self.sector,
                industry: self.industry,
                price: NumericRange::new(self.min_price, self.max_price),
                dividend_yield: NumericRange::new(self.min_yield, self.max_yield),
                favorites_only: self.favorites,
            },
            sort,
            page: self.page.unwrap_or(1),
            per_page: self.per_page.unwrap_or(DEFAULT_PER_PAGE),
        })
    }
}

async fn get_watchlist(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Query(params): Query<WatchlistParams>,
) -> Result<Json<Page<WatchlistView>>, ApiError> {
    let dashboard = state.dashboard()?;
    let query = params.into_query()?;
    Ok(Json(dashboard.watchlist(user_id, &query).await?))
}

#[derive(Debug, Deserialize)]
pub struct SaveEntryBody {
    symbol: String,
    company_name: Option<String>,
    #[serde(default)]
    is_favorite: bool,
    price: Option<f64>,
    dividend_yield: Option<f64>,
    next_dividend_date: Option<NaiveDate>,
    quantity: Option<i32>,
}

async fn save_entry(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Json(body): Json<SaveEntryBody>,
) -> Result<(StatusCode, Json<WatchlistEntry>), ApiError> {
    let dashboard = state.dashboard()?;
    let symbol = parse_symbol(&body.symbol)?;
    if body.quantity.is_some_and(|q| q < 1) {
        return Err(ApiError::bad_request("quantity must be at least 1"));
    }

    let mut entry = WatchlistEntry::new(user_id, symbol, body.company_name.unwrap_or_default());
    entry.is_favorite = body.is_favorite;
    entry.price = body.price;
    entry.dividend_yield = body.dividend_yield;
    entry.next_dividend_date = body.next_dividend_date;
    entry.quantity = body.quantity;

    dashboard.save(&entry).await?;
    Ok((StatusCode::CREATED, Json(entry)))
}

#[derive(Debug, Deserialize)]
pub struct FavoriteBody {
    favorite: bool,
}

async fn set_favorite(
    State(state): State<AppState>,
    Path((user_id, symbol)): Path<(Uuid, String)>,
    Json(body): Json<FavoriteBody>,
) -> Result<StatusCode, ApiError> {
    let dashboard = state.dashboard()?;
    let symbol = parse_symbol(&symbol)?;
    if dashboard.toggle_favorite(user_id, &symbol, body.favorite).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::not_found(format!("{symbol} is not on this watchlist")))
    }
}

#[derive(Debug, Deserialize)]
pub struct QuantityBody {
    quantity: i32,
}

async fn set_quantity(
    State(state): State<AppState>,
    Path((user_id, symbol)): Path<(Uuid, String)>,
    Json(body): Json<QuantityBody>,
) -> Result<StatusCode, ApiError> {
    let dashboard = state.dashboard()?;
    let symbol = parse_symbol(&symbol)?;
    if body.quantity < 1 {
        return Err(ApiError::bad_request("quantity must be at least 1"));
    }
    if dashboard.set_quantity(user_id, &symbol, body.quantity).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::not_found(format!("{symbol} is not on this watchlist")))
    }
}

async fn remove_entry(
    State(state): State<AppState>,
    Path((user_id, symbol)): Path<(Uuid, String)>,
) -> Result<StatusCode, ApiError> {
    let dashboard = state.dashboard()?;
    let symbol = parse_symbol(&symbol)?;
    if dashboard.remove(user_id, &symbol).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::not_found(format!("{symbol} is not on this watchlist")))
    }
}

#[derive(Debug, Deserialize)]
pub struct DisplayNameParams {
    email: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DisplayName {
    display_name: String,
}

async fn get_display_name(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Query(params): Query<DisplayNameParams>,
) -> Result<Json<DisplayName>, ApiError> {
    let dashboard = state.dashboard()?;
    let display_name = dashboard.display_name(user_id, params.email.as_deref()).await;
    Ok(Json(DisplayName { display_name }))
}

async fn get_analysis(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
) -> Result<Json<AnalysisOutcome>, ApiError> {
    let dashboard = state.dashboard()?;
    let symbol = parse_symbol(&symbol)?;
    Ok(Json(dashboard.analysis(&symbol, Utc::now()).await?))
}

async fn get_calendar(
    State(state): State<AppState>,
    Path((year, month)): Path<(i32, u32)>,
) -> Result<Json<CalendarMonth>, ApiError> {
    let dashboard = state.dashboard()?;
    if !(1..=12).contains(&month) {
        return Err(ApiError::bad_request(format!("month must be 1-12, got {month}")));
    }
    Ok(Json(dashboard.calendar(year, month).await?))
}

#[derive(Debug, Deserialize)]
pub struct NotificationParams {
    kind: Option<String>,
    highlight: Option<String>,
}

async fn get_notifications(
    State(state): State<AppState>,
    Query(params): Query<NotificationParams>,
) -> Result<Json<NotificationFeed>, ApiError> {
    let dashboard = state.dashboard()?;
    let kind = match params.kind.as_deref().map(str::trim) {
        None | Some("") | Some("all") => None,
        Some(raw) => Some(
            NotificationKind::parse(raw)
                .ok_or_else(|| ApiError::bad_request(format!("unknown notification kind: {raw}")))?,
        ),
    };
    let feed = dashboard
        .notifications(kind, params.highlight.as_deref(), Utc::now())
        .await;
    Ok(Json(feed))
}

async fn get_factors(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
) -> Result<Json<FactorScore>, ApiError> {
    let dashboard = state.dashboard()?;
    let symbol = parse_symbol(&symbol)?;
    dashboard
        .factors(&symbol)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("no dividend data for {symbol}")))
}

#[derive(Debug, Deserialize)]
pub struct HistoryParams {
    range: Option<String>,
}

async fn get_dividend_history(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
    Query(params): Query<HistoryParams>,
) -> Result<Json<DividendHistoryView>, ApiError> {
    let dashboard = state.dashboard()?;
    let symbol = parse_symbol(&symbol)?;
    let raw = params.range.as_deref().unwrap_or("MAX");
    let range = HistoryRange::parse(raw)
        .ok_or_else(|| ApiError::bad_request(format!("unknown range: {raw}")))?;
    let today = Utc::now().date_naive();
    Ok(Json(dashboard.dividend_history(&symbol, range, today).await?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use divtrack_core::domain::dividend::DividendRecord;
    use divtrack_core::storage::MemoryStore;

    fn state_with(store: Arc<MemoryStore>) -> AppState {
        AppState {
            dashboard: Some(Arc::new(Dashboard::new(store))),
        }
    }

    fn degraded() -> AppState {
        AppState { dashboard: None }
    }

    #[tokio::test]
    async fn degraded_state_rejects_requests() {
        let err = get_factors(State(degraded()), Path("KO".to_string()))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Degraded));
    }

    #[tokio::test]
    async fn save_then_list_watchlist() {
        let state = state_with(Arc::new(MemoryStore::new()));
        let user = Uuid::new_v4();
        let body = SaveEntryBody {
            symbol: "ko".to_string(),
            company_name: Some("Coca-Cola".to_string()),
            is_favorite: false,
            price: Some(62.0),
            dividend_yield: None,
            next_dividend_date: None,
            quantity: None,
        };
        let (status, Json(saved)) = save_entry(State(state.clone()), Path(user), Json(body))
            .await
            .unwrap();
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(saved.symbol.as_str(), "KO");

        let Json(page) = get_watchlist(State(state), Path(user), Query(WatchlistParams::default()))
            .await
            .unwrap();
        assert_eq!(page.total_items, 1);
        assert_eq!(page.items[0].company_name, "Coca-Cola");
        assert_eq!(page.items[0].quantity, 1);
    }

    #[tokio::test]
    async fn unknown_sort_key_is_bad_request() {
        let state = state_with(Arc::new(MemoryStore::new()));
        let params = WatchlistParams {
            sort: Some("volume".to_string()),
            ..WatchlistParams::default()
        };
        let err = get_watchlist(State(state), Path(Uuid::new_v4()), Query(params))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));
    }

    #[tokio::test]
    async fn favorite_on_missing_entry_is_not_found() {
        let state = state_with(Arc::new(MemoryStore::new()));
        let err = set_favorite(
            State(state),
            Path((Uuid::new_v4(), "KO".to_string())),
            Json(FavoriteBody { favorite: true }),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }

    #[tokio::test]
    async fn factors_for_known_symbol() {
        let store = Arc::new(MemoryStore::new());
        let mut ko = DividendRecord::empty(Symbol::parse("KO").unwrap());
        ko.dividend_yield = Some(5.0);
        ko.payout_ratio = Some(0.0);
        store.put_dividend(ko).await;

        let Json(score) = get_factors(State(state_with(store.clone())), Path("ko".to_string()))
            .await
            .unwrap();
        assert_eq!(score.total, 100);

        let err = get_factors(State(state_with(store)), Path("PEP".to_string()))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }

    #[tokio::test]
    async fn calendar_rejects_invalid_month() {
        let state = state_with(Arc::new(MemoryStore::new()));
        let err = get_calendar(State(state), Path((2026, 0))).await.unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));
    }

    #[tokio::test]
    async fn analysis_without_provider_is_unavailable() {
        let state = state_with(Arc::new(MemoryStore::new()));
        let err = get_analysis(State(state), Path("KO".to_string()))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::AnalysisUnavailable));
    }
}
