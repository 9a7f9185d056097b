mod error;
mod routes;

use divtrack_core::config::Settings;
use divtrack_core::dashboard::Dashboard;
use divtrack_core::prefs::LocalPrefs;
use divtrack_core::reference::loader::load_logo_map;
use divtrack_core::reference::{LogoEntry, ReferenceMap};
use divtrack_core::staleness::StalenessGate;
use divtrack_core::storage::{PgRecordStore, RecordStore};
use routes::AppState;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    let connected: Option<(Arc<dyn RecordStore>, bool)> = match connect_store(&settings).await {
        Ok(connected) => Some(connected),
        Err(e) => {
            sentry_anyhow::capture_anyhow(&e);
            tracing::error!(error = %format!("{e:#}"), "record store unavailable; starting API in degraded mode");
            None
        }
    };

    let dashboard = match &connected {
        Some((store, realtime)) => Some(Arc::new(build_dashboard(&settings, store.clone(), *realtime).await)),
        None => None,
    };

    let app = routes::router(AppState { dashboard }).layer(TraceLayer::new_for_http());

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(3000);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));

    tracing::info!(%addr, "api listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some((store, _)) = connected {
        store.close().await;
        tracing::info!("record store closed");
    }

    Ok(())
}

/// The flag reports whether the change listener is running.
async fn connect_store(settings: &Settings) -> anyhow::Result<(Arc<dyn RecordStore>, bool)> {
    let db_url = settings.require_database_url()?;
    let store = PgRecordStore::connect(db_url).await?;
    divtrack_core::storage::migrate(store.pool()).await?;
    let realtime = match store.spawn_change_listener().await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(error = %format!("{e:#}"), "realtime changes disabled; reference tables load per request");
            false
        }
    };
    Ok((Arc::new(store), realtime))
}

async fn build_dashboard(settings: &Settings, store: Arc<dyn RecordStore>, realtime: bool) -> Dashboard {
    let mut dashboard = Dashboard::new(store)
        .with_file_logos(file_logos(settings).await)
        .with_gate(StalenessGate::new(settings.staleness_threshold()))
        .with_prefs(LocalPrefs::load(&settings.prefs_path()).await);

    if realtime {
        dashboard = dashboard.with_reference_cache();
    }

    match divtrack_core::llm::generator_from_settings(settings) {
        Ok(generator) => {
            tracing::info!(provider = %generator.provider(), "analysis provider ready");
            dashboard = dashboard.with_generator(generator);
        }
        Err(e) => {
            tracing::warn!(error = %format!("{e:#}"), "analysis disabled");
        }
    }
    dashboard
}

async fn file_logos(settings: &Settings) -> ReferenceMap<LogoEntry> {
    let Some(source) = settings.reference_file.as_deref() else {
        return ReferenceMap::new();
    };
    match load_logo_map(&reqwest::Client::new(), source).await {
        Ok(map) => map,
        Err(e) => {
            tracing::warn!(source, error = %format!("{e:#}"), "reference file unavailable; using store logos only");
            ReferenceMap::new()
        }
    }
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown requested");
}

fn init_sentry(settings: &Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}
