use anyhow::Context;
use clap::{Parser, Subcommand};
use divtrack_core::config::Settings;
use divtrack_core::dashboard::Dashboard;
use divtrack_core::reference::loader::{build_logo_map, fetch_reference_text, parse_reference_text};
use divtrack_core::staleness::StalenessGate;
use divtrack_core::storage::repo::CompanyRepository;
use divtrack_core::storage::{PgRecordStore, RecordStore, Table};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod logos;
mod refresh;

#[derive(Debug, Parser)]
#[command(name = "divtrack_worker")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Regenerate stale AI analyses for watched symbols.
    RefreshAnalyses {
        /// Limit the run to these symbols. Repeatable.
        #[arg(long = "symbol")]
        symbols: Vec<String>,

        /// Report what would be regenerated without calling the provider.
        #[arg(long)]
        dry_run: bool,
    },
    /// Load the logo reference file and upsert it into the logo table.
    ImportLogos {
        /// Local path or http(s) URL. Defaults to REFERENCE_FILE.
        #[arg(long)]
        file: Option<String>,

        /// Parse and report only.
        #[arg(long)]
        dry_run: bool,
    },
    /// Print row changes for one table until Ctrl-C.
    Watch {
        #[arg(long)]
        table: String,
    },
}

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

    let args = Args::parse();

    let result = match args.command {
        Command::RefreshAnalyses { symbols, dry_run } => {
            refresh_analyses(&settings, &symbols, dry_run).await
        }
        Command::ImportLogos { file, dry_run } => import_logos(&settings, file, dry_run).await,
        Command::Watch { table } => watch(&settings, &table).await,
    };

    if let Err(err) = &result {
        sentry_anyhow::capture_anyhow(err);
    }
    result
}

async fn connect(settings: &Settings) -> anyhow::Result<PgRecordStore> {
    let db_url = settings.require_database_url()?;
    let store = PgRecordStore::connect(db_url).await?;
    divtrack_core::storage::migrate(store.pool()).await?;
    Ok(store)
}

async fn refresh_analyses(settings: &Settings, requested: &[String], dry_run: bool) -> anyhow::Result<()> {
    let store: Arc<dyn RecordStore> = Arc::new(connect(settings).await?);
    let gate = StalenessGate::new(settings.staleness_threshold());
    let now = chrono::Utc::now();

    let symbols = refresh::target_symbols(store.as_ref(), requested).await?;
    if symbols.is_empty() {
        tracing::info!("no symbols to refresh");
        store.close().await;
        return Ok(());
    }

    if dry_run {
        let plan = refresh::plan(store.as_ref(), &gate, &symbols, now).await?;
        for (symbol, freshness) in &plan {
            tracing::info!(symbol = %symbol, ?freshness, dry_run = true, "analysis status");
        }
        let due = plan
            .iter()
            .filter(|(_, f)| *f != refresh::Freshness::Fresh)
            .count();
        tracing::info!(checked = plan.len(), due, dry_run = true, "refresh plan");
        store.close().await;
        return Ok(());
    }

    let generator = divtrack_core::llm::generator_from_settings(settings)?;
    tracing::info!(provider = %generator.provider(), symbols = symbols.len(), "refreshing analyses");
    let dashboard = Dashboard::new(store.clone())
        .with_gate(gate)
        .with_generator(generator);

    let summary = refresh::run(&dashboard, &symbols, now).await;
    tracing::info!(
        checked = summary.checked,
        cached = summary.cached,
        generated = summary.generated,
        failed = summary.failed,
        "analysis refresh finished"
    );
    store.close().await;
    Ok(())
}

async fn import_logos(settings: &Settings, file: Option<String>, dry_run: bool) -> anyhow::Result<()> {
    let source = file
        .or_else(|| settings.reference_file.clone())
        .context("--file or REFERENCE_FILE is required")?;

    let text = fetch_reference_text(&reqwest::Client::new(), &source).await?;
    let parsed = parse_reference_text(&text);
    let total = parsed.rows.len();
    let malformed = parsed.malformed;
    let rows = logos::to_company_rows(&build_logo_map(parsed.rows));

    if dry_run {
        tracing::info!(source = %source, total, malformed, valid = rows.len(), dry_run = true, "logo import parsed");
        return Ok(());
    }

    let store = connect(settings).await?;
    let written = store.upsert_logos(&rows).await?;
    tracing::info!(source = %source, total, malformed, written, "logo import finished");
    store.close().await;
    Ok(())
}

async fn watch(settings: &Settings, table: &str) -> anyhow::Result<()> {
    let table = Table::parse(table).with_context(|| format!("unknown table: {table}"))?;
    let store = connect(settings).await?;
    store.spawn_change_listener().await?;

    let handle = store.changes().subscribe(table, |event| {
        tracing::info!(
            table = %event.table,
            op = ?event.op,
            symbol = ?event.symbol,
            user_id = ?event.user_id,
            "row changed"
        );
    });
    tracing::info!(%table, "watching for changes; Ctrl-C to stop");

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl-C")?;

    handle.unsubscribe().await;
    store.close().await;
    tracing::info!(%table, "stopped watching");
    Ok(())
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
