use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use axum::routing::{delete, get, post, put};
use axum::{Json, Router, extract::State};
use clap::{Args, Parser};
use log::info;
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use hachi_core::{Config, Database};

mod content;
mod day;
mod error;
mod integrations;
mod metrics;

fn main() {
    if let Err(err) = try_main() {
        let _ = writeln!(io::stderr(), "{err:?}");
        std::process::exit(1);
    }
}

#[tokio::main]
async fn try_main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    let config_path = cli
        .common
        .config
        .unwrap_or_else(Config::default_config_path);
    let config = Config::ensure_at(&config_path)?;

    let db = Database::open(&config.database).await?;
    let host = cli.common.host.unwrap_or_else(|| config.server.host.clone());
    let port = cli.common.port.unwrap_or(config.server.port);

    let state = AppState {
        config: Arc::new(config),
        db: Arc::new(db),
    };

    let listener = tokio::net::TcpListener::bind((host.as_str(), port)).await?;
    info!("Starting API server on {}", listener.local_addr()?);
    axum::serve(listener, app(state)).await?;

    Ok(())
}

/// Build the router with every route and middleware layer.
fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/config", get(get_config))
        // day planner
        .route("/day/today/{ws}", get(day::today))
        .route("/day/{ws}/month/{period}", get(day::month))
        .route("/day/{ws}/{date}/tasks", get(day::tasks))
        .route("/day/{ws}/{date}/add", post(day::add))
        .route("/day/{ws}/{date}/clear_done", post(day::clear_done))
        .route("/day/{ws}/{date}/{id}/toggle", post(day::toggle))
        .route(
            "/day/{ws}/{date}/{id}",
            axum::routing::patch(day::edit).delete(day::delete),
        )
        // catalog and progress
        .route("/workspaces", post(metrics::create_workspace))
        .route("/workspaces/{ws}/attach_kpi", post(metrics::attach_kpi))
        .route("/kpis", post(metrics::create_kpi).get(metrics::list_kpis))
        .route("/goals", post(metrics::create_goal).put(metrics::set_goal))
        .route("/goals/{kpi}/{period}", get(metrics::get_goal))
        .route("/metrics", post(metrics::record_metric))
        .route("/metrics/progress/{kpi}/{period}", get(metrics::kpi_progress))
        .route(
            "/metrics/progress/workspace/{ws}/{period}",
            get(metrics::workspace_progress),
        )
        .route("/metrics/series/{kpi}/{period}", get(metrics::series))
        // wins, references, reports
        .route("/wins", post(content::create_win).get(content::list_wins))
        .route(
            "/references",
            post(content::create_reference).get(content::list_references),
        )
        .route("/references/tags", get(content::reference_tags))
        .route(
            "/references/{id}",
            put(content::update_reference).delete(content::delete_reference),
        )
        .route("/reports/preview", post(content::preview_report))
        // provider connections
        .route("/integrations/{provider}/status", get(integrations::status))
        .route(
            "/integrations/{provider}/disconnect",
            delete(integrations::disconnect),
        )
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Debug, Parser)]
#[command(author, version, about = "HTTP API server for hachi")]
struct Cli {
    #[command(flatten)]
    common: CommonOpts,
}

#[derive(Debug, Clone, Args)]
struct CommonOpts {
    /// Override the config file path
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Address to bind (defaults to `server.host` from config)
    #[arg(long)]
    host: Option<String>,

    /// Port to listen on (defaults to `server.port` from config)
    #[arg(short, long)]
    port: Option<u16>,
}

#[derive(Clone)]
pub(crate) struct AppState {
    config: Arc<Config>,
    db: Arc<Database>,
}

#[derive(Serialize)]
struct RootResponse {
    name: &'static str,
    version: &'static str,
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
}

async fn root() -> Json<RootResponse> {
    Json(RootResponse {
        name: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

async fn get_config(State(state): State<AppState>) -> Json<Config> {
    Json((*state.config).clone())
}

#[cfg(test)]
#[path = "main_tests.rs"]
mod tests;
