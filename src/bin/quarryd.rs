//! quarryd: serves the schema inferred from a SPARQL endpoint over HTTP.
//!
//! - `POST /graphql`: execute a GraphQL request
//! - `GET  /graphql`: GraphiQL page
//! - `GET  /schema`: schema definition language of the live schema
//! - `GET  /health`: generation, class count and hot reload state
//!
//! Build and run: `cargo run --features server --bin quarryd -- --config quarry.toml`

use std::path::PathBuf;
use std::sync::Arc;

use async_graphql::http::GraphiQLSource;
use axum::extract::State;
use axum::response::Html;
use axum::routing::get;
use axum::{Json, Router};
use clap::Parser;
use miette::{IntoDiagnostic, Result};
use serde::Serialize;
use tokio::sync::watch;
use tower_http::cors::CorsLayer;

use quarry::client;
use quarry::config::QuarryConfig;
use quarry::pipeline::Pipeline;
use quarry::reload::{HotReloadController, LiveSchema, ReloadState};

#[derive(Parser)]
#[command(name = "quarryd", version, about = "GraphQL server over a SPARQL endpoint")]
struct Cli {
    /// TOML configuration file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// SPARQL endpoint URL.
    #[arg(long)]
    endpoint: Option<String>,

    /// Turtle or N-Triples file to serve from an in-process store instead.
    #[arg(long)]
    dataset: Option<PathBuf>,

    /// Keep refining the schema with a growing probe budget while serving.
    #[arg(long)]
    hot_reload: bool,

    /// Address to bind.
    #[arg(long)]
    bind: Option<String>,

    #[arg(long)]
    port: Option<u16>,
}

// ── Server state ──────────────────────────────────────────────────────────

struct ServerState {
    endpoint: String,
    live: Arc<LiveSchema>,
    reload: watch::Receiver<ReloadState>,
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
    endpoint: String,
    generation: u64,
    classes: usize,
    reload: ReloadState,
}

// ── Handlers ──────────────────────────────────────────────────────────────

async fn graphql(
    State(state): State<Arc<ServerState>>,
    Json(request): Json<async_graphql::Request>,
) -> Json<async_graphql::Response> {
    let served = state.live.current().await;
    Json(served.schema.execute(request).await)
}

async fn graphiql() -> Html<String> {
    Html(GraphiQLSource::build().endpoint("/graphql").finish())
}

async fn schema(State(state): State<Arc<ServerState>>) -> String {
    state.live.current().await.schema.sdl()
}

async fn health(State(state): State<Arc<ServerState>>) -> Json<HealthResponse> {
    let served = state.live.current().await;
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        endpoint: state.endpoint.clone(),
        generation: served.generation,
        classes: served.model.len(),
        reload: state.reload.borrow().clone(),
    })
}

// ── Main ──────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,oxigraph=warn")),
        )
        .init();

    let cli = Cli::parse();
    let mut config = match &cli.config {
        Some(path) => QuarryConfig::load(path)?,
        None => QuarryConfig::default(),
    };
    if cli.endpoint.is_some() {
        config.endpoint.url = cli.endpoint.clone();
    }
    if cli.dataset.is_some() {
        config.endpoint.dataset = cli.dataset.clone();
    }
    if cli.hot_reload {
        config.hot_reload.enabled = true;
    }
    if let Some(bind) = &cli.bind {
        config.server.bind = bind.clone();
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    config.validate()?;

    let endpoint = config.endpoint.name.clone();
    let addr = format!("{}:{}", config.server.bind, config.server.port);
    let hot_reload = config.hot_reload.clone();

    let pipeline = Arc::new(Pipeline::new(client::connect(&config.endpoint)?, config));
    let live = Arc::new(LiveSchema::new(pipeline.initial().await?));
    tracing::info!("initial schema ready");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let controller = HotReloadController::new(Arc::clone(&pipeline), Arc::clone(&live), hot_reload, shutdown_rx);
    let reload = controller.state();
    let reloader = tokio::spawn(async move {
        match controller.run().await {
            Ok(reason) => tracing::info!(?reason, "hot reload finished"),
            Err(e) => tracing::error!(error = %e, "hot reload stopped on error, keeping the last good schema"),
        }
    });

    let state = Arc::new(ServerState {
        endpoint,
        live,
        reload,
    });

    let app = Router::new()
        .route("/health", get(health))
        .route("/schema", get(schema))
        .route("/graphql", get(graphiql).post(graphql))
        .layer(CorsLayer::permissive())
        .with_state(state);

    tracing::info!("quarryd listening on {addr}");
    let listener = tokio::net::TcpListener::bind(&addr).await.into_diagnostic()?;

    // Serve with graceful shutdown on SIGTERM/SIGINT; hot reload stops too.
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let ctrl_c = tokio::signal::ctrl_c();
            #[cfg(unix)]
            {
                match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                    Ok(mut sigterm) => {
                        tokio::select! {
                            _ = ctrl_c => {},
                            _ = sigterm.recv() => {},
                        }
                    }
                    Err(e) => {
                        tracing::warn!("failed to register SIGTERM handler: {e}");
                        ctrl_c.await.ok();
                    }
                }
            }
            #[cfg(not(unix))]
            {
                ctrl_c.await.ok();
            }
            tracing::info!("quarryd shutting down");
            let _ = shutdown_tx.send(true);
        })
        .await
        .into_diagnostic()?;

    reloader.await.into_diagnostic()?;
    Ok(())
}
