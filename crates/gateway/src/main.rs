//! RefScore API Gateway
//!
//! HTTP surface over the analysis engine.
//! Handles:
//! - Refinement, analysis, and fix-plan requests
//! - Progress streaming over WebSocket
//! - Request routing
//! - Observability (logging, metrics, tracing)

mod handlers;
mod ws;

use axum::{
    routing::{get, post},
    Router,
};
use metrics_exporter_prometheus::PrometheusBuilder;
use refscore_analysis::{Analyzer, CitationFinder, GuidedFixPlanner, Refiner, ScoringEngine};
use refscore_common::{
    config::AppConfig,
    metrics,
    provider::{create_provider, CachedProvider},
    refine::ProgressEvent,
    MetadataProvider,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::{signal, sync::broadcast};
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Progress events buffered per subscriber before it starts lagging
const PROGRESS_BUFFER: usize = 256;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub analyzer: Arc<Analyzer>,
    pub planner: Arc<GuidedFixPlanner>,
    pub refiner: Arc<Refiner>,
    pub progress: broadcast::Sender<ProgressEvent>,
}

impl AppState {
    /// Wire the engine around `provider`. Searches go through an in-memory
    /// cache unless a refine request opts out.
    pub fn new(config: AppConfig, provider: Arc<dyn MetadataProvider>) -> Self {
        let cached: Arc<dyn MetadataProvider> =
            Arc::new(CachedProvider::new(provider.clone(), config.provider.cache_capacity));

        let engine = ScoringEngine::new(config.scoring);
        let finder = Arc::new(CitationFinder::new(
            cached.clone(),
            engine.clone(),
            config.finder.clone(),
        ));
        let (progress, _) = broadcast::channel(PROGRESS_BUFFER);

        Self {
            analyzer: Arc::new(Analyzer::new(cached.clone(), engine)),
            planner: Arc::new(GuidedFixPlanner::new(finder, config.planner.clone())),
            refiner: Arc::new(Refiner::new(cached, &config).with_uncached(provider)),
            progress,
            config: Arc::new(config),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = AppConfig::load().map_err(|e| {
        eprintln!("Failed to load configuration: {}", e);
        e
    })?;

    init_tracing(&config);

    info!(
        service = %config.observability.service_name,
        "Starting RefScore API Gateway v{}",
        refscore_common::VERSION
    );

    // Initialize metrics
    if config.observability.metrics_port > 0 {
        let metrics_addr = SocketAddr::from(([0, 0, 0, 0], config.observability.metrics_port));
        PrometheusBuilder::new()
            .with_http_listener(metrics_addr)
            .install()?;
        info!("Prometheus exporter listening on {}", metrics_addr);
    }
    metrics::register_metrics();

    let provider = create_provider(&config.provider)?;
    info!(provider = provider.name(), "Metadata provider ready");

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    let state = AppState::new(config, provider);

    // Build the router
    let app = create_router(state);

    // Start the server
    info!("Listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.observability.log_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    if config.observability.json_logging {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Create the main application router
fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Request ID propagation
    let request_id = SetRequestIdLayer::x_request_id(MakeRequestUuid);
    let propagate_id = PropagateRequestIdLayer::x_request_id();

    let body_limit = RequestBodyLimitLayer::new(state.config.server.body_limit_bytes);

    Router::new()
        .route("/health", get(handlers::health::health))
        .route("/refine", post(handlers::refine::refine))
        .route("/analyze", post(handlers::analysis::analyze))
        .route("/fix-plan", post(handlers::analysis::fix_plan))
        .route("/fix-plan/apply", post(handlers::analysis::apply))
        .route("/ws", get(ws::ws_handler))
        .layer(body_limit)
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(request_id)
        .layer(propagate_id)
        .with_state(state)
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, starting shutdown..."),
        _ = terminate => info!("Received SIGTERM, starting shutdown..."),
    }
}
