use std::sync::Arc;

use axum::{routing::get, Router};
use tokio::time::{interval, Duration};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use costboard::client::{CachedCostSource, HttpCostClient};
use costboard::config::AppConfig;
use costboard::handlers::{self, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "costboard=info,tower_http=info".into()))
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    // Load configuration
    let config = AppConfig::load()?;
    tracing::info!(base_url = %config.api.base_url, "Configuration loaded");

    // Upstream cost API behind the query cache
    let http = Arc::new(HttpCostClient::new(&config.api)?);
    let cached = Arc::new(CachedCostSource::new(
        http,
        Duration::from_secs(config.cache.stale_time_secs),
        Duration::from_secs(config.cache.gc_time_secs),
    ));
    spawn_cache_eviction(cached.clone(), config.cache.gc_time_secs);

    let state = AppState::new(cached, config.dashboard.clone());

    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/api/v1/dashboard/summary", get(handlers::costs::get_summary))
        .route("/api/v1/dashboard/kpis", get(handlers::budgets::get_kpis))
        .route("/api/v1/dashboard/trend", get(handlers::costs::get_trend))
        .route("/api/v1/dashboard/breakdown", get(handlers::costs::get_breakdown))
        .route("/api/v1/dashboard/budget", get(handlers::budgets::get_budget))
        .route("/api/v1/dashboard/comparison", get(handlers::reports::cost_comparison))
        .route("/api/v1/dashboard/anomalies", get(handlers::anomalies::list))
        .route("/api/v1/dashboard/allocations", get(handlers::allocations::get_allocations))
        .route("/api/v1/dashboard/export/csv", get(handlers::costs::export_csv))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    // Start server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    tracing::info!("Starting costboard server on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shut down gracefully");
    Ok(())
}

fn spawn_cache_eviction(cache: Arc<CachedCostSource>, gc_time_secs: u64) {
    tokio::spawn(async move {
        let mut ticker = interval(Duration::from_secs(gc_time_secs.max(1)));
        loop {
            ticker.tick().await;
            cache.evict_expired();
            let stats = cache.stats();
            tracing::info!(
                size = stats.size,
                hits = stats.hits,
                misses = stats.misses,
                stale_served = stats.stale_served,
                hit_rate = stats.hit_rate,
                "Cost query cache swept"
            );
        }
    });
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
