use axum::{routing::get, routing::post, Router};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::sync::Arc;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use photo_restore::app_state::AppState;
use photo_restore::config::AppConfig;
use photo_restore::services::{replicate::ReplicateClient, storage::StorageClient};
use photo_restore::{db, routes};

#[tokio::main]
async fn main() {
    // Initialize structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    // Load configuration from environment
    let config = AppConfig::from_env().expect("Failed to load configuration from environment");

    tracing::info!("Initializing photo-restore server");

    // Initialize Prometheus metrics recorder
    let prometheus_handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("Failed to install Prometheus metrics recorder");
    let prometheus_handle = Arc::new(prometheus_handle);

    // Register application metrics
    metrics::describe_counter!(
        "restoration_jobs_total",
        "Total restoration jobs submitted"
    );
    metrics::describe_counter!(
        "restoration_jobs_completed",
        "Total restoration jobs completed"
    );
    metrics::describe_counter!(
        "restoration_jobs_failed",
        "Total restoration jobs that failed or timed out"
    );
    metrics::describe_counter!(
        "credits_refunded_total",
        "Total credits refunded for failed jobs"
    );
    metrics::describe_histogram!(
        "restoration_processing_seconds",
        "Time from job submission to webhook-confirmed completion"
    );

    // Initialize database connection pool
    tracing::info!("Connecting to PostgreSQL database");
    let db_pool = db::init_pool(&config.database_url)
        .await
        .expect("Failed to connect to database");

    // Run database migrations
    tracing::info!("Running database migrations");
    db::run_migrations(&db_pool)
        .await
        .expect("Failed to run database migrations");

    // Initialize storage client
    tracing::info!("Initializing storage client");
    let storage = StorageClient::new(
        &config.storage_bucket,
        &config.storage_endpoint,
        &config.storage_access_key,
        &config.storage_secret_key,
    )
    .expect("Failed to initialize storage client");

    // Initialize Replicate client
    tracing::info!("Initializing Replicate client");
    let replicate = ReplicateClient::new(&config.replicate_api_token);

    let bind_addr = config.bind_addr.clone();

    // Create shared application state
    let state = AppState::new(db_pool, storage, replicate, config);

    // Build API routes
    let app = Router::new()
        .route("/health", get(routes::health::health_check))
        .route("/api/v1/restore", post(routes::restore::submit_restoration))
        .route(
            "/api/v1/restore/{prediction_id}",
            get(routes::restore::get_job_status),
        )
        .route(
            "/api/v1/restore/{prediction_id}/fail",
            post(routes::restore::report_failure),
        )
        .route(
            "/api/v1/restorations",
            get(routes::restore::list_restorations),
        )
        .route("/api/v1/credits", get(routes::credits::get_credits))
        .route(
            "/api/v1/webhooks/replicate",
            post(routes::webhook::replicate_webhook),
        )
        .with_state(state)
        // Prometheus metrics endpoint (separate state)
        .route(
            "/metrics",
            get(routes::metrics::prometheus_metrics).with_state(prometheus_handle),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .layer(RequestBodyLimitLayer::new(10 * 1024 * 1024)); // 10 MB limit

    tracing::info!("Starting photo-restore on {}", bind_addr);

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .expect("Failed to bind to address");

    tracing::info!("Server listening on {}", bind_addr);

    axum::serve(listener, app)
        .await
        .expect("Server error");
}
