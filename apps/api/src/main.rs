use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use dotenv::dotenv;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::{self, TraceLayer};
use tracing::{error, info, warn, Level};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod router;

use appointment_cell::{MemorySchedulingStore, PgSchedulingStore, SchedulingState, SchedulingStore};
use notification_queue_cell::{
    LogTransport, MemoryNotificationQueue, NotificationProducer, NotificationQueue, NotificationTransport,
    NotificationWorker, RedisNotificationQueue, WebhookTransport, WorkerConfig,
};
use shared_config::{AppConfig, StorageBackend};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Loading Env Vars
    dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting clinic scheduling API server");

    // Load configuration
    let config = AppConfig::from_env();

    let store = build_store(&config).await?;
    let queue = build_queue(&config).await;
    let transport = build_transport(&config)?;

    // Notification worker runs beside the HTTP server
    let worker = Arc::new(NotificationWorker::new(
        WorkerConfig::from_app_config(&config),
        Arc::clone(&queue),
        transport,
    ));
    let worker_handle = {
        let worker = Arc::clone(&worker);
        tokio::spawn(async move {
            if let Err(e) = worker.start().await {
                error!("Notification worker stopped with error: {}", e);
            }
        })
    };

    let notifier = Arc::new(NotificationProducer::new(Arc::clone(&queue), config.notifier_max_attempts));
    let state = Arc::new(SchedulingState::new(&config, store, notifier));

    // Set up CORS
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Build the application router
    let app = router::create_router(state, queue)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(trace::DefaultMakeSpan::new()
                    .level(Level::INFO))
                .on_response(trace::DefaultOnResponse::new()
                    .level(Level::INFO)),
        )
        .layer(cors);

    // Run the server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    info!("Listening on {}", addr);

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    worker.shutdown().await;
    if let Err(e) = worker_handle.await {
        warn!("Notification worker task ended abnormally: {}", e);
    }

    info!("Server stopped");
    Ok(())
}

async fn build_store(config: &AppConfig) -> anyhow::Result<Arc<dyn SchedulingStore>> {
    match config.storage_backend {
        StorageBackend::Postgres => {
            let pool = shared_database::connect(config).await?;
            shared_database::ensure_schema(&pool).await?;
            Ok(Arc::new(PgSchedulingStore::new(pool)))
        }
        StorageBackend::Memory => {
            warn!("Using in-memory scheduling store, data is lost on restart");
            Ok(Arc::new(MemorySchedulingStore::new()))
        }
    }
}

async fn build_queue(config: &AppConfig) -> Arc<dyn NotificationQueue> {
    match config.redis_url.as_deref() {
        Some(redis_url) if config.is_redis_configured() => match RedisNotificationQueue::new(redis_url).await {
            Ok(queue) => Arc::new(queue),
            Err(e) => {
                warn!("Redis unavailable ({}), falling back to in-memory notification queue", e);
                Arc::new(MemoryNotificationQueue::default())
            }
        },
        _ => Arc::new(MemoryNotificationQueue::default()),
    }
}

fn build_transport(config: &AppConfig) -> anyhow::Result<Arc<dyn NotificationTransport>> {
    match config.notifier_webhook_url.as_deref() {
        Some(url) => {
            info!("Delivering notifications to webhook {}", url);
            Ok(Arc::new(WebhookTransport::new(url)?))
        }
        None => Ok(Arc::new(LogTransport)),
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
    }
    info!("Shutdown signal received");
}
