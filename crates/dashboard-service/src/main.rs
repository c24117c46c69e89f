//! Item Dashboard Service
//!
//! Entry point. Wires configuration, the key resolver, the item store and
//! the identity client into the router, then serves until SIGINT/SIGTERM.

use dashboard_service::auth::{JwksClient, JwtValidator};
use dashboard_service::config::{Config, ItemStoreKind};
use dashboard_service::observability::metrics::init_metrics_recorder;
use dashboard_service::routes::{self, AppState};
use dashboard_service::services::{
    CognitoIdentityClient, IdentityClient, ItemStore, MemoryItemStore, RedisItemStore,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    info!("Starting Item Dashboard");

    let config = Config::from_env().map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    info!(
        bind_address = %config.bind_address,
        issuer = %config.token_issuer,
        jwks_url = %config.jwks_url,
        item_store = ?config.item_store,
        jwt_clock_skew_seconds = config.jwt_clock_skew_seconds,
        "Configuration loaded successfully"
    );

    let metrics_handle = init_metrics_recorder().map_err(|e| {
        error!("Failed to initialize metrics recorder: {}", e);
        e
    })?;

    let item_store: Arc<dyn ItemStore> = match config.item_store {
        ItemStoreKind::Memory => {
            warn!("Using in-memory item store, items are lost on restart");
            Arc::new(MemoryItemStore::new())
        }
        ItemStoreKind::Redis => {
            let redis_url = config
                .redis_url
                .as_ref()
                .ok_or("REDIS_URL is required when ITEM_STORE=redis")?;
            info!("Connecting to Redis...");
            let store = RedisItemStore::connect(redis_url).await?;
            info!("Redis connection established");
            Arc::new(store)
        }
    };

    let identity: Arc<dyn IdentityClient> = Arc::new(CognitoIdentityClient::new(
        config.identity_endpoint.clone(),
        config.client_id.clone(),
        config.client_secret.clone(),
    )?);

    let jwks_client = Arc::new(JwksClient::with_cache_policy(
        config.jwks_url.clone(),
        config.jwks_refresh_cooldown,
        config.jwks_max_age,
    ));

    // Warm the key set; a failure here is retried on the first request
    if let Err(e) = jwks_client.ensure_loaded().await {
        warn!(reason = e.reason(), "Initial key set fetch failed");
    }

    let jwt_validator = Arc::new(JwtValidator::new(
        jwks_client,
        config.token_issuer.clone(),
        config.jwt_clock_skew_seconds,
    ));

    let bind_address = config.bind_address.clone();

    let state = Arc::new(AppState {
        config,
        item_store,
        identity,
        jwt_validator,
    });

    let app = routes::build_routes(state, metrics_handle);

    let addr: SocketAddr = bind_address.parse().map_err(|e| {
        error!("Invalid bind address: {}", e);
        e
    })?;

    info!("Item Dashboard listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Item Dashboard shutdown complete");

    Ok(())
}

/// Fmt layer with `EnvFilter`; `LOG_FORMAT=json` switches to JSON lines.
fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "dashboard_service=debug,tower_http=debug".into());

    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// Listens for shutdown signals (SIGTERM, SIGINT).
/// Returns when a shutdown signal is received and the drain period is complete.
async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Received SIGINT, starting graceful shutdown..."),
            Err(e) => error!("Failed to listen for SIGINT: {}", e),
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received SIGTERM, starting graceful shutdown...");
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    let drain_secs: u64 = std::env::var("DRAIN_SECONDS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(0);

    if drain_secs > 0 {
        warn!("Draining connections for {} seconds...", drain_secs);
        tokio::time::sleep(Duration::from_secs(drain_secs)).await;
        info!("Drain period complete");
    }
}
