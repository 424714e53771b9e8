//! linewatchd — the decision engine daemon.
//!
//! Boots the append-only stores, the locked SportConfigRegistry, and serves
//! the produced HTTP interfaces (§6: game_decisions, market_state_registry,
//! meta, health) over them. The orchestrator that actually fills the stores
//! (odds -> injuries -> simulation -> pipeline) is a library type in
//! `linewatch_core::orchestrator`; a deployment wires it with its own odds
//! provider, simulation worker, roster feed, results feed, and league stats
//! feed adapters (§6 "the HTTP client itself is out of core scope") and runs
//! it as a separate task or process against the same database file.

mod api;

pub use linewatch_core::publisher;

use anyhow::{Context, Result};
use axum::{routing::get, Router};
use linewatch_core::config::{init_tracing, load_env, Config};
use linewatch_core::middleware::{rate_limit::rate_limit_middleware, request_logging, RateLimitConfig, RateLimitLayer};
use linewatch_core::sport::SportConfigRegistry;
use linewatch_core::store::{self as store_mod, AuditStore, ContentStore, DecisionStore};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tracing::info;

/// Bundle the produced-interface handlers need: the read side of the
/// append-only stores plus the locked sport registry and build identity.
/// Cloning is cheap — every field is an `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub sport_registry: Arc<SportConfigRegistry>,
    pub content_store: Arc<ContentStore>,
    pub decision_store: Arc<DecisionStore>,
    pub audit_store: Arc<AuditStore>,
}

#[tokio::main]
async fn main() -> Result<()> {
    load_env();
    init_tracing();

    let config = Arc::new(Config::from_env());
    info!(
        engine_build_id = %config.engine_build_id,
        environment = %config.environment,
        database_path = %config.database_path,
        "starting linewatchd"
    );

    let conn = Arc::new(parking_lot::Mutex::new(
        store_mod::open(&config.database_path).context("failed to open linewatch database")?,
    ));

    let state = AppState {
        config: config.clone(),
        sport_registry: Arc::new(SportConfigRegistry::locked()),
        content_store: Arc::new(ContentStore::new(conn.clone())),
        decision_store: Arc::new(DecisionStore::new(conn.clone())),
        audit_store: Arc::new(AuditStore::new(conn.clone()).context("failed to bootstrap audit store")?),
    };

    let rate_limiter = RateLimitLayer::new(RateLimitConfig::default());

    let app = Router::new()
        .route("/healthz", get(api::get_healthz))
        .route("/meta", get(api::get_meta))
        .route("/api/v1/market_state_registry", get(api::get_market_state_registry))
        .route("/api/v1/games/:game_id/decisions", get(api::get_game_decisions))
        .with_state(state)
        .layer(axum::middleware::from_fn_with_state(rate_limiter, rate_limit_middleware))
        .layer(axum::middleware::from_fn(request_logging))
        .layer(CorsLayer::permissive());

    let listener = TcpListener::bind(("0.0.0.0", config.port))
        .await
        .with_context(|| format!("failed to bind port {}", config.port))?;
    info!(port = config.port, "linewatchd listening");

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .await
        .context("server exited")?;

    Ok(())
}
