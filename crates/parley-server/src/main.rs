mod config;
mod shutdown;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{Json, Router, extract::State, response::IntoResponse, routing::get};
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use parley_api::actions;
use parley_api::messages;
use parley_api::state::{AppState, AppStateInner};
use parley_gateway::bridge::Bridge;
use parley_gateway::relay::Relay;
use parley_gateway::stream::{self, StreamState};

use crate::config::Config;

#[derive(Clone)]
struct HealthState {
    relay: Relay,
    bridge: Option<Bridge>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "parley=debug,tower_http=debug".into()),
        )
        .init();

    let config = Config::from_env()?;

    // Init database
    let db = parley_db::Database::open(&config.db_path)?;

    // Relay, bridge and shutdown live for the whole process
    let shutdown = CancellationToken::new();
    let relay = Relay::new(config.relay_capacity);
    info!(instance = %relay.instance_id(), capacity = config.relay_capacity, "Relay ready");

    let bridge = config
        .broker_url
        .as_ref()
        .map(|url| Bridge::new(relay.clone(), url.clone(), shutdown.clone()));
    let bridge_task = bridge.as_ref().map(Bridge::spawn);
    if bridge.is_none() {
        info!("PARLEY_BROKER_URL not set, running single-instance");
    }

    let app_state: AppState = Arc::new(AppStateInner {
        db,
        relay: relay.clone(),
        history_limit: config.history_limit,
    });
    let stream_state = StreamState {
        relay: relay.clone(),
        shutdown: shutdown.clone(),
        keepalive: config.keepalive,
    };
    let health_state = HealthState {
        relay: relay.clone(),
        bridge: bridge.clone(),
    };

    // Routes
    let chat_routes = Router::new()
        .route("/chat", get(messages::get_history).post(actions::post_chat))
        .with_state(app_state);

    let stream_routes = Router::new()
        .route("/chat/events", get(stream::chat_events))
        .with_state(stream_state);

    let health_routes = Router::new()
        .route("/health", get(health))
        .with_state(health_state);

    let app = Router::new()
        .merge(chat_routes)
        .merge(stream_routes)
        .merge(health_routes)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("Parley server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown::shutdown_signal(shutdown.clone()))
        .await?;

    shutdown.cancel();
    if let Some(task) = bridge_task {
        let _ = task.await;
    }

    info!("Parley server stopped");
    Ok(())
}

async fn health(State(state): State<HealthState>) -> impl IntoResponse {
    let bridge = match &state.bridge {
        None => "disabled",
        Some(bridge) if bridge.is_connected() => "connected",
        Some(_) => "disconnected",
    };

    Json(serde_json::json!({
        "status": "ok",
        "instance": state.relay.instance_id(),
        "subscribers": state.relay.subscriber_count(),
        "bridge": bridge,
    }))
}
