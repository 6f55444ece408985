//! Notification Prioritization Core — HTTP service entry point.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use notify_engine::ai::{HttpAiClient, MockAiClient};
use notify_engine::api::{build_router, AppState};
use notify_engine::audit_sink::TracingAuditSink;
use notify_engine::clock::{Clock, SystemClock};
use notify_engine::config::{init_tracing, load_env, Config};
use notify_engine::dispatch::TracingDispatch;
use notify_engine::kv::{KvStore, MemoryKv};
use notify_engine::middleware::logging::request_logging_simple;
use notify_engine::rules::{spawn_reload_task, FileRulesStore, RulesMatcher, RulesStore};
use notify_engine::Orchestrator;

#[tokio::main]
async fn main() -> Result<()> {
    load_env();
    init_tracing();

    let config = Config::parse();
    info!("Notification Prioritization Core starting up");

    let kv: Arc<dyn KvStore> = Arc::new(MemoryKv::new());
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let rules_store: Arc<dyn RulesStore> = Arc::new(FileRulesStore::new(config.rules_path.clone()));
    let rules_matcher = Arc::new(RulesMatcher::new());
    rules_matcher.reload(rules_store.as_ref()).await;
    spawn_reload_task(
        rules_matcher.clone(),
        rules_store,
        config.rules_reload_interval(),
    );

    let ai_client: Arc<dyn notify_engine::ai::AiClient> = match &config.ai_endpoint {
        Some(endpoint) => {
            info!(endpoint, "AI enrichment client configured against HTTP endpoint");
            Arc::new(HttpAiClient::new(endpoint.clone()).context("building AI HTTP client")?)
        }
        None => {
            info!("no NOTIFY_AI_ENDPOINT set, using deterministic mock AI enrichment");
            Arc::new(MockAiClient)
        }
    };

    let orchestrator = Arc::new(Orchestrator::new(
        kv,
        clock,
        rules_matcher,
        config.dnd_gate(),
        config.fatigue_caps(),
        ai_client,
        Arc::new(TracingAuditSink),
        Arc::new(TracingDispatch),
    ));

    let app = build_router(AppState { orchestrator })
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .layer(axum::middleware::from_fn(request_logging_simple));

    let listener = TcpListener::bind(&config.listen_addr)
        .await
        .with_context(|| format!("binding to {}", config.listen_addr))?;
    info!(addr = %config.listen_addr, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutdown signal received");
}
