mod health;
mod routes;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};
use xyloh_core::cognition::TurnEngine;
use xyloh_core::config::XylohCfg;
use xyloh_core::random::SeededRandom;
use xyloh_core::sources::RestSources;
use xyloh_core::store::KvStore;
use xyloh_llm::provider::{DisabledProvider, LlmProvider};

const DEFAULT_BIND: &str = "127.0.0.1:3000";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let cfg = Arc::new(XylohCfg::from_env());
    let store = KvStore::from_cfg(&cfg.store);
    if !store.is_configured() {
        tracing::warn!("key-value store not configured, nothing will persist");
    }

    let (llm, model): (Arc<dyn LlmProvider>, Option<String>) = match xyloh_llm::http::from_env(cfg.llm_timeout()) {
        Some(p) => {
            let model = p.model().to_owned();
            (Arc::new(p), Some(model))
        }
        None => {
            tracing::warn!("no model credential set, replies will fail");
            (Arc::new(DisabledProvider), None)
        }
    };

    let sources = RestSources::from_cfg(&cfg);
    tracing::info!(keys = sources.configured_keys(), "source lookup ready");

    let engine = TurnEngine::new(
        cfg.clone(),
        store.clone(),
        llm,
        Arc::new(sources),
        Arc::new(SeededRandom::from_entropy()),
    );
    let state = routes::AppState { cfg, engine: Arc::new(engine), store, model };

    let bind = std::env::var("XYLOH_BIND").unwrap_or_else(|_| DEFAULT_BIND.to_owned());
    let addr: SocketAddr = bind.parse().with_context(|| format!("invalid XYLOH_BIND: {bind}"))?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!(%addr, "listening");

    let token = CancellationToken::new();
    spawn_sigint_canceler(token.clone());

    axum::serve(listener, routes::router(state))
        .with_graceful_shutdown(async move { token.cancelled().await })
        .await?;
    tracing::info!("shut down");
    Ok(())
}

/// `RUST_LOG` filters; `XYLOH_LOG_JSON=1` switches to JSON lines.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,xyloh_core=debug"));
    let json = std::env::var("XYLOH_LOG_JSON").is_ok_and(|v| v == "1");
    let (json_layer, plain_layer) = if json {
        (Some(fmt::layer().json().with_target(true)), None)
    } else {
        (None, Some(fmt::layer().with_target(true)))
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(json_layer)
        .with(plain_layer)
        .init();
}

fn spawn_sigint_canceler(token: CancellationToken) {
    tokio::spawn(async move {
        #[cfg(unix)]
        {
            if let Ok(mut sigint) =
                tokio::signal::unix::signal(tokio::signal::unix::SignalKind::interrupt())
            {
                let _ = sigint.recv().await;
                token.cancel();
            }
        }
        #[cfg(not(unix))]
        {
            if tokio::signal::ctrl_c().await.is_ok() {
                token.cancel();
            }
        }
    });
}
