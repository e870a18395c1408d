//! Readiness report with optional live checks of the store and the model.

use std::time::Duration;

use axum::Json;
use axum::extract::{Query, State};
use serde::{Deserialize, Serialize};
use xyloh_llm::http::DEFAULT_MODEL;
use xyloh_llm::provider::{ChatMessage, CompletionRequest};

use crate::routes::AppState;

const CHECK_TTL: Duration = Duration::from_secs(15);

#[derive(Debug, Default, Deserialize)]
pub struct HealthQuery {
    deep: Option<String>,
}

#[derive(Debug, Default, Serialize, PartialEq)]
pub struct KvCheck {
    pub reachable: bool,
    pub read: bool,
    pub wrote: bool,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct LlmCheck {
    pub reachable: bool,
    pub model: String,
}

#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SourceKeys {
    pub guardian_key: bool,
    pub nyt_key: bool,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct HealthReport {
    /// A model is configured, so turns can be answered.
    pub ok: bool,
    /// The key-value store is configured.
    pub kv_configured: bool,
    pub sources: SourceKeys,
    pub deep: bool,
    pub kv: KvCheck,
    pub llm: LlmCheck,
    pub version: &'static str,
}

pub async fn health(State(state): State<AppState>, Query(q): Query<HealthQuery>) -> Json<HealthReport> {
    let deep = q.deep.as_deref() == Some("1");
    let mut report = HealthReport {
        ok: state.model.is_some(),
        kv_configured: state.store.is_configured(),
        sources: SourceKeys {
            guardian_key: state.cfg.source_keys.contains_key("GUARDIAN_API_KEY"),
            nyt_key: state.cfg.source_keys.contains_key("NYT_API_KEY"),
        },
        deep,
        kv: KvCheck::default(),
        llm: LlmCheck {
            reachable: false,
            model: state.model.clone().unwrap_or_else(|| DEFAULT_MODEL.to_owned()),
        },
        version: env!("CARGO_PKG_VERSION"),
    };

    if deep {
        if report.kv_configured {
            report.kv = check_kv(&state).await;
        }
        if report.ok {
            report.llm.reachable = check_llm(&state).await;
        }
        tracing::info!(kv = report.kv.reachable, llm = report.llm.reachable, "deep health check");
    }
    Json(report)
}

/// Write then read a short-lived key.
async fn check_kv(state: &AppState) -> KvCheck {
    let key = format!("health:check:{}", uuid::Uuid::new_v4());
    let value = serde_json::json!({ "ok": true, "ts": chrono::Utc::now().timestamp_millis() }).to_string();
    let wrote = state.store.set(&key, &value, Some(CHECK_TTL)).await;
    let read = state.store.get(&key).await.is_some();
    KvCheck { reachable: wrote || read, read, wrote }
}

/// Two-token completion; any answer counts as reachable.
async fn check_llm(state: &AppState) -> bool {
    let request = CompletionRequest {
        messages: vec![
            ChatMessage::system("You are a health-check. Reply with \"ok\"."),
            ChatMessage::user("ping"),
        ],
        max_tokens: 2,
        temperature: 0.0,
    };
    let llm = state.engine.llm();
    match tokio::time::timeout(state.cfg.llm_timeout(), llm.complete(request)).await {
        Ok(Ok(_)) => true,
        Ok(Err(e)) => {
            tracing::warn!(provider = llm.name(), error = %e, "model check failed");
            false
        }
        Err(_) => {
            tracing::warn!(provider = llm.name(), "model check timed out");
            false
        }
    }
}
