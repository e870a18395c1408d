use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use xyloh_llm::provider::{CompletionRequest, LlmError, LlmProvider};

use crate::cognition::persona::{self, Immersion, Mode, PromptFrame};
use crate::cognition::shaping::{self, CANONICAL_GREETING, ReplyConstraints};
use crate::config::XylohCfg;
use crate::dialogue::evolve::{EvolveRules, apply_turn};
use crate::dialogue::signals::wants_sources;
use crate::memory::history::{HistoryEntry, HistoryLog, TurnRole};
use crate::memory::profile_store::{ProfileOrigin, ProfileStore};
use crate::random::RandomSource;
use crate::sources::{SourceLookup, SourceRecord};
use crate::store::KvStore;

/// Shown when the model returns nothing usable.
pub const EMPTY_REPLY: &str = "(no reply)";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnRequest {
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub prompt: String,
    #[serde(default)]
    pub mode: Option<String>,
    /// "gentle" (default) or "grounded".
    #[serde(default)]
    pub immersion: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TurnReply {
    pub reply: String,
    pub stage: u8,
    pub progress: f64,
    pub alias: Option<String>,
    pub sources: Vec<SourceRecord>,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TurnError {
    #[error("{0}")]
    InvalidInput(String),
    #[error("{0}")]
    Generation(#[from] LlmError),
}

/// Runs one user turn end to end: profile evolution, history, generation,
/// shaping and optional citations.
pub struct TurnEngine {
    pub(crate) cfg: Arc<XylohCfg>,
    pub(crate) store: KvStore,
    history: HistoryLog,
    profiles: ProfileStore,
    llm: Arc<dyn LlmProvider>,
    sources: Arc<dyn SourceLookup>,
    pub(crate) rng: Arc<dyn RandomSource>,
}

impl TurnEngine {
    pub fn new(
        cfg: Arc<XylohCfg>,
        store: KvStore,
        llm: Arc<dyn LlmProvider>,
        sources: Arc<dyn SourceLookup>,
        rng: Arc<dyn RandomSource>,
    ) -> Self {
        let history = HistoryLog::new(store.clone(), cfg.history_cap);
        let profiles = ProfileStore::new(store.clone(), cfg.bounded_set_cap);
        Self { cfg, store, history, profiles, llm, sources, rng }
    }

    pub fn history(&self) -> &HistoryLog {
        &self.history
    }

    pub fn profiles(&self) -> &ProfileStore {
        &self.profiles
    }

    pub fn llm(&self) -> &Arc<dyn LlmProvider> {
        &self.llm
    }

    pub fn sources(&self) -> &Arc<dyn SourceLookup> {
        &self.sources
    }

    pub async fn handle(&self, req: TurnRequest) -> Result<TurnReply, TurnError> {
        self.handle_at(req, Utc::now()).await
    }

    pub async fn handle_at(&self, req: TurnRequest, now: DateTime<Utc>) -> Result<TurnReply, TurnError> {
        let user_id = req.user_id.trim();
        let prompt = req.prompt.trim();
        if user_id.is_empty() || prompt.is_empty() {
            return Err(TurnError::InvalidInput("Missing userId or prompt".into()));
        }
        let prompt = persona::clip_prompt(prompt, self.cfg.max_prompt_chars);
        let mode = Mode::parse(req.mode.as_deref());
        let immersion = Immersion::parse(req.immersion.as_deref());

        let loaded = self.profiles.load(user_id, now).await;
        // Only a store that answered "no record" earns the first-contact greeting.
        let turn_index = if loaded.is_first_contact() { 0 } else { loaded.profile.interactions.max(1) };
        if loaded.origin == ProfileOrigin::Unavailable {
            tracing::debug!(user_id, "profile store unavailable, chatting without memory");
        }
        let rules = EvolveRules::from(self.cfg.as_ref());
        let evolved = apply_turn(&loaded.profile, prompt, now, &rules, self.rng.as_ref());
        if !self.profiles.set_profile(user_id, &evolved).await {
            tracing::debug!(user_id, "profile not persisted this turn");
        }

        let context = self.history.recent(user_id, self.cfg.context_turns).await;
        self.history.append_at(user_id, TurnRole::User, prompt, now).await;

        let constraints = if mode.is_staged() {
            shaping::constraints_for(evolved.stage, turn_index)
        } else {
            ReplyConstraints::unconstrained()
        };

        let raw = match constraints.canonical {
            Some(greeting) => greeting.to_owned(),
            None => {
                let frame = PromptFrame {
                    mode,
                    immersion,
                    stage: evolved.stage,
                    constraints: &constraints,
                    opening: mode.is_staged()
                        && loaded.origin != ProfileOrigin::Unavailable
                        && !has_spoken(&context),
                    committee: false,
                };
                let system = persona::system_prompt(&frame, &evolved);
                match self.generate(persona::build_messages(system, &context, prompt)).await {
                    Ok(text) => text,
                    Err(e) => {
                        tracing::warn!(user_id, provider = self.llm.name(), error = %e, "generation failed");
                        self.history.append(user_id, TurnRole::Assistant, &format!("⚠️ {e}")).await;
                        return Err(TurnError::Generation(e));
                    }
                }
            }
        };

        let mut reply = shaping::enforce(&raw, &constraints);
        if reply.is_empty() {
            reply = EMPTY_REPLY.to_owned();
        }
        self.history.append(user_id, TurnRole::Assistant, &reply).await;

        let sources = if wants_sources(prompt) || mode.cites_by_default() {
            self.cite(prompt, mode).await
        } else {
            Vec::new()
        };

        tracing::info!(
            user_id,
            mode = mode.as_str(),
            stage = evolved.stage,
            turn = turn_index,
            sources = sources.len(),
            "turn handled"
        );

        Ok(TurnReply {
            reply,
            stage: evolved.stage,
            progress: evolved.progress,
            alias: evolved.alias,
            sources,
        })
    }

    pub(crate) async fn generate(&self, messages: Vec<xyloh_llm::provider::ChatMessage>) -> Result<String, LlmError> {
        let request = CompletionRequest {
            messages,
            max_tokens: self.cfg.max_tokens,
            temperature: self.cfg.temperature,
        };
        match tokio::time::timeout(self.cfg.llm_timeout(), self.llm.complete(request)).await {
            Ok(Ok(resp)) => Ok(resp.content.trim().to_owned()),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(LlmError::Timeout),
        }
    }

    pub(crate) async fn cite(&self, prompt: &str, mode: Mode) -> Vec<SourceRecord> {
        let lookup = self.sources.lookup(prompt, mode.source_persona());
        match tokio::time::timeout(self.cfg.sources_timeout(), lookup).await {
            Ok(records) => records,
            Err(_) => {
                tracing::warn!(mode = mode.as_str(), "source lookup timed out");
                Vec::new()
            }
        }
    }
}

/// Whether the persona has said anything beyond the first-contact greeting.
fn has_spoken(context: &[HistoryEntry]) -> bool {
    context
        .iter()
        .any(|e| e.role == TurnRole::Assistant && e.content != CANONICAL_GREETING)
}
