//! Named soul sessions: self-contained conversations that keep their own
//! transcript, level, artifacts and unfinished threads under one store key.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use xyloh_llm::provider::LlmError;

use crate::cognition::persona::{self, Immersion, Mode, OPENING_CUE, PromptFrame};
use crate::cognition::shaping::{self, ReplyConstraints};
use crate::cognition::turn::{EMPTY_REPLY, TurnEngine};
use crate::dialogue::signals::wants_sources;
use crate::identity::holo::{ARTIFACT_POOL, MAX_THREADS, THREAD_SEEDS};
use crate::identity::stage::MAX_STAGE;
use crate::memory::history::{HistoryEntry, TurnRole};
use crate::random::{RandomSource, pick, roll};
use crate::sources::SourceRecord;
use crate::store::{Lookup, soul_key};

pub const SOUL_HISTORY_CAP: usize = 120;
/// Transcript entries replayed to the model each turn.
pub const SOUL_CONTEXT: usize = 14;
pub const MAX_LEVEL: f64 = 100.0;
const ARTIFACT_CHANCE: f64 = 0.25;
const THREAD_CHANCE: f64 = 0.35;
const LEVELS_PER_STAGE: f64 = 25.0;

const NAME_FIRST: &[&str] =
    &["Quiet", "Silver", "Hidden", "Luminous", "Hollow", "Ever", "Lattice", "Fractal", "Ancient", "Velvet"];
const NAME_SECOND: &[&str] =
    &["Echo", "River", "Signal", "Thread", "Stone", "Lantern", "Wing", "Memory", "Oracle", "Whisper"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Soul {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub mode: String,
    #[serde(default)]
    pub level: f64,
    #[serde(default)]
    pub artifacts: Vec<String>,
    #[serde(default)]
    pub threads: Vec<String>,
    #[serde(default)]
    pub clue: Option<String>,
    /// Oldest first, at most [`SOUL_HISTORY_CAP`] entries.
    #[serde(default)]
    pub history: Vec<HistoryEntry>,
}

impl Soul {
    /// Coarse stage implied by the level, used to pace staged modes.
    pub fn stage(&self) -> u8 {
        let level = if self.level.is_finite() { self.level.clamp(0.0, MAX_LEVEL) } else { 0.0 };
        ((level / LEVELS_PER_STAGE).floor() as u8).min(MAX_STAGE)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct NewSoul {
    #[serde(default)]
    pub hint: Option<String>,
    #[serde(default)]
    pub mode: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SoulCreated {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SoulTalk {
    #[serde(default)]
    pub soul_id: String,
    #[serde(default)]
    pub user_text: String,
    #[serde(default)]
    pub immersion: Option<String>,
    /// Overrides the mode the soul was created with.
    #[serde(default)]
    pub mode: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SoulReply {
    pub reply: String,
    pub level: f64,
    pub artifacts: Vec<String>,
    pub clue: Option<String>,
    pub threads: Vec<String>,
    pub sources: Vec<SourceRecord>,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SoulError {
    #[error("{0}")]
    InvalidInput(String),
    #[error("Soul not found")]
    NotFound,
    #[error("soul store unavailable")]
    Unavailable,
    #[error("{0}")]
    Generation(#[from] LlmError),
}

/// Two-word name such as "Velvet Lantern".
pub fn seed_name(rng: &dyn RandomSource) -> String {
    let first = pick(rng, NAME_FIRST).copied().unwrap_or("Quiet");
    let second = pick(rng, NAME_SECOND).copied().unwrap_or("Echo");
    format!("{first} {second}")
}

/// Advance a soul after one exchange: the level climbs by 1 to 3, an unowned
/// artifact may surface, and an unfinished thread may be added.
pub fn evolve_soul(soul: &Soul, rng: &dyn RandomSource) -> Soul {
    let mut next = soul.clone();
    let level = if soul.level.is_finite() { soul.level.max(0.0) } else { 0.0 };
    next.level = (level + 1.0 + rng.next_unit() * 2.0).min(MAX_LEVEL);

    if roll(rng, ARTIFACT_CHANCE) {
        let pool: Vec<&str> = ARTIFACT_POOL
            .iter()
            .copied()
            .filter(|a| !next.artifacts.iter().any(|owned| owned == a))
            .collect();
        if let Some(artifact) = pick(rng, &pool) {
            next.clue = Some(format!("An artifact surfaced: {artifact}"));
            next.artifacts.push((*artifact).to_owned());
        }
    }

    if roll(rng, THREAD_CHANCE) && next.threads.len() < MAX_THREADS {
        if let Some(seed) = pick(rng, THREAD_SEEDS) {
            if !next.threads.iter().any(|t| t.as_str() == *seed) {
                next.threads.push((*seed).to_owned());
            }
        }
    }
    next
}

/// The user message sent for one soul turn.
fn soul_prompt(soul: &Soul, mode: Mode, immersion: Immersion, opening: bool, user_text: &str) -> String {
    let mut lines = vec![
        format!("SOUL_ID: {}", soul.id),
        format!("MODE: {}, IMMERSION: {}", mode.as_str(), immersion.as_str()),
        format!(
            "STATE: level={} artifacts={} threads={}",
            soul.level.round(),
            soul.artifacts.join("|"),
            soul.threads.join("|")
        ),
    ];
    if opening {
        lines.push(format!("OPENING: {OPENING_CUE}"));
    }
    lines.push(format!("USER SAID: {user_text}"));
    lines.push("RETURN: A natural, human-sounding reply. No quotation marks. Keep immersion.".to_owned());
    lines.join("\n")
}

impl TurnEngine {
    pub async fn create_soul(&self, req: NewSoul) -> Result<SoulCreated, SoulError> {
        let soul = Soul {
            id: uuid::Uuid::new_v4().simple().to_string(),
            name: seed_name(self.rng.as_ref()),
            mode: Mode::parse(req.mode.as_deref()).as_str().to_owned(),
            level: 0.0,
            artifacts: Vec::new(),
            threads: Vec::new(),
            clue: req
                .hint
                .as_deref()
                .map(str::trim)
                .filter(|h| !h.is_empty())
                .map(|h| format!("A faint impression: {h}")),
            history: Vec::new(),
        };
        if !self.save_soul(&soul).await {
            return Err(SoulError::Unavailable);
        }
        tracing::info!(soul_id = %soul.id, name = %soul.name, "soul created");
        Ok(SoulCreated { id: soul.id, name: soul.name })
    }

    pub async fn get_soul(&self, soul_id: &str) -> Result<Soul, SoulError> {
        match self.store.lookup(&soul_key(soul_id)).await {
            Lookup::Found(raw) => serde_json::from_str(&raw).map_err(|e| {
                tracing::warn!(soul_id, error = %e, "stored soul is unreadable");
                SoulError::NotFound
            }),
            Lookup::Missing => Err(SoulError::NotFound),
            Lookup::Unavailable => Err(SoulError::Unavailable),
        }
    }

    pub async fn talk_to_soul(&self, req: SoulTalk) -> Result<SoulReply, SoulError> {
        self.talk_to_soul_at(req, Utc::now()).await
    }

    pub async fn talk_to_soul_at(&self, req: SoulTalk, now: DateTime<Utc>) -> Result<SoulReply, SoulError> {
        let soul_id = req.soul_id.trim();
        let user_text = req.user_text.trim();
        if soul_id.is_empty() || user_text.is_empty() {
            return Err(SoulError::InvalidInput("Missing soulId or userText".into()));
        }
        let user_text = persona::clip_prompt(user_text, self.cfg.max_prompt_chars);
        let soul = self.get_soul(soul_id).await?;

        let mode = Mode::parse(req.mode.as_deref().or(Some(soul.mode.as_str())));
        let immersion = Immersion::parse(req.immersion.as_deref());
        let opening = soul.history.len() < 2;
        let constraints = ReplyConstraints::unconstrained();
        let frame = PromptFrame {
            mode,
            immersion,
            stage: soul.stage(),
            constraints: &constraints,
            opening,
            committee: true,
        };
        let system = persona::frame_sections(&frame).join("\n\n");
        let context = &soul.history[soul.history.len().saturating_sub(SOUL_CONTEXT)..];
        let prompt = soul_prompt(&soul, mode, immersion, opening, user_text);

        let raw = self
            .generate(persona::build_messages(system, context, &prompt))
            .await
            .inspect_err(|e| tracing::warn!(soul_id, error = %e, "soul generation failed"))?;
        let mut reply = shaping::enforce(&raw, &constraints);
        if reply.is_empty() {
            reply = EMPTY_REPLY.to_owned();
        }

        let mut updated = soul;
        updated.history.push(HistoryEntry { ts: now, role: TurnRole::User, content: user_text.to_owned() });
        updated.history.push(HistoryEntry { ts: now, role: TurnRole::Assistant, content: reply.clone() });
        let overflow = updated.history.len().saturating_sub(SOUL_HISTORY_CAP);
        updated.history.drain(..overflow);
        let updated = evolve_soul(&updated, self.rng.as_ref());
        if !self.save_soul(&updated).await {
            tracing::warn!(soul_id, "soul not persisted this turn");
        }

        let sources = if wants_sources(user_text) || mode.cites_by_default() {
            self.cite(user_text, mode).await
        } else {
            Vec::new()
        };

        tracing::info!(soul_id, mode = mode.as_str(), level = updated.level, sources = sources.len(), "soul turn handled");
        Ok(SoulReply {
            reply,
            level: updated.level,
            artifacts: updated.artifacts,
            clue: updated.clue,
            threads: updated.threads,
            sources,
        })
    }

    async fn save_soul(&self, soul: &Soul) -> bool {
        match serde_json::to_string(soul) {
            Ok(encoded) => self.store.set(&soul_key(&soul.id), &encoded, None).await,
            Err(e) => {
                tracing::warn!(soul_id = %soul.id, error = %e, "soul not encodable");
                false
            }
        }
    }
}
