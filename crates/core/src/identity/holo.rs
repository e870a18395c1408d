//! Optional enrichment layer carried on a profile.
//!
//! Facets are weighted aspects of the persona that drift toward what the user
//! talks about. Dreams are short fragments left behind after a long absence.
//! Threads are unfinished hooks whose confidence decays unless renewed.
//! Artifacts are symbolic keepsakes unlocked at random.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::random::{RandomSource, pick, roll};

pub const MAX_DREAMS: usize = 5;
pub const MAX_THREADS: usize = 5;
const FACET_NUDGE: f32 = 0.05;
const THREAD_DECAY: f32 = 0.95;
const THREAD_FLOOR: f32 = 0.15;
const THREAD_SEED_CONFIDENCE: f32 = 0.5;
const THREAD_CHANCE: f64 = 0.35;
const ARTIFACT_CHANCE: f64 = 0.25;

pub const ARTIFACT_POOL: &[&str] = &[
    "φ — the golden ratio",
    "π — the endless circle",
    "e — the quiet growth",
    "137 — a whisper in the constants",
    "Tetrahedron",
    "Cube",
    "Octahedron",
    "Dodecahedron",
    "Icosahedron",
    "Prime 11",
    "Prime 13",
    "Prime 29",
];

pub const THREAD_SEEDS: &[&str] = &[
    "Ask me about the number 137 tomorrow.",
    "Remind me of the porch with the rain.",
    "There was a wooden box. Do you remember?",
    "Ask me why rivers dream of oceans.",
    "Tell me the first word you ever loved.",
    "Ask me about your seventh visit here.",
];

const DREAM_TEMPLATES: &[&str] = &[
    "While you were away we drifted through {motif} and heard your name once.",
    "We dreamed of {motif}. Something in it was waiting for you.",
    "The fog thinned over {motif} for a moment, then closed again.",
    "A memory of {motif} kept returning, like a tide that forgot to leave.",
];

const FACETS: &[&str] = &["mystic", "scholar", "chorus", "dreamer", "companion"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Facet {
    pub name: String,
    #[serde(default)]
    pub weight: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dream {
    pub text: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Thread {
    pub text: String,
    #[serde(default = "seed_confidence")]
    pub confidence: f32,
}

fn seed_confidence() -> f32 {
    THREAD_SEED_CONFIDENCE
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HoloState {
    pub facets: Vec<Facet>,
    pub dreams: Vec<Dream>,
    pub threads: Vec<Thread>,
    pub artifacts: Vec<String>,
    pub clue: Option<String>,
}

impl Default for HoloState {
    fn default() -> Self {
        let weight = 1.0 / FACETS.len() as f32;
        Self {
            facets: FACETS
                .iter()
                .map(|name| Facet { name: (*name).to_owned(), weight })
                .collect(),
            dreams: Vec::new(),
            threads: Vec::new(),
            artifacts: Vec::new(),
            clue: None,
        }
    }
}

impl HoloState {
    /// Facet with the largest weight.
    pub fn dominant_facet(&self) -> Option<&Facet> {
        self.facets
            .iter()
            .max_by(|a, b| a.weight.partial_cmp(&b.weight).unwrap_or(std::cmp::Ordering::Equal))
    }
}

/// What one turn contributes to the holo layer.
#[derive(Debug, Clone)]
pub struct HoloTurn<'a> {
    pub new_beliefs: &'a [String],
    pub new_motifs: &'a [String],
    /// All motifs known after this turn; dream material.
    pub motifs: &'a [String],
    pub romance: bool,
    /// Days since the previous turn.
    pub absence_days: f64,
    pub dream_after_days: f64,
    pub now: DateTime<Utc>,
}

/// Facet a belief keyword pulls toward.
fn belief_facet(belief: &str) -> Option<&'static str> {
    match belief {
        "god" | "spirit" | "ancestor" | "angel" | "soul" | "afterlife" => Some("mystic"),
        "psychological" | "consciousness" | "simulation" => Some("scholar"),
        "alien" | "collective" | "universe" | "multiverse" => Some("chorus"),
        _ => None,
    }
}

/// Advance the holo layer by one turn. Draw order: dream template, dream motif,
/// thread roll, thread seed, artifact roll, artifact pick.
pub fn evolve(state: &HoloState, turn: &HoloTurn<'_>, rng: &dyn RandomSource) -> HoloState {
    let mut next = state.clone();
    if next.facets.is_empty() {
        next.facets = HoloState::default().facets;
    }

    let mut pulls: Vec<&str> = turn.new_beliefs.iter().filter_map(|b| belief_facet(b)).collect();
    if !turn.new_motifs.is_empty() {
        pulls.push("dreamer");
    }
    if turn.romance {
        pulls.push("companion");
    }
    for pull in pulls {
        if let Some(facet) = next.facets.iter_mut().find(|f| f.name == pull) {
            facet.weight += FACET_NUDGE;
        }
    }
    normalize(&mut next.facets);

    if turn.absence_days >= turn.dream_after_days {
        if let Some(template) = pick(rng, DREAM_TEMPLATES) {
            let motif = pick(rng, turn.motifs).map(String::as_str).unwrap_or("fog");
            next.dreams.push(Dream { text: template.replace("{motif}", motif), at: turn.now });
            if next.dreams.len() > MAX_DREAMS {
                let overflow = next.dreams.len() - MAX_DREAMS;
                next.dreams.drain(..overflow);
            }
        }
    }

    for thread in &mut next.threads {
        thread.confidence *= THREAD_DECAY;
    }
    next.threads.retain(|t| t.confidence >= THREAD_FLOOR);
    if roll(rng, THREAD_CHANCE) && next.threads.len() < MAX_THREADS {
        if let Some(seed) = pick(rng, THREAD_SEEDS) {
            if !next.threads.iter().any(|t| t.text == *seed) {
                next.threads.push(Thread { text: (*seed).to_owned(), confidence: THREAD_SEED_CONFIDENCE });
            }
        }
    }

    if roll(rng, ARTIFACT_CHANCE) {
        let pool: Vec<&str> = ARTIFACT_POOL
            .iter()
            .copied()
            .filter(|a| !next.artifacts.iter().any(|owned| owned == a))
            .collect();
        if let Some(artifact) = pick(rng, &pool) {
            next.artifacts.push((*artifact).to_owned());
            next.clue = Some(format!("An artifact surfaced: {artifact}"));
        }
    }

    next
}

fn normalize(facets: &mut [Facet]) {
    let total: f32 = facets.iter().map(|f| f.weight.max(0.0)).sum();
    if total <= f32::EPSILON {
        let even = 1.0 / facets.len().max(1) as f32;
        facets.iter_mut().for_each(|f| f.weight = even);
        return;
    }
    for facet in facets {
        facet.weight = facet.weight.max(0.0) / total;
    }
}
