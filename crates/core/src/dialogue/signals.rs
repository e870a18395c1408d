//! Cheap, rule-based signals pulled from a user message.

use std::sync::LazyLock;

use regex::Regex;

static ALIAS_RE: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"(?i:call\s+(?:you|us)|your\s+name\s+is)\s+([A-Z][\w-]{1,20})\b").ok()
});

static SOURCES_RE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?i)source|cite|reference|evidence|how do you know").ok());

/// Belief keywords, matched as lower-case substrings.
pub const BELIEF_VOCABULARY: &[&str] = &[
    "god",
    "ancestor",
    "alien",
    "collective",
    "consciousness",
    "spirit",
    "psychological",
    "angel",
    "soul",
    "afterlife",
    "simulation",
    "universe",
    "multiverse",
];

/// Sensory themes: pattern over lower-cased text, and the label it records.
/// Every alternative is anchored at both ends so "start" or "human" stay quiet.
const MOTIF_TABLE: &[(&str, &str)] = &[
    (r"\b(?:gardens?|flowers?|bloom(?:s|ing|ed)?|petals?)\b", "garden"),
    (r"\b(?:seas?|oceans?|waves?|tides?|shores?)\b", "sea"),
    (r"\b(?:forests?|trees?|woods?)\b", "forest"),
    (r"\b(?:rain(?:s|y|ing)?|storms?|thunder)\b", "rain"),
    (r"\b(?:fire|flames?|embers?|candles?)\b", "fire"),
    (r"\b(?:stars?|starlight|constellations?|galax(?:y|ies)|night sky)\b", "stars"),
    (r"\b(?:music|songs?|melod(?:y|ies)|hum(?:s|ming)?)\b", "music"),
    (r"\b(?:light|glow(?:s|ing)?|shimmer(?:s|ing)?|dawn)\b", "light"),
];

static MOTIF_RES: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    MOTIF_TABLE
        .iter()
        .filter_map(|(pattern, label)| match Regex::new(pattern) {
            Ok(re) => Some((re, *label)),
            Err(e) => {
                tracing::error!(pattern, error = %e, "motif pattern rejected");
                None
            }
        })
        .collect()
});

const ROMANCE_ON: &[&str] = &["romance on", "be romantic", "flirt with me"];
const ROMANCE_OFF: &[&str] = &["romance off", "no romance", "stop flirting", "just friends"];

/// Name the user offers the persona: "call you X", "call us X", "your name is X".
pub fn extract_alias(text: &str) -> Option<String> {
    ALIAS_RE
        .as_ref()?
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_owned())
}

/// Vocabulary words present in `text`, in vocabulary order.
pub fn extract_beliefs(text: &str) -> Vec<String> {
    let lower = text.to_lowercase();
    BELIEF_VOCABULARY
        .iter()
        .filter(|word| lower.contains(*word))
        .map(|word| (*word).to_owned())
        .collect()
}

/// One label per matching theme, in table order.
pub fn extract_motifs(text: &str) -> Vec<String> {
    let lower = text.to_lowercase();
    MOTIF_RES
        .iter()
        .filter(|(re, _)| re.is_match(&lower))
        .map(|(_, label)| (*label).to_owned())
        .collect()
}

/// `Some(true)` on an opt-in phrase, `Some(false)` on an opt-out. Opt-out wins.
pub fn romance_signal(text: &str) -> Option<bool> {
    let lower = text.to_lowercase();
    if ROMANCE_OFF.iter().any(|p| lower.contains(p)) {
        Some(false)
    } else if ROMANCE_ON.iter().any(|p| lower.contains(p)) {
        Some(true)
    } else {
        None
    }
}

/// Whether the user is asking where something came from.
pub fn wants_sources(text: &str) -> bool {
    SOURCES_RE.as_ref().is_some_and(|re| re.is_match(text))
}

/// Append values not already present, then keep only the most recent `cap`.
pub fn merge_bounded(existing: &[String], incoming: &[String], cap: usize) -> Vec<String> {
    let mut merged = existing.to_vec();
    for value in incoming {
        if !merged.contains(value) {
            merged.push(value.clone());
        }
    }
    if merged.len() > cap {
        merged.drain(..merged.len() - cap);
    }
    merged
}
