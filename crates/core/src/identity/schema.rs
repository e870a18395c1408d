//! Stored profile record and its migration to the current [`Profile`].
//!
//! Records are read field by field from a JSON object. A field that is missing,
//! null or of the wrong shape falls back to its own default and never costs the
//! rest of the record. Version 1 records predate `version`, `boundaries` and
//! `holo`, and named the belief list `beliefs`.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::identity::holo::{Dream, Facet, HoloState, Thread};
use crate::identity::profile::{Boundaries, PROFILE_SCHEMA_VERSION, Profile};
use crate::identity::stage::{MAX_PROGRESS, compute_stage};

type Fields = Map<String, Value>;

/// Decode a stored profile. `None` only when the text is not a JSON object.
pub fn decode_profile(raw: &str, now: DateTime<Utc>, set_cap: usize) -> Option<Profile> {
    let fields = match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(fields)) => fields,
        Ok(other) => {
            tracing::debug!(kind = json_kind(&other), "stored profile is not an object");
            return None;
        }
        Err(e) => {
            tracing::debug!(error = %e, "stored profile unreadable");
            return None;
        }
    };
    let version = field::<u32>(&fields, "version").unwrap_or(1);
    if version > PROFILE_SCHEMA_VERSION {
        tracing::debug!(version, "stored profile is newer than this build; reading known fields");
    }
    Some(migrate(&fields, now, set_cap))
}

fn migrate(fields: &Fields, now: DateTime<Utc>, set_cap: usize) -> Profile {
    let first_seen = millis(fields, "firstSeen").unwrap_or(now);
    let last_seen = millis(fields, "lastSeen").unwrap_or(first_seen);
    let progress = field::<f64>(fields, "progress")
        .filter(|p| p.is_finite())
        .map(|p| p.clamp(0.0, MAX_PROGRESS))
        .unwrap_or(0.0);

    // legacy `beliefs` first so current notes count as the newer entries
    let mut beliefs = string_list(fields, "beliefs").unwrap_or_default();
    beliefs.extend(string_list(fields, "beliefNotes").unwrap_or_default());

    let boundaries = match fields.get("boundaries") {
        Some(Value::Object(b)) => {
            let defaults = Boundaries::default();
            Boundaries {
                topics: string_list(b, "topics").unwrap_or(defaults.topics),
                safe_words: string_list(b, "safeWords").unwrap_or(defaults.safe_words),
            }
        }
        _ => Boundaries::default(),
    };

    let mut profile = Profile {
        version: PROFILE_SCHEMA_VERSION,
        first_seen,
        last_seen,
        progress,
        interactions: field::<u64>(fields, "interactions").unwrap_or(0),
        stage: 0,
        alias: field::<String>(fields, "alias")
            .map(|a| a.trim().to_owned())
            .filter(|a| !a.is_empty()),
        romance: field::<bool>(fields, "romance").unwrap_or(false),
        belief_notes: tidy_set(beliefs, set_cap),
        motifs: tidy_set(string_list(fields, "motifs").unwrap_or_default(), set_cap),
        boundaries,
        holo: fields.get("holo").and_then(decode_holo),
    };
    profile.stage = compute_stage(&profile, now);
    profile
}

/// Holo layer, element by element. Unreadable entries are dropped.
fn decode_holo(value: &Value) -> Option<HoloState> {
    let Value::Object(fields) = value else {
        return None;
    };
    let mut holo = HoloState::default();
    let facets: Vec<Facet> = elements(fields, "facets");
    if !facets.is_empty() {
        holo.facets = facets;
    }
    holo.dreams = elements::<Dream>(fields, "dreams");
    holo.threads = elements::<Thread>(fields, "threads");
    holo.artifacts = string_list(fields, "artifacts").unwrap_or_default();
    holo.clue = field::<String>(fields, "clue").filter(|c| !c.is_empty());
    Some(holo)
}

/// One typed field; `None` when absent, null or mistyped.
fn field<T: DeserializeOwned>(fields: &Fields, key: &str) -> Option<T> {
    let value = fields.get(key).filter(|v| !v.is_null())?;
    match T::deserialize(value) {
        Ok(v) => Some(v),
        Err(e) => {
            tracing::debug!(key, error = %e, "stored profile field ignored");
            None
        }
    }
}

/// Epoch milliseconds, accepting integer or float encodings.
fn millis(fields: &Fields, key: &str) -> Option<DateTime<Utc>> {
    let value = fields.get(key)?;
    let ms = value.as_i64().or_else(|| value.as_f64().filter(|f| f.is_finite()).map(|f| f as i64))?;
    DateTime::from_timestamp_millis(ms)
}

/// String entries of an array field. Non-string entries are skipped.
fn string_list(fields: &Fields, key: &str) -> Option<Vec<String>> {
    match fields.get(key)? {
        Value::Array(items) => Some(items.iter().filter_map(Value::as_str).map(str::to_owned).collect()),
        _ => None,
    }
}

/// Every entry of an array field that decodes as `T`.
fn elements<T: DeserializeOwned>(fields: &Fields, key: &str) -> Vec<T> {
    match fields.get(key) {
        Some(Value::Array(items)) => items.iter().filter_map(|item| T::deserialize(item).ok()).collect(),
        _ => Vec::new(),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Drop blanks and repeats, keep the most recent `cap`.
fn tidy_set(items: Vec<String>, cap: usize) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(items.len());
    for item in items {
        let item = item.trim().to_owned();
        if !item.is_empty() && !out.contains(&item) {
            out.push(item);
        }
    }
    if out.len() > cap {
        out.drain(..out.len() - cap);
    }
    out
}
