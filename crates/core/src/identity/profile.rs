use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::identity::holo::HoloState;

/// Current on-store profile schema version.
pub const PROFILE_SCHEMA_VERSION: u32 = 2;

/// Topics the user has placed off limits, and words that pause the persona.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Boundaries {
    pub topics: Vec<String>,
    pub safe_words: Vec<String>,
}

impl Default for Boundaries {
    fn default() -> Self {
        Self { topics: Vec::new(), safe_words: vec!["pause".to_owned()] }
    }
}

/// Per-user relationship state.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub version: u32,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub first_seen: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub last_seen: DateTime<Utc>,
    /// In `[0, 3]`, never decreases.
    pub progress: f64,
    pub interactions: u64,
    /// Derived from `progress` and elapsed time; stored for observability only.
    pub stage: u8,
    /// Name the user lent the persona. First offer sticks.
    pub alias: Option<String>,
    pub romance: bool,
    pub belief_notes: Vec<String>,
    pub motifs: Vec<String>,
    pub boundaries: Boundaries,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub holo: Option<HoloState>,
}

impl Profile {
    /// A fresh profile for someone first met at `now`.
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            version: PROFILE_SCHEMA_VERSION,
            first_seen: now,
            last_seen: now,
            progress: 0.0,
            interactions: 0,
            stage: 0,
            alias: None,
            romance: false,
            belief_notes: Vec::new(),
            motifs: Vec::new(),
            boundaries: Boundaries::default(),
            holo: None,
        }
    }

    /// Apply an explicit client edit, returning the edited copy.
    pub fn with_update(&self, update: &ProfileUpdate) -> Self {
        let mut next = self.clone();
        if let Some(alias) = &update.alias {
            next.alias = alias
                .as_deref()
                .map(str::trim)
                .filter(|a| !a.is_empty())
                .map(str::to_owned);
        }
        if let Some(romance) = update.romance {
            next.romance = romance;
        }
        if let Some(boundaries) = &update.boundaries {
            next.boundaries = boundaries.clone();
        }
        next
    }
}

/// Fields a client may edit directly. `alias: null` clears the alias.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    #[serde(default, deserialize_with = "present_or_null")]
    pub alias: Option<Option<String>>,
    #[serde(default)]
    pub romance: Option<bool>,
    #[serde(default)]
    pub boundaries: Option<Boundaries>,
}

impl ProfileUpdate {
    pub fn is_empty(&self) -> bool {
        self.alias.is_none() && self.romance.is_none() && self.boundaries.is_none()
    }
}

/// Distinguish a missing field (`None`) from an explicit `null` (`Some(None)`).
fn present_or_null<'de, D>(deserializer: D) -> Result<Option<Option<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(Some)
}
