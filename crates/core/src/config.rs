use std::collections::HashMap;
use std::time::Duration;

/// Which backend the store adapter talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    /// Upstash-style REST endpoint (`KV_REST_API_URL` + token).
    Rest,
    /// In-process map. Nothing survives a restart.
    Memory,
}

/// Remote key-value store settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreCfg {
    pub kind: StoreKind,
    pub url: Option<String>,
    pub token: Option<String>,
    pub timeout_ms: u64,
}

impl StoreCfg {
    /// A REST store counts as configured only with both endpoint and credential.
    pub fn is_configured(&self) -> bool {
        match self.kind {
            StoreKind::Memory => true,
            StoreKind::Rest => {
                self.url.as_deref().is_some_and(|u| !u.is_empty())
                    && self.token.as_deref().is_some_and(|t| !t.is_empty())
            }
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for StoreCfg {
    fn default() -> Self {
        Self { kind: StoreKind::Rest, url: None, token: None, timeout_ms: 5000 }
    }
}

/// All companion parameters. Built once at process start and passed down.
#[derive(Debug, Clone)]
pub struct XylohCfg {
    pub store: StoreCfg,

    // persistence bounds
    pub history_cap: usize,
    pub bounded_set_cap: usize,

    // stage engine
    pub progress_step: f64,

    // prompt assembly
    pub context_turns: usize,
    pub max_prompt_chars: usize,

    // model call
    pub llm_timeout_secs: u64,
    pub temperature: f32,
    pub max_tokens: u32,

    // holo sub-state
    pub holo_enabled: bool,
    pub dream_absence_days: i64,

    // content sources
    pub sources_timeout_secs: u64,
    pub source_keys: HashMap<String, String>,
}

/// Environment variables holding content-source API keys.
pub const SOURCE_KEY_VARS: &[&str] = &[
    "GUARDIAN_API_KEY",
    "NYT_API_KEY",
    "CONGRESS_API_KEY",
    "GOVINFO_API_KEY",
    "FRED_API_KEY",
    "NASA_API_KEY",
    "NPS_API_KEY",
    "OPENWEATHER_API_KEY",
];

impl Default for XylohCfg {
    fn default() -> Self {
        Self {
            store: StoreCfg::default(),
            history_cap: 200,
            bounded_set_cap: 12,
            progress_step: 0.03,
            context_turns: 14,
            max_prompt_chars: 4000,
            llm_timeout_secs: 25,
            temperature: 0.8,
            max_tokens: 500,
            holo_enabled: false,
            dream_absence_days: 3,
            sources_timeout_secs: 8,
            source_keys: HashMap::new(),
        }
    }
}

impl XylohCfg {
    /// Read configuration from the process environment.
    pub fn from_env() -> Self {
        let map: HashMap<String, String> = std::env::vars().collect();
        Self::from_map(&map)
    }

    /// Build from an explicit variable map. Unknown or unparseable values fall back to defaults.
    pub fn from_map(m: &HashMap<String, String>) -> Self {
        let d = Self::default();
        let store = StoreCfg {
            kind: match non_empty(m, "XYLOH_STORE").map(|s| s.to_ascii_lowercase()).as_deref() {
                Some("memory") => StoreKind::Memory,
                _ => StoreKind::Rest,
            },
            url: non_empty(m, "KV_REST_API_URL")
                .or_else(|| non_empty(m, "UPSTASH_REDIS_REST_URL"))
                .map(|u| u.trim_end_matches('/').to_owned()),
            token: non_empty(m, "KV_REST_API_TOKEN")
                .or_else(|| non_empty(m, "UPSTASH_REDIS_REST_TOKEN"))
                .map(str::to_owned),
            timeout_ms: get_or(m, "XYLOH_STORE_TIMEOUT_MS", d.store.timeout_ms),
        };
        let source_keys = SOURCE_KEY_VARS
            .iter()
            .filter_map(|k| non_empty(m, k).map(|v| ((*k).to_owned(), v.to_owned())))
            .collect();

        Self {
            store,
            history_cap: get_or(m, "XYLOH_HISTORY_CAP", d.history_cap).max(1),
            bounded_set_cap: get_or(m, "XYLOH_SET_CAP", d.bounded_set_cap).max(1),
            progress_step: get_or(m, "XYLOH_PROGRESS_STEP", d.progress_step),
            context_turns: get_or(m, "XYLOH_CONTEXT_TURNS", d.context_turns),
            max_prompt_chars: get_or(m, "XYLOH_MAX_PROMPT_CHARS", d.max_prompt_chars),
            llm_timeout_secs: get_or(m, "XYLOH_LLM_TIMEOUT_SECS", d.llm_timeout_secs),
            temperature: get_or(m, "XYLOH_TEMPERATURE", d.temperature),
            max_tokens: get_or(m, "XYLOH_MAX_TOKENS", d.max_tokens),
            holo_enabled: flag(m, "XYLOH_HOLO").unwrap_or(d.holo_enabled),
            dream_absence_days: get_or(m, "XYLOH_DREAM_ABSENCE_DAYS", d.dream_absence_days),
            sources_timeout_secs: get_or(m, "XYLOH_SOURCES_TIMEOUT_SECS", d.sources_timeout_secs),
            source_keys,
        }
    }

    pub fn llm_timeout(&self) -> Duration {
        Duration::from_secs(self.llm_timeout_secs)
    }

    pub fn sources_timeout(&self) -> Duration {
        Duration::from_secs(self.sources_timeout_secs)
    }
}

fn non_empty<'a>(map: &'a HashMap<String, String>, key: &str) -> Option<&'a str> {
    map.get(key).map(|v| v.trim()).filter(|v| !v.is_empty())
}

fn flag(map: &HashMap<String, String>, key: &str) -> Option<bool> {
    non_empty(map, key).map(|v| v == "1" || v.eq_ignore_ascii_case("true") || v.eq_ignore_ascii_case("on"))
}

fn get_or<T: std::str::FromStr>(map: &HashMap<String, String>, key: &str, default: T) -> T {
    map.get(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}
