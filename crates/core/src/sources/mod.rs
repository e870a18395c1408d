//! External content lookups attached to replies as citations.

pub mod catalog;
pub mod normalize;

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::XylohCfg;
use catalog::{SourcePack, build_url};

/// Most records returned by one lookup.
pub const MAX_SOURCES: usize = 8;
/// Topic text sent to sources is clipped to this many characters.
pub const MAX_TOPIC_CHARS: usize = 240;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRecord {
    pub title: String,
    pub url: String,
    pub domain: String,
}

/// A headline from the news search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewsItem {
    pub title: String,
    pub url: String,
    pub source: String,
    pub published_at: Option<String>,
}

#[async_trait::async_trait]
pub trait SourceLookup: Send + Sync {
    /// Up to [`MAX_SOURCES`] records about `topic` from the persona's pack.
    /// Failures are skipped, never raised.
    async fn lookup(&self, topic: &str, persona: &str) -> Vec<SourceRecord>;

    /// Headlines for `query`. Empty when no news source is configured.
    async fn search_news(&self, query: &str) -> Vec<NewsItem>;
}

/// Lookup that never finds anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSources;

#[async_trait::async_trait]
impl SourceLookup for NoSources {
    async fn lookup(&self, _topic: &str, _persona: &str) -> Vec<SourceRecord> {
        Vec::new()
    }

    async fn search_news(&self, _query: &str) -> Vec<NewsItem> {
        Vec::new()
    }
}

/// Live lookups against the catalogued REST APIs.
#[derive(Debug, Clone)]
pub struct RestSources {
    client: reqwest::Client,
    keys: HashMap<String, String>,
}

impl RestSources {
    pub fn new(keys: HashMap<String, String>, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "failed to build timed sources client, using defaults");
                reqwest::Client::new()
            });
        Self { client, keys }
    }

    pub fn from_cfg(cfg: &XylohCfg) -> Self {
        Self::new(cfg.source_keys.clone(), cfg.sources_timeout())
    }

    pub fn configured_keys(&self) -> usize {
        self.keys.len()
    }

    /// GET `url` and parse the body as JSON. `None` on transport failure or a non-2xx status.
    async fn fetch(&self, api: &str, url: &str) -> Option<(Value, String)> {
        let resp = match self.client.get(url).send().await {
            Ok(resp) => resp,
            Err(e) => {
                tracing::debug!(api, error = %e, "source request failed");
                return None;
            }
        };
        if !resp.status().is_success() {
            tracing::debug!(api, status = resp.status().as_u16(), "source returned error status");
            return None;
        }
        let final_url = resp.url().to_string();
        let data = resp.json::<Value>().await.unwrap_or(Value::Null);
        Some((data, final_url))
    }

    async fn nyt_headlines(&self, query: &str) -> Vec<NewsItem> {
        let Some(key) = self.keys.get("NYT_API_KEY") else {
            return Vec::new();
        };
        let Ok(url) = url::Url::parse_with_params(
            "https://api.nytimes.com/svc/search/v2/articlesearch.json",
            &[("q", query), ("api-key", key.as_str())],
        ) else {
            return Vec::new();
        };
        let Some((data, _)) = self.fetch("nyt", url.as_str()).await else {
            return Vec::new();
        };
        data.pointer("/response/docs")
            .and_then(Value::as_array)
            .map(|docs| {
                docs.iter()
                    .take(5)
                    .filter_map(|d| {
                        Some(NewsItem {
                            title: d
                                .pointer("/headline/main")
                                .and_then(Value::as_str)
                                .unwrap_or("NYT Article")
                                .to_owned(),
                            url: d.get("web_url")?.as_str()?.to_owned(),
                            source: "NYT".to_owned(),
                            published_at: d.get("pub_date").and_then(Value::as_str).map(str::to_owned),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    async fn guardian_headlines(&self, query: &str) -> Vec<NewsItem> {
        let Some(key) = self.keys.get("GUARDIAN_API_KEY") else {
            return Vec::new();
        };
        let Ok(url) = url::Url::parse_with_params(
            "https://content.guardianapis.com/search",
            &[("q", query), ("api-key", key.as_str()), ("page-size", "5")],
        ) else {
            return Vec::new();
        };
        let Some((data, _)) = self.fetch("guardian", url.as_str()).await else {
            return Vec::new();
        };
        data.pointer("/response/results")
            .and_then(Value::as_array)
            .map(|results| {
                results
                    .iter()
                    .filter_map(|r| {
                        Some(NewsItem {
                            title: r.get("webTitle")?.as_str()?.to_owned(),
                            url: r.get("webUrl")?.as_str()?.to_owned(),
                            source: "Guardian".to_owned(),
                            published_at: r
                                .get("webPublicationDate")
                                .and_then(Value::as_str)
                                .map(str::to_owned),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl SourceLookup for RestSources {
    async fn lookup(&self, topic: &str, persona: &str) -> Vec<SourceRecord> {
        let pack = SourcePack::for_persona(persona);
        let query = clip_topic(topic);
        let mut gathered = Vec::new();

        for api in &pack.apis {
            let Some(url) = build_url(api, query, &self.keys) else {
                tracing::debug!(api = api.key, "source skipped: key not configured");
                continue;
            };
            let Some((data, final_url)) = self.fetch(api.key, &url).await else {
                continue;
            };
            gathered.extend(
                normalize::normalize(api.key, &data, &final_url)
                    .into_iter()
                    .filter(|r| pack.allows(&r.domain)),
            );
            if gathered.len() >= MAX_SOURCES {
                break;
            }
        }

        let mut records = normalize::dedupe(gathered);
        records.truncate(MAX_SOURCES);
        tracing::debug!(persona = pack.persona, count = records.len(), "sources gathered");
        records
    }

    async fn search_news(&self, query: &str) -> Vec<NewsItem> {
        let (mut nyt, guardian) = tokio::join!(self.nyt_headlines(query), self.guardian_headlines(query));
        nyt.extend(guardian);
        nyt
    }
}

/// First [`MAX_TOPIC_CHARS`] characters of the trimmed topic.
fn clip_topic(topic: &str) -> &str {
    let topic = topic.trim();
    match topic.char_indices().nth(MAX_TOPIC_CHARS) {
        Some((cut, _)) => &topic[..cut],
        None => topic,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn topic_is_clipped() {
        let long = "x".repeat(500);
        assert_eq!(clip_topic(&long).len(), MAX_TOPIC_CHARS);
        assert_eq!(clip_topic("  tides  "), "tides");
    }

    #[tokio::test]
    async fn no_sources_is_empty() {
        assert!(NoSources.lookup("anything", "General").await.is_empty());
        assert!(NoSources.search_news("anything").await.is_empty());
    }

    #[tokio::test]
    async fn keyless_news_search_makes_no_calls() {
        let sources = RestSources::new(HashMap::new(), Duration::from_millis(50));
        assert_eq!(sources.configured_keys(), 0);
        assert!(sources.search_news("moon").await.is_empty());
    }

    #[test]
    fn record_wire_format() {
        let r = SourceRecord { title: "T".into(), url: "https://a.org".into(), domain: "a.org".into() };
        assert_eq!(
            serde_json::to_value(&r).unwrap(),
            serde_json::json!({"title": "T", "url": "https://a.org", "domain": "a.org"})
        );
    }
}
