//! Upstash-style REST key-value backend.
//!
//! Commands are addressed as `base/<command>/<key>[/<arg>...]`, authorized with a
//! bearer token. Values travel in the POST body, which the REST gateway appends
//! as the command's final argument. Replies are `{"result": ...}` or `{"error": ...}`.

use std::time::Duration;

use serde::Deserialize;

use crate::store::kv::{KvBackend, KvError};

#[derive(Deserialize)]
struct RestReply {
    #[serde(default)]
    result: serde_json::Value,
    #[serde(default)]
    error: Option<String>,
}

pub struct RestKv {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

impl RestKv {
    pub fn new(base_url: &str, token: &str, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "failed to build timed store client, using defaults");
                reqwest::Client::new()
            });
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_owned(),
            token: token.to_owned(),
        }
    }

    /// Build `base/<command>/<enc(arg)>/...[?EX=<secs>]`.
    pub fn command_url(&self, command: &str, args: &[&str], ttl: Option<Duration>) -> String {
        let mut url = format!("{}/{}", self.base_url, command);
        for arg in args {
            url.push('/');
            url.push_str(&urlencoding::encode(arg));
        }
        if let Some(ttl) = ttl {
            url.push_str(&format!("?EX={}", ttl.as_secs().max(1)));
        }
        url
    }

    async fn call(&self, url: String, body: Option<&str>) -> Result<serde_json::Value, KvError> {
        let request = match body {
            Some(body) => self.client.post(url).body(body.to_owned()),
            None => self.client.get(url),
        };
        let resp = request
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| KvError::Transport(e.to_string()))?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| KvError::Transport(e.to_string()))?;
        if !status.is_success() {
            return Err(KvError::Status { status: status.as_u16(), body: text });
        }
        parse_reply(&text)
    }
}

/// Decode a REST reply envelope into its `result`.
pub(crate) fn parse_reply(text: &str) -> Result<serde_json::Value, KvError> {
    let reply: RestReply =
        serde_json::from_str(text).map_err(|e| KvError::Decode(e.to_string()))?;
    match reply.error {
        Some(err) => Err(KvError::Backend(err)),
        None => Ok(reply.result),
    }
}

fn as_string_list(value: serde_json::Value) -> Result<Vec<String>, KvError> {
    match value {
        serde_json::Value::Null => Ok(Vec::new()),
        serde_json::Value::Array(items) => Ok(items
            .into_iter()
            .map(|item| match item {
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            })
            .collect()),
        other => Err(KvError::Decode(format!("expected list, got {other}"))),
    }
}

#[async_trait::async_trait]
impl KvBackend for RestKv {
    fn name(&self) -> &str {
        "rest"
    }

    async fn get(&self, key: &str) -> Result<Option<String>, KvError> {
        let result = self.call(self.command_url("get", &[key], None), None).await?;
        Ok(match result {
            serde_json::Value::Null => None,
            serde_json::Value::String(s) => Some(s),
            other => Some(other.to_string()),
        })
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), KvError> {
        self.call(self.command_url("set", &[key], ttl), Some(value)).await?;
        Ok(())
    }

    async fn del(&self, key: &str) -> Result<(), KvError> {
        self.call(self.command_url("del", &[key], None), None).await?;
        Ok(())
    }

    async fn lpush(&self, key: &str, value: &str) -> Result<(), KvError> {
        self.call(self.command_url("lpush", &[key], None), Some(value)).await?;
        Ok(())
    }

    async fn ltrim(&self, key: &str, start: i64, stop: i64) -> Result<(), KvError> {
        let (start, stop) = (start.to_string(), stop.to_string());
        self.call(self.command_url("ltrim", &[key, &start, &stop], None), None).await?;
        Ok(())
    }

    async fn lrange(&self, key: &str, start: i64, stop: i64) -> Result<Vec<String>, KvError> {
        let (start, stop) = (start.to_string(), stop.to_string());
        let result = self
            .call(self.command_url("lrange", &[key, &start, &stop], None), None)
            .await?;
        as_string_list(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kv() -> RestKv {
        RestKv::new("https://kv.example.com/", "tok", Duration::from_secs(1))
    }

    #[test]
    fn command_url_encodes_key() {
        let url = kv().command_url("get", &["xyloh:profile:a b/c"], None);
        assert_eq!(url, "https://kv.example.com/get/xyloh%3Aprofile%3Aa%20b%2Fc");
    }

    #[test]
    fn command_url_appends_ttl() {
        let url = kv().command_url("set", &["k"], Some(Duration::from_secs(15)));
        assert_eq!(url, "https://kv.example.com/set/k?EX=15");
    }

    #[test]
    fn command_url_with_range_args() {
        let url = kv().command_url("ltrim", &["hist", "0", "199"], None);
        assert_eq!(url, "https://kv.example.com/ltrim/hist/0/199");
    }

    #[test]
    fn parse_reply_result_and_error() {
        assert_eq!(parse_reply(r#"{"result":"OK"}"#).unwrap(), "OK");
        assert!(parse_reply(r#"{"result":null}"#).unwrap().is_null());
        assert!(matches!(parse_reply(r#"{"error":"WRONGTYPE"}"#), Err(KvError::Backend(_))));
        assert!(matches!(parse_reply("<html>"), Err(KvError::Decode(_))));
    }

    #[test]
    fn string_list_decoding() {
        let list = as_string_list(serde_json::json!(["a", "b"])).unwrap();
        assert_eq!(list, vec!["a", "b"]);
        assert!(as_string_list(serde_json::Value::Null).unwrap().is_empty());
        assert!(as_string_list(serde_json::json!("x")).is_err());
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_a_transport_error() {
        let kv = RestKv::new("http://127.0.0.1:1", "tok", Duration::from_millis(500));
        assert!(matches!(kv.get("k").await, Err(KvError::Transport(_))));
    }
}
