use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::store::{KvStore, history_key};

/// Who spoke a history turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    User,
    Assistant,
}

/// One stored conversation turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub ts: DateTime<Utc>,
    pub role: TurnRole,
    pub content: String,
}

/// Per-user bounded conversation log.
///
/// Stored newest-first in a list (push front, trim), read back oldest-first.
#[derive(Debug, Clone)]
pub struct HistoryLog {
    store: KvStore,
    cap: usize,
}

impl HistoryLog {
    pub fn new(store: KvStore, cap: usize) -> Self {
        Self { store, cap: cap.max(1) }
    }

    pub fn cap(&self) -> usize {
        self.cap
    }

    /// Append a turn stamped with the current time.
    pub async fn append(&self, user_id: &str, role: TurnRole, content: &str) -> bool {
        self.append_at(user_id, role, content, Utc::now()).await
    }

    pub async fn append_at(&self, user_id: &str, role: TurnRole, content: &str, ts: DateTime<Utc>) -> bool {
        let entry = HistoryEntry { ts, role, content: content.to_owned() };
        let Ok(encoded) = serde_json::to_string(&entry) else {
            return false;
        };
        let key = history_key(user_id);
        if !self.store.push_front(&key, &encoded).await {
            return false;
        }
        // A failed trim leaves the list over-long until the next append; the push still counts.
        if !self.store.trim(&key, 0, self.cap as i64 - 1).await {
            tracing::debug!(user_id, "history trim skipped");
        }
        true
    }

    /// All stored turns, oldest first. Malformed entries are dropped.
    pub async fn read(&self, user_id: &str) -> Vec<HistoryEntry> {
        let raw = self
            .store
            .range(&history_key(user_id), 0, self.cap as i64 - 1)
            .await;
        decode_newest_first(raw)
    }

    /// The last `n` turns, oldest first.
    pub async fn recent(&self, user_id: &str, n: usize) -> Vec<HistoryEntry> {
        if n == 0 {
            return Vec::new();
        }
        let raw = self
            .store
            .range(&history_key(user_id), 0, n.min(self.cap) as i64 - 1)
            .await;
        decode_newest_first(raw)
    }

    pub async fn clear(&self, user_id: &str) -> bool {
        self.store.delete(&history_key(user_id)).await
    }
}

fn decode_newest_first(raw: Vec<String>) -> Vec<HistoryEntry> {
    let mut entries: Vec<HistoryEntry> = raw
        .iter()
        .filter_map(|item| match serde_json::from_str(item) {
            Ok(entry) => Some(entry),
            Err(e) => {
                tracing::debug!(error = %e, "dropping malformed history entry");
                None
            }
        })
        .collect();
    entries.reverse();
    entries
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{KvBackend, MemoryKv};
    use std::sync::Arc;
    use std::time::Duration;

    fn log_with(kv: Arc<MemoryKv>, cap: usize) -> HistoryLog {
        HistoryLog::new(KvStore::with_backend(kv, Duration::from_secs(1)), cap)
    }

    #[tokio::test]
    async fn append_then_read_is_oldest_first() {
        let log = log_with(Arc::new(MemoryKv::new()), 200);
        assert!(log.append("u", TurnRole::User, "hello").await);
        assert!(log.append("u", TurnRole::Assistant, "…hello?").await);
        assert!(log.append("u", TurnRole::User, "who are you").await);

        let entries = log.read("u").await;
        let contents: Vec<_> = entries.iter().map(|e| e.content.as_str()).collect();
        assert_eq!(contents, vec!["hello", "…hello?", "who are you"]);
        assert_eq!(entries[1].role, TurnRole::Assistant);
    }

    #[tokio::test]
    async fn log_is_bounded_to_cap() {
        let log = log_with(Arc::new(MemoryKv::new()), 200);
        for i in 0..205 {
            log.append("u", TurnRole::User, &format!("m{i}")).await;
        }
        let entries = log.read("u").await;
        assert_eq!(entries.len(), 200);
        assert_eq!(entries.first().unwrap().content, "m5");
        assert_eq!(entries.last().unwrap().content, "m204");
    }

    #[tokio::test]
    async fn malformed_entries_are_dropped() {
        let kv = Arc::new(MemoryKv::new());
        let log = log_with(kv.clone(), 200);
        log.append("u", TurnRole::User, "first").await;
        kv.lpush(&history_key("u"), "{not json").await.unwrap();
        log.append("u", TurnRole::User, "second").await;

        let contents: Vec<_> = log.read("u").await.into_iter().map(|e| e.content).collect();
        assert_eq!(contents, vec!["first", "second"]);
    }

    #[tokio::test]
    async fn recent_returns_tail_in_order() {
        let log = log_with(Arc::new(MemoryKv::new()), 200);
        for i in 0..10 {
            log.append("u", TurnRole::User, &format!("m{i}")).await;
        }
        let contents: Vec<_> = log.recent("u", 3).await.into_iter().map(|e| e.content).collect();
        assert_eq!(contents, vec!["m7", "m8", "m9"]);
        assert!(log.recent("u", 0).await.is_empty());
    }

    #[tokio::test]
    async fn clear_removes_everything() {
        let log = log_with(Arc::new(MemoryKv::new()), 200);
        log.append("u", TurnRole::User, "hello").await;
        assert!(log.clear("u").await);
        assert!(log.read("u").await.is_empty());
    }

    #[tokio::test]
    async fn users_are_isolated() {
        let log = log_with(Arc::new(MemoryKv::new()), 200);
        log.append("a", TurnRole::User, "from a").await;
        assert!(log.read("b").await.is_empty());
    }

    #[tokio::test]
    async fn unconfigured_store_reads_empty() {
        let log = HistoryLog::new(KvStore::disabled(), 200);
        assert!(!log.append("u", TurnRole::User, "hello").await);
        assert!(log.read("u").await.is_empty());
        assert!(!log.clear("u").await);
    }

    #[test]
    fn entry_wire_format() {
        let entry = HistoryEntry {
            ts: DateTime::from_timestamp_millis(1_700_000_000_000).unwrap(),
            role: TurnRole::User,
            content: "hi".into(),
        };
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json, serde_json::json!({"ts": 1_700_000_000_000i64, "role": "user", "content": "hi"}));
    }
}
