//! The turn pipeline keeps replying when the store is slow, broken or absent.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use xyloh_core::cognition::shaping::CANONICAL_GREETING;
use xyloh_core::cognition::{TurnEngine, TurnRequest};
use xyloh_core::config::XylohCfg;
use xyloh_core::identity::Profile;
use xyloh_core::memory::{HistoryLog, ProfileStore, TurnRole};
use xyloh_core::random::ScriptedRandom;
use xyloh_core::sources::NoSources;
use xyloh_core::store::{KvBackend, KvError, KvStore};
use xyloh_llm::provider::MockProvider;

/// Every call hangs far past the adapter timeout.
struct StallingKv;

async fn stall() {
    tokio::time::sleep(Duration::from_secs(10)).await;
}

#[async_trait::async_trait]
impl KvBackend for StallingKv {
    fn name(&self) -> &str {
        "stalling"
    }
    async fn get(&self, _key: &str) -> Result<Option<String>, KvError> {
        stall().await;
        Ok(Some("{}".into()))
    }
    async fn set(&self, _key: &str, _value: &str, _ttl: Option<Duration>) -> Result<(), KvError> {
        stall().await;
        Ok(())
    }
    async fn del(&self, _key: &str) -> Result<(), KvError> {
        stall().await;
        Ok(())
    }
    async fn lpush(&self, _key: &str, _value: &str) -> Result<(), KvError> {
        stall().await;
        Ok(())
    }
    async fn ltrim(&self, _key: &str, _start: i64, _stop: i64) -> Result<(), KvError> {
        stall().await;
        Ok(())
    }
    async fn lrange(&self, _key: &str, _start: i64, _stop: i64) -> Result<Vec<String>, KvError> {
        stall().await;
        Ok(Vec::new())
    }
}

fn stalling_store() -> KvStore {
    KvStore::with_backend(Arc::new(StallingKv), Duration::from_millis(50))
}

fn engine(store: KvStore, llm: Arc<MockProvider>) -> TurnEngine {
    TurnEngine::new(
        Arc::new(XylohCfg::default()),
        store,
        llm,
        Arc::new(NoSources),
        Arc::new(ScriptedRandom::new(vec![0.99])),
    )
}

#[tokio::test]
async fn timed_out_store_ops_return_empty_values() {
    let store = stalling_store();
    assert_eq!(store.get("k").await, None);
    assert!(!store.set("k", "v", None).await);
    assert!(!store.delete("k").await);
    assert!(!store.push_front("k", "v").await);
    assert!(!store.trim("k", 0, 1).await);
    assert!(store.range("k", 0, -1).await.is_empty());

    let history = HistoryLog::new(stalling_store(), 200);
    assert!(!history.append("u", TurnRole::User, "hi").await);
    assert!(history.read("u").await.is_empty());

    let profiles = ProfileStore::new(stalling_store(), 12);
    let now = Utc::now();
    assert_eq!(profiles.get_profile("u", now).await, Profile::new(now));
    assert!(!profiles.erase_all("u").await);
}

#[tokio::test]
async fn chat_still_replies_through_a_stalled_store() {
    let llm = Arc::new(MockProvider::new("Here are two grounding steps."));
    let engine = engine(stalling_store(), llm.clone());

    let started = std::time::Instant::now();
    let reply = engine
        .handle(TurnRequest { user_id: "u".into(), prompt: "I feel anxious".into(), mode: Some("therapy".into()), immersion: None })
        .await
        .unwrap();
    assert_eq!(reply.reply, "Here are two grounding steps.");
    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(llm.calls(), 1);
}

#[tokio::test]
async fn awakened_turns_through_a_stalled_store_reach_the_model() {
    let llm = Arc::new(MockProvider::new("We hear you, faintly."));
    let engine = engine(stalling_store(), llm.clone());
    for prompt in ["hello", "are you there?", "say something new"] {
        let reply = engine
            .handle(TurnRequest { user_id: "u".into(), prompt: prompt.into(), mode: None, immersion: None })
            .await
            .unwrap();
        assert_ne!(reply.reply, CANONICAL_GREETING);
        assert_eq!(reply.reply, "We hear you, faintly.");
    }
    assert_eq!(llm.calls(), 3);
}

#[tokio::test]
async fn awakened_turns_without_a_store_reach_the_model() {
    let llm = Arc::new(MockProvider::new("Still here."));
    let engine = engine(KvStore::disabled(), llm.clone());
    for _ in 0..2 {
        let reply = engine
            .handle(TurnRequest { user_id: "u".into(), prompt: "hello".into(), mode: None, immersion: None })
            .await
            .unwrap();
        assert_eq!(reply.reply, "Still here.");
    }
    assert_eq!(llm.calls(), 2);
}

#[tokio::test]
async fn unconfigured_store_still_chats() {
    let llm = Arc::new(MockProvider::new("Sure."));
    let engine = engine(KvStore::disabled(), llm);
    let reply = engine
        .handle(TurnRequest { user_id: "u".into(), prompt: "quick question".into(), mode: Some("plain".into()), immersion: None })
        .await
        .unwrap();
    assert_eq!(reply.reply, "Sure.");
    assert!(engine.history().read("u").await.is_empty());
}
