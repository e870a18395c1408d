use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use tokio::time::Instant;

use crate::store::kv::{KvBackend, KvError};

#[derive(Debug)]
enum Slot {
    Text { value: String, expires_at: Option<Instant> },
    List(VecDeque<String>),
}

/// In-process backend with Redis list semantics. Contents vanish with the process.
#[derive(Debug, Default)]
pub struct MemoryKv {
    slots: Mutex<HashMap<String, Slot>>,
}

impl MemoryKv {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_slots<T>(
        &self,
        f: impl FnOnce(&mut HashMap<String, Slot>) -> Result<T, KvError>,
    ) -> Result<T, KvError> {
        let mut slots = self
            .slots
            .lock()
            .map_err(|_| KvError::Backend("memory store lock poisoned".into()))?;
        f(&mut slots)
    }
}

/// Resolve a Redis-style inclusive `[start, stop]` (negative = from the end)
/// against a list of `len` items. `None` means the range is empty.
fn resolve_range(len: usize, start: i64, stop: i64) -> Option<(usize, usize)> {
    let len = len as i64;
    let start = if start < 0 { (len + start).max(0) } else { start };
    let stop = if stop < 0 { len + stop } else { stop.min(len - 1) };
    if len == 0 || start > stop || start >= len {
        None
    } else {
        Some((start as usize, stop as usize))
    }
}

fn wrong_type(key: &str) -> KvError {
    KvError::Backend(format!("WRONGTYPE operation against key '{key}'"))
}

#[async_trait::async_trait]
impl KvBackend for MemoryKv {
    fn name(&self) -> &str {
        "memory"
    }

    async fn get(&self, key: &str) -> Result<Option<String>, KvError> {
        self.with_slots(|slots| {
            let expired = matches!(
                slots.get(key),
                Some(Slot::Text { expires_at: Some(at), .. }) if *at <= Instant::now()
            );
            if expired {
                slots.remove(key);
                return Ok(None);
            }
            match slots.get(key) {
                None => Ok(None),
                Some(Slot::Text { value, .. }) => Ok(Some(value.clone())),
                Some(Slot::List(_)) => Err(wrong_type(key)),
            }
        })
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), KvError> {
        self.with_slots(|slots| {
            let expires_at = ttl.map(|t| Instant::now() + t);
            slots.insert(key.to_owned(), Slot::Text { value: value.to_owned(), expires_at });
            Ok(())
        })
    }

    async fn del(&self, key: &str) -> Result<(), KvError> {
        self.with_slots(|slots| {
            slots.remove(key);
            Ok(())
        })
    }

    async fn lpush(&self, key: &str, value: &str) -> Result<(), KvError> {
        self.with_slots(|slots| {
            match slots
                .entry(key.to_owned())
                .or_insert_with(|| Slot::List(VecDeque::new()))
            {
                Slot::List(list) => {
                    list.push_front(value.to_owned());
                    Ok(())
                }
                Slot::Text { .. } => Err(wrong_type(key)),
            }
        })
    }

    async fn ltrim(&self, key: &str, start: i64, stop: i64) -> Result<(), KvError> {
        self.with_slots(|slots| {
            let keep = match slots.get_mut(key) {
                None => return Ok(()),
                Some(Slot::Text { .. }) => return Err(wrong_type(key)),
                Some(Slot::List(list)) => match resolve_range(list.len(), start, stop) {
                    Some((from, to)) => {
                        list.truncate(to + 1);
                        list.drain(..from);
                        true
                    }
                    None => false,
                },
            };
            if !keep {
                slots.remove(key);
            }
            Ok(())
        })
    }

    async fn lrange(&self, key: &str, start: i64, stop: i64) -> Result<Vec<String>, KvError> {
        self.with_slots(|slots| match slots.get(key) {
            None => Ok(Vec::new()),
            Some(Slot::Text { .. }) => Err(wrong_type(key)),
            Some(Slot::List(list)) => Ok(match resolve_range(list.len(), start, stop) {
                Some((from, to)) => list.range(from..=to).cloned().collect(),
                None => Vec::new(),
            }),
        })
    }
}
