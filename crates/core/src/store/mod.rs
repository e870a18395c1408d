pub mod kv;
pub mod memory;
pub mod rest;

pub use kv::{KvBackend, KvError, KvStore, Lookup};
pub use memory::MemoryKv;
pub use rest::RestKv;

/// Storage key of a user's history list.
pub fn history_key(user_id: &str) -> String {
    format!("xyloh:hist:{user_id}")
}

/// Storage key of a user's profile record.
pub fn profile_key(user_id: &str) -> String {
    format!("xyloh:profile:{user_id}")
}

/// Storage key of a named soul session.
pub fn soul_key(soul_id: &str) -> String {
    format!("xyloh:soul:{soul_id}")
}
