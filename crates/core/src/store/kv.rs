use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::config::{StoreCfg, StoreKind};
use crate::store::memory::MemoryKv;
use crate::store::rest::RestKv;

/// Failure inside a store backend. Never escapes [`KvStore`].
#[derive(Debug, thiserror::Error)]
pub enum KvError {
    #[error("transport: {0}")]
    Transport(String),
    #[error("store returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("undecodable store reply: {0}")]
    Decode(String),
    #[error("store error: {0}")]
    Backend(String),
}

/// Raw key-value backend with Redis-like string and list commands.
#[async_trait::async_trait]
pub trait KvBackend: Send + Sync {
    fn name(&self) -> &str;
    async fn get(&self, key: &str) -> Result<Option<String>, KvError>;
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), KvError>;
    async fn del(&self, key: &str) -> Result<(), KvError>;
    async fn lpush(&self, key: &str, value: &str) -> Result<(), KvError>;
    async fn ltrim(&self, key: &str, start: i64, stop: i64) -> Result<(), KvError>;
    async fn lrange(&self, key: &str, start: i64, stop: i64) -> Result<Vec<String>, KvError>;
}

/// A read that tells an absent key apart from a store that could not answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    Found(String),
    Missing,
    /// Not configured, timed out or failed.
    Unavailable,
}

impl Lookup {
    pub fn into_value(self) -> Option<String> {
        match self {
            Self::Found(value) => Some(value),
            Self::Missing | Self::Unavailable => None,
        }
    }
}

/// Soft-fail store adapter.
///
/// Every operation is bounded by a timeout and converts any backend error into
/// the operation's empty value (`None`, `false`, empty vec). With no backend
/// (store not configured) every call is a no-op.
#[derive(Clone)]
pub struct KvStore {
    backend: Option<Arc<dyn KvBackend>>,
    timeout: Duration,
}

impl std::fmt::Debug for KvStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KvStore")
            .field("backend", &self.backend.as_ref().map(|b| b.name().to_owned()))
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl KvStore {
    /// Build the adapter described by `cfg`. An incomplete REST config yields a disabled store.
    pub fn from_cfg(cfg: &StoreCfg) -> Self {
        match cfg.kind {
            StoreKind::Memory => Self::with_backend(Arc::new(MemoryKv::new()), cfg.timeout()),
            StoreKind::Rest => match (cfg.url.as_deref(), cfg.token.as_deref()) {
                (Some(url), Some(token)) if cfg.is_configured() => {
                    Self::with_backend(Arc::new(RestKv::new(url, token, cfg.timeout())), cfg.timeout())
                }
                _ => {
                    tracing::info!("key-value store not configured, running without persistence");
                    Self::disabled()
                }
            },
        }
    }

    pub fn with_backend(backend: Arc<dyn KvBackend>, timeout: Duration) -> Self {
        Self { backend: Some(backend), timeout }
    }

    pub fn disabled() -> Self {
        Self { backend: None, timeout: Duration::from_millis(0) }
    }

    pub fn is_configured(&self) -> bool {
        self.backend.is_some()
    }

    pub async fn get(&self, key: &str) -> Option<String> {
        self.lookup(key).await.into_value()
    }

    pub async fn lookup(&self, key: &str) -> Lookup {
        let Some(backend) = self.backend.as_ref() else {
            return Lookup::Unavailable;
        };
        match self.guard("get", key, backend.get(key)).await {
            Some(Some(value)) => Lookup::Found(value),
            Some(None) => Lookup::Missing,
            None => Lookup::Unavailable,
        }
    }

    pub async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> bool {
        let Some(backend) = self.backend.as_ref() else {
            return false;
        };
        self.guard("set", key, backend.set(key, value, ttl)).await.is_some()
    }

    pub async fn delete(&self, key: &str) -> bool {
        let Some(backend) = self.backend.as_ref() else {
            return false;
        };
        self.guard("del", key, backend.del(key)).await.is_some()
    }

    pub async fn push_front(&self, key: &str, value: &str) -> bool {
        let Some(backend) = self.backend.as_ref() else {
            return false;
        };
        self.guard("lpush", key, backend.lpush(key, value)).await.is_some()
    }

    pub async fn trim(&self, key: &str, start: i64, stop: i64) -> bool {
        let Some(backend) = self.backend.as_ref() else {
            return false;
        };
        self.guard("ltrim", key, backend.ltrim(key, start, stop)).await.is_some()
    }

    pub async fn range(&self, key: &str, start: i64, stop: i64) -> Vec<String> {
        let Some(backend) = self.backend.as_ref() else {
            return Vec::new();
        };
        self.guard("lrange", key, backend.lrange(key, start, stop))
            .await
            .unwrap_or_default()
    }

    /// Run one backend call under the timeout; log and swallow any failure.
    async fn guard<T>(
        &self,
        op: &'static str,
        key: &str,
        fut: impl Future<Output = Result<T, KvError>>,
    ) -> Option<T> {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(Ok(value)) => Some(value),
            Ok(Err(e)) => {
                tracing::warn!(op, key, error = %e, "store call failed");
                None
            }
            Err(_) => {
                tracing::warn!(op, key, timeout_ms = self.timeout.as_millis() as u64, "store call timed out");
                None
            }
        }
    }
}
