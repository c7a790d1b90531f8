//! `agentrt-memory` — the `MemoryManager` facade the core runtime uses for
//! `MEMORY_OP` steps.
//!
//! [`MemoryManager`] wraps an optional [`MemoryProvider`] and applies
//! degraded-mode semantics on top: `search` never fails — a backend error
//! or an unconfigured backend both resolve to an empty result list — while
//! `retrieve`/`store` propagate the backend's error so the calling step can
//! be marked `FAILED`.

pub mod provider;
pub mod rest;
pub mod types;

pub use provider::MemoryProvider;
pub use rest::RestMemoryClient;
pub use types::{MemoryRecord, RetrieveResponse, SearchRequest, SearchResponse, StoreRequest, StoreResponse};

use std::collections::HashMap;
use std::sync::Arc;

use agentrt_domain::config::MemoryConfig;
use agentrt_domain::error::{Error, Result};
use serde_json::Value;

/// Facade over a Memory Service backend, consumed by `StepProcessor` for
/// `MEMORY_OP` steps.
pub struct MemoryManager {
    provider: Option<Arc<dyn MemoryProvider>>,
}

impl MemoryManager {
    /// Build a manager from the `[memory]` config section.
    ///
    /// A missing `base_url` is not an error: the manager is constructed
    /// in degraded mode and every call behaves as if the backend were
    /// unreachable.
    pub fn from_config(cfg: &MemoryConfig) -> Result<Self> {
        if cfg.base_url.is_none() {
            tracing::info!("memory.base_url not set; MemoryManager running in degraded mode");
            return Ok(Self { provider: None });
        }
        let client = RestMemoryClient::new(cfg)?;
        Ok(Self {
            provider: Some(Arc::new(client)),
        })
    }

    /// Wrap an arbitrary provider (production REST client or a test double).
    pub fn new(provider: Arc<dyn MemoryProvider>) -> Self {
        Self {
            provider: Some(provider),
        }
    }

    /// A manager with no backend at all — always in degraded mode.
    pub fn disabled() -> Self {
        Self { provider: None }
    }

    /// Semantic search. Never fails: backend errors and the absence of a
    /// configured backend both surface as an empty result list.
    pub async fn search(
        &self,
        query: impl Into<String>,
        limit: Option<u32>,
        filter: Option<HashMap<String, Value>>,
    ) -> Vec<MemoryRecord> {
        let Some(provider) = &self.provider else {
            return Vec::new();
        };

        let query = query.into();
        let req = SearchRequest {
            query: query.clone(),
            limit,
            filter,
        };

        match provider.search(req).await {
            Ok(resp) => resp.results,
            Err(e) => {
                tracing::warn!(query = %query, error = %e, "memory search failed, returning empty results");
                Vec::new()
            }
        }
    }

    /// Fetch a single memory by id. Fails if the backend is unconfigured,
    /// unreachable, or the id is unknown.
    pub async fn retrieve(&self, id: &str) -> Result<RetrieveResponse> {
        let provider = self
            .provider
            .as_ref()
            .ok_or_else(|| Error::MemoryBackend("memory backend not configured".into()))?;
        provider.retrieve(id).await
    }

    /// Persist a new memory and return its assigned id. Fails if the
    /// backend is unconfigured or unreachable.
    pub async fn store(&self, text: impl Into<String>, metadata: HashMap<String, Value>) -> Result<String> {
        let provider = self
            .provider
            .as_ref()
            .ok_or_else(|| Error::MemoryBackend("memory backend not configured".into()))?;
        let resp = provider
            .store(StoreRequest {
                text: text.into(),
                metadata,
            })
            .await?;
        Ok(resp.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FlakyProvider {
        search_calls: AtomicUsize,
    }

    #[async_trait]
    impl MemoryProvider for FlakyProvider {
        async fn search(&self, _req: SearchRequest) -> Result<SearchResponse> {
            self.search_calls.fetch_add(1, Ordering::SeqCst);
            Err(Error::MemoryBackend("backend unreachable".into()))
        }
        async fn retrieve(&self, _id: &str) -> Result<RetrieveResponse> {
            Err(Error::MemoryBackend("not found".into()))
        }
        async fn store(&self, _req: StoreRequest) -> Result<StoreResponse> {
            Err(Error::MemoryBackend("backend unreachable".into()))
        }
    }

    struct EchoProvider;

    #[async_trait]
    impl MemoryProvider for EchoProvider {
        async fn search(&self, req: SearchRequest) -> Result<SearchResponse> {
            Ok(SearchResponse {
                results: vec![MemoryRecord {
                    id: "m1".into(),
                    text: req.query,
                    score: Some(0.9),
                    metadata: HashMap::new(),
                }],
            })
        }
        async fn retrieve(&self, id: &str) -> Result<RetrieveResponse> {
            Ok(RetrieveResponse {
                text: format!("memory {id}"),
                metadata: HashMap::new(),
            })
        }
        async fn store(&self, req: StoreRequest) -> Result<StoreResponse> {
            Ok(StoreResponse {
                id: format!("stored:{}", req.text.len()),
            })
        }
    }

    #[tokio::test]
    async fn disabled_manager_search_returns_empty() {
        let manager = MemoryManager::disabled();
        let results = manager.search("anything", None, None).await;
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn disabled_manager_retrieve_and_store_fail() {
        let manager = MemoryManager::disabled();
        assert!(manager.retrieve("id").await.is_err());
        assert!(manager.store("text", HashMap::new()).await.is_err());
    }

    #[tokio::test]
    async fn search_degrades_to_empty_on_backend_error() {
        let provider = Arc::new(FlakyProvider {
            search_calls: AtomicUsize::new(0),
        });
        let manager = MemoryManager::new(provider.clone());
        let results = manager.search("q", Some(5), None).await;
        assert!(results.is_empty());
        assert_eq!(provider.search_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retrieve_and_store_propagate_backend_errors() {
        let manager = MemoryManager::new(Arc::new(FlakyProvider {
            search_calls: AtomicUsize::new(0),
        }));
        assert!(manager.retrieve("missing").await.is_err());
        assert!(manager.store("text", HashMap::new()).await.is_err());
    }

    #[tokio::test]
    async fn happy_path_round_trips_through_echo_provider() {
        let manager = MemoryManager::new(Arc::new(EchoProvider));
        let results = manager.search("hello", None, None).await;
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].text, "hello");

        let id = manager.store("some text", HashMap::new()).await.unwrap();
        let fetched = manager.retrieve(&id).await.unwrap();
        assert_eq!(fetched.text, format!("memory {id}"));
    }
}
