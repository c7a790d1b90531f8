//! The `MemoryProvider` trait defines the interface for a Memory Service
//! backend (REST, or a test double). `MemoryManager` wraps an
//! `Arc<dyn MemoryProvider>` and applies degraded-mode semantics on top.

use async_trait::async_trait;
use agentrt_domain::error::Result;

use crate::types::{RetrieveResponse, SearchRequest, SearchResponse, StoreRequest, StoreResponse};

/// Abstraction over the Memory Service API surface the core consumes.
#[async_trait]
pub trait MemoryProvider: Send + Sync {
    /// Semantic search across stored memories.
    async fn search(&self, req: SearchRequest) -> Result<SearchResponse>;

    /// Fetch a single memory by id.
    async fn retrieve(&self, id: &str) -> Result<RetrieveResponse>;

    /// Persist a new memory, returning its assigned id.
    async fn store(&self, req: StoreRequest) -> Result<StoreResponse>;
}
