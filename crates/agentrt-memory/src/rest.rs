//! REST implementation of [`MemoryProvider`].
//!
//! `RestMemoryClient` wraps a `reqwest::Client` and translates every trait
//! method into an HTTP call against the Memory Service, with retry +
//! exponential back-off on transient (5xx / timeout) failures.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};

use agentrt_domain::config::MemoryConfig;
use agentrt_domain::error::{Error, Result};

use crate::provider::MemoryProvider;
use crate::types::{RetrieveResponse, SearchRequest, SearchResponse, StoreRequest, StoreResponse};

/// A REST-based client for the Memory Service.
///
/// Created once and reused for the lifetime of the agent process. The
/// underlying `reqwest::Client` maintains a connection pool.
#[derive(Debug, Clone)]
pub struct RestMemoryClient {
    http: Client,
    base_url: String,
    api_key: Option<String>,
    max_retries: u32,
}

impl RestMemoryClient {
    /// Build a new client from the `[memory]` config section.
    ///
    /// Returns `Error::Config` if `base_url` is unset, or if `api_key_env`
    /// names an environment variable that is missing.
    pub fn new(cfg: &MemoryConfig) -> Result<Self> {
        let base_url = cfg
            .base_url
            .clone()
            .ok_or_else(|| Error::Config("memory.base_url is not set".into()))?;

        let api_key = resolve_api_key(cfg)?;

        let http = Client::builder()
            .timeout(Duration::from_millis(cfg.timeout_ms))
            .build()
            .map_err(|e| Error::Config(format!("failed to build memory HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_owned(),
            api_key,
            max_retries: cfg.max_retries,
        })
    }

    fn decorate(&self, rb: RequestBuilder) -> RequestBuilder {
        match &self.api_key {
            Some(key) => rb.header("X-Api-Key", key),
            None => rb,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Execute a request with retry + exponential back-off on transient
    /// errors. Retries on 5xx and timeouts; 4xx is permanent.
    async fn execute_with_retry(
        &self,
        endpoint: &str,
        build_request: impl Fn() -> RequestBuilder,
    ) -> Result<Response> {
        let mut last_err: Option<Error> = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                tokio::time::sleep(Duration::from_millis(100 * 2u64.pow(attempt - 1))).await;
            }

            let rb = self.decorate(build_request());
            match rb.send().await {
                Ok(resp) if resp.status().is_server_error() => {
                    let status = resp.status().as_u16();
                    let body = resp.text().await.unwrap_or_default();
                    last_err = Some(Error::MemoryBackend(format!(
                        "{endpoint} returned {status}: {body}"
                    )));
                }
                Ok(resp) if resp.status().is_client_error() => {
                    let status = resp.status().as_u16();
                    let body = resp.text().await.unwrap_or_default();
                    return Err(Error::MemoryBackend(format!(
                        "{endpoint} returned {status}: {body}"
                    )));
                }
                Ok(resp) => return Ok(resp),
                Err(e) => {
                    last_err = Some(from_reqwest(endpoint, e));
                }
            }
        }

        Err(last_err
            .unwrap_or_else(|| Error::MemoryBackend(format!("{endpoint}: all retries exhausted"))))
    }
}

#[async_trait]
impl MemoryProvider for RestMemoryClient {
    async fn search(&self, req: SearchRequest) -> Result<SearchResponse> {
        let url = self.url("/memories/search");
        let resp = self
            .execute_with_retry("POST /memories/search", || self.http.post(&url).json(&req))
            .await?;

        let body = resp.text().await.map_err(|e| from_reqwest("search", e))?;
        serde_json::from_str(&body)
            .map_err(|e| Error::MemoryBackend(format!("failed to parse search response: {e}")))
    }

    async fn retrieve(&self, id: &str) -> Result<RetrieveResponse> {
        let url = self.url(&format!("/memories/{id}"));
        let resp = self
            .execute_with_retry("GET /memories/{id}", || self.http.get(&url))
            .await?;

        let body = resp.text().await.map_err(|e| from_reqwest("retrieve", e))?;
        serde_json::from_str(&body)
            .map_err(|e| Error::MemoryBackend(format!("failed to parse retrieve response: {e}")))
    }

    async fn store(&self, req: StoreRequest) -> Result<StoreResponse> {
        let url = self.url("/memories");
        let resp = self
            .execute_with_retry("POST /memories", || self.http.post(&url).json(&req))
            .await?;

        let body = resp.text().await.map_err(|e| from_reqwest("store", e))?;
        serde_json::from_str(&body)
            .map_err(|e| Error::MemoryBackend(format!("failed to parse store response: {e}")))
    }
}

fn from_reqwest(endpoint: &str, e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::MemoryBackend(format!("{endpoint} timed out: {e}"))
    } else {
        Error::MemoryBackend(format!("{endpoint} transport error: {e}"))
    }
}

fn resolve_api_key(cfg: &MemoryConfig) -> Result<Option<String>> {
    if let Some(ref key) = cfg.api_key {
        return Ok(Some(key.clone()));
    }
    if let Some(ref env_var) = cfg.api_key_env {
        let key = std::env::var(env_var)
            .map_err(|_| Error::Config(format!("environment variable '{env_var}' not set")))?;
        return Ok(Some(key));
    }
    Ok(None)
}
