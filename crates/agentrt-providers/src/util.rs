//! Shared utility functions for provider adapters.

use agentrt_domain::config::ProviderConfig;
use agentrt_domain::error::{Error, Result};

/// Convert a transport-level [`reqwest::Error`] into the domain [`Error`]
/// taxonomy. Timeouts map to [`Error::ProviderTimeout`]; anything else
/// (DNS failure, connection refused, TLS error) maps to
/// [`Error::ProviderUnavailable`], since neither indicates a problem with
/// the request itself.
pub(crate) fn from_reqwest(provider: &str, e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::ProviderTimeout {
            provider: provider.to_string(),
            elapsed_ms: 0,
        }
    } else {
        Error::ProviderUnavailable {
            provider: provider.to_string(),
            message: e.to_string(),
        }
    }
}

/// Map an HTTP error response into the domain [`Error`] taxonomy by status
/// code.
pub(crate) fn from_http_status(provider: &str, status: reqwest::StatusCode, body: &str) -> Error {
    match status.as_u16() {
        401 | 403 => Error::ProviderAuth {
            provider: provider.to_string(),
            message: body.to_string(),
        },
        429 => Error::ProviderRateLimit {
            provider: provider.to_string(),
            retry_after_ms: None,
        },
        400 | 404 | 422 => Error::ProviderBadRequest {
            provider: provider.to_string(),
            message: body.to_string(),
        },
        500..=599 => Error::ProviderUnavailable {
            provider: provider.to_string(),
            message: format!("HTTP {}: {}", status.as_u16(), body),
        },
        _ => Error::ProviderApi {
            provider: provider.to_string(),
            message: format!("HTTP {}: {}", status.as_u16(), body),
        },
    }
}

/// Resolve the API key for a provider.
///
/// `api_key` (a literal value) takes precedence; otherwise `api_key_env`
/// names an environment variable that must be set. `${VAR_NAME}`
/// placeholders inside `api_key` itself are resolved by the config loader
/// before a `ProviderConfig` ever reaches this point.
pub fn resolve_api_key(cfg: &ProviderConfig) -> Result<String> {
    if let Some(ref key) = cfg.api_key {
        return Ok(key.clone());
    }
    if let Some(ref env_var) = cfg.api_key_env {
        return std::env::var(env_var).map_err(|_| {
            Error::Config(format!(
                "environment variable '{}' not set or not valid UTF-8",
                env_var
            ))
        });
    }
    Err(Error::Config(
        "no API key configured for provider: set 'api_key' or 'api_key_env'".into(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_api_key_literal_takes_precedence() {
        let mut cfg = sample_config();
        cfg.api_key = Some("literal-key".into());
        cfg.api_key_env = Some("AGENTRT_TEST_UNUSED_VAR".into());
        assert_eq!(resolve_api_key(&cfg).unwrap(), "literal-key");
    }

    #[test]
    fn resolve_api_key_env_var() {
        let var_name = "AGENTRT_TEST_RESOLVE_ENV_KEY";
        std::env::set_var(var_name, "env-secret-value");
        let mut cfg = sample_config();
        cfg.api_key_env = Some(var_name.into());
        let result = resolve_api_key(&cfg).unwrap();
        assert_eq!(result, "env-secret-value");
        std::env::remove_var(var_name);
    }

    #[test]
    fn resolve_api_key_missing_returns_config_error() {
        let cfg = sample_config();
        let err = resolve_api_key(&cfg).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn from_http_status_maps_429_to_rate_limit() {
        let err = from_http_status("openai", reqwest::StatusCode::TOO_MANY_REQUESTS, "slow down");
        assert!(matches!(err, Error::ProviderRateLimit { .. }));
        assert!(err.is_retryable());
    }

    #[test]
    fn from_http_status_maps_401_to_auth_not_retryable() {
        let err = from_http_status("openai", reqwest::StatusCode::UNAUTHORIZED, "bad key");
        assert!(matches!(err, Error::ProviderAuth { .. }));
        assert!(!err.is_retryable());
    }

    fn sample_config() -> ProviderConfig {
        use agentrt_domain::config::ProviderKind;
        ProviderConfig {
            kind: ProviderKind::OpenaiCompat,
            base_url: "https://example.test/v1".into(),
            model: Some("gpt-test".into()),
            api_key: None,
            api_key_env: None,
            max_retries: 2,
            base_backoff_ms: 200,
            request_timeout_ms: 30_000,
            pricing: Default::default(),
        }
    }
}
