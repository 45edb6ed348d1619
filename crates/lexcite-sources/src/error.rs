use std::time::Duration;

use lexcite_core::SourceProvider;
use thiserror::Error;

/// Failure of a single provider call. Adapters never retry.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("{provider}: HTTP request failed: {source}")]
    Transport {
        provider: SourceProvider,
        #[source]
        source: reqwest::Error,
    },
    #[error("{provider}: rate limited (HTTP 429)")]
    RateLimited { provider: SourceProvider },
    #[error("{provider}: server returned {status}: {body}")]
    Status {
        provider: SourceProvider,
        status: u16,
        body: String,
    },
    #[error("{provider}: JSON parse error: {source}")]
    Decode {
        provider: SourceProvider,
        #[source]
        source: serde_json::Error,
    },
    #[error("{provider}: no response within {}ms", .after.as_millis())]
    Timeout {
        provider: SourceProvider,
        after: Duration,
    },
}

impl ProviderError {
    pub fn provider(&self) -> SourceProvider {
        match self {
            Self::Transport { provider, .. }
            | Self::RateLimited { provider }
            | Self::Status { provider, .. }
            | Self::Decode { provider, .. }
            | Self::Timeout { provider, .. } => *provider,
        }
    }

    /// HTTP status of the failed response, when there was one.
    pub fn http_status(&self) -> Option<u16> {
        match self {
            Self::RateLimited { .. } => Some(429),
            Self::Status { status, .. } => Some(*status),
            Self::Transport { source, .. } => source.status().map(|s| s.as_u16()),
            Self::Decode { .. } | Self::Timeout { .. } => None,
        }
    }

    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }

    pub fn is_timeout(&self) -> bool {
        match self {
            Self::Timeout { .. } => true,
            Self::Transport { source, .. } => source.is_timeout(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_error_accessors() {
        let err = ProviderError::Status {
            provider: SourceProvider::GovInfo,
            status: 403,
            body: "API_KEY_INVALID".into(),
        };
        assert_eq!(err.provider(), SourceProvider::GovInfo);
        assert_eq!(err.http_status(), Some(403));
        assert!(!err.is_rate_limited());
        assert_eq!(err.to_string(), "govinfo: server returned 403: API_KEY_INVALID");
    }

    #[test]
    fn rate_limit_is_distinguishable() {
        let err = ProviderError::RateLimited {
            provider: SourceProvider::CourtListener,
        };
        assert!(err.is_rate_limited());
        assert_eq!(err.http_status(), Some(429));
    }

    #[test]
    fn timeout_has_no_status() {
        let err = ProviderError::Timeout {
            provider: SourceProvider::FederalRegister,
            after: Duration::from_millis(2500),
        };
        assert!(err.is_timeout());
        assert_eq!(err.http_status(), None);
        assert_eq!(err.to_string(), "federal_register: no response within 2500ms");
    }
}
