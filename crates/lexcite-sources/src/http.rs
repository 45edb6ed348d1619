//! Shared request plumbing for the provider adapters.

use lexcite_core::SourceProvider;
use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::error::ProviderError;

/// Error bodies are kept for diagnostics but not in full.
const MAX_ERROR_BODY: usize = 512;

pub(crate) const USER_AGENT: &str = concat!("lexcite/", env!("CARGO_PKG_VERSION"));

/// Send `request` and decode a JSON body, mapping every failure onto
/// [`ProviderError`] for `provider`.
pub(crate) async fn fetch_json<T: DeserializeOwned>(
    provider: SourceProvider,
    request: RequestBuilder,
) -> Result<T, ProviderError> {
    let transport = |source| ProviderError::Transport { provider, source };

    let resp = request.send().await.map_err(transport)?;
    let status = resp.status();
    debug!(%provider, status = status.as_u16(), url = %resp.url(), "provider responded");

    if status == StatusCode::TOO_MANY_REQUESTS {
        return Err(ProviderError::RateLimited { provider });
    }
    if !status.is_success() {
        let mut body = resp.text().await.unwrap_or_default();
        if let Some((cut, _)) = body.char_indices().nth(MAX_ERROR_BODY) {
            body.truncate(cut);
        }
        return Err(ProviderError::Status {
            provider,
            status: status.as_u16(),
            body,
        });
    }

    let bytes = resp.bytes().await.map_err(transport)?;
    serde_json::from_slice(&bytes).map_err(|source| ProviderError::Decode { provider, source })
}

/// Decode list entries one at a time. Entries that do not fit `T` are
/// logged and skipped; the rest are kept in order.
pub(crate) fn decode_items<T: DeserializeOwned>(
    provider: SourceProvider,
    items: Vec<serde_json::Value>,
) -> Vec<T> {
    items
        .into_iter()
        .enumerate()
        .filter_map(|(index, item)| match serde_json::from_value(item) {
            Ok(decoded) => Some(decoded),
            Err(e) => {
                warn!(%provider, index, error = %e, "skipping malformed result");
                None
            }
        })
        .collect()
}

/// Deserialize an explicit JSON `null` as `T::default()`.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Default + serde::Deserialize<'de>,
{
    use serde::Deserialize;
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Render a scalar JSON value without string quotes.
pub(crate) fn value_text(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Trim trailing slashes so paths can be appended with `format!`.
pub(crate) fn base_url(url: &str) -> String {
    url.trim_end_matches('/').to_string()
}


#[cfg(test)]
mod tests {
    use super::test_server::serve;
    use super::*;

    #[test]
    fn base_url_trims_trailing_slash() {
        assert_eq!(base_url("http://localhost:4000/"), "http://localhost:4000");
        assert_eq!(base_url("https://api.govinfo.gov"), "https://api.govinfo.gov");
    }

    #[tokio::test]
    async fn connection_refused_is_transport_error() {
        let client = reqwest::Client::new();
        // Port 9 (discard) on localhost is not expected to be listening.
        let err = fetch_json::<serde_json::Value>(
            SourceProvider::FederalRegister,
            client.get("http://127.0.0.1:9/documents.json"),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ProviderError::Transport { .. }));
        assert_eq!(err.provider(), SourceProvider::FederalRegister);
    }

    #[tokio::test]
    async fn too_many_requests_is_rate_limited() {
        let base = serve(|_| (429, r#"{"detail":"slow down"}"#.to_string())).await;
        let err = fetch_json::<serde_json::Value>(
            SourceProvider::CourtListener,
            reqwest::Client::new().get(format!("{base}/search/")),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ProviderError::RateLimited { provider: SourceProvider::CourtListener }));
        assert!(err.is_rate_limited());
        assert_eq!(err.http_status(), Some(429));
    }

    #[tokio::test]
    async fn error_status_keeps_body() {
        let base = serve(|_| (403, "nope".to_string())).await;
        let err = fetch_json::<serde_json::Value>(
            SourceProvider::GovInfo,
            reqwest::Client::new().get(format!("{base}/search")),
        )
        .await
        .unwrap_err();
        match &err {
            ProviderError::Status { provider, status, body } => {
                assert_eq!(*provider, SourceProvider::GovInfo);
                assert_eq!(*status, 403);
                assert_eq!(body, "nope");
            }
            other => panic!("expected Status, got {other:?}"),
        }
        assert_eq!(err.http_status(), Some(403));
        assert!(!err.is_rate_limited());
    }

    #[tokio::test]
    async fn invalid_json_is_decode_error() {
        let base = serve(|_| (200, "<html>".to_string())).await;
        let err = fetch_json::<serde_json::Value>(
            SourceProvider::FederalRegister,
            reqwest::Client::new().get(format!("{base}/documents.json")),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ProviderError::Decode { .. }));
        assert_eq!(err.http_status(), None);
    }

    #[test]
    fn malformed_items_are_skipped() {
        #[derive(Debug, serde::Deserialize, PartialEq)]
        struct Hit {
            score: Option<f64>,
        }
        let items = vec![
            serde_json::json!({"score": 12.5}),
            serde_json::json!({"score": "12.5"}),
            serde_json::json!({}),
        ];
        let hits: Vec<Hit> = decode_items(SourceProvider::CourtListener, items);
        assert_eq!(hits, [Hit { score: Some(12.5) }, Hit { score: None }]);
    }
}
