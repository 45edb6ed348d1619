//! Search configuration, passed explicitly into adapters and the aggregator.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::trigger::DEFAULT_MIN_QUERY_LEN;

/// Public key accepted by GovInfo with restricted quotas.
pub const GOVINFO_DEMO_KEY: &str = "DEMO_KEY";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Toml(#[from] toml::de::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub max_results: usize,
    pub use_demo_fallback: bool,
    pub min_query_len: usize,
    /// Quiet period before a detected trigger is searched.
    pub debounce_ms: u64,
    /// Upper bound for each provider call.
    pub request_timeout_ms: u64,
    pub federal_register: FederalRegisterConfig,
    pub courtlistener: CourtListenerConfig,
    pub govinfo: GovInfoConfig,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            max_results: 10,
            use_demo_fallback: true,
            min_query_len: DEFAULT_MIN_QUERY_LEN,
            debounce_ms: 500,
            request_timeout_ms: 10_000,
            federal_register: FederalRegisterConfig::default(),
            courtlistener: CourtListenerConfig::default(),
            govinfo: GovInfoConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FederalRegisterConfig {
    pub enabled: bool,
    pub base_url: String,
    /// Agency slugs passed as `conditions[agencies][]`.
    pub agencies: Vec<String>,
}

impl Default for FederalRegisterConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: "https://www.federalregister.gov/api/v1".into(),
            agencies: vec![
                "internal-revenue-service".into(),
                "treasury-department".into(),
            ],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CourtListenerConfig {
    pub enabled: bool,
    pub base_url: String,
    /// Prefix for the relative `absolute_url` links in search results.
    pub site_url: String,
    pub api_token: Option<String>,
    pub courts: Vec<String>,
    pub order_by: String,
}

impl Default for CourtListenerConfig {
    fn default() -> Self {
        let courts = [
            "tax", "scotus", "ca1", "ca2", "ca3", "ca4", "ca5", "ca6", "ca7", "ca8", "ca9",
            "ca10", "ca11", "cadc", "cafc",
        ];
        Self {
            enabled: false,
            base_url: "https://www.courtlistener.com/api/rest/v4".into(),
            site_url: "https://www.courtlistener.com".into(),
            api_token: None,
            courts: courts.iter().map(|c| c.to_string()).collect(),
            order_by: "score desc".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GovInfoConfig {
    pub enabled: bool,
    pub base_url: String,
    pub api_key: Option<String>,
    pub collections: Vec<String>,
}

impl Default for GovInfoConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            base_url: "https://api.govinfo.gov".into(),
            api_key: None,
            collections: vec!["CFR".into(), "USCODE".into(), "FR".into()],
        }
    }
}

impl GovInfoConfig {
    /// The configured key, or the restricted public demo key.
    pub fn effective_api_key(&self) -> &str {
        self.api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .unwrap_or(GOVINFO_DEMO_KEY)
    }
}

/// Which providers have what they need for full access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ApiStatus {
    pub federal_register: bool,
    pub courtlistener: bool,
    pub govinfo: bool,
}

impl SearchConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&raw)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    /// Federal Register needs no credentials; the others report whether a
    /// non-blank key is configured.
    pub fn api_status(&self) -> ApiStatus {
        let present = |k: &Option<String>| k.as_deref().is_some_and(|k| !k.trim().is_empty());
        ApiStatus {
            federal_register: true,
            courtlistener: present(&self.courtlistener.api_token),
            govinfo: present(&self.govinfo.api_key),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_enable_only_federal_register() {
        let cfg = SearchConfig::default();
        assert!(cfg.federal_register.enabled);
        assert!(!cfg.courtlistener.enabled);
        assert!(!cfg.govinfo.enabled);
        assert_eq!(cfg.min_query_len, 3);
        assert_eq!(cfg.debounce(), Duration::from_millis(500));
        assert_eq!(cfg.courtlistener.courts.len(), 15);
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let cfg = SearchConfig::from_toml_str(
            r#"
            max_results = 6

            [courtlistener]
            enabled = true
            api_token = "abc123"
            courts = ["tax"]
            "#,
        )
        .unwrap();
        assert_eq!(cfg.max_results, 6);
        assert!(cfg.use_demo_fallback);
        assert!(cfg.courtlistener.enabled);
        assert_eq!(cfg.courtlistener.courts, ["tax"]);
        assert_eq!(cfg.courtlistener.order_by, "score desc");
        assert_eq!(cfg.govinfo, GovInfoConfig::default());
    }

    #[test]
    fn malformed_toml_is_an_error() {
        let err = SearchConfig::from_toml_str("max_results = \"many\"").unwrap_err();
        assert!(matches!(err, ConfigError::Toml(_)));
    }

    #[test]
    fn missing_file_reports_path() {
        let err = SearchConfig::load(Path::new("/nonexistent/lexcite.toml")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/lexcite.toml"));
    }

    #[test]
    fn api_status_ignores_blank_keys() {
        let mut cfg = SearchConfig::default();
        cfg.courtlistener.api_token = Some("  ".into());
        cfg.govinfo.api_key = Some("key".into());
        let status = cfg.api_status();
        assert!(status.federal_register);
        assert!(!status.courtlistener);
        assert!(status.govinfo);
    }

    #[test]
    fn govinfo_falls_back_to_demo_key() {
        let mut cfg = GovInfoConfig::default();
        assert_eq!(cfg.effective_api_key(), GOVINFO_DEMO_KEY);
        cfg.api_key = Some("real".into());
        assert_eq!(cfg.effective_api_key(), "real");
    }
}
