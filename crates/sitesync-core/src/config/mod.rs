//! Client configuration.
//!
//! `ClientConfig` is stored as JSON and can be overridden from the
//! environment (`SITESYNC_*` variables). Front ends decide where the file
//! lives; the core only reads and writes it.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::models::{CollectionName, DEFAULT_COLLECTIONS};
use crate::util::{is_http_url, normalize_text_option};

pub const ENV_ENDPOINT: &str = "SITESYNC_ENDPOINT";
pub const ENV_REFRESH_INTERVAL_MS: &str = "SITESYNC_REFRESH_INTERVAL_MS";
pub const ENV_MAX_CACHE_AGE_MS: &str = "SITESYNC_MAX_CACHE_AGE_MS";
pub const ENV_REQUEST_TIMEOUT_MS: &str = "SITESYNC_REQUEST_TIMEOUT_MS";
pub const ENV_PROBE_INTERVAL_MS: &str = "SITESYNC_PROBE_INTERVAL_MS";
pub const ENV_COLLECTIONS: &str = "SITESYNC_COLLECTIONS";
pub const ENV_REPORTED_BY: &str = "SITESYNC_REPORTED_BY";

const DEFAULT_REFRESH_INTERVAL_MS: u64 = 30_000;
const DEFAULT_MAX_CACHE_AGE_MS: u64 = 60 * 60 * 1000;
const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 15_000;
const DEFAULT_PROBE_INTERVAL_MS: u64 = 10_000;
const DEFAULT_REPORTED_BY: &str = "Dashboard User";

/// Settings shared by every sitesync front end.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ClientConfig {
    /// Spreadsheet middleware URL
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default = "default_refresh_interval_ms")]
    pub refresh_interval_ms: u64,
    #[serde(default = "default_max_cache_age_ms")]
    pub max_cache_age_ms: u64,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    #[serde(default = "default_probe_interval_ms")]
    pub probe_interval_ms: u64,
    /// Collections refreshed by `refresh_all`
    #[serde(default = "CollectionName::defaults")]
    pub collections: Vec<CollectionName>,
    /// Name stamped on progress updates and issue reports
    #[serde(default = "default_reported_by")]
    pub reported_by: String,
}

const fn default_refresh_interval_ms() -> u64 {
    DEFAULT_REFRESH_INTERVAL_MS
}

const fn default_max_cache_age_ms() -> u64 {
    DEFAULT_MAX_CACHE_AGE_MS
}

const fn default_request_timeout_ms() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_MS
}

const fn default_probe_interval_ms() -> u64 {
    DEFAULT_PROBE_INTERVAL_MS
}

fn default_reported_by() -> String {
    DEFAULT_REPORTED_BY.to_string()
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            refresh_interval_ms: DEFAULT_REFRESH_INTERVAL_MS,
            max_cache_age_ms: DEFAULT_MAX_CACHE_AGE_MS,
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            probe_interval_ms: DEFAULT_PROBE_INTERVAL_MS,
            collections: CollectionName::defaults(),
            reported_by: default_reported_by(),
        }
    }
}

impl ClientConfig {
    /// Config pointing at the given endpoint, everything else default.
    pub fn with_endpoint(endpoint: impl Into<String>) -> Result<Self> {
        let mut config = Self {
            endpoint: Some(endpoint.into()),
            ..Self::default()
        };
        config.normalize();
        config.validate()?;
        Ok(config)
    }

    /// Load config from a JSON file. A missing file yields the defaults.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path).map_err(|error| {
            Error::Config(format!(
                "Failed to read config at {}: {error}",
                path.display()
            ))
        })?;
        let mut config = serde_json::from_str::<Self>(&raw).map_err(|error| {
            Error::Config(format!(
                "Failed to parse config at {}: {error}",
                path.display()
            ))
        })?;
        config.normalize();
        config.validate()?;
        Ok(config)
    }

    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|error| {
                Error::Config(format!(
                    "Failed to create config directory {}: {error}",
                    parent.display()
                ))
            })?;
        }

        let mut normalized = self.clone();
        normalized.normalize();
        normalized.validate()?;
        let serialized = serde_json::to_string_pretty(&normalized)?;
        std::fs::write(path, serialized).map_err(|error| {
            Error::Config(format!(
                "Failed to write config at {}: {error}",
                path.display()
            ))
        })
    }

    /// Apply `SITESYNC_*` environment overrides.
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary key lookup.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let value = |key: &str| normalize_text_option(lookup(key));

        if let Some(endpoint) = value(ENV_ENDPOINT) {
            self.endpoint = Some(endpoint);
        }
        if let Some(raw) = value(ENV_REFRESH_INTERVAL_MS) {
            self.refresh_interval_ms = parse_millis(ENV_REFRESH_INTERVAL_MS, &raw)?;
        }
        if let Some(raw) = value(ENV_MAX_CACHE_AGE_MS) {
            self.max_cache_age_ms = parse_millis(ENV_MAX_CACHE_AGE_MS, &raw)?;
        }
        if let Some(raw) = value(ENV_REQUEST_TIMEOUT_MS) {
            self.request_timeout_ms = parse_millis(ENV_REQUEST_TIMEOUT_MS, &raw)?;
        }
        if let Some(raw) = value(ENV_PROBE_INTERVAL_MS) {
            self.probe_interval_ms = parse_millis(ENV_PROBE_INTERVAL_MS, &raw)?;
        }
        if let Some(raw) = value(ENV_COLLECTIONS) {
            self.collections = raw
                .split(',')
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .map(CollectionName::new)
                .collect::<Result<Vec<_>>>()?;
        }
        if let Some(reported_by) = value(ENV_REPORTED_BY) {
            self.reported_by = reported_by;
        }

        self.normalize();
        self.validate()
    }

    /// Check invariants that serde cannot express.
    pub fn validate(&self) -> Result<()> {
        if let Some(endpoint) = &self.endpoint {
            if !is_http_url(endpoint) {
                return Err(Error::Config(
                    "endpoint must include http:// or https://".to_string(),
                ));
            }
        }
        for (field, value) in [
            ("refresh_interval_ms", self.refresh_interval_ms),
            ("request_timeout_ms", self.request_timeout_ms),
            ("probe_interval_ms", self.probe_interval_ms),
        ] {
            if value == 0 {
                return Err(Error::Config(format!("{field} must be greater than zero")));
            }
        }
        if self.reported_by.is_empty() {
            return Err(Error::Config("reported_by must not be empty".to_string()));
        }
        Ok(())
    }

    /// The configured endpoint, or a hint on how to set one.
    pub fn require_endpoint(&self) -> Result<&str> {
        self.endpoint.as_deref().ok_or_else(|| {
            Error::Config(format!(
                "No endpoint configured. Run `sitesync config init --endpoint URL` or set {ENV_ENDPOINT}."
            ))
        })
    }

    pub const fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_interval_ms)
    }

    pub const fn max_cache_age(&self) -> Duration {
        Duration::from_millis(self.max_cache_age_ms)
    }

    pub const fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub const fn probe_interval(&self) -> Duration {
        Duration::from_millis(self.probe_interval_ms)
    }

    fn normalize(&mut self) {
        self.endpoint = normalize_text_option(self.endpoint.take())
            .map(|endpoint| endpoint.trim_end_matches('/').to_string());
        self.reported_by = normalize_text_option(Some(std::mem::take(&mut self.reported_by)))
            .unwrap_or_else(default_reported_by);

        let mut seen = Vec::with_capacity(self.collections.len());
        self.collections.retain(|name| {
            if seen.contains(name) {
                false
            } else {
                seen.push(name.clone());
                true
            }
        });
    }
}

fn parse_millis(key: &str, raw: &str) -> Result<u64> {
    raw.parse::<u64>()
        .map_err(|error| Error::Config(format!("{key} must be a whole number of milliseconds: {error}")))
}

/// The default collection list, as plain strings.
pub fn default_collection_names() -> Vec<&'static str> {
    DEFAULT_COLLECTIONS.to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;
    use tempfile::tempdir;

    #[test]
    fn defaults_match_dashboard_behaviour() {
        let config = ClientConfig::default();
        assert_eq!(config.refresh_interval(), Duration::from_secs(30));
        assert_eq!(config.max_cache_age(), Duration::from_secs(3600));
        assert_eq!(config.request_timeout(), Duration::from_secs(15));
        assert_eq!(
            config
                .collections
                .iter()
                .map(CollectionName::as_str)
                .collect::<Vec<_>>(),
            default_collection_names()
        );
        assert_eq!(config.reported_by, "Dashboard User");
        assert!(config.require_endpoint().is_err());
    }

    #[test]
    fn missing_fields_take_defaults() {
        let config: ClientConfig =
            serde_json::from_str(r#"{"endpoint":"https://script.example.com/exec"}"#).unwrap();
        assert_eq!(config.refresh_interval_ms, 30_000);
        assert_eq!(config.collections.len(), 6);
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let error = serde_json::from_str::<ClientConfig>(r#"{"endpont":"x"}"#).unwrap_err();
        assert!(error.to_string().contains("unknown field"));
    }

    #[test]
    fn config_roundtrip_normalizes_values() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("nested").join("config.json");

        let config = ClientConfig {
            endpoint: Some(" https://script.example.com/exec/ ".to_string()),
            reported_by: "  ".to_string(),
            collections: vec![
                CollectionName::new("sites").unwrap(),
                CollectionName::new("sites").unwrap(),
                CollectionName::new("issues").unwrap(),
            ],
            ..ClientConfig::default()
        };

        config.save_to_path(&path).unwrap();
        let loaded = ClientConfig::load_from_path(&path).unwrap();

        assert_eq!(
            loaded.require_endpoint().unwrap(),
            "https://script.example.com/exec"
        );
        assert_eq!(loaded.reported_by, "Dashboard User");
        assert_eq!(loaded.collections.len(), 2);
    }

    #[test]
    fn load_missing_file_returns_defaults() {
        let tmp = tempdir().unwrap();
        let loaded = ClientConfig::load_from_path(&tmp.path().join("absent.json")).unwrap();
        assert_eq!(loaded, ClientConfig::default());
    }

    #[test]
    fn invalid_endpoint_is_rejected() {
        assert!(ClientConfig::with_endpoint("script.example.com").is_err());
        assert!(ClientConfig::with_endpoint("http://localhost:8080/").is_ok());
    }

    #[test]
    fn overrides_replace_file_values() {
        let env = HashMap::from([
            (ENV_ENDPOINT, "https://override.example.com/exec"),
            (ENV_REQUEST_TIMEOUT_MS, "2500"),
            (ENV_COLLECTIONS, "sites, issues ,"),
            (ENV_REPORTED_BY, "Site Lead"),
        ]);

        let mut config = ClientConfig::default();
        config
            .apply_overrides(|key| env.get(key).map(ToString::to_string))
            .unwrap();

        assert_eq!(
            config.endpoint.as_deref(),
            Some("https://override.example.com/exec")
        );
        assert_eq!(config.request_timeout(), Duration::from_millis(2500));
        assert_eq!(
            config
                .collections
                .iter()
                .map(CollectionName::as_str)
                .collect::<Vec<_>>(),
            vec!["sites", "issues"]
        );
        assert_eq!(config.reported_by, "Site Lead");
    }

    #[test]
    fn malformed_override_is_a_config_error() {
        let mut config = ClientConfig::default();
        let error = config
            .apply_overrides(|key| (key == ENV_PROBE_INTERVAL_MS).then(|| "soon".to_string()))
            .unwrap_err();
        assert!(matches!(error, Error::Config(_)));

        let error = config
            .apply_overrides(|key| (key == ENV_PROBE_INTERVAL_MS).then(|| "0".to_string()))
            .unwrap_err();
        assert!(matches!(error, Error::Config(_)));
    }
}
