//! Configuration with layered resolution using figment.
//!
//! Resolution order (highest priority last):
//! 1. User config: `~/.config/ecomap/config.toml` (XDG) or platform config dir
//! 2. Project config: `.ecomap.toml`
//! 3. Environment variables: `ECOMAP_*`, with `__` separating sections
//!    (e.g. `ECOMAP_SOURCE__API_KEY`)
//!
//! # Intended Usage
//!
//! **Global config** (`~/.config/ecomap/config.toml`):
//! ```toml
//! [source]
//! base_url = "https://relations.example.org"
//! api_key = "secret"
//!
//! [fallback]
//! path = "/var/lib/ecomap/fallback.json"
//! ```
//!
//! **Project config** (`.ecomap.toml`):
//! ```toml
//! [cache]
//! ttl_secs = 120
//!
//! [graph]
//! default_limit = 500
//! ```
//!
//! Every section has defaults, so an empty configuration loads. Missing
//! upstream credentials only surface when a refresh is attempted.

use std::ops::Deref;
use std::path::PathBuf;
use std::time::Duration;

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

/// Boxed wrapper for figment::Error to reduce Result size on the stack.
#[derive(Debug)]
pub struct ConfigError(Box<figment::Error>);

impl Deref for ConfigError {
    type Target = figment::Error;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.0.source()
    }
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self(Box::new(err))
    }
}

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub fallback: FallbackConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub graph: GraphConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

/// Upstream project-relations endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Base URL of the data source. Either the host root or the full
    /// `/api/project-relations` endpoint.
    pub base_url: Option<String>,
    /// API key forwarded as the `X-API-Key` header.
    pub api_key: Option<String>,
    /// Requested page size. The server may cap it lower.
    pub page_size: u32,
    /// Total requests allowed per page while rate limited.
    pub max_attempts: u32,
    /// Wait applied when a 429 response carries no `Retry-After`.
    pub default_retry_after_secs: u64,
    /// Pause between successful page requests.
    pub page_delay_ms: u64,
    /// Per-request timeout.
    pub timeout_secs: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            api_key: None,
            page_size: 300,
            max_attempts: 3,
            default_retry_after_secs: 60,
            page_delay_ms: 100,
            timeout_secs: 30,
        }
    }
}

impl SourceConfig {
    pub fn page_delay(&self) -> Duration {
        Duration::from_millis(self.page_delay_ms)
    }

    pub fn default_retry_after(&self) -> Duration {
        Duration::from_secs(self.default_retry_after_secs)
    }
}

/// Static last-known-good dataset.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FallbackConfig {
    /// JSON file holding the dataset in upstream entity shape.
    pub path: Option<PathBuf>,
    /// Serve the fallback dataset without contacting upstream.
    pub only: bool,
}

/// Snapshot cache behaviour.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub ttl_secs: u64,
    /// Serialize refreshes so concurrent callers share one fetch.
    pub single_flight: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 300,
            single_flight: true,
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

/// Which entities survive a category filter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoryScope {
    /// Matching entities plus every endpoint of a projected edge.
    #[default]
    Endpoints,
    /// Only edges touching a matching entity survive, along with their endpoints.
    Anchored,
}

/// Graph construction defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    /// Edge ceiling applied when a request does not specify one.
    pub default_limit: usize,
    pub category_scope: CategoryScope,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            default_limit: 800,
            category_scope: CategoryScope::Endpoints,
        }
    }
}

/// HTTP server binding for the `serve` command.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
        }
    }
}

impl Config {
    /// Load config with layered resolution (user → project → env).
    pub fn load() -> Result<Self, ConfigError> {
        Self::figment().extract().map_err(ConfigError::from)
    }

    fn figment() -> Figment {
        Figment::new()
            // Layer 1: User config (lowest priority)
            .merge(Toml::file(Self::user_config_path()))
            // Layer 2: Project config
            .merge(Toml::file(".ecomap.toml"))
            // Layer 3: Environment variables (highest priority)
            .merge(Env::prefixed("ECOMAP_").split("__"))
    }

    /// User config path: ~/.config/ecomap/config.toml (XDG) or platform config dir.
    fn user_config_path() -> PathBuf {
        // Prefer XDG config location (~/.config) on all platforms
        if let Some(home) = dirs::home_dir() {
            let xdg_path = home.join(".config").join("ecomap").join("config.toml");
            if xdg_path.exists() {
                return xdg_path;
            }
        }
        dirs::config_dir()
            .map(|p| p.join("ecomap").join("config.toml"))
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.source.page_size, 300);
        assert_eq!(config.source.max_attempts, 3);
        assert_eq!(config.source.default_retry_after(), Duration::from_secs(60));
        assert_eq!(config.source.page_delay(), Duration::from_millis(100));
        assert_eq!(config.cache.ttl(), Duration::from_secs(300));
        assert!(config.cache.single_flight);
        assert_eq!(config.graph.default_limit, 800);
        assert_eq!(config.graph.category_scope, CategoryScope::Endpoints);
        assert!(config.source.base_url.is_none());
    }

    #[test]
    #[serial]
    fn test_env_overrides() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("ECOMAP_SOURCE__BASE_URL", "https://relations.example.org");
            jail.set_env("ECOMAP_SOURCE__API_KEY", "secret");
            jail.set_env("ECOMAP_CACHE__TTL_SECS", "42");
            jail.set_env("ECOMAP_GRAPH__CATEGORY_SCOPE", "anchored");

            let config: Config = Config::figment().extract()?;
            assert_eq!(
                config.source.base_url.as_deref(),
                Some("https://relations.example.org")
            );
            assert_eq!(config.source.api_key.as_deref(), Some("secret"));
            assert_eq!(config.cache.ttl_secs, 42);
            assert_eq!(config.graph.category_scope, CategoryScope::Anchored);
            // Untouched fields keep their defaults
            assert_eq!(config.source.page_size, 300);
            Ok(())
        });
    }

    #[test]
    #[serial]
    fn test_project_file_layer() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                ".ecomap.toml",
                r#"
                [fallback]
                path = "snapshot.json"
                only = true

                [graph]
                default_limit = 100
                "#,
            )?;

            let config: Config = Config::figment().extract()?;
            assert!(config.fallback.only);
            assert_eq!(
                config.fallback.path.as_deref(),
                Some(std::path::Path::new("snapshot.json"))
            );
            assert_eq!(config.graph.default_limit, 100);
            Ok(())
        });
    }
}
