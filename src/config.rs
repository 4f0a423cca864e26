//! Configuration.
//!
//! Values come from three layers: built-in defaults, an optional TOML file
//! (`petaline.toml`, or wherever `PETALINE_CONFIG_PATH` points), and
//! environment variables, strongest last. The environment names match what
//! operators already export for the hosted services (`CRYPTOR_API_URL`,
//! `API_KEY`, `TENANT`, `GEMINI_API_KEY`).

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info};

/// Config file read when no explicit path is given.
pub const DEFAULT_CONFIG_PATH: &str = "petaline.toml";

/// Environment variable naming an alternate config file.
pub const CONFIG_PATH_ENV: &str = "PETALINE_CONFIG_PATH";

/// Everything the process needs to run.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Privacy (detect-encrypt) service settings.
    pub cryptor: CryptorConfig,
    /// Language model settings.
    pub model: ModelConfig,
    /// Order store file locations.
    pub store: StoreConfig,
}

/// Privacy service connection settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CryptorConfig {
    /// Service base URL.
    pub base_url: String,
    /// Value sent as the `x-api-key` header.
    pub api_key: String,
    /// Tenant all detect and decrypt calls run under.
    pub tenant_id: String,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for CryptorConfig {
    fn default() -> Self {
        Self {
            base_url: "https://private-layer-397444089703.europe-west1.run.app".to_owned(),
            api_key: "dev-secret-demo".to_owned(),
            tenant_id: "ai_private_demo".to_owned(),
            timeout_secs: 30,
        }
    }
}

/// Language model connection settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// API key; has no usable default and must be provided.
    pub api_key: String,
    /// Model identifier.
    pub model: String,
    /// API base URL.
    pub base_url: String,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: "gemini-2.5-flash".to_owned(),
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_owned(),
            timeout_secs: 30,
        }
    }
}

/// Order store file locations.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Orders file.
    pub orders_path: PathBuf,
    /// Bundles file.
    pub bundles_path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            orders_path: PathBuf::from("orders_db.json"),
            bundles_path: PathBuf::from("bundles_db.json"),
        }
    }
}

/// Configuration loading failures.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file exists but cannot be read, or an explicitly named
    /// file is missing.
    #[error("cannot read config file {path}: {source}")]
    Read {
        /// File that failed.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// The config file is not valid TOML for this schema.
    #[error("config file {path} is not valid: {source}")]
    Parse {
        /// File that failed.
        path: PathBuf,
        /// Underlying TOML error.
        source: toml::de::Error,
    },
    /// No model API key anywhere in the three layers.
    #[error("model.api_key is not set; export GEMINI_API_KEY or add it to the config file")]
    MissingModelKey,
}

impl Config {
    /// Load configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when an explicitly named file is unreadable
    /// or invalid, or when required values are missing after all layers.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self, ConfigError> {
        Self::from_sources(explicit_path, |name| std::env::var(name).ok())
    }

    /// Load configuration with an injected environment, for tests.
    ///
    /// # Errors
    ///
    /// Same contract as [`Config::load`].
    pub fn from_sources(
        explicit_path: Option<&Path>,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let named = match explicit_path {
            Some(path) => Some(path.to_path_buf()),
            None => env(CONFIG_PATH_ENV).map(PathBuf::from),
        };
        let (path, required) = match named {
            Some(path) => (path, true),
            None => (PathBuf::from(DEFAULT_CONFIG_PATH), false),
        };

        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
                path: path.clone(),
                source,
            })?;
            let parsed = toml::from_str(&contents).map_err(|source| ConfigError::Parse {
                path: path.clone(),
                source,
            })?;
            info!(path = %path.display(), "configuration loaded from file");
            parsed
        } else if required {
            return Err(ConfigError::Read {
                path,
                source: std::io::Error::from(std::io::ErrorKind::NotFound),
            });
        } else {
            debug!("no config file found, using defaults and environment");
            Self::default()
        };

        if let Some(url) = env("CRYPTOR_API_URL") {
            config.cryptor.base_url = url;
        }
        if let Some(key) = env("API_KEY") {
            config.cryptor.api_key = key;
        }
        if let Some(tenant) = env("TENANT") {
            config.cryptor.tenant_id = tenant;
        }
        if let Some(key) = env("GEMINI_API_KEY") {
            config.model.api_key = key;
        }

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.model.api_key.is_empty() {
            return Err(ConfigError::MissingModelKey);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env_with_key(
        pairs: &'static [(&'static str, &'static str)],
    ) -> impl Fn(&str) -> Option<String> {
        move |name| {
            if name == "GEMINI_API_KEY" {
                return Some("test-key".to_owned());
            }
            pairs
                .iter()
                .find(|(key, _)| *key == name)
                .map(|(_, value)| (*value).to_owned())
        }
    }

    #[test]
    fn test_defaults_when_nothing_is_set() {
        let config = Config::from_sources(None, env_with_key(&[])).expect("config");
        assert_eq!(config.cryptor.tenant_id, "ai_private_demo");
        assert_eq!(config.model.model, "gemini-2.5-flash");
        assert_eq!(config.store.orders_path, PathBuf::from("orders_db.json"));
        assert_eq!(config.cryptor.timeout_secs, 30);
    }

    #[test]
    fn test_missing_model_key_is_an_error() {
        let err = Config::from_sources(None, |_| None).expect_err("must fail");
        assert!(matches!(err, ConfigError::MissingModelKey));
    }

    #[test]
    fn test_env_overrides_defaults() {
        let env = env_with_key(&[
            ("CRYPTOR_API_URL", "http://localhost:9000"),
            ("API_KEY", "other-key"),
            ("TENANT", "other-tenant"),
        ]);
        let config = Config::from_sources(None, env).expect("config");
        assert_eq!(config.cryptor.base_url, "http://localhost:9000");
        assert_eq!(config.cryptor.api_key, "other-key");
        assert_eq!(config.cryptor.tenant_id, "other-tenant");
    }

    #[test]
    fn test_file_values_with_env_on_top() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("petaline.toml");
        std::fs::write(
            &path,
            r#"
[cryptor]
tenant_id = "from-file"
api_key = "file-key"

[model]
model = "gemini-2.0-flash"

[store]
orders_path = "data/orders.json"
"#,
        )
        .expect("write");

        let env = env_with_key(&[("API_KEY", "env-key")]);
        let config = Config::from_sources(Some(&path), env).expect("config");
        assert_eq!(config.cryptor.tenant_id, "from-file");
        assert_eq!(config.cryptor.api_key, "env-key");
        assert_eq!(config.model.model, "gemini-2.0-flash");
        assert_eq!(config.store.orders_path, PathBuf::from("data/orders.json"));
        assert_eq!(config.store.bundles_path, PathBuf::from("bundles_db.json"));
    }

    #[test]
    fn test_explicit_missing_file_is_an_error() {
        let err = Config::from_sources(
            Some(Path::new("/nonexistent/petaline.toml")),
            env_with_key(&[]),
        )
        .expect_err("must fail");
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
