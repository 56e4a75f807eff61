use std::fs;
use std::path::PathBuf;

use camino::Utf8PathBuf;
use directories::BaseDirs;
use serde::{Deserialize, Serialize};

use crate::error::SyncError;
use crate::reconcile::DEFAULT_LIMIT;
use crate::registry::DEFAULT_REGISTRY_URL;
use crate::topics::DEFAULT_TOPICS_URL;

pub const DEFAULT_CONFIG_FILE: &str = "pkgmeta.json";
pub const DEFAULT_SOURCE_KEY: &str = "training-utils/node-package-details-with-url.json";
pub const DEFAULT_DESTINATION_KEY: &str = "training-utils/node-package-details.json";
pub const DEFAULT_OBJECT_STORE_URL: &str = "https://s3.amazonaws.com";

const GITHUB_TOKEN_VAR: &str = "GITHUB_TOKEN";
const OBJECT_STORE_TOKEN_VAR: &str = "OBJECT_STORE_TOKEN";

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub local_mode: bool,
    #[serde(default)]
    pub local_root: Option<String>,
    #[serde(default)]
    pub bucket: Option<String>,
    #[serde(default)]
    pub object_store_url: Option<String>,
    #[serde(default)]
    pub source_key: Option<String>,
    #[serde(default)]
    pub destination_key: Option<String>,
    #[serde(default)]
    pub registry_url: Option<String>,
    #[serde(default)]
    pub topics_url: Option<String>,
    #[serde(default)]
    pub limit: Option<usize>,
}

/// Command-line values that win over the config file.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub local_mode: bool,
    pub local_root: Option<String>,
    pub bucket: Option<String>,
    pub limit: Option<usize>,
    pub no_limit: bool,
    pub github_token: Option<String>,
    pub object_store_token: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageMode {
    Local { root: Utf8PathBuf },
    ObjectStore { endpoint: String, bucket: String },
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub storage: StorageMode,
    pub source_key: String,
    pub destination_key: String,
    pub registry_url: String,
    pub topics_url: String,
    pub limit: Option<usize>,
    pub github_token: String,
    pub object_store_token: Option<String>,
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Reads `path`, or `pkgmeta.json` when present, and applies `overrides`.
    /// Credentials missing from `overrides` are taken from the environment.
    pub fn resolve(
        path: Option<&str>,
        mut overrides: ConfigOverrides,
    ) -> Result<ResolvedConfig, SyncError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(DEFAULT_CONFIG_FILE),
        };

        let config = if path.is_none() && !config_path.exists() {
            Config::default()
        } else {
            let content = fs::read_to_string(&config_path)
                .map_err(|_| SyncError::ConfigRead(config_path.clone()))?;
            serde_json::from_str(&content).map_err(|err| SyncError::ConfigParse(err.to_string()))?
        };

        if overrides.github_token.is_none() {
            overrides.github_token = std::env::var(GITHUB_TOKEN_VAR).ok();
        }
        if overrides.object_store_token.is_none() {
            overrides.object_store_token = std::env::var(OBJECT_STORE_TOKEN_VAR).ok();
        }

        Self::resolve_config(config, overrides)
    }

    pub fn resolve_config(
        config: Config,
        overrides: ConfigOverrides,
    ) -> Result<ResolvedConfig, SyncError> {
        let storage = if overrides.local_mode || config.local_mode {
            let root = match overrides.local_root.or(config.local_root) {
                Some(root) => Utf8PathBuf::from(root),
                None => default_local_root()?,
            };
            StorageMode::Local { root }
        } else {
            let bucket = overrides
                .bucket
                .or(config.bucket)
                .filter(|bucket| !bucket.trim().is_empty())
                .ok_or_else(|| {
                    SyncError::InvalidConfig(
                        "a bucket is required unless local mode is enabled".to_string(),
                    )
                })?;
            let endpoint = config
                .object_store_url
                .unwrap_or_else(|| DEFAULT_OBJECT_STORE_URL.to_string());
            StorageMode::ObjectStore { endpoint, bucket }
        };

        let source_key = config
            .source_key
            .unwrap_or_else(|| DEFAULT_SOURCE_KEY.to_string());
        let destination_key = config
            .destination_key
            .unwrap_or_else(|| DEFAULT_DESTINATION_KEY.to_string());

        let limit = if overrides.no_limit {
            None
        } else {
            Some(overrides.limit.or(config.limit).unwrap_or(DEFAULT_LIMIT))
        };

        Ok(ResolvedConfig {
            storage,
            source_key,
            destination_key,
            registry_url: config
                .registry_url
                .unwrap_or_else(|| DEFAULT_REGISTRY_URL.to_string()),
            topics_url: config
                .topics_url
                .unwrap_or_else(|| DEFAULT_TOPICS_URL.to_string()),
            limit,
            github_token: overrides.github_token.unwrap_or_default(),
            object_store_token: overrides.object_store_token,
        })
    }
}

pub fn default_local_root() -> Result<Utf8PathBuf, SyncError> {
    BaseDirs::new()
        .and_then(|dirs| {
            Utf8PathBuf::from_path_buf(dirs.home_dir().join(".cache").join("pkgmeta-sync")).ok()
        })
        .ok_or_else(|| SyncError::InvalidConfig("unable to resolve cache directory".to_string()))
}
