//! Configuration system: dashboard TOML file + env var overrides + smart defaults.

#![allow(missing_docs)]

use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::errors::{HcmError, Result};
use crate::search::auth::{CredentialStore, Credentials};

/// Full dashboard configuration model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct DashboardConfig {
    pub http: HttpConfig,
    pub logging: LoggingConfig,
    /// Basic-auth credentials keyed by the widgets' `authKey`.
    pub auth: BTreeMap<String, Credentials>,
    /// Raw widget props. Validated per widget at mount so one bad entry
    /// fails closed without taking the others down.
    pub widgets: Vec<toml::Value>,
    /// Path the config was loaded from.
    #[serde(skip)]
    pub config_file: PathBuf,
}

/// Outbound HTTP client settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct HttpConfig {
    pub timeout_ms: u64,
    pub user_agent: String,
}

/// Activity log settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LoggingConfig {
    pub enabled: bool,
    pub jsonl_log: PathBuf,
    pub fallback_log: Option<PathBuf>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 10_000,
            user_agent: concat!("hcm/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            jsonl_log: data_dir().join("activity.jsonl"),
            fallback_log: Some(env::temp_dir().join("hcm-activity.jsonl")),
        }
    }
}

fn home_dir() -> PathBuf {
    env::var_os("HOME").map_or_else(
        || {
            eprintln!("[HCM-CONFIG] WARNING: HOME not set, falling back to /tmp for data paths");
            PathBuf::from("/tmp")
        },
        PathBuf::from,
    )
}

fn data_dir() -> PathBuf {
    home_dir().join(".local").join("share").join("hcm")
}

impl DashboardConfig {
    /// Default configuration path.
    #[must_use]
    pub fn default_path() -> PathBuf {
        home_dir().join(".config").join("hcm").join("dashboard.toml")
    }

    /// Load config from default or explicit path, then apply env overrides.
    ///
    /// Missing config file is not an error when loading from default path; defaults are used.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path_buf = path.map_or_else(Self::default_path, Path::to_path_buf);
        let is_explicit_path = path.is_some();

        let mut cfg = if path_buf.exists() {
            let raw =
                fs::read_to_string(&path_buf).map_err(|source| HcmError::io(&path_buf, source))?;
            toml::from_str::<Self>(&raw)?
        } else if is_explicit_path {
            return Err(HcmError::MissingConfig { path: path_buf });
        } else {
            Self::default()
        };

        cfg.config_file = path_buf;
        cfg.apply_env_overrides_from(env_var)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Parse a config from TOML text without touching the environment.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let cfg: Self = toml::from_str(raw)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Deterministic hash of the effective config for logging.
    ///
    /// FNV-1a so the digest is stable across processes and Rust releases.
    pub fn stable_hash(&self) -> Result<String> {
        let canonical = serde_json::to_string(self)?;
        let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
        for byte in canonical.as_bytes() {
            hash ^= u64::from(*byte);
            hash = hash.wrapping_mul(0x0100_0000_01b3);
        }
        Ok(format!("{hash:016x}"))
    }

    /// Credentials as a lookup store for request building.
    #[must_use]
    pub fn credential_store(&self) -> CredentialStore {
        CredentialStore::new(self.auth.clone())
    }

    fn apply_env_overrides_from<F>(&mut self, mut lookup: F) -> Result<()>
    where
        F: FnMut(&str) -> Option<String>,
    {
        if let Some(raw) = lookup("HCM_HTTP_TIMEOUT_MS") {
            self.http.timeout_ms = parse_env_u64("HCM_HTTP_TIMEOUT_MS", &raw)?;
        }
        if let Some(raw) = lookup("HCM_HTTP_USER_AGENT") {
            self.http.user_agent = raw;
        }
        if let Some(raw) = lookup("HCM_LOG_ENABLED") {
            self.logging.enabled = parse_env_bool("HCM_LOG_ENABLED", &raw)?;
        }
        if let Some(raw) = lookup("HCM_LOG_JSONL_PATH") {
            self.logging.jsonl_log = PathBuf::from(raw);
        }

        // Secrets can stay out of the file: HCM_AUTH_<KEY>_USERNAME / _PASSWORD.
        for (key, creds) in &mut self.auth {
            let prefix = format!("HCM_AUTH_{}", env_key_segment(key));
            if let Some(raw) = lookup(&format!("{prefix}_USERNAME")) {
                creds.username = raw;
            }
            if let Some(raw) = lookup(&format!("{prefix}_PASSWORD")) {
                creds.password = raw;
            }
        }

        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.http.timeout_ms == 0 {
            return Err(HcmError::InvalidConfig {
                details: "http.timeout_ms must be > 0".to_string(),
            });
        }
        if self.http.user_agent.trim().is_empty() {
            return Err(HcmError::InvalidConfig {
                details: "http.user_agent must not be empty".to_string(),
            });
        }
        for (key, creds) in &self.auth {
            if creds.username.is_empty() {
                return Err(HcmError::InvalidConfig {
                    details: format!("auth.{key}.username must not be empty"),
                });
            }
        }
        Ok(())
    }
}

/// `prod-es.eu` → `PROD_ES_EU`.
fn env_key_segment(key: &str) -> String {
    key.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect()
}

fn env_var(name: &str) -> Option<String> {
    env::var(name).ok()
}

fn parse_env_u64(name: &str, raw: &str) -> Result<u64> {
    raw.trim().parse::<u64>().map_err(|e| HcmError::InvalidConfig {
        details: format!("{name}={raw:?} is not a valid u64: {e}"),
    })
}

fn parse_env_bool(name: &str, raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(HcmError::InvalidConfig {
            details: format!("{name}={raw:?} is not a valid boolean"),
        }),
    }
}
