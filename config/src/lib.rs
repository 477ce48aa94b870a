//! Configuration loading for tether.
//!
//! The config file lives at `$TETHER_CONFIG`, or `~/.tether/config.toml` when
//! that variable is unset. A missing file is not an error: every section is
//! optional and the defaults describe a gateway with no service configured,
//! in which case every call site reports itself unavailable.
//!
//! ```toml
//! [gateway]
//! worker_threads = 2
//! dispatch_timeout_ms = 0
//! disabled_sites = ["credential"]
//!
//! [service]
//! base_url = "http://127.0.0.1:8787"
//! api_key = "${TETHER_API_KEY}"
//! request_timeout_secs = 120
//!
//! [retry]
//! max_retries = 2
//! initial_delay_ms = 500
//! max_delay_ms = 8000
//!
//! [logging]
//! file = "/var/log/tether.log"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;
use std::{env, fmt, fs};

use serde::Deserialize;
use tether_providers::ServiceSettings;
use tether_providers::retry::RetryConfig;
use tether_types::CallSite;
use thiserror::Error;
use url::Url;

pub const CONFIG_ENV: &str = "TETHER_CONFIG";
pub const SERVICE_URL_ENV: &str = "TETHER_SERVICE_URL";
pub const API_KEY_ENV: &str = "TETHER_API_KEY";

const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 120;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config at {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config at {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("invalid `{field}`: {message}")]
    Invalid {
        field: &'static str,
        message: String,
    },
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TetherConfig {
    pub gateway: Option<GatewayConfig>,
    pub service: Option<ServiceConfig>,
    pub retry: Option<RetryTuning>,
    pub logging: Option<LoggingConfig>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    /// Async runtime worker threads. Defaults to the runtime's own choice.
    pub worker_threads: Option<usize>,
    /// Bounded wait per call. Absent or 0 waits indefinitely.
    pub dispatch_timeout_ms: Option<u64>,
    /// Sites that stay closed even when a service is configured.
    #[serde(default)]
    pub disabled_sites: Vec<String>,
}

#[derive(Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceConfig {
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub request_timeout_secs: Option<u64>,
}

// Manual Debug impl to prevent leaking the API key in logs.
impl fmt::Debug for ServiceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceConfig")
            .field("base_url", &self.base_url)
            .field(
                "api_key",
                &if self.api_key.is_some() {
                    "[REDACTED]"
                } else {
                    "None"
                },
            )
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RetryTuning {
    pub max_retries: Option<u32>,
    pub initial_delay_ms: Option<u64>,
    pub max_delay_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Append logs to this file instead of stderr.
    pub file: Option<PathBuf>,
}

/// Expand `${VAR}` references using `lookup`. Missing variables expand to "".
///
/// An unclosed `${` is kept verbatim.
pub fn expand_vars_with(value: &str, lookup: impl Fn(&str) -> Option<String>) -> String {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;

    while let Some(start) = rest.find("${") {
        let Some(len) = rest[start + 2..].find('}') else {
            break;
        };
        out.push_str(&rest[..start]);
        let name = &rest[start + 2..start + 2 + len];
        if !name.is_empty() {
            out.push_str(&lookup(name).unwrap_or_default());
        }
        rest = &rest[start + 2 + len + 1..];
    }

    out.push_str(rest);
    out
}

/// Expand `${VAR}` references from the process environment.
#[must_use]
pub fn expand_env_vars(value: &str) -> String {
    expand_vars_with(value, |name| env::var(name).ok())
}

#[must_use]
pub fn config_path() -> Option<PathBuf> {
    if let Some(explicit) = env::var_os(CONFIG_ENV).filter(|value| !value.is_empty()) {
        return Some(PathBuf::from(explicit));
    }
    dirs::home_dir().map(|home| home.join(".tether").join("config.toml"))
}

impl TetherConfig {
    /// Load from the default location and apply environment overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = match config_path() {
            Some(path) if path.exists() => Self::load_from(&path)?,
            _ => Self::default(),
        };
        config.apply_overrides(|name| env::var(name).ok());
        config.validate()?;
        Ok(config)
    }

    /// Parse a config file without applying environment overrides.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| {
            tracing::warn!("Failed to read config at {:?}: {}", path, source);
            ConfigError::Read {
                path: path.to_path_buf(),
                source,
            }
        })?;
        Self::parse_str(&content).map_err(|source| {
            tracing::warn!("Failed to parse config at {:?}: {}", path, source);
            ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            }
        })
    }

    pub fn parse_str(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Expand `${VAR}` references and apply `TETHER_SERVICE_URL` / `TETHER_API_KEY`.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let service = self.service.get_or_insert_with(ServiceConfig::default);

        if let Some(url) = lookup(SERVICE_URL_ENV).filter(|v| !v.trim().is_empty()) {
            service.base_url = Some(url);
        }
        service.base_url = service
            .base_url
            .take()
            .map(|raw| expand_vars_with(&raw, &lookup))
            .filter(|raw| !raw.trim().is_empty());

        service.api_key = service
            .api_key
            .take()
            .map(|raw| expand_vars_with(&raw, &lookup))
            .filter(|raw| !raw.trim().is_empty())
            .or_else(|| lookup(API_KEY_ENV).filter(|v| !v.trim().is_empty()));
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(raw) = self.service.as_ref().and_then(|s| s.base_url.as_deref()) {
            let url = Url::parse(raw.trim()).map_err(|e| ConfigError::Invalid {
                field: "service.base_url",
                message: format!("{raw}: {e}"),
            })?;
            if !matches!(url.scheme(), "http" | "https") {
                return Err(ConfigError::Invalid {
                    field: "service.base_url",
                    message: format!("unsupported scheme `{}`", url.scheme()),
                });
            }
        }
        if self.gateway.as_ref().and_then(|g| g.worker_threads) == Some(0) {
            return Err(ConfigError::Invalid {
                field: "gateway.worker_threads",
                message: "must be at least 1".to_string(),
            });
        }
        self.disabled_sites()?;
        Ok(())
    }

    pub fn disabled_sites(&self) -> Result<Vec<CallSite>, ConfigError> {
        self.gateway
            .as_ref()
            .map(|gateway| gateway.disabled_sites.as_slice())
            .unwrap_or_default()
            .iter()
            .map(|raw| {
                CallSite::parse(raw).map_err(|e| ConfigError::Invalid {
                    field: "gateway.disabled_sites",
                    message: e.to_string(),
                })
            })
            .collect()
    }

    /// Sites whose gate should open: a service is configured and the site is not disabled.
    pub fn enabled_sites(&self) -> Result<Vec<CallSite>, ConfigError> {
        if self.service_settings().is_none() {
            return Ok(Vec::new());
        }
        let disabled = self.disabled_sites()?;
        Ok(CallSite::all()
            .iter()
            .copied()
            .filter(|site| !disabled.contains(site))
            .collect())
    }

    #[must_use]
    pub fn worker_threads(&self) -> Option<usize> {
        self.gateway.as_ref().and_then(|g| g.worker_threads)
    }

    #[must_use]
    pub fn dispatch_timeout(&self) -> Option<Duration> {
        self.gateway
            .as_ref()
            .and_then(|g| g.dispatch_timeout_ms)
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis)
    }

    #[must_use]
    pub fn retry_config(&self) -> RetryConfig {
        let defaults = RetryConfig::default();
        let Some(tuning) = self.retry.as_ref() else {
            return defaults;
        };
        RetryConfig {
            max_retries: tuning.max_retries.unwrap_or(defaults.max_retries),
            initial_delay: tuning
                .initial_delay_ms
                .map_or(defaults.initial_delay, Duration::from_millis),
            max_delay: tuning
                .max_delay_ms
                .map_or(defaults.max_delay, Duration::from_millis),
            jitter_factor: defaults.jitter_factor,
        }
    }

    /// Connection settings for the service, if one is configured.
    #[must_use]
    pub fn service_settings(&self) -> Option<ServiceSettings> {
        let service = self.service.as_ref()?;
        let base_url = service.base_url.as_deref()?.trim();
        let mut settings = ServiceSettings::new(base_url);
        settings.api_key = service.api_key.clone();
        settings.request_timeout = Duration::from_secs(
            service
                .request_timeout_secs
                .filter(|secs| *secs > 0)
                .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS),
        );
        settings.retry = self.retry_config();
        Some(settings)
    }

    #[must_use]
    pub fn log_file(&self) -> Option<&Path> {
        self.logging.as_ref().and_then(|l| l.file.as_deref())
    }
}
