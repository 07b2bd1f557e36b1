//! Configuration management for mailman3-exporter.
//!
//! This module handles loading, merging, and validating configuration from files
//! and CLI arguments. It supports YAML, JSON, and TOML formats. Environment
//! variables are folded into the CLI arguments by clap, so the effective
//! precedence is CLI > environment > config file > default.

use crate::cli::{Args, ConfigFormat, LogLevel};
use mailman3_exporter::settings::{
    CacheSettings, ExporterSettings, MetricGroups, UpstreamSettings, DEFAULT_CACHE_DURATION_SECS,
    DEFAULT_MAILMAN_ADDRESS, DEFAULT_MAILMAN_API_VERSION, DEFAULT_MAILMAN_PASSWORD,
    DEFAULT_MAILMAN_USERNAME,
};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::info;

// Default configuration constants
pub const DEFAULT_HOSTNAME: &str = "localhost";
pub const DEFAULT_PORT: u16 = 9934;

const REDACTED: &str = "*****";

static NAMESPACE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z_][a-zA-Z0-9_]*$").expect("valid namespace regex"));

/// Errors raised while loading or validating the configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("Listen address in unexpected form (got '{0}')")]
    ListenAddress(String),

    #[error("Invalid listen port '{port}' in '{address}'")]
    ListenPort { address: String, port: String },

    #[error("Invalid namespace '{0}', expected [a-zA-Z_][a-zA-Z0-9_]*")]
    Namespace(String),

    #[error("Invalid Mailman address '{0}', expected http:// or https:// URL")]
    MailmanAddress(String),

    #[error("failed to render config: {0}")]
    Render(String),
}

/// Configuration as read from file and command line; `None` means "not set".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    // Logging
    #[serde(alias = "log-config")]
    pub log_config: Option<bool>,

    // Server configuration
    #[serde(alias = "web-listen", alias = "web.listen")]
    pub web_listen: Option<String>,

    // Upstream
    #[serde(alias = "mailman-address", alias = "mailman.address")]
    pub mailman_address: Option<String>,
    #[serde(alias = "mailman-user", alias = "mailman.user")]
    pub mailman_user: Option<String>,
    #[serde(alias = "mailman-password", alias = "mailman.password")]
    pub mailman_password: Option<String>,
    /// Request timeout in seconds; 0 keeps the client default.
    #[serde(alias = "mailman-timeout", alias = "mailman.timeout")]
    pub mailman_timeout: Option<u64>,

    pub namespace: Option<String>,

    // Cache
    #[serde(alias = "cache", alias = "enable-caching")]
    pub enable_caching: Option<bool>,
    #[serde(alias = "cache-duration", alias = "cache.duration")]
    pub cache_duration: Option<u64>,

    // Metrics enable flags
    #[serde(alias = "enable-platform-metrics")]
    pub enable_platform_metrics: Option<bool>,
    #[serde(alias = "enable-process-metrics")]
    pub enable_process_metrics: Option<bool>,
    #[serde(alias = "enable-domains-metrics")]
    pub enable_domains_metrics: Option<bool>,
    #[serde(alias = "enable-lists-metrics")]
    pub enable_lists_metrics: Option<bool>,
    #[serde(alias = "enable-up-metrics")]
    pub enable_up_metrics: Option<bool>,
    #[serde(alias = "enable-users-metrics")]
    pub enable_users_metrics: Option<bool>,
    #[serde(alias = "enable-queue-metrics")]
    pub enable_queue_metrics: Option<bool>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_config: Some(false),
            web_listen: Some(format!("{DEFAULT_HOSTNAME}:{DEFAULT_PORT}")),
            mailman_address: Some(DEFAULT_MAILMAN_ADDRESS.to_string()),
            mailman_user: Some(DEFAULT_MAILMAN_USERNAME.to_string()),
            mailman_password: Some(DEFAULT_MAILMAN_PASSWORD.to_string()),
            mailman_timeout: Some(0),
            namespace: Some(String::new()),
            enable_caching: Some(true),
            cache_duration: Some(DEFAULT_CACHE_DURATION_SECS),
            enable_platform_metrics: Some(true),
            enable_process_metrics: Some(true),
            enable_domains_metrics: Some(true),
            enable_lists_metrics: Some(true),
            enable_up_metrics: Some(true),
            enable_users_metrics: Some(true),
            enable_queue_metrics: Some(true),
        }
    }
}

macro_rules! fill {
    ($cfg:ident, $defaults:ident, $($field:ident),+ $(,)?) => {
        $( if $cfg.$field.is_none() { $cfg.$field = $defaults.$field; } )+
    };
}

impl Config {
    /// Replaces every unset field with its default.
    pub fn with_defaults(mut self) -> Self {
        let defaults = Config::default();
        fill!(
            self,
            defaults,
            log_config,
            web_listen,
            mailman_address,
            mailman_user,
            mailman_password,
            mailman_timeout,
            namespace,
            enable_caching,
            cache_duration,
            enable_platform_metrics,
            enable_process_metrics,
            enable_domains_metrics,
            enable_lists_metrics,
            enable_up_metrics,
            enable_users_metrics,
            enable_queue_metrics,
        );
        self
    }

    /// Copy safe to print or log: credentials replaced by `*****`.
    pub fn redacted(&self) -> Self {
        let mut cfg = self.clone();
        if cfg.mailman_user.is_some() {
            cfg.mailman_user = Some(REDACTED.to_string());
        }
        if cfg.mailman_password.is_some() {
            cfg.mailman_password = Some(REDACTED.to_string());
        }
        cfg
    }

    /// Host and port the HTTP server binds to.
    pub fn listen_address(&self) -> Result<(String, u16), ConfigError> {
        parse_host_port(self.web_listen.as_deref().unwrap_or(""))
    }

    /// Upstream address with surrounding whitespace and trailing `/` removed.
    pub fn mailman_address(&self) -> String {
        self.mailman_address
            .as_deref()
            .unwrap_or(DEFAULT_MAILMAN_ADDRESS)
            .trim()
            .trim_end_matches('/')
            .to_string()
    }

    pub fn namespace(&self) -> String {
        self.namespace.as_deref().unwrap_or("").trim().to_string()
    }

    /// Builds the immutable settings snapshot consumed by the library.
    pub fn to_settings(&self) -> Result<ExporterSettings, ConfigError> {
        validate_effective_config(self)?;

        let timeout = match self.mailman_timeout.unwrap_or(0) {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };

        Ok(ExporterSettings {
            upstream: UpstreamSettings {
                address: self.mailman_address(),
                api_version: DEFAULT_MAILMAN_API_VERSION.to_string(),
                username: self
                    .mailman_user
                    .clone()
                    .unwrap_or_else(|| DEFAULT_MAILMAN_USERNAME.to_string()),
                password: self
                    .mailman_password
                    .clone()
                    .unwrap_or_else(|| DEFAULT_MAILMAN_PASSWORD.to_string()),
                timeout,
            },
            groups: MetricGroups {
                domains: self.enable_domains_metrics.unwrap_or(true),
                lists: self.enable_lists_metrics.unwrap_or(true),
                up: self.enable_up_metrics.unwrap_or(true),
                users: self.enable_users_metrics.unwrap_or(true),
                queue: self.enable_queue_metrics.unwrap_or(true),
            },
            cache: CacheSettings {
                enabled: self.enable_caching.unwrap_or(true),
                duration: Duration::from_secs(
                    self.cache_duration.unwrap_or(DEFAULT_CACHE_DURATION_SECS),
                ),
            },
            namespace: self.namespace(),
            enable_process_metrics: self.enable_process_metrics.unwrap_or(true),
            enable_platform_metrics: self.enable_platform_metrics.unwrap_or(true),
        })
    }
}

/// Splits `host[:port]`; empty parts fall back to the defaults.
pub fn parse_host_port(web_listen: &str) -> Result<(String, u16), ConfigError> {
    let web_listen = web_listen.trim();
    let parts: Vec<&str> = web_listen.split(':').collect();

    let host = |h: &str| {
        if h.is_empty() {
            DEFAULT_HOSTNAME.to_string()
        } else {
            h.to_string()
        }
    };

    match parts.as_slice() {
        [hostname] => Ok((host(hostname), DEFAULT_PORT)),
        [hostname, ""] => Ok((host(hostname), DEFAULT_PORT)),
        [hostname, port] => {
            let port = port.parse::<u16>().map_err(|_| ConfigError::ListenPort {
                address: web_listen.to_string(),
                port: port.to_string(),
            })?;
            Ok((host(hostname), port))
        }
        _ => Err(ConfigError::ListenAddress(web_listen.to_string())),
    }
}

/// Validate effective config (used by --check-config and at startup)
pub fn validate_effective_config(cfg: &Config) -> Result<(), ConfigError> {
    cfg.listen_address()?;

    let namespace = cfg.namespace();
    if !namespace.is_empty() && !NAMESPACE_RE.is_match(&namespace) {
        return Err(ConfigError::Namespace(namespace));
    }

    let address = cfg.mailman_address();
    if !(address.starts_with("http://") || address.starts_with("https://")) {
        return Err(ConfigError::MailmanAddress(address));
    }

    Ok(())
}

/// Resolves configuration from CLI args, config file, and defaults.
/// This enforces precedence: CLI/env (if provided) > config file > default.
pub fn resolve_config(args: &Args) -> Result<Config, ConfigError> {
    let mut config = if args.no_config {
        Config::default()
    } else {
        load_config(args.config.as_deref())?
    };

    macro_rules! override_from_args {
        ($($field:ident),+ $(,)?) => {
            $( if let Some(value) = &args.$field { config.$field = Some(value.clone()); } )+
        };
    }

    override_from_args!(
        log_config,
        web_listen,
        mailman_address,
        mailman_user,
        mailman_password,
        mailman_timeout,
        namespace,
        enable_caching,
        cache_duration,
        enable_platform_metrics,
        enable_process_metrics,
        enable_domains_metrics,
        enable_lists_metrics,
        enable_up_metrics,
        enable_users_metrics,
        enable_queue_metrics,
    );

    Ok(config.with_defaults())
}

/// Loads a config file; without an explicit path the default locations are tried.
pub fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => {
            let defaults = [
                "/etc/mailman3-exporter/config.yaml",
                "/etc/mailman3-exporter/config.yml",
                "/etc/mailman3-exporter/config.json",
                "./mailman3-exporter.yaml",
                "./mailman3-exporter.yml",
                "./mailman3-exporter.json",
            ];

            match defaults.iter().find(|p| Path::new(p).exists()) {
                Some(found) => PathBuf::from(found),
                None => return Ok(Config::default()),
            }
        }
    };

    let content = fs::read_to_string(&path).map_err(|source| ConfigError::Read {
        path: path.clone(),
        source,
    })?;

    let parse_error = |message: String| ConfigError::Parse {
        path: path.clone(),
        message,
    };

    let config: Config = match path.extension().and_then(|s| s.to_str()) {
        Some("json") => serde_json::from_str(&content).map_err(|e| parse_error(e.to_string()))?,
        Some("toml") => toml::from_str(&content).map_err(|e| parse_error(e.to_string()))?,
        _ => serde_yaml::from_str(&content).map_err(|e| parse_error(e.to_string()))?,
    };

    info!("Loaded configuration from: {}", path.display());
    Ok(config)
}

/// Renders the effective configuration with credentials redacted.
pub fn render_config(config: &Config, format: ConfigFormat) -> Result<String, ConfigError> {
    let config = config.redacted();
    match format {
        ConfigFormat::Json => {
            serde_json::to_string_pretty(&config).map_err(|e| ConfigError::Render(e.to_string()))
        }
        ConfigFormat::Toml => {
            toml::to_string_pretty(&config).map_err(|e| ConfigError::Render(e.to_string()))
        }
        ConfigFormat::Yaml => {
            serde_yaml::to_string(&config).map_err(|e| ConfigError::Render(e.to_string()))
        }
    }
}

/// Shows configuration in requested format
pub fn show_config(config: &Config, format: ConfigFormat) -> Result<(), ConfigError> {
    println!("{}", render_config(config, format)?);
    Ok(())
}

/// Effective settings as `(key, value)` pairs, credentials redacted.
pub fn config_entries(config: &Config, log_level: LogLevel) -> Vec<(&'static str, String)> {
    let cfg = config.redacted();
    let show_bool = |v: Option<bool>| v.map_or_else(|| "unset".to_string(), |b| b.to_string());
    let show_num = |v: Option<u64>| v.map_or_else(|| "unset".to_string(), |n| n.to_string());
    let show_str = |v: &Option<String>| v.clone().unwrap_or_else(|| "unset".to_string());

    let (hostname, port) = match cfg.listen_address() {
        Ok((hostname, port)) => (hostname, port.to_string()),
        Err(_) => ("invalid".to_string(), "invalid".to_string()),
    };

    vec![
        ("log_level", format!("{:?}", log_level).to_lowercase()),
        ("web_listen", show_str(&cfg.web_listen)),
        ("hostname", hostname),
        ("port", port),
        ("mailman_address", show_str(&cfg.mailman_address)),
        ("mailman_api_version", DEFAULT_MAILMAN_API_VERSION.to_string()),
        ("mailman_user", show_str(&cfg.mailman_user)),
        ("mailman_password", show_str(&cfg.mailman_password)),
        ("mailman_timeout", show_num(cfg.mailman_timeout)),
        ("namespace", show_str(&cfg.namespace)),
        ("enable_caching", show_bool(cfg.enable_caching)),
        ("cache_duration", show_num(cfg.cache_duration)),
        ("enable_platform_metrics", show_bool(cfg.enable_platform_metrics)),
        ("enable_process_metrics", show_bool(cfg.enable_process_metrics)),
        ("enable_domains_metrics", show_bool(cfg.enable_domains_metrics)),
        ("enable_lists_metrics", show_bool(cfg.enable_lists_metrics)),
        ("enable_up_metrics", show_bool(cfg.enable_up_metrics)),
        ("enable_users_metrics", show_bool(cfg.enable_users_metrics)),
        ("enable_queue_metrics", show_bool(cfg.enable_queue_metrics)),
    ]
}

/// Logs every effective setting except the credentials.
pub fn log_config(config: &Config, log_level: LogLevel) {
    for (key, value) in config_entries(config, log_level) {
        info!("config({}): {}", key, value);
    }
}
