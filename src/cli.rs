//! CLI arguments for mailman3-exporter.
//!
//! This module defines the command-line interface using the clap library.
//! Every runtime option can also be given through an `ME_*` environment
//! variable; an explicit flag wins over the environment.

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Log level options for CLI parsing
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Off,
    #[value(alias = "critical")]
    Error,
    #[value(alias = "warning")]
    Warn,
    Info,
    Debug,
    Trace,
}

/// Configuration format options for output
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ConfigFormat {
    Yaml,
    Json,
    Toml,
}

/// Main CLI arguments structure
#[derive(Parser, Debug)]
#[command(
    name = "mailman3-exporter",
    about = "Mailman3 Prometheus metrics exporter",
    long_about = "Mailman3 Prometheus metrics exporter.\n\n\
                  Polls the Mailman3 Core REST API and exposes domains, lists, list members, \
                  users and queue depths as Prometheus metrics.",
    version
)]
pub struct Args {
    /// Detail level to log
    #[arg(long, value_enum, env = "ME_LOG_LEVEL", default_value = "info")]
    pub log_level: LogLevel,

    /// Log the current configuration except for sensitive information
    #[arg(long, env = "ME_LOG_CONFIG", value_name = "BOOL")]
    pub log_config: Option<bool>,

    /// HTTPServer metrics listen address (host[:port])
    #[arg(long = "web.listen", env = "ME_WEB_LISTEN", value_name = "HOST:PORT")]
    pub web_listen: Option<String>,

    /// Mailman3 Core REST API address
    #[arg(long = "mailman.address", env = "ME_MAILMAN_ADDRESS", value_name = "URL")]
    pub mailman_address: Option<String>,

    /// Mailman3 Core REST API username
    #[arg(short = 'u', long = "mailman.user", env = "ME_MAILMAN_USERNAME")]
    pub mailman_user: Option<String>,

    /// Mailman3 Core REST API password
    #[arg(
        short = 'p',
        long = "mailman.password",
        env = "ME_MAILMAN_PASSWORD",
        hide_env_values = true
    )]
    pub mailman_password: Option<String>,

    /// Timeout for a single REST API request in seconds (0 = client default)
    #[arg(long = "mailman.timeout", env = "ME_MAILMAN_TIMEOUT", value_name = "SECONDS")]
    pub mailman_timeout: Option<u64>,

    /// Metrics namespace
    #[arg(long, env = "ME_NAMESPACE")]
    pub namespace: Option<String>,

    /// Enable caching of the domains and lists endpoints
    #[arg(long = "cache", env = "ME_ENABLE_CACHING", value_name = "BOOL")]
    pub enable_caching: Option<bool>,

    /// Cache duration in seconds
    #[arg(
        long = "cache.duration",
        env = "ME_CACHE_DURATION_IN_SECONDS",
        value_name = "SECONDS"
    )]
    pub cache_duration: Option<u64>,

    /// Enable platform metrics
    #[arg(long = "metrics.platform", env = "ME_ENABLE_PLATFORM_METRICS", value_name = "BOOL")]
    pub enable_platform_metrics: Option<bool>,

    /// Enable process metrics
    #[arg(long = "metrics.process", env = "ME_ENABLE_PROCESS_METRICS", value_name = "BOOL")]
    pub enable_process_metrics: Option<bool>,

    /// Enable domains metrics
    #[arg(long = "metrics.domains", env = "ME_ENABLE_DOMAINS_METRICS", value_name = "BOOL")]
    pub enable_domains_metrics: Option<bool>,

    /// Enable lists metrics
    #[arg(long = "metrics.lists", env = "ME_ENABLE_LISTS_METRICS", value_name = "BOOL")]
    pub enable_lists_metrics: Option<bool>,

    /// Enable up metrics
    #[arg(long = "metrics.up", env = "ME_ENABLE_UP_METRICS", value_name = "BOOL")]
    pub enable_up_metrics: Option<bool>,

    /// Enable users metrics
    #[arg(long = "metrics.users", env = "ME_ENABLE_USERS_METRICS", value_name = "BOOL")]
    pub enable_users_metrics: Option<bool>,

    /// Enable queue metrics
    #[arg(long = "metrics.queue", env = "ME_ENABLE_QUEUE_METRICS", value_name = "BOOL")]
    pub enable_queue_metrics: Option<bool>,

    /// Config file (YAML/JSON/TOML)
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,

    /// Disable all config file loading
    #[arg(long)]
    pub no_config: bool,

    /// Print effective merged config and exit
    #[arg(long)]
    pub show_config: bool,

    /// Output format for --show-config
    #[arg(long, value_enum, default_value = "yaml")]
    pub config_format: ConfigFormat,

    /// Validate config and exit (return code 1 on error)
    #[arg(long)]
    pub check_config: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dotted_flags() {
        let args = Args::try_parse_from([
            "mailman3-exporter",
            "--web.listen",
            "0.0.0.0:9935",
            "--mailman.address",
            "http://localhost:8001",
            "-u",
            "admin",
            "-p",
            "secret",
            "--metrics.queue",
            "false",
            "--cache.duration",
            "60",
        ])
        .unwrap();

        assert_eq!(args.web_listen.as_deref(), Some("0.0.0.0:9935"));
        assert_eq!(args.mailman_user.as_deref(), Some("admin"));
        assert_eq!(args.mailman_password.as_deref(), Some("secret"));
        assert_eq!(args.enable_queue_metrics, Some(false));
        assert_eq!(args.cache_duration, Some(60));
    }

    #[test]
    fn test_log_level_aliases() {
        let args = Args::try_parse_from(["mailman3-exporter", "--log-level", "warning"]).unwrap();
        assert_eq!(args.log_level, LogLevel::Warn);
        let args = Args::try_parse_from(["mailman3-exporter", "--log-level", "critical"]).unwrap();
        assert_eq!(args.log_level, LogLevel::Error);
    }

    #[test]
    fn test_invalid_bool_is_rejected() {
        let result = Args::try_parse_from(["mailman3-exporter", "--metrics.users", "maybe"]);
        assert!(result.is_err());
    }
}
