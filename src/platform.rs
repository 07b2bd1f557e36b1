//! Exporter self-metrics: build/platform info and process metrics.

use prometheus::{GaugeVec, Opts, Registry};
use tracing::debug;

use crate::settings::ExporterSettings;

/// Rust toolchain and target the exporter was built with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformInfo {
    pub version: String,
    pub major: String,
    pub minor: String,
    pub patchlevel: String,
    pub target: String,
}

impl PlatformInfo {
    /// Info captured at build time by `build.rs`.
    pub fn current() -> Self {
        Self::from_parts(
            option_env!("VERGEN_RUSTC_SEMVER").unwrap_or("unknown"),
            option_env!("VERGEN_CARGO_TARGET_TRIPLE").unwrap_or("unknown"),
        )
    }

    pub fn from_parts(version: &str, target: &str) -> Self {
        // "1.79.0-nightly" -> 1, 79, 0
        let core = version.split(['-', '+']).next().unwrap_or(version);
        let mut parts = core.split('.');
        let mut next = || parts.next().unwrap_or("").to_string();
        let (major, minor, patchlevel) = (next(), next(), next());
        Self {
            version: version.to_string(),
            major,
            minor,
            patchlevel,
            target: target.to_string(),
        }
    }
}

/// Registers `<prefix>rust_info` and `<prefix>mailman3_exporter_build_info`.
pub fn register_platform_metrics(
    registry: &Registry,
    prefix: &str,
    info: &PlatformInfo,
) -> prometheus::Result<()> {
    let rust_info = GaugeVec::new(
        Opts::new(format!("{prefix}rust_info"), "Rust platform information"),
        &["version", "major", "minor", "patchlevel", "target"],
    )?;
    rust_info
        .with_label_values(&[
            info.version.as_str(),
            info.major.as_str(),
            info.minor.as_str(),
            info.patchlevel.as_str(),
            info.target.as_str(),
        ])
        .set(1.0);
    registry.register(Box::new(rust_info))?;

    let build_info = GaugeVec::new(
        Opts::new(
            format!("{prefix}mailman3_exporter_build_info"),
            "Exporter version information",
        ),
        &["version"],
    )?;
    build_info
        .with_label_values(&[env!("CARGO_PKG_VERSION")])
        .set(1.0);
    registry.register(Box::new(build_info))?;

    debug!("Platform metrics registered ({} on {})", info.version, info.target);
    Ok(())
}

/// Registers the optional self-metrics selected in `settings`.
pub fn register_self_metrics(
    registry: &Registry,
    settings: &ExporterSettings,
) -> prometheus::Result<()> {
    let prefix = settings.prefix();

    if settings.enable_platform_metrics {
        register_platform_metrics(registry, &prefix, &PlatformInfo::current())?;
    }

    if settings.enable_process_metrics {
        #[cfg(target_os = "linux")]
        {
            let collector = prometheus::process_collector::ProcessCollector::new(
                std::process::id() as i32,
                settings.namespace.clone(),
            );
            registry.register(Box::new(collector))?;
            debug!("Process metrics registered");
        }
        #[cfg(not(target_os = "linux"))]
        debug!("Process metrics are only available on Linux");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_platform_info_from_parts() {
        let info = PlatformInfo::from_parts("1.79.0-nightly", "x86_64-unknown-linux-gnu");
        assert_eq!(info.major, "1");
        assert_eq!(info.minor, "79");
        assert_eq!(info.patchlevel, "0");
        assert_eq!(info.version, "1.79.0-nightly");
        assert_eq!(info.target, "x86_64-unknown-linux-gnu");
    }

    #[test]
    fn test_platform_info_unknown_version() {
        let info = PlatformInfo::from_parts("unknown", "unknown");
        assert_eq!(info.major, "unknown");
        assert_eq!(info.minor, "");
    }

    #[test]
    fn test_register_platform_metrics_with_prefix() {
        let registry = Registry::new();
        let info = PlatformInfo::from_parts("1.80.1", "aarch64-apple-darwin");
        register_platform_metrics(&registry, "foo_", &info).unwrap();

        let names: Vec<String> = registry
            .gather()
            .iter()
            .map(|f| f.get_name().to_string())
            .collect();
        assert!(names.contains(&"foo_rust_info".to_string()));
        assert!(names.contains(&"foo_mailman3_exporter_build_info".to_string()));
    }

    #[test]
    fn test_register_self_metrics_disabled() {
        let registry = Registry::new();
        let settings = ExporterSettings {
            enable_platform_metrics: false,
            enable_process_metrics: false,
            ..Default::default()
        };
        register_self_metrics(&registry, &settings).unwrap();
        assert!(registry.gather().is_empty());
    }
}
