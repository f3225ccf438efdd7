//! Logging bootstrap for Keyward plugins.
//!
//! Keyward itself only emits `tracing` events. A plugin binary can install a
//! subscriber with [`init`], controlled by environment variables:
//!
//! - `KEYWARD_DEBUG=true|1|yes` - Enable debug logging
//! - `KEYWARD_LOG_LEVEL=trace|debug|info|warn|error` - Set a specific level
//! - `KEYWARD_LOG_FORMAT=json|pretty|compact` - Output format (default: json)
//!
//! Statement text and passwords are never logged; fragments are identified
//! by their index and length.
//!
//! ```rust,no_run
//! keyward_core::logging::init();
//! ```

use std::env;
use std::sync::Once;

/// Enables debug logging when set to `true`, `1` or `yes`.
pub const DEBUG_ENV: &str = "KEYWARD_DEBUG";
/// Explicit log level.
pub const LOG_LEVEL_ENV: &str = "KEYWARD_LOG_LEVEL";
/// Output format.
pub const LOG_FORMAT_ENV: &str = "KEYWARD_LOG_FORMAT";

/// Crates whose events the installed filter lets through.
pub const LOG_TARGETS: &[&str] = &[
    "keyward",
    "keyward_core",
    "keyward_template",
    "keyward_clickhouse",
];

static INIT: Once = Once::new();

/// Subscriber output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// One JSON object per event.
    #[default]
    Json,
    /// Multi-line human-readable output.
    Pretty,
    /// Single-line human-readable output.
    Compact,
}

impl LogFormat {
    fn parse(value: &str) -> Self {
        match value.to_lowercase().as_str() {
            "pretty" => Self::Pretty,
            "compact" => Self::Compact,
            _ => Self::Json,
        }
    }

    /// Name of the format.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Pretty => "pretty",
            Self::Compact => "compact",
        }
    }
}

/// Logging settings resolved from the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSettings {
    /// Whether a subscriber should be installed at all.
    pub enabled: bool,
    /// Level applied to every Keyward crate.
    pub level: &'static str,
    /// Output format.
    pub format: LogFormat,
}

impl LogSettings {
    /// Resolve settings from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Resolve settings through `lookup`, which maps a variable name to its value.
    ///
    /// Logging stays disabled unless `KEYWARD_DEBUG` is truthy or
    /// `KEYWARD_LOG_LEVEL` is set. An unknown level falls back to `debug`
    /// when debug is on and `warn` otherwise.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let debug = lookup(DEBUG_ENV)
            .map(|v| matches!(v.to_lowercase().as_str(), "true" | "1" | "yes"))
            .unwrap_or(false);
        let explicit = lookup(LOG_LEVEL_ENV);
        let fallback = if debug { "debug" } else { "warn" };

        let level = match explicit.as_deref().map(str::to_lowercase).as_deref() {
            Some("trace") => "trace",
            Some("debug") => "debug",
            Some("info") => "info",
            Some("warn") => "warn",
            Some("error") => "error",
            _ => fallback,
        };

        Self {
            enabled: debug || explicit.is_some(),
            level,
            format: lookup(LOG_FORMAT_ENV)
                .map(|f| LogFormat::parse(&f))
                .unwrap_or_default(),
        }
    }

    /// `EnvFilter` directive scoping the level to Keyward's crates.
    pub fn filter_directive(&self) -> String {
        LOG_TARGETS
            .iter()
            .map(|target| format!("{}={}", target, self.level))
            .collect::<Vec<_>>()
            .join(",")
    }

    fn level_is_debug_or_lower(&self) -> bool {
        self.enabled && matches!(self.level, "debug" | "trace")
    }
}

/// Check if debug-level logging is enabled by the environment.
#[inline]
pub fn is_debug_enabled() -> bool {
    LogSettings::from_env().level_is_debug_or_lower()
}

/// Install the global subscriber. Subsequent calls are no-ops.
///
/// Does nothing unless `KEYWARD_DEBUG` or `KEYWARD_LOG_LEVEL` is set, or when
/// the `tracing-subscriber` feature is disabled.
pub fn init() {
    INIT.call_once(|| {
        let settings = LogSettings::from_env();
        if !settings.enabled {
            return;
        }

        #[cfg(feature = "tracing-subscriber")]
        {
            use tracing_subscriber::{EnvFilter, fmt, prelude::*};

            let filter = EnvFilter::try_new(settings.filter_directive())
                .unwrap_or_else(|_| EnvFilter::new("warn"));

            let registry = tracing_subscriber::registry().with(filter);
            let installed = match settings.format {
                LogFormat::Json => registry.with(fmt::layer().json()).try_init(),
                LogFormat::Compact => registry.with(fmt::layer().compact()).try_init(),
                LogFormat::Pretty => registry.with(fmt::layer().pretty()).try_init(),
            };

            if installed.is_ok() {
                tracing::info!(
                    level = settings.level,
                    format = settings.format.as_str(),
                    "Keyward logging initialized"
                );
            }
        }
    });
}
