//! Console settings.
//!
//! Settings are layered with the `config` crate, lowest priority first:
//!
//! 1. built-in defaults ([`Settings::default`])
//! 2. an optional TOML file (`--config`)
//! 3. environment variables prefixed `LB_CONSOLE_`, with `__` between nested
//!    keys (e.g. `LB_CONSOLE_THRESHOLDS__LATENCY_WARNING=300ms`)
//! 4. command-line flags
//!
//! ```toml
//! base_url = "http://localhost:8000"
//! stale_after = "4s"
//! reconnect_delays = ["500ms", "1s", "2s", "5s"]
//! window = "120s"
//!
//! [thresholds]
//! latency_warning = "250ms"
//! failure_critical_pct = 20.0
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};

use crate::data::duration::parse_duration;
use crate::data::Thresholds;
use crate::error::ConfigError;
use crate::source::{ReconnectSchedule, MIN_WATCHDOG_PERIOD};

/// Environment variable prefix.
pub const ENV_PREFIX: &str = "LB_CONSOLE";

/// Raw settings as written in files and environment variables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// HTTP base URL of the load balancer.
    pub base_url: String,
    pub stream_path: String,
    pub state_path: String,
    /// Close the push connection after this long without a frame.
    pub stale_after: String,
    pub poll_interval: String,
    pub request_timeout: String,
    pub reconnect_delays: Vec<String>,
    /// Trailing chart window.
    pub window: String,
    /// UI redraw and poll tick.
    pub refresh: String,
    /// Where the `e` key writes exports.
    pub export_path: String,
    pub thresholds: ThresholdSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            stream_path: "/stream".to_string(),
            state_path: "/state".to_string(),
            stale_after: "4s".to_string(),
            poll_interval: "1s".to_string(),
            request_timeout: "2s".to_string(),
            reconnect_delays: vec![
                "500ms".to_string(),
                "1s".to_string(),
                "2s".to_string(),
                "5s".to_string(),
            ],
            window: "120s".to_string(),
            refresh: "100ms".to_string(),
            export_path: "lb_console_export.json".to_string(),
            thresholds: ThresholdSettings::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdSettings {
    pub latency_warning: String,
    pub latency_critical: String,
    pub failure_warning_pct: f64,
    pub failure_critical_pct: f64,
}

impl Default for ThresholdSettings {
    fn default() -> Self {
        Self {
            latency_warning: "250ms".to_string(),
            latency_critical: "1s".to_string(),
            failure_warning_pct: 5.0,
            failure_critical_pct: 20.0,
        }
    }
}

/// Validated settings, ready to build the console from.
#[derive(Debug, Clone, PartialEq)]
pub struct ConsoleConfig {
    pub stream_url: String,
    pub state_url: String,
    pub stale_after: Duration,
    pub poll_interval: Duration,
    pub request_timeout: Duration,
    pub reconnect: ReconnectSchedule,
    pub window_ms: u64,
    pub refresh: Duration,
    pub export_path: PathBuf,
    pub thresholds: Thresholds,
}

/// `LB_CONSOLE_*` variables. List parsing only happens with `try_parsing`.
fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
        .list_separator(",")
        .with_list_parse_key("reconnect_delays")
}

impl Settings {
    /// Load settings from every layer.
    ///
    /// `overrides` are `(key, value)` pairs from the command line, using the
    /// same dotted keys as the file (e.g. `thresholds.latency_warning`).
    pub fn load(path: Option<&Path>, overrides: &[(&str, String)]) -> Result<Self> {
        Self::load_with_env(path, overrides, environment())
    }

    fn load_with_env(
        path: Option<&Path>,
        overrides: &[(&str, String)],
        env: Environment,
    ) -> Result<Self> {
        let mut builder = Config::builder().add_source(Config::try_from(&Settings::default())?);

        if let Some(path) = path {
            builder = builder.add_source(File::from(path).format(FileFormat::Toml).required(true));
        }

        builder = builder.add_source(env);

        for (key, value) in overrides {
            builder = builder.set_override(*key, value.as_str())?;
        }

        let settings = builder
            .build()
            .context("Failed to load settings")?
            .try_deserialize::<Settings>()
            .context("Invalid settings")?;
        Ok(settings)
    }

    /// Validate and convert to a [`ConsoleConfig`].
    pub fn resolve(&self) -> Result<ConsoleConfig, ConfigError> {
        let base = self.base_url.trim_end_matches('/');
        let stream_base = if let Some(rest) = base.strip_prefix("https://") {
            format!("wss://{}", rest)
        } else if let Some(rest) = base.strip_prefix("http://") {
            format!("ws://{}", rest)
        } else {
            return Err(ConfigError::BaseUrl(self.base_url.clone()));
        };

        let stale_after = parse_duration(&self.stale_after)?;
        if stale_after < MIN_WATCHDOG_PERIOD {
            return Err(ConfigError::StaleTooShort);
        }
        let poll_interval = positive("poll_interval", &self.poll_interval)?;
        let request_timeout = positive("request_timeout", &self.request_timeout)?;
        let window = positive("window", &self.window)?;
        let refresh = positive("refresh", &self.refresh)?;

        let delays = self
            .reconnect_delays
            .iter()
            .map(|d| parse_duration(d))
            .collect::<Result<Vec<_>, _>>()?;
        let reconnect = ReconnectSchedule::new(delays)?;

        let thresholds = self.thresholds.resolve()?;

        Ok(ConsoleConfig {
            stream_url: format!("{}{}", stream_base, self.stream_path),
            state_url: format!("{}{}", base, self.state_path),
            stale_after,
            poll_interval,
            request_timeout,
            reconnect,
            window_ms: window.as_millis() as u64,
            refresh,
            export_path: PathBuf::from(&self.export_path),
            thresholds,
        })
    }
}

impl ThresholdSettings {
    fn resolve(&self) -> Result<Thresholds, ConfigError> {
        let latency_warning = parse_duration(&self.latency_warning)?;
        let latency_critical = parse_duration(&self.latency_critical)?;
        if latency_warning > latency_critical {
            return Err(ConfigError::ThresholdOrder { name: "latency" });
        }
        if self.failure_warning_pct > self.failure_critical_pct {
            return Err(ConfigError::ThresholdOrder { name: "failure" });
        }
        Ok(Thresholds {
            latency_warning,
            latency_critical,
            failure_warning_pct: self.failure_warning_pct,
            failure_critical_pct: self.failure_critical_pct,
        })
    }
}

fn positive(name: &'static str, value: &str) -> Result<Duration, ConfigError> {
    let duration = parse_duration(value)?;
    if duration.is_zero() {
        return Err(ConfigError::NotPositive(name));
    }
    Ok(duration)
}
