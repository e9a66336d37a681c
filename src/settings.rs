//! Layered settings.
//!
//! Built-in defaults, then an optional TOML file, then `DEPVIZ_*`
//! environment variables (`__` separates nested keys, e.g.
//! `DEPVIZ_LAYOUT__POLICY=topology`), then command line flags.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;

use crate::data::duration::parse_duration;
use crate::engine::{LayoutAlgorithm, LayoutDirective, LayoutPolicy};

pub const ENV_PREFIX: &str = "DEPVIZ";

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Observation window in seconds.
    pub window_sec: u64,
    /// Poll interval, e.g. "2s".
    pub refresh: String,
    /// Delay before a push transport reconnects.
    pub reconnect_backoff: String,
    pub layout: LayoutSettings,
    pub log: LogSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LayoutSettings {
    pub policy: LayoutPolicy,
    pub algorithm: LayoutAlgorithm,
    pub directed: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogSettings {
    pub level: String,
    pub file: PathBuf,
}

/// Values given on the command line.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub window_sec: Option<u64>,
    pub refresh: Option<String>,
    pub log_level: Option<String>,
    pub log_file: Option<PathBuf>,
}

impl Settings {
    /// Load settings from every layer.
    pub fn load(config_path: Option<&Path>, overrides: &Overrides) -> Result<Self> {
        Self::load_with_env(config_path, overrides, Environment::with_prefix(ENV_PREFIX))
    }

    fn load_with_env(
        config_path: Option<&Path>,
        overrides: &Overrides,
        env: Environment,
    ) -> Result<Self> {
        let mut builder = Config::builder()
            .set_default("window_sec", 60_i64)?
            .set_default("refresh", "2s")?
            .set_default("reconnect_backoff", "3s")?
            .set_default("layout.policy", "cardinality")?
            .set_default("layout.algorithm", "breadthfirst")?
            .set_default("layout.directed", true)?
            .set_default("log.level", "info")?
            .set_default("log.file", "depviz.log")?;

        if let Some(path) = config_path {
            builder = builder.add_source(File::from(path));
        }

        let config = builder
            .add_source(env.prefix_separator("_").separator("__").try_parsing(true))
            .set_override_option("window_sec", overrides.window_sec.map(|w| w as i64))?
            .set_override_option("refresh", overrides.refresh.clone())?
            .set_override_option("log.level", overrides.log_level.clone())?
            .set_override_option(
                "log.file",
                overrides.log_file.as_ref().map(|p| p.to_string_lossy().into_owned()),
            )?
            .build()
            .context("failed to load settings")?;

        let settings: Settings = config.try_deserialize().context("invalid settings")?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<()> {
        if self.window_sec == 0 {
            anyhow::bail!("window_sec must be at least 1");
        }
        self.refresh_interval()?;
        self.reconnect_backoff()?;
        Ok(())
    }

    pub fn refresh_interval(&self) -> Result<Duration> {
        parse_duration(&self.refresh).with_context(|| format!("invalid refresh '{}'", self.refresh))
    }

    pub fn reconnect_backoff(&self) -> Result<Duration> {
        parse_duration(&self.reconnect_backoff)
            .with_context(|| format!("invalid reconnect_backoff '{}'", self.reconnect_backoff))
    }

    pub fn layout_directive(&self) -> LayoutDirective {
        LayoutDirective {
            algorithm: self.layout.algorithm,
            directed: self.layout.directed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn env(vars: &[(&str, &str)]) -> Environment {
        let map = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Environment::with_prefix(ENV_PREFIX).source(Some(map))
    }

    #[test]
    fn test_defaults() {
        let settings = Settings::load_with_env(None, &Overrides::default(), env(&[])).unwrap();
        assert_eq!(settings.window_sec, 60);
        assert_eq!(settings.refresh_interval().unwrap(), Duration::from_secs(2));
        assert_eq!(settings.reconnect_backoff().unwrap(), Duration::from_secs(3));
        assert_eq!(settings.layout.policy, LayoutPolicy::Cardinality);
        assert_eq!(settings.layout_directive(), LayoutDirective::default());
        assert_eq!(settings.log.level, "info");
        assert_eq!(settings.log.file, PathBuf::from("depviz.log"));
    }

    #[test]
    fn test_layers_apply_in_order() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "window_sec = 300\nrefresh = \"5s\"\n\n[layout]\npolicy = \"topology\"\nalgorithm = \"grid\""
        )
        .unwrap();

        let overrides = Overrides {
            refresh: Some("1s".to_string()),
            ..Default::default()
        };
        let settings = Settings::load_with_env(
            Some(file.path()),
            &overrides,
            env(&[("DEPVIZ_WINDOW_SEC", "900"), ("DEPVIZ_LOG__LEVEL", "debug")]),
        )
        .unwrap();

        assert_eq!(settings.window_sec, 900);
        assert_eq!(settings.refresh_interval().unwrap(), Duration::from_secs(1));
        assert_eq!(settings.layout.policy, LayoutPolicy::Topology);
        assert_eq!(settings.layout.algorithm, LayoutAlgorithm::Grid);
        assert!(settings.layout.directed);
        assert_eq!(settings.log.level, "debug");
    }

    #[test]
    fn test_rejects_bad_durations() {
        let overrides = Overrides {
            refresh: Some("often".to_string()),
            ..Default::default()
        };
        assert!(Settings::load_with_env(None, &overrides, env(&[])).is_err());
    }

    #[test]
    fn test_rejects_zero_window() {
        let overrides = Overrides {
            window_sec: Some(0),
            ..Default::default()
        };
        assert!(Settings::load_with_env(None, &overrides, env(&[])).is_err());
    }
}
