//! Loader for the Cadence behavior configuration with YAML + environment
//! overlays.
//!
//! The on-disk document is a `cadence.yaml` whose `behavior` section maps onto
//! [`cadence_common::BehaviorConfig`]. Environment variables prefixed with
//! `CADENCE__` override file values, and `${VAR}` placeholders inside string
//! values are expanded before the typed config materialises. An unreadable or
//! malformed document never aborts startup: [`CadenceConfigLoader::load_or_default`]
//! logs the failure and substitutes defaults.
use cadence_common::BehaviorConfig;
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use serde_json::Value;
use std::path::Path;
use tracing::warn;

const MAXIMUM_ENV_EXPANSION_DEPTH: usize = 8;

/// Top-level configuration document.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CadenceConfig {
    pub version: Option<String>,
    pub behavior: BehaviorConfig,
}

fn expand_env_in_value(v: &mut Value) {
    match v {
        Value::String(s) => {
            if s.contains('$') {
                let mut cur = std::mem::take(s);
                // Re-expand until a fixed point so env values may themselves
                // reference other variables; the depth cap breaks cycles.
                for _ in 0..MAXIMUM_ENV_EXPANSION_DEPTH {
                    let expanded = match shellexpand::env(&cur) {
                        Ok(cow) => cow.into_owned(),
                        Err(_) => cur.clone(),
                    };
                    if expanded == cur {
                        break;
                    }
                    cur = expanded;
                }
                *s = cur;
            }
        }
        Value::Array(arr) => arr.iter_mut().for_each(expand_env_in_value),
        Value::Object(obj) => obj.values_mut().for_each(expand_env_in_value),
        _ => {}
    }
}

/// Builder hiding the `config` crate wiring (YAML file + env overrides).
pub struct CadenceConfigLoader {
    builder: config::ConfigBuilder<config::builder::DefaultState>,
}

impl Default for CadenceConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl CadenceConfigLoader {
    /// Start with the default sources: `CADENCE__`-prefixed env overrides.
    ///
    /// ```
    /// use cadence_config::CadenceConfigLoader;
    ///
    /// let config = CadenceConfigLoader::new()
    ///     .with_yaml_str("version: '1'\nbehavior:\n  enabled: false")
    ///     .load()
    ///     .expect("valid config");
    ///
    /// assert_eq!(config.version.as_deref(), Some("1"));
    /// assert!(!config.behavior.enabled);
    /// ```
    pub fn new() -> Self {
        let builder =
            Config::builder().add_source(Environment::with_prefix("CADENCE").separator("__"));
        Self { builder }
    }

    /// Attach a config file; the `config` crate infers the format by suffix.
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.builder = self
            .builder
            .add_source(File::from(path.as_ref()).required(true));
        self
    }

    /// Allow tests and the CLI to merge inline YAML snippets.
    ///
    /// ```
    /// use cadence_config::CadenceConfigLoader;
    ///
    /// let cfg = CadenceConfigLoader::new()
    ///     .with_yaml_str(
    ///         r#"
    /// behavior:
    ///   break_policy:
    ///     min_actions: 5
    ///     max_actions: 9
    /// "#,
    ///     )
    ///     .load()
    ///     .unwrap();
    ///
    /// assert_eq!(cfg.behavior.break_policy.min_actions, 5);
    /// assert_eq!(cfg.behavior.break_policy.max_actions, 9);
    /// // Unlisted keys fall back to defaults.
    /// assert!(cfg.behavior.humanize_actions);
    /// ```
    pub fn with_yaml_str(mut self, yaml: &str) -> Self {
        self.builder = self
            .builder
            .add_source(File::from_str(yaml, config::FileFormat::Yaml));
        self
    }

    /// Consume the builder and deserialize the merged sources.
    ///
    /// `${VAR}` placeholders are expanded against the process environment
    /// before the strongly typed config is produced.
    pub fn load(self) -> Result<CadenceConfig, ConfigError> {
        let cfg = self.builder.build()?;

        let mut v: Value = cfg.try_deserialize()?;
        expand_env_in_value(&mut v);

        let typed: CadenceConfig =
            serde_json::from_value(v).map_err(|e| ConfigError::Message(e.to_string()))?;

        Ok(typed)
    }

    /// Like [`load`](Self::load), but unreadable or malformed sources fall
    /// back to [`CadenceConfig::default`] instead of failing startup.
    pub fn load_or_default(self) -> CadenceConfig {
        match self.load() {
            Ok(cfg) => cfg,
            Err(e) => {
                warn!(target: "config", error = %e, "configuration unavailable; using defaults");
                CadenceConfig::default()
            }
        }
    }
}
