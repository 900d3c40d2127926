//! Simulator configuration.
//!
//! Read from a TOML file whose relative paths resolve against the file's
//! own directory, then overridden from the environment:
//!
//! | Variable | Field |
//! | --- | --- |
//! | `URBAN_SIM_SNAPSHOT` | `snapshot_path` |
//! | `URBAN_SIM_MODEL` | `model_path` |
//! | `URBAN_SIM_FEATURE_PARAMS` | `feature_params_path` |
//! | `URBAN_SIM_CLAMP_BOUND` | `clamp_bound` |

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::SimulationError;
use crate::formatter::DEFAULT_CLAMP_BOUND;

const SNAPSHOT_VAR: &str = "URBAN_SIM_SNAPSHOT";
const MODEL_VAR: &str = "URBAN_SIM_MODEL";
const FEATURE_PARAMS_VAR: &str = "URBAN_SIM_FEATURE_PARAMS";
const CLAMP_BOUND_VAR: &str = "URBAN_SIM_CLAMP_BOUND";

const fn default_clamp_bound() -> f64 {
    DEFAULT_CLAMP_BOUND
}

/// Paths to the three persisted artifacts plus tuning knobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SimulationConfig {
    /// Ward registry snapshot (JSON).
    pub snapshot_path: PathBuf,
    /// Model artifact (JSON).
    pub model_path: PathBuf,
    /// Feature normalization and encoding parameters (TOML).
    pub feature_params_path: PathBuf,
    /// Largest absolute relative change reported before clamping.
    #[serde(default = "default_clamp_bound")]
    pub clamp_bound: f64,
}

impl SimulationConfig {
    /// Reads `path` and applies environment overrides.
    ///
    /// # Errors
    ///
    /// Returns [`SimulationError::Config`] if the file cannot be read or
    /// parsed, or an override is malformed.
    pub fn load(path: &Path) -> Result<Self, SimulationError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| SimulationError::Config(format!("{}: {e}", path.display())))?;
        let base_dir = path.parent().unwrap_or_else(|| Path::new(""));
        Self::from_toml(&contents, base_dir)?.with_overrides(|name| std::env::var(name).ok())
    }

    /// Builds a configuration purely from the environment.
    ///
    /// # Errors
    ///
    /// Returns [`SimulationError::Config`] if any of the path variables is
    /// unset or the clamp bound is malformed.
    pub fn from_env() -> Result<Self, SimulationError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Parses TOML, resolving relative paths against `base_dir`.
    ///
    /// # Errors
    ///
    /// Returns [`SimulationError::Config`] if the TOML is invalid.
    pub fn from_toml(contents: &str, base_dir: &Path) -> Result<Self, SimulationError> {
        let mut config: Self =
            toml::from_str(contents).map_err(|e| SimulationError::Config(e.to_string()))?;
        for path in [
            &mut config.snapshot_path,
            &mut config.model_path,
            &mut config.feature_params_path,
        ] {
            if path.is_relative() {
                *path = base_dir.join(&*path);
            }
        }
        Ok(config)
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, SimulationError> {
        let required = |name: &str| {
            lookup(name)
                .map(PathBuf::from)
                .ok_or_else(|| SimulationError::Config(format!("{name} is not set")))
        };
        let config = Self {
            snapshot_path: required(SNAPSHOT_VAR)?,
            model_path: required(MODEL_VAR)?,
            feature_params_path: required(FEATURE_PARAMS_VAR)?,
            clamp_bound: DEFAULT_CLAMP_BOUND,
        };
        config.with_overrides(lookup)
    }

    fn with_overrides(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, SimulationError> {
        if let Some(path) = lookup(SNAPSHOT_VAR) {
            self.snapshot_path = path.into();
        }
        if let Some(path) = lookup(MODEL_VAR) {
            self.model_path = path.into();
        }
        if let Some(path) = lookup(FEATURE_PARAMS_VAR) {
            self.feature_params_path = path.into();
        }
        if let Some(bound) = lookup(CLAMP_BOUND_VAR) {
            self.clamp_bound = bound.trim().parse().map_err(|_| {
                SimulationError::Config(format!("{CLAMP_BOUND_VAR}={bound} is not a number"))
            })?;
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: BTreeMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    const CONFIG: &str = r#"
        snapshot_path = "data/wards.json"
        model_path = "/opt/models/impact.json"
        feature_params_path = "data/features.toml"
    "#;

    #[test]
    fn resolves_relative_paths_and_defaults_bound() {
        let config = SimulationConfig::from_toml(CONFIG, Path::new("/srv/sim")).unwrap();
        assert_eq!(config.snapshot_path, PathBuf::from("/srv/sim/data/wards.json"));
        assert_eq!(config.model_path, PathBuf::from("/opt/models/impact.json"));
        assert!((config.clamp_bound - DEFAULT_CLAMP_BOUND).abs() < f64::EPSILON);
    }

    #[test]
    fn environment_overrides_file() {
        let config = SimulationConfig::from_toml(CONFIG, Path::new("/srv/sim"))
            .unwrap()
            .with_overrides(env(&[
                (MODEL_VAR, "/tmp/other.json"),
                (CLAMP_BOUND_VAR, "0.5"),
            ]))
            .unwrap();
        assert_eq!(config.model_path, PathBuf::from("/tmp/other.json"));
        assert_eq!(config.snapshot_path, PathBuf::from("/srv/sim/data/wards.json"));
        assert!((config.clamp_bound - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn malformed_bound_is_config_error() {
        let result = SimulationConfig::from_toml(CONFIG, Path::new(""))
            .unwrap()
            .with_overrides(env(&[(CLAMP_BOUND_VAR, "lots")]));
        assert!(matches!(result, Err(SimulationError::Config(_))));
    }

    #[test]
    fn env_only_requires_every_path() {
        let partial = SimulationConfig::from_lookup(env(&[(SNAPSHOT_VAR, "w.json")]));
        assert!(matches!(partial, Err(SimulationError::Config(m)) if m.contains(MODEL_VAR)));

        let full = SimulationConfig::from_lookup(env(&[
            (SNAPSHOT_VAR, "w.json"),
            (MODEL_VAR, "m.json"),
            (FEATURE_PARAMS_VAR, "f.toml"),
        ]))
        .unwrap();
        assert_eq!(full.feature_params_path, PathBuf::from("f.toml"));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let toml = format!("{CONFIG}\nport = 8080\n");
        assert!(SimulationConfig::from_toml(&toml, Path::new("")).is_err());
    }
}
