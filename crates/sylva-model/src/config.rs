//! Project file support.
//!
//! A project file names the model input files, an optional output path,
//! and the analysis options. YAML and JSON are accepted, dispatched by
//! file extension.
//!
//! # Example YAML project:
//! ```yaml
//! input-files:
//!   - models/two-pumps.yaml
//! output-path: results.txt
//! options:
//!   analysis:
//!     probability: true
//!     importance: "1"
//!   approximations: rare-event
//!   limits:
//!     limit-order: 6
//!     cut-off: 1.0e-10
//!     number-of-sums: 7
//!     mission-time: 8760
//!     number-of-trials: 10000
//!     seed: 42
//! ```

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::settings::{Approximation, Settings, SettingsError};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot read {0}: {1}")]
    Io(String, #[source] std::io::Error),
    #[error("project file parse error: {0}")]
    Parse(String),
    #[error(transparent)]
    Settings(#[from] SettingsError),
}

/// Boolean attributes accept `1|true|0|false`, as bare values or
/// strings.
fn flag<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<bool>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Bool(bool),
        Int(u64),
        Text(String),
    }
    match Option::<Raw>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Raw::Bool(b)) => Ok(Some(b)),
        Some(Raw::Int(0)) => Ok(Some(false)),
        Some(Raw::Int(1)) => Ok(Some(true)),
        Some(Raw::Int(other)) => Err(de::Error::custom(format!("invalid flag: {}", other))),
        Some(Raw::Text(s)) => match s.as_str() {
            "1" | "true" => Ok(Some(true)),
            "0" | "false" => Ok(Some(false)),
            other => Err(de::Error::custom(format!("invalid flag: {:?}", other))),
        },
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct AnalysisToggles {
    #[serde(deserialize_with = "flag")]
    pub probability: Option<bool>,
    #[serde(deserialize_with = "flag")]
    pub importance: Option<bool>,
    #[serde(deserialize_with = "flag")]
    pub uncertainty: Option<bool>,
    #[serde(deserialize_with = "flag")]
    pub ccf: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct Limits {
    pub limit_order: Option<i64>,
    pub cut_off: Option<f64>,
    pub number_of_sums: Option<i64>,
    pub mission_time: Option<f64>,
    pub number_of_trials: Option<i64>,
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct Options {
    pub analysis: AnalysisToggles,
    pub approximations: Option<Approximation>,
    pub limits: Limits,
}

/// One analysis project: inputs, output, and options.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct Project {
    pub input_files: Vec<PathBuf>,
    pub output_path: Option<PathBuf>,
    pub options: Options,
}

impl Project {
    /// Loads a project file, dispatching on the extension and falling
    /// back to trying both formats.
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.display().to_string(), e))?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => Self::from_yaml(&content),
            Some("json") => Self::from_json(&content),
            _ => Self::from_yaml(&content).or_else(|_| Self::from_json(&content)),
        }
    }

    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Applies the option blocks on top of the given settings.
    pub fn apply(&self, mut settings: Settings) -> Result<Settings, ConfigError> {
        let limits = &self.options.limits;
        if let Some(value) = limits.limit_order {
            settings = settings.limit_order(value)?;
        }
        if let Some(value) = limits.cut_off {
            settings = settings.cut_off(value)?;
        }
        if let Some(value) = limits.number_of_sums {
            settings = settings.num_sums(value)?;
        }
        if let Some(value) = limits.mission_time {
            settings = settings.mission_time(value)?;
        }
        if let Some(value) = limits.number_of_trials {
            settings = settings.num_trials(value)?;
        }
        if let Some(value) = limits.seed {
            settings = settings.seed(value);
        }
        if let Some(approximation) = self.options.approximations {
            settings = settings.approximation(approximation);
        }
        let toggles = &self.options.analysis;
        if let Some(fl) = toggles.probability {
            settings = settings.probability(fl);
        }
        if let Some(fl) = toggles.importance {
            settings = settings.importance(fl);
        }
        if let Some(fl) = toggles.uncertainty {
            settings = settings.uncertainty(fl);
        }
        if let Some(fl) = toggles.ccf {
            settings = settings.ccf(fl);
        }
        Ok(settings)
    }
}
