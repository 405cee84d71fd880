//! Checked analysis settings.
//!
//! Every setter validates its range and returns the settings back for
//! chaining, so a configuration error surfaces where the value was
//! given rather than deep inside an analysis.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Quantification shortcut for the top-event probability.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Approximation {
    /// Truncated inclusion-exclusion series.
    #[default]
    None,
    /// Sum of cut-set probabilities; an upper bound, exact to O(p^2).
    RareEvent,
    /// Min-cut upper bound: `1 - prod(1 - P(M))`.
    Mcub,
}

impl std::str::FromStr for Approximation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(Approximation::None),
            "rare-event" => Ok(Approximation::RareEvent),
            "mcub" => Ok(Approximation::Mcub),
            _ => Err(format!("unknown approximation: {}", s)),
        }
    }
}

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("limit on cut set order must be at least 1, got {0}")]
    LimitOrder(i64),
    #[error("cut-off probability {0} is outside [0, 1]")]
    CutOff(f64),
    #[error("number of series sums must be at least 1, got {0}")]
    NumSums(i64),
    #[error("mission time must be positive, got {0}")]
    MissionTime(f64),
    #[error("number of trials must be at least 1, got {0}")]
    NumTrials(i64),
}

/// All knobs of one analysis run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct Settings {
    /// Maximum cut set cardinality.
    pub limit_order: usize,
    /// Cut sets below this probability are dropped from quantification.
    pub cut_off: f64,
    /// Truncation depth of the inclusion-exclusion series.
    pub num_sums: usize,
    pub approximation: Approximation,
    /// Time horizon in hours for rate-to-probability conversion.
    pub mission_time: f64,
    /// Monte Carlo sample size.
    pub num_trials: usize,
    pub seed: u64,
    pub probability_analysis: bool,
    pub importance_analysis: bool,
    pub uncertainty_analysis: bool,
    pub ccf_analysis: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            limit_order: 20,
            cut_off: 1e-8,
            num_sums: 7,
            approximation: Approximation::None,
            mission_time: 8760.0,
            num_trials: 1000,
            seed: 0,
            probability_analysis: false,
            importance_analysis: false,
            uncertainty_analysis: false,
            ccf_analysis: false,
        }
    }
}

impl Settings {
    pub fn limit_order(mut self, value: i64) -> Result<Self, SettingsError> {
        if value < 1 {
            return Err(SettingsError::LimitOrder(value));
        }
        self.limit_order = value as usize;
        Ok(self)
    }

    pub fn cut_off(mut self, value: f64) -> Result<Self, SettingsError> {
        if !(0.0..=1.0).contains(&value) {
            return Err(SettingsError::CutOff(value));
        }
        self.cut_off = value;
        Ok(self)
    }

    pub fn num_sums(mut self, value: i64) -> Result<Self, SettingsError> {
        if value < 1 {
            return Err(SettingsError::NumSums(value));
        }
        self.num_sums = value as usize;
        Ok(self)
    }

    pub fn mission_time(mut self, value: f64) -> Result<Self, SettingsError> {
        if value <= 0.0 || !value.is_finite() {
            return Err(SettingsError::MissionTime(value));
        }
        self.mission_time = value;
        Ok(self)
    }

    pub fn num_trials(mut self, value: i64) -> Result<Self, SettingsError> {
        if value < 1 {
            return Err(SettingsError::NumTrials(value));
        }
        self.num_trials = value as usize;
        Ok(self)
    }

    pub fn approximation(mut self, value: Approximation) -> Self {
        self.approximation = value;
        self
    }

    pub fn seed(mut self, value: u64) -> Self {
        self.seed = value;
        self
    }

    pub fn probability(mut self, flag: bool) -> Self {
        self.probability_analysis = flag;
        self
    }

    pub fn importance(mut self, flag: bool) -> Self {
        self.importance_analysis = flag;
        // Importance numbers are ratios over the total probability.
        if flag {
            self.probability_analysis = true;
        }
        self
    }

    pub fn uncertainty(mut self, flag: bool) -> Self {
        self.uncertainty_analysis = flag;
        if flag {
            self.probability_analysis = true;
        }
        self
    }

    pub fn ccf(mut self, flag: bool) -> Self {
        self.ccf_analysis = flag;
        self
    }

    /// The series depth actually used: the rare-event approximation is
    /// a one-term series.
    pub fn effective_num_sums(&self) -> usize {
        match self.approximation {
            Approximation::RareEvent => 1,
            _ => self.num_sums,
        }
    }
}
