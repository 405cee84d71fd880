//! Basic and house events.
//!
//! A basic event is a leaf of the fault tree carrying a likelihood of
//! failure: either a point probability, or a failure rate that is
//! converted to a probability over the mission time. An event may also
//! name an uncertainty distribution; sampling then draws a fresh
//! probability and caches it until [`BasicEvent::reset`].

use serde::{Deserialize, Serialize};

use crate::{ModelError, ModelResult};

/// Named parametric uncertainty distribution for a basic event.
///
/// Parameters are taken at face value here; the sampler owns the
/// drawing logic and the caller owns parameter validity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Uncertainty {
    Uniform { min: f64, max: f64 },
    Triangular { lower: f64, mode: f64, upper: f64 },
    Normal { mean: f64, sigma: f64 },
    /// Parameters of the underlying normal in log space.
    Lognormal { mu: f64, sigma: f64 },
    Gamma { shape: f64, scale: f64 },
    Beta { alpha: f64, beta: f64 },
    Weibull { shape: f64, scale: f64 },
    Exponential { rate: f64 },
    Poisson { mean: f64 },
    /// Uniform within an interval chosen by weight.
    /// `weights.len()` must be `intervals.len() - 1`.
    Histogram { intervals: Vec<f64>, weights: Vec<f64> },
    /// Linear density between interval points.
    /// `weights.len()` must equal `intervals.len()`.
    PiecewiseLinear { intervals: Vec<f64>, weights: Vec<f64> },
    /// One of `values` with probability proportional to its weight.
    Discrete { values: Vec<f64>, weights: Vec<f64> },
}

/// A fault-tree leaf with a failure likelihood.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BasicEvent {
    /// Unique identifier within a model.
    pub name: String,
    /// Point failure probability. Mutually exclusive with `rate`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub probability: Option<f64>,
    /// Failure rate per hour, converted over the mission time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate: Option<f64>,
    /// Optional uncertainty distribution for Monte Carlo sampling.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uncertainty: Option<Uncertainty>,
    /// Last sampled probability, kept until `reset`.
    #[serde(skip)]
    sampled: Option<f64>,
}

impl BasicEvent {
    /// Creates an event with a point probability.
    pub fn with_probability(name: &str, probability: f64) -> Self {
        Self {
            name: name.to_string(),
            probability: Some(probability),
            rate: None,
            uncertainty: None,
            sampled: None,
        }
    }

    /// Creates an event with a failure rate per hour.
    pub fn with_rate(name: &str, rate: f64) -> Self {
        Self {
            name: name.to_string(),
            probability: None,
            rate: Some(rate),
            uncertainty: None,
            sampled: None,
        }
    }

    /// Attaches an uncertainty distribution.
    pub fn uncertain(mut self, uncertainty: Uncertainty) -> Self {
        self.uncertainty = Some(uncertainty);
        self
    }

    /// True when the event has no distribution to sample from.
    pub fn is_constant(&self) -> bool {
        self.uncertainty.is_none()
    }

    /// Nominal failure probability over the given mission time.
    ///
    /// Rate-specified events convert as `1 - exp(-rate * time)`.
    pub fn nominal_probability(&self, mission_time: f64) -> ModelResult<f64> {
        match (self.probability, self.rate) {
            (Some(p), None) => {
                if !(0.0..=1.0).contains(&p) {
                    return Err(ModelError::ProbabilityRange(self.name.clone(), p));
                }
                Ok(p)
            }
            (None, Some(lambda)) => {
                if lambda < 0.0 {
                    return Err(ModelError::NegativeRate(self.name.clone(), lambda));
                }
                Ok(1.0 - (-lambda * mission_time).exp())
            }
            _ => Err(ModelError::AmbiguousLikelihood(self.name.clone())),
        }
    }

    /// Returns the cached sample, if a trial is in progress.
    pub fn sampled(&self) -> Option<f64> {
        self.sampled
    }

    /// Caches a sampled probability until `reset`. The value is clamped
    /// into [0, 1]; unbounded distributions can overshoot the unit
    /// interval.
    pub fn cache_sample(&mut self, value: f64) -> f64 {
        let clamped = value.clamp(0.0, 1.0);
        self.sampled = Some(clamped);
        clamped
    }

    /// Discards the cached sample.
    pub fn reset(&mut self) {
        self.sampled = None;
    }
}

/// An event fixed to a Boolean constant; substituted away during
/// preprocessing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HouseEvent {
    pub name: String,
    pub state: bool,
}

impl HouseEvent {
    pub fn new(name: &str, state: bool) -> Self {
        Self {
            name: name.to_string(),
            state,
        }
    }
}
