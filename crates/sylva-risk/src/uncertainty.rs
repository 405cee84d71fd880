//! Monte Carlo uncertainty propagation.
//!
//! The probability engine's series expansion is evaluated once per
//! trial under resampled basic-event probabilities. Events without a
//! distribution contribute fixed factors that are pulled out of the
//! terms before the trial loop, so each trial only re-multiplies the
//! variable factors. Statistics stream through an extended-P2
//! quantile estimator and accumulate into a density histogram.

use serde::Serialize;
use std::collections::BTreeSet;

use sylva_model::{BasicEvent, Uncertainty};

use crate::probability::{prob_and, ProbabilityAnalysis};
use crate::random::Random;
use crate::AnalysisResult;

const NUM_BINS: usize = 20;
const NUM_QUANTILES: usize = 20;

/// Distribution statistics of the sampled top-event probability.
#[derive(Debug, Clone, Serialize)]
pub struct UncertaintyResult {
    pub mean: f64,
    pub sigma: f64,
    /// 95% confidence interval on the mean.
    pub confidence_interval: (f64, f64),
    /// `(bin_midpoint, density)` pairs of the sample distribution.
    pub distribution: Vec<(f64, f64)>,
    /// Quantile values at `i / num_quantiles` for `i = 1..`.
    pub quantiles: Vec<f64>,
    pub warnings: Vec<String>,
}

/// Monte Carlo propagation over a quantified cut-set family.
pub struct UncertaintyAnalysis {
    analysis: ProbabilityAnalysis,
    num_trials: usize,
    num_sums: usize,
    random: Random,
    pos_terms: Vec<Vec<i32>>,
    neg_terms: Vec<Vec<i32>>,
    pos_const: Vec<f64>,
    neg_const: Vec<f64>,
    sampled_results: Vec<f64>,
}

impl UncertaintyAnalysis {
    /// Takes ownership of the indexed probability state; the sampler
    /// is seeded here and owned for the whole analysis.
    pub fn new(analysis: ProbabilityAnalysis, num_trials: usize, num_sums: usize, seed: u64) -> Self {
        Self {
            analysis,
            num_trials,
            num_sums,
            random: Random::new(seed),
            pos_terms: Vec::new(),
            neg_terms: Vec::new(),
            pos_const: Vec::new(),
            neg_const: Vec::new(),
            sampled_results: Vec::new(),
        }
    }

    pub fn analyze(mut self) -> AnalysisResult<UncertaintyResult> {
        // A unity family needs no sampling: failure is guaranteed.
        if self.analysis.num_prob_mcs() == 1 && self.analysis.mcs_event_indices().is_empty() {
            return Ok(UncertaintyResult {
                mean: 1.0,
                sigma: 0.0,
                confidence_interval: (1.0, 1.0),
                distribution: vec![(1.0, 1.0)],
                quantiles: vec![1.0; NUM_QUANTILES],
                warnings: vec!["uncertainty analysis of a unity cut set family".to_string()],
            });
        }

        self.analysis.expand_series(self.num_sums);
        let uncertain = self.filter_uncertain_events();
        self.sample(&uncertain)?;
        Ok(self.calculate_statistics())
    }

    /// Splits the cut-set events into constant and uncertain, and
    /// factors the constant products out of every term.
    fn filter_uncertain_events(&mut self) -> Vec<i32> {
        let mut constant: BTreeSet<i32> = BTreeSet::new();
        let mut uncertain = Vec::new();
        for index in self.analysis.mcs_event_indices() {
            if self.analysis.event_at(index).is_constant() {
                constant.insert(index);
            } else {
                uncertain.push(index);
            }
        }
        let iprobs = self.analysis.iprobs().to_vec();
        let factor_out = |terms: &[Vec<i32>], constants: &mut Vec<f64>| -> Vec<Vec<i32>> {
            terms
                .iter()
                .map(|term| {
                    let mut fixed = 1.0;
                    let variable: Vec<i32> = term
                        .iter()
                        .copied()
                        .filter(|&literal| {
                            if constant.contains(&literal.abs()) {
                                fixed *= if literal > 0 {
                                    iprobs[literal as usize]
                                } else {
                                    1.0 - iprobs[(-literal) as usize]
                                };
                                false
                            } else {
                                true
                            }
                        })
                        .collect();
                    constants.push(fixed);
                    variable
                })
                .collect()
        };
        self.pos_terms = factor_out(self.analysis.pos_terms(), &mut self.pos_const);
        self.neg_terms = factor_out(self.analysis.neg_terms(), &mut self.neg_const);
        uncertain
    }

    /// Runs the trials, overwriting the probabilities of uncertain
    /// events and re-evaluating the cached polynomial.
    fn sample(&mut self, uncertain: &[i32]) -> AnalysisResult<()> {
        self.sampled_results.reserve(self.num_trials);
        for _ in 0..self.num_trials {
            for &index in uncertain {
                self.analysis.event_at_mut(index).reset();
            }
            for &index in uncertain {
                let probability = {
                    let event = self.analysis.event_at_mut(index);
                    sample_probability(event, &mut self.random)
                };
                self.analysis.set_iprob(index, probability);
            }
            let iprobs = self.analysis.iprobs();
            let pos: f64 = self
                .pos_terms
                .iter()
                .zip(&self.pos_const)
                .map(|(term, fixed)| prob_and(term, iprobs) * fixed)
                .sum();
            let neg: f64 = self
                .neg_terms
                .iter()
                .zip(&self.neg_const)
                .map(|(term, fixed)| prob_and(term, iprobs) * fixed)
                .sum();
            self.sampled_results.push(pos - neg);
        }
        Ok(())
    }

    fn calculate_statistics(&self) -> UncertaintyResult {
        let n = self.sampled_results.len();
        let mut quantile_probabilities = Vec::with_capacity(NUM_QUANTILES);
        let delta = 1.0 / NUM_QUANTILES as f64;
        for i in 0..NUM_QUANTILES {
            quantile_probabilities.push(delta * (i + 1) as f64);
        }
        let mut estimators: Vec<P2Quantile> = quantile_probabilities
            .iter()
            .map(|&p| P2Quantile::new(p))
            .collect();
        for &value in &self.sampled_results {
            for estimator in &mut estimators {
                estimator.observe(value);
            }
        }
        let quantiles: Vec<f64> = estimators.iter().map(P2Quantile::value).collect();

        let mean = self.sampled_results.iter().sum::<f64>() / n as f64;
        let variance = if n > 1 {
            self.sampled_results
                .iter()
                .map(|x| (x - mean).powi(2))
                .sum::<f64>()
                / (n - 1) as f64
        } else {
            0.0
        };
        let sigma = variance.sqrt();
        let half_width = 1.96 * sigma / (n as f64).sqrt();

        UncertaintyResult {
            mean,
            sigma,
            confidence_interval: (mean - half_width, mean + half_width),
            distribution: density_histogram(&self.sampled_results, NUM_BINS),
            quantiles,
            warnings: Vec::new(),
        }
    }
}

/// Draws a probability for one basic event, honoring the sample cache.
fn sample_probability(event: &mut BasicEvent, random: &mut Random) -> f64 {
    if let Some(cached) = event.sampled() {
        return cached;
    }
    let value = match &event.uncertainty {
        None => return event.sampled().unwrap_or(0.0),
        Some(Uncertainty::Uniform { min, max }) => random.uniform(*min, *max),
        Some(Uncertainty::Triangular { lower, mode, upper }) => {
            random.triangular(*lower, *mode, *upper)
        }
        Some(Uncertainty::Normal { mean, sigma }) => random.normal(*mean, *sigma),
        Some(Uncertainty::Lognormal { mu, sigma }) => random.lognormal(*mu, *sigma),
        Some(Uncertainty::Gamma { shape, scale }) => random.gamma(*shape, *scale),
        Some(Uncertainty::Beta { alpha, beta }) => random.beta(*alpha, *beta),
        Some(Uncertainty::Weibull { shape, scale }) => random.weibull(*shape, *scale),
        Some(Uncertainty::Exponential { rate }) => random.exponential(*rate),
        Some(Uncertainty::Poisson { mean }) => random.poisson(*mean),
        Some(Uncertainty::Histogram { intervals, weights }) => {
            random.histogram(intervals, weights)
        }
        Some(Uncertainty::PiecewiseLinear { intervals, weights }) => {
            random.piecewise_linear(intervals, weights)
        }
        Some(Uncertainty::Discrete { values, weights }) => random.discrete(values, weights),
    };
    event.cache_sample(value)
}

/// Equal-width density histogram as `(midpoint, density)` pairs.
fn density_histogram(samples: &[f64], num_bins: usize) -> Vec<(f64, f64)> {
    if samples.is_empty() {
        return Vec::new();
    }
    let min = samples.iter().copied().fold(f64::INFINITY, f64::min);
    let max = samples.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if max <= min {
        return vec![(min, 1.0)];
    }
    let width = (max - min) / num_bins as f64;
    let mut counts = vec![0usize; num_bins];
    for &value in samples {
        let bin = (((value - min) / width) as usize).min(num_bins - 1);
        counts[bin] += 1;
    }
    let total = samples.len() as f64;
    counts
        .into_iter()
        .enumerate()
        .map(|(i, count)| {
            let midpoint = min + width * (i as f64 + 0.5);
            (midpoint, count as f64 / (total * width))
        })
        .collect()
}

/// Single-quantile P2 estimator: five markers track the running
/// quantile without retaining the sample.
struct P2Quantile {
    probability: f64,
    heights: [f64; 5],
    positions: [f64; 5],
    desired: [f64; 5],
    increments: [f64; 5],
    count: usize,
    warmup: Vec<f64>,
}

impl P2Quantile {
    fn new(probability: f64) -> Self {
        Self {
            probability,
            heights: [0.0; 5],
            positions: [1.0, 2.0, 3.0, 4.0, 5.0],
            desired: [
                1.0,
                1.0 + 2.0 * probability,
                1.0 + 4.0 * probability,
                3.0 + 2.0 * probability,
                5.0,
            ],
            increments: [
                0.0,
                probability / 2.0,
                probability,
                (1.0 + probability) / 2.0,
                1.0,
            ],
            count: 0,
            warmup: Vec::with_capacity(5),
        }
    }

    fn observe(&mut self, value: f64) {
        self.count += 1;
        if self.count <= 5 {
            self.warmup.push(value);
            if self.count == 5 {
                self.warmup.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
                for (slot, &v) in self.heights.iter_mut().zip(&self.warmup) {
                    *slot = v;
                }
            }
            return;
        }

        let cell = if value < self.heights[0] {
            self.heights[0] = value;
            0
        } else if value >= self.heights[4] {
            self.heights[4] = value;
            3
        } else {
            let mut k = 0;
            for i in 0..4 {
                if value >= self.heights[i] && value < self.heights[i + 1] {
                    k = i;
                    break;
                }
            }
            k
        };
        for position in self.positions.iter_mut().skip(cell + 1) {
            *position += 1.0;
        }
        for (desired, increment) in self.desired.iter_mut().zip(&self.increments) {
            *desired += increment;
        }
        for i in 1..4 {
            self.adjust(i);
        }
    }

    fn adjust(&mut self, i: usize) {
        let deviation = self.desired[i] - self.positions[i];
        let step_up = self.positions[i + 1] - self.positions[i] > 1.0;
        let step_down = self.positions[i - 1] - self.positions[i] < -1.0;
        if (deviation >= 1.0 && step_up) || (deviation <= -1.0 && step_down) {
            let d = deviation.signum();
            let parabolic = self.parabolic(i, d);
            if self.heights[i - 1] < parabolic && parabolic < self.heights[i + 1] {
                self.heights[i] = parabolic;
            } else {
                self.heights[i] = self.linear(i, d);
            }
            self.positions[i] += d;
        }
    }

    fn parabolic(&self, i: usize, d: f64) -> f64 {
        let q = &self.heights;
        let n = &self.positions;
        q[i] + d / (n[i + 1] - n[i - 1])
            * ((n[i] - n[i - 1] + d) * (q[i + 1] - q[i]) / (n[i + 1] - n[i])
                + (n[i + 1] - n[i] - d) * (q[i] - q[i - 1]) / (n[i] - n[i - 1]))
    }

    fn linear(&self, i: usize, d: f64) -> f64 {
        let j = if d > 0.0 { i + 1 } else { i - 1 };
        self.heights[i]
            + d * (self.heights[j] - self.heights[i]) / (self.positions[j] - self.positions[i])
    }

    fn value(&self) -> f64 {
        if self.count >= 5 {
            return self.heights[2];
        }
        if self.warmup.is_empty() {
            return 0.0;
        }
        let mut sorted = self.warmup.clone();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        let rank = ((self.probability * sorted.len() as f64).ceil() as usize).max(1);
        sorted[rank.min(sorted.len()) - 1]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcs;
    use crate::preprocess::preprocess;
    use crate::probability::ProbabilityAnalysis;
    use sylva_model::{Formula, Model, Settings};

    fn uncertainty_for(model: &Model, settings: &Settings) -> UncertaintyResult {
        let preprocessed = preprocess(model, settings).unwrap();
        let cut_sets = mcs::generate(&preprocessed.tree, settings.limit_order).unwrap();
        let analysis = ProbabilityAnalysis::new(&cut_sets, &preprocessed.events, settings).unwrap();
        UncertaintyAnalysis::new(
            analysis,
            settings.num_trials,
            settings.effective_num_sums(),
            settings.seed,
        )
        .analyze()
        .unwrap()
    }

    #[test]
    fn constant_events_give_a_point_distribution() {
        let mut model = Model::new("t");
        model.add_basic_event(BasicEvent::with_probability("a", 0.1)).unwrap();
        model.add_basic_event(BasicEvent::with_probability("b", 0.2)).unwrap();
        model.add_gate("top", Formula::any_of(&["a", "b"])).unwrap();
        let settings = Settings::default().uncertainty(true).seed(17);
        let result = uncertainty_for(&model, &settings);
        assert!((result.mean - 0.28).abs() < 1e-12);
        assert!(result.sigma < 1e-12);
        let (low, high) = result.confidence_interval;
        assert!((low - 0.28).abs() < 1e-9);
        assert!((high - 0.28).abs() < 1e-9);
        assert_eq!(result.distribution.len(), 1);
    }

    #[test]
    fn unity_family_short_circuits() {
        let mut model = Model::new("t");
        model.add_basic_event(BasicEvent::with_probability("a", 0.1)).unwrap();
        model.add_house_event(sylva_model::HouseEvent::new("on", true)).unwrap();
        model.add_gate("top", Formula::any_of(&["a", "on"])).unwrap();
        let settings = Settings::default().uncertainty(true);
        let result = uncertainty_for(&model, &settings);
        assert_eq!(result.mean, 1.0);
        assert_eq!(result.sigma, 0.0);
        assert_eq!(result.confidence_interval, (1.0, 1.0));
        assert_eq!(result.distribution, vec![(1.0, 1.0)]);
        assert_eq!(result.warnings.len(), 1);
    }

    #[test]
    fn trials_are_reproducible_for_a_fixed_seed() {
        let mut model = Model::new("t");
        model
            .add_basic_event(
                BasicEvent::with_probability("a", 0.1)
                    .uncertain(Uncertainty::Uniform { min: 0.05, max: 0.15 }),
            )
            .unwrap();
        model.add_basic_event(BasicEvent::with_probability("b", 0.2)).unwrap();
        model.add_gate("top", Formula::any_of(&["a", "b"])).unwrap();
        let settings = Settings::default().uncertainty(true).seed(99);
        let first = uncertainty_for(&model, &settings);
        let second = uncertainty_for(&model, &settings);
        assert_eq!(first.mean.to_bits(), second.mean.to_bits());
        assert_eq!(first.sigma.to_bits(), second.sigma.to_bits());
        assert_eq!(first.quantiles, second.quantiles);
    }

    #[test]
    fn beta_distributed_and_matches_analytic_mean() {
        let mut model = Model::new("t");
        model
            .add_basic_event(
                BasicEvent::with_probability("a", 0.2)
                    .uncertain(Uncertainty::Beta { alpha: 2.0, beta: 8.0 }),
            )
            .unwrap();
        model
            .add_basic_event(
                BasicEvent::with_probability("b", 0.5)
                    .uncertain(Uncertainty::Beta { alpha: 5.0, beta: 5.0 }),
            )
            .unwrap();
        model.add_gate("top", Formula::all_of(&["a", "b"])).unwrap();
        let settings = Settings::default()
            .uncertainty(true)
            .num_trials(10000)
            .unwrap()
            .seed(42);
        let result = uncertainty_for(&model, &settings);
        // E[p_a * p_b] = 0.2 * 0.5 for independent events.
        assert!((result.mean - 0.1).abs() < 0.01);
        assert!(result.sigma > 0.0);
        let (low, high) = result.confidence_interval;
        assert!(low < result.mean && result.mean < high);
        // Quantiles rise with the probability level, within estimator
        // noise.
        for pair in result.quantiles.windows(2) {
            assert!(pair[0] <= pair[1] + 0.01);
        }
        assert_eq!(result.distribution.len(), NUM_BINS);
    }

    #[test]
    fn mixed_constant_and_uncertain_events_factor_out() {
        let mut model = Model::new("t");
        model
            .add_basic_event(
                BasicEvent::with_probability("u", 0.1)
                    .uncertain(Uncertainty::Uniform { min: 0.1, max: 0.1 + 1e-9 }),
            )
            .unwrap();
        model.add_basic_event(BasicEvent::with_probability("k", 0.5)).unwrap();
        model.add_gate("top", Formula::all_of(&["u", "k"])).unwrap();
        let settings = Settings::default().uncertainty(true).num_trials(200).unwrap();
        let result = uncertainty_for(&model, &settings);
        // A near-degenerate distribution pins the product at 0.05.
        assert!((result.mean - 0.05).abs() < 1e-6);
    }

    #[test]
    fn p2_estimator_tracks_uniform_quantiles() {
        let mut rng = Random::new(5);
        let mut median = P2Quantile::new(0.5);
        let mut p90 = P2Quantile::new(0.9);
        for _ in 0..20000 {
            let x = rng.uniform(0.0, 1.0);
            median.observe(x);
            p90.observe(x);
        }
        assert!((median.value() - 0.5).abs() < 0.02);
        assert!((p90.value() - 0.9).abs() < 0.02);
    }

    #[test]
    fn p2_estimator_handles_tiny_samples() {
        let mut q = P2Quantile::new(0.5);
        for x in [3.0, 1.0, 2.0] {
            q.observe(x);
        }
        assert_eq!(q.value(), 2.0);
    }

    #[test]
    fn histogram_masses_integrate_to_one() {
        let samples: Vec<f64> = (0..1000).map(|i| i as f64 / 1000.0).collect();
        let histogram = density_histogram(&samples, 20);
        let width = 1.0 / 20.0 * 0.999;
        let mass: f64 = histogram.iter().map(|(_, density)| density * width).sum();
        assert!((mass - 1.0).abs() < 0.01);
    }

    #[test]
    fn sampling_respects_the_cache() {
        let mut event = BasicEvent::with_probability("e", 0.5)
            .uncertain(Uncertainty::Uniform { min: 0.0, max: 1.0 });
        let mut random = Random::new(11);
        let first = sample_probability(&mut event, &mut random);
        let second = sample_probability(&mut event, &mut random);
        assert_eq!(first, second);
        event.reset();
        let third = sample_probability(&mut event, &mut random);
        assert_ne!(first, third);
    }

    #[test]
    fn sampling_without_distribution_is_inert() {
        let mut event = BasicEvent::with_probability("k", 0.3);
        let mut random = Random::new(1);
        // Constant events are filtered out before sampling; the
        // fallback leaves no cache behind.
        assert_eq!(sample_probability(&mut event, &mut random), 0.0);
        assert_eq!(event.sampled(), None);
    }
}
