//! Seeded random sampling for uncertainty analysis.
//!
//! One [`Random`] instance is owned by its analysis; there is no
//! process-wide generator. Parameter validity is the caller's
//! responsibility: out-of-domain parameters fall back to a central
//! value rather than panicking.

use rand::distributions::WeightedIndex;
use rand::prelude::*;
use rand_distr::{Beta, Exp, Gamma, LogNormal, Normal, Poisson, Triangular, Weibull};

/// Deterministic pseudorandom source over the named distributions.
pub struct Random {
    rng: StdRng,
}

impl Random {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Uniform over `[min, max)`.
    pub fn uniform(&mut self, min: f64, max: f64) -> f64 {
        if min >= max {
            return min;
        }
        self.rng.gen_range(min..max)
    }

    pub fn triangular(&mut self, lower: f64, mode: f64, upper: f64) -> f64 {
        if let Ok(dist) = Triangular::new(lower, upper, mode) {
            dist.sample(&mut self.rng)
        } else {
            mode
        }
    }

    /// Linear density between interval points. Requires strictly
    /// increasing intervals and `weights.len() == intervals.len()`.
    pub fn piecewise_linear(&mut self, intervals: &[f64], weights: &[f64]) -> f64 {
        let n = intervals.len();
        debug_assert!(n >= 2 && weights.len() >= n);
        // Trapezoid areas select the segment; inverse CDF within it.
        let areas: Vec<f64> = (0..n - 1)
            .map(|i| (weights[i] + weights[i + 1]) / 2.0 * (intervals[i + 1] - intervals[i]))
            .collect();
        let segment = self.discrete_index(&areas);
        let (x0, x1) = (intervals[segment], intervals[segment + 1]);
        let (w0, w1) = (weights[segment], weights[segment + 1]);
        let dx = x1 - x0;
        let u: f64 = self.rng.gen();
        let target = u * areas[segment];
        let slope = (w1 - w0) / dx;
        if slope.abs() < f64::EPSILON * (w0.abs() + 1.0) {
            if w0 <= 0.0 {
                return x0 + u * dx;
            }
            return x0 + target / w0;
        }
        // Solve (slope/2) t^2 + w0 t - target = 0 for t in [0, dx].
        let t = (-w0 + (w0 * w0 + 2.0 * slope * target).max(0.0).sqrt()) / slope;
        x0 + t.clamp(0.0, dx)
    }

    /// Uniform within an interval chosen by weight. Requires strictly
    /// increasing intervals and `weights.len() == intervals.len() - 1`.
    pub fn histogram(&mut self, intervals: &[f64], weights: &[f64]) -> f64 {
        debug_assert!(intervals.len() >= 2 && weights.len() >= intervals.len() - 1);
        let bin = self.discrete_index(&weights[..intervals.len() - 1]);
        self.uniform(intervals[bin], intervals[bin + 1])
    }

    /// One of `values` with probability proportional to the matching
    /// non-negative weight; ties resolve to the lower index.
    pub fn discrete(&mut self, values: &[f64], weights: &[f64]) -> f64 {
        debug_assert_eq!(values.len(), weights.len());
        values[self.discrete_index(weights)]
    }

    fn discrete_index(&mut self, weights: &[f64]) -> usize {
        if let Ok(dist) = WeightedIndex::new(weights) {
            dist.sample(&mut self.rng)
        } else {
            0
        }
    }

    pub fn normal(&mut self, mean: f64, sigma: f64) -> f64 {
        if let Ok(dist) = Normal::new(mean, sigma) {
            dist.sample(&mut self.rng)
        } else {
            mean
        }
    }

    /// `mu` and `sigma` parameterize the underlying normal in log
    /// space.
    pub fn lognormal(&mut self, mu: f64, sigma: f64) -> f64 {
        if let Ok(dist) = LogNormal::new(mu, sigma) {
            dist.sample(&mut self.rng)
        } else {
            mu.exp()
        }
    }

    /// Shape `k`, scale `theta`. For an alpha/beta parameterization
    /// pass `1/beta` as the scale.
    pub fn gamma(&mut self, k: f64, theta: f64) -> f64 {
        if let Ok(dist) = Gamma::new(k, theta) {
            dist.sample(&mut self.rng)
        } else {
            k * theta
        }
    }

    pub fn beta(&mut self, alpha: f64, beta: f64) -> f64 {
        if let Ok(dist) = Beta::new(alpha, beta) {
            dist.sample(&mut self.rng)
        } else {
            alpha / (alpha + beta)
        }
    }

    /// Shape `k`, scale `lambda`.
    pub fn weibull(&mut self, k: f64, lambda: f64) -> f64 {
        if let Ok(dist) = Weibull::new(lambda, k) {
            dist.sample(&mut self.rng)
        } else {
            lambda
        }
    }

    pub fn exponential(&mut self, lambda: f64) -> f64 {
        if let Ok(dist) = Exp::new(lambda) {
            dist.sample(&mut self.rng)
        } else {
            1.0 / lambda
        }
    }

    pub fn poisson(&mut self, mean: f64) -> f64 {
        if let Ok(dist) = Poisson::new(mean) {
            dist.sample(&mut self.rng)
        } else {
            mean
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeded_streams_are_reproducible() {
        let mut a = Random::new(42);
        let mut b = Random::new(42);
        for _ in 0..100 {
            assert_eq!(a.uniform(0.0, 1.0).to_bits(), b.uniform(0.0, 1.0).to_bits());
        }
    }

    #[test]
    fn uniform_stays_in_range() {
        let mut rng = Random::new(1);
        for _ in 0..1000 {
            let x = rng.uniform(2.0, 3.0);
            assert!((2.0..3.0).contains(&x));
        }
    }

    #[test]
    fn triangular_stays_in_support() {
        let mut rng = Random::new(2);
        for _ in 0..1000 {
            let x = rng.triangular(0.0, 0.2, 1.0);
            assert!((0.0..=1.0).contains(&x));
        }
    }

    #[test]
    fn discrete_respects_zero_weights() {
        let mut rng = Random::new(3);
        for _ in 0..200 {
            let x = rng.discrete(&[1.0, 2.0, 3.0], &[0.0, 1.0, 0.0]);
            assert_eq!(x, 2.0);
        }
    }

    #[test]
    fn histogram_lands_in_weighted_interval() {
        let mut rng = Random::new(4);
        for _ in 0..500 {
            let x = rng.histogram(&[0.0, 1.0, 2.0], &[0.0, 1.0]);
            assert!((1.0..2.0).contains(&x));
        }
    }

    #[test]
    fn piecewise_linear_stays_in_support() {
        let mut rng = Random::new(5);
        let intervals = [0.0, 1.0, 3.0];
        let weights = [0.0, 2.0, 0.0];
        let mut mean = 0.0;
        let trials = 20000;
        for _ in 0..trials {
            let x = rng.piecewise_linear(&intervals, &weights);
            assert!((0.0..=3.0).contains(&x));
            mean += x;
        }
        mean /= trials as f64;
        // Triangle peaked at 1 over [0, 3]: mean = (0 + 1 + 3) / 3.
        assert!((mean - 4.0 / 3.0).abs() < 0.05);
    }

    #[test]
    fn beta_mean_matches_analytic() {
        let mut rng = Random::new(6);
        let trials = 20000;
        let mean: f64 = (0..trials).map(|_| rng.beta(2.0, 8.0)).sum::<f64>() / trials as f64;
        assert!((mean - 0.2).abs() < 0.01);
    }

    #[test]
    fn lognormal_mean_matches_analytic() {
        let mut rng = Random::new(7);
        let trials = 50000;
        let mean: f64 = (0..trials).map(|_| rng.lognormal(-3.0, 0.5)).sum::<f64>() / trials as f64;
        let analytic = (-3.0f64 + 0.125).exp();
        assert!((mean - analytic).abs() / analytic < 0.05);
    }

    #[test]
    fn weibull_uses_shape_then_scale() {
        let mut rng = Random::new(8);
        // Shape 1 reduces to exponential with mean = scale.
        let trials = 50000;
        let mean: f64 = (0..trials).map(|_| rng.weibull(1.0, 2.0)).sum::<f64>() / trials as f64;
        assert!((mean - 2.0).abs() < 0.1);
    }
}
