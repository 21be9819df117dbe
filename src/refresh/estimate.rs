use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::EstimateConfig;

/// population × U[min, max] / rate, or 0 when there is no usable rate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GdpEstimator {
    min: f64,
    max: f64,
    seed: Option<u64>,
}

impl GdpEstimator {
    pub fn new(min: f64, max: f64) -> Self {
        let (min, max) = if min <= max { (min, max) } else { (max, min) };
        Self {
            min,
            max,
            seed: None,
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn from_config(config: &EstimateConfig) -> Self {
        let estimator = Self::new(config.multiplier_min, config.multiplier_max);
        match config.seed {
            Some(seed) => estimator.with_seed(seed),
            None => estimator,
        }
    }

    pub fn range(&self) -> (f64, f64) {
        (self.min, self.max)
    }

    /// Fresh generator for one refresh run.
    pub fn rng(&self) -> StdRng {
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        }
    }

    pub fn estimate<R: Rng + ?Sized>(&self, population: i64, rate: Option<f64>, rng: &mut R) -> f64 {
        let Some(rate) = usable_rate(rate) else {
            return 0.0;
        };
        let multiplier = rng.gen_range(self.min..=self.max);
        population as f64 * multiplier / rate
    }
}

impl Default for GdpEstimator {
    fn default() -> Self {
        Self::from_config(&EstimateConfig::default())
    }
}

/// Zero, negative and non-finite rates cannot be divided by.
pub fn usable_rate(rate: Option<f64>) -> Option<f64> {
    rate.filter(|r| r.is_finite() && *r > 0.0)
}

#[cfg(test)]
mod tests {
    use super::{usable_rate, GdpEstimator};

    #[test]
    fn estimate_stays_within_multiplier_bounds() {
        let estimator = GdpEstimator::default();
        let mut rng = estimator.rng();
        for _ in 0..200 {
            let gdp = estimator.estimate(1_000_000, Some(2.0), &mut rng);
            assert!((500_000_000.0..=1_000_000_000.0).contains(&gdp), "gdp {gdp}");
        }
    }

    #[test]
    fn missing_or_unusable_rate_gives_zero() {
        let estimator = GdpEstimator::default();
        let mut rng = estimator.rng();
        assert_eq!(estimator.estimate(10, None, &mut rng), 0.0);
        assert_eq!(estimator.estimate(10, Some(0.0), &mut rng), 0.0);
        assert_eq!(estimator.estimate(10, Some(-3.0), &mut rng), 0.0);
        assert_eq!(estimator.estimate(10, Some(f64::NAN), &mut rng), 0.0);
        assert_eq!(usable_rate(Some(1.5)), Some(1.5));
    }

    #[test]
    fn seeded_estimator_is_reproducible() {
        let estimator = GdpEstimator::default().with_seed(42);
        let first: Vec<f64> = {
            let mut rng = estimator.rng();
            (0..5).map(|_| estimator.estimate(1000, Some(1.0), &mut rng)).collect()
        };
        let second: Vec<f64> = {
            let mut rng = estimator.rng();
            (0..5).map(|_| estimator.estimate(1000, Some(1.0), &mut rng)).collect()
        };
        assert_eq!(first, second);
    }

    #[test]
    fn inverted_bounds_are_normalized() {
        assert_eq!(GdpEstimator::new(2000.0, 1000.0).range(), (1000.0, 2000.0));
    }
}
