use musim_domain::{LoadDistribution, WorkloadClass};
use rand::Rng;

/// 按分布和缩放因子为负载等级采样时长
#[derive(Debug, Clone, Copy)]
pub struct LoadSampler {
    distribution: LoadDistribution,
    scale_factor: f64,
}

impl LoadSampler {
    pub fn new(distribution: LoadDistribution, scale_factor: f64) -> Self {
        Self {
            distribution,
            scale_factor,
        }
    }

    pub fn distribution(&self) -> LoadDistribution {
        self.distribution
    }

    /// 该等级的平均时长（毫秒）
    pub fn mean_ms(&self, class: WorkloadClass) -> f64 {
        class.base_scale_ms() * self.scale_factor
    }

    pub fn sample_ms<R: Rng>(&self, class: WorkloadClass, rng: &mut R) -> f64 {
        let mean = self.mean_ms(class);
        if mean <= 0.0 {
            return 0.0;
        }

        match self.distribution {
            LoadDistribution::Exponential => {
                // 逆变换采样，1 - u 落在 (0, 1]
                let u: f64 = rng.random();
                -(1.0 - u).ln() * mean
            }
            LoadDistribution::Uniform => rng.random_range(0.0..2.0 * mean),
            LoadDistribution::Constant => mean,
        }
    }
}

impl Default for LoadSampler {
    fn default() -> Self {
        Self::new(LoadDistribution::Exponential, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_none_class_never_loads() {
        let sampler = LoadSampler::default();
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..100 {
            assert_eq!(sampler.sample_ms(WorkloadClass::None, &mut rng), 0.0);
        }
    }

    #[test]
    fn test_constant_distribution_returns_scaled_mean() {
        let sampler = LoadSampler::new(LoadDistribution::Constant, 0.5);
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(sampler.sample_ms(WorkloadClass::Heavy, &mut rng), 5000.0);
        assert_eq!(sampler.sample_ms(WorkloadClass::Low, &mut rng), 500.0);
    }

    #[test]
    fn test_uniform_samples_stay_within_bounds() {
        let sampler = LoadSampler::new(LoadDistribution::Uniform, 1.0);
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..1000 {
            let ms = sampler.sample_ms(WorkloadClass::Low, &mut rng);
            assert!((0.0..2000.0).contains(&ms));
        }
    }

    #[test]
    fn test_exponential_samples_are_non_negative_with_plausible_mean() {
        let sampler = LoadSampler::new(LoadDistribution::Exponential, 1.0);
        let mut rng = StdRng::seed_from_u64(2024);
        let n = 20_000;
        let total: f64 = (0..n)
            .map(|_| sampler.sample_ms(WorkloadClass::Medium, &mut rng))
            .inspect(|ms| assert!(ms.is_finite() && *ms >= 0.0))
            .sum();
        let mean = total / n as f64;
        assert!((4500.0..5500.0).contains(&mean), "mean was {mean}");
    }

    #[test]
    fn test_zero_scale_factor_disables_load() {
        let sampler = LoadSampler::new(LoadDistribution::Exponential, 0.0);
        let mut rng = StdRng::seed_from_u64(3);
        assert_eq!(sampler.sample_ms(WorkloadClass::Heavy, &mut rng), 0.0);
    }
}
