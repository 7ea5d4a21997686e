use std::hint::black_box;
use std::time::{Duration, Instant};

use musim_domain::{Workload, WorkloadClass};
use tracing::debug;

use crate::sampling::LoadSampler;

/// 每次CPU计算的级数项上限
const MAX_ITERATIONS: u32 = 100;

/// 在采样时长内持续占用CPU的负载模拟器
#[derive(Debug, Clone, Default)]
pub struct CpuBurnSimulator {
    sampler: LoadSampler,
}

impl CpuBurnSimulator {
    pub fn new(sampler: LoadSampler) -> Self {
        Self { sampler }
    }

    pub fn sampler(&self) -> &LoadSampler {
        &self.sampler
    }

    /// 在给定时长内持续计算，返回实际耗时
    pub fn burn_for(load: Duration) -> Duration {
        let started = Instant::now();
        let deadline = started + load;
        loop {
            black_box(approximate_pi(black_box(MAX_ITERATIONS)));
            if Instant::now() >= deadline {
                break;
            }
        }
        started.elapsed()
    }
}

impl Workload for CpuBurnSimulator {
    fn execute(&self, class: WorkloadClass) -> Duration {
        let load_ms = self.sampler.sample_ms(class, &mut rand::rng());
        debug!(workload = %class, load_ms, "Burning CPU");
        Self::burn_for(Duration::from_secs_f64(load_ms / 1000.0))
    }
}

/// 交错级数 4/1 - 4/3 + 4/5 - ... 逼近π
pub fn approximate_pi(max_iterations: u32) -> f64 {
    let mut pi = 0.0;
    let mut positive = true;
    let mut i = 1u32;
    while i < max_iterations {
        let term = 4.0 / f64::from(i);
        if positive {
            pi += term;
        } else {
            pi -= term;
        }
        positive = !positive;
        i += 2;
    }
    pi
}
