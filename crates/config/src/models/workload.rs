use musim_domain::LoadDistribution;
use serde::{Deserialize, Serialize};

use crate::validation::ConfigValidator;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkloadConfig {
    pub distribution: LoadDistribution,
    /// 所有负载等级的时长乘数
    pub scale_factor: f64,
}

impl Default for WorkloadConfig {
    fn default() -> Self {
        Self {
            distribution: LoadDistribution::Exponential,
            scale_factor: 1.0,
        }
    }
}

impl ConfigValidator for WorkloadConfig {
    fn validate(&self) -> crate::ConfigResult<()> {
        if !self.scale_factor.is_finite() || self.scale_factor < 0.0 {
            return Err(crate::ConfigError::Validation(format!(
                "workload.scale_factor must be a non-negative number, got {}",
                self.scale_factor
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShutdownConfig {
    /// 排空阶段轮询注册表的间隔
    pub drain_poll_interval_ms: u64,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            drain_poll_interval_ms: 1000,
        }
    }
}

impl ConfigValidator for ShutdownConfig {
    fn validate(&self) -> crate::ConfigResult<()> {
        if self.drain_poll_interval_ms == 0 || self.drain_poll_interval_ms > 60_000 {
            return Err(crate::ConfigError::Validation(format!(
                "shutdown.drain_poll_interval_ms must be within 1..=60000, got {}",
                self.drain_poll_interval_ms
            )));
        }
        Ok(())
    }
}
