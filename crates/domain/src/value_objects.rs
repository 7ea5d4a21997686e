use std::fmt;
use std::str::FromStr;

use musim_errors::SimError;
use serde::{Deserialize, Serialize};

/// 模拟计算的负载等级
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkloadClass {
    None,
    Low,
    #[default]
    Medium,
    Heavy,
}

impl WorkloadClass {
    pub const ALL: [WorkloadClass; 4] = [
        WorkloadClass::None,
        WorkloadClass::Low,
        WorkloadClass::Medium,
        WorkloadClass::Heavy,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            WorkloadClass::None => "none",
            WorkloadClass::Low => "low",
            WorkloadClass::Medium => "medium",
            WorkloadClass::Heavy => "heavy",
        }
    }

    /// 该等级的平均负载时长（毫秒）
    pub fn base_scale_ms(&self) -> f64 {
        match self {
            WorkloadClass::None => 0.0,
            WorkloadClass::Low => 1000.0,
            WorkloadClass::Medium => 5000.0,
            WorkloadClass::Heavy => 10000.0,
        }
    }
}

impl fmt::Display for WorkloadClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WorkloadClass {
    type Err = SimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(WorkloadClass::None),
            "low" => Ok(WorkloadClass::Low),
            "medium" => Ok(WorkloadClass::Medium),
            "heavy" => Ok(WorkloadClass::Heavy),
            other => Err(SimError::config_error(format!(
                "undefined workload '{other}', expected one of: none, low, medium, heavy"
            ))),
        }
    }
}

/// 负载时长的采样分布
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadDistribution {
    /// 均值为scale的指数分布
    #[default]
    Exponential,
    /// [0, 2*scale) 上的均匀分布
    Uniform,
    /// 固定为scale
    Constant,
}

impl FromStr for LoadDistribution {
    type Err = SimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "exponential" => Ok(LoadDistribution::Exponential),
            "uniform" => Ok(LoadDistribution::Uniform),
            "constant" => Ok(LoadDistribution::Constant),
            other => Err(SimError::config_error(format!(
                "unknown load distribution '{other}'"
            ))),
        }
    }
}

/// 单个请求在节点内的生命周期阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestPhase {
    Received,
    Computing,
    Finalizing,
    Completed,
    AwaitingDownstream,
}

impl fmt::Display for RequestPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RequestPhase::Received => "received",
            RequestPhase::Computing => "computing",
            RequestPhase::Finalizing => "finalizing",
            RequestPhase::Completed => "completed",
            RequestPhase::AwaitingDownstream => "awaiting_downstream",
        };
        f.write_str(s)
    }
}

/// 节点的关闭阶段
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShutdownPhase {
    #[default]
    Running,
    Draining,
    Stopped,
}

impl ShutdownPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            ShutdownPhase::Running => "running",
            ShutdownPhase::Draining => "draining",
            ShutdownPhase::Stopped => "stopped",
        }
    }
}

impl fmt::Display for ShutdownPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_workload_class_parsing() {
        assert_eq!("none".parse::<WorkloadClass>().unwrap(), WorkloadClass::None);
        assert_eq!("HEAVY".parse::<WorkloadClass>().unwrap(), WorkloadClass::Heavy);
        assert!("extreme".parse::<WorkloadClass>().is_err());
    }

    #[test]
    fn test_workload_class_round_trips_through_display() {
        for class in WorkloadClass::ALL {
            assert_eq!(class.to_string().parse::<WorkloadClass>().unwrap(), class);
        }
    }

    #[test]
    fn test_base_scales() {
        assert_eq!(WorkloadClass::None.base_scale_ms(), 0.0);
        assert_eq!(WorkloadClass::Low.base_scale_ms(), 1000.0);
        assert_eq!(WorkloadClass::Medium.base_scale_ms(), 5000.0);
        assert_eq!(WorkloadClass::Heavy.base_scale_ms(), 10000.0);
    }

    #[test]
    fn test_workload_class_serde_lowercase() {
        let json = serde_json::to_string(&WorkloadClass::Low).unwrap();
        assert_eq!(json, "\"low\"");
        let class: WorkloadClass = serde_json::from_str("\"medium\"").unwrap();
        assert_eq!(class, WorkloadClass::Medium);
    }
}
