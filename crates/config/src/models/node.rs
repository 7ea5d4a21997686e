use musim_domain::WorkloadClass;
use serde::{Deserialize, Serialize};

use crate::validation::{ConfigValidator, ValidationUtils};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    pub name: String,
    /// 对外通告的IP，未设置时自动探测
    pub ip_address: Option<String>,
    /// 监听端口，未设置时由操作系统分配
    pub port: Option<u16>,
    pub workload: WorkloadClass,
    /// 按顺序扇出的下游服务名
    #[serde(default)]
    pub destinations: Vec<String>,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            ip_address: None,
            port: None,
            workload: WorkloadClass::Medium,
            destinations: Vec::new(),
        }
    }
}

impl ConfigValidator for NodeConfig {
    fn validate(&self) -> crate::ConfigResult<()> {
        ValidationUtils::validate_not_empty(&self.name, "node.name")?;

        if let Some(ip) = &self.ip_address {
            ValidationUtils::validate_not_empty(ip, "node.ip_address")?;
        }
        if let Some(port) = self.port {
            ValidationUtils::validate_port(port)?;
        }

        for destination in &self.destinations {
            ValidationUtils::validate_not_empty(destination, "node.destinations")?;
        }

        Ok(())
    }
}
