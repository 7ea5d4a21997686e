use anyhow::{Context, Result};
use config::{Config as ConfigBuilder, Environment, File, FileFormat};
use musim_domain::WorkloadClass;
use serde::{Deserialize, Serialize};
use std::path::Path;

use super::{
    discovery::DiscoveryConfig,
    logging::{LogLevel, MetricsConfig, ObservabilityConfig, OutputFormat},
    node::NodeConfig,
    workload::{ShutdownConfig, WorkloadConfig},
};
use crate::validation::ConfigValidator;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    pub node: NodeConfig,
    pub discovery: DiscoveryConfig,
    pub workload: WorkloadConfig,
    pub metrics: MetricsConfig,
    pub shutdown: ShutdownConfig,
    pub observability: ObservabilityConfig,
}

/// 命令行参数对配置的覆盖，优先级最高
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub name: Option<String>,
    pub discovery_endpoint: Option<String>,
    pub ip_address: Option<String>,
    pub port: Option<u16>,
    pub workload: Option<WorkloadClass>,
    pub destinations: Vec<String>,
    pub metrics_address: Option<String>,
    pub log_level: Option<LogLevel>,
    pub log_format: Option<OutputFormat>,
}

impl ConfigOverrides {
    pub fn apply(&self, config: &mut AppConfig) {
        if let Some(name) = &self.name {
            config.node.name = name.clone();
        }
        if let Some(endpoint) = &self.discovery_endpoint {
            config.discovery.endpoint = endpoint.clone();
        }
        if let Some(ip) = &self.ip_address {
            config.node.ip_address = Some(ip.clone());
        }
        if let Some(port) = self.port {
            config.node.port = Some(port);
        }
        if let Some(workload) = self.workload {
            config.node.workload = workload;
        }
        if !self.destinations.is_empty() {
            config.node.destinations = self.destinations.clone();
        }
        if let Some(addr) = &self.metrics_address {
            config.metrics.exporter_address = Some(addr.clone());
        }
        if let Some(level) = self.log_level {
            config.observability.log_level = level;
        }
        if let Some(format) = self.log_format {
            config.observability.log_format = format;
        }
    }
}

impl AppConfig {
    /// 依次合并默认值、配置文件、`MUSIM_` 环境变量和命令行覆盖，然后校验
    pub fn load(config_path: Option<&str>, overrides: &ConfigOverrides) -> Result<Self> {
        let mut builder = ConfigBuilder::builder()
            .set_default("node.name", "")?
            .set_default("node.workload", "medium")?
            .set_default("discovery.endpoint", "http://127.0.0.1:2379")?
            .set_default("discovery.key_prefix", "musim")?
            .set_default("discovery.ttl_seconds", 5)?
            .set_default("discovery.keep_alive_interval_seconds", 5)?
            .set_default("discovery.request_timeout_seconds", 5)?
            .set_default("workload.distribution", "exponential")?
            .set_default("workload.scale_factor", 1.0)?
            .set_default("metrics.enabled", true)?
            .set_default("shutdown.drain_poll_interval_ms", 1000)?
            .set_default("observability.log_level", "info")?
            .set_default("observability.log_format", "pretty")?;

        if let Some(path) = config_path {
            if Path::new(path).exists() {
                builder = builder.add_source(File::new(path, FileFormat::Toml));
            } else {
                return Err(anyhow::anyhow!("配置文件不存在: {}", path));
            }
        }

        builder = builder.add_source(
            Environment::with_prefix("MUSIM")
                .prefix_separator("_")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("node.destinations")
                .try_parsing(true),
        );

        let mut config: AppConfig = builder
            .build()
            .context("构建配置失败")?
            .try_deserialize()
            .context("反序列化配置失败")?;

        overrides.apply(&mut config);
        config.validate()?;

        Ok(config)
    }

    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(toml_str).context("解析TOML配置失败")?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("序列化配置为TOML失败")
    }
}

impl ConfigValidator for AppConfig {
    fn validate(&self) -> crate::ConfigResult<()> {
        self.node.validate()?;
        self.discovery.validate()?;
        self.workload.validate()?;
        self.metrics.validate()?;
        self.shutdown.validate()?;
        self.observability.validate()?;
        Ok(())
    }
}
