use serde::{Deserialize, Serialize};

use crate::validation::{ConfigValidator, ValidationUtils};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    /// etcd服务器地址
    pub endpoint: String,
    /// 注册键前缀，实例键为 `<prefix>/<service>/<uuid>`
    pub key_prefix: String,
    pub ttl_seconds: u64,
    pub keep_alive_interval_seconds: u64,
    pub request_timeout_seconds: u64,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:2379".to_string(),
            key_prefix: "musim".to_string(),
            ttl_seconds: 5,
            keep_alive_interval_seconds: 5,
            request_timeout_seconds: 5,
        }
    }
}

impl ConfigValidator for DiscoveryConfig {
    fn validate(&self) -> crate::ConfigResult<()> {
        ValidationUtils::validate_url(&self.endpoint, "discovery.endpoint")?;
        ValidationUtils::validate_not_empty(&self.key_prefix, "discovery.key_prefix")?;
        if self.key_prefix.contains('/') {
            return Err(crate::ConfigError::Validation(
                "discovery.key_prefix must not contain '/'".to_string(),
            ));
        }
        ValidationUtils::validate_timeout_seconds(self.ttl_seconds, "discovery.ttl_seconds")?;
        ValidationUtils::validate_timeout_seconds(
            self.keep_alive_interval_seconds,
            "discovery.keep_alive_interval_seconds",
        )?;
        ValidationUtils::validate_timeout_seconds(
            self.request_timeout_seconds,
            "discovery.request_timeout_seconds",
        )?;

        // 刷新间隔超过TTL会让注册在两次刷新之间过期
        if self.keep_alive_interval_seconds > self.ttl_seconds {
            return Err(crate::ConfigError::Validation(format!(
                "discovery.keep_alive_interval_seconds ({}) must not exceed discovery.ttl_seconds ({})",
                self.keep_alive_interval_seconds, self.ttl_seconds
            )));
        }

        Ok(())
    }
}
