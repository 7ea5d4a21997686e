//! 基于etcd v2 keys API的服务发现
//!
//! 每个实例注册在 `<prefix>/<service>/<uuid>` 下，值为实例地址，带TTL。
//! 解析服务时列出 `<prefix>/<service>` 目录下的所有值。

use std::time::Duration;

use async_trait::async_trait;
use musim_config::DiscoveryConfig;
use musim_domain::Discovery;
use musim_errors::{SimError, SimResult};
use reqwest::StatusCode;
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

const PROBE_KEY: &str = "probe";
const PROBE_TTL_SECONDS: u64 = 1;

#[derive(Debug, Clone)]
struct Registration {
    key: String,
    address: String,
}

#[derive(Debug, Deserialize)]
struct KeysResponse {
    node: Option<KeyNode>,
}

#[derive(Debug, Deserialize)]
struct KeyNode {
    #[serde(default)]
    value: Option<String>,
    #[serde(default)]
    dir: bool,
    #[serde(default)]
    nodes: Vec<KeyNode>,
}

/// 从etcd目录列表中取出实例地址，没有实例时返回 `SimError::NoInstances`
pub fn parse_instances(service: &str, body: &str) -> SimResult<Vec<String>> {
    let response: KeysResponse = serde_json::from_str(body)
        .map_err(|e| SimError::discovery(format!("Unexpected etcd response: {e}")))?;

    let instances: Vec<String> = response
        .node
        .map(|node| {
            node.nodes
                .into_iter()
                .filter(|child| !child.dir)
                .filter_map(|child| child.value)
                .filter(|value| !value.is_empty())
                .collect()
        })
        .unwrap_or_default();

    if instances.is_empty() {
        return Err(SimError::no_instances(service));
    }
    Ok(instances)
}

pub struct EtcdDiscovery {
    http_client: reqwest::Client,
    endpoint: String,
    key_prefix: String,
    ttl_seconds: u64,
    registration: RwLock<Option<Registration>>,
}

impl EtcdDiscovery {
    pub fn new(config: &DiscoveryConfig) -> SimResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .build()
            .map_err(|e| SimError::discovery(format!("Cannot build etcd client: {e}")))?;

        Ok(Self {
            http_client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            key_prefix: config.key_prefix.clone(),
            ttl_seconds: config.ttl_seconds,
            registration: RwLock::new(None),
        })
    }

    /// 创建客户端并确认etcd可以写入
    pub async fn connect(config: &DiscoveryConfig) -> SimResult<Self> {
        let discovery = Self::new(config)?;
        discovery.probe().await?;
        info!(endpoint = %discovery.endpoint, "Connected to etcd");
        Ok(discovery)
    }

    /// 写入一个短TTL的探测键
    pub async fn probe(&self) -> SimResult<()> {
        self.set_key(PROBE_KEY, "etcd", PROBE_TTL_SECONDS).await
    }

    pub fn service_key(&self, service: &str) -> String {
        format!("{}/{}", self.key_prefix, service)
    }

    /// 当前注册使用的键
    pub async fn registered_key(&self) -> Option<String> {
        self.registration.read().await.as_ref().map(|r| r.key.clone())
    }

    fn keys_url(&self, key: &str) -> String {
        format!("{}/v2/keys/{}", self.endpoint, key.trim_start_matches('/'))
    }

    async fn set_key(&self, key: &str, value: &str, ttl_seconds: u64) -> SimResult<()> {
        let url = self.keys_url(key);
        let ttl = ttl_seconds.to_string();
        let response = self
            .http_client
            .put(&url)
            .form(&[("value", value), ("ttl", ttl.as_str())])
            .send()
            .await
            .map_err(|e| SimError::discovery(format!("PUT {url} failed: {e}")))?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(SimError::discovery(format!(
                "PUT {url} returned HTTP {status} - {body}"
            )))
        }
    }
}

#[async_trait]
impl Discovery for EtcdDiscovery {
    async fn resolve_instances(&self, service: &str) -> SimResult<Vec<String>> {
        let url = self.keys_url(&self.service_key(service));
        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .map_err(|e| SimError::discovery(format!("GET {url} failed: {e}")))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(SimError::no_instances(service));
        }
        let body = response
            .text()
            .await
            .map_err(|e| SimError::discovery(format!("Cannot read etcd response: {e}")))?;
        if !status.is_success() {
            return Err(SimError::discovery(format!(
                "GET {url} returned HTTP {status} - {body}"
            )));
        }

        let instances = parse_instances(service, &body)?;
        debug!(service, count = instances.len(), "Resolved service instances");
        Ok(instances)
    }

    async fn register_self(&self, name: &str, address: &str) -> SimResult<()> {
        let key = format!("{}/{}", self.service_key(name), uuid::Uuid::new_v4());
        self.set_key(&key, address, self.ttl_seconds).await?;

        info!(key = %key, address, ttl_seconds = self.ttl_seconds, "Registered to etcd");
        *self.registration.write().await = Some(Registration {
            key,
            address: address.to_string(),
        });
        Ok(())
    }

    async fn unregister(&self) -> SimResult<()> {
        let Some(registration) = self.registration.write().await.take() else {
            debug!("Not registered, nothing to remove");
            return Ok(());
        };

        let url = self.keys_url(&registration.key);
        let response = self
            .http_client
            .delete(&url)
            .send()
            .await
            .map_err(|e| SimError::discovery(format!("DELETE {url} failed: {e}")))?;

        let status = response.status();
        // 键已经过期也算注销成功
        if status.is_success() || status == StatusCode::NOT_FOUND {
            info!(key = %registration.key, "Unregistered from etcd");
            Ok(())
        } else {
            warn!(key = %registration.key, status = %status, "Cannot unregister from etcd");
            Err(SimError::discovery(format!(
                "DELETE {url} returned HTTP {status}"
            )))
        }
    }

    async fn refresh(&self) -> SimResult<()> {
        let registration = self
            .registration
            .read()
            .await
            .clone()
            .ok_or_else(|| SimError::discovery("refresh called before register_self"))?;
        self.set_key(&registration.key, &registration.address, self.ttl_seconds)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_directory_listing() {
        let body = r#"{
            "action": "get",
            "node": {
                "key": "/musim/auth",
                "dir": true,
                "nodes": [
                    {"key": "/musim/auth/a", "value": "http://10.0.0.1:8080", "ttl": 5},
                    {"key": "/musim/auth/b", "value": "http://10.0.0.2:8080", "ttl": 3}
                ]
            }
        }"#;
        let instances = parse_instances("auth", body).unwrap();
        assert_eq!(instances, vec!["http://10.0.0.1:8080", "http://10.0.0.2:8080"]);
    }

    #[test]
    fn test_parse_empty_directory_is_no_instances() {
        let body = r#"{"action":"get","node":{"key":"/musim/auth","dir":true}}"#;
        assert!(matches!(
            parse_instances("auth", body),
            Err(SimError::NoInstances { service }) if service == "auth"
        ));
    }

    #[test]
    fn test_parse_skips_nested_directories() {
        let body = r#"{"node":{"dir":true,"nodes":[
            {"key":"/musim/auth/x","dir":true,"nodes":[{"value":"http://nested:1"}]},
            {"key":"/musim/auth/y","value":"http://direct:1"}
        ]}}"#;
        assert_eq!(parse_instances("auth", body).unwrap(), vec!["http://direct:1"]);
    }

    #[test]
    fn test_parse_garbage_is_discovery_error() {
        assert!(matches!(
            parse_instances("auth", "<html>"),
            Err(SimError::Discovery(_))
        ));
    }

    #[test]
    fn test_keys_url_layout() {
        let config = DiscoveryConfig {
            endpoint: "http://etcd:2379/".to_string(),
            ..Default::default()
        };
        let discovery = EtcdDiscovery::new(&config).unwrap();
        assert_eq!(discovery.service_key("auth"), "musim/auth");
        assert_eq!(
            discovery.keys_url("musim/auth"),
            "http://etcd:2379/v2/keys/musim/auth"
        );
    }
}
