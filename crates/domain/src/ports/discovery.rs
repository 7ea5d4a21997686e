use std::time::Duration;

use async_trait::async_trait;
use musim_errors::SimResult;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// 服务发现接口
#[async_trait]
pub trait Discovery: Send + Sync {
    /// 解析服务的可用实例地址，没有实例时返回 `SimError::NoInstances`
    async fn resolve_instances(&self, service: &str) -> SimResult<Vec<String>>;

    /// 将本节点注册到服务发现
    async fn register_self(&self, name: &str, address: &str) -> SimResult<()>;

    /// 注销本节点
    async fn unregister(&self) -> SimResult<()>;

    /// 刷新一次存活注册
    async fn refresh(&self) -> SimResult<()>;

    /// 周期性刷新存活注册，直到收到停止信号
    async fn keep_alive(&self, interval: Duration, mut stop: broadcast::Receiver<()>) {
        let mut ticker = tokio::time::interval(interval);
        // 第一次tick立即完成，注册时已经写入过
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match self.refresh().await {
                        Ok(()) => debug!("Liveness registration refreshed"),
                        Err(e) => warn!("Cannot keep the node alive: {}", e),
                    }
                }
                _ = stop.recv() => {
                    info!("Keep-alive task stopped");
                    break;
                }
            }
        }
    }
}
