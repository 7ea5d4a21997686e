use std::future::Future;
use std::net::{SocketAddr, UdpSocket};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use musim_api::{create_app, AppState};
use musim_config::AppConfig;
use musim_dispatcher::{CompletionTracker, Dispatcher, JobRegistry};
use musim_domain::{Discovery, MetricsSink, ShutdownPhase};
use musim_infrastructure::{
    install_prometheus_exporter, EtcdDiscovery, HttpTransport, NoopMetricsSink,
    PrometheusMetricsSink,
};
use musim_worker::{CpuBurnSimulator, LoadSampler};
use tokio::{net::TcpListener, sync::broadcast};
use tracing::{error, info};

use crate::shutdown::ShutdownCoordinator;

/// 模拟节点
pub struct Application {
    config: AppConfig,
    address: String,
    listener: TcpListener,
    discovery: Arc<dyn Discovery>,
    dispatcher: Arc<Dispatcher>,
    shutdown: Arc<ShutdownCoordinator>,
}

impl Application {
    /// 创建新的应用实例，连接etcd并注册本节点
    pub async fn new(config: AppConfig) -> Result<Self> {
        let listener = bind_listener(config.node.port).await?;
        let ip = config
            .node
            .ip_address
            .clone()
            .unwrap_or_else(probe_host_ip);
        let address = node_address(&ip, &listener)?;

        let discovery = EtcdDiscovery::connect(&config.discovery)
            .await
            .with_context(|| format!("连接服务发现失败: {}", config.discovery.endpoint))?;

        Self::with_discovery(config, listener, address, Arc::new(discovery)).await
    }

    /// 使用给定的服务发现组装节点
    pub async fn with_discovery(
        config: AppConfig,
        listener: TcpListener,
        address: String,
        discovery: Arc<dyn Discovery>,
    ) -> Result<Self> {
        info!("初始化节点 {}，地址: {}", config.node.name, address);

        discovery
            .register_self(&config.node.name, &address)
            .await
            .context("注册到服务发现失败")?;

        let metrics = create_metrics_sink(&config, &address)?;
        let transport = HttpTransport::new(Duration::from_secs(
            config.discovery.request_timeout_seconds,
        ))?;
        let workload = CpuBurnSimulator::new(LoadSampler::new(
            config.workload.distribution,
            config.workload.scale_factor,
        ));

        let jobs = Arc::new(JobRegistry::new());
        let history = Arc::new(CompletionTracker::new());

        let dispatcher = Dispatcher::builder(config.node.name.clone(), address.clone())
            .workload_class(config.node.workload)
            .destinations(config.node.destinations.clone())
            .discovery(Arc::clone(&discovery))
            .transport(Arc::new(transport))
            .metrics(metrics)
            .workload(Arc::new(workload))
            .job_registry(Arc::clone(&jobs))
            .completion_tracker(Arc::clone(&history))
            .build()
            .context("创建调度器失败")?;

        let shutdown = ShutdownCoordinator::new(
            Arc::clone(&discovery),
            jobs,
            history,
            Duration::from_millis(config.shutdown.drain_poll_interval_ms),
        );

        Ok(Self {
            config,
            address,
            listener,
            discovery,
            dispatcher: Arc::new(dispatcher),
            shutdown: Arc::new(shutdown),
        })
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    pub fn shutdown(&self) -> &Arc<ShutdownCoordinator> {
        &self.shutdown
    }

    /// 运行节点，直到 `signal` 完成并且排空结束
    pub async fn run<F>(self, signal: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        info!(
            "节点 {} 启动，负载: {}，目的地: {:?}",
            self.config.node.name, self.config.node.workload, self.config.node.destinations
        );

        // 存活续约
        let keep_alive_handle = {
            let discovery = Arc::clone(&self.discovery);
            let interval = Duration::from_secs(self.config.discovery.keep_alive_interval_seconds);
            let stop = self.shutdown.subscribe_liveness();
            tokio::spawn(async move { discovery.keep_alive(interval, stop).await })
        };

        // 调度循环在排空期间继续运行
        let (dispatcher_stop, _) = broadcast::channel(1);
        let dispatcher_handle = {
            let dispatcher = Arc::clone(&self.dispatcher);
            let stop = dispatcher_stop.subscribe();
            tokio::spawn(async move {
                if let Err(e) = dispatcher.run(stop).await {
                    error!("调度循环运行失败: {}", e);
                }
            })
        };

        // HTTP服务在排空结束后才停止，下游回复仍然可以到达
        let server_handle = {
            let app = create_app(AppState::new(
                Arc::clone(&self.dispatcher),
                self.shutdown.watch_phase(),
            ));
            let mut phase = self.shutdown.watch_phase();
            let listener = self.listener;
            tokio::spawn(async move {
                let stopped = async move {
                    let _ = phase.wait_for(|p| *p == ShutdownPhase::Stopped).await;
                };
                if let Err(e) = axum::serve(listener, app).with_graceful_shutdown(stopped).await {
                    error!("HTTP服务器运行失败: {}", e);
                }
            })
        };

        info!("HTTP服务器启动在 {}", self.address);

        signal.await;
        info!("收到关闭信号，开始排空...");

        self.shutdown.drain().await;

        let _ = dispatcher_stop.send(());
        let _ = tokio::join!(keep_alive_handle, dispatcher_handle, server_handle);

        info!("节点 {} 已退出", self.config.node.name);
        Ok(())
    }
}

/// 绑定HTTP监听端口，未指定时由系统分配空闲端口
pub async fn bind_listener(port: Option<u16>) -> Result<TcpListener> {
    let bind_addr = SocketAddr::from(([0, 0, 0, 0], port.unwrap_or(0)));
    TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("绑定地址失败: {bind_addr}"))
}

/// 本节点对外公布的地址
pub fn node_address(ip: &str, listener: &TcpListener) -> Result<String> {
    let port = listener.local_addr().context("读取监听地址失败")?.port();
    Ok(format!("http://{ip}:{port}"))
}

/// 第一个非回环的IPv4地址，探测失败时回退到127.0.0.1
///
/// UDP的connect只选择路由，不发送数据。
pub fn probe_host_ip() -> String {
    UdpSocket::bind("0.0.0.0:0")
        .and_then(|socket| {
            socket.connect("8.8.8.8:80")?;
            socket.local_addr()
        })
        .ok()
        .map(|addr| addr.ip())
        .filter(|ip| ip.is_ipv4() && !ip.is_loopback() && !ip.is_unspecified())
        .map(|ip| ip.to_string())
        .unwrap_or_else(|| "127.0.0.1".to_string())
}

fn create_metrics_sink(config: &AppConfig, address: &str) -> Result<Arc<dyn MetricsSink>> {
    if !config.metrics.enabled {
        info!("指标已关闭");
        return Ok(Arc::new(NoopMetricsSink));
    }

    if let Some(listen) = &config.metrics.exporter_address {
        let listen: SocketAddr = listen
            .parse()
            .with_context(|| format!("无效的指标监听地址: {listen}"))?;
        install_prometheus_exporter(listen).context("启动Prometheus导出器失败")?;
    }

    Ok(Arc::new(PrometheusMetricsSink::new(
        &config.node.name,
        config.node.workload.as_str(),
        address,
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probe_host_ip_is_ipv4() {
        let ip = probe_host_ip();
        assert!(ip.parse::<std::net::Ipv4Addr>().is_ok());
    }

    #[tokio::test]
    async fn test_os_assigns_port_when_unset() {
        let listener = bind_listener(None).await.unwrap();
        let address = node_address("10.1.2.3", &listener).unwrap();
        assert!(address.starts_with("http://10.1.2.3:"));
        assert_ne!(address, "http://10.1.2.3:0");
    }
}
