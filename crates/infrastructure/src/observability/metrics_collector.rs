//! 计时样本的Prometheus出口
//!
//! 样本通过 `metrics` 门面写入全局recorder，标签为节点名称、负载等级和地址。

use std::net::SocketAddr;

use metrics::{histogram, Histogram, Label};
use metrics_exporter_prometheus::PrometheusBuilder;
use musim_domain::MetricsSink;
use musim_errors::{SimError, SimResult};
use tracing::{debug, info};

pub const EXECUTION_TIME_METRIC: &str = "musim_execution_time_ms";
pub const RESPONSE_TIME_METRIC: &str = "musim_response_time_ms";

/// 安装全局Prometheus recorder，并在 `listen` 上提供抓取端点
pub fn install_prometheus_exporter(listen: SocketAddr) -> SimResult<()> {
    PrometheusBuilder::new()
        .with_http_listener(listen)
        .install()
        .map_err(|e| SimError::Internal(format!("Failed to create Prometheus exporter: {e}")))?;
    info!("Prometheus exporter listening on {}", listen);
    Ok(())
}

/// 将执行时间与响应时间写入直方图
pub struct PrometheusMetricsSink {
    execution_time: Histogram,
    response_time: Histogram,
}

impl PrometheusMetricsSink {
    pub fn new(name: &str, workload: &str, address: &str) -> Self {
        let labels = vec![
            Label::new("name", name.to_string()),
            Label::new("workload", workload.to_string()),
            Label::new("address", address.to_string()),
        ];
        Self {
            execution_time: histogram!(EXECUTION_TIME_METRIC, labels.clone()),
            response_time: histogram!(RESPONSE_TIME_METRIC, labels),
        }
    }
}

impl MetricsSink for PrometheusMetricsSink {
    fn record_execution_time(&self, ms: f64) {
        self.execution_time.record(ms);
        debug!(execution_time_ms = ms, "Execution time recorded");
    }

    fn record_response_time(&self, ms: f64) {
        self.response_time.record(ms);
        debug!(response_time_ms = ms, "Response time recorded");
    }
}

/// 关闭指标时使用，丢弃所有样本
#[derive(Debug, Default)]
pub struct NoopMetricsSink;

impl MetricsSink for NoopMetricsSink {
    fn record_execution_time(&self, _ms: f64) {}

    fn record_response_time(&self, _ms: f64) {}
}
