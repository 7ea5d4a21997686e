/// 计时样本的接收方，调用方不关心写入结果
pub trait MetricsSink: Send + Sync {
    fn record_execution_time(&self, ms: f64);
    fn record_response_time(&self, ms: f64);
}
