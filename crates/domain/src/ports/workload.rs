use std::time::Duration;

use crate::value_objects::WorkloadClass;

/// 可插拔的模拟负载
///
/// `execute` 会阻塞调用线程并真实占用CPU，调用方需要在阻塞线程池中运行它。
pub trait Workload: Send + Sync {
    fn execute(&self, class: WorkloadClass) -> Duration;
}
