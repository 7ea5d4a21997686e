//! 节点与外部协作方之间的接口

pub mod discovery;
pub mod metrics;
pub mod transport;
pub mod workload;

pub use discovery::Discovery;
pub use metrics::MetricsSink;
pub use transport::Transport;
pub use workload::Workload;
