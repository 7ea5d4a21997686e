pub mod etcd_discovery;
pub mod http_transport;
pub mod observability;

pub use etcd_discovery::*;
pub use http_transport::*;
pub use observability::*;
