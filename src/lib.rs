//! 微服务图模拟节点
//!
//! `app` 负责组装各个组件并运行HTTP服务，`shutdown` 负责收到信号后的排空流程。

pub mod app;
pub mod shutdown;

pub use app::Application;
pub use shutdown::ShutdownCoordinator;
