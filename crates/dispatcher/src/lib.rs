//! 请求生命周期与扇出协调
//!
//! 调度器接收请求、运行模拟负载、将请求扇出到下游并汇总回复。
//! 任务表与回复跟踪表由调度器和关闭流程共享。

pub mod completion_tracker;
pub mod dispatcher;
pub mod fan_out;
pub mod id_allocator;
pub mod job_registry;

pub use completion_tracker::{Acknowledgement, CompletionTracker};
pub use dispatcher::{Dispatcher, DispatcherBuilder};
pub use fan_out::{pick_instance, FanOutCoordinator, FanOutOutcome};
pub use id_allocator::IdAllocator;
pub use job_registry::{Handoff, JobRegistry};
