//! 模拟负载
//!
//! 负载按等级采样出一个时长，然后在该时长内持续执行CPU计算（而不是睡眠），
//! 使节点表现为真实的负载生成器。

pub mod sampling;
pub mod simulator;

pub use sampling::LoadSampler;
pub use simulator::{approximate_pi, CpuBurnSimulator};
