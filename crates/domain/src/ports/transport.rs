use async_trait::async_trait;
use musim_errors::SimResult;

use crate::entities::{Message, MessageKind};

/// 出站消息发送接口
#[async_trait]
pub trait Transport: Send + Sync {
    /// 将消息发送到 `address` 上与 `kind` 对应的端点
    async fn send(&self, address: &str, kind: MessageKind, message: &Message) -> SimResult<()>;
}
