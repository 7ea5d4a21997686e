use std::time::Instant;

use chrono::{DateTime, Utc};
use musim_errors::{SimError, SimResult};
use serde::{Deserialize, Serialize};

/// 工作消息的固定内容
pub const BODY_DO: &str = "do";
/// 请求完成时的回复状态
pub const STATUS_DONE: &str = "done";

pub const MESSAGE_PATH: &str = "/message";
pub const RESPONSE_PATH: &str = "/response";

/// 入站消息体的最大字节数
pub const MAX_MESSAGE_BYTES: usize = 1024 * 1024;

/// 节点之间传递的消息
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Message {
    pub sender: String,
    pub body: String,
    pub args: String,
}

impl Message {
    pub fn new(
        sender: impl Into<String>,
        body: impl Into<String>,
        args: impl Into<String>,
    ) -> Self {
        Self {
            sender: sender.into(),
            body: body.into(),
            args: args.into(),
        }
    }

    /// 转发给下游节点的工作消息
    pub fn work(sender: impl Into<String>, request_id: impl Into<String>) -> Self {
        Self::new(sender, BODY_DO, request_id)
    }

    /// 发给调用方的回复消息
    pub fn reply(
        sender: impl Into<String>,
        request_id: impl Into<String>,
        status: impl Into<String>,
    ) -> Self {
        Self::new(sender, status, request_id)
    }

    /// 从HTTP请求体解析消息
    pub fn parse(bytes: &[u8]) -> SimResult<Self> {
        if bytes.len() > MAX_MESSAGE_BYTES {
            return Err(SimError::malformed(format!(
                "message body exceeds {MAX_MESSAGE_BYTES} bytes"
            )));
        }
        serde_json::from_slice(bytes).map_err(|e| SimError::malformed(e.to_string()))
    }

    /// 调用方提供的关联ID，空字符串视为未提供
    pub fn correlation_id(&self) -> Option<&str> {
        if self.args.is_empty() {
            None
        } else {
            Some(self.args.as_str())
        }
    }

    pub fn is_done(&self) -> bool {
        self.body == STATUS_DONE
    }
}

/// 出站消息的种类，决定目标路径
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageKind {
    Work,
    Response,
}

impl MessageKind {
    pub fn path(&self) -> &'static str {
        match self {
            MessageKind::Work => MESSAGE_PATH,
            MessageKind::Response => RESPONSE_PATH,
        }
    }
}

/// 在节点中流转的请求
#[derive(Debug, Clone)]
pub struct Request {
    pub id: String,
    /// 最终结果的通知地址
    pub from: String,
    /// 指定的单个下游服务，与目的地集合扇出互斥
    pub to: Option<String>,
    /// 尚待确认的下游回复数量
    pub counter: i64,
    pub start: Instant,
    pub received_at: DateTime<Utc>,
    pub exec_time_ms: f64,
}

impl Request {
    pub fn new(
        id: impl Into<String>,
        from: impl Into<String>,
        to: Option<String>,
        counter: i64,
    ) -> Self {
        Self {
            id: id.into(),
            from: from.into(),
            to,
            counter,
            start: Instant::now(),
            received_at: Utc::now(),
            exec_time_ms: 0.0,
        }
    }

    /// 自到达以来经过的毫秒数
    pub fn elapsed_ms(&self) -> f64 {
        self.start.elapsed().as_secs_f64() * 1000.0
    }
}
