use thiserror::Error;

#[derive(Debug, Error)]
pub enum SimError {
    #[error("服务没有可用实例: {service}")]
    NoInstances { service: String },
    #[error("服务发现错误: {0}")]
    Discovery(String),
    #[error("传输错误: {0}")]
    Transport(String),
    #[error("未知的关联ID: {id}")]
    UnknownCorrelationId { id: String },
    #[error("无法解析的消息: {0}")]
    MalformedMessage(String),
    #[error("调度循环不再接收请求")]
    DispatcherUnavailable,
    #[error("配置错误: {0}")]
    Configuration(String),
    #[error("序列化错误: {0}")]
    Serialization(String),
    #[error("内部错误: {0}")]
    Internal(String),
}

pub type SimResult<T> = Result<T, SimError>;

impl SimError {
    pub fn no_instances<S: Into<String>>(service: S) -> Self {
        Self::NoInstances {
            service: service.into(),
        }
    }
    pub fn discovery<S: Into<String>>(msg: S) -> Self {
        Self::Discovery(msg.into())
    }
    pub fn transport<S: Into<String>>(msg: S) -> Self {
        Self::Transport(msg.into())
    }
    pub fn unknown_correlation_id<S: Into<String>>(id: S) -> Self {
        Self::UnknownCorrelationId { id: id.into() }
    }
    pub fn malformed<S: Into<String>>(msg: S) -> Self {
        Self::MalformedMessage(msg.into())
    }
    pub fn config_error<S: Into<String>>(msg: S) -> Self {
        Self::Configuration(msg.into())
    }
    /// 调用方输入导致的错误，对应HTTP 422
    pub fn is_unprocessable(&self) -> bool {
        matches!(
            self,
            SimError::MalformedMessage(_) | SimError::UnknownCorrelationId { .. }
        )
    }
    /// 无法继续运行的错误
    pub fn is_fatal(&self) -> bool {
        matches!(self, SimError::Internal(_) | SimError::Configuration(_))
    }
}

impl From<serde_json::Error> for SimError {
    fn from(err: serde_json::Error) -> Self {
        SimError::Serialization(err.to_string())
    }
}

impl From<anyhow::Error> for SimError {
    fn from(err: anyhow::Error) -> Self {
        SimError::Internal(err.to_string())
    }
}

#[cfg(test)]
mod tests;
