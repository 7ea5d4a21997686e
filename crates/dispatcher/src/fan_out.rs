use std::sync::Arc;

use musim_domain::{Discovery, Message, MessageKind, Transport};
use musim_errors::{SimError, SimResult};
use rand::Rng;
use tracing::{debug, warn};

/// 扇出结束后对请求的处理决定
///
/// `destinations` 为配置的目的地数量N，`errors` 为解析失败次数E。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FanOutOutcome {
    pub destinations: usize,
    pub errors: usize,
}

impl FanOutOutcome {
    pub fn evaluate(destinations: usize, errors: usize) -> Self {
        Self {
            destinations,
            errors,
        }
    }

    /// 需要等待的下游回复数，全部失败时为None
    ///
    /// 扇出在第一次失败后就停止，实际发出的消息可能少于N-E，这里仍按N-E计数。
    pub fn expected_replies(&self) -> Option<i64> {
        if self.errors < self.destinations {
            Some((self.destinations - self.errors) as i64)
        } else {
            None
        }
    }

    /// 所有目的地都失败，直接回复调用方
    pub fn reply_immediately(&self) -> bool {
        self.errors >= self.destinations
    }

    pub fn is_partial_failure(&self) -> bool {
        self.errors > 0 && self.errors < self.destinations
    }
}

/// 将请求复制并发送给配置的下游目的地
pub struct FanOutCoordinator {
    discovery: Arc<dyn Discovery>,
    transport: Arc<dyn Transport>,
    destinations: Vec<String>,
    self_address: String,
}

impl FanOutCoordinator {
    pub fn new(
        discovery: Arc<dyn Discovery>,
        transport: Arc<dyn Transport>,
        destinations: Vec<String>,
        self_address: String,
    ) -> Self {
        Self {
            discovery,
            transport,
            destinations,
            self_address,
        }
    }

    pub fn destination_count(&self) -> usize {
        self.destinations.len()
    }

    pub fn destinations(&self) -> &[String] {
        &self.destinations
    }

    /// 按顺序向每个目的地发送工作消息，返回解析失败的次数
    ///
    /// 第一次解析失败后不再处理剩余的目的地。
    pub async fn fan_out(&self, request_id: &str) -> usize {
        let mut errors = 0;
        for service in &self.destinations {
            match self.discovery.resolve_instances(service).await {
                Ok(instances) => match pick_instance(&instances) {
                    Some(address) => self.dispatch(address.clone(), request_id),
                    None => {
                        warn!(request_id, service = %service, "Discovery returned no instances");
                        errors += 1;
                        break;
                    }
                },
                Err(e) => {
                    warn!(request_id, service = %service, "Cannot resolve destination: {}", e);
                    errors += 1;
                    break;
                }
            }
        }
        errors
    }

    /// 解析指定服务的一个实例并转发，返回选中的地址
    pub async fn forward_to(&self, request_id: &str, service: &str) -> SimResult<String> {
        let instances = self.discovery.resolve_instances(service).await?;
        let address = pick_instance(&instances)
            .cloned()
            .ok_or_else(|| SimError::no_instances(service))?;
        self.dispatch(address.clone(), request_id);
        Ok(address)
    }

    fn dispatch(&self, address: String, request_id: &str) {
        let transport = Arc::clone(&self.transport);
        let message = Message::work(self.self_address.clone(), request_id);
        debug!(request_id, target = %address, "Dispatching work message");
        tokio::spawn(async move {
            if let Err(e) = transport.send(&address, MessageKind::Work, &message).await {
                warn!(
                    request_id = %message.args,
                    target = %address,
                    "Work message was not delivered: {}",
                    e
                );
            }
        });
    }
}

/// 只有一个实例时直接使用，否则均匀随机选择
pub fn pick_instance(instances: &[String]) -> Option<&String> {
    match instances.len() {
        0 => None,
        1 => instances.first(),
        n => instances.get(rand::rng().random_range(0..n)),
    }
}
