use std::sync::Arc;

use musim_domain::{
    Discovery, Message, MessageKind, MetricsSink, Request, RequestPhase, Transport, Workload,
    WorkloadClass, STATUS_DONE,
};
use musim_errors::{SimError, SimResult};
use tokio::sync::{broadcast, mpsc, Mutex};
use tracing::{debug, error, info, warn};

use crate::completion_tracker::{Acknowledgement, CompletionTracker};
use crate::fan_out::{FanOutCoordinator, FanOutOutcome};
use crate::id_allocator::IdAllocator;
use crate::job_registry::JobRegistry;

const DEFAULT_INBOUND_CAPACITY: usize = 1024;

/// 调度器构建器
pub struct DispatcherBuilder {
    node_name: String,
    address: String,
    workload_class: WorkloadClass,
    destinations: Vec<String>,
    discovery: Option<Arc<dyn Discovery>>,
    transport: Option<Arc<dyn Transport>>,
    metrics: Option<Arc<dyn MetricsSink>>,
    workload: Option<Arc<dyn Workload>>,
    jobs: Option<Arc<JobRegistry>>,
    history: Option<Arc<CompletionTracker>>,
    inbound_capacity: usize,
}

impl DispatcherBuilder {
    /// 创建新的构建器，`address` 是本节点对外的 `http://ip:port`
    pub fn new(node_name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            node_name: node_name.into(),
            address: address.into(),
            workload_class: WorkloadClass::default(),
            destinations: Vec::new(),
            discovery: None,
            transport: None,
            metrics: None,
            workload: None,
            jobs: None,
            history: None,
            inbound_capacity: DEFAULT_INBOUND_CAPACITY,
        }
    }

    /// 设置负载等级
    pub fn workload_class(mut self, workload_class: WorkloadClass) -> Self {
        self.workload_class = workload_class;
        self
    }

    /// 设置有序的扇出目的地
    pub fn destinations(mut self, destinations: Vec<String>) -> Self {
        self.destinations = destinations;
        self
    }

    pub fn discovery(mut self, discovery: Arc<dyn Discovery>) -> Self {
        self.discovery = Some(discovery);
        self
    }

    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn metrics(mut self, metrics: Arc<dyn MetricsSink>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn workload(mut self, workload: Arc<dyn Workload>) -> Self {
        self.workload = Some(workload);
        self
    }

    /// 使用外部共享的任务表
    pub fn job_registry(mut self, jobs: Arc<JobRegistry>) -> Self {
        self.jobs = Some(jobs);
        self
    }

    /// 使用外部共享的回复跟踪表
    pub fn completion_tracker(mut self, history: Arc<CompletionTracker>) -> Self {
        self.history = Some(history);
        self
    }

    /// 设置入站队列容量
    pub fn inbound_capacity(mut self, inbound_capacity: usize) -> Self {
        self.inbound_capacity = inbound_capacity.max(1);
        self
    }

    /// 构建Dispatcher，缺少协作方时返回配置错误
    pub fn build(self) -> SimResult<Dispatcher> {
        let discovery = self
            .discovery
            .ok_or_else(|| SimError::config_error("Dispatcher缺少服务发现"))?;
        let transport = self
            .transport
            .ok_or_else(|| SimError::config_error("Dispatcher缺少消息传输"))?;
        let metrics = self
            .metrics
            .ok_or_else(|| SimError::config_error("Dispatcher缺少指标接收方"))?;
        let workload = self
            .workload
            .ok_or_else(|| SimError::config_error("Dispatcher缺少模拟负载"))?;

        let (inbound_tx, inbound_rx) = mpsc::channel(self.inbound_capacity);
        let fan_out = FanOutCoordinator::new(
            discovery,
            Arc::clone(&transport),
            self.destinations,
            self.address.clone(),
        );

        Ok(Dispatcher {
            node_name: self.node_name,
            address: self.address,
            workload_class: self.workload_class,
            ids: IdAllocator::new(),
            jobs: self.jobs.unwrap_or_default(),
            history: self.history.unwrap_or_default(),
            fan_out,
            transport,
            metrics,
            workload,
            inbound_tx,
            inbound_rx: Mutex::new(Some(inbound_rx)),
        })
    }
}

/// 请求生命周期的中心调度器
///
/// 单个调度循环串行处理入站请求与计算完成信号，下游确认由HTTP处理器并发调用
/// [`Dispatcher::acknowledge`]。
pub struct Dispatcher {
    node_name: String,
    address: String,
    workload_class: WorkloadClass,
    ids: IdAllocator,
    jobs: Arc<JobRegistry>,
    history: Arc<CompletionTracker>,
    fan_out: FanOutCoordinator,
    transport: Arc<dyn Transport>,
    metrics: Arc<dyn MetricsSink>,
    workload: Arc<dyn Workload>,
    inbound_tx: mpsc::Sender<Request>,
    inbound_rx: Mutex<Option<mpsc::Receiver<Request>>>,
}

impl Dispatcher {
    /// 创建构建器
    pub fn builder(node_name: impl Into<String>, address: impl Into<String>) -> DispatcherBuilder {
        DispatcherBuilder::new(node_name, address)
    }

    pub fn node_name(&self) -> &str {
        &self.node_name
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn workload_class(&self) -> WorkloadClass {
        self.workload_class
    }

    pub fn destinations(&self) -> &[String] {
        self.fan_out.destinations()
    }

    pub fn jobs(&self) -> &Arc<JobRegistry> {
        &self.jobs
    }

    pub fn history(&self) -> &Arc<CompletionTracker> {
        &self.history
    }

    /// 接收一个新请求，返回它的关联ID
    ///
    /// `target` 指定单个下游服务时不做扇出。
    pub async fn admit(&self, message: &Message, target: Option<String>) -> SimResult<String> {
        let id = match message.correlation_id() {
            Some(id) => id.to_string(),
            None => self.ids.next_id().await,
        };
        let request = Request::new(
            id.clone(),
            message.sender.clone(),
            target,
            self.fan_out.destination_count() as i64,
        );

        if !self.jobs.insert(request.clone()).await {
            debug!(request_id = %id, "Caller supplied an id that is already computing");
        }
        if self.inbound_tx.send(request).await.is_err() {
            drop(self.jobs.hand_off(&id).await);
            return Err(SimError::DispatcherUnavailable);
        }

        debug!(request_id = %id, sender = %message.sender, phase = %RequestPhase::Received, "Request admitted");
        Ok(id)
    }

    /// 运行调度循环，直到收到停止信号
    pub async fn run(&self, mut stop: broadcast::Receiver<()>) -> SimResult<()> {
        let mut inbound = self
            .inbound_rx
            .lock()
            .await
            .take()
            .ok_or_else(|| SimError::Internal("调度循环已经启动".to_string()))?;
        let (done_tx, mut done_rx) = mpsc::unbounded_channel::<Request>();

        info!(
            node = %self.node_name,
            workload = %self.workload_class,
            destinations = ?self.fan_out.destinations(),
            "Dispatcher loop started"
        );

        loop {
            tokio::select! {
                Some(request) = inbound.recv() => {
                    self.start_computation(request, done_tx.clone());
                }
                Some(request) = done_rx.recv() => {
                    self.complete(request).await;
                }
                _ = stop.recv() => {
                    info!("Dispatcher loop received stop signal");
                    break;
                }
                else => break,
            }
        }

        Ok(())
    }

    fn start_computation(&self, request: Request, done_tx: mpsc::UnboundedSender<Request>) {
        let workload = Arc::clone(&self.workload);
        let class = self.workload_class;
        debug!(request_id = %request.id, phase = %RequestPhase::Computing, "Starting computation");

        tokio::spawn(async move {
            let mut request = request;
            match tokio::task::spawn_blocking(move || workload.execute(class)).await {
                Ok(burned) => debug!(
                    request_id = %request.id,
                    burned_ms = burned.as_secs_f64() * 1000.0,
                    "Workload finished"
                ),
                Err(e) => error!(request_id = %request.id, "Workload task failed: {}", e),
            }
            request.exec_time_ms = request.elapsed_ms();
            if done_tx.send(request).is_err() {
                warn!("Dispatcher loop is gone, completion signal dropped");
            }
        });
    }

    /// 处理计算完成信号
    ///
    /// 每个信号都会被最终处理；调用方ID冲突时任务表中只剩一个条目，其余信号照常回复各自的调用方。
    pub async fn complete(&self, request: Request) -> RequestPhase {
        let handoff = self.jobs.hand_off(&request.id).await;
        if !handoff.was_registered() {
            debug!(request_id = %request.id, "Job registry entry already removed, id was reused by a caller");
        }

        info!(
            request_id = %request.id,
            exec_time_ms = request.exec_time_ms,
            "service {} execution_time: {:.2}ms",
            self.node_name,
            request.exec_time_ms
        );
        self.metrics.record_execution_time(request.exec_time_ms);

        let phase = self.finalize(request).await;
        drop(handoff);
        phase
    }

    async fn finalize(&self, request: Request) -> RequestPhase {
        debug!(request_id = %request.id, phase = %RequestPhase::Finalizing, "Finalizing request");

        let phase = if let Some(service) = request.to.as_deref() {
            self.forward(&request, service).await
        } else if self.fan_out.destination_count() == 0 {
            self.reply(&request.from, &request.id, STATUS_DONE);
            RequestPhase::Completed
        } else {
            self.distribute(&request).await
        };

        debug!(request_id = %request.id, phase = %phase, "Request finalized");
        phase
    }

    async fn forward(&self, request: &Request, service: &str) -> RequestPhase {
        let mut tracked = request.clone();
        tracked.counter = 1;
        self.history.record(tracked).await;

        match self.fan_out.forward_to(&request.id, service).await {
            Ok(address) => {
                info!(request_id = %request.id, service, target = %address, "Request forwarded");
                RequestPhase::AwaitingDownstream
            }
            Err(e) => {
                self.history.withdraw(&request.id).await;
                warn!(request_id = %request.id, service, "Cannot forward request, dropping it: {}", e);
                RequestPhase::Completed
            }
        }
    }

    async fn distribute(&self, request: &Request) -> RequestPhase {
        let destinations = self.fan_out.destination_count();
        let mut tracked = request.clone();
        tracked.counter = destinations as i64;
        self.history.record(tracked).await;

        let errors = self.fan_out.fan_out(&request.id).await;
        let outcome = FanOutOutcome::evaluate(destinations, errors);

        if outcome.reply_immediately() {
            self.history.withdraw(&request.id).await;
            warn!(request_id = %request.id, errors, "Every destination failed, answering caller anyway");
            self.reply(&request.from, &request.id, STATUS_DONE);
            return RequestPhase::Completed;
        }

        if outcome.is_partial_failure() {
            warn!(
                request_id = %request.id,
                errors,
                expected = ?outcome.expected_replies(),
                "Fan-out stopped early"
            );
            if let Acknowledgement::Complete(done) =
                self.history.reduce(&request.id, errors as i64).await
            {
                self.reply(&done.from, &done.id, STATUS_DONE);
                return RequestPhase::Completed;
            }
        }

        info!(request_id = %request.id, destinations, "Added request to history");
        RequestPhase::AwaitingDownstream
    }

    /// 处理下游回复
    ///
    /// 未知的关联ID返回 `SimError::UnknownCorrelationId`，不修改任何状态。
    pub async fn acknowledge(&self, message: &Message) -> SimResult<Acknowledgement> {
        let id = message.args.as_str();
        let ack = self.history.decrement(id).await;

        let response_time_ms = match &ack {
            Acknowledgement::Unknown => {
                warn!(request_id = id, sender = %message.sender, "Cannot find request id in history");
                return Err(SimError::unknown_correlation_id(id));
            }
            Acknowledgement::Pending { request, remaining } => {
                debug!(request_id = id, remaining, "Updated counter of request");
                request.elapsed_ms()
            }
            Acknowledgement::Complete(request) => {
                info!(request_id = id, "Removed request from history");
                self.reply(&request.from, &request.id, &message.body);
                request.elapsed_ms()
            }
        };

        if message.is_done() {
            info!(
                request_id = id,
                response_time_ms,
                "service {} response_time: {:.2}ms",
                self.node_name,
                response_time_ms
            );
            self.metrics.record_response_time(response_time_ms);
        } else {
            warn!(request_id = id, status = %message.body, "Request lost");
        }

        Ok(ack)
    }

    /// 向 `destination` 异步发送回复
    fn reply(&self, destination: &str, request_id: &str, status: &str) {
        let transport = Arc::clone(&self.transport);
        let destination = destination.to_string();
        let message = Message::reply(self.address.clone(), request_id, status);

        tokio::spawn(async move {
            match transport
                .send(&destination, MessageKind::Response, &message)
                .await
            {
                Ok(()) => debug!(request_id = %message.args, target = %destination, "Response sent"),
                Err(e) => warn!(
                    request_id = %message.args,
                    target = %destination,
                    "Response was not delivered: {}",
                    e
                ),
            }
        });
    }
}
