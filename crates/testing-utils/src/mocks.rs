//! In-memory implementations of the node's collaborator traits
//!
//! These mocks record every call so tests can assert on what the dispatcher
//! did without a discovery server or network.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use musim_domain::{
    Discovery, Message, MessageKind, MetricsSink, Transport, Workload, WorkloadClass,
};
use musim_errors::{SimError, SimResult};

/// Mock implementation of Discovery for testing
#[derive(Debug, Clone, Default)]
pub struct MockDiscovery {
    services: Arc<Mutex<HashMap<String, Vec<String>>>>,
    resolve_calls: Arc<Mutex<Vec<String>>>,
    registrations: Arc<Mutex<Vec<(String, String)>>>,
    unregister_calls: Arc<AtomicUsize>,
    refresh_calls: Arc<AtomicUsize>,
    fail_unregister: Arc<Mutex<bool>>,
}

impl MockDiscovery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_service(self, service: &str, instances: &[&str]) -> Self {
        self.set_instances(service, instances);
        self
    }

    pub fn set_instances(&self, service: &str, instances: &[&str]) {
        self.services.lock().unwrap().insert(
            service.to_string(),
            instances.iter().map(|s| s.to_string()).collect(),
        );
    }

    pub fn remove_service(&self, service: &str) {
        self.services.lock().unwrap().remove(service);
    }

    pub fn fail_unregister(&self, fail: bool) {
        *self.fail_unregister.lock().unwrap() = fail;
    }

    /// Services passed to `resolve_instances`, in call order
    pub fn resolve_calls(&self) -> Vec<String> {
        self.resolve_calls.lock().unwrap().clone()
    }

    pub fn registrations(&self) -> Vec<(String, String)> {
        self.registrations.lock().unwrap().clone()
    }

    pub fn unregister_count(&self) -> usize {
        self.unregister_calls.load(Ordering::SeqCst)
    }

    pub fn refresh_count(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Discovery for MockDiscovery {
    async fn resolve_instances(&self, service: &str) -> SimResult<Vec<String>> {
        self.resolve_calls
            .lock()
            .unwrap()
            .push(service.to_string());
        match self.services.lock().unwrap().get(service) {
            Some(instances) if !instances.is_empty() => Ok(instances.clone()),
            _ => Err(SimError::no_instances(service)),
        }
    }

    async fn register_self(&self, name: &str, address: &str) -> SimResult<()> {
        self.registrations
            .lock()
            .unwrap()
            .push((name.to_string(), address.to_string()));
        Ok(())
    }

    async fn unregister(&self) -> SimResult<()> {
        self.unregister_calls.fetch_add(1, Ordering::SeqCst);
        if *self.fail_unregister.lock().unwrap() {
            return Err(SimError::discovery("unregister rejected"));
        }
        Ok(())
    }

    async fn refresh(&self) -> SimResult<()> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// A message captured by [`RecordingTransport`]
#[derive(Debug, Clone, PartialEq)]
pub struct SentMessage {
    pub address: String,
    pub kind: MessageKind,
    pub message: Message,
}

/// Transport that records outbound messages instead of sending them
#[derive(Debug, Clone, Default)]
pub struct RecordingTransport {
    sent: Arc<Mutex<Vec<SentMessage>>>,
    failing: Arc<Mutex<HashSet<String>>>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sends to `address` return a transport error
    pub fn fail_address(&self, address: &str) {
        self.failing.lock().unwrap().insert(address.to_string());
    }

    pub fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().unwrap().clone()
    }

    pub fn count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }

    pub fn sent_to(&self, address: &str) -> Vec<SentMessage> {
        self.sent()
            .into_iter()
            .filter(|s| s.address == address)
            .collect()
    }

    pub fn work_messages(&self) -> Vec<SentMessage> {
        self.of_kind(MessageKind::Work)
    }

    pub fn responses(&self) -> Vec<SentMessage> {
        self.of_kind(MessageKind::Response)
    }

    fn of_kind(&self, kind: MessageKind) -> Vec<SentMessage> {
        self.sent()
            .into_iter()
            .filter(|s| s.kind == kind)
            .collect()
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn send(&self, address: &str, kind: MessageKind, message: &Message) -> SimResult<()> {
        if self.failing.lock().unwrap().contains(address) {
            return Err(SimError::transport(format!("connection refused: {address}")));
        }
        self.sent.lock().unwrap().push(SentMessage {
            address: address.to_string(),
            kind,
            message: message.clone(),
        });
        Ok(())
    }
}

/// Metrics sink that keeps every sample in memory
#[derive(Debug, Clone, Default)]
pub struct RecordingMetrics {
    execution_times: Arc<Mutex<Vec<f64>>>,
    response_times: Arc<Mutex<Vec<f64>>>,
}

impl RecordingMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn execution_times(&self) -> Vec<f64> {
        self.execution_times.lock().unwrap().clone()
    }

    pub fn response_times(&self) -> Vec<f64> {
        self.response_times.lock().unwrap().clone()
    }
}

impl MetricsSink for RecordingMetrics {
    fn record_execution_time(&self, ms: f64) {
        self.execution_times.lock().unwrap().push(ms);
    }

    fn record_response_time(&self, ms: f64) {
        self.response_times.lock().unwrap().push(ms);
    }
}

/// Workload that returns immediately, or after a fixed sleep
#[derive(Debug, Clone, Default)]
pub struct InstantWorkload {
    delay: Duration,
    executions: Arc<Mutex<Vec<WorkloadClass>>>,
}

impl InstantWorkload {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    pub fn executions(&self) -> Vec<WorkloadClass> {
        self.executions.lock().unwrap().clone()
    }
}

impl Workload for InstantWorkload {
    fn execute(&self, class: WorkloadClass) -> Duration {
        self.executions.lock().unwrap().push(class);
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        self.delay
    }
}

/// Workload that blocks every computation until [`GatedWorkload::release`] is called
#[derive(Debug, Clone, Default)]
pub struct GatedWorkload {
    gate: Arc<(Mutex<bool>, Condvar)>,
}

impl GatedWorkload {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn release(&self) {
        let (open, cvar) = &*self.gate;
        *open.lock().unwrap() = true;
        cvar.notify_all();
    }
}

impl Workload for GatedWorkload {
    fn execute(&self, _class: WorkloadClass) -> Duration {
        let (open, cvar) = &*self.gate;
        let mut released = open.lock().unwrap();
        while !*released {
            released = cvar.wait(released).unwrap();
        }
        Duration::ZERO
    }
}
