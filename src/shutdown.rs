use std::sync::Arc;
use std::time::Duration;

use musim_dispatcher::{CompletionTracker, JobRegistry};
use musim_domain::{Discovery, ShutdownPhase};
use tokio::sync::{broadcast, watch};
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// 优雅关闭协调器
///
/// 收到终止信号后依次：停止存活续约、从服务发现注销、等待任务表清空、
/// 等待回复跟踪表清空，最后进入 `Stopped`。排空期间调度器照常接收新请求。
pub struct ShutdownCoordinator {
    discovery: Arc<dyn Discovery>,
    jobs: Arc<JobRegistry>,
    history: Arc<CompletionTracker>,
    poll_interval: Duration,
    /// 存活续约的停止信号
    liveness_tx: broadcast::Sender<()>,
    phase_tx: watch::Sender<ShutdownPhase>,
    phase_rx: watch::Receiver<ShutdownPhase>,
}

impl ShutdownCoordinator {
    /// 创建新的关闭协调器
    pub fn new(
        discovery: Arc<dyn Discovery>,
        jobs: Arc<JobRegistry>,
        history: Arc<CompletionTracker>,
        poll_interval: Duration,
    ) -> Self {
        let (liveness_tx, _) = broadcast::channel(1);
        let (phase_tx, phase_rx) = watch::channel(ShutdownPhase::Running);

        Self {
            discovery,
            jobs,
            history,
            poll_interval,
            liveness_tx,
            phase_tx,
            phase_rx,
        }
    }

    /// 订阅存活续约的停止信号
    pub fn subscribe_liveness(&self) -> broadcast::Receiver<()> {
        self.liveness_tx.subscribe()
    }

    /// 订阅关闭阶段的变化
    pub fn watch_phase(&self) -> watch::Receiver<ShutdownPhase> {
        self.phase_rx.clone()
    }

    pub fn phase(&self) -> ShutdownPhase {
        *self.phase_rx.borrow()
    }

    /// 执行排空流程，已经触发过时直接返回false
    pub async fn drain(&self) -> bool {
        let started = self.phase_tx.send_if_modified(|phase| {
            if *phase == ShutdownPhase::Running {
                *phase = ShutdownPhase::Draining;
                true
            } else {
                false
            }
        });
        if !started {
            debug!("关闭流程已经触发过");
            return false;
        }

        info!("开始优雅关闭，停止存活续约");
        let receivers = self.liveness_tx.send(()).unwrap_or(0);
        debug!("存活续约停止信号发送给 {} 个订阅者", receivers);

        match self.discovery.unregister().await {
            Ok(()) => info!("已从服务发现注销"),
            Err(e) => warn!("从服务发现注销失败: {}", e),
        }

        info!("等待本地计算完成");
        while self.jobs.is_busy().await {
            let jobs = self.jobs.len().await;
            let handoffs = self.jobs.handoffs_in_progress();
            debug!(jobs, handoffs, "仍有请求在计算");
            sleep(self.poll_interval).await;
        }

        // 排空期间仍会接收新请求，两张表必须同时为空
        info!("等待下游回复");
        while self.jobs.is_busy().await || !self.history.is_empty().await {
            let jobs = self.jobs.len().await;
            let pending = self.history.pending_count().await;
            debug!(jobs, pending, "仍有请求等待完成");
            sleep(self.poll_interval).await;
        }

        self.phase_tx.send_replace(ShutdownPhase::Stopped);
        info!("排空完成，节点可以退出");
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use musim_testing_utils::{MockDiscovery, RequestBuilder};
    use tokio::time::timeout;

    fn coordinator(
        discovery: &MockDiscovery,
    ) -> (
        Arc<ShutdownCoordinator>,
        Arc<JobRegistry>,
        Arc<CompletionTracker>,
    ) {
        let jobs = Arc::new(JobRegistry::new());
        let history = Arc::new(CompletionTracker::new());
        let coordinator = ShutdownCoordinator::new(
            Arc::new(discovery.clone()),
            Arc::clone(&jobs),
            Arc::clone(&history),
            Duration::from_millis(10),
        );
        (Arc::new(coordinator), jobs, history)
    }

    #[tokio::test]
    async fn test_drain_with_empty_registries_stops_immediately() {
        let discovery = MockDiscovery::new();
        let (shutdown, _, _) = coordinator(&discovery);
        let mut liveness = shutdown.subscribe_liveness();

        assert_eq!(shutdown.phase(), ShutdownPhase::Running);
        assert!(shutdown.drain().await);

        assert_eq!(shutdown.phase(), ShutdownPhase::Stopped);
        assert!(liveness.try_recv().is_ok());
        assert_eq!(discovery.unregister_count(), 1);
    }

    #[tokio::test]
    async fn test_drain_waits_for_jobs_then_history() {
        let discovery = MockDiscovery::new();
        let (shutdown, jobs, history) = coordinator(&discovery);
        jobs.insert(RequestBuilder::new("1").build()).await;
        history
            .record(RequestBuilder::new("2").with_counter(1).build())
            .await;

        let drain = {
            let shutdown = Arc::clone(&shutdown);
            tokio::spawn(async move { shutdown.drain().await })
        };

        sleep(Duration::from_millis(50)).await;
        assert_eq!(shutdown.phase(), ShutdownPhase::Draining);
        assert_eq!(discovery.unregister_count(), 1);

        drop(jobs.hand_off("1").await);
        sleep(Duration::from_millis(50)).await;
        assert_eq!(shutdown.phase(), ShutdownPhase::Draining);

        assert!(history.decrement("2").await.is_complete());
        let finished = timeout(Duration::from_secs(1), drain).await;
        assert!(matches!(finished, Ok(Ok(true))));
        assert_eq!(shutdown.phase(), ShutdownPhase::Stopped);
    }

    #[tokio::test]
    async fn test_pending_handoff_keeps_drain_waiting() {
        let discovery = MockDiscovery::new();
        let (shutdown, jobs, _) = coordinator(&discovery);
        jobs.insert(RequestBuilder::new("1").build()).await;
        let handoff = jobs.hand_off("1").await;

        let drain = {
            let shutdown = Arc::clone(&shutdown);
            tokio::spawn(async move { shutdown.drain().await })
        };

        sleep(Duration::from_millis(50)).await;
        assert_eq!(shutdown.phase(), ShutdownPhase::Draining);

        drop(handoff);
        let finished = timeout(Duration::from_secs(1), drain).await;
        assert!(matches!(finished, Ok(Ok(true))));
    }

    #[tokio::test]
    async fn test_job_admitted_while_awaiting_replies_keeps_drain_open() {
        let discovery = MockDiscovery::new();
        let (shutdown, jobs, history) = coordinator(&discovery);
        history
            .record(RequestBuilder::new("h").with_counter(1).build())
            .await;

        let drain = {
            let shutdown = Arc::clone(&shutdown);
            tokio::spawn(async move { shutdown.drain().await })
        };

        sleep(Duration::from_millis(50)).await;
        jobs.insert(RequestBuilder::new("late").build()).await;
        assert!(history.decrement("h").await.is_complete());

        sleep(Duration::from_millis(100)).await;
        assert_eq!(shutdown.phase(), ShutdownPhase::Draining);
        assert!(!drain.is_finished());

        drop(jobs.hand_off("late").await);
        let finished = timeout(Duration::from_secs(1), drain).await;
        assert!(matches!(finished, Ok(Ok(true))));
        assert_eq!(shutdown.phase(), ShutdownPhase::Stopped);
        assert!(jobs.is_empty().await);
    }

    #[tokio::test]
    async fn test_second_trigger_is_noop() {
        let discovery = MockDiscovery::new();
        let (shutdown, _, _) = coordinator(&discovery);

        assert!(shutdown.drain().await);
        assert!(!shutdown.drain().await);
        assert_eq!(discovery.unregister_count(), 1);
    }

    #[tokio::test]
    async fn test_unregister_failure_does_not_block_drain() {
        let discovery = MockDiscovery::new();
        discovery.fail_unregister(true);
        let (shutdown, _, _) = coordinator(&discovery);

        assert!(shutdown.drain().await);
        assert_eq!(shutdown.phase(), ShutdownPhase::Stopped);
    }
}
