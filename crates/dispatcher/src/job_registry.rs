use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use musim_domain::Request;
use tokio::sync::Mutex;

/// 正在本地计算的请求
///
/// 条目由调度循环在处理完成信号时通过 [`JobRegistry::hand_off`] 移除，且只移除一次。
#[derive(Debug, Default)]
pub struct JobRegistry {
    jobs: Mutex<HashMap<String, Request>>,
    handoffs: Arc<AtomicUsize>,
}

/// 请求离开任务表、尚未进入最终状态期间持有的凭据
///
/// 凭据存活时 [`JobRegistry::is_busy`] 仍然返回true。
#[derive(Debug)]
pub struct Handoff {
    request: Option<Request>,
    in_progress: Arc<AtomicUsize>,
}

impl Handoff {
    /// 移除时该ID是否确实在任务表中
    pub fn was_registered(&self) -> bool {
        self.request.is_some()
    }

    pub fn request(&self) -> Option<&Request> {
        self.request.as_ref()
    }
}

impl Drop for Handoff {
    fn drop(&mut self) {
        self.in_progress.fetch_sub(1, Ordering::SeqCst);
    }
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 登记请求，ID已存在时替换旧条目并返回false
    pub async fn insert(&self, request: Request) -> bool {
        let mut jobs = self.jobs.lock().await;
        jobs.insert(request.id.clone(), request).is_none()
    }

    pub async fn contains(&self, id: &str) -> bool {
        self.jobs.lock().await.contains_key(id)
    }

    pub async fn len(&self) -> usize {
        self.jobs.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.jobs.lock().await.is_empty()
    }

    /// 移除请求并返回交接凭据
    pub async fn hand_off(&self, id: &str) -> Handoff {
        let mut jobs = self.jobs.lock().await;
        // 先计数再移除，保证排空轮询不会看到两边同时为空
        self.handoffs.fetch_add(1, Ordering::SeqCst);
        let request = jobs.remove(id);
        Handoff {
            request,
            in_progress: Arc::clone(&self.handoffs),
        }
    }

    pub fn handoffs_in_progress(&self) -> usize {
        self.handoffs.load(Ordering::SeqCst)
    }

    /// 仍有请求在计算或正在交接
    pub async fn is_busy(&self) -> bool {
        let jobs = self.jobs.lock().await;
        !jobs.is_empty() || self.handoffs.load(Ordering::SeqCst) > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(id: &str) -> Request {
        Request::new(id, "http://caller:1", None, 0)
    }

    #[tokio::test]
    async fn test_insert_reports_collision() {
        let registry = JobRegistry::new();
        assert!(registry.insert(request("1")).await);
        assert!(!registry.insert(request("1")).await);
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn test_hand_off_keeps_registry_busy_until_dropped() {
        let registry = JobRegistry::new();
        registry.insert(request("7")).await;

        let handoff = registry.hand_off("7").await;
        assert!(handoff.was_registered());
        assert_eq!(handoff.request().map(|r| r.id.as_str()), Some("7"));
        assert!(registry.is_empty().await);
        assert!(registry.is_busy().await);
        assert_eq!(registry.handoffs_in_progress(), 1);

        drop(handoff);
        assert!(!registry.is_busy().await);
        assert_eq!(registry.handoffs_in_progress(), 0);
    }

    #[tokio::test]
    async fn test_second_hand_off_finds_nothing() {
        let registry = JobRegistry::new();
        registry.insert(request("9")).await;

        let first = registry.hand_off("9").await;
        let second = registry.hand_off("9").await;
        assert!(first.was_registered());
        assert!(!second.was_registered());
    }
}
