use std::collections::HashMap;

use musim_domain::Request;
use tokio::sync::Mutex;
use tracing::debug;

/// 一次下游确认的处理结果
#[derive(Debug, Clone)]
pub enum Acknowledgement {
    /// 没有正在等待回复的该ID
    Unknown,
    /// 仍在等待其他下游回复
    Pending { request: Request, remaining: i64 },
    /// 最后一个回复已到达，条目已移除
    Complete(Request),
}

impl Acknowledgement {
    pub fn is_complete(&self) -> bool {
        matches!(self, Acknowledgement::Complete(_))
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Acknowledgement::Unknown)
    }
}

/// 等待下游回复的请求
///
/// 表中每个条目的计数都不小于1，计数降到0时条目在同一把锁内被移除，
/// 因此每个请求最多报告一次完成。
#[derive(Debug, Default)]
pub struct CompletionTracker {
    pending: Mutex<HashMap<String, Request>>,
}

impl CompletionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// 登记等待回复的请求，计数小于1时拒绝
    pub async fn record(&self, request: Request) -> bool {
        if request.counter < 1 {
            debug!(
                request_id = %request.id,
                counter = request.counter,
                "Refusing to track request without outstanding replies"
            );
            return false;
        }
        let mut pending = self.pending.lock().await;
        pending.insert(request.id.clone(), request);
        true
    }

    /// 处理一个下游回复
    pub async fn decrement(&self, id: &str) -> Acknowledgement {
        self.reduce(id, 1).await
    }

    /// 将计数减少 `by`，降到0或以下时移除条目
    pub async fn reduce(&self, id: &str, by: i64) -> Acknowledgement {
        let mut pending = self.pending.lock().await;
        let Some(request) = pending.get_mut(id) else {
            return Acknowledgement::Unknown;
        };
        request.counter -= by;
        if request.counter <= 0 {
            match pending.remove(id) {
                Some(request) => Acknowledgement::Complete(request),
                None => Acknowledgement::Unknown,
            }
        } else {
            Acknowledgement::Pending {
                remaining: request.counter,
                request: request.clone(),
            }
        }
    }

    /// 直接撤销条目，不视为完成
    pub async fn withdraw(&self, id: &str) -> Option<Request> {
        self.pending.lock().await.remove(id)
    }

    pub async fn get(&self, id: &str) -> Option<Request> {
        self.pending.lock().await.get(id).cloned()
    }

    pub async fn pending_count(&self) -> usize {
        self.pending.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.pending.lock().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(id: &str, counter: i64) -> Request {
        Request::new(id, "http://caller:1", None, counter)
    }

    #[tokio::test]
    async fn test_record_refuses_non_positive_counter() {
        let tracker = CompletionTracker::new();
        assert!(!tracker.record(request("1", 0)).await);
        assert!(!tracker.record(request("2", -1)).await);
        assert!(tracker.is_empty().await);
    }

    #[tokio::test]
    async fn test_decrement_counts_down_to_completion() {
        let tracker = CompletionTracker::new();
        tracker.record(request("5", 2)).await;

        match tracker.decrement("5").await {
            Acknowledgement::Pending { remaining, .. } => assert_eq!(remaining, 1),
            other => panic!("expected pending, got {other:?}"),
        }
        assert!(tracker.decrement("5").await.is_complete());
        assert!(tracker.decrement("5").await.is_unknown());
        assert_eq!(tracker.pending_count().await, 0);
    }

    #[tokio::test]
    async fn test_reduce_past_zero_completes() {
        let tracker = CompletionTracker::new();
        tracker.record(request("3", 2)).await;
        assert!(tracker.reduce("3", 5).await.is_complete());
        assert!(tracker.get("3").await.is_none());
    }

    #[tokio::test]
    async fn test_withdraw_removes_without_completion() {
        let tracker = CompletionTracker::new();
        tracker.record(request("4", 3)).await;
        let withdrawn = tracker.withdraw("4").await;
        assert_eq!(withdrawn.map(|r| r.counter), Some(3));
        assert!(tracker.withdraw("4").await.is_none());
        assert!(tracker.decrement("4").await.is_unknown());
    }
}
