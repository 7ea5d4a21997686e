use std::collections::HashSet;
use std::sync::Arc;

use futures::future::join_all;
use musim_dispatcher::{CompletionTracker, IdAllocator, JobRegistry};
use musim_testing_utils::RequestBuilder;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_allocated_ids_are_unique_under_concurrency() {
    let ids = Arc::new(IdAllocator::new());

    let handles = (0..200).map(|_| {
        let ids = Arc::clone(&ids);
        tokio::spawn(async move { ids.next_id().await })
    });
    let allocated: Vec<String> = join_all(handles)
        .await
        .into_iter()
        .map(|r| r.unwrap())
        .collect();

    let unique: HashSet<_> = allocated.iter().cloned().collect();
    assert_eq!(unique.len(), 200);
    assert!(unique.contains("1"));
    assert!(unique.contains("200"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_completion_reported_exactly_once_under_concurrent_decrements() {
    let tracker = Arc::new(CompletionTracker::new());
    tracker
        .record(RequestBuilder::new("12").with_counter(3).build())
        .await;

    // 重复的回复多于计数
    let handles = (0..16).map(|_| {
        let tracker = Arc::clone(&tracker);
        tokio::spawn(async move { tracker.decrement("12").await })
    });
    let results: Vec<_> = join_all(handles)
        .await
        .into_iter()
        .map(|r| r.unwrap())
        .collect();

    let completed = results.iter().filter(|ack| ack.is_complete()).count();
    let unknown = results.iter().filter(|ack| ack.is_unknown()).count();
    assert_eq!(completed, 1);
    assert_eq!(unknown, 13);
    assert_eq!(tracker.pending_count().await, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_each_job_is_handed_off_once() {
    let registry = Arc::new(JobRegistry::new());
    for i in 0..50 {
        registry
            .insert(RequestBuilder::new(&i.to_string()).build())
            .await;
    }

    let handles = (0..100).map(|i| {
        let registry = Arc::clone(&registry);
        tokio::spawn(async move { registry.hand_off(&(i % 50).to_string()).await.was_registered() })
    });
    let handed: usize = join_all(handles)
        .await
        .into_iter()
        .filter(|r| *r.as_ref().unwrap())
        .count();

    assert_eq!(handed, 50);
    assert!(!registry.is_busy().await);
}
