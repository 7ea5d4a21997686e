use tokio::sync::Mutex;

/// 本地生成的关联ID分配器
///
/// 只有入站消息没有携带关联ID时才会调用。计数器从1开始单调递增。
#[derive(Debug)]
pub struct IdAllocator {
    counter: Mutex<u64>,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self::starting_at(1)
    }

    pub fn starting_at(first: u64) -> Self {
        Self {
            counter: Mutex::new(first),
        }
    }

    /// 返回递增前的值
    pub async fn next_id(&self) -> String {
        let mut counter = self.counter.lock().await;
        let id = *counter;
        *counter = counter.wrapping_add(1);
        id.to_string()
    }
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_first_id_is_one() {
        let ids = IdAllocator::new();
        assert_eq!(ids.next_id().await, "1");
        assert_eq!(ids.next_id().await, "2");
        assert_eq!(ids.next_id().await, "3");
    }

    #[tokio::test]
    async fn test_counter_wraps_instead_of_panicking() {
        let ids = IdAllocator::starting_at(u64::MAX);
        assert_eq!(ids.next_id().await, u64::MAX.to_string());
        assert_eq!(ids.next_id().await, "0");
    }
}
