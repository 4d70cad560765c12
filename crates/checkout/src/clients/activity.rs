//! Activity/statistics sink client trait and in-memory implementation.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use common::BuyerId;

use crate::error::CheckoutError;

/// Trait for the best-effort purchase activity feed.
///
/// Failures here carry no authoritative state and are swallowed by the
/// orchestrator; the sink exists for follower feeds and purchase counters.
#[async_trait]
pub trait ActivitySink: Send + Sync {
    /// Announces that a buyer completed a purchase of `item_count` items.
    async fn record_purchase(&self, buyer_id: BuyerId, item_count: usize)
    -> Result<(), CheckoutError>;
}

#[derive(Debug, Default)]
struct InMemoryActivityState {
    purchases: Vec<(BuyerId, usize)>,
    fail: bool,
    delay: Option<Duration>,
}

/// In-memory activity sink for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryActivitySink {
    state: Arc<RwLock<InMemoryActivityState>>,
}

impl InMemoryActivitySink {
    /// Creates a new in-memory activity sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the sink to fail on the next record call.
    pub fn set_fail(&self, fail: bool) {
        self.state.write().unwrap().fail = fail;
    }

    /// Adds an artificial delay before every response, for timeout tests.
    pub fn set_delay(&self, delay: Duration) {
        self.state.write().unwrap().delay = Some(delay);
    }

    /// Returns the number of purchases recorded.
    pub fn purchase_count(&self) -> usize {
        self.state.read().unwrap().purchases.len()
    }
}

#[async_trait]
impl ActivitySink for InMemoryActivitySink {
    async fn record_purchase(
        &self,
        buyer_id: BuyerId,
        item_count: usize,
    ) -> Result<(), CheckoutError> {
        let delay = self.state.read().unwrap().delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state.write().unwrap();
        if state.fail {
            return Err(CheckoutError::SideEffect(
                "activity feed unreachable".to_string(),
            ));
        }

        state.purchases.push((buyer_id, item_count));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_record_purchase() {
        let sink = InMemoryActivitySink::new();
        sink.record_purchase(BuyerId::new(), 3).await.unwrap();
        assert_eq!(sink.purchase_count(), 1);
    }

    #[tokio::test]
    async fn test_fail_switch() {
        let sink = InMemoryActivitySink::new();
        sink.set_fail(true);

        let result = sink.record_purchase(BuyerId::new(), 1).await;
        assert!(matches!(result, Err(CheckoutError::SideEffect(_))));
        assert_eq!(sink.purchase_count(), 0);
    }

    #[tokio::test]
    async fn test_delay_applies_before_recording() {
        let sink = InMemoryActivitySink::new();
        sink.set_delay(Duration::from_millis(10));

        let started = std::time::Instant::now();
        sink.record_purchase(BuyerId::new(), 1).await.unwrap();
        assert!(started.elapsed() >= Duration::from_millis(10));
        assert_eq!(sink.purchase_count(), 1);
    }
}
