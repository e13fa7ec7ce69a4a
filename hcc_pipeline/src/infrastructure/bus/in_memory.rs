//! An in-process `MessageBus` backed by per-queue `VecDeque`s. Used by stage
//! unit tests; publishing routes straight into the matching queue by
//! routing key, mimicking the real exchange's topic binding without a
//! broker.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use hcc_domain::error::{HccError, Result};
use hcc_domain::repositories::message_bus::Delivery;
use hcc_domain::repositories::MessageBus;

#[derive(Default)]
pub struct InMemoryBus {
    queues: Mutex<HashMap<String, VecDeque<Value>>>,
    next_tag: AtomicU64,
}

impl InMemoryBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending(&self, queue: &str) -> usize {
        self.queues.lock().unwrap().get(queue).map(|q| q.len()).unwrap_or(0)
    }
}

#[async_trait]
impl MessageBus for InMemoryBus {
    async fn publish(&self, routing_key: &str, payload: Value, _priority: bool) -> Result<()> {
        self.queues.lock().unwrap().entry(routing_key.to_string()).or_default().push_back(payload);
        Ok(())
    }

    async fn receive(&self, queue: &str) -> Result<Delivery> {
        let payload = self
            .queues
            .lock()
            .unwrap()
            .get_mut(queue)
            .and_then(|q| q.pop_front())
            .ok_or_else(|| HccError::MessageBus(format!("queue '{queue}' is empty")))?;
        let tag = self.next_tag.fetch_add(1, Ordering::SeqCst);
        Ok(Delivery { tag, payload })
    }

    async fn ack(&self, _tag: u64) -> Result<()> {
        Ok(())
    }

    async fn nack(&self, _tag: u64, _requeue: bool) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_then_receive_round_trips_by_routing_key() {
        let bus = InMemoryBus::new();
        bus.publish("document.uploaded", serde_json::json!({"a": 1}), false).await.unwrap();

        let delivery = bus.receive("document.uploaded").await.unwrap();
        assert_eq!(delivery.payload, serde_json::json!({"a": 1}));
    }

    #[tokio::test]
    async fn receive_from_empty_queue_is_an_error() {
        let bus = InMemoryBus::new();
        assert!(bus.receive("document.uploaded").await.is_err());
    }
}
