//! # RabbitMQ Message Bus
//!
//! Production `MessageBus` over the `hcc-extractor` durable topic exchange
//! (§4.3): one durable queue per stage, bound by its routing key, manual ack,
//! persistent messages. Topology is re-declared on every (re)connect so a
//! dropped connection self-heals without operator intervention; reconnection
//! itself is `deadpool-lapin`'s concern.

use std::collections::HashMap;

use async_trait::async_trait;
use deadpool_lapin::Pool;
use futures::StreamExt;
use lapin::acker::Acker;
use lapin::options::{
    BasicAckOptions, BasicConsumeOptions, BasicNackOptions, BasicPublishOptions, ExchangeDeclareOptions, QueueBindOptions, QueueDeclareOptions,
};
use lapin::types::FieldTable;
use lapin::{BasicProperties, ExchangeKind};
use tokio::sync::Mutex;

use hcc_domain::error::{HccError, Result};
use hcc_domain::repositories::message_bus::Delivery;
use hcc_domain::repositories::MessageBus;

pub const EXCHANGE: &str = "hcc-extractor";

/// A durable queue per stage is named after the routing key it's bound to,
/// since this exchange carries exactly one event type per queue.
fn queue_name_for(routing_key: &str) -> String {
    routing_key.to_string()
}

pub struct RabbitMqBus {
    pool: Pool,
    consumers: Mutex<HashMap<String, lapin::Consumer>>,
    pending_acks: Mutex<HashMap<u64, Acker>>,
}

impl RabbitMqBus {
    pub fn new(pool: Pool) -> Self {
        Self {
            pool,
            consumers: Mutex::new(HashMap::new()),
            pending_acks: Mutex::new(HashMap::new()),
        }
    }

    async fn channel(&self) -> Result<lapin::Channel> {
        let connection = self.pool.get().await.map_err(|e| HccError::MessageBus(e.to_string()))?;
        let channel = connection.create_channel().await.map_err(|e| HccError::MessageBus(e.to_string()))?;
        channel
            .basic_qos(1, lapin::options::BasicQosOptions::default())
            .await
            .map_err(|e| HccError::MessageBus(e.to_string()))?;
        self.declare_topology(&channel).await?;
        Ok(channel)
    }

    /// Declares the exchange and every stage queue idempotently. Called on
    /// every fresh channel so a reconnect after a broker restart recreates
    /// topology without an operator re-running setup.
    async fn declare_topology(&self, channel: &lapin::Channel) -> Result<()> {
        channel
            .exchange_declare(
                EXCHANGE,
                ExchangeKind::Topic,
                ExchangeDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|e| HccError::MessageBus(e.to_string()))?;

        for routing_key in [
            hcc_domain::events::StageMessage::ROUTING_DOCUMENT_UPLOADED,
            hcc_domain::events::StageMessage::ROUTING_EXTRACTION_COMPLETED,
            hcc_domain::events::StageMessage::ROUTING_ANALYSIS_COMPLETED,
            hcc_domain::events::StageMessage::ROUTING_VALIDATION_COMPLETED,
            hcc_domain::events::StageMessage::ROUTING_ERROR,
        ] {
            let queue = queue_name_for(routing_key);
            channel
                .queue_declare(
                    &queue,
                    QueueDeclareOptions {
                        durable: true,
                        ..Default::default()
                    },
                    FieldTable::default(),
                )
                .await
                .map_err(|e| HccError::MessageBus(e.to_string()))?;
            channel
                .queue_bind(&queue, EXCHANGE, routing_key, QueueBindOptions::default(), FieldTable::default())
                .await
                .map_err(|e| HccError::MessageBus(e.to_string()))?;
        }
        Ok(())
    }
}

#[async_trait]
impl MessageBus for RabbitMqBus {
    async fn publish(&self, routing_key: &str, payload: serde_json::Value, priority: bool) -> Result<()> {
        let channel = self.channel().await?;
        let body = serde_json::to_vec(&payload).map_err(HccError::from)?;

        let mut properties = BasicProperties::default().with_delivery_mode(2); // persistent
        if priority {
            // Advisory only: consumer queues aren't declared with
            // x-max-priority, so brokers ignore this unless an operator
            // opts a queue in (§4.3 priority decision).
            properties = properties.with_priority(5);
        }

        channel
            .basic_publish(EXCHANGE, routing_key, BasicPublishOptions::default(), &body, properties)
            .await
            .map_err(|e| HccError::MessageBus(e.to_string()))?
            .await
            .map_err(|e| HccError::MessageBus(e.to_string()))?;
        Ok(())
    }

    async fn receive(&self, queue: &str) -> Result<Delivery> {
        let mut consumers = self.consumers.lock().await;
        if !consumers.contains_key(queue) {
            let channel = self.channel().await?;
            let consumer = channel
                .basic_consume(
                    queue,
                    &format!("{queue}-consumer"),
                    BasicConsumeOptions::default(),
                    FieldTable::default(),
                )
                .await
                .map_err(|e| HccError::MessageBus(e.to_string()))?;
            consumers.insert(queue.to_string(), consumer);
        }
        let consumer = consumers.get_mut(queue).expect("just inserted");

        let delivery = consumer
            .next()
            .await
            .ok_or_else(|| HccError::MessageBus("consumer stream closed".to_string()))?
            .map_err(|e| HccError::MessageBus(e.to_string()))?;
        drop(consumers);

        let payload: serde_json::Value = serde_json::from_slice(&delivery.data).map_err(HccError::from)?;
        let tag = delivery.delivery_tag;
        self.pending_acks.lock().await.insert(tag, delivery.acker);

        Ok(Delivery { tag, payload })
    }

    async fn ack(&self, tag: u64) -> Result<()> {
        if let Some(acker) = self.pending_acks.lock().await.remove(&tag) {
            acker.ack(BasicAckOptions::default()).await.map_err(|e| HccError::MessageBus(e.to_string()))?;
        }
        Ok(())
    }

    async fn nack(&self, tag: u64, requeue: bool) -> Result<()> {
        if let Some(acker) = self.pending_acks.lock().await.remove(&tag) {
            acker
                .nack(BasicNackOptions {
                    requeue,
                    ..Default::default()
                })
                .await
                .map_err(|e| HccError::MessageBus(e.to_string()))?;
        }
        Ok(())
    }
}
