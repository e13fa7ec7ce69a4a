//! # Message Bus Port
//!
//! A durable topic exchange with one queue per stage worker, per §4.3. The
//! port exposes publish and a pull-style receive rather than a callback
//! registration API, because every stage worker's main loop is the same
//! shared skeleton (§4.4): dequeue one message, handle it, ack or nack.
//! That skeleton is easiest to write and test against an explicit
//! `receive`/`ack`/`nack` surface rather than a push callback.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;

/// One message pulled off a queue, not yet acknowledged. Holding a
/// `Delivery` is how the shared stage skeleton decides ack-vs-nack: it
/// parses `payload`, runs the handler, and then calls exactly one of
/// `ack`/`nack` on the bus with this delivery's opaque `tag`.
#[derive(Debug, Clone)]
pub struct Delivery {
    /// Backend-specific delivery tag (e.g. an AMQP delivery tag) opaque to
    /// callers; passed back unchanged to `ack`/`nack`.
    pub tag: u64,
    pub payload: Value,
}

#[async_trait]
pub trait MessageBus: Send + Sync {
    /// Publishes a JSON payload to `routing_key` as a durable, persistent
    /// message. `priority` is advisory (§9 open question: the source never
    /// binds a priority queue) and implementations may ignore it.
    async fn publish(&self, routing_key: &str, payload: Value, priority: bool) -> Result<()>;

    /// Pulls the next message for `queue`, blocking (yielding) until one
    /// is available or the bus is closed. QoS is prefetch 1 per consumer
    /// per §4.3 — implementations must not hand out a second delivery to
    /// the same consumer before the first is acked or nacked.
    async fn receive(&self, queue: &str) -> Result<Delivery>;

    /// Acknowledges successful processing of `tag`, removing the message
    /// from the queue permanently.
    async fn ack(&self, tag: u64) -> Result<()>;

    /// Negatively acknowledges `tag`. Per §4.4 step 8, stage handlers ack
    /// even their own failures (a Failed document is a terminal, recorded
    /// outcome) — `nack` exists for the skeleton's own programming errors,
    /// the only case that should requeue.
    async fn nack(&self, tag: u64, requeue: bool) -> Result<()>;
}
