//! # Message Bus Adapters
//!
//! `rabbitmq` is the production `MessageBus` over a durable AMQP topic
//! exchange (§4.3, §6.2); `in_memory` is a channel-backed test double.

pub mod in_memory;
pub mod rabbitmq;
