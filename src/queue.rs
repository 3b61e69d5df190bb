// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Queue Definitions
//!
//! A queue is declared under one of two policies, durable or transient, and
//! always carries a dead-letter exchange so that messages rejected without
//! requeue are routed somewhere inspectable instead of being dropped.

use crate::configs::{RabbitMQConfigs, DEFAULT_DEAD_LETTER_EXCHANGE};
use lapin::{
    options::QueueDeclareOptions,
    types::{AMQPValue, FieldTable, LongInt, LongString, ShortString},
};
use std::collections::BTreeMap;

/// Constant for the argument used to specify a dead letter exchange
pub const AMQP_HEADERS_DEAD_LETTER_EXCHANGE: &str = "x-dead-letter-exchange";
/// Constant for the argument used to specify message TTL
pub const AMQP_HEADERS_MESSAGE_TTL: &str = "x-message-ttl";
/// Constant for the argument used to specify maximum queue length
pub const AMQP_HEADERS_MAX_LENGTH: &str = "x-max-length";
/// Constant for the argument used to specify maximum queue size in bytes
pub const AMQP_HEADERS_MAX_LENGTH_BYTES: &str = "x-max-length-bytes";

/// Lifetime policy of a queue.
///
/// - Durable: survives broker restarts and may be shared by competing
///   consumers. Used for logs and audit streams.
/// - Transient: exclusive to the declaring connection and deleted when its
///   consumer goes away. Used for per-client notification queues.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum QueueKind {
    #[default]
    Durable,
    Transient,
}

/// Definition of a queue with its declaration policy and arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueDefinition {
    pub(crate) name: String,
    pub(crate) kind: QueueKind,
    pub(crate) dead_letter_exchange: String,
    pub(crate) ttl: Option<i32>,
    pub(crate) max_length: Option<i32>,
    pub(crate) max_length_bytes: Option<i32>,
}

impl QueueDefinition {
    /// Creates a queue definition for `name` under the given policy, dead-lettering
    /// to [`DEFAULT_DEAD_LETTER_EXCHANGE`].
    pub fn new(name: &str, kind: QueueKind) -> QueueDefinition {
        QueueDefinition {
            name: name.to_owned(),
            kind,
            dead_letter_exchange: DEFAULT_DEAD_LETTER_EXCHANGE.to_owned(),
            ttl: None,
            max_length: None,
            max_length_bytes: None,
        }
    }

    /// Queue dead-lettering to the exchange named in the configuration.
    pub fn from_configs(cfg: &RabbitMQConfigs, name: &str, kind: QueueKind) -> QueueDefinition {
        QueueDefinition::new(name, kind).dead_letter_exchange(&cfg.dead_letter_exchange)
    }

    /// Shorthand for `QueueDefinition::new(name, QueueKind::Durable)`.
    pub fn durable(name: &str) -> QueueDefinition {
        QueueDefinition::new(name, QueueKind::Durable)
    }

    /// Shorthand for `QueueDefinition::new(name, QueueKind::Transient)`.
    pub fn transient(name: &str) -> QueueDefinition {
        QueueDefinition::new(name, QueueKind::Transient)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> QueueKind {
        self.kind
    }

    /// Routes rejected-without-requeue messages to `exchange`.
    ///
    /// The exchange must already exist on the broker or the declaration fails.
    pub fn dead_letter_exchange(mut self, exchange: &str) -> Self {
        self.dead_letter_exchange = exchange.to_owned();
        self
    }

    /// Sets the message Time-To-Live (TTL) in milliseconds.
    ///
    /// Expired messages are dead-lettered like rejected ones.
    pub fn ttl(mut self, ttl: i32) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Sets the maximum number of messages the queue can hold.
    pub fn max_length(mut self, max: i32) -> Self {
        self.max_length = Some(max);
        self
    }

    /// Sets the maximum size in bytes the queue can hold.
    pub fn max_length_bytes(mut self, max_bytes: i32) -> Self {
        self.max_length_bytes = Some(max_bytes);
        self
    }

    /// Declaration flags dictated by the queue policy.
    pub(crate) fn declare_options(&self) -> QueueDeclareOptions {
        match self.kind {
            QueueKind::Durable => QueueDeclareOptions {
                passive: false,
                durable: true,
                exclusive: false,
                auto_delete: false,
                nowait: false,
            },
            QueueKind::Transient => QueueDeclareOptions {
                passive: false,
                durable: false,
                exclusive: true,
                auto_delete: true,
                nowait: false,
            },
        }
    }

    /// Declaration arguments. The dead-letter exchange is always present.
    pub(crate) fn arguments(&self) -> FieldTable {
        let mut args = BTreeMap::new();

        args.insert(
            ShortString::from(AMQP_HEADERS_DEAD_LETTER_EXCHANGE),
            AMQPValue::LongString(LongString::from(self.dead_letter_exchange.clone())),
        );

        if let Some(ttl) = self.ttl {
            args.insert(
                ShortString::from(AMQP_HEADERS_MESSAGE_TTL),
                AMQPValue::LongInt(LongInt::from(ttl)),
            );
        }

        if let Some(max) = self.max_length {
            args.insert(
                ShortString::from(AMQP_HEADERS_MAX_LENGTH),
                AMQPValue::LongInt(LongInt::from(max)),
            );
        }

        if let Some(max_bytes) = self.max_length_bytes {
            args.insert(
                ShortString::from(AMQP_HEADERS_MAX_LENGTH_BYTES),
                AMQPValue::LongInt(LongInt::from(max_bytes)),
            );
        }

        FieldTable::from(args)
    }
}

/// Binding of a queue to an exchange under a routing key (or key pattern).
///
/// A queue may hold several bindings, and one routing key may reach several
/// queues.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueBinding<'qeb> {
    pub(crate) queue_name: &'qeb str,
    pub(crate) exchange_name: &'qeb str,
    pub(crate) routing_key: &'qeb str,
}

impl<'qeb> QueueBinding<'qeb> {
    /// Creates a new binding for the given queue.
    ///
    /// The exchange name and routing key start empty and are set with
    /// `exchange` and `routing_key`.
    pub fn new(queue: &'qeb str) -> QueueBinding<'qeb> {
        QueueBinding {
            queue_name: queue,
            exchange_name: "",
            routing_key: "",
        }
    }

    /// Sets the exchange to bind the queue to.
    pub fn exchange(mut self, exchange: &'qeb str) -> Self {
        self.exchange_name = exchange;
        self
    }

    /// Sets the routing key for the binding.
    pub fn routing_key(mut self, key: &'qeb str) -> Self {
        self.routing_key = key;
        self
    }
}
