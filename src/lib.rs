// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! Typed publish/subscribe over an AMQP broker.
//!
//! ```ignore
//! let cfg = pubsub::configs::load()?;
//! let conn = pubsub::channel::new_amqp_connection(&cfg).await?;
//!
//! let queue = QueueDefinition::from_configs(&cfg.rabbitmq, "game_logs", QueueKind::Durable);
//! let def = SubscriptionDefinition::from_configs(&cfg.rabbitmq, queue)
//!     .exchange("peril_topic")
//!     .routing_key("game_logs.*");
//! let subscription = subscribe(&conn, def, Cbor, |log: GameLog| {
//!     println!("{log:?}");
//!     AckDecision::Accept
//! })
//! .await?;
//!
//! let channel = pubsub::channel::new_amqp_channel(&conn).await?;
//! publish(&channel, "peril_topic", "game_logs.alice", &log, &Cbor).await?;
//! ```

mod consumer;
mod otel;

pub mod ack;
pub mod channel;
pub mod configs;
pub mod encoding;
pub mod errors;
pub mod exchange;
pub mod publisher;
pub mod queue;
pub mod routing;
pub mod subscriber;
pub mod topology;

pub use ack::AckDecision;
pub use consumer::{ConsumerHandler, DeliveryInfo};
pub use encoding::{Cbor, DecodeFailurePolicy, Encoding, Json};
pub use publisher::{publish, AmqpPublisher};
pub use queue::{QueueDefinition, QueueKind};
pub use subscriber::{subscribe, Subscription, SubscriptionDefinition};
pub use topology::declare_and_bind;
