// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Typed Subscriptions
//!
//! [`subscribe`] binds a queue, sets the channel's prefetch window, registers
//! a manual-ack consumer and moves the delivery loop onto its own task. Setup
//! failures are returned right away; once the loop runs, every per-delivery
//! failure is settled through the acknowledgment decision and logged.
//!
//! Deliveries of one subscription are handled strictly one after another: the
//! acknowledgment for a delivery is sent before the next one is decoded.
//! Different subscriptions run concurrently with no ordering between them.

use crate::{
    configs::RabbitMQConfigs,
    consumer::{consume, ConsumerDefinition, ConsumerHandler},
    encoding::{Cbor, DecodeFailurePolicy, Encoding, Json},
    errors::SubscribeError,
    queue::QueueDefinition,
    topology::declare_and_bind,
};
use futures_util::StreamExt;
use lapin::{
    options::{BasicCancelOptions, BasicConsumeOptions, BasicQosOptions},
    types::FieldTable,
    Channel, Connection, Consumer,
};
use opentelemetry::global;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tokio::{sync::Notify, task::JoinHandle};
use tracing::{debug, error};
use uuid::Uuid;

/// Reply code sent when a subscription closes its own channel.
const REPLY_SUCCESS: u16 = 200;

/// Where a subscription reads from and how it treats its deliveries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionDefinition {
    pub(crate) queue: QueueDefinition,
    pub(crate) exchange: String,
    pub(crate) routing_key: String,
    pub(crate) prefetch: Option<u16>,
    pub(crate) on_decode_failure: Option<DecodeFailurePolicy>,
}

impl SubscriptionDefinition {
    /// Subscription on `queue`. Exchange and routing key start empty, which
    /// binds to the default exchange.
    pub fn new(queue: QueueDefinition) -> SubscriptionDefinition {
        SubscriptionDefinition {
            queue,
            exchange: String::new(),
            routing_key: String::new(),
            prefetch: None,
            on_decode_failure: None,
        }
    }

    /// Subscription taking its prefetch window from the configuration, when
    /// one is set there.
    pub fn from_configs(cfg: &RabbitMQConfigs, queue: QueueDefinition) -> SubscriptionDefinition {
        SubscriptionDefinition {
            prefetch: cfg.prefetch,
            ..SubscriptionDefinition::new(queue)
        }
    }

    pub fn exchange(mut self, exchange: &str) -> Self {
        self.exchange = exchange.to_owned();
        self
    }

    /// Routing key, or key pattern on a topic exchange.
    pub fn routing_key(mut self, key: &str) -> Self {
        self.routing_key = key.to_owned();
        self
    }

    /// Maximum unacknowledged deliveries held by the channel. Zero means
    /// unbounded, which lets a slow handler accumulate deliveries without
    /// limit. Defaults to the encoding's choice.
    pub fn prefetch(mut self, prefetch: u16) -> Self {
        self.prefetch = Some(prefetch);
        self
    }

    /// Overrides the encoding's decode failure handling.
    pub fn on_decode_failure(mut self, policy: DecodeFailurePolicy) -> Self {
        self.on_decode_failure = Some(policy);
        self
    }

    pub(crate) fn prefetch_for<E: Encoding>(&self, encoding: &E) -> u16 {
        self.prefetch.unwrap_or_else(|| encoding.default_prefetch())
    }

    pub(crate) fn decode_failure_for<E: Encoding>(&self, encoding: &E) -> DecodeFailurePolicy {
        self.on_decode_failure
            .unwrap_or_else(|| encoding.decode_failure_policy())
    }
}

/// Handle on a running subscription.
///
/// Dropping the handle detaches the delivery loop, which then runs until the
/// connection closes. Use [`Subscription::cancel`] to stop it earlier.
#[derive(Debug)]
pub struct Subscription {
    queue: String,
    consumer_tag: String,
    shutdown: Arc<Notify>,
    task: JoinHandle<Result<(), SubscribeError>>,
}

impl Subscription {
    pub fn queue(&self) -> &str {
        &self.queue
    }

    pub fn consumer_tag(&self) -> &str {
        &self.consumer_tag
    }

    /// Whether the delivery loop has stopped, e.g. because the connection
    /// closed.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stops the subscription.
    ///
    /// The delivery in progress, if any, is finished and acknowledged first.
    /// Then the broker consumer is cancelled and the channel closed; deliveries
    /// prefetched but not yet handled go back to the queue.
    pub async fn cancel(self) -> Result<(), SubscribeError> {
        debug!(consumer_tag = self.consumer_tag, "cancelling subscription");
        self.shutdown.notify_one();

        match self.task.await {
            Ok(res) => res,
            Err(err) => Err(SubscribeError::CancelError(
                self.consumer_tag,
                err.to_string(),
            )),
        }
    }
}

/// Subscribes `handler` to the queue described by `def`.
///
/// Returns once the consumer is registered; deliveries are handled on a
/// background task.
pub async fn subscribe<T, E, H>(
    conn: &Connection,
    def: SubscriptionDefinition,
    encoding: E,
    handler: H,
) -> Result<Subscription, SubscribeError>
where
    T: DeserializeOwned + Send + 'static,
    E: Encoding,
    H: ConsumerHandler<T> + 'static,
{
    let (channel, queue) =
        declare_and_bind(conn, &def.queue, &def.exchange, &def.routing_key).await?;
    let queue_name = queue.name().as_str().to_owned();

    let prefetch = def.prefetch_for(&encoding);
    if let Err(err) = channel
        .basic_qos(prefetch, BasicQosOptions { global: false })
        .await
    {
        error!(error = err.to_string(), prefetch, "error to configure qos");
        return Err(SubscribeError::QoSDeclarationError(err.to_string()));
    }

    let consumer_tag = format!("{}-{}", queue_name, Uuid::new_v4());
    let consumer = match channel
        .basic_consume(
            &queue_name,
            &consumer_tag,
            BasicConsumeOptions {
                no_local: false,
                no_ack: false,
                exclusive: false,
                nowait: false,
            },
            FieldTable::default(),
        )
        .await
    {
        Err(err) => {
            error!(error = err.to_string(), queue = queue_name, "error to create the consumer");
            Err(SubscribeError::ConsumerDeclarationError(
                queue_name.clone(),
                err.to_string(),
            ))
        }
        Ok(c) => Ok(c),
    }?;

    debug!(
        queue = queue_name,
        exchange = def.exchange,
        routing_key = def.routing_key,
        prefetch,
        consumer_tag,
        "consumer registered"
    );

    let consumer_def = ConsumerDefinition {
        queue: queue_name.clone(),
        on_decode_failure: def.decode_failure_for(&encoding),
        encoding,
        handler,
    };
    let shutdown = Arc::new(Notify::new());

    let task = tokio::spawn(run::<T, E, H>(
        consumer,
        channel,
        consumer_def,
        shutdown.clone(),
        consumer_tag.clone(),
    ));

    Ok(Subscription {
        queue: queue_name,
        consumer_tag,
        shutdown,
        task,
    })
}

/// Subscribes with the strict binary encoding.
pub async fn subscribe_cbor<T, H>(
    conn: &Connection,
    def: SubscriptionDefinition,
    handler: H,
) -> Result<Subscription, SubscribeError>
where
    T: DeserializeOwned + Send + 'static,
    H: ConsumerHandler<T> + 'static,
{
    subscribe(conn, def, Cbor, handler).await
}

/// Subscribes with the lenient text encoding.
pub async fn subscribe_json<T, H>(
    conn: &Connection,
    def: SubscriptionDefinition,
    handler: H,
) -> Result<Subscription, SubscribeError>
where
    T: DeserializeOwned + Send + 'static,
    H: ConsumerHandler<T> + 'static,
{
    subscribe(conn, def, Json, handler).await
}

async fn run<T, E, H>(
    mut consumer: Consumer,
    channel: Channel,
    def: ConsumerDefinition<E, H>,
    shutdown: Arc<Notify>,
    consumer_tag: String,
) -> Result<(), SubscribeError>
where
    T: DeserializeOwned + Send + 'static,
    E: Encoding,
    H: ConsumerHandler<T>,
{
    let tracer = global::tracer("amqp consumer");

    loop {
        tokio::select! {
            biased;

            _ = shutdown.notified() => {
                return cancel_consumer(&channel, &consumer_tag).await;
            }

            next = consumer.next() => match next {
                Some(Ok(delivery)) => {
                    if let Err(err) = consume::<T, E, H>(&tracer, &delivery, &def).await {
                        error!(error = err.to_string(), queue = def.queue, "error consume msg");
                    }
                }
                Some(Err(err)) => {
                    error!(error = err.to_string(), queue = def.queue, "errors consume msg");
                }
                None => {
                    debug!(queue = def.queue, "delivery stream closed");
                    return Ok(());
                }
            }
        }
    }
}

async fn cancel_consumer(channel: &Channel, consumer_tag: &str) -> Result<(), SubscribeError> {
    let to_error = |err: lapin::Error| {
        error!(error = err.to_string(), consumer_tag, "error to cancel the consumer");
        SubscribeError::CancelError(consumer_tag.to_owned(), err.to_string())
    };

    channel
        .basic_cancel(consumer_tag, BasicCancelOptions { nowait: false })
        .await
        .map_err(to_error)?;

    channel
        .close(REPLY_SUCCESS, "subscription cancelled")
        .await
        .map_err(to_error)?;

    debug!(consumer_tag, "subscription cancelled");
    Ok(())
}
