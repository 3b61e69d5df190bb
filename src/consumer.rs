// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Delivery Handling
//!
//! Each delivery goes through the same pipeline:
//! 1. Decode the body with the subscription's encoding
//! 2. On decode failure, resolve with the subscription's [`DecodeFailurePolicy`]
//!    without calling the handler
//! 3. Otherwise run the handler and take its [`AckDecision`]
//! 4. Send exactly one acknowledgment frame for the decision
//!
//! Nothing here returns an error to the subscription's owner: every failure is
//! turned into an acknowledgment decision and logged.

use crate::{
    ack::{acknowledge, AckDecision, Acknowledger},
    encoding::{DecodeFailurePolicy, Encoding},
    errors::AmqpError,
    otel,
};
use async_trait::async_trait;
use futures_util::FutureExt;
use lapin::message::Delivery;
use opentelemetry::{global::BoxedTracer, trace::Span};
use serde::de::DeserializeOwned;
use std::panic::AssertUnwindSafe;
use tracing::{debug, error, warn};

/// Broker metadata of the delivery being handled.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeliveryInfo {
    pub delivery_tag: u64,
    /// Set when the broker has handed this message out before, e.g. after a
    /// requeue.
    pub redelivered: bool,
    pub exchange: String,
    pub routing_key: String,
    pub content_type: Option<String>,
}

impl DeliveryInfo {
    pub(crate) fn from_delivery(delivery: &Delivery) -> DeliveryInfo {
        DeliveryInfo {
            delivery_tag: delivery.delivery_tag,
            redelivered: delivery.redelivered,
            exchange: delivery.exchange.to_string(),
            routing_key: delivery.routing_key.to_string(),
            content_type: delivery
                .properties
                .content_type()
                .as_ref()
                .map(|ct| ct.as_str().to_owned()),
        }
    }
}

/// Application logic plugged into a subscription.
///
/// Any `Fn(T) -> AckDecision` closure is a handler. Implement the trait
/// directly when the handler needs to await (for instance to publish a
/// follow-up message) or to look at the delivery metadata.
#[async_trait]
pub trait ConsumerHandler<T>: Send + Sync
where
    T: Send + 'static,
{
    async fn exec(&self, value: T, info: &DeliveryInfo) -> AckDecision;
}

#[async_trait]
impl<T, F> ConsumerHandler<T> for F
where
    T: Send + 'static,
    F: Fn(T) -> AckDecision + Send + Sync,
{
    async fn exec(&self, value: T, _info: &DeliveryInfo) -> AckDecision {
        self(value)
    }
}

/// Per-subscription settings the pipeline needs for each delivery.
pub(crate) struct ConsumerDefinition<E, H> {
    pub(crate) queue: String,
    pub(crate) encoding: E,
    pub(crate) on_decode_failure: DecodeFailurePolicy,
    pub(crate) handler: H,
}

/// Decides what to do with one delivery body. Never fails.
pub(crate) async fn dispatch<T, E, H>(
    def: &ConsumerDefinition<E, H>,
    data: &[u8],
    info: &DeliveryInfo,
) -> AckDecision
where
    T: DeserializeOwned + Send + 'static,
    E: Encoding,
    H: ConsumerHandler<T>,
{
    if let Some(content_type) = info.content_type.as_deref() {
        if content_type != def.encoding.content_type() {
            warn!(
                queue = def.queue,
                expected = def.encoding.content_type(),
                received = content_type,
                "content type mismatch, decoding anyway"
            );
        }
    }

    let value = match def.encoding.decode::<T>(data) {
        Ok(value) => value,
        Err(err) => {
            let decision = def.on_decode_failure.decision();
            warn!(
                error = err.to_string(),
                queue = def.queue,
                delivery_tag = info.delivery_tag,
                ?decision,
                "undecodable message, handler skipped"
            );
            return decision;
        }
    };

    match AssertUnwindSafe(def.handler.exec(value, info))
        .catch_unwind()
        .await
    {
        Ok(decision) => decision,
        Err(_) => {
            error!(
                queue = def.queue,
                delivery_tag = info.delivery_tag,
                "handler panicked, discarding message"
            );
            AckDecision::RejectDiscard
        }
    }
}

/// Runs the pipeline for a delivery and acknowledges it through `acker`.
///
/// Returns the decision that was sent, or the acknowledgment failure.
pub(crate) async fn handle<T, E, H, A>(
    def: &ConsumerDefinition<E, H>,
    data: &[u8],
    info: &DeliveryInfo,
    acker: &A,
) -> Result<AckDecision, AmqpError>
where
    T: DeserializeOwned + Send + 'static,
    E: Encoding,
    H: ConsumerHandler<T>,
    A: Acknowledger + ?Sized,
{
    let decision = dispatch::<T, E, H>(def, data, info).await;

    if decision == AckDecision::RejectRequeue {
        warn!(
            queue = def.queue,
            delivery_tag = info.delivery_tag,
            redelivered = info.redelivered,
            "requeuing message"
        );
    }

    acknowledge(acker, decision).await?;
    Ok(decision)
}

/// Consumes one broker delivery inside a consumer span.
pub(crate) async fn consume<T, E, H>(
    tracer: &BoxedTracer,
    delivery: &Delivery,
    def: &ConsumerDefinition<E, H>,
) -> Result<AckDecision, AmqpError>
where
    T: DeserializeOwned + Send + 'static,
    E: Encoding,
    H: ConsumerHandler<T>,
{
    let info = DeliveryInfo::from_delivery(delivery);
    let mut span = otel::new_span(&delivery.properties, tracer, &def.queue);

    debug!(
        queue = def.queue,
        exchange = info.exchange,
        routing_key = info.routing_key,
        redelivered = info.redelivered,
        "received message"
    );

    match handle::<T, E, H, _>(def, &delivery.data, &info, &delivery.acker).await {
        Ok(decision) => {
            otel::record_decision(&mut span, decision);
            Ok(decision)
        }
        Err(err) => {
            span.record_error(&err);
            Err(err)
        }
    }
}
