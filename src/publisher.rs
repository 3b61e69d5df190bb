// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Typed Message Publisher
//!
//! Encodes a value with an [`Encoding`] and hands it to the broker for an
//! exchange/routing-key pair. Publishing is fire-and-forget: success means the
//! broker took the frame, not that any queue received the message.

use crate::{
    encoding::{Cbor, Encoding, Json},
    errors::PublishError,
    otel,
};
use lapin::{
    options::BasicPublishOptions,
    types::{FieldTable, ShortString},
    BasicProperties, Channel,
};
use opentelemetry::Context;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, error};
use uuid::Uuid;

/// Encodes `value` and publishes it to `exchange` under `routing_key`.
///
/// Fails with [`PublishError::Serialization`] without touching the broker when
/// the value cannot be encoded. The channel must not be shared with concurrent
/// publishers; see [`AmqpPublisher`] for a shareable wrapper.
pub async fn publish<T, E>(
    channel: &Channel,
    exchange: &str,
    routing_key: &str,
    value: &T,
    encoding: &E,
) -> Result<(), PublishError>
where
    T: Serialize + ?Sized,
    E: Encoding,
{
    let body = encoding.encode(value).map_err(|err| {
        error!(error = err.to_string(), exchange, routing_key, "error encoding message");
        PublishError::Serialization(err)
    })?;

    let properties = BasicProperties::default()
        .with_content_type(ShortString::from(encoding.content_type()))
        .with_message_id(ShortString::from(Uuid::new_v4().to_string()))
        .with_headers(FieldTable::from(otel::inject(&Context::current())));

    match channel
        .basic_publish(
            exchange,
            routing_key,
            BasicPublishOptions {
                immediate: false,
                mandatory: false,
            },
            &body,
            properties,
        )
        .await
    {
        Err(err) => {
            error!(error = err.to_string(), exchange, routing_key, "error publishing message");
            Err(PublishError::PublishingError(
                exchange.to_owned(),
                err.to_string(),
            ))
        }
        _ => {
            debug!(exchange, routing_key, bytes = body.len(), "message published");
            Ok(())
        }
    }
}

/// Publishes `value` with the strict binary encoding.
pub async fn publish_cbor<T>(
    channel: &Channel,
    exchange: &str,
    routing_key: &str,
    value: &T,
) -> Result<(), PublishError>
where
    T: Serialize + ?Sized,
{
    publish(channel, exchange, routing_key, value, &Cbor).await
}

/// Publishes `value` with the lenient text encoding.
pub async fn publish_json<T>(
    channel: &Channel,
    exchange: &str,
    routing_key: &str,
    value: &T,
) -> Result<(), PublishError>
where
    T: Serialize + ?Sized,
{
    publish(channel, exchange, routing_key, value, &Json).await
}

/// Publisher owning a single channel, safe to share between tasks.
///
/// Concurrent callers are serialized on the channel so frames of different
/// messages never interleave.
pub struct AmqpPublisher<E> {
    channel: Mutex<Channel>,
    encoding: E,
}

impl<E> AmqpPublisher<E>
where
    E: Encoding,
{
    /// Takes ownership of `channel`; nothing else should publish on it.
    pub fn new(channel: Channel, encoding: E) -> AmqpPublisher<E> {
        AmqpPublisher {
            channel: Mutex::new(channel),
            encoding,
        }
    }

    pub fn encoding(&self) -> &E {
        &self.encoding
    }

    pub async fn publish<T>(
        &self,
        exchange: &str,
        routing_key: &str,
        value: &T,
    ) -> Result<(), PublishError>
    where
        T: Serialize + ?Sized,
    {
        let channel = self.channel.lock().await;
        publish(&channel, exchange, routing_key, value, &self.encoding).await
    }
}
