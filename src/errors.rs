// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Error Types for the Publish/Subscribe Layer
//!
//! Errors are split by the moment they can happen. Setup-time errors
//! (`TopologyError`, `SubscribeError`) are returned to whoever called the setup
//! function. `PublishError` is returned per publish call. Per-delivery failures
//! never leave the consumer task: they are absorbed into an acknowledgment
//! decision and only logged.

use thiserror::Error;

/// Connection and channel level failures, plus failures of the
/// acknowledgment frames sent back for a delivery.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum AmqpError {
    /// Error establishing a connection to the broker
    #[error("failure to connect")]
    ConnectionError,

    /// Error creating a channel from an established connection
    #[error("failure to create a channel")]
    ChannelError,

    /// Error acknowledging a message
    #[error("failure to ack message")]
    AckMessageError,

    /// Error negative-acknowledging a message
    #[error("failure to nack message")]
    NackMessageError,
}

/// Declaration or binding rejected by the broker.
///
/// Never retried internally; the caller decides whether to abort startup.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum TopologyError {
    #[error("failure to open a channel for topology declaration")]
    ChannelError,

    #[error("failure to declare an exchange `{0}`: {1}")]
    DeclareExchangeError(String, String),

    #[error("failure to declare a queue `{0}`: {1}")]
    DeclareQueueError(String, String),

    #[error("failure to bind queue `{queue}` to exchange `{exchange}` with key `{key}`: {reason}")]
    BindingExchangeToQueueError {
        queue: String,
        exchange: String,
        key: String,
        reason: String,
    },

    /// Routing key pattern outside the `.`-separated wildcard syntax
    #[error("invalid routing key `{0}`: {1}")]
    InvalidRoutingKey(String, String),
}

/// Serialization failures of an encoding strategy.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EncodingError {
    #[error("failure to encode payload: {0}")]
    Encode(String),

    /// The body could not be turned back into the payload type.
    #[error("failure to decode payload: {0}")]
    Decode(String),
}

/// Failure of a single publish call.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum PublishError {
    /// The value could not be encoded; the broker was not contacted.
    #[error("failure to serialize message: {0}")]
    Serialization(#[source] EncodingError),

    #[error("failure to publish to exchange `{0}`: {1}")]
    PublishingError(String, String),
}

/// Failure while registering a subscription, or while cancelling it.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum SubscribeError {
    #[error(transparent)]
    Topology(#[from] TopologyError),

    /// Error configuring the prefetch window
    #[error("failure to configure qos `{0}`")]
    QoSDeclarationError(String),

    #[error("failure to register consumer on queue `{0}`: {1}")]
    ConsumerDeclarationError(String, String),

    #[error("failure to cancel consumer `{0}`: {1}")]
    CancelError(String, String),
}
