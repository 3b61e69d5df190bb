// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # AMQP Connection and Channel Management
//!
//! One long-lived connection is shared by the whole application; every
//! topology operation, publisher and subscription opens its own channel on it.
//! Closing the connection invalidates every channel opened from it.

use crate::{configs::Configs, errors::AmqpError};
use lapin::{types::LongString, Channel, Connection, ConnectionProperties};
use std::sync::Arc;
use tracing::{debug, error};

/// Connects to the broker described by `cfg`.
///
/// The connection is named after `cfg.app.name` so it can be told apart in the
/// broker's management UI.
///
/// # Example
/// ```ignore
/// let cfg = pubsub::configs::load()?;
/// let conn = new_amqp_connection(&cfg).await?;
/// ```
pub async fn new_amqp_connection(cfg: &Configs) -> Result<Arc<Connection>, AmqpError> {
    debug!("creating amqp connection...");
    let options = ConnectionProperties::default()
        .with_connection_name(LongString::from(cfg.app.name.clone()));

    match Connection::connect(&cfg.rabbitmq.uri(), options).await {
        Ok(conn) => {
            debug!(host = cfg.rabbitmq.host, "amqp connected");
            Ok(Arc::new(conn))
        }
        Err(err) => {
            error!(error = err.to_string(), "failure to connect");
            Err(AmqpError::ConnectionError)
        }
    }
}

/// Opens a fresh channel on an established connection.
///
/// The returned channel is owned by the caller and must not be used for
/// concurrent publishes without external serialization.
pub async fn new_amqp_channel(conn: &Connection) -> Result<Channel, AmqpError> {
    debug!("creating amqp channel...");
    match conn.create_channel().await {
        Ok(channel) => {
            debug!(id = channel.id(), "channel created");
            Ok(channel)
        }
        Err(err) => {
            error!(error = err.to_string(), "error to create the channel");
            Err(AmqpError::ChannelError)
        }
    }
}
