// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Queue Topology Management
//!
//! [`declare_and_bind`] is what publishers and subscribers use: it opens a
//! fresh channel, declares a queue under its policy (always with a
//! dead-letter exchange) and binds it to an exchange. Declaring an identical
//! queue again is a no-op on the broker; declaring it with different flags is
//! a [`TopologyError`].
//!
//! [`AmqpTopology`] is the bootstrap side: it installs the exchanges (the
//! dead-letter exchange included) that queue declarations depend on.

use crate::{
    channel::new_amqp_channel,
    errors::TopologyError,
    exchange::ExchangeDefinition,
    queue::{QueueBinding, QueueDefinition},
    routing,
};
use lapin::{
    options::{ExchangeDeclareOptions, QueueBindOptions, QueueDeclareOptions},
    types::FieldTable,
    Channel, Connection, Queue,
};
use tracing::{debug, error};

/// Suffix of the queue collecting everything routed to a dead-letter exchange.
pub const DEAD_LETTER_QUEUE_SUFFIX: &str = ".queue";

/// Opens a channel, declares `def` and binds it to `exchange` under
/// `routing_key`.
///
/// The channel is returned to the caller, who owns it from then on. A
/// malformed `routing_key` is refused before anything is declared. Errors are
/// not retried.
pub async fn declare_and_bind(
    conn: &Connection,
    def: &QueueDefinition,
    exchange: &str,
    routing_key: &str,
) -> Result<(Channel, Queue), TopologyError> {
    if let Err(err) = routing::validate_pattern(routing_key) {
        error!(error = err.to_string(), queue = def.name, "refusing to bind queue");
        return Err(err);
    }

    let channel = new_amqp_channel(conn)
        .await
        .map_err(|_| TopologyError::ChannelError)?;

    let queue = declare_queue(&channel, def).await?;

    bind_queue(
        &channel,
        &QueueBinding::new(&def.name)
            .exchange(exchange)
            .routing_key(routing_key),
    )
    .await?;

    Ok((channel, queue))
}

/// Declares a queue with the flags and arguments of its definition.
pub async fn declare_queue(channel: &Channel, def: &QueueDefinition) -> Result<Queue, TopologyError> {
    debug!(queue = def.name, kind = ?def.kind, "declaring queue");

    match channel
        .queue_declare(&def.name, def.declare_options(), def.arguments())
        .await
    {
        Err(err) => {
            error!(
                error = err.to_string(),
                queue = def.name,
                "error to declare the queue"
            );
            Err(TopologyError::DeclareQueueError(
                def.name.clone(),
                err.to_string(),
            ))
        }
        Ok(queue) => {
            debug!(
                queue = def.name,
                messages = queue.message_count(),
                consumers = queue.consumer_count(),
                "queue declared"
            );
            Ok(queue)
        }
    }
}

/// Adds one binding to an already declared queue.
pub async fn bind_queue(channel: &Channel, binding: &QueueBinding<'_>) -> Result<(), TopologyError> {
    debug!(
        "binding queue: {} to the exchange: {} with the key: {}",
        binding.queue_name, binding.exchange_name, binding.routing_key
    );

    match channel
        .queue_bind(
            binding.queue_name,
            binding.exchange_name,
            binding.routing_key,
            QueueBindOptions { nowait: false },
            FieldTable::default(),
        )
        .await
    {
        Err(err) => {
            error!(error = err.to_string(), "error to bind queue to exchange");
            Err(TopologyError::BindingExchangeToQueueError {
                queue: binding.queue_name.to_owned(),
                exchange: binding.exchange_name.to_owned(),
                key: binding.routing_key.to_owned(),
                reason: err.to_string(),
            })
        }
        _ => Ok(()),
    }
}

/// Declares one exchange.
pub async fn declare_exchange(
    channel: &Channel,
    def: &ExchangeDefinition,
) -> Result<(), TopologyError> {
    debug!("creating exchange: {}", def.name);

    match channel
        .exchange_declare(
            &def.name,
            def.kind.into(),
            ExchangeDeclareOptions {
                passive: def.passive,
                durable: def.durable,
                auto_delete: def.delete,
                internal: def.internal,
                nowait: false,
            },
            FieldTable::default(),
        )
        .await
    {
        Err(err) => {
            error!(
                error = err.to_string(),
                name = def.name,
                "error to declare the exchange"
            );
            Err(TopologyError::DeclareExchangeError(
                def.name.clone(),
                err.to_string(),
            ))
        }
        _ => {
            debug!("exchange: {} was created", def.name);
            Ok(())
        }
    }
}

/// Declares a durable fanout dead-letter exchange named `name`, plus a
/// durable queue `<name>.queue` bound to it where dead letters can be read.
pub async fn declare_dead_letter_exchange(
    conn: &Connection,
    name: &str,
) -> Result<(), TopologyError> {
    let channel = new_amqp_channel(conn)
        .await
        .map_err(|_| TopologyError::ChannelError)?;

    let exchange = ExchangeDefinition::new(name).fanout().durable();
    let queue_name = format!("{name}{DEAD_LETTER_QUEUE_SUFFIX}");

    let topology = AmqpTopology::new(&channel)
        .exchange(&exchange)
        .queue(&queue_name)
        .queue_binding(QueueBinding::new(&queue_name).exchange(name));

    topology.install().await
}

/// Bootstrap installer for exchanges, plain holding queues and their bindings.
///
/// Queues declared here carry no dead-letter argument; they are the end of the
/// line, such as the queue behind a dead-letter exchange.
pub struct AmqpTopology<'tp> {
    channel: &'tp Channel,
    pub(crate) exchanges: Vec<&'tp ExchangeDefinition>,
    pub(crate) queues: Vec<&'tp str>,
    pub(crate) queues_binding: Vec<QueueBinding<'tp>>,
}

impl<'tp> AmqpTopology<'tp> {
    pub fn new(channel: &'tp Channel) -> AmqpTopology<'tp> {
        AmqpTopology {
            channel,
            exchanges: vec![],
            queues: vec![],
            queues_binding: vec![],
        }
    }

    /// Adds an exchange definition to the topology.
    pub fn exchange(mut self, def: &'tp ExchangeDefinition) -> Self {
        self.exchanges.push(def);
        self
    }

    /// Adds a durable holding queue to the topology.
    pub fn queue(mut self, name: &'tp str) -> Self {
        self.queues.push(name);
        self
    }

    /// Adds a queue-to-exchange binding to the topology.
    pub fn queue_binding(mut self, binding: QueueBinding<'tp>) -> Self {
        self.queues_binding.push(binding);
        self
    }

    /// Installs exchanges, then queues, then bindings, stopping at the first
    /// failure.
    pub async fn install(&self) -> Result<(), TopologyError> {
        for exchange in &self.exchanges {
            declare_exchange(self.channel, exchange).await?;
        }

        for name in &self.queues {
            self.install_queue(name).await?;
        }

        for binding in &self.queues_binding {
            bind_queue(self.channel, binding).await?;
        }

        debug!("topology installed");
        Ok(())
    }

    async fn install_queue(&self, name: &str) -> Result<(), TopologyError> {
        match self
            .channel
            .queue_declare(
                name,
                QueueDeclareOptions {
                    durable: true,
                    ..QueueDeclareOptions::default()
                },
                FieldTable::default(),
            )
            .await
        {
            Err(err) => {
                error!(error = err.to_string(), queue = name, "failure to declare queue");
                Err(TopologyError::DeclareQueueError(
                    name.to_owned(),
                    err.to_string(),
                ))
            }
            _ => {
                debug!("queue: {} was created", name);
                Ok(())
            }
        }
    }
}
