// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # RabbitMQ Topology Management
//!
//! Declares the exchanges, queues and bindings a handle needs. Every declaration
//! is idempotent: declaring an existing durable queue or exchange with the same
//! flags is a no-op on the broker, so handles redeclare their topology freely.
//!
//! The main components are:
//! - `AmqpTopology`: collects declarations and installs them in order
//! - `declare_queue`: declares one queue and reports its counters

use crate::{
    errors::AmqpError,
    exchange::ExchangeDefinition,
    queue::{QueueBinding, QueueDefinition},
};
use lapin::{
    options::{ExchangeDeclareOptions, QueueBindOptions, QueueDeclareOptions},
    types::FieldTable,
    Channel,
};
use tracing::{debug, error};

/// What the broker reports back when a queue is declared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueStats {
    pub name: String,
    pub message_count: u32,
    pub consumer_count: u32,
}

/// Collects exchange, queue and binding declarations and installs them on
/// one channel.
pub struct AmqpTopology<'tp> {
    channel: &'tp Channel,
    pub(crate) queues: Vec<&'tp QueueDefinition>,
    pub(crate) queues_binding: Vec<&'tp QueueBinding<'tp>>,
    pub(crate) exchanges: Vec<&'tp ExchangeDefinition<'tp>>,
}

impl<'tp> AmqpTopology<'tp> {
    /// Creates an empty topology.
    ///
    /// # Parameters
    /// * `channel` - The channel the declarations are sent through
    ///
    /// # Returns
    /// A new AmqpTopology instance
    pub fn new(channel: &'tp Channel) -> AmqpTopology<'tp> {
        AmqpTopology {
            channel,
            queues: vec![],
            queues_binding: vec![],
            exchanges: vec![],
        }
    }

    /// Adds an exchange definition to the topology.
    ///
    /// # Parameters
    /// * `def` - An exchange definition
    ///
    /// # Returns
    /// Self for method chaining
    pub fn exchange(mut self, def: &'tp ExchangeDefinition<'tp>) -> Self {
        self.exchanges.push(def);
        self
    }

    /// Adds a queue definition to the topology.
    ///
    /// # Parameters
    /// * `def` - A queue definition
    ///
    /// # Returns
    /// Self for method chaining
    pub fn queue(mut self, def: &'tp QueueDefinition) -> Self {
        self.queues.push(def);
        self
    }

    /// Adds a queue-to-exchange binding to the topology.
    ///
    /// # Parameters
    /// * `binding` - A queue binding
    ///
    /// # Returns
    /// Self for method chaining
    pub fn queue_binding(mut self, binding: &'tp QueueBinding<'tp>) -> Self {
        self.queues_binding.push(binding);
        self
    }

    /// Installs the topology on the broker.
    ///
    /// Exchanges are declared first, then queues, then bindings, each group in
    /// registration order. The first failing declaration stops the install.
    ///
    /// # Returns
    /// Ok(()) if every declaration succeeded, or the error of the first one
    /// that failed
    pub async fn install(&self) -> Result<(), AmqpError> {
        self.install_exchange().await?;
        self.install_queue().await?;
        self.binding_queues().await
    }
}

impl AmqpTopology<'_> {
    async fn install_exchange(&self) -> Result<(), AmqpError> {
        for exch in &self.exchanges {
            debug!("creating exchange: {}", exch.name);

            match self
                .channel
                .exchange_declare(
                    exch.name,
                    exch.kind.into(),
                    ExchangeDeclareOptions {
                        passive: false,
                        durable: exch.durable,
                        auto_delete: false,
                        internal: false,
                        nowait: false,
                    },
                    FieldTable::default(),
                )
                .await
            {
                Err(err) => {
                    error!(
                        error = err.to_string(),
                        name = exch.name,
                        "error to declare the exchange"
                    );
                    Err(AmqpError::DeclareExchangeError(exch.name.to_owned()))
                }
                _ => Ok(()),
            }?;

            debug!("exchange: {} was created", exch.name);
        }

        Ok(())
    }

    async fn install_queue(&self) -> Result<(), AmqpError> {
        for def in &self.queues {
            declare_queue(self.channel, def).await?;
        }

        Ok(())
    }

    async fn binding_queues(&self) -> Result<(), AmqpError> {
        for binding in &self.queues_binding {
            debug!(
                "binding queue: {} to the exchange: {} with the key: {}",
                binding.queue_name, binding.exchange_name, binding.routing_key
            );

            match self
                .channel
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

                    Err(AmqpError::BindingExchangeToQueueError(
                        binding.exchange_name.to_owned(),
                        binding.queue_name.to_owned(),
                    ))
                }
                _ => Ok(()),
            }?;
        }

        Ok(())
    }
}

/// Declares a single queue and reads back its counters.
///
/// The declaration is never passive: an absent queue is created.
///
/// # Parameters
/// * `channel` - The channel the declaration is sent through
/// * `def` - The queue to declare
///
/// # Returns
/// The queue name, message count and consumer count reported by the broker
pub async fn declare_queue(
    channel: &Channel,
    def: &QueueDefinition,
) -> Result<QueueStats, AmqpError> {
    debug!("declaring queue: {}", def.name);

    match channel
        .queue_declare(
            &def.name,
            QueueDeclareOptions {
                passive: false,
                durable: def.durable,
                exclusive: false,
                auto_delete: false,
                nowait: false,
            },
            FieldTable::default(),
        )
        .await
    {
        Err(err) => {
            error!(
                error = err.to_string(),
                name = def.name.as_str(),
                "error to declare the queue"
            );
            Err(AmqpError::DeclareQueueError(def.name.clone()))
        }
        Ok(queue) => Ok(QueueStats {
            name: queue.name().to_string(),
            message_count: queue.message_count(),
            consumer_count: queue.consumer_count(),
        }),
    }
}
