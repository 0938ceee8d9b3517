// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Queue Handle
//!
//! A `QueueHandle` owns exactly one connection and one channel for its whole
//! lifetime and knows which queue, exchange and binding key it was built for.
//! Producers, consumers and subscribers are thin layers on top of it.

use crate::{
    channel::new_amqp_channel,
    config::QueueConfig,
    errors::AmqpError,
    exchange::{ExchangeDefinition, ExchangeKind},
    queue::{QueueBinding, QueueDefinition},
    topology::{declare_queue, AmqpTopology, QueueStats},
};
use lapin::{options::QueueDeleteOptions, Channel, Connection};
use tracing::{debug, info};

/// AMQP reply code for a normal shutdown.
const REPLY_SUCCESS: u16 = 200;

/// What a handle is used for. It decides which part of the topology the
/// handle declares and which key binds its queue to the exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Role {
    /// Declares the exchange, binds its queue under its own name.
    Producer,
    /// Binds its queue under its own name, never declares the exchange.
    Consumer,
    /// Declares the exchange, binds its queue under a caller supplied key.
    Subscriber(String),
}

impl Role {
    fn declares_exchange(&self) -> bool {
        matches!(self, Role::Producer | Role::Subscriber(_))
    }

    fn binding_key<'r>(&'r self, queue_name: &'r str) -> &'r str {
        match self {
            Role::Subscriber(binding) => binding,
            _ => queue_name,
        }
    }
}

/// Exclusive owner of one broker connection and channel, bound to one queue.
pub struct QueueHandle {
    connection: Connection,
    channel: Channel,
    queue_name: String,
    exchange_name: String,
    binding_key: String,
    role: Role,
}

impl QueueHandle {
    /// Connects to the broker and declares the topology `role` needs.
    ///
    /// The queue is always declared durable, non-exclusive and not
    /// auto-deleted. If any declaration fails the connection is closed before
    /// the error is returned.
    ///
    /// # Parameters
    /// * `cfg` - Broker and exchange settings
    /// * `queue` - Name of the queue the handle is bound to
    /// * `role` - Decides the exchange declaration and the binding key
    ///
    /// # Returns
    /// The ready handle, or the first connection or declaration error
    pub async fn open(cfg: &QueueConfig, queue: &str, role: Role) -> Result<Self, AmqpError> {
        let (connection, channel) = new_amqp_channel(&cfg.connection).await?;

        let handle = QueueHandle {
            connection,
            channel,
            queue_name: queue.to_owned(),
            exchange_name: cfg.exchange_name.clone(),
            binding_key: role.binding_key(queue).to_owned(),
            role,
        };

        let declared = handle.declare_topology(&cfg.exchange_kind).await;
        if let Err(err) = declared {
            handle.close().await;
            return Err(err);
        }

        info!(
            queue = handle.queue_name.as_str(),
            exchange = handle.exchange_name.as_str(),
            binding = handle.binding_key.as_str(),
            "queue handle ready"
        );

        Ok(handle)
    }

    async fn declare_topology(&self, kind: &ExchangeKind) -> Result<(), AmqpError> {
        let queue_def = self.definition();
        let exchange_def = ExchangeDefinition::new(&self.exchange_name)
            .kind(kind)
            .durable();
        let binding = QueueBinding::new(&self.queue_name)
            .exchange(&self.exchange_name)
            .routing_key(&self.binding_key);

        let mut topology = AmqpTopology::new(&self.channel);
        if self.role.declares_exchange() {
            topology = topology.exchange(&exchange_def);
        }

        topology
            .queue(&queue_def)
            .queue_binding(&binding)
            .install()
            .await
    }

    fn definition(&self) -> QueueDefinition {
        QueueDefinition::new(&self.queue_name).durable()
    }

    /// Redeclares the queue and returns the broker counters.
    pub async fn stats(&self) -> Result<QueueStats, AmqpError> {
        declare_queue(&self.channel, &self.definition()).await
    }

    /// Number of messages ready in the queue.
    pub async fn size(&self) -> Result<u32, AmqpError> {
        Ok(self.stats().await?.message_count)
    }

    /// Number of consumers currently attached to the queue.
    pub async fn consumer_count(&self) -> Result<u32, AmqpError> {
        Ok(self.stats().await?.consumer_count)
    }

    /// Deletes the queue and everything in it.
    ///
    /// Deleting a queue that no longer exists is not an error; broker errors
    /// are logged and dropped.
    pub async fn delete(&self) {
        match self
            .channel
            .queue_delete(&self.queue_name, QueueDeleteOptions::default())
            .await
        {
            Ok(purged) => debug!(
                queue = self.queue_name.as_str(),
                purged, "queue deleted"
            ),
            Err(err) => debug!(
                error = err.to_string(),
                queue = self.queue_name.as_str(),
                "ignoring error while deleting queue"
            ),
        }
    }

    /// Closes the channel, then the connection.
    ///
    /// Either may already be closed or broken; each step is attempted
    /// regardless of how the previous one went and no error is returned.
    pub async fn close(self) {
        if let Err(err) = self.channel.close(REPLY_SUCCESS, "closing handle").await {
            debug!(error = err.to_string(), "ignoring error while closing channel");
        }

        if let Err(err) = self.connection.close(REPLY_SUCCESS, "closing handle").await {
            debug!(error = err.to_string(), "ignoring error while closing connection");
        }

        debug!(queue = self.queue_name.as_str(), "queue handle closed");
    }

    pub fn queue_name(&self) -> &str {
        &self.queue_name
    }

    pub fn exchange_name(&self) -> &str {
        &self.exchange_name
    }

    pub(crate) fn channel(&self) -> &Channel {
        &self.channel
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn point_to_point_roles_bind_under_queue_name() {
        assert_eq!(Role::Producer.binding_key("jobs"), "jobs");
        assert_eq!(Role::Consumer.binding_key("jobs"), "jobs");
    }

    #[test]
    fn subscriber_binds_under_its_own_key() {
        let role = Role::Subscriber("news".to_owned());
        assert_eq!(role.binding_key("sub_a"), "news");
    }

    #[test]
    fn only_consumer_skips_exchange_declaration() {
        assert!(Role::Producer.declares_exchange());
        assert!(Role::Subscriber("k".to_owned()).declares_exchange());
        assert!(!Role::Consumer.declares_exchange());
    }
}
