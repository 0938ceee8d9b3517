// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Queue Management for RabbitMQ
//!
//! Builders for queue declarations and queue-to-exchange bindings.

/// Definition of a RabbitMQ queue with its configuration parameters.
#[derive(Debug, Clone, Default)]
pub struct QueueDefinition {
    pub(crate) name: String,
    pub(crate) durable: bool,
}

impl QueueDefinition {
    /// Creates a new queue definition with the given name.
    ///
    /// The queue starts non-durable. It is never exclusive, auto-deleted or
    /// declared passive, so a missing queue is always created.
    ///
    /// # Parameters
    /// * `name` - Name of the queue
    ///
    /// # Returns
    /// A new QueueDefinition instance
    pub fn new(name: &str) -> QueueDefinition {
        QueueDefinition {
            name: name.to_owned(),
            durable: false,
        }
    }

    /// Makes the queue durable, persisting across broker restarts.
    ///
    /// Durable queues will survive broker restart, preserving persistent messages.
    pub fn durable(mut self) -> Self {
        self.durable = true;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Configuration for binding a queue to an exchange.
///
/// Queue bindings define how messages flow from exchanges to queues based on
/// routing keys and exchange types.
pub struct QueueBinding<'qeb> {
    pub(crate) queue_name: &'qeb str,
    pub(crate) exchange_name: &'qeb str,
    pub(crate) routing_key: &'qeb str,
}

impl<'qeb> QueueBinding<'qeb> {
    /// Creates a new queue binding for the given queue.
    ///
    /// The exchange name and routing key start empty; set them with
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn durable_queue_definition() {
        let def = QueueDefinition::new("test_q").durable();
        assert_eq!(def.name(), "test_q");
        assert!(def.durable);

        assert!(!QueueDefinition::new("other").durable);
    }

    #[test]
    fn binding_builder() {
        let binding = QueueBinding::new("sub_a")
            .exchange("sqs_exchange")
            .routing_key("news");
        assert_eq!(binding.queue_name, "sub_a");
        assert_eq!(binding.exchange_name, "sqs_exchange");
        assert_eq!(binding.routing_key, "news");
    }
}
