// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Queue Factory
//!
//! Holds default connection settings and builds handles from them. Handy to
//! pass to a daemon that needs several queues on the same broker.
//!
//! ```no_run
//! # async fn run() -> Result<(), amqpqueue::errors::AmqpError> {
//! use amqpqueue::{config::{QueueConfig, QueueOverrides}, factory::QueueFactory};
//!
//! let factory = QueueFactory::new(QueueConfig::default().merge(
//!     &QueueOverrides::default().address("remote:5000").exchange_name("worker_exchange"),
//! ));
//!
//! let producer = factory.producer("my_queue").await?;
//! producer.put("etc.").await?;
//!
//! let notices = factory
//!     .consumer_with("notices", &QueueOverrides::default().exchange_name("other_sqs_exchange"))
//!     .await?;
//! # Ok(())
//! # }
//! ```

use crate::{
    codec::TextCodec,
    config::{QueueConfig, QueueOverrides},
    consumer::{Consumer, Subscriber},
    errors::AmqpError,
    publisher::Producer,
};

/// Builds producers, consumers and subscribers from shared defaults.
#[derive(Debug, Clone, Default)]
pub struct QueueFactory {
    defaults: QueueConfig,
}

impl QueueFactory {
    pub fn new(defaults: QueueConfig) -> Self {
        QueueFactory { defaults }
    }

    /// Uses `QueueConfig::from_env` as defaults.
    pub fn from_env() -> Result<Self, AmqpError> {
        Ok(QueueFactory::new(QueueConfig::from_env()?))
    }

    pub fn defaults(&self) -> &QueueConfig {
        &self.defaults
    }

    /// Configuration a handle built with `overrides` would use.
    pub fn config(&self, overrides: &QueueOverrides) -> QueueConfig {
        self.defaults.merge(overrides)
    }

    pub async fn producer(&self, queue: &str) -> Result<Producer, AmqpError> {
        Producer::connect(&self.defaults, queue).await
    }

    pub async fn producer_with(
        &self,
        queue: &str,
        overrides: &QueueOverrides,
    ) -> Result<Producer, AmqpError> {
        Producer::connect(&self.config(overrides), queue).await
    }

    pub async fn consumer(&self, queue: &str) -> Result<Consumer, AmqpError> {
        Consumer::connect(&self.defaults, queue).await
    }

    pub async fn consumer_with(
        &self,
        queue: &str,
        overrides: &QueueOverrides,
    ) -> Result<Consumer, AmqpError> {
        Consumer::connect(&self.config(overrides), queue).await
    }

    /// Consumer handing out message bodies as published, for `Worker::json`.
    pub async fn text_consumer(&self, queue: &str) -> Result<Consumer<TextCodec>, AmqpError> {
        Consumer::with_codec(&self.defaults, queue, TextCodec).await
    }

    /// Producer writing text bodies unchanged, for the output of `Worker::json`.
    pub async fn text_producer(&self, queue: &str) -> Result<Producer<TextCodec>, AmqpError> {
        Producer::with_codec(&self.defaults, queue, TextCodec).await
    }

    pub async fn subscriber(&self, queue: &str, binding: &str) -> Result<Subscriber, AmqpError> {
        Consumer::subscribe(&self.defaults, queue, binding).await
    }

    pub async fn subscriber_with(
        &self,
        queue: &str,
        binding: &str,
        overrides: &QueueOverrides,
    ) -> Result<Subscriber, AmqpError> {
        Consumer::subscribe(&self.config(overrides), queue, binding).await
    }
}
