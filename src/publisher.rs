// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Producer
//!
//! Publishes encoded messages to the handle's exchange under the handle's queue
//! name. Messages are marked persistent and the queue is durable, so anything
//! the broker accepted survives a broker restart.

use crate::{
    codec::{Codec, JsonCodec},
    config::QueueConfig,
    errors::AmqpError,
    handle::{QueueHandle, Role},
    messaging::OutputQueue,
    otel,
};
use async_trait::async_trait;
use lapin::{options::BasicPublishOptions, types::ShortString, BasicProperties};
use opentelemetry::Context;
use serde::Serialize;
use tracing::{debug, error};
use uuid::Uuid;

/// AMQP delivery mode for messages written to disk by the broker.
pub const PERSISTENT_DELIVERY_MODE: u8 = 2;

/// Sends messages into one queue.
pub struct Producer<C = JsonCodec> {
    handle: QueueHandle,
    codec: C,
}

impl Producer<JsonCodec> {
    /// Opens a producer for `queue` using the JSON codec.
    pub async fn connect(cfg: &QueueConfig, queue: &str) -> Result<Self, AmqpError> {
        Producer::with_codec(cfg, queue, JsonCodec).await
    }
}

impl<C: Codec> Producer<C> {
    /// Opens a producer for `queue` using `codec` to encode message bodies.
    ///
    /// The exchange is declared, the queue declared and bound to it under its
    /// own name.
    pub async fn with_codec(cfg: &QueueConfig, queue: &str, codec: C) -> Result<Self, AmqpError> {
        let handle = QueueHandle::open(cfg, queue, Role::Producer).await?;
        Ok(Producer { handle, codec })
    }

    /// Encodes `message` and publishes it.
    ///
    /// Returns once the message was handed to the channel; the broker confirm
    /// is not awaited.
    ///
    /// # Parameters
    /// * `message` - Any serializable value, encoded with the producer's codec
    ///
    /// # Returns
    /// Ok(()) when published, `SerializePayloadError` or `PublishingError`
    /// otherwise
    pub async fn put<T: Serialize + ?Sized>(&self, message: &T) -> Result<(), AmqpError> {
        let body = self.codec.encode(message)?;

        let properties = BasicProperties::default()
            .with_content_type(ShortString::from(self.codec.content_type()))
            .with_delivery_mode(PERSISTENT_DELIVERY_MODE)
            .with_message_id(ShortString::from(Uuid::new_v4().to_string()))
            .with_headers(otel::inject_headers(&Context::current()));

        match self
            .handle
            .channel()
            .basic_publish(
                self.handle.exchange_name(),
                self.handle.queue_name(),
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
                error!(
                    error = err.to_string(),
                    queue = self.handle.queue_name(),
                    "error publishing message"
                );
                Err(AmqpError::PublishingError)
            }
            _ => {
                debug!(queue = self.handle.queue_name(), "message published");
                Ok(())
            }
        }
    }

    pub async fn size(&self) -> Result<u32, AmqpError> {
        self.handle.size().await
    }

    pub async fn consumer_count(&self) -> Result<u32, AmqpError> {
        self.handle.consumer_count().await
    }

    pub async fn delete(&self) {
        self.handle.delete().await
    }

    pub async fn close(self) {
        self.handle.close().await
    }

    pub fn handle(&self) -> &QueueHandle {
        &self.handle
    }
}

#[async_trait]
impl<T, C> OutputQueue<T> for Producer<C>
where
    T: Serialize + Send + Sync,
    C: Codec,
{
    async fn put(&self, message: &T) -> Result<(), AmqpError> {
        Producer::put(self, message).await
    }

    async fn size(&self) -> Result<u32, AmqpError> {
        Producer::size(self).await
    }
}
