// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Consumer and Subscriber
//!
//! A consumer registers itself on its queue once, at construction. A spawned
//! task moves deliveries from the lapin stream into a bounded inbox, in arrival
//! order; `get` takes the next one from there.
//!
//! Each delivery handed out by `get` must be settled with `task_done` (ack) or
//! `task_failed` (reject and requeue) before `get` may be called again. A
//! second `get` fails straight away with `AmqpError::PendingAcknowledgement`.
//!
//! A subscriber is a consumer whose queue is bound to the exchange under a key
//! of its own choosing. Several subscriber queues bound under the same key each
//! get a copy of every message published with that key.

use crate::{
    ack::{AckState, DeliveryTag},
    codec::{Codec, JsonCodec},
    config::QueueConfig,
    errors::AmqpError,
    handle::{QueueHandle, Role},
    messaging::InputQueue,
    otel,
};
use async_trait::async_trait;
use futures_util::StreamExt;
use lapin::{
    message::Delivery,
    options::{BasicAckOptions, BasicConsumeOptions, BasicQosOptions, BasicRejectOptions},
    types::FieldTable,
};
use opentelemetry::{
    global::{self, BoxedSpan},
    trace::{Span, Status},
};
use serde::de::DeserializeOwned;
use std::borrow::Cow;
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{debug, error, warn};
use uuid::Uuid;

type Inbox = mpsc::Receiver<Result<Delivery, lapin::Error>>;

/// Task moving deliveries into the inbox, aborted when dropped.
struct Pump(JoinHandle<()>);

impl Drop for Pump {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// A consumer bound under a caller supplied key, see `Consumer::subscribe`.
pub type Subscriber<C = JsonCodec> = Consumer<C>;

/// Receives messages from one queue, one outstanding delivery at a time.
///
/// Call `close` when done. Dropping a consumer stops its delivery task but
/// leaves the connection to lapin, which only closes it once the broker or the
/// network ends it.
pub struct Consumer<C = JsonCodec> {
    handle: QueueHandle,
    codec: C,
    consumer_tag: String,
    inbox: Inbox,
    pump: Pump,
    ack: AckState,
    span: Option<BoxedSpan>,
}

impl Consumer<JsonCodec> {
    /// Opens a point-to-point consumer on `queue` using the JSON codec.
    pub async fn connect(cfg: &QueueConfig, queue: &str) -> Result<Self, AmqpError> {
        Consumer::with_codec(cfg, queue, JsonCodec).await
    }

    /// Opens a subscriber: `queue` is bound to the exchange under `binding`.
    pub async fn subscribe(
        cfg: &QueueConfig,
        queue: &str,
        binding: &str,
    ) -> Result<Subscriber, AmqpError> {
        Consumer::subscribe_with_codec(cfg, queue, binding, JsonCodec).await
    }
}

impl<C: Codec> Consumer<C> {
    /// Opens a point-to-point consumer on `queue`.
    ///
    /// The queue is declared and bound under its own name. The exchange is
    /// expected to exist already.
    pub async fn with_codec(cfg: &QueueConfig, queue: &str, codec: C) -> Result<Self, AmqpError> {
        Consumer::open(cfg, queue, Role::Consumer, codec).await
    }

    /// Opens a subscriber on `queue`, bound under `binding`.
    ///
    /// The exchange and the queue are declared, then bound.
    pub async fn subscribe_with_codec(
        cfg: &QueueConfig,
        queue: &str,
        binding: &str,
        codec: C,
    ) -> Result<Subscriber<C>, AmqpError> {
        Consumer::open(cfg, queue, Role::Subscriber(binding.to_owned()), codec).await
    }

    async fn open(cfg: &QueueConfig, queue: &str, role: Role, codec: C) -> Result<Self, AmqpError> {
        let handle = QueueHandle::open(cfg, queue, role).await?;

        let prefetch = cfg.prefetch.max(1);
        let qos = handle
            .channel()
            .basic_qos(prefetch, BasicQosOptions { global: false })
            .await;
        if let Err(err) = qos {
            error!(error = err.to_string(), queue, "error to configure qos");
            handle.close().await;
            return Err(AmqpError::QoSDeclarationError(queue.to_owned()));
        }

        let consumer_tag = format!("{}-{}", queue, Uuid::new_v4());
        let registered = handle
            .channel()
            .basic_consume(
                queue,
                &consumer_tag,
                BasicConsumeOptions {
                    no_local: false,
                    no_ack: false,
                    exclusive: false,
                    nowait: false,
                },
                FieldTable::default(),
            )
            .await;

        let stream = match registered {
            Ok(stream) => stream,
            Err(err) => {
                error!(error = err.to_string(), queue, "error to create the consumer");
                handle.close().await;
                return Err(AmqpError::BindingConsumerError(queue.to_owned()));
            }
        };

        let (tx, inbox) = mpsc::channel(prefetch as usize);
        let pump = Pump(tokio::spawn(forward_deliveries(stream, tx)));

        debug!(queue, consumer_tag = consumer_tag.as_str(), "consumer registered");

        Ok(Consumer {
            handle,
            codec,
            consumer_tag,
            inbox,
            pump,
            ack: AckState::Idle,
            span: None,
        })
    }

    /// Waits for the next delivery and decodes its body.
    ///
    /// Fails with `PendingAcknowledgement` without waiting when the previous
    /// delivery has not been settled. If the body cannot be decoded the
    /// delivery is still outstanding and must be settled by the caller.
    ///
    /// # Returns
    /// The decoded message, `ParsePayloadError` for an undecodable body, or
    /// `DeliveryStreamClosed` once the broker stopped the consumer
    pub async fn get<T: DeserializeOwned>(&mut self) -> Result<T, AmqpError> {
        self.ack.ensure_idle()?;

        let delivery = match self.inbox.recv().await {
            Some(Ok(delivery)) => delivery,
            Some(Err(err)) => {
                error!(
                    error = err.to_string(),
                    queue = self.handle.queue_name(),
                    "error receiving delivery"
                );
                return Err(AmqpError::ConsumerError(err.to_string()));
            }
            None => {
                warn!(queue = self.handle.queue_name(), "delivery stream closed");
                return Err(AmqpError::DeliveryStreamClosed);
            }
        };

        self.ack.begin(delivery.delivery_tag)?;
        self.span = Some(otel::new_span(
            &delivery.properties,
            &global::tracer(otel::TRACER_NAME),
            self.handle.queue_name(),
        ));

        debug!(
            queue = self.handle.queue_name(),
            delivery_tag = delivery.delivery_tag,
            "message received"
        );

        self.codec.decode(&delivery.data).inspect_err(|err| {
            warn!(
                error = err.to_string(),
                queue = self.handle.queue_name(),
                delivery_tag = delivery.delivery_tag,
                "undecodable message, waiting for it to be settled"
            )
        })
    }

    /// Acknowledges the outstanding delivery.
    pub async fn task_done(&mut self) -> Result<(), AmqpError> {
        let tag = self.ack.settle()?;

        match self
            .handle
            .channel()
            .basic_ack(tag, BasicAckOptions { multiple: false })
            .await
        {
            Err(err) => {
                error!(error = err.to_string(), delivery_tag = tag, "error whiling ack msg");
                self.finish_span(Status::Error {
                    description: Cow::from("error to ack msg"),
                });
                Err(AmqpError::AckMessageError)
            }
            _ => {
                debug!(delivery_tag = tag, "message acked");
                self.finish_span(Status::Ok);
                Ok(())
            }
        }
    }

    /// Rejects the outstanding delivery and asks the broker to requeue it.
    pub async fn task_failed(&mut self) -> Result<(), AmqpError> {
        let tag = self.ack.settle()?;

        match self
            .handle
            .channel()
            .basic_reject(tag, BasicRejectOptions { requeue: true })
            .await
        {
            Err(err) => {
                error!(error = err.to_string(), delivery_tag = tag, "error whiling requeuing");
                self.finish_span(Status::Error {
                    description: Cow::from("error to requeue msg"),
                });
                Err(AmqpError::RejectMessageError)
            }
            _ => {
                warn!(delivery_tag = tag, "message requeued");
                self.finish_span(Status::Error {
                    description: Cow::from("task failed, msg requeued"),
                });
                Ok(())
            }
        }
    }

    fn finish_span(&mut self, status: Status) {
        if let Some(mut span) = self.span.take() {
            span.set_status(status);
            span.end();
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

    /// Closes the channel and connection. An unsettled delivery goes back to
    /// the queue.
    pub async fn close(self) {
        let Consumer {
            handle,
            consumer_tag,
            pump,
            ack,
            ..
        } = self;

        if let AckState::AwaitingAck(tag) = ack {
            warn!(delivery_tag = tag, "closing with an unsettled delivery");
        }

        handle.close().await;
        drop(pump);
        debug!(consumer_tag = consumer_tag.as_str(), "consumer closed");
    }

    /// Tag of the delivery waiting to be settled, if any.
    pub fn outstanding(&self) -> Option<DeliveryTag> {
        self.ack.outstanding().ok()
    }

    pub fn handle(&self) -> &QueueHandle {
        &self.handle
    }
}

async fn forward_deliveries(
    mut stream: lapin::Consumer,
    inbox: mpsc::Sender<Result<Delivery, lapin::Error>>,
) {
    while let Some(result) = stream.next().await {
        if inbox.send(result).await.is_err() {
            break;
        }
    }

    debug!("delivery stream ended");
}

#[async_trait]
impl<T, C> InputQueue<T> for Consumer<C>
where
    T: DeserializeOwned + Send,
    C: Codec,
{
    async fn get(&mut self) -> Result<T, AmqpError> {
        Consumer::get(self).await
    }

    async fn task_done(&mut self) -> Result<(), AmqpError> {
        Consumer::task_done(self).await
    }

    async fn task_failed(&mut self) -> Result<(), AmqpError> {
        Consumer::task_failed(self).await
    }

    async fn size(&self) -> Result<u32, AmqpError> {
        Consumer::size(self).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::oneshot;

    #[tokio::test]
    async fn dropping_the_pump_stops_its_task() {
        let (alive, stopped) = oneshot::channel::<()>();
        let pump = Pump(tokio::spawn(async move {
            let _alive = alive;
            std::future::pending::<()>().await;
        }));

        drop(pump);

        assert!(stopped.await.is_err());
    }
}
