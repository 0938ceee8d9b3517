// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Error Types
//!
//! `AmqpError` covers everything that can go wrong while talking to the broker
//! or driving the acknowledgment protocol of a handle. `WorkerError` is what a
//! worker loop stops with.

use crate::worker::WorkerResponse;
use thiserror::Error;

/// Represents errors that can occur during AMQP/RabbitMQ operations.
///
/// Transport variants carry the broker-side reason where one is available.
/// `PendingAcknowledgement` and `NoPendingDelivery` are protocol violations:
/// they are raised locally and never touch the broker.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum AmqpError {
    /// Invalid configuration value
    #[error("invalid configuration `{0}`")]
    ConfigError(String),

    /// Error establishing a connection to the RabbitMQ server
    #[error("failure to connect")]
    ConnectionError,

    /// Error creating a channel from an established connection
    #[error("failure to create a channel")]
    ChannelError,

    /// Error declaring an exchange with the given name
    #[error("failure to declare an exchange `{0}`")]
    DeclareExchangeError(String),

    /// Error declaring a queue with the given name
    #[error("failure to declare a queue `{0}`")]
    DeclareQueueError(String),

    /// Error binding an exchange to a queue
    #[error("failure to binding exchange `{0}` to queue `{1}`")]
    BindingExchangeToQueueError(String, String),

    /// Error registering a consumer on a queue
    #[error("failure to declare consumer `{0}`")]
    BindingConsumerError(String),

    /// Error configuring Quality of Service parameters
    #[error("failure to configure qos `{0}`")]
    QoSDeclarationError(String),

    /// Error publishing a message
    #[error("failure to publish")]
    PublishingError,

    /// Error encoding a message payload
    #[error("failure to serialize payload `{0}`")]
    SerializePayloadError(String),

    /// Error parsing a message payload
    #[error("failure to parse payload `{0}`")]
    ParsePayloadError(String),

    /// Error acknowledging a message
    #[error("failure to ack message")]
    AckMessageError,

    /// Error rejecting a message back to its queue
    #[error("failure to reject message")]
    RejectMessageError,

    /// Error reported by the delivery stream of a consumer
    #[error("failure to consume message `{0}`")]
    ConsumerError(String),

    /// The delivery stream ended, usually because the channel was closed
    #[error("delivery stream closed")]
    DeliveryStreamClosed,

    /// `get` was called while a delivery is still waiting for its ack
    #[error("must acknowledge current item before requesting the next")]
    PendingAcknowledgement,

    /// `task_done`/`task_failed` was called without an outstanding delivery
    #[error("no delivery is waiting for acknowledgment")]
    NoPendingDelivery,
}

/// Errors that stop a worker loop.
#[derive(Error, Debug)]
pub enum WorkerError {
    /// A queue operation failed while driving the loop
    #[error(transparent)]
    Queue(#[from] AmqpError),

    /// The task reported `Status::Fail` and the failure policy escalates it
    #[error("worker failed with status `{}` context: {:?}", .0.status, .0.context)]
    TaskFailed(WorkerResponse),
}
