// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Queue Contracts
//!
//! The capabilities a worker needs from its input and output. `Consumer`
//! implements `InputQueue` and `Producer` implements `OutputQueue`; anything
//! else providing the same operations can be plugged into a worker instead.

use crate::errors::AmqpError;
use async_trait::async_trait;

/// Source of messages with explicit acknowledgment.
#[async_trait]
pub trait InputQueue<T>: Send {
    /// Waits for the next message. Only one message may be outstanding.
    async fn get(&mut self) -> Result<T, AmqpError>;

    /// Acknowledges the outstanding message, removing it from the queue.
    async fn task_done(&mut self) -> Result<(), AmqpError>;

    /// Returns the outstanding message to the queue for redelivery.
    async fn task_failed(&mut self) -> Result<(), AmqpError>;

    /// Number of messages waiting in the queue.
    async fn size(&self) -> Result<u32, AmqpError>;
}

/// Sink for messages.
#[async_trait]
pub trait OutputQueue<T>: Send + Sync {
    async fn put(&self, message: &T) -> Result<(), AmqpError>;

    /// Number of messages waiting in the queue.
    async fn size(&self) -> Result<u32, AmqpError>;
}
