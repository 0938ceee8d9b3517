// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! Persistent, queue-like handles over a RabbitMQ broker and a worker loop
//! that consumes from one of them.
//!
//! - `Producer` publishes to a durable queue through the shared exchange.
//! - `Consumer` receives one message at a time and must `task_done` or
//!   `task_failed` it before asking for the next.
//! - `Subscriber` is a consumer bound under a shared key, so several
//!   subscriber queues each receive a copy of the same stream.
//! - `Worker` runs a `Task` over an input and optionally forwards completed
//!   messages to an output.

mod otel;

pub mod ack;
pub mod channel;
pub mod codec;
pub mod config;
pub mod consumer;
pub mod errors;
pub mod exchange;
pub mod factory;
pub mod handle;
pub mod messaging;
pub mod publisher;
pub mod queue;
pub mod topology;
pub mod worker;

pub use config::{ConnectionParams, QueueConfig, QueueOverrides};
pub use consumer::{Consumer, Subscriber};
pub use errors::{AmqpError, WorkerError};
pub use factory::QueueFactory;
pub use messaging::{InputQueue, OutputQueue};
pub use publisher::Producer;
pub use worker::{FailurePolicy, JsonWorker, Status, Task, Worker, WorkerResponse};
