// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Worker Loop
//!
//! A worker pulls one message at a time from its input, hands it to a `Task`
//! and settles it according to the returned `WorkerResponse`:
//!
//! - `Complete`: the original message is forwarded to the output (when there
//!   is one) and acknowledged on the input.
//! - `Fail`: with `FailurePolicy::Escalate` the loop stops with
//!   `WorkerError::TaskFailed`, leaving the message unacknowledged so the
//!   broker hands it out again once the input is closed. With
//!   `FailurePolicy::Requeue` the message is rejected back to the queue and the
//!   loop goes on.
//!
//! The stop token is only checked between iterations; a worker waiting in
//! `get` keeps waiting until a message arrives or its input is closed.

use crate::{
    errors::{AmqpError, WorkerError},
    messaging::{InputQueue, OutputQueue},
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Context key set on the response produced for an unparseable JSON payload.
pub const POISON_CONTEXT_KEY: &str = "poison";

/// Outcome of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Status {
    Fail,
    Complete,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Fail => write!(f, "FAIL"),
            Status::Complete => write!(f, "COMPLETE"),
        }
    }
}

/// What a task reports back for one message.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerResponse {
    pub status: Status,
    pub context: Map<String, Value>,
}

impl WorkerResponse {
    pub fn new(status: Status) -> Self {
        WorkerResponse {
            status,
            context: Map::new(),
        }
    }

    pub fn complete() -> Self {
        WorkerResponse::new(Status::Complete)
    }

    pub fn fail() -> Self {
        WorkerResponse::new(Status::Fail)
    }

    /// Adds a context entry.
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.context.insert(key.to_owned(), value.into());
        self
    }

    pub fn is_complete(&self) -> bool {
        self.status == Status::Complete
    }
}

/// The processing step of a worker.
#[async_trait]
pub trait Task<T: Send + Sync>: Send + Sync {
    async fn start_task(&self, message: &T) -> WorkerResponse;
}

#[async_trait]
impl<T, F> Task<T> for F
where
    T: Send + Sync,
    F: Fn(&T) -> WorkerResponse + Send + Sync,
{
    async fn start_task(&self, message: &T) -> WorkerResponse {
        self(message)
    }
}

/// What the worker does with a `Fail` response.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Stop the loop with `WorkerError::TaskFailed`.
    #[default]
    Escalate,
    /// Reject the message back to the queue and keep going.
    Requeue,
}

/// Parses text messages as JSON before handing them to `H`.
///
/// A message that is not valid JSON never reaches `H`: it is reported and
/// answered with a `Complete` response flagged with `POISON_CONTEXT_KEY`, so
/// the worker forwards it untouched and acknowledges it.
pub struct JsonTask<H> {
    handler: H,
}

impl<H> JsonTask<H> {
    pub fn new(handler: H) -> Self {
        JsonTask { handler }
    }
}

#[async_trait]
impl<H: Task<Value>> Task<String> for JsonTask<H> {
    async fn start_task(&self, message: &String) -> WorkerResponse {
        match serde_json::from_str::<Value>(message) {
            Ok(value) => self.handler.start_task(&value).await,
            Err(err) => {
                error!(
                    error = err.to_string(),
                    message = message.as_str(),
                    "failed to parse json message, consuming it"
                );
                WorkerResponse::complete()
                    .with(POISON_CONTEXT_KEY, true)
                    .with("error", err.to_string())
            }
        }
    }
}

/// A worker over text messages that only hands valid JSON to its handler.
pub type JsonWorker<I, H> = Worker<String, I, JsonTask<H>>;

/// Drives the get / process / settle loop over one input.
pub struct Worker<T, I, H> {
    input: I,
    output: Option<Box<dyn OutputQueue<T>>>,
    task: H,
    policy: FailurePolicy,
    stop: CancellationToken,
}

impl<T, I, H> Worker<T, I, H>
where
    T: Send + Sync + 'static,
    I: InputQueue<T>,
    H: Task<T>,
{
    pub fn new(input: I, task: H) -> Self {
        Worker {
            input,
            output: None,
            task,
            policy: FailurePolicy::default(),
            stop: CancellationToken::new(),
        }
    }

    /// Forwards every completed message to `output`.
    pub fn with_output(mut self, output: impl OutputQueue<T> + 'static) -> Self {
        self.output = Some(Box::new(output));
        self
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Uses `token` to stop the loop instead of a fresh one.
    pub fn with_stop_token(mut self, token: CancellationToken) -> Self {
        self.stop = token;
        self
    }

    /// Token that stops the loop at the next iteration boundary.
    pub fn stop_token(&self) -> CancellationToken {
        self.stop.clone()
    }

    /// Runs until the stop token is cancelled or an iteration fails.
    pub async fn run(&mut self) -> Result<(), WorkerError> {
        info!("worker started");

        while !self.stop.is_cancelled() {
            self.step().await?;
        }

        info!("worker stopped");
        Ok(())
    }

    /// Processes exactly one message.
    pub async fn step(&mut self) -> Result<(), WorkerError> {
        let message = match self.input.get().await {
            Ok(message) => message,
            Err(AmqpError::ParsePayloadError(reason)) => {
                error!(reason = reason.as_str(), "undecodable message, consuming it");
                self.input.task_done().await?;
                return Ok(());
            }
            Err(err) => return Err(err.into()),
        };

        let response = self.task.start_task(&message).await;
        self.end_task(message, response).await
    }

    async fn end_task(&mut self, message: T, response: WorkerResponse) -> Result<(), WorkerError> {
        match response.status {
            Status::Complete => {
                if let Some(output) = &self.output {
                    output.put(&message).await?;
                    debug!("message forwarded");
                }
                self.input.task_done().await?;
                Ok(())
            }
            Status::Fail => match self.policy {
                FailurePolicy::Escalate => {
                    error!(context = ?response.context, "task failed");
                    Err(WorkerError::TaskFailed(response))
                }
                FailurePolicy::Requeue => {
                    warn!(context = ?response.context, "task failed, requeuing message");
                    self.input.task_failed().await?;
                    Ok(())
                }
            },
        }
    }

    /// Gives back the input and output, e.g. to close them.
    pub fn into_parts(self) -> (I, Option<Box<dyn OutputQueue<T>>>) {
        (self.input, self.output)
    }
}

impl<I, H> Worker<String, I, JsonTask<H>>
where
    I: InputQueue<String>,
    H: Task<Value>,
{
    /// Builds a worker that parses each text message as JSON for `handler`.
    ///
    /// `input` must yield message bodies as published, e.g. a consumer using
    /// `TextCodec`. An output using `TextCodec` forwards them byte for byte.
    ///
    /// # Parameters
    /// * `input` - Queue the raw message bodies are read from
    /// * `handler` - Task run on every body that parses as JSON
    pub fn json(input: I, handler: H) -> Self {
        Worker::new(input, JsonTask::new(handler))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{Codec, JsonCodec, TextCodec};
    use mockall::{mock, predicate::eq, Sequence};
    use serde_json::json;
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    };

    mock! {
        Input {}

        #[async_trait]
        impl InputQueue<String> for Input {
            async fn get(&mut self) -> Result<String, AmqpError>;
            async fn task_done(&mut self) -> Result<(), AmqpError>;
            async fn task_failed(&mut self) -> Result<(), AmqpError>;
            async fn size(&self) -> Result<u32, AmqpError>;
        }
    }

    mock! {
        Output {}

        #[async_trait]
        impl OutputQueue<String> for Output {
            async fn put(&self, message: &String) -> Result<(), AmqpError>;
            async fn size(&self) -> Result<u32, AmqpError>;
        }
    }

    fn input_with(messages: Vec<Result<String, AmqpError>>) -> MockInput {
        let mut input = MockInput::new();
        let mut seq = Sequence::new();
        for message in messages {
            input
                .expect_get()
                .times(1)
                .in_sequence(&mut seq)
                .return_once(move || message);
        }
        input
    }

    #[tokio::test]
    async fn complete_without_output_acks_once() {
        let stop = CancellationToken::new();
        let mut input = input_with(vec![Ok("hello".to_owned())]);
        input.expect_task_done().times(1).returning(|| Ok(()));
        input.expect_task_failed().never();

        let token = stop.clone();
        let mut worker = Worker::<String, _, _>::new(input, move |msg: &String| {
            assert_eq!(msg, "hello");
            token.cancel();
            WorkerResponse::complete()
        })
        .with_stop_token(stop);

        worker.run().await.unwrap();
    }

    #[tokio::test]
    async fn complete_forwards_original_message() {
        let mut input = input_with(vec![Ok("job-1".to_owned())]);
        input.expect_task_done().times(1).returning(|| Ok(()));

        let mut output = MockOutput::new();
        output
            .expect_put()
            .with(eq("job-1".to_owned()))
            .times(1)
            .returning(|_| Ok(()));

        let mut worker = Worker::<String, _, _>::new(input, |_: &String| {
            WorkerResponse::complete().with("ignored", 1)
        })
        .with_output(output);
        let stop = worker.stop_token();

        worker.step().await.unwrap();
        stop.cancel();
        worker.run().await.unwrap();
    }

    #[tokio::test]
    async fn fail_escalates_with_response_by_default() {
        let mut input = input_with(vec![Ok("job".to_owned())]);
        input.expect_task_done().never();
        input.expect_task_failed().never();

        let mut worker = Worker::<String, _, _>::new(input, |_: &String| {
            WorkerResponse::fail().with("reason", "boom")
        });

        match worker.run().await {
            Err(WorkerError::TaskFailed(response)) => {
                assert_eq!(response.status, Status::Fail);
                assert_eq!(response.context.get("reason"), Some(&json!("boom")));
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn fail_requeues_under_requeue_policy() {
        let stop = CancellationToken::new();
        let mut input = input_with(vec![Ok("x".to_owned()), Ok("x".to_owned())]);
        input.expect_task_failed().times(1).returning(|| Ok(()));
        input.expect_task_done().times(1).returning(|| Ok(()));

        let calls = Arc::new(AtomicUsize::new(0));
        let seen = calls.clone();
        let token = stop.clone();
        let mut worker = Worker::<String, _, _>::new(input, move |_: &String| {
            if seen.fetch_add(1, Ordering::SeqCst) == 0 {
                WorkerResponse::fail()
            } else {
                token.cancel();
                WorkerResponse::complete()
            }
        })
        .with_failure_policy(FailurePolicy::Requeue)
        .with_stop_token(stop);

        worker.run().await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn stopped_worker_never_receives() {
        let mut input = MockInput::new();
        input.expect_get().never();

        let mut worker = Worker::<String, _, _>::new(input, |_: &String| WorkerResponse::complete());
        worker.stop_token().cancel();

        worker.run().await.unwrap();
    }

    #[tokio::test]
    async fn json_worker_contains_poison_messages() {
        let stop = CancellationToken::new();
        let mut input = input_with(vec![
            Ok("not json {".to_owned()),
            Ok(r#"{"a":1}"#.to_owned()),
        ]);
        input.expect_task_done().times(2).returning(|| Ok(()));
        input.expect_task_failed().never();

        let mut output = MockOutput::new();
        let mut seq = Sequence::new();
        output
            .expect_put()
            .with(eq("not json {".to_owned()))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));
        output
            .expect_put()
            .with(eq(r#"{"a":1}"#.to_owned()))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));

        let received = Arc::new(Mutex::new(vec![]));
        let sink = received.clone();
        let token = stop.clone();
        let mut worker: JsonWorker<_, _> = Worker::json(input, move |value: &Value| {
            sink.lock().unwrap().push(value.clone());
            token.cancel();
            WorkerResponse::complete()
        })
        .with_output(output)
        .with_stop_token(stop);

        worker.run().await.unwrap();
        assert_eq!(*received.lock().unwrap(), vec![json!({"a": 1})]);
    }

    #[tokio::test]
    async fn json_worker_handles_bodies_published_as_json() {
        let published = [
            JsonCodec.encode(&json!({"a": 1})).unwrap(),
            TextCodec.encode("not json {").unwrap(),
        ];
        let mut input = input_with(
            published
                .iter()
                .map(|body| TextCodec.decode::<String>(body))
                .collect(),
        );
        input.expect_task_done().times(2).returning(|| Ok(()));
        input.expect_task_failed().never();

        let forwarded = Arc::new(Mutex::new(vec![]));
        let sink = forwarded.clone();
        let mut output = MockOutput::new();
        output.expect_put().times(2).returning(move |message| {
            sink.lock().unwrap().push(message.clone());
            Ok(())
        });

        let received = Arc::new(Mutex::new(vec![]));
        let seen = received.clone();
        let mut worker = Worker::json(input, move |value: &Value| {
            seen.lock().unwrap().push(value.clone());
            WorkerResponse::complete()
        })
        .with_output(output);

        worker.step().await.unwrap();
        worker.step().await.unwrap();

        assert_eq!(*received.lock().unwrap(), vec![json!({"a": 1})]);

        let forwarded = forwarded.lock().unwrap();
        assert_eq!(*forwarded, vec![r#"{"a":1}"#.to_owned(), "not json {".to_owned()]);
        let bodies: Vec<Vec<u8>> = forwarded
            .iter()
            .map(|message| TextCodec.encode(message).unwrap())
            .collect();
        assert_eq!(bodies, published.to_vec());
    }

    #[tokio::test]
    async fn json_task_flags_poison_response() {
        let task = JsonTask::new(|_: &Value| WorkerResponse::fail());

        let response = task.start_task(&"{broken".to_owned()).await;
        assert!(response.is_complete());
        assert_eq!(response.context.get(POISON_CONTEXT_KEY), Some(&json!(true)));

        let response = task.start_task(&"[1,2]".to_owned()).await;
        assert_eq!(response.status, Status::Fail);
    }

    #[tokio::test]
    async fn undecodable_delivery_is_consumed() {
        let stop = CancellationToken::new();
        let mut input = input_with(vec![
            Err(AmqpError::ParsePayloadError("expected value".to_owned())),
            Ok("next".to_owned()),
        ]);
        input.expect_task_done().times(2).returning(|| Ok(()));

        let token = stop.clone();
        let mut worker = Worker::<String, _, _>::new(input, move |msg: &String| {
            assert_eq!(msg, "next");
            token.cancel();
            WorkerResponse::complete()
        })
        .with_stop_token(stop);

        worker.run().await.unwrap();
    }

    #[tokio::test]
    async fn transport_errors_stop_the_loop() {
        let mut input = input_with(vec![Err(AmqpError::DeliveryStreamClosed)]);
        input.expect_task_done().never();

        let mut worker = Worker::<String, _, _>::new(input, |_: &String| WorkerResponse::complete());

        let err = worker.run().await.unwrap_err();
        assert!(matches!(
            err,
            WorkerError::Queue(AmqpError::DeliveryStreamClosed)
        ));
    }

    #[tokio::test]
    async fn failed_forward_leaves_message_unacked() {
        let mut input = input_with(vec![Ok("job".to_owned())]);
        input.expect_task_done().never();

        let mut output = MockOutput::new();
        output
            .expect_put()
            .times(1)
            .returning(|_| Err(AmqpError::PublishingError));

        let mut worker =
            Worker::<String, _, _>::new(input, |_: &String| WorkerResponse::complete()).with_output(output);

        let err = worker.step().await.unwrap_err();
        assert!(matches!(err, WorkerError::Queue(AmqpError::PublishingError)));
    }

    #[test]
    fn status_display_and_response_builders() {
        assert_eq!(Status::Complete.to_string(), "COMPLETE");
        assert_eq!(Status::Fail.to_string(), "FAIL");

        let response = WorkerResponse::fail().with("url", "http://x").with("attempt", 2);
        assert!(!response.is_complete());
        assert_eq!(response.context.len(), 2);

        let err = WorkerError::TaskFailed(response);
        assert!(err.to_string().starts_with("worker failed with status `FAIL`"));
    }
}
