/********************************************************************************
 * Copyright (c) 2026 Contributors to the Eclipse Foundation
 *
 * See the NOTICE file(s) distributed with this work for additional
 * information regarding copyright ownership.
 *
 * This program and the accompanying materials are made available under the
 * terms of the Apache License Version 2.0 which is available at
 * https://www.apache.org/licenses/LICENSE-2.0
 *
 * SPDX-License-Identifier: Apache-2.0
 ********************************************************************************/

//! Serializes values from many producers onto one write function.

use futures::future::BoxFuture;
use futures::FutureExt;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::config::{channel_capacity, LifecycleConfig, WriterConfig};
use crate::error::{LifecycleError, StreamError};
use crate::observability::events;
use crate::observability::fields;
use crate::runtime::lifecycle::WorkerLifecycle;

const COMPONENT: &str = "writer";

type WriteFn<W> = Box<dyn FnMut(W) -> BoxFuture<'static, Result<(), StreamError>> + Send>;

/// Runs once when the writer exits, with the write error that ended it, if any.
pub type OnClose = Box<dyn FnOnce(Option<StreamError>) + Send>;

pub(crate) enum WriterCommand {
    Stop,
}

/// Single consumer task that applies a write function to queued values one
/// at a time.
///
/// A failed write is terminal: the writer exits without draining the queue
/// and reports the error through its close hook.
pub struct Writer<W> {
    lifecycle: WorkerLifecycle<WriterCommand>,
    queue: mpsc::Sender<W>,
}

impl<W: Send + 'static> Writer<W> {
    pub fn new<F, Fut>(write: F) -> Self
    where
        F: FnMut(W) -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), StreamError>> + Send + 'static,
    {
        Self::with_options(write, &WriterConfig::default(), None)
    }

    pub fn with_options<F, Fut>(mut write: F, config: &WriterConfig, on_close: Option<OnClose>) -> Self
    where
        F: FnMut(W) -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), StreamError>> + Send + 'static,
    {
        let write: WriteFn<W> = Box::new(move |value| write(value).boxed());
        let lifecycle = WorkerLifecycle::new(
            COMPONENT,
            || WriterCommand::Stop,
            &LifecycleConfig::default(),
        );
        let (queue, mut queue_rx) = mpsc::channel(channel_capacity(config.queue_capacity));
        let context = lifecycle.context().clone();

        let started = lifecycle.start(move |mut control| async move {
            let mut write = write;
            let mut failure = None;
            let mut reason = fields::REASON_STOP_REQUESTED;

            loop {
                tokio::select! {
                    biased;
                    _ = control.recv() => break,
                    value = queue_rx.recv() => {
                        let Some(value) = value else {
                            reason = fields::REASON_INPUT_CLOSED;
                            break;
                        };
                        if let Err(err) = write(value).await {
                            warn!(
                                event = events::WRITER_WRITE_FAILED,
                                component = COMPONENT,
                                worker_id = context.worker_id(),
                                err = ?err,
                                "write failed; writer exiting"
                            );
                            failure = Some(err);
                            reason = fields::REASON_WRITE_FAILED;
                            break;
                        }
                    }
                }
            }

            debug!(
                event = events::WRITER_EXIT,
                component = COMPONENT,
                worker_id = context.worker_id(),
                reason,
                "writer exiting"
            );
            // Close the queue before the hook so blocked senders are released.
            drop(queue_rx);
            if let Some(on_close) = on_close {
                on_close(failure);
            }
        });
        debug_assert!(started.is_ok(), "fresh lifecycle cannot already be running");

        Self { lifecycle, queue }
    }

    /// Spawns a writer over a blocking write function.
    ///
    /// Each write runs on Tokio's blocking pool, still one at a time and in
    /// queue order.
    pub fn blocking<F>(write: F, config: &WriterConfig, on_close: Option<OnClose>) -> Self
    where
        F: FnMut(W) -> Result<(), StreamError> + Send + 'static,
    {
        let write = Arc::new(Mutex::new(write));
        Self::with_options(
            move |value| {
                let write = Arc::clone(&write);
                async move {
                    tokio::task::spawn_blocking(move || {
                        let mut write = write.lock().unwrap_or_else(PoisonError::into_inner);
                        write(value)
                    })
                    .await
                    .unwrap_or_else(|err| {
                        Err(StreamError::message(format!("blocking write failed: {err}")))
                    })
                }
            },
            config,
            on_close,
        )
    }

    /// Queues a value, waiting only while the queue is full.
    ///
    /// Fails with [`LifecycleError::Stopped`] once the writer has exited; treat
    /// that the same as a closed connection.
    pub async fn send(&self, value: W) -> Result<(), LifecycleError> {
        if !self.lifecycle.is_running() {
            debug!(
                event = events::WRITER_SEND_REJECTED,
                component = COMPONENT,
                worker_id = self.lifecycle.context().worker_id(),
                "send on stopped writer"
            );
            return Err(self.lifecycle.stopped_error());
        }
        self.queue
            .send(value)
            .await
            .map_err(|_| self.lifecycle.stopped_error())
    }

    /// A producer handle onto the writer's queue, e.g. for registration as a
    /// [`crate::FanOut`] output.
    pub fn sender(&self) -> mpsc::Sender<W> {
        self.queue.clone()
    }

    pub async fn stop(&self) -> Result<(), LifecycleError> {
        self.lifecycle.stop().await
    }

    pub fn is_running(&self) -> bool {
        self.lifecycle.is_running()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tokio::sync::oneshot;
    use tokio::time::timeout;

    #[tokio::test]
    async fn writes_are_applied_in_order() {
        let written = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&written);
        let writer = Writer::new(move |value: u32| {
            sink.lock().unwrap().push(value);
            async { Ok::<(), StreamError>(()) }
        });

        for value in 0..5 {
            writer.send(value).await.expect("running writer accepts values");
        }
        writer.stop().await.expect("stop should succeed");

        // Stop is prioritised over the queue, so at most the last value may be
        // left unwritten.
        let written = written.lock().unwrap().clone();
        assert!(written.len() >= 4);
        assert_eq!(written, (0..written.len() as u32).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn write_failure_is_terminal_and_reported_to_close_hook() {
        let (closed_tx, closed_rx) = oneshot::channel();
        let writer = Writer::with_options(
            |value: u32| async move {
                if value == 2 {
                    Err(StreamError::Closed)
                } else {
                    Ok(())
                }
            },
            &WriterConfig::default(),
            Some(Box::new(move |err| {
                let _ = closed_tx.send(err);
            })),
        );

        for value in 0..3 {
            writer.send(value).await.expect("values before the failure are queued");
        }

        let failure = timeout(Duration::from_secs(1), closed_rx)
            .await
            .expect("close hook should run")
            .expect("close hook sends once");
        assert!(matches!(failure, Some(StreamError::Closed)));

        let err = writer.send(3).await.expect_err("failed writer rejects sends");
        assert!(matches!(err, LifecycleError::Stopped { worker: "writer" }));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn blocking_writes_run_in_order_until_the_first_failure() {
        let written = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&written);
        let (closed_tx, closed_rx) = oneshot::channel();
        let writer = Writer::blocking(
            move |value: u32| {
                std::thread::sleep(Duration::from_millis(2));
                if value == 3 {
                    return Err(StreamError::message("disk full"));
                }
                sink.lock().unwrap().push(value);
                Ok(())
            },
            &WriterConfig { queue_capacity: 8 },
            Some(Box::new(move |err| {
                let _ = closed_tx.send(err);
            })),
        );

        for value in 0..4 {
            writer.send(value).await.expect("values before the failure are queued");
        }

        let failure = timeout(Duration::from_secs(1), closed_rx)
            .await
            .expect("close hook should run")
            .expect("close hook sends once");
        assert_eq!(failure.map(|err| err.to_string()), Some("disk full".to_string()));
        assert_eq!(*written.lock().unwrap(), vec![0, 1, 2]);
        writer.stop().await.expect("exited writer is joined");
    }

    #[tokio::test]
    async fn send_after_stop_fails_without_blocking() {
        let writer = Writer::new(|_value: u32| async { Ok::<(), StreamError>(()) });
        writer.stop().await.expect("stop should succeed");

        let result = timeout(Duration::from_secs(1), writer.send(1))
            .await
            .expect("send on a stopped writer must not block");
        assert!(result.is_err());
        assert!(!writer.is_running());
    }
}
