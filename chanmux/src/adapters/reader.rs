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

//! Turns a pull-style "read next value" function into a stream of results.

use futures::future::BoxFuture;
use futures::FutureExt;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

use crate::config::{channel_capacity, LifecycleConfig, ReaderConfig};
use crate::error::{LifecycleError, StreamError};
use crate::observability::events;
use crate::observability::fields::{self, WorkerContext};
use crate::runtime::lifecycle::WorkerLifecycle;

const COMPONENT: &str = "reader";

/// One item on a reader's result stream.
pub type ReadResult<R> = Result<R, StreamError>;

type ReadFn<R> = Box<dyn FnMut() -> BoxFuture<'static, ReadResult<R>> + Send>;
type OnDone = Box<dyn FnOnce() + Send>;

pub(crate) enum ReaderCommand {
    Stop,
}

/// Background producer that repeatedly calls a read function and publishes
/// every result.
///
/// The first error ends the reader: it is emitted once and the result stream
/// then closes. Errors classified by [`StreamError::is_expected_disconnect`]
/// close the stream without being emitted. There is no retry; see
/// [`crate::Connector`] for a reconnecting wrapper.
pub struct Reader<R> {
    lifecycle: WorkerLifecycle<ReaderCommand>,
    results: mpsc::Receiver<ReadResult<R>>,
}

impl<R: Send + 'static> Reader<R> {
    /// Spawns a reader over an async read function.
    pub fn new<F, Fut>(read: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ReadResult<R>> + Send + 'static,
    {
        Self::with_options(read, &ReaderConfig::default(), None)
    }

    /// Spawns a reader with an explicit result-stream bound and an optional
    /// hook that runs once, right before the result stream closes.
    pub fn with_options<F, Fut>(
        mut read: F,
        config: &ReaderConfig,
        on_done: Option<Box<dyn FnOnce() + Send>>,
    ) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ReadResult<R>> + Send + 'static,
    {
        let read: ReadFn<R> = Box::new(move || read().boxed());
        Self::spawn(read, config, on_done)
    }

    /// Spawns a reader over a blocking read function.
    ///
    /// Each call runs on Tokio's blocking pool, so a read that never returns
    /// does not hold up [`Reader::stop`]; its eventual result is discarded.
    pub fn blocking<F>(read: F, config: &ReaderConfig) -> Self
    where
        F: FnMut() -> ReadResult<R> + Send + 'static,
    {
        let read = Arc::new(Mutex::new(read));
        let read: ReadFn<R> = Box::new(move || {
            let read = Arc::clone(&read);
            async move {
                tokio::task::spawn_blocking(move || {
                    let mut read = read.lock().unwrap_or_else(PoisonError::into_inner);
                    read()
                })
                .await
                .unwrap_or_else(|err| Err(StreamError::message(format!("blocking read failed: {err}"))))
            }
            .boxed()
        });
        Self::spawn(read, config, None)
    }

    fn spawn(read: ReadFn<R>, config: &ReaderConfig, on_done: Option<OnDone>) -> Self {
        let lifecycle = WorkerLifecycle::new(
            COMPONENT,
            || ReaderCommand::Stop,
            &LifecycleConfig::default(),
        );
        let (results_tx, results) = mpsc::channel(channel_capacity(config.result_capacity));
        let context = lifecycle.context().clone();

        let started = lifecycle.start(move |mut control| async move {
            let mut read_task = tokio::spawn(read_loop(read, results_tx.clone(), context.clone()));

            tokio::select! {
                _ = control.recv() => {
                    read_task.abort();
                    let _ = read_task.await;
                    debug!(
                        event = events::READER_TERMINAL,
                        component = COMPONENT,
                        worker_id = context.worker_id(),
                        reason = fields::REASON_STOP_REQUESTED,
                        "reader stopped"
                    );
                }
                _ = &mut read_task => {}
            }

            if let Some(on_done) = on_done {
                on_done();
            }
            drop(results_tx);
        });
        debug_assert!(started.is_ok(), "fresh lifecycle cannot already be running");

        Self { lifecycle, results }
    }

    /// Receives the next result, or `None` once the stream has closed.
    pub async fn recv(&mut self) -> Option<ReadResult<R>> {
        self.results.recv().await
    }

    /// The raw result stream.
    pub fn results(&mut self) -> &mut mpsc::Receiver<ReadResult<R>> {
        &mut self.results
    }

    /// Stops reading and waits for the background task to finish.
    pub async fn stop(&self) -> Result<(), LifecycleError> {
        self.lifecycle.stop().await
    }

    pub fn is_running(&self) -> bool {
        self.lifecycle.is_running()
    }
}

async fn read_loop<R>(
    mut read: ReadFn<R>,
    results: mpsc::Sender<ReadResult<R>>,
    context: WorkerContext,
) {
    loop {
        match read().await {
            Ok(value) => {
                trace!(
                    event = events::READER_RESULT,
                    component = COMPONENT,
                    worker_id = context.worker_id(),
                    "read succeeded"
                );
                if results.send(Ok(value)).await.is_err() {
                    debug!(
                        event = events::READER_CONSUMER_GONE,
                        component = COMPONENT,
                        worker_id = context.worker_id(),
                        "result stream receiver dropped"
                    );
                    return;
                }
            }
            Err(err) if err.is_expected_disconnect() => {
                debug!(
                    event = events::READER_DISCONNECT_SUPPRESSED,
                    component = COMPONENT,
                    worker_id = context.worker_id(),
                    reason = err.as_label(),
                    "source disconnected"
                );
                return;
            }
            Err(err) => {
                warn!(
                    event = events::READER_TERMINAL,
                    component = COMPONENT,
                    worker_id = context.worker_id(),
                    err = ?err,
                    "read failed; reader exhausted"
                );
                let _ = results.send(Err(err)).await;
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
    use std::time::Duration;
    use tokio::time::timeout;

    fn counting_read(limit: u32, end: StreamError) -> impl FnMut() -> BoxFuture<'static, ReadResult<u32>> {
        let next = Arc::new(AtomicU32::new(0));
        move || {
            let value = next.fetch_add(1, Ordering::SeqCst);
            let end = end.clone();
            async move {
                if value < limit {
                    Ok(value)
                } else {
                    Err(end)
                }
            }
            .boxed()
        }
    }

    async fn drain(reader: &mut Reader<u32>) -> Vec<ReadResult<u32>> {
        let mut out = Vec::new();
        while let Some(result) = timeout(Duration::from_secs(1), reader.recv())
            .await
            .expect("reader should make progress")
        {
            out.push(result);
        }
        out
    }

    #[tokio::test]
    async fn terminal_error_is_emitted_once_then_stream_closes() {
        let mut reader = Reader::new(counting_read(3, StreamError::message("broken")));

        let results = drain(&mut reader).await;

        assert_eq!(results.len(), 4);
        let values: Vec<u32> = results[..3]
            .iter()
            .map(|r| *r.as_ref().expect("first three reads succeed"))
            .collect();
        assert_eq!(values, vec![0, 1, 2]);
        assert!(matches!(results[3], Err(StreamError::Message(ref m)) if m == "broken"));
        reader.stop().await.expect("finished reader should join");
    }

    #[tokio::test]
    async fn expected_disconnect_is_suppressed() {
        let mut reader = Reader::new(counting_read(
            2,
            StreamError::from(io::Error::from(io::ErrorKind::UnexpectedEof)),
        ));

        let results = drain(&mut reader).await;

        assert_eq!(results.len(), 2);
        assert!(results.iter().all(Result::is_ok));
    }

    #[tokio::test]
    async fn stop_does_not_wait_for_a_stuck_read() {
        let done = Arc::new(AtomicBool::new(false));
        let done_hook = Arc::clone(&done);
        let mut reader: Reader<u32> = Reader::with_options(
            futures::future::pending::<ReadResult<u32>>,
            &ReaderConfig::default(),
            Some(Box::new(move || done_hook.store(true, Ordering::SeqCst))),
        );
        assert!(reader.is_running());

        timeout(Duration::from_secs(1), reader.stop())
            .await
            .expect("stop should not hang on a pending read")
            .expect("stop should succeed");

        assert!(done.load(Ordering::SeqCst));
        assert!(!reader.is_running());
        assert!(reader.recv().await.is_none());
    }

    #[tokio::test]
    async fn blocking_reads_run_off_the_async_workers() {
        let mut remaining = vec![Err(StreamError::Closed), Ok(2), Ok(1)];
        let mut reader = Reader::blocking(
            move || remaining.pop().unwrap_or(Err(StreamError::Closed)),
            &ReaderConfig::default(),
        );

        let values: Vec<u32> = drain(&mut reader)
            .await
            .into_iter()
            .map(|r| r.expect("only successful reads are emitted"))
            .collect();

        assert_eq!(values, vec![1, 2]);
    }
}
