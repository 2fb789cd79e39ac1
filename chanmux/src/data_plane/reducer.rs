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

//! Windowed reduction of a stream into batches.

use std::collections::VecDeque;
use std::pin::pin;
use std::sync::{Mutex, PoisonError};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{self, MissedTickBehavior};
use tracing::debug;

use crate::config::{channel_capacity, LifecycleConfig, ReducerConfig};
use crate::error::LifecycleError;
use crate::observability::events;
use crate::observability::fields::{self, WorkerContext};
use crate::runtime::lifecycle::WorkerLifecycle;

const COMPONENT: &str = "reducer";

pub(crate) enum ReducerCommand {
    Flush(oneshot::Sender<usize>),
    Stop,
}

/// Collects values and periodically reduces the pending batch to one output
/// value.
///
/// A flush happens every `flush_period`, on [`Reducer::flush`], when the input
/// ends and on stop. Empty windows emit nothing.
pub struct Reducer<T, U> {
    lifecycle: WorkerLifecycle<ReducerCommand>,
    input: Mutex<Option<mpsc::Sender<T>>>,
    _output: std::marker::PhantomData<fn() -> U>,
}

impl<T: Send + 'static> Reducer<T, Vec<T>> {
    /// A reducer that emits each window as a `Vec`.
    pub fn collect(config: &ReducerConfig) -> (Self, mpsc::Receiver<Vec<T>>) {
        Self::new(|batch| batch, config)
    }
}

impl<T: Send + 'static, U: Send + 'static> Reducer<T, U> {
    /// Owns both its input and its output stream.
    pub fn new<F>(reduce: F, config: &ReducerConfig) -> (Self, mpsc::Receiver<U>)
    where
        F: FnMut(Vec<T>) -> U + Send + 'static,
    {
        let (output, reduced) = mpsc::channel(channel_capacity(config.output_capacity));
        (Self::with_output(reduce, output, config), reduced)
    }

    /// Owns its input and writes to a caller-supplied output.
    pub fn with_output<F>(reduce: F, output: mpsc::Sender<U>, config: &ReducerConfig) -> Self
    where
        F: FnMut(Vec<T>) -> U + Send + 'static,
    {
        let (input_tx, input) = mpsc::channel(channel_capacity(config.input_capacity));
        Self::spawn(reduce, input, Some(input_tx), output, config)
    }

    /// Reads a caller-supplied input and writes to a caller-supplied output.
    pub fn with_streams<F>(
        reduce: F,
        input: mpsc::Receiver<T>,
        output: mpsc::Sender<U>,
        config: &ReducerConfig,
    ) -> Self
    where
        F: FnMut(Vec<T>) -> U + Send + 'static,
    {
        Self::spawn(reduce, input, None, output, config)
    }

    fn spawn<F>(
        reduce: F,
        mut input: mpsc::Receiver<T>,
        input_tx: Option<mpsc::Sender<T>>,
        output: mpsc::Sender<U>,
        config: &ReducerConfig,
    ) -> Self
    where
        F: FnMut(Vec<T>) -> U + Send + 'static,
    {
        let lifecycle = WorkerLifecycle::new(
            COMPONENT,
            || ReducerCommand::Stop,
            &LifecycleConfig::default(),
        );
        let flush_period = config.flush_period();
        let mut window = Window {
            context: lifecycle.context().clone(),
            pending: Vec::new(),
            waiting: VecDeque::new(),
            reduce,
            output,
        };

        let started = lifecycle.start(move |mut control| async move {
            let mut ticker = time::interval_at(time::Instant::now() + flush_period, flush_period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut reason = fields::REASON_STOP_REQUESTED;
            let mut unsent = None;

            'run: loop {
                // Flush requests that arrived while the output was full.
                while let Some(reply) = window.waiting.pop_front() {
                    window.absorb(&mut input);
                    match window.flush(&mut control).await {
                        Flushed::Sent(size) => {
                            let _ = reply.send(size);
                        }
                        Flushed::Stopped(value) => {
                            unsent = Some(value);
                            break 'run;
                        }
                    }
                }

                tokio::select! {
                    biased;
                    command = control.recv() => match command {
                        Some(ReducerCommand::Flush(reply)) => window.waiting.push_back(reply),
                        Some(ReducerCommand::Stop) | None => break 'run,
                    },
                    value = input.recv() => match value {
                        Some(value) => window.pending.push(value),
                        None => {
                            reason = fields::REASON_INPUT_CLOSED;
                            break 'run;
                        }
                    },
                    _ = ticker.tick() => {
                        if let Flushed::Stopped(value) = window.flush(&mut control).await {
                            unsent = Some(value);
                            break 'run;
                        }
                    }
                }
            }

            window.absorb(&mut input);
            window.hand_off(unsent, reason);
        });
        debug_assert!(started.is_ok(), "fresh lifecycle cannot already be running");

        Self {
            lifecycle,
            input: Mutex::new(input_tx),
            _output: std::marker::PhantomData,
        }
    }

    /// Queues a value for the current window.
    pub async fn send(&self, value: T) -> Result<(), LifecycleError> {
        let input = self
            .input
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or_else(|| {
                if self.is_running() {
                    LifecycleError::InputNotOwned { worker: COMPONENT }
                } else {
                    self.lifecycle.stopped_error()
                }
            })?;
        input
            .send(value)
            .await
            .map_err(|_| self.lifecycle.stopped_error())
    }

    /// Reduces and emits the pending window now. Returns the batch size.
    pub async fn flush(&self) -> Result<usize, LifecycleError> {
        let (reply, flushed) = oneshot::channel();
        self.lifecycle.send(ReducerCommand::Flush(reply)).await?;
        flushed.await.map_err(|_| self.lifecycle.stopped_error())
    }

    /// Flushes what is pending and stops.
    pub async fn stop(&self) -> Result<(), LifecycleError> {
        let stopped = self.lifecycle.stop().await;
        self.input
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        stopped
    }

    pub fn is_running(&self) -> bool {
        self.lifecycle.is_running()
    }
}

/// Result of one flush attempt.
enum Flushed<U> {
    Sent(usize),
    /// A stop arrived while the output was full; carries the reduced value
    /// that could not be sent.
    Stopped(U),
}

struct Window<T, U, F> {
    context: WorkerContext,
    pending: Vec<T>,
    /// Callers of `flush()` waiting for their reply.
    waiting: VecDeque<oneshot::Sender<usize>>,
    reduce: F,
    output: mpsc::Sender<U>,
}

impl<T, U, F> Window<T, U, F>
where
    U: Send + 'static,
    F: FnMut(Vec<T>) -> U,
{
    /// Pulls in values already queued on the input, so a flush or stop
    /// covers everything sent before it was requested.
    fn absorb(&mut self, input: &mut mpsc::Receiver<T>) {
        while let Ok(value) = input.try_recv() {
            self.pending.push(value);
        }
    }

    /// Reduces the pending batch and waits for room on the output, while
    /// still watching the control stream for a stop.
    async fn flush(&mut self, control: &mut mpsc::Receiver<ReducerCommand>) -> Flushed<U> {
        if self.pending.is_empty() {
            return Flushed::Sent(0);
        }
        let batch = std::mem::take(&mut self.pending);
        let size = batch.len();
        debug!(
            event = events::REDUCER_FLUSH,
            component = COMPONENT,
            worker_id = self.context.worker_id(),
            batch = size,
            "flushing window"
        );
        let reduced = (self.reduce)(batch);

        let mut slot = pin!(self.output.reserve());
        loop {
            tokio::select! {
                biased;
                command = control.recv() => match command {
                    Some(ReducerCommand::Flush(reply)) => self.waiting.push_back(reply),
                    Some(ReducerCommand::Stop) | None => return Flushed::Stopped(reduced),
                },
                permit = &mut slot => {
                    match permit {
                        Ok(permit) => permit.send(reduced),
                        Err(_) => debug!(
                            event = events::REDUCER_OUTPUT_CLOSED,
                            component = COMPONENT,
                            worker_id = self.context.worker_id(),
                            "reduced value dropped; output receiver gone"
                        ),
                    }
                    return Flushed::Sent(size);
                }
            }
        }
    }

    /// Emits what is left without blocking the caller of `stop()`.
    ///
    /// Values that do not fit right away are sent, in order, by a detached
    /// task that holds the output open until the consumer takes them or goes
    /// away.
    fn hand_off(mut self, unsent: Option<U>, reason: &'static str) {
        let mut leftovers: VecDeque<U> = unsent.into_iter().collect();
        if !self.pending.is_empty() {
            let batch = std::mem::take(&mut self.pending);
            leftovers.push_back((self.reduce)(batch));
        }
        debug!(
            event = events::REDUCER_FINISHED,
            component = COMPONENT,
            worker_id = self.context.worker_id(),
            leftovers = leftovers.len(),
            reason,
            "reducer finished"
        );

        while let Some(value) = leftovers.pop_front() {
            match self.output.try_send(value) {
                Ok(()) => {}
                Err(TrySendError::Full(value)) => {
                    leftovers.push_front(value);
                    let output = self.output;
                    tokio::spawn(async move {
                        for value in leftovers {
                            if output.send(value).await.is_err() {
                                break;
                            }
                        }
                    });
                    return;
                }
                Err(TrySendError::Closed(_)) => {
                    debug!(
                        event = events::REDUCER_OUTPUT_CLOSED,
                        component = COMPONENT,
                        worker_id = self.context.worker_id(),
                        "reduced value dropped; output receiver gone"
                    );
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn roomy() -> ReducerConfig {
        ReducerConfig {
            flush_period_ms: 100,
            input_capacity: 16,
            output_capacity: 16,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn window_is_flushed_on_each_period() {
        let (reducer, mut batches) = Reducer::collect(&roomy());
        for i in 0..3 {
            reducer.send(i).await.expect("running");
        }

        time::sleep(Duration::from_millis(150)).await;
        assert_eq!(batches.recv().await, Some(vec![0, 1, 2]));

        reducer.send(3).await.expect("running");
        time::sleep(Duration::from_millis(100)).await;
        assert_eq!(batches.recv().await, Some(vec![3]));
        reducer.stop().await.expect("stop should succeed");
    }

    #[tokio::test]
    async fn manual_flush_uses_the_reduce_function() {
        let config = ReducerConfig {
            flush_period_ms: 60_000,
            ..roomy()
        };
        let (reducer, mut sums) = Reducer::new(|batch: Vec<u32>| batch.iter().sum::<u32>(), &config);

        for i in 1..=4 {
            reducer.send(i).await.expect("running");
        }
        assert_eq!(reducer.flush().await.expect("running"), 4);
        assert_eq!(sums.recv().await, Some(10));
        assert_eq!(reducer.flush().await.expect("running"), 0);
        reducer.stop().await.expect("stop should succeed");
    }

    #[tokio::test]
    async fn flush_and_stop_cover_values_sent_before_them() {
        let config = ReducerConfig {
            flush_period_ms: 60_000,
            ..roomy()
        };
        let (reducer, mut batches) = Reducer::collect(&config);
        reducer.send("a").await.expect("running");
        reducer.send("b").await.expect("running");
        assert_eq!(reducer.flush().await.expect("running"), 2);
        reducer.send("c").await.expect("running");

        reducer.stop().await.expect("stop should succeed");

        assert_eq!(batches.recv().await, Some(vec!["a", "b"]));
        assert_eq!(batches.recv().await, Some(vec!["c"]));
        assert_eq!(batches.recv().await, None);
        assert!(reducer.send("d").await.is_err());
    }

    fn cramped() -> ReducerConfig {
        ReducerConfig {
            output_capacity: 1,
            ..roomy()
        }
    }

    #[tokio::test]
    async fn stop_returns_while_the_consumer_is_stalled() {
        let config = ReducerConfig {
            flush_period_ms: 60_000,
            ..cramped()
        };
        let (reducer, mut batches) = Reducer::collect(&config);
        reducer.send(1).await.expect("running");
        assert_eq!(reducer.flush().await.expect("running"), 1);
        reducer.send(2).await.expect("running");

        time::timeout(Duration::from_secs(1), reducer.stop())
            .await
            .expect("stop must not wait for the consumer")
            .expect("stop should succeed");

        assert_eq!(batches.recv().await, Some(vec![1]));
        assert_eq!(batches.recv().await, Some(vec![2]));
        assert_eq!(batches.recv().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_interrupts_a_periodic_flush_blocked_on_the_output() {
        let (reducer, mut batches) = Reducer::collect(&cramped());
        reducer.send(1).await.expect("running");
        time::sleep(Duration::from_millis(150)).await;
        reducer.send(2).await.expect("running");
        // The second tick finds the output still holding the first window.
        time::sleep(Duration::from_millis(100)).await;

        time::timeout(Duration::from_secs(1), reducer.stop())
            .await
            .expect("stop must not wait for the consumer")
            .expect("stop should succeed");

        assert_eq!(batches.recv().await, Some(vec![1]));
        assert_eq!(batches.recv().await, Some(vec![2]));
        assert_eq!(batches.recv().await, None);
    }

    #[tokio::test]
    async fn caller_input_end_flushes_and_finishes() {
        let (in_tx, in_rx) = mpsc::channel(4);
        let (out_tx, mut out_rx) = mpsc::channel(4);
        let reducer = Reducer::with_streams(
            |batch: Vec<u8>| batch.len(),
            in_rx,
            out_tx.clone(),
            &ReducerConfig {
                flush_period_ms: 60_000,
                ..roomy()
            },
        );

        in_tx.send(1).await.expect("reducer reading");
        in_tx.send(2).await.expect("reducer reading");
        drop(in_tx);

        assert_eq!(out_rx.recv().await, Some(2));
        reducer.stop().await.expect("finished reducer is joined");
        assert!(matches!(
            reducer.send(3).await,
            Err(LifecycleError::Stopped { .. })
        ));
    }
}
