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

//! Connects one stream to another through a transform.

use std::marker::PhantomData;
use std::pin::pin;
use tokio::sync::mpsc;
use tracing::debug;

use crate::config::LifecycleConfig;
use crate::error::LifecycleError;
use crate::observability::events;
use crate::observability::fields;
use crate::runtime::lifecycle::WorkerLifecycle;

const COMPONENT: &str = "pipe";

pub(crate) type OnDone = Box<dyn FnOnce() + Send>;

pub(crate) enum PipeCommand {
    Pause,
    Resume,
    Stop,
}

/// Forwards every value from `input` to `output` after applying a map
/// function. A map result of `None` drops that value.
///
/// The mapper finishes when its input ends, when its output's receiver is
/// dropped, or on [`Mapper::stop`]; the optional done hook runs in all three
/// cases. While paused it leaves values queued on the input stream.
pub struct Mapper<T, U> {
    lifecycle: WorkerLifecycle<PipeCommand>,
    _types: PhantomData<fn(T) -> U>,
}

/// Identity [`Mapper`].
pub type Pipe<T> = Mapper<T, T>;

impl<T: Send + 'static> Mapper<T, T> {
    pub fn pipe(input: mpsc::Receiver<T>, output: mpsc::Sender<T>) -> Self {
        Self::new(input, output, Some)
    }
}

impl<T: Send + 'static, U: Send + 'static> Mapper<T, U> {
    pub fn new<F>(input: mpsc::Receiver<T>, output: mpsc::Sender<U>, map: F) -> Self
    where
        F: FnMut(T) -> Option<U> + Send + 'static,
    {
        Self::with_on_done(input, output, map, None)
    }

    pub(crate) fn with_on_done<F>(
        mut input: mpsc::Receiver<T>,
        output: mpsc::Sender<U>,
        mut map: F,
        on_done: Option<OnDone>,
    ) -> Self
    where
        F: FnMut(T) -> Option<U> + Send + 'static,
    {
        let lifecycle =
            WorkerLifecycle::new(COMPONENT, || PipeCommand::Stop, &LifecycleConfig::default());
        let context = lifecycle.context().clone();

        let started = lifecycle.start(move |mut control| async move {
            let mut paused = false;
            let mut reason = fields::REASON_STOP_REQUESTED;

            'forward: loop {
                tokio::select! {
                    biased;
                    command = control.recv() => match command {
                        Some(PipeCommand::Pause) => {
                            paused = true;
                            debug!(
                                event = events::PIPE_PAUSED,
                                component = COMPONENT,
                                worker_id = context.worker_id(),
                                "pipe paused"
                            );
                        }
                        Some(PipeCommand::Resume) => {
                            paused = false;
                            debug!(
                                event = events::PIPE_RESUMED,
                                component = COMPONENT,
                                worker_id = context.worker_id(),
                                "pipe resumed"
                            );
                        }
                        Some(PipeCommand::Stop) | None => break 'forward,
                    },
                    value = input.recv(), if !paused => {
                        let Some(value) = value else {
                            reason = fields::REASON_INPUT_CLOSED;
                            debug!(
                                event = events::PIPE_INPUT_CLOSED,
                                component = COMPONENT,
                                worker_id = context.worker_id(),
                                "pipe input ended"
                            );
                            break 'forward;
                        };
                        let Some(mapped) = map(value) else {
                            continue 'forward;
                        };

                        // A slow consumer must not make the pipe deaf to stop.
                        let mut delivery = pin!(output.send(mapped));
                        loop {
                            tokio::select! {
                                biased;
                                command = control.recv() => match command {
                                    Some(PipeCommand::Pause) => paused = true,
                                    Some(PipeCommand::Resume) => paused = false,
                                    Some(PipeCommand::Stop) | None => break 'forward,
                                },
                                sent = &mut delivery => {
                                    if sent.is_err() {
                                        reason = fields::REASON_OUTPUT_CLOSED;
                                        debug!(
                                            event = events::PIPE_OUTPUT_CLOSED,
                                            component = COMPONENT,
                                            worker_id = context.worker_id(),
                                            "pipe output receiver dropped"
                                        );
                                        break 'forward;
                                    }
                                    break;
                                }
                            }
                        }
                    }
                }
            }

            debug!(
                event = events::PIPE_FINISHED,
                component = COMPONENT,
                worker_id = context.worker_id(),
                reason,
                "pipe finished"
            );
            if let Some(on_done) = on_done {
                on_done();
            }
        });
        debug_assert!(started.is_ok(), "fresh lifecycle cannot already be running");

        Self {
            lifecycle,
            _types: PhantomData,
        }
    }

    /// Stops consuming input until [`Mapper::resume`].
    pub async fn pause(&self) -> Result<(), LifecycleError> {
        self.lifecycle.send(PipeCommand::Pause).await
    }

    pub async fn resume(&self) -> Result<(), LifecycleError> {
        self.lifecycle.send(PipeCommand::Resume).await
    }

    pub async fn stop(&self) -> Result<(), LifecycleError> {
        self.lifecycle.stop().await
    }

    pub async fn wait_for_finish(&self) -> Result<(), LifecycleError> {
        self.lifecycle.wait_for_finish().await
    }

    pub fn is_running(&self) -> bool {
        self.lifecycle.is_running()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::time::{sleep, timeout};

    #[tokio::test]
    async fn mapper_transforms_every_value() {
        let (in_tx, in_rx) = mpsc::channel(1);
        let (out_tx, mut out_rx) = mpsc::channel(1);
        let mapper = Mapper::new(in_rx, out_tx, |x: i32| Some(x * 2));

        let producer = tokio::spawn(async move {
            for i in 0..6 {
                in_tx.send(i).await.expect("pipe input open");
            }
        });

        let mut values = Vec::new();
        for _ in 0..6 {
            values.push(out_rx.recv().await.expect("mapped value"));
        }
        producer.await.expect("producer finishes");
        mapper.stop().await.expect("stop should succeed");

        assert_eq!(values, vec![0, 2, 4, 6, 8, 10]);
    }

    #[tokio::test]
    async fn none_from_map_drops_the_value() {
        let (in_tx, in_rx) = mpsc::channel(8);
        let (out_tx, mut out_rx) = mpsc::channel(8);
        let _mapper = Mapper::new(in_rx, out_tx, |x: u8| (x % 2 == 0).then_some(x));

        for i in 0..6 {
            in_tx.send(i).await.expect("pipe input open");
        }
        drop(in_tx);

        let mut values = Vec::new();
        while let Some(v) = out_rx.recv().await {
            values.push(v);
        }
        assert_eq!(values, vec![0, 2, 4]);
    }

    #[tokio::test]
    async fn input_end_finishes_the_pipe_and_runs_done_hook() {
        let (in_tx, in_rx) = mpsc::channel::<u8>(1);
        let (out_tx, _out_rx) = mpsc::channel(1);
        let done = Arc::new(AtomicBool::new(false));
        let done_hook = Arc::clone(&done);
        let pipe = Pipe::with_on_done(
            in_rx,
            out_tx,
            Some,
            Some(Box::new(move || done_hook.store(true, Ordering::SeqCst))),
        );

        drop(in_tx);
        timeout(Duration::from_secs(1), pipe.wait_for_finish())
            .await
            .expect("pipe should finish after input ends")
            .expect("pipe should not panic");

        assert!(done.load(Ordering::SeqCst));
        assert!(!pipe.is_running());
    }

    #[tokio::test]
    async fn paused_pipe_holds_values_until_resumed() {
        let (in_tx, in_rx) = mpsc::channel(4);
        let (out_tx, mut out_rx) = mpsc::channel(4);
        let pipe = Pipe::pipe(in_rx, out_tx);

        pipe.pause().await.expect("pause accepted");
        in_tx.send(7).await.expect("input open");
        sleep(Duration::from_millis(50)).await;
        assert!(out_rx.try_recv().is_err());

        pipe.resume().await.expect("resume accepted");
        let value = timeout(Duration::from_secs(1), out_rx.recv())
            .await
            .expect("value should flow after resume");
        assert_eq!(value, Some(7));
        pipe.stop().await.expect("stop should succeed");
    }

    #[tokio::test]
    async fn stop_is_observed_while_blocked_on_a_full_output() {
        let (in_tx, in_rx) = mpsc::channel(4);
        let (out_tx, _out_rx) = mpsc::channel(1);
        let pipe = Pipe::pipe(in_rx, out_tx);

        for i in 0..3 {
            in_tx.send(i).await.expect("input open");
        }
        sleep(Duration::from_millis(20)).await;

        timeout(Duration::from_secs(1), pipe.stop())
            .await
            .expect("stop must not wait for the consumer")
            .expect("stop should succeed");
    }
}
