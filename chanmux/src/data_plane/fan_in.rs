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

//! A dynamic set of input streams merged onto one output stream.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::config::{channel_capacity, FanInConfig, LifecycleConfig};
use crate::data_plane::handles::{Ack, IdSequence, InputId, Ownership};
use crate::data_plane::pipe::Pipe;
use crate::error::LifecycleError;
use crate::observability::events;
use crate::observability::fields::{self, WorkerContext};
use crate::runtime::lifecycle::WorkerLifecycle;

const COMPONENT: &str = "fan_in";

/// Invoked with the id of every input that leaves the registry, whether it
/// was removed explicitly or its stream ended. Not invoked on stop.
pub type OnInputRemoved = Arc<dyn Fn(InputId) + Send + Sync>;

pub(crate) enum FanInCommand<T> {
    Add {
        id: InputId,
        input: mpsc::Receiver<T>,
        ack: oneshot::Sender<bool>,
    },
    Remove {
        id: InputId,
        ack: oneshot::Sender<bool>,
    },
    Stop,
}

/// Merges any number of input streams onto one output, one [`Pipe`] per
/// input.
///
/// An input whose senders are all dropped is unregistered automatically. On
/// stop every pipe is halted first; an owned output closes only after the
/// last pipe has finished.
pub struct FanIn<T> {
    lifecycle: WorkerLifecycle<FanInCommand<T>>,
    ids: IdSequence,
    input_count: Arc<AtomicUsize>,
}

impl<T: Send + 'static> FanIn<T> {
    /// A fan-in owning its output; the merged stream is returned alongside.
    pub fn new() -> (Self, mpsc::Receiver<T>) {
        Self::with_config(&FanInConfig::default(), None)
    }

    pub fn with_config(
        config: &FanInConfig,
        on_input_removed: Option<OnInputRemoved>,
    ) -> (Self, mpsc::Receiver<T>) {
        let (output, merged) = mpsc::channel(channel_capacity(config.output_capacity));
        let fan_in = Self::spawn(output, Ownership::Owned, on_input_removed);
        (fan_in, merged)
    }

    /// A fan-in writing to a caller-supplied output, which it never closes.
    pub fn with_output(output: mpsc::Sender<T>, on_input_removed: Option<OnInputRemoved>) -> Self {
        Self::spawn(output, Ownership::External, on_input_removed)
    }

    fn spawn(
        output: mpsc::Sender<T>,
        ownership: Ownership,
        on_input_removed: Option<OnInputRemoved>,
    ) -> Self {
        let lifecycle =
            WorkerLifecycle::new(COMPONENT, || FanInCommand::Stop, &LifecycleConfig::default());
        let input_count = Arc::new(AtomicUsize::new(0));
        let (closed_tx, mut closed_rx) = mpsc::unbounded_channel();
        let mut inputs = Inputs {
            context: lifecycle.context().clone(),
            pipes: BTreeMap::new(),
            output,
            ownership,
            closed_tx,
            on_input_removed,
            input_count: Arc::clone(&input_count),
        };

        let started = lifecycle.start(move |mut control| async move {
            loop {
                tokio::select! {
                    biased;
                    command = control.recv() => match command {
                        Some(FanInCommand::Add { id, input, ack }) => {
                            let _ = ack.send(inputs.add(id, input));
                        }
                        Some(FanInCommand::Remove { id, ack }) => {
                            let _ = ack.send(inputs.remove(id).await);
                        }
                        Some(FanInCommand::Stop) | None => break,
                    },
                    Some(id) = closed_rx.recv() => inputs.input_ended(id).await,
                }
            }

            inputs.close().await;
        });
        debug_assert!(started.is_ok(), "fresh lifecycle cannot already be running");

        Self {
            lifecycle,
            ids: IdSequence::default(),
            input_count,
        }
    }

    /// Registers an input stream and starts forwarding it.
    pub async fn add(&self, input: mpsc::Receiver<T>) -> Result<(InputId, Ack), LifecycleError> {
        let id = self.ids.next_input();
        let (ack_tx, ack) = Ack::channel();
        self.lifecycle
            .send(FanInCommand::Add {
                id,
                input,
                ack: ack_tx,
            })
            .await?;
        Ok((id, ack))
    }

    /// Registers several input streams, in order.
    pub async fn add_all<I>(&self, inputs: I) -> Result<Vec<InputId>, LifecycleError>
    where
        I: IntoIterator<Item = mpsc::Receiver<T>>,
    {
        let mut ids = Vec::new();
        for input in inputs {
            let (id, _ack) = self.add(input).await?;
            ids.push(id);
        }
        Ok(ids)
    }

    /// Stops and discards the pipe of one input. Unknown ids are ignored.
    pub async fn remove(&self, id: InputId) -> Result<Ack, LifecycleError> {
        let (ack_tx, ack) = Ack::channel();
        self.lifecycle
            .send(FanInCommand::Remove { id, ack: ack_tx })
            .await?;
        Ok(ack)
    }

    pub fn count(&self) -> usize {
        self.input_count.load(Ordering::SeqCst)
    }

    pub async fn stop(&self) -> Result<(), LifecycleError> {
        self.lifecycle.stop().await
    }

    pub fn is_running(&self) -> bool {
        self.lifecycle.is_running()
    }
}

struct Inputs<T> {
    context: WorkerContext,
    pipes: BTreeMap<InputId, Pipe<T>>,
    output: mpsc::Sender<T>,
    ownership: Ownership,
    closed_tx: mpsc::UnboundedSender<InputId>,
    on_input_removed: Option<OnInputRemoved>,
    input_count: Arc<AtomicUsize>,
}

impl<T: Send + 'static> Inputs<T> {
    fn add(&mut self, id: InputId, input: mpsc::Receiver<T>) -> bool {
        let closed_tx = self.closed_tx.clone();
        let pipe = Pipe::with_on_done(
            input,
            self.output.clone(),
            Some,
            Some(Box::new(move || {
                let _ = closed_tx.send(id);
            })),
        );
        self.pipes.insert(id, pipe);
        self.refresh_count();
        debug!(
            event = events::FAN_IN_INPUT_ADD,
            component = COMPONENT,
            worker_id = self.context.worker_id(),
            input_id = %id,
            input_count = self.pipes.len(),
            "input registered"
        );
        true
    }

    async fn remove(&mut self, id: InputId) -> bool {
        let Some(pipe) = self.pipes.remove(&id) else {
            return false;
        };
        self.refresh_count();
        if let Err(err) = pipe.stop().await {
            warn!(
                event = events::FAN_IN_INPUT_REMOVE,
                component = COMPONENT,
                worker_id = self.context.worker_id(),
                input_id = %id,
                err = ?err,
                "pipe did not stop cleanly"
            );
        }
        debug!(
            event = events::FAN_IN_INPUT_REMOVE,
            component = COMPONENT,
            worker_id = self.context.worker_id(),
            input_id = %id,
            input_count = self.pipes.len(),
            reason = fields::REASON_REMOVED,
            "input unregistered"
        );
        self.notify_removed(id);
        true
    }

    /// A pipe reported the end of its input. Stale reports for pipes that were
    /// already removed are ignored.
    async fn input_ended(&mut self, id: InputId) {
        let Some(pipe) = self.pipes.remove(&id) else {
            return;
        };
        self.refresh_count();
        let _ = pipe.wait_for_finish().await;
        debug!(
            event = events::FAN_IN_INPUT_CLOSED,
            component = COMPONENT,
            worker_id = self.context.worker_id(),
            input_id = %id,
            input_count = self.pipes.len(),
            reason = fields::REASON_INPUT_CLOSED,
            "input ended; unregistered"
        );
        self.notify_removed(id);
    }

    fn notify_removed(&self, id: InputId) {
        if let Some(callback) = &self.on_input_removed {
            callback(id);
        }
    }

    fn refresh_count(&self) {
        self.input_count.store(self.pipes.len(), Ordering::SeqCst);
    }

    async fn close(mut self) {
        let pipes = std::mem::take(&mut self.pipes);
        let remaining = pipes.len();
        for (_, pipe) in pipes {
            let _ = pipe.stop().await;
        }
        self.refresh_count();
        info!(
            event = events::FAN_IN_CLOSED,
            component = COMPONENT,
            worker_id = self.context.worker_id(),
            input_count = remaining,
            owned = self.ownership == Ownership::Owned,
            reason = fields::REASON_STOP_REQUESTED,
            "fan-in stopped all pipes"
        );
        // Every pipe has finished, so dropping the last sender cannot race a write.
        drop(self.output);
    }
}
