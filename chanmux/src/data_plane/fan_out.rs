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

//! One input stream broadcast to a dynamic set of output streams.

use serde::Serialize;
use std::fmt;
use std::pin::pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::config::{channel_capacity, FanOutConfig, LifecycleConfig};
use crate::data_plane::handles::{Ack, IdSequence, OutputId, Ownership};
use crate::error::LifecycleError;
use crate::observability::events;
use crate::observability::fields::{self, WorkerContext};
use crate::runtime::lifecycle::WorkerLifecycle;
use crate::runtime::ordering::{ControlGate, DataCursor, Stamped};

const COMPONENT: &str = "fan_out";

/// Per-output transform. Returning `None` skips that output for the value.
pub type Filter<T> = Arc<dyn Fn(&T) -> Option<T> + Send + Sync>;

pub(crate) struct Output<T> {
    id: OutputId,
    sender: mpsc::Sender<T>,
    ownership: Ownership,
    filter: Option<Filter<T>>,
}

pub(crate) enum FanOutCommand<T> {
    Add {
        output: Output<T>,
        ack: oneshot::Sender<bool>,
    },
    Remove {
        id: OutputId,
        ack: oneshot::Sender<bool>,
    },
    Stats {
        reply: oneshot::Sender<FanOutStats>,
    },
    Stop,
}

/// Serializable snapshot of a fan-out registry.
#[derive(Debug, Clone, Serialize)]
pub struct FanOutStats {
    pub worker_id: String,
    pub delivered: u64,
    pub outputs: Vec<OutputStats>,
}

#[derive(Debug, Clone, Serialize)]
pub struct OutputStats {
    pub id: OutputId,
    pub ownership: Ownership,
    pub filtered: bool,
}

impl fmt::Display for FanOutStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let json = serde_json::to_string(self).map_err(|_| fmt::Error)?;
        f.write_str(&json)
    }
}

/// An owned output created by [`FanOut::listen`].
///
/// The stream ends once the listener is removed or the fan-out stops.
pub struct Listener<T> {
    pub id: OutputId,
    receiver: mpsc::Receiver<T>,
}

impl<T> Listener<T> {
    pub async fn recv(&mut self) -> Option<T> {
        self.receiver.recv().await
    }

    pub fn receiver(&mut self) -> &mut mpsc::Receiver<T> {
        &mut self.receiver
    }

    pub fn into_receiver(self) -> mpsc::Receiver<T> {
        self.receiver
    }
}

/// Broadcasts every input value to each registered output, in registration
/// order.
///
/// Registration changes are linearized with [`FanOut::send`]: an `add` or
/// `remove` that returned before a value was sent is applied before that value
/// is delivered, and one issued after a send returned is applied after it.
/// Values arriving on a caller-supplied input are not ordered against
/// registration changes.
///
/// Delivery waits on slow outputs. Outputs whose receiver was dropped are
/// unregistered at the next delivery attempt.
pub struct FanOut<T> {
    lifecycle: WorkerLifecycle<Stamped<FanOutCommand<T>>>,
    input: Mutex<Option<mpsc::Sender<T>>>,
    cursor: DataCursor,
    ids: IdSequence,
    output_count: Arc<AtomicUsize>,
    listener_capacity: usize,
}

impl<T: Clone + Send + 'static> FanOut<T> {
    /// A fan-out that owns its input stream; feed it with [`FanOut::send`].
    pub fn new() -> Self {
        Self::with_config(&FanOutConfig::default())
    }

    pub fn with_config(config: &FanOutConfig) -> Self {
        let (input_tx, input_rx) = mpsc::channel(channel_capacity(config.input_capacity));
        Self::spawn(input_rx, Some(input_tx), config)
    }

    /// A fan-out reading from a caller-supplied stream. It finishes once every
    /// sender of that stream is dropped.
    pub fn with_input(input: mpsc::Receiver<T>, config: &FanOutConfig) -> Self {
        Self::spawn(input, None, config)
    }

    fn spawn(
        mut input: mpsc::Receiver<T>,
        input_tx: Option<mpsc::Sender<T>>,
        config: &FanOutConfig,
    ) -> Self {
        let lifecycle = WorkerLifecycle::new(
            COMPONENT,
            || Stamped::immediate(FanOutCommand::Stop),
            &LifecycleConfig::default(),
        );
        let output_count = Arc::new(AtomicUsize::new(0));
        let mut registry = Registry {
            context: lifecycle.context().clone(),
            outputs: Vec::new(),
            gate: ControlGate::new(),
            delivered: 0,
            output_count: Arc::clone(&output_count),
        };

        let started = lifecycle.start(move |mut control| async move {
            let mut reason = fields::REASON_STOP_REQUESTED;

            'run: loop {
                while let Some(command) = registry.gate.next_ready() {
                    registry.apply(command);
                }

                tokio::select! {
                    biased;
                    event = control.recv() => match event {
                        None | Some(Stamped { command: FanOutCommand::Stop, .. }) => break 'run,
                        Some(event) => registry.gate.hold(event),
                    },
                    value = input.recv() => {
                        let Some(value) = value else {
                            reason = fields::REASON_INPUT_CLOSED;
                            info!(
                                event = events::FAN_OUT_INPUT_CLOSED,
                                component = COMPONENT,
                                worker_id = registry.context.worker_id(),
                                "fan-out input ended"
                            );
                            break 'run;
                        };
                        registry.gate.consumed_one();
                        if registry.deliver(value, &mut control).await == Flow::Stop {
                            break 'run;
                        }
                    }
                }
            }

            registry.close(reason);
        });
        debug_assert!(started.is_ok(), "fresh lifecycle cannot already be running");

        Self {
            lifecycle,
            input: Mutex::new(input_tx),
            cursor: DataCursor::default(),
            ids: IdSequence::default(),
            output_count,
            listener_capacity: channel_capacity(config.listener_capacity),
        }
    }

    /// Sends a value into the owned input stream.
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
        self.cursor
            .send(&input, value)
            .await
            .map_err(|_| self.lifecycle.stopped_error())
    }

    /// Registers an output.
    ///
    /// Adding a sender that is already registered (same channel) is a no-op;
    /// its ack resolves to `false` and the returned id is never registered.
    pub async fn add(
        &self,
        output: mpsc::Sender<T>,
        filter: Option<Filter<T>>,
        ownership: Ownership,
    ) -> Result<(OutputId, Ack), LifecycleError> {
        let id = self.ids.next_output();
        let (ack_tx, ack) = Ack::channel();
        self.control(FanOutCommand::Add {
            output: Output {
                id,
                sender: output,
                ownership,
                filter,
            },
            ack: ack_tx,
        })
        .await?;
        Ok((id, ack))
    }

    /// Creates and registers an owned output stream.
    pub async fn listen(&self, filter: Option<Filter<T>>) -> Result<Listener<T>, LifecycleError> {
        let (sender, receiver) = mpsc::channel(self.listener_capacity);
        let (id, _ack) = self.add(sender, filter, Ownership::Owned).await?;
        Ok(Listener { id, receiver })
    }

    /// Unregisters an output. Unknown ids are ignored.
    ///
    /// An owned output is closed once the removal is applied; await the ack
    /// before reusing or closing an external one.
    pub async fn remove(&self, id: OutputId) -> Result<Ack, LifecycleError> {
        let (ack_tx, ack) = Ack::channel();
        self.control(FanOutCommand::Remove { id, ack: ack_tx })
            .await?;
        Ok(ack)
    }

    /// Number of registered outputs as of the last applied change.
    pub fn count(&self) -> usize {
        self.output_count.load(Ordering::SeqCst)
    }

    pub async fn stats(&self) -> Result<FanOutStats, LifecycleError> {
        let (reply, stats) = oneshot::channel();
        self.control(FanOutCommand::Stats { reply }).await?;
        stats.await.map_err(|_| self.lifecycle.stopped_error())
    }

    /// Stops delivery, closes owned outputs and the owned input.
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

    async fn control(&self, command: FanOutCommand<T>) -> Result<(), LifecycleError> {
        self.lifecycle.send(self.cursor.stamp(command)).await
    }
}

impl<T: Clone + Send + 'static> Default for FanOut<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Flow {
    Continue,
    Stop,
}

struct Registry<T> {
    context: WorkerContext,
    outputs: Vec<Output<T>>,
    /// Control events waiting for the values sent before them.
    gate: ControlGate<FanOutCommand<T>>,
    delivered: u64,
    output_count: Arc<AtomicUsize>,
}

impl<T: Clone> Registry<T> {
    /// Applies a released control event. Stop never reaches the gate.
    fn apply(&mut self, command: FanOutCommand<T>) {
        match command {
            FanOutCommand::Add { output, ack } => {
                let _ = ack.send(self.add(output));
            }
            FanOutCommand::Remove { id, ack } => {
                let _ = ack.send(self.remove(id, fields::REASON_REMOVED));
            }
            FanOutCommand::Stats { reply } => {
                let _ = reply.send(self.stats());
            }
            FanOutCommand::Stop => {}
        }
    }

    fn add(&mut self, output: Output<T>) -> bool {
        if let Some(existing) = self
            .outputs
            .iter()
            .find(|o| o.sender.same_channel(&output.sender))
        {
            debug!(
                event = events::FAN_OUT_LISTENER_DUPLICATE,
                component = COMPONENT,
                worker_id = self.context.worker_id(),
                output_id = %existing.id,
                "output already registered"
            );
            return false;
        }

        debug!(
            event = events::FAN_OUT_LISTENER_ADD,
            component = COMPONENT,
            worker_id = self.context.worker_id(),
            output_id = %output.id,
            owned = output.ownership == Ownership::Owned,
            listener_count = self.outputs.len() + 1,
            "output registered"
        );
        self.outputs.push(output);
        self.output_count.store(self.outputs.len(), Ordering::SeqCst);
        true
    }

    fn remove(&mut self, id: OutputId, reason: &'static str) -> bool {
        let Some(index) = self.outputs.iter().position(|o| o.id == id) else {
            return false;
        };
        // Dropping the sender is what closes an owned output.
        let removed = self.outputs.remove(index);
        self.output_count.store(self.outputs.len(), Ordering::SeqCst);
        debug!(
            event = events::FAN_OUT_LISTENER_REMOVE,
            component = COMPONENT,
            worker_id = self.context.worker_id(),
            output_id = %removed.id,
            owned = removed.ownership == Ownership::Owned,
            listener_count = self.outputs.len(),
            reason,
            "output unregistered"
        );
        true
    }

    fn stats(&self) -> FanOutStats {
        FanOutStats {
            worker_id: self.context.worker_id.clone(),
            delivered: self.delivered,
            outputs: self
                .outputs
                .iter()
                .map(|o| OutputStats {
                    id: o.id,
                    ownership: o.ownership,
                    filtered: o.filter.is_some(),
                })
                .collect(),
        }
    }

    async fn deliver(
        &mut self,
        value: T,
        control: &mut mpsc::Receiver<Stamped<FanOutCommand<T>>>,
    ) -> Flow {
        let mut gone = Vec::new();

        for output in &self.outputs {
            let item = match &output.filter {
                Some(filter) => filter(&value),
                None => Some(value.clone()),
            };
            let Some(item) = item else { continue };

            let mut send = pin!(output.sender.send(item));
            loop {
                tokio::select! {
                    biased;
                    event = control.recv() => match event {
                        None | Some(Stamped { command: FanOutCommand::Stop, .. }) => {
                            return Flow::Stop
                        }
                        Some(event) => self.gate.hold(event),
                    },
                    sent = &mut send => {
                        if sent.is_err() {
                            gone.push(output.id);
                        }
                        break;
                    }
                }
            }
        }

        self.delivered += 1;
        for id in gone {
            if self.remove(id, fields::REASON_RECEIVER_DROPPED) {
                warn!(
                    event = events::FAN_OUT_LISTENER_DROPPED,
                    component = COMPONENT,
                    worker_id = self.context.worker_id(),
                    output_id = %id,
                    "output receiver dropped; unregistered"
                );
            }
        }
        Flow::Continue
    }

    fn close(self, reason: &'static str) {
        let owned = self
            .outputs
            .iter()
            .filter(|o| o.ownership == Ownership::Owned)
            .count();
        info!(
            event = events::FAN_OUT_CLOSED,
            component = COMPONENT,
            worker_id = self.context.worker_id(),
            listener_count = self.outputs.len(),
            owned,
            delivered = self.delivered,
            reason,
            "fan-out closing outputs"
        );
        self.output_count.store(0, Ordering::SeqCst);
    }
}
