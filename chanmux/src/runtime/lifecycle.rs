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

//! Start/stop/cleanup state machine shared by every active component.
//!
//! A [`WorkerLifecycle`] owns one background task and the control stream that
//! feeds it. Components embed one, hand their run loop to [`WorkerLifecycle::start`]
//! and let it own the running flag, the completion barrier and the final close
//! of the control stream.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, info, warn};

use crate::config::{channel_capacity, LifecycleConfig};
use crate::error::LifecycleError;
use crate::observability::events;
use crate::observability::fields::WorkerContext;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

struct LifecycleState<C> {
    running: AtomicBool,
    control: Mutex<Option<mpsc::Sender<C>>>,
}

impl<C> LifecycleState<C> {
    fn control_sender(&self) -> Option<mpsc::Sender<C>> {
        lock(&self.control).clone()
    }

    fn finish(&self) {
        // Dropping the last sender held outside the run loop closes the stream.
        lock(&self.control).take();
        self.running.store(false, Ordering::SeqCst);
    }
}

/// Runs cleanup even when the run loop panics.
struct FinishGuard<C> {
    state: Arc<LifecycleState<C>>,
    context: WorkerContext,
}

impl<C> Drop for FinishGuard<C> {
    fn drop(&mut self) {
        self.state.finish();
        info!(
            event = events::WORKER_STOPPED,
            component = self.context.component,
            worker_id = self.context.worker_id(),
            "worker stopped"
        );
    }
}

/// Control stream, running flag and completion barrier of one background task.
pub struct WorkerLifecycle<C> {
    context: WorkerContext,
    control_capacity: usize,
    stop_command: fn() -> C,
    state: Arc<LifecycleState<C>>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl<C: Send + 'static> WorkerLifecycle<C> {
    /// `stop_command` builds the value [`WorkerLifecycle::stop`] sends to the run loop.
    pub fn new(component: &'static str, stop_command: fn() -> C, config: &LifecycleConfig) -> Self {
        Self {
            context: WorkerContext::new(component),
            control_capacity: channel_capacity(config.control_capacity),
            stop_command,
            state: Arc::new(LifecycleState {
                running: AtomicBool::new(false),
                control: Mutex::new(None),
            }),
            handle: Mutex::new(None),
        }
    }

    /// Opens a fresh control stream and spawns `run` on the current Tokio runtime.
    ///
    /// Fails with [`LifecycleError::AlreadyRunning`] while a previous run is
    /// still alive.
    pub fn start<F, Fut>(&self, run: F) -> Result<(), LifecycleError>
    where
        F: FnOnce(mpsc::Receiver<C>) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mut handle_slot = lock(&self.handle);
        let alive = handle_slot
            .as_ref()
            .map(|handle| !handle.is_finished())
            .unwrap_or(false);
        if alive || self.is_running() {
            warn!(
                event = events::WORKER_START_REJECTED,
                component = self.context.component,
                worker_id = self.context.worker_id(),
                "worker is already running"
            );
            return Err(LifecycleError::AlreadyRunning {
                worker: self.context.component,
            });
        }

        let (control_tx, control_rx) = mpsc::channel(self.control_capacity);
        *lock(&self.state.control) = Some(control_tx);
        self.state.running.store(true, Ordering::SeqCst);

        let guard = FinishGuard {
            state: Arc::clone(&self.state),
            context: self.context.clone(),
        };
        let run_loop = run(control_rx);
        *handle_slot = Some(tokio::spawn(async move {
            let _guard = guard;
            run_loop.await;
        }));

        info!(
            event = events::WORKER_START,
            component = self.context.component,
            worker_id = self.context.worker_id(),
            "worker started"
        );
        Ok(())
    }

    /// Sends the stop command and waits until the run loop has exited and
    /// cleanup has completed.
    ///
    /// A run loop that already finished on its own is simply joined.
    pub async fn stop(&self) -> Result<(), LifecycleError> {
        let control = self.state.control_sender();
        let handle = lock(&self.handle).take();
        if control.is_none() && handle.is_none() {
            return Err(LifecycleError::Stopped {
                worker: self.context.component,
            });
        }

        if let Some(control) = control {
            debug!(
                event = events::WORKER_STOP_REQUESTED,
                component = self.context.component,
                worker_id = self.context.worker_id(),
                "sending stop command"
            );
            // The loop may have exited since the sender was cloned.
            let _ = control.send((self.stop_command)()).await;
        }

        match handle {
            Some(handle) => self.join(handle).await,
            None => Ok(()),
        }
    }

    /// Waits for the run loop to exit on its own, without asking it to stop.
    pub async fn wait_for_finish(&self) -> Result<(), LifecycleError> {
        let handle = lock(&self.handle).take();
        match handle {
            Some(handle) => self.join(handle).await,
            None => Ok(()),
        }
    }

    /// Enqueues a control command for the run loop.
    pub async fn send(&self, command: C) -> Result<(), LifecycleError> {
        let control = self.state.control_sender().ok_or(LifecycleError::Stopped {
            worker: self.context.component,
        })?;
        control
            .send(command)
            .await
            .map_err(|_| LifecycleError::Stopped {
                worker: self.context.component,
            })
    }

    pub fn is_running(&self) -> bool {
        self.state.running.load(Ordering::SeqCst)
    }

    pub fn context(&self) -> &WorkerContext {
        &self.context
    }

    /// A clone of the current control sender, `None` once the run loop is gone.
    pub(crate) fn control_sender(&self) -> Option<mpsc::Sender<C>> {
        self.state.control_sender()
    }

    pub(crate) fn stopped_error(&self) -> LifecycleError {
        LifecycleError::Stopped {
            worker: self.context.component,
        }
    }

    async fn join(&self, handle: JoinHandle<()>) -> Result<(), LifecycleError> {
        handle.await.or_else(|err| self.join_error(err))
    }

    fn join_error(&self, err: JoinError) -> Result<(), LifecycleError> {
        if !err.is_panic() {
            return Ok(());
        }
        let payload = err.into_panic();
        let reason = payload
            .downcast_ref::<&str>()
            .map(|msg| msg.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        warn!(
            event = events::WORKER_PANICKED,
            component = self.context.component,
            worker_id = self.context.worker_id(),
            reason = reason.as_str(),
            "worker panicked"
        );
        Err(LifecycleError::Panicked {
            worker: self.context.component,
            reason,
        })
    }
}
