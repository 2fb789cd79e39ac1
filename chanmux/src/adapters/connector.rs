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

//! Reconnecting source: connect, read until the stream ends, back off, repeat.

use futures::future::BoxFuture;
use futures::FutureExt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info, trace, warn};

use crate::adapters::reader::{ReadResult, Reader};
use crate::config::{ConnectorConfig, LifecycleConfig};
use crate::error::{LifecycleError, StreamError};
use crate::observability::events;
use crate::observability::fields::{self, WorkerContext};
use crate::runtime::lifecycle::WorkerLifecycle;

const COMPONENT: &str = "connector";

pub(crate) enum ConnectorCommand {
    Stop,
}

/// Hook run once when the connector stops for good.
pub type OnConnectorClose = Box<dyn FnOnce() + Send>;

type SessionRead<M> = Box<dyn FnMut() -> BoxFuture<'static, ReadResult<M>> + Send>;
type ConnectFn<M> = Box<dyn FnMut() -> BoxFuture<'static, Result<SessionRead<M>, StreamError>> + Send>;
type MessageFn<M> = Box<dyn FnMut(M) -> Result<(), StreamError> + Send>;

/// Keeps a [`Reader`] attached to a source that may drop.
///
/// `connect` opens a session and returns the read function for it. Every
/// successfully read value goes to `on_message`. When the session's stream
/// ends, for an error or an expected disconnect, the connector waits the first
/// backoff step and reconnects. Failed connect attempts back off exponentially.
/// The liveness tick only logs.
pub struct Connector<M> {
    lifecycle: WorkerLifecycle<ConnectorCommand>,
    sessions: Arc<AtomicU64>,
    _message: std::marker::PhantomData<fn() -> M>,
}

impl<M: Send + 'static> Connector<M> {
    pub fn new<C, CFut, F, RFut, H>(
        mut connect: C,
        on_message: H,
        config: &ConnectorConfig,
        on_close: Option<OnConnectorClose>,
    ) -> Self
    where
        C: FnMut() -> CFut + Send + 'static,
        CFut: Future<Output = Result<F, StreamError>> + Send + 'static,
        F: FnMut() -> RFut + Send + 'static,
        RFut: Future<Output = ReadResult<M>> + Send + 'static,
        H: FnMut(M) -> Result<(), StreamError> + Send + 'static,
    {
        let lifecycle = WorkerLifecycle::new(
            COMPONENT,
            || ConnectorCommand::Stop,
            &LifecycleConfig::default(),
        );
        let sessions = Arc::new(AtomicU64::new(0));
        let connect: ConnectFn<M> = Box::new(move || {
            let connecting = connect();
            async move {
                let mut read = connecting.await?;
                let read: SessionRead<M> = Box::new(move || read().boxed());
                Ok(read)
            }
            .boxed()
        });
        let mut session = Session {
            context: lifecycle.context().clone(),
            config: config.clone(),
            connect,
            on_message: Box::new(on_message),
            sessions: Arc::clone(&sessions),
        };

        let started = lifecycle.start(move |mut control| async move {
            session.run(&mut control).await;
            info!(
                event = events::CONNECTOR_CLOSED,
                component = COMPONENT,
                worker_id = session.context.worker_id(),
                sessions = session.sessions.load(Ordering::SeqCst),
                "connector closed"
            );
            if let Some(on_close) = on_close {
                on_close();
            }
        });
        debug_assert!(started.is_ok(), "fresh lifecycle cannot already be running");

        Self {
            lifecycle,
            sessions,
            _message: std::marker::PhantomData,
        }
    }

    /// Number of sessions opened so far.
    pub fn sessions(&self) -> u64 {
        self.sessions.load(Ordering::SeqCst)
    }

    /// Stops the current session and the reconnect loop, then runs `on_close`.
    pub async fn stop(&self) -> Result<(), LifecycleError> {
        self.lifecycle.stop().await
    }

    pub fn is_running(&self) -> bool {
        self.lifecycle.is_running()
    }
}

struct Session<M> {
    context: WorkerContext,
    config: ConnectorConfig,
    connect: ConnectFn<M>,
    on_message: MessageFn<M>,
    sessions: Arc<AtomicU64>,
}

impl<M: Send + 'static> Session<M> {
    async fn run(&mut self, control: &mut mpsc::Receiver<ConnectorCommand>) {
        let interval = self.config.liveness_interval();
        let mut ticker = time::interval_at(time::Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut reconnecting = false;
        loop {
            // A source that accepts connections but drops them at once must
            // not turn this loop into a spin.
            if reconnecting && !pause(control, self.config.backoff.next(0)).await {
                return;
            }
            reconnecting = true;
            let Some(read) = self.connect_with_backoff(control).await else {
                return;
            };
            let session = self.sessions.fetch_add(1, Ordering::SeqCst) + 1;
            info!(
                event = events::CONNECTOR_CONNECT_OK,
                component = COMPONENT,
                worker_id = self.context.worker_id(),
                session,
                "connected"
            );

            let mut reader = Reader::with_options(read, &self.config.reader, None);
            loop {
                tokio::select! {
                    biased;
                    _ = control.recv() => {
                        let _ = reader.stop().await;
                        debug!(
                            event = events::CONNECTOR_STREAM_ENDED,
                            component = COMPONENT,
                            worker_id = self.context.worker_id(),
                            session,
                            reason = fields::REASON_STOP_REQUESTED,
                            "session closed"
                        );
                        return;
                    }
                    result = reader.recv() => match result {
                        Some(Ok(message)) => self.deliver(message),
                        Some(Err(err)) => {
                            warn!(
                                event = events::CONNECTOR_STREAM_ENDED,
                                component = COMPONENT,
                                worker_id = self.context.worker_id(),
                                session,
                                err = ?err,
                                "session failed; reconnecting"
                            );
                        }
                        None => {
                            debug!(
                                event = events::CONNECTOR_STREAM_ENDED,
                                component = COMPONENT,
                                worker_id = self.context.worker_id(),
                                session,
                                reason = fields::REASON_INPUT_CLOSED,
                                "session ended; reconnecting"
                            );
                            let _ = reader.stop().await;
                            break;
                        }
                    },
                    _ = ticker.tick() => {
                        trace!(
                            event = events::CONNECTOR_TICK,
                            component = COMPONENT,
                            worker_id = self.context.worker_id(),
                            session,
                            "connector alive"
                        );
                    }
                }
            }
        }
    }

    /// Calls `connect` until it succeeds, sleeping between failures. Returns
    /// `None` when a stop arrives first.
    async fn connect_with_backoff(
        &mut self,
        control: &mut mpsc::Receiver<ConnectorCommand>,
    ) -> Option<SessionRead<M>> {
        let mut attempt = 0u32;
        loop {
            let connecting = (self.connect)();
            let result = tokio::select! {
                biased;
                _ = control.recv() => return None,
                result = connecting => result,
            };
            let err = match result {
                Ok(read) => return Some(read),
                Err(err) => err,
            };

            let delay = self.config.backoff.next(attempt);
            attempt = attempt.saturating_add(1);
            warn!(
                event = events::CONNECTOR_CONNECT_FAILED,
                component = COMPONENT,
                worker_id = self.context.worker_id(),
                attempt,
                delay_ms = delay.as_millis() as u64,
                err = ?err,
                "connect failed; backing off"
            );
            if !pause(control, delay).await {
                return None;
            }
        }
    }

    fn deliver(&mut self, message: M) {
        if let Err(err) = (self.on_message)(message) {
            warn!(
                event = events::CONNECTOR_MESSAGE_REJECTED,
                component = COMPONENT,
                worker_id = self.context.worker_id(),
                err = ?err,
                "message handler failed"
            );
        }
    }
}

/// Sleeps for `delay`; `false` when a stop arrived first.
async fn pause(control: &mut mpsc::Receiver<ConnectorCommand>, delay: Duration) -> bool {
    tokio::select! {
        biased;
        _ = control.recv() => false,
        _ = time::sleep(delay) => true,
    }
}
