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

//! Hub clients: the router-side write sink and the caller-side handle.

use futures::future::BoxFuture;
use futures::FutureExt;
use std::fmt;
use std::future::Future;
use tokio::sync::mpsc;

use crate::envelope::Envelope;
use crate::error::{HubError, StreamError};
use crate::hub::{HubControl, Publish, Publisher};
use crate::runtime::ordering::Stamped;

/// Unique id of a connected hub client.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClientId(u64);

impl ClientId {
    pub(crate) fn from_raw(raw: u64) -> Self {
        ClientId(raw)
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Write callback invoked inline by the hub's routing task. It must not block.
pub type WriteFn<M> = Box<dyn Fn(&Envelope<M>) -> Result<(), StreamError> + Send + Sync>;

/// Poll function whose results the hub republishes. An envelope carrying an
/// error is published and then ends polling.
pub type ReadFn<M> = Box<dyn FnMut() -> BoxFuture<'static, Envelope<M>> + Send>;

/// Reader and/or writer to attach to a hub with [`crate::Hub::connect`].
pub struct Endpoint<M> {
    pub(crate) reader: Option<ReadFn<M>>,
    pub(crate) writer: Option<WriteFn<M>>,
}

impl<M> Endpoint<M> {
    pub fn new() -> Self {
        Self {
            reader: None,
            writer: None,
        }
    }

    pub fn with_writer<F>(mut self, write: F) -> Self
    where
        F: Fn(&Envelope<M>) -> Result<(), StreamError> + Send + Sync + 'static,
    {
        self.writer = Some(Box::new(write));
        self
    }

    pub fn with_reader<F, Fut>(mut self, mut read: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = Envelope<M>> + Send + 'static,
    {
        self.reader = Some(Box::new(move || read().boxed()));
        self
    }
}

impl<M> Default for Endpoint<M> {
    fn default() -> Self {
        Self::new()
    }
}

/// The routers' view of a client: its id and write callback.
pub struct ClientSink<M> {
    id: ClientId,
    writer: WriteFn<M>,
}

impl<M> ClientSink<M> {
    pub fn new(id: ClientId, writer: WriteFn<M>) -> Self {
        Self { id, writer }
    }

    pub fn id(&self) -> ClientId {
        self.id
    }

    pub fn write(&self, envelope: &Envelope<M>) -> Result<(), StreamError> {
        (self.writer)(envelope)
    }
}

impl<M> fmt::Debug for ClientSink<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientSink").field("id", &self.id).finish()
    }
}

/// Caller-side handle of a connected client.
///
/// Operations issued one after another by the same task take effect in that
/// order, whether they go to the hub's control or publish stream.
pub struct HubClient<M, K> {
    id: ClientId,
    control: mpsc::Sender<Stamped<HubControl<M, K>>>,
    publisher: Publisher<M>,
}

impl<M, K> HubClient<M, K> {
    pub(crate) fn new(
        id: ClientId,
        control: mpsc::Sender<Stamped<HubControl<M, K>>>,
        publisher: Publisher<M>,
    ) -> Self {
        Self {
            id,
            control,
            publisher,
        }
    }

    pub fn id(&self) -> ClientId {
        self.id
    }

    /// Adds topics to this client's subscriptions.
    pub async fn subscribe<I>(&self, topics: I) -> Result<(), HubError>
    where
        I: IntoIterator<Item = K>,
    {
        let topics = topics.into_iter().collect();
        self.control(HubControl::Subscribe {
            client: self.id,
            topics,
        })
        .await
    }

    pub async fn unsubscribe<I>(&self, topics: I) -> Result<(), HubError>
    where
        I: IntoIterator<Item = K>,
    {
        let topics = topics.into_iter().collect();
        self.control(HubControl::Unsubscribe {
            client: self.id,
            topics,
        })
        .await
    }

    /// Removes the client from the hub and stops polling its reader.
    pub async fn disconnect(&self) -> Result<(), HubError> {
        self.control(HubControl::Disconnect { client: self.id }).await
    }

    /// Publishes with this client as the source, so its own writer is skipped.
    pub async fn publish(&self, message: M) -> Result<(), HubError> {
        self.publisher
            .send(Publish::new(Envelope::ok(message), Some(self.id)))
            .await
    }

    async fn control(&self, event: HubControl<M, K>) -> Result<(), HubError> {
        self.control
            .send(self.publisher.stamp(event))
            .await
            .map_err(|_| HubError::Stopped)
    }
}

impl<M, K> Clone for HubClient<M, K> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            control: self.control.clone(),
            publisher: self.publisher.clone(),
        }
    }
}

impl<M, K> fmt::Debug for HubClient<M, K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HubClient").field("id", &self.id).finish()
    }
}

