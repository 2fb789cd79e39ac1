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

//! Router that sends every message to every connected client.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::config::DeliveryPolicy;
use crate::envelope::Envelope;
use crate::hub_client::{ClientId, ClientSink};
use crate::routing::router::{deliver, RouteOutcome, Router};

/// Delivers to all clients in connection order. Topic subscriptions are
/// accepted and ignored.
pub struct Broadcaster<M> {
    clients: BTreeMap<ClientId, Arc<ClientSink<M>>>,
}

impl<M> Broadcaster<M> {
    pub fn new() -> Self {
        Self {
            clients: BTreeMap::new(),
        }
    }
}

impl<M> Default for Broadcaster<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: Send, K> Router<M, K> for Broadcaster<M> {
    fn add(&mut self, client: Arc<ClientSink<M>>) {
        self.clients.insert(client.id(), client);
    }

    fn remove(&mut self, client: ClientId) {
        self.clients.remove(&client);
    }

    fn add_route(&mut self, _client: &Arc<ClientSink<M>>, _topics: &[K]) {}

    fn remove_route(&mut self, _client: ClientId, _topics: &[K]) {}

    fn route_message(
        &self,
        envelope: &Envelope<M>,
        source: Option<ClientId>,
        policy: DeliveryPolicy,
    ) -> RouteOutcome {
        deliver(self.clients.values(), envelope, source, policy)
    }

    fn client_count(&self) -> usize {
        self.clients.len()
    }
}
