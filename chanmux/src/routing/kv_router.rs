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

//! Topic-keyed router: a message goes to the clients subscribed to its topic.

use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;
use std::sync::Arc;

use crate::config::DeliveryPolicy;
use crate::envelope::Envelope;
use crate::hub_client::{ClientId, ClientSink};
use crate::routing::router::{deliver, RouteOutcome, Router};

type TopicFn<M, K> = Box<dyn Fn(&M) -> K + Send + Sync>;

/// Routes each message to the subscribers of the topic derived from it.
///
/// A client appears at most once per topic, in subscription order.
pub struct KVRouter<M, K> {
    topic_of: TopicFn<M, K>,
    routes: HashMap<K, Vec<Arc<ClientSink<M>>>>,
    clients: BTreeMap<ClientId, Arc<ClientSink<M>>>,
}

impl<M, K> KVRouter<M, K>
where
    K: Eq + Hash,
{
    pub fn new<F>(topic_of: F) -> Self
    where
        F: Fn(&M) -> K + Send + Sync + 'static,
    {
        Self {
            topic_of: Box::new(topic_of),
            routes: HashMap::new(),
            clients: BTreeMap::new(),
        }
    }

    /// Number of topics with at least one subscriber.
    pub fn topic_count(&self) -> usize {
        self.routes.len()
    }

    pub fn subscribers(&self, topic: &K) -> Vec<ClientId> {
        self.routes
            .get(topic)
            .map(|clients| clients.iter().map(|c| c.id()).collect())
            .unwrap_or_default()
    }
}

impl<M, K> Router<M, K> for KVRouter<M, K>
where
    M: Send,
    K: Eq + Hash + Clone + Send,
{
    fn add(&mut self, client: Arc<ClientSink<M>>) {
        self.clients.insert(client.id(), client);
    }

    fn remove(&mut self, client: ClientId) {
        self.clients.remove(&client);
        self.routes.retain(|_, subscribers| {
            subscribers.retain(|c| c.id() != client);
            !subscribers.is_empty()
        });
    }

    fn add_route(&mut self, client: &Arc<ClientSink<M>>, topics: &[K]) {
        for topic in topics {
            let subscribers = self.routes.entry(topic.clone()).or_default();
            if !subscribers.iter().any(|c| c.id() == client.id()) {
                subscribers.push(Arc::clone(client));
            }
        }
    }

    fn remove_route(&mut self, client: ClientId, topics: &[K]) {
        for topic in topics {
            let now_empty = match self.routes.get_mut(topic) {
                Some(subscribers) => {
                    subscribers.retain(|c| c.id() != client);
                    subscribers.is_empty()
                }
                None => false,
            };
            if now_empty {
                self.routes.remove(topic);
            }
        }
    }

    fn route_message(
        &self,
        envelope: &Envelope<M>,
        source: Option<ClientId>,
        policy: DeliveryPolicy,
    ) -> RouteOutcome {
        let topic = (self.topic_of)(&envelope.message);
        match self.routes.get(&topic) {
            Some(subscribers) => deliver(subscribers, envelope, source, policy),
            None => RouteOutcome::default(),
        }
    }

    fn client_count(&self) -> usize {
        self.clients.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::router::test_support::recording_sink;
    use std::sync::Mutex;

    fn first_letter(message: &String) -> String {
        message[..1].to_string()
    }

    fn topics(list: &[&str]) -> Vec<String> {
        list.iter().map(|t| t.to_string()).collect()
    }

    #[test]
    fn delivers_only_to_subscribers_of_the_topic() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut router = KVRouter::new(first_letter);
        let c1 = recording_sink(1, log.clone(), None);
        let c2 = recording_sink(2, log.clone(), None);
        router.add(c1.clone());
        router.add(c2.clone());
        router.add_route(&c1, &topics(&["a", "b"]));
        router.add_route(&c2, &topics(&["b"]));

        router.route_message(&Envelope::ok("a1".into()), None, DeliveryPolicy::FailFast);
        router.route_message(&Envelope::ok("b2".into()), None, DeliveryPolicy::FailFast);
        router.route_message(&Envelope::ok("z3".into()), None, DeliveryPolicy::FailFast);

        assert_eq!(
            *log.lock().unwrap(),
            vec![(1, "a1".to_string()), (1, "b2".to_string()), (2, "b2".to_string())]
        );
    }

    #[test]
    fn repeated_subscription_is_recorded_once() {
        let mut router: KVRouter<String, String> = KVRouter::new(first_letter);
        let c1 = recording_sink(1, Arc::new(Mutex::new(Vec::new())), None);
        router.add(c1.clone());

        router.add_route(&c1, &topics(&["a", "a"]));
        router.add_route(&c1, &topics(&["a"]));

        assert_eq!(router.subscribers(&"a".to_string()), vec![ClientId::from_raw(1)]);
    }

    #[test]
    fn remove_clears_every_topic_of_the_client() {
        let mut router: KVRouter<String, String> = KVRouter::new(first_letter);
        let c1 = recording_sink(1, Arc::new(Mutex::new(Vec::new())), None);
        let c2 = recording_sink(2, Arc::new(Mutex::new(Vec::new())), None);
        router.add(c1.clone());
        router.add(c2.clone());
        router.add_route(&c1, &topics(&["a", "b", "c"]));
        router.add_route(&c2, &topics(&["c"]));

        router.remove(c1.id());

        assert_eq!(router.client_count(), 1);
        assert_eq!(router.topic_count(), 1);
        assert_eq!(router.subscribers(&"c".to_string()), vec![c2.id()]);
    }

    #[test]
    fn unsubscribing_drops_empty_topics() {
        let mut router: KVRouter<String, String> = KVRouter::new(first_letter);
        let c1 = recording_sink(1, Arc::new(Mutex::new(Vec::new())), None);
        router.add(c1.clone());
        router.add_route(&c1, &topics(&["a", "b"]));

        router.remove_route(c1.id(), &topics(&["a", "x"]));

        assert_eq!(router.topic_count(), 1);
        assert!(router.subscribers(&"a".to_string()).is_empty());
    }
}
