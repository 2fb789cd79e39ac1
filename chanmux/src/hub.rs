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

//! Topic-routed publish/subscribe hub.

use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, trace, warn};

use crate::config::{channel_capacity, DeliveryPolicy, HubConfig, LifecycleConfig};
use crate::envelope::Envelope;
use crate::error::{HubError, StreamError};
use crate::hub_client::{ClientId, ClientSink, Endpoint, HubClient, ReadFn};
use crate::observability::events;
use crate::observability::fields::WorkerContext;
use crate::routing::{Broadcaster, RouteOutcome, RouteReport, Router};
use crate::runtime::lifecycle::WorkerLifecycle;
use crate::runtime::ordering::{ControlGate, DataCursor, Stamped};

const COMPONENT: &str = "hub";

type Pollers = Arc<Mutex<HashMap<ClientId, JoinHandle<()>>>>;

fn lock_pollers(pollers: &Pollers) -> MutexGuard<'_, HashMap<ClientId, JoinHandle<()>>> {
    pollers.lock().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) enum HubControl<M, K> {
    Connect {
        client: ClientId,
        sink: Option<Arc<ClientSink<M>>>,
    },
    Subscribe {
        client: ClientId,
        topics: Vec<K>,
    },
    Unsubscribe {
        client: ClientId,
        topics: Vec<K>,
    },
    Disconnect {
        client: ClientId,
    },
    Stop,
}

pub(crate) struct Publish<M> {
    envelope: Envelope<M>,
    source: Option<ClientId>,
    callback: Option<mpsc::Sender<M>>,
    report: Option<oneshot::Sender<Result<RouteReport, HubError>>>,
}

impl<M> Publish<M> {
    pub(crate) fn new(envelope: Envelope<M>, source: Option<ClientId>) -> Self {
        Self {
            envelope,
            source,
            callback: None,
            report: None,
        }
    }
}

/// Publish/subscribe broker in front of a [`Router`].
///
/// A single control task owns the router. It drains three inputs: control
/// events (connect, subscribe, unsubscribe, disconnect), publishes, and a
/// liveness tick. Control events and publishes are applied in the order they
/// were issued: a subscription change made before a publish is visible to that
/// publish's routing, and one made after a publish returned is not.
///
/// Routing runs inline on the control task, so writers must not block.
pub struct Hub<M, K = String> {
    lifecycle: WorkerLifecycle<Stamped<HubControl<M, K>>>,
    control: mpsc::Sender<Stamped<HubControl<M, K>>>,
    publish: mpsc::Sender<Publish<M>>,
    cursor: DataCursor,
    next_client: AtomicU64,
    client_count: Arc<AtomicUsize>,
    pollers: Pollers,
}

impl<M, K> Hub<M, K>
where
    M: Send + 'static,
    K: Eq + Hash + Clone + Send + 'static,
{
    /// A hub broadcasting every publish to every client.
    pub fn new(config: &HubConfig) -> Self {
        Self::with_router(Broadcaster::new(), config)
    }

    pub fn with_router<R>(router: R, config: &HubConfig) -> Self
    where
        R: Router<M, K> + 'static,
    {
        let lifecycle = WorkerLifecycle::new(
            COMPONENT,
            || Stamped::immediate(HubControl::Stop),
            &LifecycleConfig {
                control_capacity: config.control_capacity,
            },
        );
        let (publish, mut publish_rx) = mpsc::channel(channel_capacity(config.publish_capacity));
        let client_count = Arc::new(AtomicUsize::new(0));
        let pollers: Pollers = Arc::new(Mutex::new(HashMap::new()));
        let tick_interval = config.tick_interval();
        let mut state = HubState {
            context: lifecycle.context().clone(),
            router: Box::new(router),
            clients: BTreeMap::new(),
            policy: config.delivery_policy,
            client_count: Arc::clone(&client_count),
            pollers: Arc::clone(&pollers),
            ticks: 0,
        };

        let started = lifecycle.start(move |mut control| async move {
            let mut ticker = time::interval_at(time::Instant::now() + tick_interval, tick_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            let mut gate = ControlGate::new();

            loop {
                while let Some(event) = gate.next_ready() {
                    state.apply(event);
                }

                tokio::select! {
                    biased;
                    event = control.recv() => match event {
                        None | Some(Stamped { command: HubControl::Stop, .. }) => break,
                        Some(event) => gate.hold(event),
                    },
                    Some(publish) = publish_rx.recv() => {
                        gate.consumed_one();
                        state.route(publish);
                    }
                    _ = ticker.tick() => state.tick(),
                }
            }
        });
        debug_assert!(started.is_ok(), "fresh lifecycle cannot already be running");

        // The lifecycle hands out its control sender only while running.
        let control = lifecycle_control(&lifecycle);

        Self {
            lifecycle,
            control,
            publish,
            cursor: DataCursor::default(),
            next_client: AtomicU64::new(0),
            client_count,
            pollers,
        }
    }

    /// Attaches a reader and/or writer as a new client.
    ///
    /// A writer makes the client routable. A reader is polled on its own task
    /// and everything it returns is published with the client as source; an
    /// envelope carrying an error is published last.
    pub async fn connect(&self, endpoint: Endpoint<M>) -> Result<HubClient<M, K>, HubError> {
        let Endpoint { reader, writer } = endpoint;
        if reader.is_none() && writer.is_none() {
            return Err(HubError::InvalidClient);
        }

        let client = ClientId::from_raw(self.next_client.fetch_add(1, Ordering::Relaxed));
        let sink = writer.map(|writer| Arc::new(ClientSink::new(client, writer)));
        self.control
            .send(self.cursor.stamp(HubControl::Connect { client, sink }))
            .await
            .map_err(|_| HubError::Stopped)?;

        if let Some(reader) = reader {
            // Held across the spawn so a poller that finishes at once still
            // finds its own entry to remove.
            let mut pollers = lock_pollers(&self.pollers);
            let poller = tokio::spawn(poll_reader(
                client,
                reader,
                self.publisher(),
                Arc::clone(&self.pollers),
                self.lifecycle.context().clone(),
            ));
            pollers.insert(client, poller);
        }

        Ok(HubClient::new(client, self.control.clone(), self.publisher()))
    }

    /// Enqueues a publish. When `callback` is given, the message is sent on it
    /// once routing has completed.
    pub async fn send(
        &self,
        message: M,
        error: Option<StreamError>,
        callback: Option<mpsc::Sender<M>>,
    ) -> Result<(), HubError> {
        let mut publish = Publish::new(Envelope { message, error }, None);
        publish.callback = callback;
        self.enqueue(publish).await
    }

    pub async fn publish(&self, envelope: Envelope<M>) -> Result<(), HubError> {
        self.enqueue(Publish::new(envelope, None)).await
    }

    /// Publishes and waits for routing to finish.
    ///
    /// Under [`DeliveryPolicy::FailFast`] a writer failure is returned as
    /// [`HubError::Delivery`].
    pub async fn publish_and_wait(&self, envelope: Envelope<M>) -> Result<RouteReport, HubError> {
        let (report_tx, report_rx) = oneshot::channel();
        let mut publish = Publish::new(envelope, None);
        publish.report = Some(report_tx);
        self.enqueue(publish).await?;
        report_rx.await.map_err(|_| HubError::Stopped)?
    }

    /// Number of connected clients as of the last applied control event.
    pub fn client_count(&self) -> usize {
        self.client_count.load(Ordering::SeqCst)
    }

    /// Stops the control task and every reader poller.
    pub async fn stop(&self) -> Result<(), HubError> {
        let stopped = self.lifecycle.stop().await;
        for (_, poller) in lock_pollers(&self.pollers).drain() {
            poller.abort();
        }
        stopped.map_err(HubError::from)
    }

    pub fn is_running(&self) -> bool {
        self.lifecycle.is_running()
    }

    async fn enqueue(&self, publish: Publish<M>) -> Result<(), HubError> {
        self.publisher().send(publish).await
    }

    fn publisher(&self) -> Publisher<M> {
        Publisher {
            publish: self.publish.clone(),
            cursor: self.cursor.clone(),
        }
    }
}

/// Producer side of the publish stream, counted so control events issued
/// afterwards cannot overtake it.
pub(crate) struct Publisher<M> {
    publish: mpsc::Sender<Publish<M>>,
    cursor: DataCursor,
}

impl<M> Publisher<M> {
    pub(crate) async fn send(&self, publish: Publish<M>) -> Result<(), HubError> {
        self.cursor
            .send(&self.publish, publish)
            .await
            .map_err(|_| HubError::Stopped)
    }

    pub(crate) fn stamp<C>(&self, command: C) -> Stamped<C> {
        self.cursor.stamp(command)
    }
}

impl<M> Clone for Publisher<M> {
    fn clone(&self) -> Self {
        Self {
            publish: self.publish.clone(),
            cursor: self.cursor.clone(),
        }
    }
}

fn lifecycle_control<C: Send + 'static>(lifecycle: &WorkerLifecycle<C>) -> mpsc::Sender<C> {
    match lifecycle.control_sender() {
        Some(control) => control,
        // Only reachable if the task already exited; a closed sender makes
        // every later call report `Stopped`.
        None => mpsc::channel(1).0,
    }
}

async fn poll_reader<M>(
    client: ClientId,
    mut reader: ReadFn<M>,
    publisher: Publisher<M>,
    pollers: Pollers,
    context: WorkerContext,
) {
    loop {
        let envelope = reader().await;
        let terminal = envelope.is_terminal();
        if publisher
            .send(Publish::new(envelope, Some(client)))
            .await
            .is_err()
        {
            break;
        }
        if terminal {
            debug!(
                event = events::HUB_READER_CLOSED,
                component = COMPONENT,
                worker_id = context.worker_id(),
                client_id = %client,
                "reader returned its last envelope"
            );
            break;
        }
    }
    lock_pollers(&pollers).remove(&client);
}

fn callback_dropped(worker_id: &str) {
    warn!(
        event = events::HUB_CALLBACK_DROPPED,
        component = COMPONENT,
        worker_id,
        "publish callback closed before the message was handed over"
    );
}

struct HubState<M, K> {
    context: WorkerContext,
    router: Box<dyn Router<M, K>>,
    /// Every connected client; `None` for reader-only clients.
    clients: BTreeMap<ClientId, Option<Arc<ClientSink<M>>>>,
    policy: DeliveryPolicy,
    client_count: Arc<AtomicUsize>,
    pollers: Pollers,
    ticks: u64,
}

impl<M: Send + 'static, K> HubState<M, K> {
    fn apply(&mut self, event: HubControl<M, K>) {
        match event {
            HubControl::Connect { client, sink } => {
                if let Some(sink) = &sink {
                    self.router.add(Arc::clone(sink));
                }
                debug!(
                    event = events::HUB_CLIENT_CONNECT,
                    component = COMPONENT,
                    worker_id = self.context.worker_id(),
                    client_id = %client,
                    writer = sink.is_some(),
                    client_count = self.clients.len() + 1,
                    "client connected"
                );
                self.clients.insert(client, sink);
            }
            HubControl::Subscribe { client, topics } => {
                let Some(sink) = self.writer_of(client) else {
                    return;
                };
                self.router.add_route(&sink, &topics);
                debug!(
                    event = events::HUB_SUBSCRIBE,
                    component = COMPONENT,
                    worker_id = self.context.worker_id(),
                    client_id = %client,
                    topic_count = topics.len(),
                    "client subscribed"
                );
            }
            HubControl::Unsubscribe { client, topics } => {
                if self.writer_of(client).is_none() {
                    return;
                }
                self.router.remove_route(client, &topics);
                debug!(
                    event = events::HUB_UNSUBSCRIBE,
                    component = COMPONENT,
                    worker_id = self.context.worker_id(),
                    client_id = %client,
                    topic_count = topics.len(),
                    "client unsubscribed"
                );
            }
            HubControl::Disconnect { client } => {
                if self.clients.remove(&client).is_none() {
                    self.unknown_client(client);
                    return;
                }
                self.router.remove(client);
                if let Some(poller) = lock_pollers(&self.pollers).remove(&client) {
                    poller.abort();
                }
                debug!(
                    event = events::HUB_CLIENT_DISCONNECT,
                    component = COMPONENT,
                    worker_id = self.context.worker_id(),
                    client_id = %client,
                    client_count = self.clients.len(),
                    "client disconnected"
                );
            }
            HubControl::Stop => {}
        }
        self.client_count.store(self.clients.len(), Ordering::SeqCst);
    }

    /// The routable sink of a connected client, logging unknown ids.
    fn writer_of(&self, client: ClientId) -> Option<Arc<ClientSink<M>>> {
        match self.clients.get(&client) {
            Some(sink) => sink.clone(),
            None => {
                self.unknown_client(client);
                None
            }
        }
    }

    fn unknown_client(&self, client: ClientId) {
        warn!(
            event = events::HUB_CONTROL_UNKNOWN_CLIENT,
            component = COMPONENT,
            worker_id = self.context.worker_id(),
            client_id = %client,
            "control event for a client that is not connected"
        );
    }

    fn route(&mut self, publish: Publish<M>) {
        let Publish {
            envelope,
            source,
            callback,
            report,
        } = publish;

        let outcome = self.router.route_message(&envelope, source, self.policy);
        self.log_outcome(&outcome);

        if let Some(callback) = callback {
            let message = envelope.message;
            match callback.try_send(message) {
                Ok(()) => {}
                Err(TrySendError::Full(message)) => {
                    // Routing must not wait on the caller's channel.
                    let worker_id = self.context.worker_id.clone();
                    tokio::spawn(async move {
                        if callback.send(message).await.is_err() {
                            callback_dropped(&worker_id);
                        }
                    });
                }
                Err(TrySendError::Closed(_)) => callback_dropped(self.context.worker_id()),
            }
        }
        if let Some(report) = report {
            let _ = report.send(outcome.into_result());
        }
    }

    fn log_outcome(&self, outcome: &RouteOutcome) {
        for (client, err) in &outcome.failures {
            warn!(
                event = events::HUB_DELIVERY_FAILED,
                component = COMPONENT,
                worker_id = self.context.worker_id(),
                client_id = %client,
                err = ?err,
                "client write failed"
            );
        }
        if outcome.aborted {
            warn!(
                event = events::HUB_DELIVERY_ABORTED,
                component = COMPONENT,
                worker_id = self.context.worker_id(),
                delivered = outcome.delivered,
                "fail-fast delivery aborted the rest of the publish"
            );
        } else {
            trace!(
                event = events::HUB_PUBLISH,
                component = COMPONENT,
                worker_id = self.context.worker_id(),
                delivered = outcome.delivered,
                failed = outcome.failures.len(),
                "publish routed"
            );
        }
    }

    fn tick(&mut self) {
        self.ticks += 1;
        trace!(
            event = events::HUB_TICK,
            component = COMPONENT,
            worker_id = self.context.worker_id(),
            client_count = self.clients.len(),
            routable = self.router.client_count(),
            ticks = self.ticks,
            "hub alive"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::KVRouter;
    use std::time::Duration;

    type Log = Arc<Mutex<Vec<String>>>;

    fn recording(log: &Log, fail_on: Option<&'static str>) -> Endpoint<String> {
        let log = Arc::clone(log);
        Endpoint::new().with_writer(move |envelope: &Envelope<String>| {
            if fail_on == Some(envelope.message.as_str()) {
                return Err(StreamError::Closed);
            }
            log.lock().unwrap().push(envelope.message.clone());
            Ok(())
        })
    }

    fn messages(log: &Log) -> Vec<String> {
        log.lock().unwrap().clone()
    }

    fn first_letter(message: &String) -> String {
        message[..1].to_string()
    }

    #[tokio::test]
    async fn connect_without_reader_or_writer_is_rejected() {
        let hub: Hub<String> = Hub::new(&HubConfig::default());

        let err = hub.connect(Endpoint::new()).await.unwrap_err();

        assert!(matches!(err, HubError::InvalidClient));
        hub.stop().await.unwrap();
    }

    #[tokio::test]
    async fn broadcast_reaches_every_writer() {
        let hub: Hub<String> = Hub::new(&HubConfig::default());
        let first: Log = Arc::default();
        let second: Log = Arc::default();
        hub.connect(recording(&first, None)).await.unwrap();
        hub.connect(recording(&second, None)).await.unwrap();

        let report = hub
            .publish_and_wait(Envelope::ok("hello".to_string()))
            .await
            .unwrap();

        assert_eq!(report.delivered, 2);
        assert_eq!(messages(&first), vec!["hello"]);
        assert_eq!(messages(&second), vec!["hello"]);
        assert_eq!(hub.client_count(), 2);
        hub.stop().await.unwrap();
    }

    #[tokio::test]
    async fn client_publish_skips_its_own_writer() {
        let hub: Hub<String> = Hub::new(&HubConfig::default());
        let sender_log: Log = Arc::default();
        let other_log: Log = Arc::default();
        let sender = hub.connect(recording(&sender_log, None)).await.unwrap();
        hub.connect(recording(&other_log, None)).await.unwrap();

        sender.publish("echo".to_string()).await.unwrap();
        // Publishes are routed in order, so this one completes after the first.
        hub.publish_and_wait(Envelope::ok("fence".to_string()))
            .await
            .unwrap();

        assert_eq!(messages(&sender_log), vec!["fence"]);
        assert_eq!(messages(&other_log), vec!["echo", "fence"]);
        hub.stop().await.unwrap();
    }

    #[tokio::test]
    async fn subscription_is_visible_to_the_next_publish() {
        let hub: Hub<String> = Hub::with_router(KVRouter::new(first_letter), &HubConfig::default());
        let log: Log = Arc::default();
        let client = hub.connect(recording(&log, None)).await.unwrap();

        client.subscribe(["a".to_string()]).await.unwrap();
        hub.publish_and_wait(Envelope::ok("apple".to_string()))
            .await
            .unwrap();
        hub.publish_and_wait(Envelope::ok("banana".to_string()))
            .await
            .unwrap();
        client.unsubscribe(["a".to_string()]).await.unwrap();
        hub.publish_and_wait(Envelope::ok("avocado".to_string()))
            .await
            .unwrap();

        assert_eq!(messages(&log), vec!["apple"]);
        hub.stop().await.unwrap();
    }

    #[tokio::test]
    async fn fail_fast_reports_the_failing_client() {
        let hub: Hub<String> = Hub::new(&HubConfig::default());
        let log: Log = Arc::default();
        let failing = hub.connect(recording(&log, Some("boom"))).await.unwrap();

        let err = hub
            .publish_and_wait(Envelope::ok("boom".to_string()))
            .await
            .unwrap_err();

        assert!(matches!(err, HubError::Delivery { client_id, .. } if client_id == failing.id()));
        // The hub keeps serving after a failed delivery.
        assert!(hub.is_running());
        hub.stop().await.unwrap();
    }

    #[tokio::test]
    async fn best_effort_delivers_around_failures() {
        let config = HubConfig {
            delivery_policy: DeliveryPolicy::BestEffort,
            ..HubConfig::default()
        };
        let hub: Hub<String> = Hub::new(&config);
        let failing_log: Log = Arc::default();
        let healthy_log: Log = Arc::default();
        hub.connect(recording(&failing_log, Some("boom"))).await.unwrap();
        hub.connect(recording(&healthy_log, None)).await.unwrap();

        let report = hub
            .publish_and_wait(Envelope::ok("boom".to_string()))
            .await
            .unwrap();

        assert_eq!(report.delivered, 1);
        assert_eq!(report.failed, 1);
        assert_eq!(messages(&healthy_log), vec!["boom"]);
        hub.stop().await.unwrap();
    }

    #[tokio::test]
    async fn send_reports_back_on_the_callback() {
        let hub: Hub<String> = Hub::new(&HubConfig::default());
        let (callback, mut routed) = mpsc::channel(1);

        hub.send("done".to_string(), None, Some(callback))
            .await
            .unwrap();

        let message = tokio::time::timeout(Duration::from_secs(1), routed.recv())
            .await
            .unwrap();
        assert_eq!(message.as_deref(), Some("done"));
        hub.stop().await.unwrap();
    }

    #[tokio::test]
    async fn callback_with_room_for_one_still_sees_every_send() {
        let hub: Hub<String> = Hub::new(&HubConfig::default());
        let (callback, mut routed) = mpsc::channel(1);

        hub.send("first".to_string(), None, Some(callback.clone()))
            .await
            .unwrap();
        hub.send("second".to_string(), None, Some(callback))
            .await
            .unwrap();
        // Both routings complete before this publish is answered.
        hub.publish_and_wait(Envelope::ok("fence".to_string()))
            .await
            .unwrap();

        let mut seen = Vec::new();
        for _ in 0..2 {
            let message = tokio::time::timeout(Duration::from_secs(1), routed.recv())
                .await
                .unwrap();
            seen.extend(message);
        }
        seen.sort();
        assert_eq!(seen, vec!["first", "second"]);
        hub.stop().await.unwrap();
    }

    #[tokio::test]
    async fn finished_reader_poller_is_forgotten() {
        let hub: Hub<String> = Hub::new(&HubConfig::default());
        hub.connect(
            Endpoint::new()
                .with_reader(|| async { Envelope::failed("bye".to_string(), StreamError::Closed) }),
        )
        .await
        .unwrap();

        tokio::time::timeout(Duration::from_secs(1), async {
            while !lock_pollers(&hub.pollers).is_empty() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("poller should drop its handle once the reader ends");
        hub.publish_and_wait(Envelope::ok("fence".to_string()))
            .await
            .unwrap();
        // The client itself stays connected until it disconnects.
        assert_eq!(hub.client_count(), 1);
        hub.stop().await.unwrap();
    }

    #[tokio::test]
    async fn disconnect_removes_the_client() {
        let hub: Hub<String> = Hub::new(&HubConfig::default());
        let log: Log = Arc::default();
        let client = hub.connect(recording(&log, None)).await.unwrap();

        client.disconnect().await.unwrap();
        let report = hub
            .publish_and_wait(Envelope::ok("gone".to_string()))
            .await
            .unwrap();

        assert_eq!(report.delivered, 0);
        assert_eq!(hub.client_count(), 0);
        assert!(messages(&log).is_empty());
        hub.stop().await.unwrap();
    }

    #[tokio::test]
    async fn reader_output_is_published_until_its_error() {
        let hub: Hub<String> = Hub::new(&HubConfig::default());
        let log: Log = Arc::default();
        hub.connect(recording(&log, None)).await.unwrap();
        let mut next = 0;
        hub.connect(Endpoint::new().with_reader(move || {
            next += 1;
            let n = next;
            async move {
                if n < 3 {
                    Envelope::ok(format!("r{n}"))
                } else {
                    Envelope::failed(format!("r{n}"), StreamError::Closed)
                }
            }
        }))
        .await
        .unwrap();

        tokio::time::timeout(Duration::from_secs(1), async {
            while messages(&log).len() < 3 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
        // Nothing follows the terminal envelope.
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(messages(&log), vec!["r1", "r2", "r3"]);
        hub.stop().await.unwrap();
    }

    #[tokio::test]
    async fn operations_after_stop_fail() {
        let hub: Hub<String> = Hub::new(&HubConfig::default());
        let log: Log = Arc::default();
        let client = hub.connect(recording(&log, None)).await.unwrap();

        hub.stop().await.unwrap();

        assert!(!hub.is_running());
        assert!(matches!(
            hub.publish(Envelope::ok("late".to_string())).await,
            Err(HubError::Stopped)
        ));
        assert!(matches!(
            client.subscribe(["a".to_string()]).await,
            Err(HubError::Stopped)
        ));
        assert!(matches!(
            hub.connect(recording(&log, None)).await,
            Err(HubError::Stopped)
        ));
        assert!(matches!(hub.stop().await, Err(HubError::Lifecycle(_))));
    }
}
