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

//! # chanmux
//!
//! `chanmux` provides in-process concurrency primitives built on Tokio
//! channels: workers with an explicit lifecycle, adapters between functions
//! and streams, stream stages that copy, merge and reduce values, and a
//! topic-routed publish/subscribe [`Hub`].
//!
//! Every active component owns one background task managed by a
//! [`WorkerLifecycle`]. Construction spawns that task, so it must happen inside
//! a Tokio runtime; `stop()` asks the task to exit and waits for its cleanup.
//!
//! ## Stream stages
//!
//! ```
//! use chanmux::{FanIn, FanOut};
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let fan_out: FanOut<u32> = FanOut::new();
//! let mut left = fan_out.listen(None).await.unwrap();
//! let mut right = fan_out.listen(None).await.unwrap();
//! fan_out.send(7).await.unwrap();
//! assert_eq!(left.recv().await, Some(7));
//! assert_eq!(right.recv().await, Some(7));
//!
//! let (fan_in, mut merged) = FanIn::new();
//! let (_id, added) = fan_in.add(left.into_receiver()).await.unwrap();
//! assert!(added.applied().await);
//! fan_out.send(8).await.unwrap();
//! assert_eq!(merged.recv().await, Some(8));
//!
//! fan_out.stop().await.unwrap();
//! fan_in.stop().await.unwrap();
//! # });
//! ```
//!
//! ## Hub
//!
//! ```
//! use chanmux::{Endpoint, Envelope, Hub, HubConfig, KVRouter};
//! use std::sync::{Arc, Mutex};
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let hub: Hub<String> = Hub::with_router(
//!     KVRouter::new(|message: &String| message[..1].to_string()),
//!     &HubConfig::default(),
//! );
//! let seen = Arc::new(Mutex::new(Vec::new()));
//! let log = Arc::clone(&seen);
//! let client = hub
//!     .connect(Endpoint::new().with_writer(move |envelope: &Envelope<String>| {
//!         log.lock().unwrap().push(envelope.message.clone());
//!         Ok(())
//!     }))
//!     .await
//!     .unwrap();
//!
//! client.subscribe(["a".to_string()]).await.unwrap();
//! hub.publish_and_wait(Envelope::ok("apple".to_string())).await.unwrap();
//! hub.publish_and_wait(Envelope::ok("banana".to_string())).await.unwrap();
//! assert_eq!(*seen.lock().unwrap(), vec!["apple".to_string()]);
//!
//! hub.stop().await.unwrap();
//! # });
//! ```
//!
//! ## Internal architecture map
//!
//! - Runtime: the worker lifecycle state machine
//! - Adapters: `Reader`, `Writer` and the reconnecting `Connector`
//! - Data plane: `Mapper`/`Pipe`, `FanOut`, `FanIn` and `Reducer`
//! - Routing: the `Router` contract, `Broadcaster` and `KVRouter`
//! - Hub: control task, client handles and the published `Envelope`
//!
//! ## Observability model
//!
//! The crate uses `tracing` for logs/events. Every event carries an `event`
//! name from `observability::events` and the emitting `component`.
//! Library code never initializes a global subscriber. Binaries and tests
//! are responsible for one-time `tracing_subscriber` initialization.

mod adapters;
pub use adapters::connector::{Connector, OnConnectorClose};
pub use adapters::reader::{ReadResult, Reader};
pub use adapters::writer::{OnClose, Writer};

mod config;
pub use config::{
    BackoffConfig, ChanmuxConfig, ConnectorConfig, DeliveryPolicy, FanInConfig, FanOutConfig,
    HubConfig, LifecycleConfig, ReaderConfig, ReducerConfig, WriterConfig,
};

mod data_plane;
pub use data_plane::fan_in::{FanIn, OnInputRemoved};
pub use data_plane::fan_out::{FanOut, FanOutStats, Filter, Listener, OutputStats};
pub use data_plane::handles::{Ack, InputId, Ownership, OutputId};
pub use data_plane::pipe::{Mapper, Pipe};
pub use data_plane::reducer::Reducer;

mod envelope;
pub use envelope::Envelope;

mod error;
pub use error::{ConfigError, HubError, LifecycleError, StreamError};

mod hub;
pub use hub::Hub;

mod hub_client;
pub use hub_client::{ClientId, ClientSink, Endpoint, HubClient, ReadFn, WriteFn};

#[doc(hidden)]
pub mod observability;

pub mod routing;
pub use routing::{Broadcaster, KVRouter, RouteReport, Router};

mod runtime;
pub use runtime::lifecycle::WorkerLifecycle;
