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

//! Addressing strategies for [`crate::Hub`].
//!
//! A [`Router`] decides which connected clients receive a published envelope.
//! Routers are owned and mutated exclusively by the hub's control task, so
//! they need no internal synchronisation.

pub mod broadcaster;
pub mod kv_router;
pub mod router;

pub use broadcaster::Broadcaster;
pub use kv_router::KVRouter;
pub use router::{deliver, RouteOutcome, RouteReport, Router};
