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

//! Handles shared by the dynamically managed stages.

use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::oneshot;

/// Registration id of a fan-out output.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct OutputId(u64);

/// Registration id of a fan-in input.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct InputId(u64);

impl fmt::Display for OutputId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for InputId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Default)]
pub(crate) struct IdSequence(AtomicU64);

impl IdSequence {
    fn next_raw(&self) -> u64 {
        self.0.fetch_add(1, Ordering::Relaxed)
    }

    pub(crate) fn next_output(&self) -> OutputId {
        OutputId(self.next_raw())
    }

    pub(crate) fn next_input(&self) -> InputId {
        InputId(self.next_raw())
    }
}

/// Who is responsible for closing an output stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Ownership {
    /// The stage holds the only sender and closes the stream on removal or stop.
    Owned,
    /// The caller keeps its own sender; the stage only drops its clone.
    External,
}

/// Resolves once a control change has been applied by the owning task.
///
/// Dropping an `Ack` turns the request into fire-and-forget.
#[must_use = "await `applied()` to wait for the change, or drop the ack explicitly"]
#[derive(Debug)]
pub struct Ack(oneshot::Receiver<bool>);

impl Ack {
    pub(crate) fn channel() -> (oneshot::Sender<bool>, Ack) {
        let (tx, rx) = oneshot::channel();
        (tx, Ack(rx))
    }

    /// `true` if the request changed the registry, `false` if it was a no-op
    /// (duplicate add, unknown id) or the stage stopped first.
    pub async fn applied(self) -> bool {
        self.0.await.unwrap_or(false)
    }
}
