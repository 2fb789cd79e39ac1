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

//! Ordering of a control stream against a separate data stream.
//!
//! Producers count every value they enqueue on a shared [`DataCursor`], and
//! each control event is stamped with that count when it is issued. The task
//! consuming both streams parks stamped events in a [`ControlGate`] until it
//! has consumed at least that many values. A change issued after a send
//! returned can therefore never overtake the value, while a change issued
//! before the send still wins over it.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::SendError;

/// Shared count of values enqueued on a data stream.
#[derive(Clone, Debug, Default)]
pub(crate) struct DataCursor(Arc<AtomicU64>);

impl DataCursor {
    /// Enqueues `value` on `data` and counts it.
    ///
    /// The slot is reserved first; counting and filling it happen without an
    /// await in between, so a cancelled send is never counted.
    pub(crate) async fn send<T>(
        &self,
        data: &mpsc::Sender<T>,
        value: T,
    ) -> Result<(), SendError<T>> {
        let Ok(permit) = data.reserve().await else {
            return Err(SendError(value));
        };
        self.0.fetch_add(1, Ordering::SeqCst);
        permit.send(value);
        Ok(())
    }

    /// Stamps `command` with the number of values enqueued so far.
    pub(crate) fn stamp<C>(&self, command: C) -> Stamped<C> {
        Stamped {
            after: self.0.load(Ordering::SeqCst),
            command,
        }
    }
}

/// A control event plus the data count it must not overtake.
#[derive(Debug)]
pub(crate) struct Stamped<C> {
    pub(crate) after: u64,
    pub(crate) command: C,
}

impl<C> Stamped<C> {
    /// An event with no data to wait for, e.g. a stop command.
    pub(crate) fn immediate(command: C) -> Self {
        Self { after: 0, command }
    }
}

/// Task-side holding area for stamped control events.
#[derive(Debug)]
pub(crate) struct ControlGate<C> {
    consumed: u64,
    held: VecDeque<Stamped<C>>,
}

impl<C> ControlGate<C> {
    pub(crate) fn new() -> Self {
        Self {
            consumed: 0,
            held: VecDeque::new(),
        }
    }

    /// Records that one value was taken off the data stream.
    pub(crate) fn consumed_one(&mut self) {
        self.consumed += 1;
    }

    pub(crate) fn hold(&mut self, event: Stamped<C>) {
        self.held.push_back(event);
    }

    /// The oldest held event, once every value it was issued after has been
    /// consumed. Events are released in arrival order.
    pub(crate) fn next_ready(&mut self) -> Option<C> {
        if self.held.front()?.after > self.consumed {
            return None;
        }
        self.held.pop_front().map(|event| event.command)
    }
}
