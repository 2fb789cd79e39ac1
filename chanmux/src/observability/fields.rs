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

//! Canonical structured field keys and the per-worker logging context.

use uuid::Uuid;

pub const EVENT: &str = "event";
pub const COMPONENT: &str = "component";
pub const WORKER_ID: &str = "worker_id";
pub const CLIENT_ID: &str = "client_id";
pub const OUTPUT_ID: &str = "output_id";
pub const INPUT_ID: &str = "input_id";

pub const LISTENER_COUNT: &str = "listener_count";
pub const INPUT_COUNT: &str = "input_count";
pub const CLIENT_COUNT: &str = "client_count";
pub const TOPIC_COUNT: &str = "topic_count";
pub const DELIVERED: &str = "delivered";
pub const FAILED: &str = "failed";
pub const OWNED: &str = "owned";
pub const REASON: &str = "reason";
pub const ERR: &str = "err";

pub const REASON_STOP_REQUESTED: &str = "stop_requested";
pub const REASON_INPUT_CLOSED: &str = "input_closed";
pub const REASON_OUTPUT_CLOSED: &str = "output_closed";
pub const REASON_WRITE_FAILED: &str = "write_failed";
pub const REASON_RECEIVER_DROPPED: &str = "receiver_dropped";
pub const REASON_REMOVED: &str = "removed";

/// Identity attached to every event a background worker emits.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct WorkerContext {
    pub component: &'static str,
    pub worker_id: String,
}

impl WorkerContext {
    /// Builds a context with a fresh random worker id.
    pub fn new(component: &'static str) -> Self {
        Self {
            component,
            worker_id: Uuid::new_v4().hyphenated().to_string(),
        }
    }

    pub fn worker_id(&self) -> &str {
        &self.worker_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn worker_contexts_get_distinct_ids() {
        let first = WorkerContext::new("fan_out");
        let second = WorkerContext::new("fan_out");

        assert_eq!(first.component, "fan_out");
        assert_ne!(first.worker_id(), second.worker_id());
        assert_eq!(first.worker_id().len(), 36);
    }
}
