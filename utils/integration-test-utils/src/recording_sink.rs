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


use chanmux::{Envelope, StreamError};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::debug;

/// The message type the hub scenarios publish.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TopicMessage {
    pub topic: String,
    pub value: u32,
}

impl TopicMessage {
    pub fn new(topic: &str, value: u32) -> Self {
        Self {
            topic: topic.to_string(),
            value,
        }
    }
}

pub fn topic_of(message: &TopicMessage) -> String {
    message.topic.clone()
}

/// Collects `"NNN - topic - client"` lines from any number of hub writers.
#[derive(Clone, Default)]
pub struct RecordingSink {
    lines: Arc<Mutex<Vec<String>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// A hub writer recording under `client`.
    pub fn writer(
        &self,
        client: &str,
    ) -> impl Fn(&Envelope<TopicMessage>) -> Result<(), StreamError> + Send + Sync + 'static {
        let lines = Arc::clone(&self.lines);
        let client = client.to_string();
        move |envelope| {
            let line = format!(
                "{:03} - {} - {}",
                envelope.message.value, envelope.message.topic, client
            );
            debug!(line = line.as_str(), "recorded");
            lines.lock().unwrap().push(line);
            Ok(())
        }
    }

    /// A hub writer that fails every write of `failing_topic`.
    pub fn failing_writer(
        &self,
        client: &str,
        failing_topic: &str,
    ) -> impl Fn(&Envelope<TopicMessage>) -> Result<(), StreamError> + Send + Sync + 'static {
        let record = self.writer(client);
        let failing_topic = failing_topic.to_string();
        move |envelope| {
            if envelope.message.topic == failing_topic {
                return Err(StreamError::message(format!(
                    "write of {} refused",
                    envelope.message.value
                )));
            }
            record(envelope)
        }
    }

    /// Recorded lines, sorted.
    pub fn sorted(&self) -> Vec<String> {
        let mut lines = self.lines.lock().unwrap().clone();
        lines.sort();
        lines
    }

    pub fn len(&self) -> usize {
        self.lines.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Polls until at least `count` lines arrived; panics after `limit`.
    pub async fn wait_for(&self, count: usize, limit: Duration) -> Vec<String> {
        tokio::time::timeout(limit, async {
            while self.len() < count {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap_or_else(|_| {
            panic!(
                "expected {count} recorded lines, got {}: {:?}",
                self.len(),
                self.sorted()
            )
        });
        self.sorted()
    }
}
