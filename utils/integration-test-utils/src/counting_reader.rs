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


use crate::TopicMessage;
use chanmux::{Envelope, StreamError};
use std::future::{self, Ready};

/// A hub reader emitting `start..=end` under `topic`, then `end + 1` with a
/// closed error.
pub fn counting_reader(
    topic: &str,
    start: u32,
    end: u32,
) -> impl FnMut() -> Ready<Envelope<TopicMessage>> + Send + 'static {
    let topic = topic.to_string();
    let mut current = start;
    move || {
        let message = TopicMessage::new(&topic, current);
        let envelope = if current <= end {
            Envelope::ok(message)
        } else {
            Envelope::failed(message, StreamError::Closed)
        };
        current = current.saturating_add(1);
        future::ready(envelope)
    }
}
