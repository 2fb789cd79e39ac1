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

//! The unit a hub publishes: a message plus an optional error.

use crate::error::StreamError;

/// A message as it travels through a [`crate::Hub`].
///
/// Readers attach an error to mark their last envelope; writers see exactly
/// what the publisher sent.
#[derive(Debug, Clone)]
pub struct Envelope<M> {
    pub message: M,
    pub error: Option<StreamError>,
}

impl<M> Envelope<M> {
    pub fn ok(message: M) -> Self {
        Self {
            message,
            error: None,
        }
    }

    pub fn failed(message: M, error: StreamError) -> Self {
        Self {
            message,
            error: Some(error),
        }
    }

    /// A terminal envelope ends the reader that produced it.
    pub fn is_terminal(&self) -> bool {
        self.error.is_some()
    }
}

impl<M> From<M> for Envelope<M> {
    fn from(message: M) -> Self {
        Envelope::ok(message)
    }
}
