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

//! Error types shared by every primitive in the crate.
//!
//! [`StreamError`] travels *inside* result streams and envelopes, so it is
//! `Clone` and cheap to fan out. The other enums are returned from component
//! operations.

use std::error::Error as StdError;
use std::io;
use std::sync::Arc;
use thiserror::Error;

use crate::hub_client::ClientId;

/// Failure attached to a value flowing through a stream.
#[derive(Debug, Clone, Error)]
#[non_exhaustive]
pub enum StreamError {
    /// The underlying source or sink was closed by its peer.
    #[error("stream closed")]
    Closed,

    /// The underlying operation gave up waiting.
    #[error("stream timed out")]
    TimedOut,

    /// Any other failure reported by caller code.
    #[error("stream source failed: {0}")]
    Source(#[source] Arc<dyn StdError + Send + Sync>),

    /// Free-form failure.
    #[error("{0}")]
    Message(String),
}

impl StreamError {
    /// Wraps an arbitrary error as [`StreamError::Source`].
    pub fn from_source<E>(err: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        StreamError::Source(Arc::new(err))
    }

    pub fn message(msg: impl Into<String>) -> Self {
        StreamError::Message(msg.into())
    }

    /// Returns `true` for failures that mean "the peer went away" rather than
    /// "something broke". Readers suppress these instead of emitting them.
    pub fn is_expected_disconnect(&self) -> bool {
        match self {
            StreamError::Closed | StreamError::TimedOut => true,
            StreamError::Source(inner) => inner
                .downcast_ref::<io::Error>()
                .map(|io_err| {
                    matches!(
                        io_err.kind(),
                        io::ErrorKind::TimedOut
                            | io::ErrorKind::BrokenPipe
                            | io::ErrorKind::ConnectionAborted
                            | io::ErrorKind::ConnectionReset
                            | io::ErrorKind::UnexpectedEof
                    )
                })
                .unwrap_or(false),
            StreamError::Message(_) => false,
        }
    }

    /// Stable label for structured logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            StreamError::Closed => "stream_closed",
            StreamError::TimedOut => "stream_timed_out",
            StreamError::Source(_) => "stream_source_failed",
            StreamError::Message(_) => "stream_failed",
        }
    }
}

impl From<io::Error> for StreamError {
    fn from(err: io::Error) -> Self {
        StreamError::from_source(err)
    }
}

/// Usage errors raised by a component's lifecycle.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum LifecycleError {
    #[error("{worker} is already running")]
    AlreadyRunning { worker: &'static str },

    #[error("{worker} is stopped")]
    Stopped { worker: &'static str },

    #[error("{worker} does not own its input stream")]
    InputNotOwned { worker: &'static str },

    #[error("{worker} background task panicked: {reason}")]
    Panicked { worker: &'static str, reason: String },
}

/// Errors returned by [`crate::Hub`] operations.
#[derive(Debug, Clone, Error)]
#[non_exhaustive]
pub enum HubError {
    /// `connect` was called with neither a reader nor a writer.
    #[error("hub client needs a reader or a writer")]
    InvalidClient,

    #[error("hub is stopped")]
    Stopped,

    /// A client's writer failed and fail-fast delivery aborted the publish.
    #[error("delivery to client {client_id} failed: {source}")]
    Delivery {
        client_id: ClientId,
        #[source]
        source: StreamError,
    },

    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
}

/// Errors raised while loading a [`crate::ChanmuxConfig`].
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("unable to read config file: {0}")]
    Io(#[from] io::Error),

    #[error("unable to parse config: {0}")]
    Parse(#[from] json5::Error),
}
