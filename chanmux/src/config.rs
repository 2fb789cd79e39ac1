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

//! Tunables for every component, loadable from JSON5.
//!
//! Every struct has a `Default` matching the behaviour of a component built
//! without explicit configuration, so a config file only needs to mention the
//! knobs it changes:
//!
//! ```
//! use chanmux::{ChanmuxConfig, DeliveryPolicy};
//!
//! let config = ChanmuxConfig::from_json5_str(
//!     "{ hub: { tick_interval_ms: 250, delivery_policy: 'best_effort' } }",
//! )
//! .unwrap();
//!
//! assert_eq!(config.hub.delivery_policy, DeliveryPolicy::BestEffort);
//! assert_eq!(config.fan_out.listener_capacity, 1);
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::error::ConfigError;

/// tokio mpsc channels reject a zero bound.
pub(crate) fn channel_capacity(requested: usize) -> usize {
    requested.max(1)
}

#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ChanmuxConfig {
    pub reader: ReaderConfig,
    pub writer: WriterConfig,
    pub fan_out: FanOutConfig,
    pub fan_in: FanInConfig,
    pub hub: HubConfig,
    pub connector: ConnectorConfig,
    pub reducer: ReducerConfig,
}

impl ChanmuxConfig {
    pub fn from_json5_str(contents: &str) -> Result<Self, ConfigError> {
        Ok(json5::from_str(contents)?)
    }

    /// Reads and parses a JSON5 config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        Self::from_json5_str(&contents)
    }
}

/// Control-stream bound handed to [`crate::WorkerLifecycle::new`].
///
/// Components with a configurable control bound expose it in their own
/// section, e.g. [`HubConfig::control_capacity`].
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct LifecycleConfig {
    pub control_capacity: usize,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            control_capacity: 1,
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct ReaderConfig {
    pub result_capacity: usize,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self { result_capacity: 1 }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct WriterConfig {
    pub queue_capacity: usize,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self { queue_capacity: 1 }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct FanOutConfig {
    pub input_capacity: usize,
    /// Bound of listener streams created by `FanOut::listen`.
    pub listener_capacity: usize,
}

impl Default for FanOutConfig {
    fn default() -> Self {
        Self {
            input_capacity: 1,
            listener_capacity: 1,
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct FanInConfig {
    /// Bound of the merged stream when the fan-in owns it.
    pub output_capacity: usize,
}

impl Default for FanInConfig {
    fn default() -> Self {
        Self { output_capacity: 1 }
    }
}

/// What the hub does when one client's writer fails mid-publish.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryPolicy {
    /// Abort delivery to the remaining clients of that publish.
    #[default]
    FailFast,
    /// Attempt every client and only count the failures.
    BestEffort,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct HubConfig {
    pub tick_interval_ms: u64,
    pub control_capacity: usize,
    pub publish_capacity: usize,
    pub delivery_policy: DeliveryPolicy,
}

impl HubConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.max(1))
    }
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 1_000,
            control_capacity: 1,
            publish_capacity: 1,
            delivery_policy: DeliveryPolicy::FailFast,
        }
    }
}

/// Exponential reconnect backoff.
///
/// The delay for attempt `n` (0-indexed) is `first_ms * factor^n`, clamped to
/// `max_ms`. Each attempt derives its delay from the attempt number alone.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct BackoffConfig {
    pub first_ms: u64,
    pub max_ms: u64,
    pub factor: f64,
}

impl BackoffConfig {
    pub fn next(&self, attempt: u32) -> Duration {
        let max = Duration::from_millis(self.max_ms);
        let exp = attempt.min(i32::MAX as u32) as i32;
        let secs = Duration::from_millis(self.first_ms).as_secs_f64() * self.factor.powi(exp);

        if !secs.is_finite() || secs < 0.0 || secs > max.as_secs_f64() {
            max
        } else {
            Duration::from_secs_f64(secs)
        }
    }
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            first_ms: 100,
            max_ms: 30_000,
            factor: 2.0,
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ConnectorConfig {
    pub liveness_interval_ms: u64,
    pub backoff: BackoffConfig,
    pub reader: ReaderConfig,
}

impl ConnectorConfig {
    pub fn liveness_interval(&self) -> Duration {
        Duration::from_millis(self.liveness_interval_ms.max(1))
    }
}

impl Default for ConnectorConfig {
    fn default() -> Self {
        Self {
            liveness_interval_ms: 10_000,
            backoff: BackoffConfig::default(),
            reader: ReaderConfig::default(),
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct ReducerConfig {
    pub flush_period_ms: u64,
    pub input_capacity: usize,
    pub output_capacity: usize,
}

impl ReducerConfig {
    pub fn flush_period(&self) -> Duration {
        Duration::from_millis(self.flush_period_ms.max(1))
    }
}

impl Default for ReducerConfig {
    fn default() -> Self {
        Self {
            flush_period_ms: 100,
            input_capacity: 1,
            output_capacity: 1,
        }
    }
}
