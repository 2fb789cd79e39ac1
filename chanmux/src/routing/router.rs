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

//! The router contract and the delivery loop shared by its implementations.

use std::sync::Arc;

use crate::config::DeliveryPolicy;
use crate::envelope::Envelope;
use crate::error::{HubError, StreamError};
use crate::hub_client::{ClientId, ClientSink};

/// Pluggable addressing strategy of a [`crate::Hub`].
///
/// Calls arrive serially from the hub's control task and `route_message`
/// runs inline on it, so implementations must not block.
pub trait Router<M, K>: Send {
    /// Registers a client that has a writer.
    fn add(&mut self, client: Arc<ClientSink<M>>);

    /// Forgets a client and every route that points at it.
    fn remove(&mut self, client: ClientId);

    /// Associates topics with a client. Re-adding an existing association is a no-op.
    fn add_route(&mut self, client: &Arc<ClientSink<M>>, topics: &[K]);

    fn remove_route(&mut self, client: ClientId, topics: &[K]);

    /// Writes `envelope` to its targets, skipping `source`.
    fn route_message(
        &self,
        envelope: &Envelope<M>,
        source: Option<ClientId>,
        policy: DeliveryPolicy,
    ) -> RouteOutcome;

    fn client_count(&self) -> usize;
}

/// What happened to one publish.
#[derive(Debug, Default)]
pub struct RouteOutcome {
    pub delivered: usize,
    pub failures: Vec<(ClientId, StreamError)>,
    /// Fail-fast delivery stopped at the first failure.
    pub aborted: bool,
}

/// Summary returned to a publisher waiting on delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouteReport {
    pub delivered: usize,
    pub failed: usize,
}

impl RouteOutcome {
    /// An aborted delivery becomes [`HubError::Delivery`] naming the client
    /// that failed.
    pub fn into_result(self) -> Result<RouteReport, HubError> {
        let failed = self.failures.len();
        if self.aborted {
            if let Some((client_id, source)) = self.failures.into_iter().next() {
                return Err(HubError::Delivery { client_id, source });
            }
        }
        Ok(RouteReport {
            delivered: self.delivered,
            failed,
        })
    }
}

/// Writes `envelope` to each target in order, skipping `source`.
///
/// With [`DeliveryPolicy::FailFast`] the first write error ends the loop;
/// with [`DeliveryPolicy::BestEffort`] every target is attempted.
pub fn deliver<'a, M: 'a, I>(
    targets: I,
    envelope: &Envelope<M>,
    source: Option<ClientId>,
    policy: DeliveryPolicy,
) -> RouteOutcome
where
    I: IntoIterator<Item = &'a Arc<ClientSink<M>>>,
{
    let mut outcome = RouteOutcome::default();
    for client in targets {
        if Some(client.id()) == source {
            continue;
        }
        match client.write(envelope) {
            Ok(()) => outcome.delivered += 1,
            Err(err) => {
                outcome.failures.push((client.id(), err));
                if policy == DeliveryPolicy::FailFast {
                    outcome.aborted = true;
                    break;
                }
            }
        }
    }
    outcome
}


#[cfg(test)]
mod tests {
    use super::test_support::recording_sink;
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn fail_fast_stops_at_first_failure() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let targets = vec![
            recording_sink(1, log.clone(), None),
            recording_sink(2, log.clone(), Some("m")),
            recording_sink(3, log.clone(), None),
        ];

        let outcome = deliver(&targets, &Envelope::ok("m".to_string()), None, DeliveryPolicy::FailFast);

        assert!(outcome.aborted);
        assert_eq!(outcome.delivered, 1);
        assert_eq!(*log.lock().unwrap(), vec![(1, "m".to_string())]);
        let err = outcome.into_result().expect_err("aborted delivery is an error");
        assert!(matches!(err, HubError::Delivery { client_id, .. } if client_id == ClientId::from_raw(2)));
    }

    #[test]
    fn best_effort_attempts_every_target() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let targets = vec![
            recording_sink(1, log.clone(), Some("m")),
            recording_sink(2, log.clone(), None),
            recording_sink(3, log.clone(), None),
        ];

        let outcome = deliver(&targets, &Envelope::ok("m".to_string()), None, DeliveryPolicy::BestEffort);

        assert!(!outcome.aborted);
        assert_eq!(
            outcome.into_result().expect("best effort never aborts"),
            RouteReport {
                delivered: 2,
                failed: 1
            }
        );
        assert_eq!(log.lock().unwrap().len(), 2);
    }

    #[test]
    fn source_is_skipped() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let targets = vec![
            recording_sink(1, log.clone(), None),
            recording_sink(2, log.clone(), None),
        ];

        let outcome = deliver(
            &targets,
            &Envelope::ok("m".to_string()),
            Some(ClientId::from_raw(1)),
            DeliveryPolicy::FailFast,
        );

        assert_eq!(outcome.delivered, 1);
        assert_eq!(*log.lock().unwrap(), vec![(2, "m".to_string())]);
    }
}
