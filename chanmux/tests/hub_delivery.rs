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

mod support;

use chanmux::{DeliveryPolicy, Endpoint, Envelope, Hub, HubConfig, HubError, KVRouter};
use integration_test_utils::{topic_of, RecordingSink, TopicMessage};

fn kv_hub(policy: DeliveryPolicy) -> Hub<TopicMessage> {
    Hub::with_router(
        KVRouter::new(topic_of),
        &HubConfig {
            delivery_policy: policy,
            ..HubConfig::default()
        },
    )
}

async fn connect_failing(hub: &Hub<TopicMessage>, sink: &RecordingSink, name: &str) {
    let client = hub
        .connect(Endpoint::new().with_writer(sink.failing_writer(name, "x")))
        .await
        .unwrap();
    client.subscribe(["x".to_string()]).await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn fail_fast_aborts_the_publish_at_the_first_failing_writer() {
    integration_test_utils::init_logging();

    let hub = kv_hub(DeliveryPolicy::FailFast);
    let sink = RecordingSink::new();
    support::connect_subscriber(&hub, &sink, "before", &["x"]).await;
    connect_failing(&hub, &sink, "broken").await;
    support::connect_subscriber(&hub, &sink, "after", &["x"]).await;

    let err = hub
        .publish_and_wait(Envelope::ok(TopicMessage::new("x", 1)))
        .await
        .unwrap_err();

    assert!(matches!(err, HubError::Delivery { .. }));
    assert_eq!(sink.sorted(), support::lines(&["001 - x - before"]));

    // The failing client stays connected; later publishes on other topics flow.
    support::connect_subscriber(&hub, &sink, "late", &["y"]).await;
    let report = hub
        .publish_and_wait(Envelope::ok(TopicMessage::new("y", 2)))
        .await
        .unwrap();
    assert_eq!(report.delivered, 1);
    assert_eq!(hub.client_count(), 4);

    hub.stop().await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn best_effort_attempts_every_writer() {
    integration_test_utils::init_logging();

    let hub = kv_hub(DeliveryPolicy::BestEffort);
    let sink = RecordingSink::new();
    support::connect_subscriber(&hub, &sink, "before", &["x"]).await;
    connect_failing(&hub, &sink, "broken").await;
    support::connect_subscriber(&hub, &sink, "after", &["x"]).await;

    let report = hub
        .publish_and_wait(Envelope::ok(TopicMessage::new("x", 1)))
        .await
        .unwrap();

    assert_eq!(report.delivered, 2);
    assert_eq!(report.failed, 1);
    assert_eq!(
        sink.sorted(),
        support::lines(&["001 - x - after", "001 - x - before"])
    );

    hub.stop().await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn control_enqueued_before_a_publish_is_applied_first() {
    integration_test_utils::init_logging();

    let hub = kv_hub(DeliveryPolicy::FailFast);
    let sink = RecordingSink::new();
    let client = support::connect_subscriber(&hub, &sink, "c1", &[]).await;

    for value in 1..=20 {
        let topic = format!("t{value}");
        client.subscribe([topic.clone()]).await.unwrap();
        hub.publish(Envelope::ok(TopicMessage::new(&topic, value)))
            .await
            .unwrap();
    }
    // Nobody subscribes to this topic; routing it fences the ones before it.
    let report = hub
        .publish_and_wait(Envelope::ok(TopicMessage::new("none", 21)))
        .await
        .unwrap();

    assert_eq!(report.delivered, 0);
    assert_eq!(sink.len(), 20);

    hub.stop().await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn unsubscribe_after_a_publish_does_not_overtake_it() {
    integration_test_utils::init_logging();

    let hub = kv_hub(DeliveryPolicy::FailFast);
    let sink = RecordingSink::new();
    let client = support::connect_subscriber(&hub, &sink, "c1", &[]).await;

    for value in 1..=100 {
        client.subscribe(["a".to_string()]).await.unwrap();
        hub.publish(Envelope::ok(TopicMessage::new("a", value)))
            .await
            .unwrap();
        client.unsubscribe(["a".to_string()]).await.unwrap();
    }
    let report = hub
        .publish_and_wait(Envelope::ok(TopicMessage::new("a", 101)))
        .await
        .unwrap();

    assert_eq!(report.delivered, 0);
    assert_eq!(sink.len(), 100);

    hub.stop().await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn client_handles_fail_once_the_hub_stopped() {
    integration_test_utils::init_logging();

    let hub = kv_hub(DeliveryPolicy::FailFast);
    let sink = RecordingSink::new();
    let client = support::connect_subscriber(&hub, &sink, "c1", &["a"]).await;

    hub.stop().await.unwrap();

    assert!(!hub.is_running());
    assert!(matches!(
        client.publish(TopicMessage::new("a", 1)).await,
        Err(HubError::Stopped)
    ));
    assert!(matches!(client.disconnect().await, Err(HubError::Stopped)));
    assert!(sink.is_empty());
}
