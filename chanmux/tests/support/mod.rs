use chanmux::{Endpoint, Hub, HubClient};
use integration_test_utils::{RecordingSink, TopicMessage};

/// Connects a recording writer under `name` and subscribes it to `topics`.
pub(crate) async fn connect_subscriber(
    hub: &Hub<TopicMessage>,
    sink: &RecordingSink,
    name: &str,
    topics: &[&str],
) -> HubClient<TopicMessage, String> {
    let client = hub
        .connect(Endpoint::new().with_writer(sink.writer(name)))
        .await
        .expect("connect should succeed while the hub runs");
    client
        .subscribe(topics.iter().map(|topic| topic.to_string()))
        .await
        .expect("subscribe should succeed while the hub runs");
    client
}

/// The three overlapping subscribers every hub scenario starts from.
#[allow(dead_code)]
pub(crate) async fn connect_c1_c2_c3(
    hub: &Hub<TopicMessage>,
    sink: &RecordingSink,
) -> [HubClient<TopicMessage, String>; 3] {
    [
        connect_subscriber(hub, sink, "c1", &["a", "b", "c", "d"]).await,
        connect_subscriber(hub, sink, "c2", &["c", "d", "e", "f"]).await,
        connect_subscriber(hub, sink, "c3", &["e", "f", "g", "h"]).await,
    ]
}

pub(crate) fn lines(expected: &[&str]) -> Vec<String> {
    expected.iter().map(|line| line.to_string()).collect()
}
