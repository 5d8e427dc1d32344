#![cfg(feature = "client")]
use futures::StreamExt;
use myobserve::{Metrics, MetricType, MetricValue, Sink};
use myobserve_nats::NatsSink;
use std::collections::BTreeMap;
use testcontainers::{clients::Cli, core::WaitFor, images::generic::GenericImage, Container};

fn start_nats() -> (Cli, Container<GenericImage>, String) {
    let docker = Cli::default();
    let image = GenericImage::new("nats", "2.10.8-alpine").with_wait_for(WaitFor::message("Server is ready"));
    let container = docker.run(image);
    let host_port = container.get_host_port_ipv4(4222);
    let addr = format!("nats://127.0.0.1:{}", host_port);
    (docker, container, addr)
}

#[tokio::test]
#[ignore]
async fn publishes_metrics_to_nats() {
    let (_cli, _node, addr) = start_nats();

    let client = async_nats::connect(&addr).await.unwrap();
    let sink = NatsSink::new(client.clone(), "myobserve.metrics");

    // Subscribe before publishing to avoid missing messages.
    let mut sub = client.subscribe("myobserve.metrics").await.unwrap();

    let metrics = Metrics {
        monitor_id: "m1".into(),
        level: "fast".into(),
        interval: 1,
        values: vec![MetricValue {
            domain: "status".into(),
            name: "Threads_connected".into(),
            metric_type: MetricType::Gauge,
            value: 3.0,
            group: BTreeMap::new(),
            meta: BTreeMap::new(),
        }],
        ..Default::default()
    };
    sink.send(&metrics).await.unwrap();

    let msg = sub.next().await.expect("message");
    let received: Metrics = serde_json::from_slice(&msg.payload).unwrap();
    assert_eq!(received.monitor_id, "m1");
    assert_eq!(received.values[0].name, "Threads_connected");
}
