#![cfg(feature = "client")]
use myobserve::{Metrics, MetricType, MetricValue, Sink};
use myobserve_kafka::KafkaSink;
use rdkafka::{
    consumer::{Consumer, StreamConsumer},
    message::BorrowedMessage,
    producer::FutureProducer,
    ClientConfig, Message,
};
use std::collections::BTreeMap;
use testcontainers::{clients::Cli, core::WaitFor, images::generic::GenericImage, Container};

fn start_redpanda() -> (Cli, Container<GenericImage>, String) {
    let docker = Cli::default();
    let image = GenericImage::new("docker.redpanda.com/redpanda/redpanda", "v23.3.8")
        .with_wait_for(WaitFor::message("Started Kafka API"));
    let container = docker.run(image);
    let port = container.get_host_port_ipv4(9092);
    let brokers = format!("127.0.0.1:{}", port);
    (docker, container, brokers)
}

#[tokio::test]
#[ignore]
async fn publishes_metrics_to_kafka() {
    let (_cli, _node, brokers) = start_redpanda();
    let topic = "myobserve.metrics";

    let producer: FutureProducer = ClientConfig::new().set("bootstrap.servers", &brokers).create().unwrap();
    let sink = KafkaSink::new(producer, topic);

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

    let consumer: StreamConsumer = ClientConfig::new()
        .set("group.id", "test-group")
        .set("bootstrap.servers", &brokers)
        .set("auto.offset.reset", "earliest")
        .create()
        .unwrap();
    consumer.subscribe(&[topic]).unwrap();

    let msg: BorrowedMessage = consumer.recv().await.unwrap();
    let payload = msg.payload().expect("payload");
    let received: Metrics = serde_json::from_slice(payload).unwrap();
    assert_eq!(received.monitor_id, "m1");
    assert_eq!(received.values[0].name, "Threads_connected");
}
