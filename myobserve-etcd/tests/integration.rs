#![cfg(feature = "etcd-client")]
use myobserve::{Metrics, MetricType, MetricValue, Sink};
use myobserve_etcd::EtcdSink;
use std::collections::BTreeMap;

// Requires etcd running. If MYOBSERVE_TEST_ETCD_ENDPOINT is unset, the test skips.
#[tokio::test]
async fn writes_metric_batches_to_etcd() {
    let Some(endpoint) = std::env::var("MYOBSERVE_TEST_ETCD_ENDPOINT").ok() else {
        eprintln!("skipping: set MYOBSERVE_TEST_ETCD_ENDPOINT (e.g. http://127.0.0.1:2379)");
        return;
    };
    let mut client = etcd_client::Client::connect([endpoint.as_str()], None)
        .await
        .unwrap_or_else(|e| panic!("Failed to connect to etcd at '{}': {}", endpoint, e));

    let prefix = format!("myobserve_metrics/{}", uuid::Uuid::new_v4());
    let sink = EtcdSink::new(prefix.clone(), client.clone()).expect("valid sink");

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
    sink.send(&metrics).await.expect("failed to send metrics batch to EtcdSink");

    let resp = client
        .get(prefix.as_str(), Some(etcd_client::GetOptions::new().with_prefix()))
        .await
        .unwrap_or_else(|e| panic!("Failed to get prefix '{}': {}", prefix, e));
    let kvs = resp.kvs();
    assert_eq!(kvs.len(), 1, "expected exactly one key-value pair for prefix '{}', found {}", prefix, kvs.len());

    let kv = &kvs[0];
    let value_str = std::str::from_utf8(kv.value()).expect("value should be valid UTF-8");
    assert!(value_str.contains("Threads_connected"), "expected batch to contain metric name, got: {}", value_str);
    assert!(value_str.contains("\"m1\""), "expected batch to contain monitor_id, got: {}", value_str);

    client
        .delete(prefix.as_str(), Some(etcd_client::DeleteOptions::new().with_prefix()))
        .await
        .expect("cleanup failed");
}
