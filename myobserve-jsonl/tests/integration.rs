use myobserve::{Metrics, MetricType, MetricValue, Sink};
use myobserve_jsonl::JsonlSink;
use std::collections::BTreeMap;

#[tokio::test]
async fn writes_json_lines() {
    let path = std::env::temp_dir().join("myobserve-jsonl-test.log");
    let _ = std::fs::remove_file(&path);
    let sink = JsonlSink::new(path.to_string_lossy().to_string());

    let metrics = Metrics {
        monitor_id: "m1".into(),
        level: "fast".into(),
        interval: 1,
        values: vec![MetricValue {
            domain: "status".into(),
            name: "Threads_connected".into(),
            metric_type: MetricType::Gauge,
            value: 7.0,
            group: BTreeMap::new(),
            meta: BTreeMap::new(),
        }],
        ..Default::default()
    };
    sink.send(&metrics).await.unwrap();
    sink.send(&metrics).await.unwrap();

    let contents = std::fs::read_to_string(&path).expect("file");
    assert_eq!(contents.lines().count(), 2);
    assert!(contents.contains("Threads_connected"));
}
