//! Delta transform: turns monotonic counters into per-firing deltas before
//! they reach a concrete sink, so every backend sees a consistent "amount
//! that changed since last time" value rather than having to track
//! cumulative state itself.
//!
//! - A counter's first observation is cached but never emitted (there is
//!   no prior value to diff against).
//! - A later observation lower than the cached value means the source
//!   counter reset (table truncated, server restarted, ...). The decided
//!   policy is to emit the raw post-reset value rather than drop it or
//!   emit a negative delta — a gauge-like reading beats a gap.
//! - Gauges and already-computed deltas pass through unchanged.

use crate::plan::{MetricType, MetricValue, Metrics};
use crate::sink::{Sink, SinkError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

type CacheKey = (String, String, Vec<(String, String)>);

/// Wraps an inner [`Sink`], rewriting `Counter` values to `DeltaCounter`
/// values before forwarding the batch.
pub struct DeltaSink<S> {
    inner: S,
    cache: Mutex<HashMap<CacheKey, f64>>,
}

impl<S: Sink> DeltaSink<S> {
    pub fn new(inner: S) -> Self {
        Self { inner, cache: Mutex::new(HashMap::new()) }
    }

    fn key(value: &MetricValue) -> CacheKey {
        (value.domain.clone(), value.name.clone(), value.group.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
    }

    fn transform(&self, values: Vec<MetricValue>) -> Vec<MetricValue> {
        let mut cache = self.cache.lock().unwrap_or_else(|p| p.into_inner());
        let mut out = Vec::with_capacity(values.len());
        for mut value in values {
            if value.metric_type != MetricType::CumulativeCounter {
                out.push(value);
                continue;
            }
            let key = Self::key(&value);
            let raw = value.value;
            match cache.insert(key, raw) {
                None => {
                    // First observation: cached for next time, not emitted.
                }
                Some(previous) => {
                    let delta = raw - previous;
                    value.value = if delta >= 0.0 { delta } else { raw };
                    value.metric_type = MetricType::DeltaCounter;
                    out.push(value);
                }
            }
        }
        out
    }
}

#[async_trait]
impl<S: Sink> Sink for DeltaSink<S> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn send(&self, metrics: &Metrics) -> Result<(), SinkError> {
        let values = self.transform(metrics.values.clone());
        let transformed = Metrics {
            monitor_id: metrics.monitor_id.clone(),
            level: metrics.level.clone(),
            interval: metrics.interval,
            begin: metrics.begin,
            end: metrics.end,
            values,
        };
        self.inner.send(&transformed).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::NullSink;
    use std::sync::Mutex as StdMutex;

    struct CapturingSink {
        captured: StdMutex<Vec<Metrics>>,
    }

    impl CapturingSink {
        fn new() -> Self {
            Self { captured: StdMutex::new(Vec::new()) }
        }
    }

    #[async_trait]
    impl Sink for CapturingSink {
        fn name(&self) -> &str {
            "capture"
        }
        async fn send(&self, metrics: &Metrics) -> Result<(), SinkError> {
            self.captured.lock().unwrap().push(metrics.clone());
            Ok(())
        }
    }

    fn counter(value: f64) -> MetricValue {
        MetricValue {
            domain: "status".into(),
            name: "Queries".into(),
            metric_type: MetricType::CumulativeCounter,
            value,
            group: Default::default(),
            meta: Default::default(),
        }
    }

    fn batch(values: Vec<MetricValue>) -> Metrics {
        Metrics { monitor_id: "m1".into(), level: "fast".into(), interval: 1, values, ..Default::default() }
    }

    #[tokio::test]
    async fn first_observation_is_suppressed() {
        let delta = DeltaSink::new(CapturingSink::new());
        delta.send(&batch(vec![counter(100.0)])).await.unwrap();
        assert!(delta.inner.captured.lock().unwrap()[0].values.is_empty());
    }

    #[tokio::test]
    async fn second_observation_emits_positive_delta() {
        let delta = DeltaSink::new(CapturingSink::new());
        delta.send(&batch(vec![counter(100.0)])).await.unwrap();
        delta.send(&batch(vec![counter(150.0)])).await.unwrap();
        let captured = delta.inner.captured.lock().unwrap();
        let emitted = &captured[1].values[0];
        assert_eq!(emitted.value, 50.0);
        assert_eq!(emitted.metric_type, MetricType::DeltaCounter);
    }

    #[tokio::test]
    async fn counter_reset_emits_raw_value() {
        let delta = DeltaSink::new(CapturingSink::new());
        delta.send(&batch(vec![counter(1_000.0)])).await.unwrap();
        delta.send(&batch(vec![counter(5.0)])).await.unwrap();
        let captured = delta.inner.captured.lock().unwrap();
        let emitted = &captured[1].values[0];
        assert_eq!(emitted.value, 5.0);
        assert_eq!(emitted.metric_type, MetricType::DeltaCounter);
    }

    #[tokio::test]
    async fn gauges_pass_through_unchanged() {
        let delta = DeltaSink::new(CapturingSink::new());
        let gauge = MetricValue {
            domain: "status".into(),
            name: "Threads_connected".into(),
            metric_type: MetricType::Gauge,
            value: 12.0,
            group: Default::default(),
            meta: Default::default(),
        };
        delta.send(&batch(vec![gauge.clone()])).await.unwrap();
        let captured = delta.inner.captured.lock().unwrap();
        assert_eq!(captured[0].values[0], gauge);
    }

    #[tokio::test]
    async fn distinct_group_labels_are_tracked_independently() {
        let delta = DeltaSink::new(CapturingSink::new());
        let mut a = counter(10.0);
        a.group.insert("user".into(), "app".into());
        let mut b = counter(20.0);
        b.group.insert("user".into(), "root".into());

        delta.send(&batch(vec![a.clone(), b.clone()])).await.unwrap();
        a.value = 15.0;
        b.value = 21.0;
        delta.send(&batch(vec![a, b])).await.unwrap();

        let captured = delta.inner.captured.lock().unwrap();
        let second = &captured[1].values;
        assert_eq!(second.len(), 2);
        assert!(second.iter().any(|v| v.value == 5.0));
        assert!(second.iter().any(|v| v.value == 1.0));
    }

    #[tokio::test]
    async fn name_delegates_to_inner_sink() {
        let delta = DeltaSink::new(NullSink);
        assert_eq!(delta.name(), "null");
    }
}
