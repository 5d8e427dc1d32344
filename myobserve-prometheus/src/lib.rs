//! In-process Prometheus metrics sink for `myobserve`.
//! Bring your own `prometheus::Registry`; every metric value is exposed as
//! a gauge, since that is the only type able to both absorb a raw counter
//! snapshot and a pre-computed delta without choosing wrong for one of them.

use async_trait::async_trait;
use myobserve::{Metrics, Sink, SinkError};
use prometheus::{GaugeVec, Registry};
use std::sync::Arc;

#[derive(Clone, Debug)]
pub struct PrometheusSink {
    registry: Arc<Registry>,
    gauge: GaugeVec,
}

impl PrometheusSink {
    /// Create a sink and register its gauge vector into the provided registry.
    ///
    /// # Errors
    /// Returns an error if the metric cannot be registered (e.g. name conflict).
    pub fn new<R: Into<Arc<Registry>>>(registry: R) -> Result<Self, prometheus::Error> {
        let registry = registry.into();
        let gauge = GaugeVec::new(
            prometheus::Opts::new("myobserve_metric", "Latest observed value per collected metric"),
            &["monitor_id", "level", "domain", "name"],
        )?;
        registry.register(Box::new(gauge.clone()))?;
        Ok(Self { registry, gauge })
    }

    /// Expose the registry for HTTP scraping.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}

#[async_trait]
impl Sink for PrometheusSink {
    fn name(&self) -> &str {
        "prometheus"
    }

    async fn send(&self, metrics: &Metrics) -> Result<(), SinkError> {
        for value in &metrics.values {
            self.gauge
                .with_label_values(&[&metrics.monitor_id, &metrics.level, &value.domain, &value.name])
                .set(value.value);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use myobserve::{MetricType, MetricValue};
    use std::collections::BTreeMap;

    #[tokio::test]
    async fn send_sets_gauge_per_metric() {
        let registry = Registry::new();
        let sink = PrometheusSink::new(registry).unwrap();

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

        let families = sink.registry().gather();
        let family = families.iter().find(|f| f.name() == "myobserve_metric").unwrap();
        assert_eq!(family.get_metric()[0].get_gauge().value(), 7.0);
    }
}
