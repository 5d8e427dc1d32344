//! OTLP metrics sink for `myobserve`.
//! Bring your own `opentelemetry_sdk::logs::LoggerProvider`; each metric
//! value in a batch is emitted as one structured log record (OTLP has no
//! stable metrics-over-logs-API shortcut yet, so logs are the least
//! surprising carrier until a dedicated metrics pipeline is wired up).
//!
//! ```ignore
//! use opentelemetry_sdk::logs::LoggerProvider;
//! use myobserve_otlp::OtlpSink;
//!
//! let provider = LoggerProvider::builder().build();
//! let sink = OtlpSink::new(provider);
//! ```

use async_trait::async_trait;
use myobserve::{Metrics, MetricType, Sink, SinkError};
use opentelemetry::logs::{AnyValue, LogRecord, Logger, LoggerProvider, Severity};

#[derive(Clone, Debug)]
pub struct OtlpSink<P> {
    provider: P,
}

impl<P> OtlpSink<P>
where
    P: LoggerProvider + Clone + Send + Sync + 'static,
{
    /// Create a sink from an existing OTLP logger provider
    pub fn new(provider: P) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl<P> Sink for OtlpSink<P>
where
    P: LoggerProvider + Clone + Send + Sync + 'static,
    P::Logger: Send,
{
    fn name(&self) -> &str {
        "otlp"
    }

    async fn send(&self, metrics: &Metrics) -> Result<(), SinkError> {
        let logger = self.provider.logger("myobserve");
        for value in &metrics.values {
            let mut record = logger.create_log_record();
            record.set_severity_number(Severity::Info);
            record.set_body(AnyValue::from(format!("{}.{}", value.domain, value.name)));
            record.add_attribute("monitor_id", metrics.monitor_id.clone());
            record.add_attribute("level", metrics.level.clone());
            record.add_attribute("domain", value.domain.clone());
            record.add_attribute("name", value.name.clone());
            record.add_attribute("metric_type", metric_type_label(value.metric_type));
            record.add_attribute("value", value.value);
            for (k, v) in &value.group {
                record.add_attribute(format!("group.{k}"), v.clone());
            }
            logger.emit(record);
        }
        Ok(())
    }
}

fn metric_type_label(t: MetricType) -> &'static str {
    match t {
        MetricType::CumulativeCounter => "counter",
        MetricType::DeltaCounter => "delta_counter",
        MetricType::Gauge => "gauge",
        MetricType::Bool => "bool",
        MetricType::Event => "event",
        MetricType::Unknown => "unknown",
        _ => "unknown",
    }
}
