//! The concrete sink contract and the two always-available built-in sinks.
//!
//! Unlike a fire-and-forget telemetry sink, `Sink::send` returns a
//! `Result`: the Retry wrapper needs to know whether delivery failed so it
//! can keep the batch buffered.

use crate::plan::Metrics;
use async_trait::async_trait;

/// Errors a sink can return from `send`.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct SinkError(pub String);

impl SinkError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Somewhere a batch of metrics can be delivered to.
#[async_trait]
pub trait Sink: Send + Sync {
    /// Stable name used in logs, events, and the status registry.
    fn name(&self) -> &str;

    /// Deliver one batch. Implementations should not retry internally —
    /// that's the Retry wrapper's job — but may do a single best-effort
    /// attempt including their own connection setup.
    async fn send(&self, metrics: &Metrics) -> Result<(), SinkError>;
}

/// Discards every batch. Useful as a default/no-op sink and in tests.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullSink;

#[async_trait]
impl Sink for NullSink {
    fn name(&self) -> &str {
        "null"
    }

    async fn send(&self, _metrics: &Metrics) -> Result<(), SinkError> {
        Ok(())
    }
}

/// Logs every batch via `tracing`. Grounded on the same pattern as any
/// other observability sink in this workspace — never fails.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogSink;

#[async_trait]
impl Sink for LogSink {
    fn name(&self) -> &str {
        "log"
    }

    async fn send(&self, metrics: &Metrics) -> Result<(), SinkError> {
        tracing::info!(
            monitor_id = %metrics.monitor_id,
            level = %metrics.level,
            interval = metrics.interval,
            count = metrics.values.len(),
            "metrics_batch"
        );
        Ok(())
    }
}
