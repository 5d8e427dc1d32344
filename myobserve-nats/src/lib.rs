#![cfg(feature = "client")]

//! NATS metrics sink for `myobserve` (companion crate).
//!
//! Bring your own `async_nats::Client`; each batch is serialized to JSON
//! and published to the configured subject whole, not split per metric.
//!
//! **Error handling note**: a publish failure is surfaced as a `SinkError`
//! so the core crate's `RetrySink` can buffer and retry the batch. This
//! sink itself never retries or drops silently.
//!
//! ```rust,ignore
//! use myobserve_nats::NatsSink;
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let client = async_nats::connect("nats://127.0.0.1:4222").await?;
//! let sink = NatsSink::new(client, "myobserve.metrics");
//! // wrap with myobserve::RetrySink if desired
//! # Ok(()) }
//! ```

use async_trait::async_trait;
use myobserve::{Metrics, Sink, SinkError};

#[derive(Clone, Debug)]
pub struct NatsSink {
    subject: String,
    client: async_nats::Client,
}

impl NatsSink {
    /// Create a sink using an existing NATS async connection.
    pub fn new(client: async_nats::Client, subject: impl Into<String>) -> Self {
        Self { subject: subject.into(), client }
    }
}

#[async_trait]
impl Sink for NatsSink {
    fn name(&self) -> &str {
        "nats"
    }

    async fn send(&self, metrics: &Metrics) -> Result<(), SinkError> {
        let payload = serde_json::to_vec(metrics).map_err(|e| SinkError(format!("serialize batch: {e}")))?;
        self.client
            .publish(self.subject.clone(), payload.into())
            .await
            .map_err(|e| SinkError(format!("publish to {}: {e}", self.subject)))
    }
}
