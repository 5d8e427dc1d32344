#![cfg(feature = "etcd-client")]

//! etcd metrics sink for `myobserve` (companion crate).
//! Bring your own `etcd_client::Client`; each batch is stored as JSON
//! under a prefix, keyed by a timestamp so successive batches don't
//! overwrite one another.

use async_trait::async_trait;
use myobserve::{Metrics, Sink, SinkError};

#[derive(Clone)]
pub struct EtcdSink {
    prefix: String,
    client: etcd_client::Client,
}

impl std::fmt::Debug for EtcdSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EtcdSink")
            .field("prefix", &self.prefix)
            .field("client", &"<etcd_client::Client>")
            .finish()
    }
}

impl EtcdSink {
    /// Create a sink using an existing etcd client; keys will be `prefix/<nanos>-<uuid>`.
    ///
    /// # Errors
    /// Returns `Err` if the prefix is empty, contains control characters, or is otherwise invalid.
    pub fn new(prefix: impl Into<String>, client: etcd_client::Client) -> Result<Self, String> {
        let mut p: String = prefix.into();

        p = p.trim().trim_end_matches('/').to_string();

        if p.is_empty() {
            return Err("prefix cannot be empty".to_string());
        }
        if p.chars().any(|c| c.is_control()) {
            return Err("prefix cannot contain control characters".to_string());
        }

        Ok(Self { prefix: p, client })
    }
}

#[async_trait]
impl Sink for EtcdSink {
    fn name(&self) -> &str {
        "etcd"
    }

    async fn send(&self, metrics: &Metrics) -> Result<(), SinkError> {
        let mut client = self.client.clone();
        let ts = chrono::Utc::now().timestamp_nanos_opt().unwrap_or(i64::MAX); // chrono overflows near year 2262; clamp to max
        let key = format!("{}/{}-{}", self.prefix, ts, uuid::Uuid::new_v4());
        let value = serde_json::to_string(metrics).map_err(|e| SinkError(format!("serialize batch: {e}")))?;
        client.put(key.clone(), value, None).await.map_err(|e| SinkError(format!("put {key}: {e}")))?;
        Ok(())
    }
}
