//! Elasticsearch metrics sink for `myobserve`.
//! Bring your own `elasticsearch::Elasticsearch` client; each batch is
//! indexed as one JSON document.

use async_trait::async_trait;
use myobserve::{Metrics, Sink, SinkError};

#[derive(Clone, Debug)]
pub struct ElasticSink {
    index: String,
    client: elasticsearch::Elasticsearch,
}

impl ElasticSink {
    /// Create a sink with an existing Elasticsearch client and target index.
    pub fn new(client: elasticsearch::Elasticsearch, index: impl Into<String>) -> Result<Self, String> {
        let index = index.into();
        if index.is_empty() {
            return Err("index name cannot be empty".to_string());
        }
        Ok(Self { index, client })
    }
}

#[async_trait]
impl Sink for ElasticSink {
    fn name(&self) -> &str {
        "elastic"
    }

    async fn send(&self, metrics: &Metrics) -> Result<(), SinkError> {
        use elasticsearch::IndexParts;

        let body = serde_json::to_value(metrics).map_err(|e| SinkError(format!("serialize batch: {e}")))?;
        let response = self
            .client
            .index(IndexParts::Index(&self.index))
            .body(body)
            .send()
            .await
            .map_err(|e| SinkError(format!("index into {}: {e}", self.index)))?;

        if !response.status_code().is_success() {
            return Err(SinkError(format!("index into {}: status {}", self.index, response.status_code())));
        }
        Ok(())
    }
}
