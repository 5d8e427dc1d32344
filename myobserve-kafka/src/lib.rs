#![cfg(feature = "client")]

//! Kafka metrics sink for `myobserve` (companion crate).
//! Bring your own `FutureProducer`; each batch is sent as one JSON payload.

use async_trait::async_trait;
use myobserve::{Metrics, Sink, SinkError};

#[derive(Clone)]
pub struct KafkaSink {
    topic: String,
    producer: rdkafka::producer::FutureProducer,
}

impl std::fmt::Debug for KafkaSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KafkaSink").field("topic", &self.topic).finish()
    }
}

impl KafkaSink {
    /// Create a sink with an existing Kafka producer.
    pub fn new(producer: rdkafka::producer::FutureProducer, topic: impl Into<String>) -> Self {
        Self { topic: topic.into(), producer }
    }
}

#[async_trait]
impl Sink for KafkaSink {
    fn name(&self) -> &str {
        "kafka"
    }

    async fn send(&self, metrics: &Metrics) -> Result<(), SinkError> {
        use rdkafka::producer::FutureRecord;

        let payload = serde_json::to_vec(metrics).map_err(|e| SinkError(format!("serialize batch: {e}")))?;
        let record = FutureRecord::<(), _>::to(&self.topic).payload(&payload);
        self.producer
            .send(record, rdkafka::util::Timeout::Never)
            .await
            .map_err(|(e, _)| SinkError(format!("send to {}: {e}", self.topic)))?;
        Ok(())
    }
}
