//! JSONL sink for `myobserve`. Writes one batch per line, always appending.
//! Bring your own path.

use async_trait::async_trait;
use myobserve::{Metrics, Sink, SinkError};
use tokio::io::AsyncWriteExt;

#[derive(Clone, Debug)]
pub struct JsonlSink {
    path: String,
}

impl JsonlSink {
    pub fn new<S: Into<String>>(path: S) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl Sink for JsonlSink {
    fn name(&self) -> &str {
        "jsonl"
    }

    async fn send(&self, metrics: &Metrics) -> Result<(), SinkError> {
        let line = serde_json::to_string(metrics).map_err(|e| SinkError(format!("serialize batch: {e}")))? + "\n";
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| SinkError(format!("open {}: {e}", self.path)))?;
        file.write_all(line.as_bytes()).await.map_err(|e| SinkError(format!("write {}: {e}", self.path)))?;
        file.flush().await.map_err(|e| SinkError(format!("flush {}: {e}", self.path)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn writes_one_line_per_batch() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("metrics.jsonl");
        let sink = JsonlSink::new(path.to_str().unwrap());

        let metrics = Metrics { monitor_id: "m1".into(), level: "fast".into(), interval: 1, ..Default::default() };
        sink.send(&metrics).await.unwrap();
        sink.send(&metrics).await.unwrap();

        let contents = tokio::fs::read_to_string(&path).await.unwrap();
        assert_eq!(contents.lines().count(), 2);
        assert!(contents.lines().next().unwrap().contains("\"monitor_id\":\"m1\""));
    }
}
