//! Retry wrapper: buffers batches an inner sink failed to deliver and
//! keeps trying them, newest first, without blocking the reporter that
//! handed the batch off.
//!
//! Grounded on the same shape as a non-blocking telemetry sink (a bounded
//! channel drained by a single background worker) but with two differences
//! the spec requires: a LIFO stack instead of FIFO (the newest batch is the
//! most valuable one, so it is retried before older ones), and bounded
//! eviction of the *oldest* entry rather than rejecting the newest.

use crate::event::{AgentEvent, EventSink};
use crate::plan::Metrics;
use crate::sink::{Sink, SinkError};
use crate::timeout::TimeoutPolicy;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Default bound on the number of buffered batches.
pub const DEFAULT_CAPACITY: usize = 60;
/// Default per-attempt send deadline.
pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(5);
/// Default pause between drain attempts when the stack is non-empty.
pub const DEFAULT_SEND_RETRY_WAIT: Duration = Duration::from_millis(200);

/// Configuration resolved from a sink's option map (`buffer-size`,
/// `send-timeout`, `send-retry-wait`).
#[derive(Clone, Copy, Debug)]
pub struct RetryConfig {
    pub capacity: usize,
    pub send_timeout: Duration,
    pub send_retry_wait: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            send_timeout: DEFAULT_SEND_TIMEOUT,
            send_retry_wait: DEFAULT_SEND_RETRY_WAIT,
        }
    }
}

/// Wraps an inner [`Sink`] with a bounded LIFO retry buffer.
///
/// `send` never blocks on network I/O: it pushes onto the stack and
/// returns immediately. A single background task owns draining the stack,
/// guarded by `sending` so at most one delivery attempt is ever in flight.
pub struct RetrySink<S> {
    name: String,
    inner: Arc<S>,
    stack: Arc<Mutex<Vec<Metrics>>>,
    config: RetryConfig,
    sending: Arc<AtomicBool>,
    dropped: Arc<AtomicU64>,
    events: Arc<dyn EventSink>,
    monitor_id: String,
}

impl<S> RetrySink<S>
where
    S: Sink + Send + Sync + 'static,
{
    pub fn new(monitor_id: impl Into<String>, inner: S, config: RetryConfig, events: Arc<dyn EventSink>) -> Self {
        let inner = Arc::new(inner);
        Self {
            name: inner.name().to_string(),
            inner,
            stack: Arc::new(Mutex::new(Vec::new())),
            config,
            sending: Arc::new(AtomicBool::new(false)),
            dropped: Arc::new(AtomicU64::new(0)),
            events,
            monitor_id: monitor_id.into(),
        }
    }

    /// Number of batches currently buffered.
    pub fn buffered(&self) -> usize {
        self.stack.lock().unwrap_or_else(|p| p.into_inner()).len()
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    fn push(&self, metrics: Metrics) {
        let mut stack = self.stack.lock().unwrap_or_else(|p| p.into_inner());
        if stack.len() >= self.config.capacity {
            // Newest wins: drop the oldest buffered batch to make room.
            stack.remove(0);
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
        stack.push(metrics);
    }

    /// Drain the stack, newest first, until it is empty or a send fails.
    /// Spawns nothing itself; callers (the sink pipeline's reporter loop)
    /// invoke this after every `send` so delivery happens inline with a
    /// single logical owner, matching `sending`'s single-active-sender
    /// guarantee without needing a dedicated background task per sink.
    async fn drain(&self) {
        if self.sending.swap(true, Ordering::AcqRel) {
            // Another drain is already in flight; it will pick up what we pushed.
            return;
        }
        let mut attempt: u32 = 0;
        loop {
            let next = {
                let mut stack = self.stack.lock().unwrap_or_else(|p| p.into_inner());
                stack.pop()
            };
            let Some(metrics) = next else { break };

            let timeout = TimeoutPolicy::new(self.config.send_timeout).unwrap_or_else(|_| {
                TimeoutPolicy::new(DEFAULT_SEND_TIMEOUT).expect("default send timeout is valid")
            });
            let inner = self.inner.clone();
            let metrics_for_send = metrics.clone();
            let outcome = timeout.run(async move { inner.send(&metrics_for_send).await }).await;

            match outcome {
                Ok(Ok(())) => {
                    attempt = 0;
                }
                Ok(Err(err)) => {
                    attempt += 1;
                    self.events
                        .emit(AgentEvent::SinkSendError {
                            monitor_id: self.monitor_id.clone(),
                            sink: self.name.clone(),
                            message: err.0,
                        })
                        .await;
                    self.push(metrics);
                    self.events
                        .emit(AgentEvent::SinkSendRetried {
                            monitor_id: self.monitor_id.clone(),
                            sink: self.name.clone(),
                            attempt,
                        })
                        .await;
                    tokio::time::sleep(self.config.send_retry_wait).await;
                    break;
                }
                Err(elapsed) => {
                    attempt += 1;
                    self.events
                        .emit(AgentEvent::SinkSendError {
                            monitor_id: self.monitor_id.clone(),
                            sink: self.name.clone(),
                            message: format!("send timed out after {:?}", elapsed.elapsed),
                        })
                        .await;
                    self.push(metrics);
                    tokio::time::sleep(self.config.send_retry_wait).await;
                    break;
                }
            }
        }
        self.sending.store(false, Ordering::Release);
    }
}

#[async_trait::async_trait]
impl<S> Sink for RetrySink<S>
where
    S: Sink + Send + Sync + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn send(&self, metrics: &Metrics) -> Result<(), SinkError> {
        self.push(metrics.clone());
        self.drain().await;
        Ok(())
    }
}
