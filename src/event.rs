//! Structured event bus for the collection engine.
//!
//! Every component that can observe something worth operator attention —
//! a timed-out collector, a sink that rejected a batch, a replication
//! source change — emits an [`AgentEvent`] rather than logging ad hoc.
//! Events flow through [`EventSink`] implementations, which can log,
//! aggregate in memory for tests, or be fanned out to external systems.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Events emitted by the engine, collectors, sinks, and heartbeat tasks.
#[derive(Clone, Debug, PartialEq)]
#[non_exhaustive]
pub enum AgentEvent {
    /// The engine began preparing all collectors for a level.
    EnginePrepare { monitor_id: String, level: String },
    /// A collector's `prepare` call failed; the engine could not attach it.
    EnginePrepareError { monitor_id: String, level: String, domain: String, message: String },
    /// A level's Engine Max Runtime elapsed before all collectors returned.
    EngineEmrTimeout { monitor_id: String, level: String, timeout: Duration },
    /// A collector's error carried no registered kind (or the domain has no
    /// policy mapped for it); the engine reports it directly rather than
    /// through a plan-configured policy.
    EngineCollectError { monitor_id: String, level: String, domain: String, message: String },
    /// A single collector's Collector Max Runtime elapsed.
    CollectorCmrTimeout { monitor_id: String, level: String, domain: String, timeout: Duration },
    /// A collector returned an error (pre error-policy evaluation).
    CollectorError { monitor_id: String, domain: String, message: String },
    /// A collector task panicked; isolated, the level's firing continues.
    CollectorPanic { monitor_id: String, domain: String },
    /// An error policy transitioned into its terminal (stopped) state.
    ErrorPolicyStopped { monitor_id: String, domain: String, message: String },
    /// An error policy reported a failure for the first time (`report-once`).
    ErrorPolicyReported { monitor_id: String, domain: String, message: String },
    /// A level collector's batch was dropped because the reporter channel
    /// was full; backpressure, not a failure.
    DropMetricsFlush { monitor_id: String, level: String },
    /// A sink rejected or failed to deliver a batch.
    SinkSendError { monitor_id: String, sink: String, message: String },
    /// A sink's remote server responded with an error (as opposed to a
    /// transport-level failure).
    SinkServerError { monitor_id: String, sink: String, message: String },
    /// A sink rejected a batch because its metrics could not be translated
    /// into the target protocol's conventions.
    SinkInvalidMetrics { monitor_id: String, sink: String, message: String },
    /// The retry wrapper is re-attempting delivery of a buffered batch.
    SinkSendRetried { monitor_id: String, sink: String, attempt: u32 },
    /// The retry wrapper's buffer dropped the oldest batch(es) to make room.
    SinkBufferDropped { monitor_id: String, sink: String, dropped_batches: u64 },
    /// The heartbeat writer failed to upsert its row.
    HeartbeatWriteError { monitor_id: String, message: String },
    /// The heartbeat reader observed a change of replication source.
    ReplSourceChange { monitor_id: String, old_src_id: Option<String>, new_src_id: String },
    /// The heartbeat waiter slept to allow replication to catch up.
    HeartbeatLagWait { monitor_id: String, lag: Duration, sleep: Duration },
    /// Reloading the monitor's stored MySQL credentials failed.
    DbReloadPasswordError { monitor_id: String, message: String },
}

impl fmt::Display for AgentEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AgentEvent::EnginePrepare { monitor_id, level } => {
                write!(f, "engine-prepare monitor={monitor_id} level={level}")
            }
            AgentEvent::EnginePrepareError { monitor_id, level, domain, message } => {
                write!(f, "engine-prepare-error monitor={monitor_id} level={level} domain={domain}: {message}")
            }
            AgentEvent::EngineEmrTimeout { monitor_id, level, timeout } => {
                write!(f, "engine-emr-timeout monitor={monitor_id} level={level} timeout={timeout:?}")
            }
            AgentEvent::EngineCollectError { monitor_id, level, domain, message } => {
                write!(f, "engine-collect-error monitor={monitor_id} level={level} domain={domain}: {message}")
            }
            AgentEvent::CollectorCmrTimeout { monitor_id, level, domain, timeout } => write!(
                f,
                "collector-cmr-timeout monitor={monitor_id} level={level} domain={domain} timeout={timeout:?}"
            ),
            AgentEvent::CollectorError { monitor_id, domain, message } => {
                write!(f, "collector-error monitor={monitor_id} domain={domain}: {message}")
            }
            AgentEvent::CollectorPanic { monitor_id, domain } => {
                write!(f, "collector-panic monitor={monitor_id} domain={domain}")
            }
            AgentEvent::ErrorPolicyStopped { monitor_id, domain, message } => {
                write!(f, "error-policy-stopped monitor={monitor_id} domain={domain}: {message}")
            }
            AgentEvent::ErrorPolicyReported { monitor_id, domain, message } => {
                write!(f, "error-policy-reported monitor={monitor_id} domain={domain}: {message}")
            }
            AgentEvent::DropMetricsFlush { monitor_id, level } => {
                write!(f, "drop-metrics-flush monitor={monitor_id} level={level}")
            }
            AgentEvent::SinkSendError { monitor_id, sink, message } => {
                write!(f, "sink-send-error monitor={monitor_id} sink={sink}: {message}")
            }
            AgentEvent::SinkServerError { monitor_id, sink, message } => {
                write!(f, "sink-server-error monitor={monitor_id} sink={sink}: {message}")
            }
            AgentEvent::SinkInvalidMetrics { monitor_id, sink, message } => {
                write!(f, "sink-invalid-metrics monitor={monitor_id} sink={sink}: {message}")
            }
            AgentEvent::SinkSendRetried { monitor_id, sink, attempt } => {
                write!(f, "sink-send-retried monitor={monitor_id} sink={sink} attempt={attempt}")
            }
            AgentEvent::SinkBufferDropped { monitor_id, sink, dropped_batches } => write!(
                f,
                "sink-buffer-dropped monitor={monitor_id} sink={sink} dropped={dropped_batches}"
            ),
            AgentEvent::HeartbeatWriteError { monitor_id, message } => {
                write!(f, "heartbeat-write-error monitor={monitor_id}: {message}")
            }
            AgentEvent::ReplSourceChange { monitor_id, old_src_id, new_src_id } => write!(
                f,
                "repl-source-change monitor={monitor_id} old={old_src_id:?} new={new_src_id}"
            ),
            AgentEvent::HeartbeatLagWait { monitor_id, lag, sleep } => {
                write!(f, "heartbeat-lag-wait monitor={monitor_id} lag={lag:?} sleep={sleep:?}")
            }
            AgentEvent::DbReloadPasswordError { monitor_id, message } => {
                write!(f, "db-reload-password-error monitor={monitor_id}: {message}")
            }
        }
    }
}

/// Consumer of [`AgentEvent`]s. Implementations must not block the caller
/// for long; use an internal channel and background task if delivery is
/// slow (see the Retry sink wrapper for that pattern applied to metrics).
#[async_trait::async_trait]
pub trait EventSink: Send + Sync {
    async fn emit(&self, event: AgentEvent);
}

/// Discards every event.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullEventSink;

#[async_trait::async_trait]
impl EventSink for NullEventSink {
    async fn emit(&self, _event: AgentEvent) {}
}

/// Logs every event via `tracing`.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogEventSink;

#[async_trait::async_trait]
impl EventSink for LogEventSink {
    async fn emit(&self, event: AgentEvent) {
        tracing::info!(event = %event, "agent_event");
    }
}

/// Retains events in memory; used by tests to assert which events fired.
#[derive(Clone, Debug)]
pub struct MemoryEventSink {
    events: Arc<Mutex<Vec<AgentEvent>>>,
    capacity: usize,
    evicted: Arc<AtomicU64>,
}

impl MemoryEventSink {
    pub fn new() -> Self {
        Self::with_capacity(10_000)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            events: Arc::new(Mutex::new(Vec::new())),
            capacity: capacity.max(1),
            evicted: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn events(&self) -> Vec<AgentEvent> {
        self.events.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }

    pub fn clear(&self) {
        self.events.lock().unwrap_or_else(|p| p.into_inner()).clear();
    }

    pub fn len(&self) -> usize {
        self.events.lock().unwrap_or_else(|p| p.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn evicted(&self) -> u64 {
        self.evicted.load(Ordering::Relaxed)
    }
}

impl Default for MemoryEventSink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl EventSink for MemoryEventSink {
    async fn emit(&self, event: AgentEvent) {
        let mut guard = self.events.lock().unwrap_or_else(|p| p.into_inner());
        if guard.len() >= self.capacity {
            guard.remove(0);
            self.evicted.fetch_add(1, Ordering::Relaxed);
        }
        guard.push(event);
    }
}
