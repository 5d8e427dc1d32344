#![forbid(unsafe_code)]

//! # myobserve
//!
//! Core collection engine for a MySQL observability agent: level plans,
//! collectors, error policy, and sink delivery. This crate is the part of
//! the agent that never touches a network socket or a config file directly
//! — it is handed an opaque [`MySqlPool`](mysql::MySqlPool), a [`Plan`](plan::Plan),
//! and a set of [`Sink`](sink::Sink)s, and it drives collection on a
//! schedule, absorbing and reporting failures along the way.
//!
//! ## Features
//!
//! - **Level-based scheduling**: each plan level fires its own [`Engine`](engine::Engine)
//!   on its own interval, bounded by an Engine Max Runtime.
//! - **Collector contract** with per-domain Collector Max Runtime and panic
//!   isolation, so one misbehaving domain never blocks the rest of a firing.
//! - **Error policy** with independent report / metric / retry axes, plus a
//!   specialization for truncate-and-read counter tables.
//! - **Sink pipeline**: a `Delta` transform for cumulative counters and a
//!   LIFO `Retry` buffer wrapping any concrete sink.
//! - **Heartbeat** writer/reader/waiter for in-band replication lag probing.
//!
//! ## Quick Start
//!
//! ```rust
//! use myobserve::collector::{CollectResult, Collector, CollectorError, CollectorHelp, CollectorRegistry};
//! use myobserve::engine::Engine;
//! use myobserve::event::NullEventSink;
//! use myobserve::mysql::{MySqlPool, Param, PoolError, Row};
//! use myobserve::plan::{Domain, Level, MetricType, MetricValue};
//! use async_trait::async_trait;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! struct EchoPool;
//!
//! #[async_trait]
//! impl MySqlPool for EchoPool {
//!     async fn query(&self, _sql: &str, _params: &[Param]) -> Result<Vec<Row>, PoolError> {
//!         Ok(vec![])
//!     }
//!     async fn execute(&self, _sql: &str, _params: &[Param]) -> Result<u64, PoolError> {
//!         Ok(0)
//!     }
//! }
//!
//! struct ThreadsRunning;
//!
//! #[async_trait]
//! impl Collector for ThreadsRunning {
//!     fn domain(&self) -> &str { "status" }
//!     fn help(&self) -> CollectorHelp {
//!         CollectorHelp { domain: "status", description: "threads_running gauge", options: &[] }
//!     }
//!     async fn prepare(&mut self, _domain: &Domain, _pool: &dyn MySqlPool) -> Result<(), CollectorError> {
//!         Ok(())
//!     }
//!     async fn collect(&mut self, _pool: &dyn MySqlPool) -> Result<CollectResult, CollectorError> {
//!         Ok(CollectResult::Done(vec![MetricValue {
//!             domain: "status".into(),
//!             name: "threads_running".into(),
//!             metric_type: MetricType::Gauge,
//!             value: 7.0,
//!             group: Default::default(),
//!             meta: Default::default(),
//!         }]))
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     let mut registry = CollectorRegistry::new();
//!     registry.register("status", || Box::new(ThreadsRunning) as Box<dyn Collector>);
//!
//!     let level = Level {
//!         name: "fast".into(),
//!         interval: Duration::from_secs(1),
//!         emr: None,
//!         domains: vec![Domain { name: "status".into(), ..Domain::default() }],
//!     };
//!
//!     let pool = EchoPool;
//!     let mut engine = Engine::new("monitor-1", level, Arc::new(NullEventSink));
//!     engine.prepare(&registry, &pool).await.expect("prepare");
//!     let metrics = engine.collect(&pool).await;
//!     assert_eq!(metrics.values[0].name, "threads_running");
//! }
//! ```

pub mod collector;
pub mod collectors;
pub mod delta;
pub mod engine;
pub mod error_policy;
pub mod event;
pub mod heartbeat;
pub mod level_collector;
pub mod monitor;
pub mod mysql;
pub mod plan;
pub mod plan_load;
pub mod retry_sink;
pub mod sink;
pub mod status;
pub mod timeout;

pub use collector::{Collector, CollectorError, CollectorFactory, CollectorRegistry, CollectResult};
pub use delta::DeltaSink;
pub use engine::{Engine, EngineError};
pub use error_policy::{
    ErrorDecision, ErrorPolicy, MetricAxis, MetricDecision, PolicyConfig, ReportAxis, ReportDecision, RetryAxis,
    RetryDecision, TruncateErrorPolicy,
};
pub use event::{AgentEvent, EventSink, LogEventSink, MemoryEventSink, NullEventSink};
pub use heartbeat::{HeartbeatReader, HeartbeatWriter, Lag, SourceCandidate, SourceRole, WaitOutcome, Waiter};
pub use level_collector::LevelCollector;
pub use monitor::Monitor;
pub use mysql::{MySqlPool, Param, PoolError, Row};
pub use plan::{Domain, Level, MetricType, MetricValue, Metrics, Plan};
pub use plan_load::{load as load_plan, resolve as resolve_plan, PlanError, PlanLoadError, RawDomain, RawLevel, RawPlan};
pub use retry_sink::{RetryConfig, RetrySink};
pub use sink::{LogSink, NullSink, Sink, SinkError};
pub use status::StatusRegistry;
pub use timeout::{Elapsed, TimeoutError, TimeoutPolicy, MAX_TIMEOUT};
