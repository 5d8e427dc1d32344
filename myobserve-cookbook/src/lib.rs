//! Ready-to-use composition recipes ("cookbook") for `myobserve`.
//! Each function wires core crate pieces together into a pattern you would
//! otherwise have to assemble by hand: a plan shape, a resilient sink
//! pipeline, or a fully running monitor.
//!
//! - Plans: [`default_plan`], [`single_domain_plan`]
//! - Sink pipeline: [`resilient_sink`]
//! - Full composition: [`start_monitor`]

use myobserve::collectors::builtin_registry;
use myobserve::event::EventSink;
use myobserve::mysql::MySqlPool;
use myobserve::plan::{Domain, Level, Plan};
use myobserve::sink::Sink;
use myobserve::status::StatusRegistry;
use myobserve::{DeltaSink, Monitor, RetryConfig, RetrySink};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

/// A two-level starter plan: `fast` collects every `global_status` row
/// every second, `slow` reads and truncates the error-summary table every
/// minute. Good defaults for a first deployment against one MySQL target.
pub fn default_plan() -> Plan {
    let mut status_options = BTreeMap::new();
    status_options.insert("all".to_string(), "yes".to_string());

    Plan {
        name: "default".into(),
        levels: vec![
            Level {
                name: "fast".into(),
                interval: Duration::from_secs(1),
                emr: None,
                domains: vec![Domain { name: "status".into(), options: status_options, ..Domain::default() }],
            },
            Level {
                name: "slow".into(),
                interval: Duration::from_secs(60),
                emr: None,
                domains: vec![Domain { name: "errors".into(), ..Domain::default() }],
            },
        ],
    }
}

/// A single-level, single-domain plan — useful for smoke tests and demos
/// that don't need the full default shape.
pub fn single_domain_plan(domain: &str, interval: Duration) -> Plan {
    Plan {
        name: "single".into(),
        levels: vec![Level {
            name: "only".into(),
            interval,
            emr: None,
            domains: vec![Domain { name: domain.into(), ..Domain::default() }],
        }],
    }
}

/// Wraps a concrete sink with the recommended delivery pipeline: `Delta`
/// turns cumulative counters into per-interval values, then `Retry`
/// buffers and retries whatever `Delta` forwards that the inner sink
/// couldn't accept on the first try.
pub fn resilient_sink<S>(monitor_id: impl Into<String>, inner: S, events: Arc<dyn EventSink>) -> RetrySink<DeltaSink<S>>
where
    S: Sink + Send + Sync + 'static,
{
    RetrySink::new(monitor_id, DeltaSink::new(inner), RetryConfig::default(), events)
}

/// Start a complete monitor for one MySQL target using [`default_plan`]
/// and the two built-in collectors, delivering to the given sinks (each
/// expected to already be wrapped via [`resilient_sink`] if retry-on-
/// failure delivery is wanted).
pub fn start_monitor(
    monitor_id: impl Into<String>,
    pool: Arc<dyn MySqlPool>,
    sinks: Vec<Arc<dyn Sink>>,
    events: Arc<dyn EventSink>,
    status: Arc<StatusRegistry>,
) -> Monitor {
    Monitor::start(monitor_id, default_plan(), pool, Arc::new(builtin_registry()), sinks, events, status)
}
