//! The Engine: binds one level's collectors to a plan and drives one
//! firing, bounding the whole firing by the level's EMR and each collector
//! by its own CMR, isolating a panicking collector from the rest.

use crate::collector::{CollectResult, Collector, CollectorError};
use crate::error_policy::{ErrorPolicy, MetricDecision, PolicyConfig, ReportDecision, RetryDecision};
use crate::event::{AgentEvent, EventSink};
use crate::mysql::MySqlPool;
use crate::plan::{Domain, Level, MetricType, MetricValue, Metrics};
use crate::timeout::TimeoutPolicy;
use futures::FutureExt;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Wall-clock time as a duration since the Unix epoch, used to stamp
/// [`Metrics::begin`]/[`Metrics::end`].
fn epoch_now() -> Duration {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default()
}

/// One zero-valued sample for a domain-declared metric, synthesized when an
/// error policy's metric axis is `zero`.
fn zero_value(domain: &str, name: &str) -> MetricValue {
    MetricValue {
        domain: domain.to_string(),
        name: name.to_string(),
        metric_type: MetricType::Gauge,
        value: 0.0,
        group: Default::default(),
        meta: Default::default(),
    }
}

/// Errors the engine itself can raise, distinct from a single collector's
/// [`CollectorError`] (which the error policy absorbs).
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum EngineError {
    #[error("no collector registered for domain {0:?}")]
    UnknownDomain(String),
    #[error("collector prepare failed for domain {domain:?}: {source}")]
    Prepare { domain: String, #[source] source: CollectorError },
}

struct Entry {
    collector: Box<dyn Collector>,
    policy: ErrorPolicy,
    domain: Domain,
}

/// Drives every domain configured on one level of the plan.
pub struct Engine {
    monitor_id: String,
    level: Level,
    entries: HashMap<String, Entry>,
    events: Arc<dyn EventSink>,
    interval: AtomicU64,
}

impl Engine {
    pub fn new(monitor_id: impl Into<String>, level: Level, events: Arc<dyn EventSink>) -> Self {
        Self { monitor_id: monitor_id.into(), level, entries: HashMap::new(), events, interval: AtomicU64::new(0) }
    }

    /// Prepare every domain's collector against the current plan. Called
    /// whenever the level is (re)attached, e.g. on startup or plan swap.
    pub async fn prepare(
        &mut self,
        factory: &dyn crate::collector::CollectorFactory,
        pool: &dyn MySqlPool,
    ) -> Result<(), EngineError> {
        self.events
            .emit(AgentEvent::EnginePrepare { monitor_id: self.monitor_id.clone(), level: self.level.name.clone() })
            .await;

        for domain in self.level.domains.clone() {
            let mut collector = factory
                .create(&domain.name)
                .ok_or_else(|| EngineError::UnknownDomain(domain.name.clone()))?;
            if let Err(source) = collector.prepare(&domain, pool).await {
                self.events
                    .emit(AgentEvent::EnginePrepareError {
                        monitor_id: self.monitor_id.clone(),
                        level: self.level.name.clone(),
                        domain: domain.name.clone(),
                        message: source.to_string(),
                    })
                    .await;
                return Err(EngineError::Prepare { domain: domain.name.clone(), source });
            }
            self.entries.insert(domain.name.clone(), Entry { collector, policy: ErrorPolicy::new(), domain });
        }
        Ok(())
    }

    /// Run one firing: every domain collected concurrently, each bounded by
    /// its own CMR, the whole firing bounded by the level's EMR.
    pub async fn collect(&mut self, pool: &dyn MySqlPool) -> Metrics {
        let interval = self.interval.fetch_add(1, Ordering::SeqCst);
        let begin = epoch_now();
        let emr = TimeoutPolicy::new(self.level.effective_emr())
            .unwrap_or_else(|_| TimeoutPolicy::new(self.level.interval).expect("level interval is a valid timeout"));

        let level_name = self.level.name.clone();
        let level_emr = self.level.effective_emr();
        let monitor_id = self.monitor_id.clone();
        let events = self.events.clone();

        let mut futs = Vec::new();
        for (name, entry) in self.entries.iter_mut() {
            futs.push(Self::run_one(monitor_id.clone(), level_name.clone(), name.clone(), entry, level_emr, pool, events.clone()));
        }
        let joined = futures::future::join_all(futs);

        match emr.run(joined).await {
            Ok(batches) => {
                let values = batches.into_iter().flatten().collect();
                Metrics { monitor_id, level: level_name, interval, begin, end: epoch_now(), values }
            }
            Err(elapsed) => {
                events
                    .emit(AgentEvent::EngineEmrTimeout {
                        monitor_id: monitor_id.clone(),
                        level: level_name.clone(),
                        timeout: elapsed.timeout,
                    })
                    .await;
                Metrics { monitor_id, level: level_name, interval, begin, end: epoch_now(), values: Vec::new() }
            }
        }
    }

    async fn run_one(
        monitor_id: String,
        level_name: String,
        domain_name: String,
        entry: &mut Entry,
        level_emr: std::time::Duration,
        pool: &dyn MySqlPool,
        events: Arc<dyn EventSink>,
    ) -> Vec<MetricValue> {
        if entry.policy.is_stopped() {
            return Vec::new();
        }

        let timeout = match TimeoutPolicy::new(entry.domain.effective_cmr(level_emr)) {
            Ok(policy) => policy,
            Err(_) => return Vec::new(),
        };

        let mut values = Vec::new();
        loop {
            let collector = &mut entry.collector;
            let attempt = AssertUnwindSafe(collector.collect(pool)).catch_unwind();

            match timeout.run(attempt).await {
                Ok(Ok(Ok(CollectResult::Done(batch)))) => {
                    entry.policy.record_success();
                    values.extend(batch);
                    break;
                }
                Ok(Ok(Ok(CollectResult::ErrMore(batch)))) => {
                    values.extend(batch);
                    continue;
                }
                Ok(Ok(Err(err))) => {
                    let mapped = err.kind.and_then(|kind| entry.domain.errors.get(kind));
                    match mapped {
                        Some(spec) => {
                            let config = PolicyConfig::parse(spec);
                            let decision = entry.policy.evaluate(config, err.fatal);
                            if decision.report == ReportDecision::Report {
                                events
                                    .emit(AgentEvent::CollectorError {
                                        monitor_id: monitor_id.clone(),
                                        domain: domain_name.clone(),
                                        message: err.message,
                                    })
                                    .await;
                            }
                            if decision.retry == RetryDecision::Stop {
                                events
                                    .emit(AgentEvent::ErrorPolicyStopped {
                                        monitor_id: monitor_id.clone(),
                                        domain: domain_name.clone(),
                                        message: "collector stopped after fatal error".into(),
                                    })
                                    .await;
                            }
                            if decision.metric == MetricDecision::Emit {
                                values.extend(entry.domain.metrics.iter().map(|name| zero_value(&domain_name, name)));
                            }
                        }
                        None => {
                            let decision = entry.policy.evaluate(PolicyConfig::default(), err.fatal);
                            events
                                .emit(AgentEvent::EngineCollectError {
                                    monitor_id: monitor_id.clone(),
                                    level: level_name.clone(),
                                    domain: domain_name.clone(),
                                    message: err.message,
                                })
                                .await;
                            if decision.retry == RetryDecision::Stop {
                                events
                                    .emit(AgentEvent::ErrorPolicyStopped {
                                        monitor_id: monitor_id.clone(),
                                        domain: domain_name.clone(),
                                        message: "collector stopped after fatal error".into(),
                                    })
                                    .await;
                            }
                        }
                    }
                    break;
                }
                Ok(Err(_panic)) => {
                    events.emit(AgentEvent::CollectorPanic { monitor_id, domain: domain_name }).await;
                    break;
                }
                Err(elapsed) => {
                    events
                        .emit(AgentEvent::CollectorCmrTimeout {
                            monitor_id,
                            level: level_name,
                            domain: domain_name,
                            timeout: elapsed.timeout,
                        })
                        .await;
                    break;
                }
            }
        }
        values
    }
}
