//! Monitor: supervises one MySQL target's complete collection pipeline — one
//! [`LevelCollector`] (and its `Engine`) per plan level, a reporter task per
//! level that fans each batch out to every configured sink, and the
//! heartbeat writer that keeps this target's replication-lag row current.

use crate::collector::CollectorFactory;
use crate::event::{AgentEvent, EventSink};
use crate::heartbeat::HeartbeatWriter;
use crate::level_collector::LevelCollector;
use crate::mysql::MySqlPool;
use crate::plan::{Metrics, Plan};
use crate::sink::Sink;
use crate::status::StatusRegistry;
use std::sync::Arc;

/// Batches kept un-consumed per level before a new firing's batch is
/// dropped rather than blocking the LCO's timer loop.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 8;

/// Owns every task serving one MySQL target: per-level collection, batch
/// fan-out to sinks, and the heartbeat writer. Dropping the last clone of
/// the underlying `Arc`s does not stop the tasks; call [`Self::stop`].
pub struct Monitor {
    monitor_id: String,
    level_collectors: Vec<Arc<LevelCollector>>,
    heartbeat: Arc<HeartbeatWriter>,
}

impl Monitor {
    /// Build and start one monitor: spawns one collection task and one
    /// reporter task per plan level, plus the heartbeat writer.
    pub fn start(
        monitor_id: impl Into<String>,
        plan: Plan,
        pool: Arc<dyn MySqlPool>,
        factory: Arc<dyn CollectorFactory>,
        sinks: Vec<Arc<dyn Sink>>,
        events: Arc<dyn EventSink>,
        status: Arc<StatusRegistry>,
    ) -> Self {
        let monitor_id = monitor_id.into();
        let mut level_collectors = Vec::with_capacity(plan.levels.len());

        for level in plan.levels {
            let (lco, mut rx) = LevelCollector::new(monitor_id.clone(), DEFAULT_CHANNEL_CAPACITY);
            lco.change_plan(level);
            let lco = Arc::new(lco);
            level_collectors.push(lco.clone());

            let runner = lco.clone();
            let run_factory = factory.clone();
            let run_pool = pool.clone();
            let run_events = events.clone();
            tokio::spawn(async move { runner.run(run_factory, run_pool, run_events).await });

            let report_sinks = sinks.clone();
            let report_events = events.clone();
            let report_monitor_id = monitor_id.clone();
            tokio::spawn(async move {
                while let Some(metrics) = rx.recv().await {
                    Self::report(&report_monitor_id, &metrics, &report_sinks, &report_events).await;
                }
            });
        }

        let heartbeat = Arc::new(HeartbeatWriter::new(monitor_id.clone(), pool, events, status));
        let hb_runner = heartbeat.clone();
        tokio::spawn(async move { hb_runner.run().await });

        Self { monitor_id, level_collectors, heartbeat }
    }

    async fn report(monitor_id: &str, metrics: &Metrics, sinks: &[Arc<dyn Sink>], events: &Arc<dyn EventSink>) {
        let sends = sinks.iter().map(|sink| {
            let sink = Arc::clone(sink);
            let metrics = metrics.clone();
            async move {
                let result = sink.send(&metrics).await;
                (sink.name().to_string(), result)
            }
        });
        for (name, result) in futures::future::join_all(sends).await {
            if let Err(err) = result {
                events
                    .emit(AgentEvent::SinkSendError { monitor_id: monitor_id.to_string(), sink: name, message: err.0 })
                    .await;
            }
        }
    }

    pub fn monitor_id(&self) -> &str {
        &self.monitor_id
    }

    /// Re-point every level at a freshly loaded plan. Levels in the new plan
    /// beyond the collector count originally started are ignored; this
    /// mirrors a plan reload keeping the same level set, not adding new ones.
    pub fn change_plan(&self, plan: Plan) {
        for (collector, level) in self.level_collectors.iter().zip(plan.levels) {
            collector.change_plan(level);
        }
    }

    /// Stop every task belonging to this monitor.
    pub fn stop(&self) {
        for collector in &self.level_collectors {
            collector.stop();
        }
        self.heartbeat.stop();
    }
}
