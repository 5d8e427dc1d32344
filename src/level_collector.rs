//! The Level Collector (LCO): fires one [`Engine`] on its level's interval
//! and hands each completed batch to the reporter without ever blocking on
//! a slow downstream consumer.

use crate::collector::CollectorFactory;
use crate::engine::Engine;
use crate::event::{AgentEvent, EventSink};
use crate::mysql::MySqlPool;
use crate::plan::{Level, Metrics};
use arc_swap::ArcSwapOption;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Drives one level's [`Engine`] on a `tokio::time::interval` timer,
/// publishing each firing's [`Metrics`] to a bounded, non-blocking channel.
pub struct LevelCollector {
    monitor_id: String,
    level: ArcSwapOption<Level>,
    out_tx: mpsc::Sender<Metrics>,
    cancel: CancellationToken,
}

impl LevelCollector {
    /// Returns the collector plus the receiving half of its out-channel.
    /// `capacity` bounds how many un-consumed batches are kept; once full,
    /// a new firing's batch is dropped rather than blocking the timer loop.
    pub fn new(monitor_id: impl Into<String>, capacity: usize) -> (Self, mpsc::Receiver<Metrics>) {
        let (out_tx, out_rx) = mpsc::channel(capacity.max(1));
        (
            Self { monitor_id: monitor_id.into(), level: ArcSwapOption::from(None), out_tx, cancel: CancellationToken::new() },
            out_rx,
        )
    }

    /// Swap in a new level to drive. Calling this while a run loop is
    /// active changes what the *next* firing after `prepare` runs against;
    /// callers are expected to (re)call [`Self::run`] after a plan change
    /// so the new level gets a fresh `Engine::prepare`.
    pub fn change_plan(&self, level: Level) {
        self.level.store(Some(Arc::new(level)));
    }

    pub fn pause(&self) {
        self.level.store(None);
    }

    pub fn is_paused(&self) -> bool {
        self.level.load().is_none()
    }

    /// Stop the run loop.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    /// Drive firings until `stop()` is called or the plan is paused and
    /// never resumed. Each iteration re-reads the current level from the
    /// `ArcSwapOption` so `change_plan`/`pause` take effect without a lock
    /// on this hot path.
    pub async fn run(
        &self,
        factory: Arc<dyn CollectorFactory>,
        pool: Arc<dyn MySqlPool>,
        events: Arc<dyn EventSink>,
    ) {
        loop {
            let Some(level) = self.level.load_full() else {
                if self.cancel.is_cancelled() {
                    return;
                }
                tokio::time::sleep(std::time::Duration::from_millis(50)).await;
                continue;
            };

            let mut engine = Engine::new(self.monitor_id.clone(), (*level).clone(), events.clone());
            if let Err(err) = engine.prepare(factory.as_ref(), pool.as_ref()).await {
                tracing::error!(monitor_id = %self.monitor_id, level = %level.name, error = %err, "level_collector_prepare_failed");
                tokio::select! {
                    _ = self.cancel.cancelled() => return,
                    _ = tokio::time::sleep(level.interval) => continue,
                }
            }

            let mut ticker = tokio::time::interval(level.interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = self.cancel.cancelled() => return,
                    _ = ticker.tick() => {}
                }

                let current = self.level.load();
                match current.as_deref() {
                    Some(current_level) if current_level.name == level.name && *current_level == *level => {}
                    _ => break, // plan changed or paused; re-enter outer loop to re-prepare
                }

                let metrics = engine.collect(pool.as_ref()).await;
                if self.out_tx.try_send(metrics).is_err() {
                    tracing::warn!(monitor_id = %self.monitor_id, level = %level.name, "level_collector_backpressure_drop");
                    events
                        .emit(AgentEvent::DropMetricsFlush { monitor_id: self.monitor_id.clone(), level: level.name.clone() })
                        .await;
                }
            }
        }
    }
}
