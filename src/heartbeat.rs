//! Heartbeat: an independent row this agent upserts on a schedule (the
//! Writer), a reader that picks the current replication source's row among
//! candidates (the Reader), and a small pure calculator that turns
//! observed lag into how long to sleep before checking again (the Waiter).

use crate::event::{AgentEvent, EventSink};
use crate::mysql::{MySqlPool, Param, PoolError};
use crate::status::StatusRegistry;
use crate::timeout::TimeoutPolicy;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub const DEFAULT_WRITE_INTERVAL: Duration = Duration::from_secs(1);
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_READ_ONLY_WAIT: Duration = Duration::from_secs(20);
pub const DEFAULT_INIT_ERROR_WAIT: Duration = Duration::from_secs(10);

/// Upserts this monitor's heartbeat row on every tick. Never gives up: a
/// write failure is reported and slept through, never fatal.
pub struct HeartbeatWriter {
    monitor_id: String,
    pool: Arc<dyn MySqlPool>,
    events: Arc<dyn EventSink>,
    status: Arc<StatusRegistry>,
    write_interval: Duration,
    write_timeout: Duration,
    read_only_wait: Duration,
    init_error_wait: Duration,
    cancel: CancellationToken,
}

impl HeartbeatWriter {
    pub fn new(monitor_id: impl Into<String>, pool: Arc<dyn MySqlPool>, events: Arc<dyn EventSink>, status: Arc<StatusRegistry>) -> Self {
        Self {
            monitor_id: monitor_id.into(),
            pool,
            events,
            status,
            write_interval: DEFAULT_WRITE_INTERVAL,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
            read_only_wait: DEFAULT_READ_ONLY_WAIT,
            init_error_wait: DEFAULT_INIT_ERROR_WAIT,
            cancel: CancellationToken::new(),
        }
    }

    pub fn stop(&self) {
        self.cancel.cancel();
    }

    /// Upsert the heartbeat row once. Exposed separately from [`Self::run`]
    /// so tests and the waiter can drive a single write deterministically.
    pub async fn write_once(&self) -> Result<(), PoolError> {
        let timeout = TimeoutPolicy::new(self.write_timeout).unwrap_or_else(|_| {
            TimeoutPolicy::new(DEFAULT_WRITE_TIMEOUT).expect("default write timeout is valid")
        });
        let pool = self.pool.clone();
        let monitor_id = self.monitor_id.clone();
        let outcome = timeout
            .run(async move {
                pool.execute(
                    "INSERT INTO heartbeat (monitor_id, ts) VALUES (?, NOW(6)) \
                     ON DUPLICATE KEY UPDATE ts = VALUES(ts)",
                    &[Param::Str(monitor_id)],
                )
                .await
            })
            .await;

        match outcome {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(err)) => Err(err),
            Err(_elapsed) => Err(PoolError::DeadlineExceeded),
        }
    }

    /// Run until stopped, upserting on `write_interval` and sleeping
    /// through failures according to their apparent cause.
    pub async fn run(&self) {
        let mut ticker = tokio::time::interval(self.write_interval);
        let mut has_succeeded_once = false;
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => return,
                _ = ticker.tick() => {}
            }

            match self.write_once().await {
                Ok(()) => {
                    has_succeeded_once = true;
                    self.status.remove(&self.monitor_id, "heartbeat");
                }
                Err(err) => {
                    self.status.set(&self.monitor_id, "heartbeat", err.to_string());
                    self.events
                        .emit(AgentEvent::HeartbeatWriteError { monitor_id: self.monitor_id.clone(), message: err.to_string() })
                        .await;
                    let wait = if matches!(err, PoolError::AccessDenied(_)) && !has_succeeded_once {
                        self.init_error_wait
                    } else {
                        self.read_only_wait
                    };
                    tokio::select! {
                        _ = self.cancel.cancelled() => return,
                        _ = tokio::time::sleep(wait) => {}
                    }
                }
            }
        }
    }
}

/// One row a reader might consider as the current replication source.
#[derive(Clone, Debug, PartialEq)]
pub struct SourceCandidate {
    pub src_id: String,
    pub src_role: SourceRole,
    pub ts: Duration,
    /// This source's expected heartbeat update interval.
    pub freq: Duration,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SourceRole {
    Primary,
    Replica,
}

/// Observed replication lag for the currently selected source. `milliseconds`
/// is `-1` when there is no heartbeat to read or the monitored server isn't
/// a replica at all — never a real negative lag.
#[derive(Clone, Debug, PartialEq)]
pub struct Lag {
    pub milliseconds: i64,
    pub last_ts: Duration,
    pub freq: Duration,
    pub source_id: String,
    pub source_role: SourceRole,
    pub is_replica: bool,
}

impl Lag {
    fn not_replicating() -> Self {
        Self {
            milliseconds: -1,
            last_ts: Duration::ZERO,
            freq: Duration::ZERO,
            source_id: String::new(),
            source_role: SourceRole::Replica,
            is_replica: false,
        }
    }
}

/// Picks the current replication source among candidate heartbeat rows:
/// prefer a `Primary` row; among equal roles, the most recent `ts` wins.
pub struct HeartbeatReader {
    monitor_id: String,
    events: Arc<dyn EventSink>,
    current: std::sync::Mutex<Option<String>>,
}

impl HeartbeatReader {
    pub fn new(monitor_id: impl Into<String>, events: Arc<dyn EventSink>) -> Self {
        Self { monitor_id: monitor_id.into(), events, current: std::sync::Mutex::new(None) }
    }

    fn select(candidates: &[SourceCandidate]) -> Option<&SourceCandidate> {
        candidates
            .iter()
            .max_by(|a, b| {
                let role_rank = |r: SourceRole| matches!(r, SourceRole::Primary) as u8;
                (role_rank(a.src_role), a.ts).cmp(&(role_rank(b.src_role), b.ts))
            })
    }

    /// Evaluate one set of candidate rows against `now`, emitting
    /// `repl-source-change` if the winner differs from the previous call's
    /// winner. `repl_check_var` is this server's already-read replication
    /// health flag (e.g. `@@read_only`); when false, the server isn't
    /// replicating and lag is reported as the `-1` sentinel regardless of
    /// any candidate rows.
    pub async fn observe(&self, now: Duration, candidates: &[SourceCandidate], repl_check_var: bool) -> Lag {
        let Some(winner) = Self::select(candidates).cloned() else {
            return Lag::not_replicating();
        };

        let mut current = self.current.lock().unwrap_or_else(|p| p.into_inner());
        if current.as_deref() != Some(winner.src_id.as_str()) {
            let old = current.clone();
            *current = Some(winner.src_id.clone());
            drop(current);
            self.events
                .emit(AgentEvent::ReplSourceChange {
                    monitor_id: self.monitor_id.clone(),
                    old_src_id: old,
                    new_src_id: winner.src_id.clone(),
                })
                .await;
        } else {
            drop(current);
        }

        if !repl_check_var {
            return Lag {
                milliseconds: -1,
                last_ts: winner.ts,
                freq: winner.freq,
                source_id: winner.src_id,
                source_role: winner.src_role,
                is_replica: false,
            };
        }

        let milliseconds = now.saturating_sub(winner.ts).as_millis() as i64;
        Lag { milliseconds, last_ts: winner.ts, freq: winner.freq, source_id: winner.src_id, source_role: winner.src_role, is_replica: true }
    }
}

/// One [`Waiter`] evaluation: the lag it computed and how long to sleep
/// before checking again.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WaitOutcome {
    pub lag: Duration,
    pub sleep: Duration,
}

/// Turns observed replication lag into a sleep duration. Two branches:
/// - **fresh** (`now < last + freq`): the heartbeat is still within its
///   expected update window. Lag is how far `now` has drifted past `last`
///   net of network latency, and the sleep is exactly long enough to reach
///   the next expected update plus latency.
/// - **late** (`now >= last + freq`): the heartbeat missed its expected
///   update. Lag is how far past due `now` is, polled on a staircase that
///   tightens as the lag shrinks back toward zero.
pub struct Waiter;

impl Waiter {
    pub fn evaluate(now: Duration, last: Duration, freq: Duration, network_latency: Duration) -> WaitOutcome {
        let due = last + freq;
        if now < due {
            let lag = now.saturating_sub(last).saturating_sub(network_latency);
            let sleep = due.saturating_sub(now) + network_latency;
            WaitOutcome { lag, sleep }
        } else {
            let lag = now - due;
            let effective = lag.saturating_sub(network_latency);
            WaitOutcome { lag, sleep: Self::staircase(effective) }
        }
    }

    fn staircase(effective: Duration) -> Duration {
        match effective.as_millis() {
            0..=199 => Duration::from_millis(50),
            200..=599 => Duration::from_millis(100),
            600..=1999 => Duration::from_millis(500),
            _ => Duration::from_millis(1000),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{MemoryEventSink, NullEventSink};
    use crate::mysql::test_support::FakePool;

    #[tokio::test]
    async fn write_once_succeeds_against_fake_pool() {
        let pool = Arc::new(FakePool::default());
        pool.push_execute(Ok(1));
        let writer = HeartbeatWriter::new("m1", pool, Arc::new(NullEventSink), Arc::new(StatusRegistry::new()));
        assert!(writer.write_once().await.is_ok());
    }

    #[tokio::test]
    async fn write_once_surfaces_pool_error() {
        let pool = Arc::new(FakePool::default());
        pool.push_execute(Err(PoolError::Connection("refused".into())));
        let writer = HeartbeatWriter::new("m1", pool, Arc::new(NullEventSink), Arc::new(StatusRegistry::new()));
        assert!(writer.write_once().await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn run_reports_status_and_clears_on_recovery() {
        let pool = Arc::new(FakePool::default());
        // Consumption order is LIFO relative to push order: first tick pops
        // the error, second tick pops the success.
        pool.push_execute(Ok(1));
        pool.push_execute(Err(PoolError::Connection("refused".into())));
        let status = Arc::new(StatusRegistry::new());
        let mut writer = HeartbeatWriter::new("m1", pool, Arc::new(NullEventSink), status.clone());
        writer.write_interval = Duration::from_millis(10);
        writer.read_only_wait = Duration::from_millis(10);
        writer.init_error_wait = Duration::from_millis(10);

        let writer = Arc::new(writer);
        let runner = writer.clone();
        let handle = tokio::spawn(async move { runner.run().await });

        tokio::time::advance(Duration::from_millis(11)).await;
        assert!(status.get("m1", "heartbeat").is_some());

        tokio::time::advance(Duration::from_millis(11)).await;
        assert!(status.get("m1", "heartbeat").is_none());

        writer.stop();
        tokio::time::advance(Duration::from_millis(11)).await;
        let _ = handle.await;
    }

    #[tokio::test]
    async fn reader_picks_primary_over_replica() {
        let reader = HeartbeatReader::new("m1", Arc::new(NullEventSink));
        let candidates = vec![
            SourceCandidate { src_id: "replica-1".into(), src_role: SourceRole::Replica, ts: Duration::from_secs(100), freq: Duration::from_secs(1) },
            SourceCandidate { src_id: "primary-1".into(), src_role: SourceRole::Primary, ts: Duration::from_secs(10), freq: Duration::from_secs(1) },
        ];
        let lag = reader.observe(Duration::from_secs(200), &candidates, true).await;
        assert_eq!(lag.source_id, "primary-1");
        assert!(lag.is_replica);
    }

    #[tokio::test]
    async fn reader_picks_latest_ts_among_equal_role() {
        let reader = HeartbeatReader::new("m1", Arc::new(NullEventSink));
        let candidates = vec![
            SourceCandidate { src_id: "a".into(), src_role: SourceRole::Replica, ts: Duration::from_secs(5), freq: Duration::from_secs(1) },
            SourceCandidate { src_id: "b".into(), src_role: SourceRole::Replica, ts: Duration::from_secs(9), freq: Duration::from_secs(1) },
        ];
        let lag = reader.observe(Duration::from_secs(9), &candidates, true).await;
        assert_eq!(lag.source_id, "b");
    }

    #[tokio::test]
    async fn reader_emits_event_on_source_change() {
        let events = Arc::new(MemoryEventSink::new());
        let reader = HeartbeatReader::new("m1", events.clone());
        let first = vec![SourceCandidate { src_id: "a".into(), src_role: SourceRole::Primary, ts: Duration::from_secs(1), freq: Duration::from_secs(1) }];
        let second = vec![SourceCandidate { src_id: "b".into(), src_role: SourceRole::Primary, ts: Duration::from_secs(2), freq: Duration::from_secs(1) }];
        reader.observe(Duration::from_secs(1), &first, true).await;
        reader.observe(Duration::from_secs(2), &second, true).await;
        assert!(events.events().iter().any(|e| matches!(e, AgentEvent::ReplSourceChange { new_src_id, .. } if new_src_id == "b")));
    }

    #[tokio::test]
    async fn reader_reports_sentinel_lag_when_repl_check_var_is_false() {
        let reader = HeartbeatReader::new("m1", Arc::new(NullEventSink));
        let candidates = vec![SourceCandidate { src_id: "a".into(), src_role: SourceRole::Primary, ts: Duration::from_secs(1), freq: Duration::from_secs(1) }];
        let lag = reader.observe(Duration::from_secs(5), &candidates, false).await;
        assert_eq!(lag.milliseconds, -1);
        assert!(!lag.is_replica);
    }

    #[tokio::test]
    async fn reader_reports_sentinel_lag_with_no_candidates() {
        let reader = HeartbeatReader::new("m1", Arc::new(NullEventSink));
        let lag = reader.observe(Duration::from_secs(5), &[], true).await;
        assert_eq!(lag.milliseconds, -1);
        assert!(!lag.is_replica);
    }

    #[test]
    fn waiter_staircase_boundaries() {
        let last = Duration::ZERO;
        let freq = Duration::ZERO;
        let at = |ms| Waiter::evaluate(Duration::from_millis(ms), last, freq, Duration::ZERO).sleep;
        assert_eq!(at(199), Duration::from_millis(50));
        assert_eq!(at(200), Duration::from_millis(100));
        assert_eq!(at(599), Duration::from_millis(100));
        assert_eq!(at(600), Duration::from_millis(500));
        assert_eq!(at(1999), Duration::from_millis(500));
        assert_eq!(at(2000), Duration::from_millis(1000));
    }

    #[test]
    fn waiter_subtracts_network_latency_first() {
        let outcome = Waiter::evaluate(Duration::from_millis(250), Duration::ZERO, Duration::ZERO, Duration::from_millis(100));
        // effective lag = 150ms -> falls in the <200ms bucket
        assert_eq!(outcome.sleep, Duration::from_millis(50));
    }

    #[test]
    fn waiter_fresh_branch_matches_known_scenario() {
        let outcome = Waiter::evaluate(
            Duration::from_millis(1200),
            Duration::from_millis(1000),
            Duration::from_millis(1000),
            Duration::from_millis(50),
        );
        assert_eq!(outcome.lag, Duration::from_millis(150));
        assert_eq!(outcome.sleep, Duration::from_millis(850));
    }

    #[test]
    fn waiter_late_branch_matches_known_scenario() {
        let outcome = Waiter::evaluate(
            Duration::from_millis(3500),
            Duration::from_millis(1000),
            Duration::from_millis(1000),
            Duration::from_millis(50),
        );
        assert_eq!(outcome.lag, Duration::from_millis(1500));
        assert_eq!(outcome.sleep, Duration::from_millis(500));
    }
}
