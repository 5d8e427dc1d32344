//! Truncate-and-read counter collector: reads a performance-schema summary
//! table, then truncates it so the next firing's read reflects only the
//! interval just elapsed. When a truncate fails, the read it was meant to
//! reset for spans two intervals' worth of accumulation, and its value is
//! reinterpreted per the configured metric policy rather than reported raw.

use crate::collector::{Collector, CollectorError, CollectorHelp, CollectResult};
use crate::error_policy::TruncateErrorPolicy;
use crate::mysql::{MySqlPool, Param};
use crate::plan::{Domain, MetricType, MetricValue};
use crate::timeout::TimeoutPolicy;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::time::Duration;

const DEFAULT_TABLE: &str = "performance_schema.events_statements_summary_by_user_by_event_name";
const DEFAULT_TRUNCATE_TIMEOUT: Duration = Duration::from_secs(5);

const HELP: CollectorHelp = CollectorHelp {
    domain: "errors",
    description: "Reads a cumulative error-summary table and truncates it after each read.",
    options: &[
        ("table", "table to read/truncate (default events_statements_summary_by_user_by_event_name)"),
        ("truncate-on-start", "\"yes\" to truncate once during prepare"),
        ("truncate-timeout", "seconds bounding the TRUNCATE statement (default 5)"),
        ("metric", "\"zero\" (default) or \"drop\": how to report a read that spans two intervals"),
    ],
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum MetricPolicy {
    Zero,
    Drop,
}

/// Reads `SUM(sum_errors)` from a per-user/host summary table, truncating
/// it after every read so the next firing starts from zero.
pub struct TruncateReadCollector {
    table: String,
    truncate_on_start: bool,
    truncate_timeout: Duration,
    metric_policy: MetricPolicy,
    policy: TruncateErrorPolicy,
}

impl Default for TruncateReadCollector {
    fn default() -> Self {
        Self {
            table: DEFAULT_TABLE.to_string(),
            truncate_on_start: false,
            truncate_timeout: DEFAULT_TRUNCATE_TIMEOUT,
            metric_policy: MetricPolicy::Zero,
            policy: TruncateErrorPolicy::new(),
        }
    }
}

impl TruncateReadCollector {
    async fn truncate(&self, pool: &dyn MySqlPool) -> Result<(), CollectorError> {
        let lock_wait = self.truncate_timeout.as_secs().max(1);
        let timeout = TimeoutPolicy::new(self.truncate_timeout)
            .map_err(|err| CollectorError::fatal(format!("invalid truncate-timeout: {err}")))?;
        let table = self.table.clone();
        let outcome = timeout
            .run(async move {
                pool.execute(&format!("SET SESSION lock_wait_timeout = {lock_wait}"), &[]).await?;
                pool.execute(&format!("TRUNCATE TABLE {table}"), &[]).await
            })
            .await;
        match outcome {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(err)) => Err(CollectorError::from_pool(err)),
            Err(_elapsed) => Err(CollectorError::transient("truncate timed out")),
        }
    }

    fn metric_value(&self, value: f64) -> MetricValue {
        MetricValue {
            domain: self.domain().to_string(),
            name: "errors".into(),
            metric_type: MetricType::DeltaCounter,
            value,
            group: BTreeMap::new(),
            meta: BTreeMap::new(),
        }
    }
}

#[async_trait]
impl Collector for TruncateReadCollector {
    fn domain(&self) -> &str {
        "errors"
    }

    fn help(&self) -> CollectorHelp {
        HELP
    }

    async fn prepare(&mut self, domain: &Domain, pool: &dyn MySqlPool) -> Result<(), CollectorError> {
        if let Some(table) = domain.options.get("table") {
            self.table = table.clone();
        }
        self.truncate_on_start = domain.options.get("truncate-on-start").map(String::as_str) == Some("yes");
        if let Some(raw) = domain.options.get("truncate-timeout") {
            let secs: u64 = raw.parse().map_err(|_| CollectorError::fatal(format!("invalid truncate-timeout {raw:?}")))?;
            self.truncate_timeout = Duration::from_secs(secs.max(1));
        }
        self.metric_policy = match domain.options.get("metric").map(String::as_str) {
            None | Some("zero") => MetricPolicy::Zero,
            Some("drop") => MetricPolicy::Drop,
            Some(other) => return Err(CollectorError::fatal(format!("unknown metric policy {other:?}"))),
        };

        if self.truncate_on_start {
            if let Err(err) = self.truncate(pool).await {
                tracing::warn!(table = %self.table, error = %err, "truncate_on_start_failed");
            }
        }
        Ok(())
    }

    async fn collect(&mut self, pool: &dyn MySqlPool) -> Result<CollectResult, CollectorError> {
        if self.truncate(pool).await.is_err() {
            self.policy.record_truncate_failure();
        }

        let sql = format!("SELECT SUM(SUM_ERRORS) AS total FROM {}", self.table);
        let rows = pool.query(&sql, &[] as &[Param]).await.map_err(CollectorError::from_pool)?;
        let raw = rows.first().and_then(|row| row.get("total")).and_then(|v| v.parse::<f64>().ok()).unwrap_or(0.0);

        let spans_two_intervals = self.policy.take_reinterpret();
        let values = if spans_two_intervals {
            match self.metric_policy {
                MetricPolicy::Zero => vec![self.metric_value(0.0)],
                MetricPolicy::Drop => vec![],
            }
        } else {
            vec![self.metric_value(raw)]
        };
        Ok(CollectResult::Done(values))
    }
}
