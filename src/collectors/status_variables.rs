//! Status/Variables collector: reads `performance_schema.global_status` (or
//! `global_variables`) and turns each row into a [`MetricValue`], parsing
//! MySQL's loose textual value encoding along the way.

use crate::collector::{Collector, CollectorError, CollectorHelp, CollectResult};
use crate::mysql::{MySqlPool, Param};
use crate::plan::{Domain, MetricType, MetricValue};
use async_trait::async_trait;
use std::collections::BTreeMap;

const HELP: CollectorHelp = CollectorHelp {
    domain: "status",
    description: "Reads performance_schema.global_status or global_variables, filtered by name.",
    options: &[
        ("table", "\"status\" (default) or \"variables\""),
        ("metrics", "comma-separated list of variable names to collect"),
        ("all", "\"yes\" to collect every row instead of a fixed list"),
    ],
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Table {
    Status,
    Variables,
}

impl Table {
    fn metric_type(self) -> MetricType {
        match self {
            // Status counters are near-universally monotonic (Questions,
            // Bytes_sent, ...); rare gauge-like entries (Threads_connected)
            // still pass through Delta's bootstrap-suppression harmlessly.
            Table::Status => MetricType::CumulativeCounter,
            Table::Variables => MetricType::Gauge,
        }
    }

    fn source_table(self) -> &'static str {
        match self {
            Table::Status => "performance_schema.global_status",
            Table::Variables => "performance_schema.global_variables",
        }
    }
}

/// Collects `global_status`/`global_variables` rows, one [`MetricValue`]
/// per parseable row.
pub struct StatusVariablesCollector {
    table: Table,
    metrics: Option<Vec<String>>,
}

impl Default for StatusVariablesCollector {
    fn default() -> Self {
        Self { table: Table::Status, metrics: None }
    }
}

#[async_trait]
impl Collector for StatusVariablesCollector {
    fn domain(&self) -> &str {
        "status"
    }

    fn help(&self) -> CollectorHelp {
        HELP
    }

    async fn prepare(&mut self, domain: &Domain, _pool: &dyn MySqlPool) -> Result<(), CollectorError> {
        self.table = match domain.options.get("table").map(String::as_str) {
            None | Some("status") => Table::Status,
            Some("variables") => Table::Variables,
            Some(other) => return Err(CollectorError::fatal(format!("unknown table option {other:?}"))),
        };

        let all = domain.options.get("all").map(String::as_str) == Some("yes");
        self.metrics = if all {
            None
        } else {
            match domain.options.get("metrics") {
                Some(list) => Some(list.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect()),
                None => return Err(CollectorError::fatal("domain requires either \"metrics\" or \"all\" = \"yes\"")),
            }
        };
        Ok(())
    }

    async fn collect(&mut self, pool: &dyn MySqlPool) -> Result<CollectResult, CollectorError> {
        let sql = match &self.metrics {
            None => format!("SELECT VARIABLE_NAME, VARIABLE_VALUE FROM {}", self.table.source_table()),
            Some(names) => {
                let placeholders = names.iter().map(|_| "?").collect::<Vec<_>>().join(", ");
                format!(
                    "SELECT VARIABLE_NAME, VARIABLE_VALUE FROM {} WHERE VARIABLE_NAME IN ({placeholders})",
                    self.table.source_table()
                )
            }
        };
        let params: Vec<Param> = self.metrics.iter().flatten().map(|name| Param::Str(name.clone())).collect();

        let rows = pool.query(&sql, &params).await.map_err(CollectorError::from_pool)?;

        let mut values = Vec::with_capacity(rows.len());
        for row in rows {
            let Some(name) = row.get("VARIABLE_NAME") else { continue };
            let Some(raw) = row.get("VARIABLE_VALUE") else { continue };
            match parse_value(raw) {
                Some(parsed) => values.push(MetricValue {
                    domain: self.domain().to_string(),
                    name: name.to_ascii_lowercase(),
                    metric_type: if parsed.is_bool { MetricType::Bool } else { self.table.metric_type() },
                    value: parsed.value,
                    group: BTreeMap::new(),
                    meta: BTreeMap::new(),
                }),
                None => tracing::trace!(variable = name, raw, "status_variables_unparseable_value"),
            }
        }
        Ok(CollectResult::Done(values))
    }
}

/// A value parsed from MySQL's loose textual encoding, tagged with whether
/// it came from a boolean-ish token (`ON`/`OFF`/...) rather than a number,
/// duration, or timestamp — the collector types those as [`MetricType::Bool`]
/// regardless of which table they were read from.
struct ParsedValue {
    value: f64,
    is_bool: bool,
}

/// Parses one `global_status`/`global_variables` value according to its
/// observed encoding: boolean-ish tokens, a bare number, `HH:MM:SS`
/// duration, or an RFC3339 timestamp. Anything else is unparseable.
fn parse_value(raw: &str) -> Option<ParsedValue> {
    match raw.to_ascii_uppercase().as_str() {
        "ON" | "YES" => return Some(ParsedValue { value: 1.0, is_bool: true }),
        "OFF" | "NO" | "DISABLED" => return Some(ParsedValue { value: 0.0, is_bool: true }),
        _ => {}
    }
    if let Ok(value) = raw.parse::<f64>() {
        return Some(ParsedValue { value, is_bool: false });
    }
    if let Some(seconds) = parse_hms(raw) {
        return Some(ParsedValue { value: seconds, is_bool: false });
    }
    if let Ok(ts) = chrono::DateTime::parse_from_rfc3339(raw) {
        return Some(ParsedValue { value: ts.timestamp() as f64, is_bool: false });
    }
    None
}

fn parse_hms(raw: &str) -> Option<f64> {
    let mut parts = raw.splitn(3, ':');
    let h: f64 = parts.next()?.parse().ok()?;
    let m: f64 = parts.next()?.parse().ok()?;
    let s: f64 = parts.next()?.parse().ok()?;
    if parts.next().is_some() {
        return None;
    }
    Some(h * 3600.0 + m * 60.0 + s)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mysql::test_support::FakePool;
    use crate::mysql::Row;

    fn row(name: &str, value: &str) -> Row {
        let mut row = Row::default();
        row.columns.insert("VARIABLE_NAME".into(), Some(name.into()));
        row.columns.insert("VARIABLE_VALUE".into(), Some(value.into()));
        row
    }

    fn domain(options: &[(&str, &str)]) -> Domain {
        Domain {
            name: "status".into(),
            options: options.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
            ..Domain::default()
        }
    }

    #[test]
    fn parses_boolean_tokens() {
        assert_eq!(parse_value("ON").map(|p| (p.value, p.is_bool)), Some((1.0, true)));
        assert_eq!(parse_value("off").map(|p| (p.value, p.is_bool)), Some((0.0, true)));
        assert_eq!(parse_value("DISABLED").map(|p| (p.value, p.is_bool)), Some((0.0, true)));
    }

    #[test]
    fn parses_numeric_literal() {
        assert_eq!(parse_value("12345").map(|p| p.value), Some(12345.0));
        assert_eq!(parse_value("3.14").map(|p| p.value), Some(3.14));
        assert!(!parse_value("12345").unwrap().is_bool);
    }

    #[test]
    fn parses_hms_duration() {
        assert_eq!(parse_value("01:02:03").map(|p| p.value), Some(3723.0));
    }

    #[test]
    fn parses_rfc3339_timestamp() {
        let value = parse_value("2024-01-01T00:00:00Z").unwrap().value;
        assert!(value > 0.0);
    }

    #[test]
    fn unparseable_value_is_skipped() {
        assert!(parse_value("not-a-value").is_none());
    }

    #[tokio::test]
    async fn collect_emits_one_metric_per_row() {
        let mut collector = StatusVariablesCollector::default();
        let d = domain(&[("metrics", "Questions,Uptime")]);
        let pool = FakePool::default();
        collector.prepare(&d, &pool).await.unwrap();

        pool.push_query(Ok(vec![row("Questions", "42"), row("Uptime", "100")]));
        let result = collector.collect(&pool).await.unwrap();
        let CollectResult::Done(values) = result else { panic!("expected Done") };
        assert_eq!(values.len(), 2);
        assert!(values.iter().all(|v| v.metric_type == MetricType::CumulativeCounter));
    }

    #[tokio::test]
    async fn collect_lowercases_metric_names() {
        let mut collector = StatusVariablesCollector::default();
        let d = domain(&[("metrics", "Threads_running")]);
        let pool = FakePool::default();
        collector.prepare(&d, &pool).await.unwrap();

        pool.push_query(Ok(vec![row("Threads_running", "3")]));
        let result = collector.collect(&pool).await.unwrap();
        let CollectResult::Done(values) = result else { panic!("expected Done") };
        assert_eq!(values[0].name, "threads_running");
    }

    #[tokio::test]
    async fn boolean_token_is_typed_as_bool_regardless_of_table() {
        let mut collector = StatusVariablesCollector::default();
        let d = domain(&[("metrics", "Innodb_deadlock_detect")]);
        let pool = FakePool::default();
        collector.prepare(&d, &pool).await.unwrap();

        pool.push_query(Ok(vec![row("Innodb_deadlock_detect", "ON")]));
        let result = collector.collect(&pool).await.unwrap();
        let CollectResult::Done(values) = result else { panic!("expected Done") };
        assert_eq!(values[0].metric_type, MetricType::Bool);
        assert_eq!(values[0].value, 1.0);
    }

    #[tokio::test]
    async fn variables_table_uses_gauge_type() {
        let mut collector = StatusVariablesCollector::default();
        let d = domain(&[("table", "variables"), ("all", "yes")]);
        let pool = FakePool::default();
        collector.prepare(&d, &pool).await.unwrap();

        pool.push_query(Ok(vec![row("max_connections", "151")]));
        let result = collector.collect(&pool).await.unwrap();
        let CollectResult::Done(values) = result else { panic!("expected Done") };
        assert_eq!(values[0].metric_type, MetricType::Gauge);
    }

    #[tokio::test]
    async fn prepare_rejects_missing_metrics_selector() {
        let mut collector = StatusVariablesCollector::default();
        let d = domain(&[]);
        let pool = FakePool::default();
        assert!(collector.prepare(&d, &pool).await.is_err());
    }
}
