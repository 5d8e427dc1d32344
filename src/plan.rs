//! Data model shared by every component: the plan document, the metric
//! batch produced by a collector firing, and the options each level and
//! domain carry.

use std::collections::BTreeMap;
use std::time::Duration;

/// A complete collection plan for one monitor: an ordered set of levels,
/// each with its own interval and set of domains to collect.
#[derive(Clone, Debug, Default, serde::Serialize, serde::Deserialize, PartialEq)]
pub struct Plan {
    pub name: String,
    pub levels: Vec<Level>,
}

impl Plan {
    pub fn level(&self, name: &str) -> Option<&Level> {
        self.levels.iter().find(|l| l.name == name)
    }
}

/// One tier of the plan: a firing interval, its own EMR bound, and the set
/// of domains collected on each firing.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize, PartialEq)]
pub struct Level {
    pub name: String,
    /// How often this level fires.
    #[serde(with = "duration_secs")]
    pub interval: Duration,
    /// Engine Max Runtime: the deadline for *all* domains in this level to
    /// finish one firing. Defaults to `interval` when unset, matching the
    /// principle that a level should never still be running when its next
    /// firing is due.
    #[serde(default, with = "opt_duration_secs")]
    pub emr: Option<Duration>,
    pub domains: Vec<Domain>,
}

impl Level {
    /// Engine Max Runtime resolved to a concrete deadline.
    pub fn effective_emr(&self) -> Duration {
        self.emr.unwrap_or(self.interval)
    }
}

/// One collector's configuration within a level.
#[derive(Clone, Debug, Default, serde::Serialize, serde::Deserialize, PartialEq)]
pub struct Domain {
    pub name: String,
    /// Collector Max Runtime: per-domain deadline, must be <= the level's EMR.
    #[serde(default, with = "opt_duration_secs")]
    pub cmr: Option<Duration>,
    #[serde(default)]
    pub options: BTreeMap<String, String>,
    /// Metric names this domain is expected to produce. Consulted when an
    /// error policy's metric axis is `zero`: one zero-valued sample is
    /// synthesized per entry so a downstream series stays continuous.
    #[serde(default)]
    pub metrics: Vec<String>,
    /// Error kind -> policy string (`"<report>,<metric>,<retry>"`), e.g.
    /// `{"access-denied": "report,drop,stop"}`. A kind with no entry here
    /// falls back to the default policy.
    #[serde(default)]
    pub errors: BTreeMap<String, String>,
}

impl Domain {
    /// Resolve this domain's Collector Max Runtime, capped by the level's
    /// own Engine Max Runtime (a domain can never outlive its level).
    pub fn effective_cmr(&self, level_emr: Duration) -> Duration {
        match self.cmr {
            Some(cmr) if cmr <= level_emr => cmr,
            _ => level_emr,
        }
    }
}

/// The kind of value a metric carries; mirrors Prometheus' own metric
/// model since that is the most constrained of the sink backends.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[non_exhaustive]
pub enum MetricType {
    /// A value that can go up or down.
    Gauge,
    /// Monotonically increasing raw counter as read from the source.
    CumulativeCounter,
    /// A counter transformed by Delta into a per-interval rate-ready value.
    DeltaCounter,
    /// A value that is always exactly 0 or 1.
    Bool,
    /// A one-off occurrence rather than a sampled value (e.g. a restart).
    Event,
    /// The collector could not determine a more specific type.
    Unknown,
}

/// A single observed value within a batch.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct MetricValue {
    pub domain: String,
    pub name: String,
    pub metric_type: MetricType,
    pub value: f64,
    /// Label values, e.g. `{"user": "app"}`. A `BTreeMap` keeps iteration
    /// order stable so it can double as Delta's cache identity key without
    /// an extra sort step.
    #[serde(default)]
    pub group: BTreeMap<String, String>,
    #[serde(default)]
    pub meta: BTreeMap<String, String>,
}

/// The complete result of one level firing: every metric collected across
/// every domain in that level, plus the firing's sequence number.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Metrics {
    pub monitor_id: String,
    pub level: String,
    /// Monotonically increasing per `(monitor_id, level)`, assigned by the
    /// Engine — never by a collector.
    pub interval: u64,
    /// Wall-clock time this firing started, as a duration since the Unix
    /// epoch. Always `<= end`.
    #[serde(default, with = "duration_secs")]
    pub begin: Duration,
    /// Wall-clock time this firing's batch was finalized.
    #[serde(default, with = "duration_secs")]
    pub end: Duration,
    pub values: Vec<MetricValue>,
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        d.as_secs_f64().serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(d)?;
        Ok(Duration::from_secs_f64(secs))
    }
}

mod opt_duration_secs {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        d.map(|d| d.as_secs_f64()).serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        let secs: Option<f64> = Option::deserialize(d)?;
        Ok(secs.map(Duration::from_secs_f64))
    }
}

impl Default for Level {
    fn default() -> Self {
        Self { name: String::new(), interval: Duration::from_secs(1), emr: None, domains: Vec::new() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_falls_back_to_interval_for_emr() {
        let level = Level { interval: Duration::from_secs(5), emr: None, ..Level::default() };
        assert_eq!(level.effective_emr(), Duration::from_secs(5));
    }

    #[test]
    fn domain_cmr_is_capped_by_level_emr() {
        let domain = Domain { name: "status".into(), cmr: Some(Duration::from_secs(30)), ..Domain::default() };
        assert_eq!(domain.effective_cmr(Duration::from_secs(5)), Duration::from_secs(5));
    }

    #[test]
    fn domain_cmr_within_bound_is_respected() {
        let domain = Domain { name: "status".into(), cmr: Some(Duration::from_millis(500)), ..Domain::default() };
        assert_eq!(domain.effective_cmr(Duration::from_secs(5)), Duration::from_millis(500));
    }

    #[test]
    fn plan_round_trips_through_yaml() {
        let plan = Plan {
            name: "default".into(),
            levels: vec![Level {
                name: "fast".into(),
                interval: Duration::from_secs(1),
                emr: Some(Duration::from_millis(900)),
                domains: vec![Domain {
                    name: "status".into(),
                    cmr: None,
                    options: BTreeMap::from([("table".into(), "global_status".into())]),
                    metrics: vec!["threads_running".into()],
                    errors: BTreeMap::from([("access-denied".into(), "report,drop,stop".into())]),
                }],
            }],
        };
        let text = serde_yaml::to_string(&plan).unwrap();
        let back: Plan = serde_yaml::from_str(&text).unwrap();
        assert_eq!(plan, back);
    }
}
