//! Plan loading: parses the on-disk plan document, interpolates `${VAR}`
//! environment references into every option value, then resolves it against
//! a [`CollectorFactory`] into a [`Plan`] the engine can run. Mirrors the
//! teacher's `DynConfig` -> `Config` two-stage resolution: the raw,
//! string-typed document is parsed first, then checked and converted into
//! the typed shape every other component consumes.

use crate::collector::CollectorFactory;
use crate::plan::{Domain, Level, Plan};
use regex::Regex;
use std::collections::BTreeMap;
use std::time::Duration;

/// Plan document as parsed from YAML, before interpolation or validation.
/// Durations are plain strings here (`"5s"`, `"1m30s"`) since `humantime`
/// only knows how to parse them, not deserialize them directly from YAML
/// scalars of mixed type.
#[derive(Clone, Debug, serde::Deserialize)]
pub struct RawPlan {
    pub name: String,
    pub levels: Vec<RawLevel>,
}

#[derive(Clone, Debug, serde::Deserialize)]
pub struct RawLevel {
    pub name: String,
    pub freq: String,
    #[serde(default)]
    pub emr: Option<String>,
    pub collect: BTreeMap<String, RawDomain>,
}

#[derive(Clone, Debug, Default, serde::Deserialize)]
pub struct RawDomain {
    #[serde(default)]
    pub cmr: Option<String>,
    #[serde(default)]
    pub options: BTreeMap<String, String>,
    #[serde(default)]
    pub metrics: Vec<String>,
    #[serde(default)]
    pub errors: BTreeMap<String, String>,
}

/// Everything that can go wrong resolving a [`RawPlan`] into a [`Plan`].
/// Each variant carries enough context (level/domain names) to point at the
/// offending stanza without needing a line number.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum PlanError {
    #[error("level {level:?}: freq {raw:?} is not a valid duration: {source}")]
    InvalidFreq { level: String, raw: String, #[source] source: humantime::DurationError },
    #[error("level {level:?}: freq {freq:?} must be positive")]
    NonPositiveFreq { level: String, freq: Duration },
    #[error("level {level:?}: emr {raw:?} is not a valid duration: {source}")]
    InvalidEmr { level: String, raw: String, #[source] source: humantime::DurationError },
    #[error("level {level:?} domain {domain:?}: cmr {raw:?} is not a valid duration: {source}")]
    InvalidCmr { level: String, domain: String, raw: String, #[source] source: humantime::DurationError },
    #[error("duplicate freq {freq:?} shared by levels {first:?} and {second:?}")]
    DuplicateFreq { freq: Duration, first: String, second: String },
    #[error("level {level:?} domain {domain:?}: metric name {name:?} must match ^[A-Za-z0-9_-]*$")]
    InvalidMetricName { level: String, domain: String, name: String },
    #[error("level {level:?} domain {domain:?}: no collector registered for this domain")]
    UnknownDomain { level: String, domain: String },
    #[error("level {level:?} domain {domain:?}: unknown option {option:?} (accepts: {accepted})")]
    UnknownOption { level: String, domain: String, option: String, accepted: String },
    #[error("option value {raw:?} references undefined environment variable {var:?}")]
    MissingEnvVar { raw: String, var: String },
}

fn env_ref_pattern() -> Regex {
    Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("static pattern is valid")
}

/// Substitute every `${VAR}` reference in `value` with the named
/// environment variable, failing closed if any reference is undefined.
fn interpolate(value: &str, pattern: &Regex) -> Result<String, PlanError> {
    if !pattern.is_match(value) {
        return Ok(value.to_string());
    }
    let mut missing: Option<String> = None;
    let substituted = pattern.replace_all(value, |caps: &regex::Captures| {
        let var = &caps[1];
        match std::env::var(var) {
            Ok(v) => v,
            Err(_) => {
                if missing.is_none() {
                    missing = Some(var.to_string());
                }
                String::new()
            }
        }
    });
    match missing {
        Some(var) => Err(PlanError::MissingEnvVar { raw: value.to_string(), var }),
        None => Ok(substituted.into_owned()),
    }
}

fn metric_name_pattern() -> Regex {
    Regex::new(r"^[A-Za-z0-9_-]*$").expect("static pattern is valid")
}

/// Resolve a freshly parsed [`RawPlan`] into a runnable [`Plan`], validating
/// every level and domain against `factory`'s registered collectors.
pub fn resolve(raw: RawPlan, factory: &dyn CollectorFactory) -> Result<Plan, PlanError> {
    let env_pattern = env_ref_pattern();
    let metric_pattern = metric_name_pattern();
    let mut seen_freqs: Vec<(Duration, String)> = Vec::new();
    let mut levels = Vec::with_capacity(raw.levels.len());

    for raw_level in raw.levels {
        let interval = humantime::parse_duration(&raw_level.freq)
            .map_err(|source| PlanError::InvalidFreq { level: raw_level.name.clone(), raw: raw_level.freq.clone(), source })?;
        if interval.is_zero() {
            return Err(PlanError::NonPositiveFreq { level: raw_level.name.clone(), freq: interval });
        }
        if let Some((_, first)) = seen_freqs.iter().find(|(freq, _)| *freq == interval) {
            return Err(PlanError::DuplicateFreq { freq: interval, first: first.clone(), second: raw_level.name.clone() });
        }
        seen_freqs.push((interval, raw_level.name.clone()));

        let emr = raw_level
            .emr
            .map(|raw| humantime::parse_duration(&raw).map_err(|source| PlanError::InvalidEmr { level: raw_level.name.clone(), raw, source }))
            .transpose()?;

        let mut domains = Vec::with_capacity(raw_level.collect.len());
        for (domain_name, raw_domain) in raw_level.collect {
            let collector = factory
                .create(&domain_name)
                .ok_or_else(|| PlanError::UnknownDomain { level: raw_level.name.clone(), domain: domain_name.clone() })?;
            let help = collector.help();
            let allowed: std::collections::HashSet<&str> = help.options.iter().map(|(k, _)| *k).collect();

            let mut options = BTreeMap::new();
            for (key, raw_value) in raw_domain.options {
                if !allowed.contains(key.as_str()) {
                    let accepted = help.options.iter().map(|(k, _)| *k).collect::<Vec<_>>().join(", ");
                    return Err(PlanError::UnknownOption { level: raw_level.name.clone(), domain: domain_name.clone(), option: key, accepted });
                }
                options.insert(key, interpolate(&raw_value, &env_pattern)?);
            }

            for name in &raw_domain.metrics {
                if !metric_pattern.is_match(name) {
                    return Err(PlanError::InvalidMetricName { level: raw_level.name.clone(), domain: domain_name.clone(), name: name.clone() });
                }
            }

            let cmr = raw_domain
                .cmr
                .map(|raw| {
                    humantime::parse_duration(&raw)
                        .map_err(|source| PlanError::InvalidCmr { level: raw_level.name.clone(), domain: domain_name.clone(), raw, source })
                })
                .transpose()?;

            domains.push(Domain { name: domain_name, cmr, options, metrics: raw_domain.metrics, errors: raw_domain.errors });
        }

        levels.push(Level { name: raw_level.name, interval, emr, domains });
    }

    Ok(Plan { name: raw.name, levels })
}

/// Parse a plan document from YAML text and resolve it in one step.
pub fn load(yaml: &str, factory: &dyn CollectorFactory) -> Result<Plan, PlanLoadError> {
    let raw: RawPlan = serde_yaml::from_str(yaml).map_err(PlanLoadError::Parse)?;
    resolve(raw, factory).map_err(PlanLoadError::Resolve)
}

/// Top-level error from [`load`]: either the document didn't parse as YAML,
/// or it parsed but failed resolution/validation.
#[derive(Debug, thiserror::Error)]
pub enum PlanLoadError {
    #[error("plan document is not valid YAML: {0}")]
    Parse(#[source] serde_yaml::Error),
    #[error(transparent)]
    Resolve(#[from] PlanError),
}
