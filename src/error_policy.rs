//! Error policy: turns a collector's failure into three independent
//! decisions — whether to surface it to the operator, whether downstream
//! still gets a metric value, and whether the collector should keep being
//! tried on future firings.
//!
//! `retry` is sticky: once a policy decides to stop, it stays stopped until
//! something re-arms it (a plan swap). This is intentionally simpler than a
//! circuit breaker's timed half-open recovery — a level plan change is the
//! only thing that should bring a permanently-failing collector back.

use std::sync::atomic::{AtomicBool, Ordering};

/// Whether this failure should be surfaced to the operator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReportDecision {
    /// Emit a status/event for this failure.
    Report,
    /// Already reported once for this ongoing failure; stay quiet.
    Suppress,
}

/// Whether a metric value should still be produced for this firing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MetricDecision {
    /// Downstream should still get a value (used by [`TruncateErrorPolicy`]
    /// when a read succeeds despite a prior truncate failure).
    Emit,
    /// No usable value exists for this firing.
    Drop,
}

/// Whether the collector should be attempted again on the next firing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RetryDecision {
    Continue,
    Stop,
}

/// The combined outcome of evaluating one failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ErrorDecision {
    pub report: ReportDecision,
    pub metric: MetricDecision,
    pub retry: RetryDecision,
}

/// Plan-configured `report` axis: whether, and how often, a failure is
/// surfaced to the operator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReportAxis {
    /// Never surface this failure.
    Ignore,
    /// Surface every occurrence.
    Report,
    /// Surface the first occurrence of an ongoing failure, then stay quiet
    /// until a success re-arms the latch.
    ReportOnce,
}

/// Plan-configured `metric` axis: what downstream should see for a firing
/// that failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MetricAxis {
    /// No value for this firing.
    Drop,
    /// Synthesize a zero-valued sample for each of the domain's declared
    /// metrics, so a downstream series stays continuous.
    Zero,
}

/// Plan-configured `retry` axis: whether the collector keeps being tried.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RetryAxis {
    Retry,
    Stop,
}

/// The three independent axes a plan can configure per error kind, parsed
/// from a comma-separated string such as `"report,zero,retry"`. Tokens may
/// appear in any order; unrecognized tokens are ignored. Any axis left
/// unspecified keeps its default (`report,drop,retry`).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PolicyConfig {
    pub report: ReportAxis,
    pub metric: MetricAxis,
    pub retry: RetryAxis,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self { report: ReportAxis::Report, metric: MetricAxis::Drop, retry: RetryAxis::Retry }
    }
}

impl PolicyConfig {
    /// Parse a policy string. Fatal collector errors always stop retry
    /// regardless of this config's `retry` axis; see [`ErrorPolicy::evaluate`].
    pub fn parse(spec: &str) -> Self {
        let mut config = Self::default();
        for token in spec.split(',').map(str::trim) {
            match token {
                "ignore" => config.report = ReportAxis::Ignore,
                "report" => config.report = ReportAxis::Report,
                "report-once" => config.report = ReportAxis::ReportOnce,
                "drop" => config.metric = MetricAxis::Drop,
                "zero" => config.metric = MetricAxis::Zero,
                "retry" => config.retry = RetryAxis::Retry,
                "stop" => config.retry = RetryAxis::Stop,
                _ => {}
            }
        }
        config
    }
}

/// Evaluates collector failures along the report/metric/retry axes.
#[derive(Debug, Default)]
pub struct ErrorPolicy {
    /// `report-once` latch: true once this ongoing failure has been reported.
    reported: AtomicBool,
    /// Sticky `retry=stop` latch.
    stopped: AtomicBool,
}

impl ErrorPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Evaluate a failure against a plan-configured [`PolicyConfig`]. `fatal`
    /// marks failures the collector itself considers unrecoverable (e.g. a
    /// permissions error that will never clear on its own) and stops retries
    /// immediately regardless of the config's `retry` axis.
    pub fn evaluate(&self, config: PolicyConfig, fatal: bool) -> ErrorDecision {
        if self.stopped.load(Ordering::Acquire) {
            return ErrorDecision {
                report: ReportDecision::Suppress,
                metric: MetricDecision::Drop,
                retry: RetryDecision::Stop,
            };
        }

        let retry = if fatal || config.retry == RetryAxis::Stop {
            self.stopped.store(true, Ordering::Release);
            RetryDecision::Stop
        } else {
            RetryDecision::Continue
        };

        let report = match config.report {
            ReportAxis::Ignore => ReportDecision::Suppress,
            ReportAxis::Report => ReportDecision::Report,
            ReportAxis::ReportOnce => {
                if self.reported.swap(true, Ordering::AcqRel) {
                    ReportDecision::Suppress
                } else {
                    ReportDecision::Report
                }
            }
        };

        let metric = match config.metric {
            MetricAxis::Drop => MetricDecision::Drop,
            MetricAxis::Zero => MetricDecision::Emit,
        };

        ErrorDecision { report, metric, retry }
    }

    /// Called on a successful firing to clear the `report-once` latch so
    /// the *next* failure is reported again.
    pub fn record_success(&self) {
        self.reported.store(false, Ordering::Release);
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }

    /// Re-arm the policy, e.g. after a plan swap brings the collector back.
    pub fn reset(&self) {
        self.reported.store(false, Ordering::Release);
        self.stopped.store(false, Ordering::Release);
    }
}

/// Specialization for truncate-and-read collectors: a failed `TRUNCATE`
/// does not itself stop the collector, but the *next* successful read
/// spans an extra interval's worth of accumulation, so that read's value
/// needs reinterpreting rather than being dropped.
#[derive(Debug, Default)]
pub struct TruncateErrorPolicy {
    inner: ErrorPolicy,
    had_prior_failure: AtomicBool,
}

impl TruncateErrorPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inner(&self) -> &ErrorPolicy {
        &self.inner
    }

    /// Record that the `TRUNCATE` step failed this firing. The read may
    /// still succeed and produce a value spanning multiple intervals.
    pub fn record_truncate_failure(&self) -> ErrorDecision {
        self.had_prior_failure.store(true, Ordering::Release);
        self.inner.evaluate(PolicyConfig::default(), false)
    }

    /// Called once a read succeeds. Returns `true` exactly once if the
    /// immediately preceding truncate failed, so the caller knows this
    /// batch's value needs to be reinterpreted rather than dropped, and
    /// clears the flag so subsequent firings are unaffected.
    pub fn take_reinterpret(&self) -> bool {
        self.inner.record_success();
        self.had_prior_failure.swap(false, Ordering::AcqRel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_transient_failure_reports_and_continues() {
        let policy = ErrorPolicy::new();
        let decision = policy.evaluate(PolicyConfig::default(), false);
        assert_eq!(decision.report, ReportDecision::Report);
        assert_eq!(decision.retry, RetryDecision::Continue);
        assert_eq!(decision.metric, MetricDecision::Drop);
    }

    #[test]
    fn repeated_transient_failure_with_report_once_suppresses_report() {
        let config = PolicyConfig::parse("report-once,drop,retry");
        let policy = ErrorPolicy::new();
        policy.evaluate(config, false);
        let second = policy.evaluate(config, false);
        assert_eq!(second.report, ReportDecision::Suppress);
        assert_eq!(second.retry, RetryDecision::Continue);
    }

    #[test]
    fn plain_report_axis_reports_every_time() {
        let config = PolicyConfig::parse("report,drop,retry");
        let policy = ErrorPolicy::new();
        policy.evaluate(config, false);
        let second = policy.evaluate(config, false);
        assert_eq!(second.report, ReportDecision::Report);
    }

    #[test]
    fn ignore_axis_never_reports() {
        let config = PolicyConfig::parse("ignore,drop,retry");
        let policy = ErrorPolicy::new();
        let decision = policy.evaluate(config, false);
        assert_eq!(decision.report, ReportDecision::Suppress);
    }

    #[test]
    fn metric_zero_axis_emits_instead_of_dropping() {
        let config = PolicyConfig::parse("report,zero,retry");
        let policy = ErrorPolicy::new();
        let decision = policy.evaluate(config, false);
        assert_eq!(decision.metric, MetricDecision::Emit);
    }

    #[test]
    fn unspecified_default_policy_is_report_drop_retry() {
        assert_eq!(PolicyConfig::parse(""), PolicyConfig::default());
        assert_eq!(PolicyConfig::parse("bogus,tokens"), PolicyConfig::default());
    }

    #[test]
    fn policy_string_tokens_are_order_independent() {
        assert_eq!(PolicyConfig::parse("zero,stop,ignore"), PolicyConfig::parse("ignore,zero,stop"));
    }

    #[test]
    fn success_rearms_report_once() {
        let config = PolicyConfig::parse("report-once,drop,retry");
        let policy = ErrorPolicy::new();
        policy.evaluate(config, false);
        policy.record_success();
        let again = policy.evaluate(config, false);
        assert_eq!(again.report, ReportDecision::Report);
    }

    #[test]
    fn fatal_failure_sticks_and_stays_stopped() {
        let policy = ErrorPolicy::new();
        let decision = policy.evaluate(PolicyConfig::default(), true);
        assert_eq!(decision.retry, RetryDecision::Stop);
        assert!(policy.is_stopped());

        let after = policy.evaluate(PolicyConfig::default(), false);
        assert_eq!(after.retry, RetryDecision::Stop);
        assert_eq!(after.report, ReportDecision::Suppress);
    }

    #[test]
    fn retry_stop_axis_stops_even_on_a_non_fatal_error() {
        let config = PolicyConfig::parse("report,drop,stop");
        let policy = ErrorPolicy::new();
        let decision = policy.evaluate(config, false);
        assert_eq!(decision.retry, RetryDecision::Stop);
        assert!(policy.is_stopped());
    }

    #[test]
    fn reset_rearms_a_stopped_policy() {
        let policy = ErrorPolicy::new();
        policy.evaluate(PolicyConfig::default(), true);
        assert!(policy.is_stopped());
        policy.reset();
        assert!(!policy.is_stopped());
        let decision = policy.evaluate(PolicyConfig::default(), false);
        assert_eq!(decision.report, ReportDecision::Report);
    }

    #[test]
    fn truncate_policy_flags_reinterpret_exactly_once() {
        let policy = TruncateErrorPolicy::new();
        policy.record_truncate_failure();
        assert!(policy.take_reinterpret());
        assert!(!policy.take_reinterpret());
    }

    #[test]
    fn truncate_policy_without_failure_does_not_reinterpret() {
        let policy = TruncateErrorPolicy::new();
        assert!(!policy.take_reinterpret());
    }
}
