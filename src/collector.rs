//! The collector contract: the boundary between the engine and anything
//! that knows how to pull one domain's worth of metrics out of MySQL.

use crate::mysql::{MySqlPool, PoolError};
use crate::plan::{Domain, MetricValue};
use async_trait::async_trait;

/// Help text a collector can offer about the options it accepts, mainly so
/// plan validation errors can say something more useful than "unknown key".
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CollectorHelp {
    pub domain: &'static str,
    pub description: &'static str,
    pub options: &'static [(&'static str, &'static str)],
}

/// Outcome of one collector firing.
#[derive(Clone, Debug, PartialEq)]
pub enum CollectResult {
    /// The collector produced a final, complete batch for this firing.
    Done(Vec<MetricValue>),
    /// The collector produced a partial batch and wants to be called again
    /// immediately within the *same* firing to continue (e.g. a collector
    /// that pages through `SHOW ... WHERE`-style results). All sub-batches
    /// of one `ErrMore` sequence share the firing's `interval`.
    ErrMore(Vec<MetricValue>),
}

/// Errors a collector can return. `fatal` failures (bad config, a query
/// that references a table the user will never have permission for) stop
/// the error policy's retry axis immediately rather than after repeated
/// transient failures.
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct CollectorError {
    pub message: String,
    pub fatal: bool,
    /// Registered error kind, consulted against `Domain::errors` to pick a
    /// plan-configured policy. `None` when the collector doesn't map this
    /// failure to a kind, in which case the default policy applies.
    pub kind: Option<&'static str>,
    #[source]
    pub source: Option<PoolError>,
}

impl CollectorError {
    pub fn transient(message: impl Into<String>) -> Self {
        Self { message: message.into(), fatal: false, kind: None, source: None }
    }

    pub fn fatal(message: impl Into<String>) -> Self {
        Self { message: message.into(), fatal: true, kind: None, source: None }
    }

    pub fn from_pool(err: PoolError) -> Self {
        let fatal = err.is_fatal();
        Self { message: err.to_string(), fatal, kind: None, source: Some(err) }
    }

    /// Attach a registered error kind so the engine can look up this
    /// domain's configured policy for it.
    pub fn with_kind(mut self, kind: &'static str) -> Self {
        self.kind = Some(kind);
        self
    }
}

/// One domain's collection logic for one monitor.
#[async_trait]
pub trait Collector: Send + Sync {
    /// The domain name this collector answers for, matching `Domain::name`
    /// in the plan.
    fn domain(&self) -> &str;

    /// Static help text for plan validation / documentation.
    fn help(&self) -> CollectorHelp;

    /// Validate the domain's option map and capture anything needed for
    /// `collect`. Called once whenever the plan (re)attaches this collector.
    async fn prepare(&mut self, domain: &Domain, pool: &dyn MySqlPool) -> Result<(), CollectorError>;

    /// Produce this firing's metrics. Collectors that page through results
    /// return [`CollectResult::ErrMore`] until the final sub-batch, which
    /// must be [`CollectResult::Done`].
    async fn collect(&mut self, pool: &dyn MySqlPool) -> Result<CollectResult, CollectorError>;
}

/// Builds collectors by domain name so the engine never needs a match
/// statement over every known domain.
pub trait CollectorFactory: Send + Sync {
    fn create(&self, domain_name: &str) -> Option<Box<dyn Collector>>;
}

/// A fixed-table factory: the common case where every supported domain is
/// known at startup.
#[derive(Default)]
pub struct CollectorRegistry {
    factories: std::collections::HashMap<String, Box<dyn Fn() -> Box<dyn Collector> + Send + Sync>>,
}

impl CollectorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&mut self, domain_name: impl Into<String>, make: F)
    where
        F: Fn() -> Box<dyn Collector> + Send + Sync + 'static,
    {
        self.factories.insert(domain_name.into(), Box::new(make));
    }
}

impl CollectorFactory for CollectorRegistry {
    fn create(&self, domain_name: &str) -> Option<Box<dyn Collector>> {
        self.factories.get(domain_name).map(|make| make())
    }
}
