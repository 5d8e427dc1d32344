//! Concrete, representative collectors. `spec.md` scopes out domain-specific
//! SQL collectors beyond one representative pair; these two cover the
//! cumulative-gauge case (Status/Variables) and the truncate-and-reset
//! cumulative-counter case (Truncate-and-read).

mod status_variables;
mod truncate_read;

pub use status_variables::StatusVariablesCollector;
pub use truncate_read::TruncateReadCollector;

use crate::collector::{Collector, CollectorFactory, CollectorRegistry};

/// A [`CollectorRegistry`] pre-populated with the two built-in collectors,
/// registered under the domain names `"status"` and `"errors"`.
pub fn builtin_registry() -> CollectorRegistry {
    let mut registry = CollectorRegistry::new();
    registry.register("status", || Box::new(StatusVariablesCollector::default()) as Box<dyn Collector>);
    registry.register("errors", || Box::new(TruncateReadCollector::default()) as Box<dyn Collector>);
    registry
}
