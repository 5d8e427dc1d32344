//! The opaque MySQL collaborator interface. The engine and collectors only
//! ever see this trait; connection pooling, credential reload, TLS, and
//! `my.cnf` parsing belong to whatever implements it, not to this crate.

use async_trait::async_trait;
use std::collections::BTreeMap;

/// A bound query parameter.
#[derive(Clone, Debug, PartialEq)]
pub enum Param {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Null,
}

/// One returned row, column name to textual/typed value. Collectors are
/// expected to know the shape of the tables they query; this stays a loose
/// map rather than a generated-per-query struct.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Row {
    pub columns: BTreeMap<String, Option<String>>,
}

impl Row {
    pub fn get(&self, column: &str) -> Option<&str> {
        self.columns.get(column).and_then(|v| v.as_deref())
    }
}

/// Errors returned by the MySQL collaborator.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum PoolError {
    #[error("connection error: {0}")]
    Connection(String),
    #[error("query error: {0}")]
    Query(String),
    #[error("access denied: {0}")]
    AccessDenied(String),
    #[error("deadline exceeded")]
    DeadlineExceeded,
}

impl PoolError {
    /// Whether this failure is permanent for the life of the monitor
    /// (access denied will not clear itself without operator action).
    pub fn is_fatal(&self) -> bool {
        matches!(self, PoolError::AccessDenied(_))
    }
}

/// The opaque collaborator collectors and the heartbeat writer/reader use
/// to talk to MySQL. Never opens connections itself, never reloads
/// credentials, never parses `my.cnf` — all of that lives outside this
/// crate, in whatever provides the concrete implementation.
#[async_trait]
pub trait MySqlPool: Send + Sync {
    async fn query(&self, sql: &str, params: &[Param]) -> Result<Vec<Row>, PoolError>;
    async fn execute(&self, sql: &str, params: &[Param]) -> Result<u64, PoolError>;
}
