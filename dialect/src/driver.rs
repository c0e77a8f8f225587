//! The store driver boundary.

use crate::sql::Statement;
use crate::{Dialect, DriverResult};
use entgraph_core::{Context, Record, Value};
use std::fmt;
use std::sync::Arc;

/// Outcome of a statement that returns no rows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecResult {
    pub rows_affected: u64,
    /// Id generated by the last insert, when the store reports one.
    pub last_insert_id: Option<i64>,
}

/// Raw rows returned by a query, with values as the store produced them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Rows {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl Rows {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        Self { columns, rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Values of the first column, one per row.
    pub fn first_column(self) -> Vec<Value> {
        self.rows
            .into_iter()
            .filter_map(|row| row.into_iter().next())
            .collect()
    }

    pub fn into_records(self) -> Vec<Record> {
        let columns = self.columns;
        self.rows
            .into_iter()
            .map(|row| Record::from_parts(columns.clone(), row))
            .collect()
    }
}

/// A store driver: statement execution plus transaction support.
///
/// Implementations check the context before every store call and must
/// return ids of multi-row `INSERT ... RETURNING` statements in input order.
pub trait Driver: Send + Sync + fmt::Debug {
    /// Execute a statement that returns no rows.
    fn exec(&self, ctx: &Context, stmt: &Statement) -> DriverResult<ExecResult>;

    /// Execute a statement that returns rows.
    fn query(&self, ctx: &Context, stmt: &Statement) -> DriverResult<Rows>;

    /// Start a transaction that exclusively owns one connection.
    fn begin(&self, ctx: &Context) -> DriverResult<Arc<dyn TxDriver>>;

    fn dialect(&self) -> Dialect;

    /// Whether this handle is transaction-scoped.
    fn in_tx(&self) -> bool {
        false
    }

    /// The non-transactional driver a transaction was started from.
    fn parent(&self) -> Option<Arc<dyn Driver>> {
        None
    }

    /// Whether a transaction-scoped handle has been committed or rolled back.
    fn is_closed(&self) -> bool {
        false
    }
}

/// A transaction-scoped driver.
pub trait TxDriver: Driver {
    fn commit(&self) -> DriverResult<()>;

    fn rollback(&self) -> DriverResult<()>;

    /// View this transaction as a plain driver.
    fn as_driver(self: Arc<Self>) -> Arc<dyn Driver>;
}
