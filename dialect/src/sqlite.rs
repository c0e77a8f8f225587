//! SQLite reference driver.
//!
//! The driver holds a single connection in a slot. Starting a transaction
//! takes the connection out of the slot for the transaction's lifetime and
//! commit/rollback put it back. Statements issued on the ambient driver while
//! a transaction is open wait for the connection to return, never running
//! inside the transaction. The wait is bounded by the busy timeout (and the
//! context deadline); past it they fail with `DriverError::ConnBusy`.

use crate::sql::Statement;
use crate::{Dialect, Driver, DriverError, DriverResult, ExecResult, Rows, TxDriver};
use entgraph_core::{Context, Value};
use parking_lot::{Condvar, Mutex, MutexGuard};
use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::{params_from_iter, Connection};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Connection options for `SqliteDriver`.
#[derive(Debug, Clone)]
pub struct SqliteOptions {
    /// Database file; `None` opens a private in-memory database.
    pub path: Option<PathBuf>,
    /// Enforce foreign keys (`PRAGMA foreign_keys = ON`).
    pub foreign_keys: bool,
    pub busy_timeout: Duration,
}

impl Default for SqliteOptions {
    fn default() -> Self {
        Self {
            path: None,
            foreign_keys: true,
            busy_timeout: Duration::from_secs(5),
        }
    }
}

impl SqliteOptions {
    pub fn in_memory() -> Self {
        Self::default()
    }

    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            ..Self::default()
        }
    }

    pub fn with_foreign_keys(mut self, enabled: bool) -> Self {
        self.foreign_keys = enabled;
        self
    }

    pub fn with_busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }
}

// The connection, empty while a transaction holds it.
struct Slot {
    conn: Mutex<Option<Connection>>,
    returned: Condvar,
    busy_timeout: Duration,
}

impl Slot {
    // Lock the slot once the connection is back in it.
    fn acquire(&self, ctx: &Context) -> DriverResult<MutexGuard<'_, Option<Connection>>> {
        let timeout = Instant::now() + self.busy_timeout;
        let deadline = ctx.deadline().map_or(timeout, |d| d.min(timeout));
        let mut guard = self.conn.lock();
        while guard.is_none() {
            if self.returned.wait_until(&mut guard, deadline).timed_out() && guard.is_none() {
                ctx.check()?;
                return Err(DriverError::ConnBusy);
            }
        }
        Ok(guard)
    }

    fn put_back(&self, conn: Connection) {
        *self.conn.lock() = Some(conn);
        self.returned.notify_all();
    }
}

/// Driver over one rusqlite connection.
#[derive(Clone)]
pub struct SqliteDriver {
    slot: Arc<Slot>,
}

impl fmt::Debug for SqliteDriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqliteDriver")
            .field("busy", &self.slot.conn.lock().is_none())
            .field("busy_timeout", &self.slot.busy_timeout)
            .finish()
    }
}

impl SqliteDriver {
    pub fn open(options: &SqliteOptions) -> DriverResult<Self> {
        let conn = match &options.path {
            Some(path) => Connection::open(path)?,
            None => Connection::open_in_memory()?,
        };
        conn.busy_timeout(options.busy_timeout)?;
        conn.pragma_update(None, "foreign_keys", options.foreign_keys)?;
        debug!(path = ?options.path, foreign_keys = options.foreign_keys, "opened sqlite database");
        Ok(Self {
            slot: Arc::new(Slot {
                conn: Mutex::new(Some(conn)),
                returned: Condvar::new(),
                busy_timeout: options.busy_timeout,
            }),
        })
    }

    pub fn open_in_memory() -> DriverResult<Self> {
        Self::open(&SqliteOptions::in_memory())
    }

    /// Run a batch of semicolon-separated statements, e.g. DDL.
    pub fn execute_batch(&self, sql: &str) -> DriverResult<()> {
        self.with_conn(&Context::background(), |conn| Ok(conn.execute_batch(sql)?))
    }

    fn with_conn<T>(
        &self,
        ctx: &Context,
        f: impl FnOnce(&Connection) -> DriverResult<T>,
    ) -> DriverResult<T> {
        let guard = self.slot.acquire(ctx)?;
        let conn = guard.as_ref().ok_or(DriverError::ConnBusy)?;
        f(conn)
    }
}

impl Driver for SqliteDriver {
    fn exec(&self, ctx: &Context, stmt: &Statement) -> DriverResult<ExecResult> {
        ctx.check()?;
        self.with_conn(ctx, |conn| exec(conn, stmt))
    }

    fn query(&self, ctx: &Context, stmt: &Statement) -> DriverResult<Rows> {
        ctx.check()?;
        self.with_conn(ctx, |conn| query(conn, stmt))
    }

    fn begin(&self, ctx: &Context) -> DriverResult<Arc<dyn TxDriver>> {
        ctx.check()?;
        let conn = self.slot.acquire(ctx)?.take().ok_or(DriverError::ConnBusy)?;
        if let Err(err) = conn.execute_batch("BEGIN") {
            self.slot.put_back(conn);
            return Err(err.into());
        }
        Ok(Arc::new(SqliteTx {
            conn: Mutex::new(Some(conn)),
            parent: self.clone(),
        }))
    }

    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }
}

/// A transaction owning the driver's connection until it ends.
pub struct SqliteTx {
    conn: Mutex<Option<Connection>>,
    parent: SqliteDriver,
}

impl fmt::Debug for SqliteTx {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqliteTx")
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl SqliteTx {
    fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> DriverResult<T>) -> DriverResult<T> {
        let guard = self.conn.lock();
        let conn = guard.as_ref().ok_or(DriverError::TxDone)?;
        f(conn)
    }

    // End the transaction with `sql` and hand the connection back.
    fn finish(&self, sql: &str) -> DriverResult<()> {
        let conn = self.conn.lock().take().ok_or(DriverError::TxDone)?;
        let result = conn.execute_batch(sql);
        if result.is_err() && !conn.is_autocommit() {
            if let Err(err) = conn.execute_batch("ROLLBACK") {
                warn!(error = %err, "rollback after failed {} also failed", sql);
            }
        }
        self.parent.slot.put_back(conn);
        Ok(result?)
    }
}

impl Driver for SqliteTx {
    fn exec(&self, ctx: &Context, stmt: &Statement) -> DriverResult<ExecResult> {
        ctx.check()?;
        self.with_conn(|conn| exec(conn, stmt))
    }

    fn query(&self, ctx: &Context, stmt: &Statement) -> DriverResult<Rows> {
        ctx.check()?;
        self.with_conn(|conn| query(conn, stmt))
    }

    fn begin(&self, _ctx: &Context) -> DriverResult<Arc<dyn TxDriver>> {
        Err(DriverError::NestedTx)
    }

    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    fn in_tx(&self) -> bool {
        true
    }

    fn parent(&self) -> Option<Arc<dyn Driver>> {
        Some(Arc::new(self.parent.clone()))
    }

    fn is_closed(&self) -> bool {
        self.conn.lock().is_none()
    }
}

impl TxDriver for SqliteTx {
    fn commit(&self) -> DriverResult<()> {
        self.finish("COMMIT")
    }

    fn rollback(&self) -> DriverResult<()> {
        self.finish("ROLLBACK")
    }

    fn as_driver(self: Arc<Self>) -> Arc<dyn Driver> {
        self
    }
}

impl Drop for SqliteTx {
    fn drop(&mut self) {
        if !self.is_closed() {
            warn!("sqlite transaction dropped while open; rolling back");
            if let Err(err) = self.finish("ROLLBACK") {
                warn!(error = %err, "rollback of dropped transaction failed");
            }
        }
    }
}

fn to_sql(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::Int(i) | Value::Time(i) => SqlValue::Integer(*i),
        Value::Float(f) => SqlValue::Real(*f),
        Value::String(s) => SqlValue::Text(s.clone()),
        Value::Bytes(b) => SqlValue::Blob(b.clone()),
        Value::Json(j) => SqlValue::Text(j.to_string()),
    }
}

fn from_sql(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Int(i),
        ValueRef::Real(f) => Value::Float(f),
        ValueRef::Text(t) => Value::String(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => Value::Bytes(b.to_vec()),
    }
}

fn exec(conn: &Connection, stmt: &Statement) -> DriverResult<ExecResult> {
    let mut prepared = conn.prepare_cached(&stmt.sql)?;
    let rows_affected = prepared.execute(params_from_iter(stmt.args.iter().map(to_sql)))?;
    Ok(ExecResult {
        rows_affected: rows_affected as u64,
        last_insert_id: Some(conn.last_insert_rowid()),
    })
}

fn query(conn: &Connection, stmt: &Statement) -> DriverResult<Rows> {
    let mut prepared = conn.prepare_cached(&stmt.sql)?;
    let columns: Vec<String> = prepared
        .column_names()
        .into_iter()
        .map(String::from)
        .collect();
    let width = columns.len();
    let mut rows = prepared.query(params_from_iter(stmt.args.iter().map(to_sql)))?;
    let mut out = Vec::new();
    while let Some(row) = rows.next()? {
        let mut values = Vec::with_capacity(width);
        for i in 0..width {
            values.push(from_sql(row.get_ref(i)?));
        }
        out.push(values);
    }
    Ok(Rows::new(columns, out))
}
