//! A scripted in-process driver for tests.
//!
//! `MockDriver` records every statement (including `BEGIN`/`COMMIT`/
//! `ROLLBACK`) and answers exec and query calls from queues of prepared
//! results. Empty queues answer with zero affected rows and no rows.

use crate::sql::Statement;
use crate::{Dialect, Driver, DriverError, DriverResult, ExecResult, Rows, TxDriver};
use entgraph_core::{Context, Value};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Debug, Default)]
struct MockState {
    log: Vec<Statement>,
    exec: VecDeque<DriverResult<ExecResult>>,
    query: VecDeque<DriverResult<Rows>>,
}

/// Scripted driver; clones share the same script and log.
#[derive(Debug, Clone)]
pub struct MockDriver {
    dialect: Dialect,
    state: Arc<Mutex<MockState>>,
}

impl MockDriver {
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            state: Arc::default(),
        }
    }

    /// Queue the result of the next exec call.
    pub fn expect_exec(&self, rows_affected: u64, last_insert_id: Option<i64>) -> &Self {
        self.state.lock().exec.push_back(Ok(ExecResult {
            rows_affected,
            last_insert_id,
        }));
        self
    }

    pub fn expect_exec_err(&self, err: DriverError) -> &Self {
        self.state.lock().exec.push_back(Err(err));
        self
    }

    /// Queue the rows of the next query call.
    pub fn expect_query(&self, columns: &[&str], rows: Vec<Vec<Value>>) -> &Self {
        let columns = columns.iter().map(|c| c.to_string()).collect();
        self.state.lock().query.push_back(Ok(Rows::new(columns, rows)));
        self
    }

    pub fn expect_query_err(&self, err: DriverError) -> &Self {
        self.state.lock().query.push_back(Err(err));
        self
    }

    /// Statements received so far.
    pub fn statements(&self) -> Vec<Statement> {
        self.state.lock().log.clone()
    }

    /// SQL text of the statements received so far.
    pub fn sql_log(&self) -> Vec<String> {
        self.state.lock().log.iter().map(|s| s.sql.clone()).collect()
    }

    fn record(&self, sql: &str) {
        self.state.lock().log.push(Statement::new(sql, Vec::new()));
    }
}

impl Driver for MockDriver {
    fn exec(&self, ctx: &Context, stmt: &Statement) -> DriverResult<ExecResult> {
        ctx.check()?;
        let mut state = self.state.lock();
        state.log.push(stmt.clone());
        state.exec.pop_front().unwrap_or(Ok(ExecResult::default()))
    }

    fn query(&self, ctx: &Context, stmt: &Statement) -> DriverResult<Rows> {
        ctx.check()?;
        let mut state = self.state.lock();
        state.log.push(stmt.clone());
        state.query.pop_front().unwrap_or(Ok(Rows::default()))
    }

    fn begin(&self, ctx: &Context) -> DriverResult<Arc<dyn TxDriver>> {
        ctx.check()?;
        self.record("BEGIN");
        Ok(Arc::new(MockTx {
            driver: self.clone(),
            closed: AtomicBool::new(false),
        }))
    }

    fn dialect(&self) -> Dialect {
        self.dialect
    }
}

/// Transaction handle of a `MockDriver`.
#[derive(Debug)]
pub struct MockTx {
    driver: MockDriver,
    closed: AtomicBool,
}

impl MockTx {
    fn finish(&self, sql: &str) -> DriverResult<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Err(DriverError::TxDone);
        }
        self.driver.record(sql);
        Ok(())
    }
}

impl Driver for MockTx {
    fn exec(&self, ctx: &Context, stmt: &Statement) -> DriverResult<ExecResult> {
        if self.is_closed() {
            return Err(DriverError::TxDone);
        }
        self.driver.exec(ctx, stmt)
    }

    fn query(&self, ctx: &Context, stmt: &Statement) -> DriverResult<Rows> {
        if self.is_closed() {
            return Err(DriverError::TxDone);
        }
        self.driver.query(ctx, stmt)
    }

    fn begin(&self, _ctx: &Context) -> DriverResult<Arc<dyn TxDriver>> {
        Err(DriverError::NestedTx)
    }

    fn dialect(&self) -> Dialect {
        self.driver.dialect
    }

    fn in_tx(&self) -> bool {
        true
    }

    fn parent(&self) -> Option<Arc<dyn Driver>> {
        Some(Arc::new(self.driver.clone()))
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl TxDriver for MockTx {
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scripted_results_in_order() {
        // GIVEN
        let drv = MockDriver::new(Dialect::Sqlite);
        drv.expect_exec(2, None)
            .expect_query(&["id"], vec![vec![Value::Int(7)]]);
        let ctx = Context::background();

        // WHEN
        let exec = drv.exec(&ctx, &Statement::new("UPDATE t SET a = 1", vec![])).unwrap();
        let rows = drv.query(&ctx, &Statement::new("SELECT id FROM t", vec![])).unwrap();
        let empty = drv.query(&ctx, &Statement::new("SELECT id FROM t", vec![])).unwrap();

        // THEN
        assert_eq!(exec.rows_affected, 2);
        assert_eq!(rows.first_column(), vec![Value::Int(7)]);
        assert!(empty.is_empty());
        assert_eq!(drv.statements().len(), 3);
    }

    #[test]
    fn test_tx_closes_once() {
        let drv = MockDriver::new(Dialect::Sqlite);
        let ctx = Context::background();
        let tx = drv.begin(&ctx).unwrap();

        tx.rollback().unwrap();

        assert!(matches!(tx.commit(), Err(DriverError::TxDone)));
        assert!(matches!(
            tx.exec(&ctx, &Statement::new("SELECT 1", vec![])),
            Err(DriverError::TxDone)
        ));
        assert_eq!(drv.sql_log(), vec!["BEGIN", "ROLLBACK"]);
    }
}
