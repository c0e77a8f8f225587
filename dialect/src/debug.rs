//! Statement logging driver.

use crate::sql::Statement;
use crate::{Dialect, Driver, DriverResult, ExecResult, Rows, TxDriver};
use entgraph_core::Context;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

static TX_IDS: AtomicU64 = AtomicU64::new(1);

/// Wraps a driver and logs every statement at debug level.
#[derive(Debug, Clone)]
pub struct DebugDriver {
    inner: Arc<dyn Driver>,
}

impl DebugDriver {
    pub fn new(inner: Arc<dyn Driver>) -> Self {
        Self { inner }
    }
}

impl Driver for DebugDriver {
    fn exec(&self, ctx: &Context, stmt: &Statement) -> DriverResult<ExecResult> {
        debug!(sql = %stmt.sql, args = ?stmt.args, "driver.exec");
        self.inner.exec(ctx, stmt)
    }

    fn query(&self, ctx: &Context, stmt: &Statement) -> DriverResult<Rows> {
        debug!(sql = %stmt.sql, args = ?stmt.args, "driver.query");
        self.inner.query(ctx, stmt)
    }

    fn begin(&self, ctx: &Context) -> DriverResult<Arc<dyn TxDriver>> {
        let inner = self.inner.begin(ctx)?;
        let id = TX_IDS.fetch_add(1, Ordering::Relaxed);
        debug!(tx = id, "driver.tx: started");
        Ok(Arc::new(DebugTx {
            id,
            inner,
            parent: self.clone(),
        }))
    }

    fn dialect(&self) -> Dialect {
        self.inner.dialect()
    }
}

/// Transaction of a `DebugDriver`; statements are tagged with its id.
#[derive(Debug)]
pub struct DebugTx {
    id: u64,
    inner: Arc<dyn TxDriver>,
    parent: DebugDriver,
}

impl Driver for DebugTx {
    fn exec(&self, ctx: &Context, stmt: &Statement) -> DriverResult<ExecResult> {
        debug!(tx = self.id, sql = %stmt.sql, args = ?stmt.args, "tx.exec");
        self.inner.exec(ctx, stmt)
    }

    fn query(&self, ctx: &Context, stmt: &Statement) -> DriverResult<Rows> {
        debug!(tx = self.id, sql = %stmt.sql, args = ?stmt.args, "tx.query");
        self.inner.query(ctx, stmt)
    }

    fn begin(&self, ctx: &Context) -> DriverResult<Arc<dyn TxDriver>> {
        self.inner.begin(ctx)
    }

    fn dialect(&self) -> Dialect {
        self.inner.dialect()
    }

    fn in_tx(&self) -> bool {
        true
    }

    fn parent(&self) -> Option<Arc<dyn Driver>> {
        Some(Arc::new(self.parent.clone()))
    }

    fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }
}

impl TxDriver for DebugTx {
    fn commit(&self) -> DriverResult<()> {
        debug!(tx = self.id, "tx.commit");
        self.inner.commit()
    }

    fn rollback(&self) -> DriverResult<()> {
        debug!(tx = self.id, "tx.rollback");
        self.inner.rollback()
    }

    fn as_driver(self: Arc<Self>) -> Arc<dyn Driver> {
        self
    }
}
