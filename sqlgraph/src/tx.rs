use crate::SqlGraphResult;
use entgraph_core::Context;
use entgraph_dialect::Driver;
use std::sync::Arc;
use tracing::warn;

/// Run `f` atomically. A driver that is already transaction-scoped runs
/// `f` directly; otherwise a transaction is opened, committed when `f`
/// succeeds and rolled back when it fails.
pub fn with_tx<T, F>(ctx: &Context, drv: &dyn Driver, f: F) -> SqlGraphResult<T>
where
    F: FnOnce(&dyn Driver) -> SqlGraphResult<T>,
{
    if drv.in_tx() {
        return f(drv);
    }
    let tx = drv.begin(ctx)?;
    let scoped = Arc::clone(&tx).as_driver();
    match f(scoped.as_ref()) {
        Ok(value) => {
            tx.commit()?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback) = tx.rollback() {
                warn!(error = %rollback, "rollback after failed operation");
            }
            Err(err)
        }
    }
}
