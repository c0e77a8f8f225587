//! Transactions.

use crate::{Client, Result};
use entgraph_dialect::TxDriver;
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

type Callback = Box<dyn FnOnce() + Send>;

/// A transaction owning the store connection until it ends.
///
/// Entities created through `client()` stay bound to the transaction until
/// unwrapped. Dropping an open transaction rolls it back.
pub struct Tx {
    client: Client,
    driver: Arc<dyn TxDriver>,
    on_commit: Mutex<Vec<Callback>>,
    on_rollback: Mutex<Vec<Callback>>,
}

impl Tx {
    pub(crate) fn new(parent: &Client, driver: Arc<dyn TxDriver>) -> Self {
        let client = parent.with_driver(Arc::clone(&driver).as_driver());
        Self {
            client,
            driver,
            on_commit: Mutex::new(Vec::new()),
            on_rollback: Mutex::new(Vec::new()),
        }
    }

    /// Client whose statements run in this transaction.
    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn is_closed(&self) -> bool {
        self.driver.is_closed()
    }

    /// Run `f` after a successful commit.
    pub fn on_commit(&self, f: impl FnOnce() + Send + 'static) {
        self.on_commit.lock().push(Box::new(f));
    }

    /// Run `f` after a rollback.
    pub fn on_rollback(&self, f: impl FnOnce() + Send + 'static) {
        self.on_rollback.lock().push(Box::new(f));
    }

    pub fn commit(self) -> Result<()> {
        self.driver.commit()?;
        debug!("transaction committed");
        for f in self.on_commit.lock().drain(..) {
            f();
        }
        Ok(())
    }

    pub fn rollback(self) -> Result<()> {
        self.driver.rollback()?;
        debug!("transaction rolled back");
        for f in self.on_rollback.lock().drain(..) {
            f();
        }
        Ok(())
    }
}

impl Drop for Tx {
    fn drop(&mut self) {
        if self.driver.is_closed() {
            return;
        }
        warn!("transaction dropped while open; rolling back");
        if let Err(err) = self.driver.rollback() {
            warn!(error = %err, "rollback of dropped transaction failed");
        }
    }
}

impl fmt::Debug for Tx {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tx")
            .field("driver", &self.driver)
            .field("closed", &self.is_closed())
            .finish()
    }
}
