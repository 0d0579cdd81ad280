//! Transaction scopes pinned to one pooled connection.

use crate::database::Database;
use crate::queryable::Queryable;
use crate::stream::ResultCursorStream;
use sqlconduit_core::error::{TransactionError, TransactionErrorKind};
use sqlconduit_core::{CacheSet, Error, Hydrate, PrimaryKey, Result, SubCache};
use sqlconduit_pool::PhysicalConnection;
use sqlconduit_query::{SelectSpec, build_select};
use std::cell::{Cell, RefCell};
use std::fmt;
use std::sync::Arc;

/// Transaction lifecycle. Both terminal states are final.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxState {
    Active,
    Committed,
    RolledBack,
}

/// A unit of work on one connection borrowed for the scope's lifetime.
///
/// Statements and selects issued through the scope all run on that
/// connection; it goes back to the pool only when the scope commits or
/// rolls back. Instances hydrated here live in a private cache, and a
/// rollback expires every one of them.
///
/// Dropping an active scope rolls it back. A scope is meant for one
/// thread and is not `Sync`.
pub struct Transaction<'db> {
    db: &'db Database,
    conn: RefCell<Option<PhysicalConnection>>,
    cache: CacheSet,
    state: Cell<TxState>,
}

impl<'db> Transaction<'db> {
    pub(crate) fn begin(db: &'db Database) -> Result<Self> {
        let mut conn = db.pool().get()?;
        conn.set_auto_commit(false)?;
        tracing::debug!(connection = conn.serial(), "Transaction started");
        Ok(Self {
            db,
            conn: RefCell::new(Some(conn.detach())),
            cache: CacheSet::new(db.config().cache),
            state: Cell::new(TxState::Active),
        })
    }

    pub fn state(&self) -> TxState {
        self.state.get()
    }

    pub fn is_active(&self) -> bool {
        self.state.get() == TxState::Active
    }

    fn terminated_error(&self) -> Error {
        let kind = match self.state.get() {
            TxState::Committed => TransactionErrorKind::AlreadyCommitted,
            _ => TransactionErrorKind::AlreadyRolledBack,
        };
        Error::Transaction(TransactionError { kind })
    }

    fn take_connection(&self) -> Result<PhysicalConnection> {
        let taken = self
            .conn
            .try_borrow_mut()
            .map_err(|_| Error::Custom("transaction connection is in use".to_string()))?
            .take();
        taken.ok_or_else(|| self.terminated_error())
    }

    /// Commit the scope's work and return its connection to the pool.
    ///
    /// If the commit itself fails the scope stays active, so it can still
    /// be rolled back (or will be on drop).
    #[tracing::instrument(level = "debug", skip(self))]
    pub fn commit(&self) -> Result<()> {
        if !self.is_active() {
            return Err(self.terminated_error());
        }
        let mut conn = self.take_connection()?;
        self.db.log_statement(conn.serial(), "COMMIT", "");
        if let Err(error) = conn.commit() {
            *self.conn.borrow_mut() = Some(conn);
            return Err(error);
        }
        self.state.set(TxState::Committed);
        self.db.pool().reclaim(conn);
        Ok(())
    }

    /// Roll back the scope's work, expire every instance hydrated under
    /// it, and return its connection to the pool.
    ///
    /// Rolling back a scope that already ended does nothing.
    #[tracing::instrument(level = "debug", skip(self))]
    pub fn rollback(&self) -> Result<()> {
        if !self.is_active() {
            return Ok(());
        }
        let mut conn = self.take_connection()?;
        self.db.log_statement(conn.serial(), "ROLLBACK", "");

        // Keys are captured before the rollback so nothing hydrated under
        // this scope survives it unexpired.
        let snapshot: Vec<(Arc<SubCache>, Vec<PrimaryKey>)> = self
            .cache
            .all_sub_caches()
            .into_iter()
            .map(|sub| {
                let ids = sub.all_ids();
                (sub, ids)
            })
            .collect();

        let outcome = conn.rollback();

        let mut expired = 0usize;
        for (sub, ids) in &snapshot {
            for id in ids {
                if sub.expire(id) {
                    expired += 1;
                }
            }
        }
        tracing::debug!(connection = conn.serial(), expired, "Rolled back transaction");

        self.state.set(TxState::RolledBack);
        match &outcome {
            Ok(()) => self.db.pool().reclaim(conn),
            Err(_) => self.db.pool().abandon(conn),
        }
        outcome
    }
}

impl Queryable for Transaction<'_> {
    fn database(&self) -> &Database {
        self.db
    }

    fn cache(&self) -> &CacheSet {
        &self.cache
    }

    fn with_connection<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut PhysicalConnection) -> Result<T>,
    {
        if !self.is_active() {
            return Err(self.terminated_error());
        }
        let mut slot = self
            .conn
            .try_borrow_mut()
            .map_err(|_| Error::Custom("transaction connection is in use".to_string()))?;
        match slot.as_mut() {
            Some(conn) => f(conn),
            None => Err(self.terminated_error()),
        }
    }

    fn iter_select<M: Hydrate>(&self, spec: &SelectSpec<'_>) -> Result<ResultCursorStream<'_, M>> {
        let sql = build_select(spec, self.db.dialect())?;
        let cursor = self.with_connection(|conn| {
            self.db.log_statement(conn.serial(), "Select", &sql);
            conn.open_cursor(&sql)
        })?;
        Ok(ResultCursorStream::pinned(
            self.db,
            &self.cache,
            cursor,
            &self.state,
            spec.options.lazy_columns,
        ))
    }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        if self.is_active() {
            if let Err(error) = self.rollback() {
                tracing::warn!(error = %error, "Rollback of dropped transaction failed");
            }
        }
    }
}

impl fmt::Debug for Transaction<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let serial = self
            .conn
            .try_borrow()
            .ok()
            .and_then(|c| c.as_ref().map(PhysicalConnection::serial));
        f.debug_struct("Transaction")
            .field("state", &self.state.get())
            .field("connection", &serial)
            .finish_non_exhaustive()
    }
}
