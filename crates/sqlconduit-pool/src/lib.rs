//! Connection pooling for SQLConduit.
//!
//! The pool grows on demand: a borrow takes an idle handle when one is
//! available and otherwise opens a new one through the dialect. Borrowing
//! never blocks waiting for a handle.
//!
//! Releasing a handle applies the [`AutoCommit`] policy when the dialect
//! supports transactions, so work done outside an explicit transaction is
//! committed, rolled back, or rejected before the handle is reused.

mod config;

pub use config::{AutoCommit, PoolConfig, PoolMode};

use sqlconduit_core::error::TransactionPolicyError;
use sqlconduit_core::{Dialect, DriverConnection, Result};
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// A driver connection owned by a pool, tagged with its issuance serial.
pub struct PhysicalConnection {
    serial: u64,
    driver: Box<dyn DriverConnection>,
}

impl PhysicalConnection {
    /// Serial assigned when the pool opened this handle (starts at 1).
    pub fn serial(&self) -> u64 {
        self.serial
    }
}

impl Deref for PhysicalConnection {
    type Target = dyn DriverConnection;

    fn deref(&self) -> &Self::Target {
        self.driver.as_ref()
    }
}

impl DerefMut for PhysicalConnection {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.driver.as_mut()
    }
}

impl fmt::Debug for PhysicalConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PhysicalConnection")
            .field("serial", &self.serial)
            .finish_non_exhaustive()
    }
}

/// Pool statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Physical connections opened so far
    pub created: u64,
    /// Handles waiting in the idle set
    pub idle: usize,
    /// Handles currently borrowed
    pub outstanding: usize,
}

/// A demand-grown pool of physical connections for one database.
pub struct ConnectionPool {
    dialect: Arc<dyn Dialect>,
    config: PoolConfig,
    idle: Mutex<Vec<PhysicalConnection>>,
    next_serial: AtomicU64,
    outstanding: AtomicUsize,
}

impl ConnectionPool {
    /// Create an empty pool. No connection is opened until the first borrow.
    pub fn new(dialect: Arc<dyn Dialect>, config: PoolConfig) -> Self {
        Self {
            dialect,
            config,
            idle: Mutex::new(Vec::new()),
            next_serial: AtomicU64::new(1),
            outstanding: AtomicUsize::new(0),
        }
    }

    pub fn dialect(&self) -> &Arc<dyn Dialect> {
        &self.dialect
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    fn idle(&self) -> MutexGuard<'_, Vec<PhysicalConnection>> {
        self.idle.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Take an idle handle, or open a new one if none is idle.
    pub fn borrow(&self) -> Result<PhysicalConnection> {
        let reused = self.idle().pop();
        let conn = match reused {
            Some(conn) => conn,
            None => {
                let driver = self.dialect.connect()?;
                let serial = self.next_serial.fetch_add(1, Ordering::SeqCst);
                tracing::debug!(
                    dialect = self.dialect.name(),
                    connection = serial,
                    "Opened physical connection"
                );
                PhysicalConnection { serial, driver }
            }
        };
        self.outstanding.fetch_add(1, Ordering::SeqCst);
        tracing::trace!(connection = conn.serial, "Borrowed connection");
        Ok(conn)
    }

    /// Return a handle used outside an explicit transaction.
    ///
    /// The auto-commit policy runs first when the dialect supports
    /// transactions. The handle goes back to the pool even when the policy
    /// fails, so a policy violation never leaks it.
    pub fn release(&self, mut conn: PhysicalConnection, auto_commit: AutoCommit) -> Result<()> {
        let outcome = if self.dialect.supports_transactions() {
            apply_policy(&mut conn, auto_commit)
        } else {
            Ok(())
        };
        if let Err(error) = &outcome {
            tracing::warn!(
                connection = conn.serial,
                policy = %auto_commit,
                error = %error,
                "Release policy failed"
            );
        }
        self.put_back(conn);
        outcome
    }

    /// Return a handle whose transaction was already ended by the caller.
    pub fn reclaim(&self, conn: PhysicalConnection) {
        self.put_back(conn);
    }

    /// Return a handle whose owner went away without finishing its work.
    ///
    /// Pending work is rolled back and a rollback failure is only logged.
    pub fn abandon(&self, mut conn: PhysicalConnection) {
        if self.dialect.supports_transactions() {
            if let Err(error) = conn.rollback() {
                tracing::warn!(
                    connection = conn.serial,
                    error = %error,
                    "Rollback of abandoned connection failed"
                );
            }
        }
        self.put_back(conn);
    }

    fn put_back(&self, conn: PhysicalConnection) {
        self.outstanding.fetch_sub(1, Ordering::SeqCst);
        match self.config.mode {
            PoolMode::Pooled => {
                tracing::trace!(connection = conn.serial, "Connection returned to pool");
                self.idle().push(conn);
            }
            PoolMode::Detached => {
                tracing::trace!(connection = conn.serial, "Connection closed");
            }
        }
    }

    /// Borrow a handle wrapped in a guard that returns it on drop.
    pub fn get(&self) -> Result<PooledConnection<'_>> {
        Ok(PooledConnection {
            pool: self,
            conn: Some(self.borrow()?),
        })
    }

    /// Borrow a handle, run `f` with it, and release it with `auto_commit`.
    ///
    /// If `f` fails the handle is still released; its error takes
    /// precedence over a release failure, which is logged instead.
    pub fn run_with_connection<T, F>(&self, auto_commit: AutoCommit, f: F) -> Result<T>
    where
        F: FnOnce(&mut PhysicalConnection) -> Result<T>,
    {
        let mut guard = self.get()?;
        let outcome = f(&mut *guard);
        match (outcome, guard.release(auto_commit)) {
            (Ok(value), Ok(())) => Ok(value),
            (Ok(_), Err(error)) => Err(error),
            (Err(error), released) => {
                if let Err(release_error) = released {
                    tracing::debug!(error = %release_error, "Release error superseded by query error");
                }
                Err(error)
            }
        }
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            created: self.next_serial.load(Ordering::SeqCst) - 1,
            idle: self.idle().len(),
            outstanding: self.outstanding.load(Ordering::SeqCst),
        }
    }
}

impl fmt::Debug for ConnectionPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionPool")
            .field("dialect", &self.dialect.name())
            .field("config", &self.config)
            .field("stats", &self.stats())
            .finish()
    }
}

fn apply_policy(conn: &mut PhysicalConnection, auto_commit: AutoCommit) -> Result<()> {
    match auto_commit {
        AutoCommit::Commit => conn.commit(),
        AutoCommit::Rollback => conn.rollback(),
        AutoCommit::Exception => {
            // The policy violation is reported even if the rollback fails.
            if let Err(error) = conn.rollback() {
                tracing::warn!(
                    connection = conn.serial,
                    error = %error,
                    "Rollback under exception policy failed"
                );
            }
            Err(TransactionPolicyError {
                connection: conn.serial,
            }
            .into())
        }
    }
}

const DEREF_ERR: &str = "(bug) PooledConnection used after release";

/// A borrowed handle that goes back to its pool when dropped.
///
/// [`release`](PooledConnection::release) applies the auto-commit policy
/// and reports its outcome. Dropping an unreleased guard (early return or
/// panic) rolls back pending work instead.
pub struct PooledConnection<'p> {
    pool: &'p ConnectionPool,
    conn: Option<PhysicalConnection>,
}

impl PooledConnection<'_> {
    /// Release with the given policy.
    pub fn release(mut self, auto_commit: AutoCommit) -> Result<()> {
        match self.conn.take() {
            Some(conn) => self.pool.release(conn, auto_commit),
            None => Ok(()),
        }
    }

    /// Take the raw handle out of the guard. The caller becomes
    /// responsible for giving it back with `reclaim`, `release` or `abandon`.
    pub fn detach(mut self) -> PhysicalConnection {
        self.conn.take().expect(DEREF_ERR)
    }
}

impl Deref for PooledConnection<'_> {
    type Target = PhysicalConnection;

    fn deref(&self) -> &Self::Target {
        self.conn.as_ref().expect(DEREF_ERR)
    }
}

impl DerefMut for PooledConnection<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.conn.as_mut().expect(DEREF_ERR)
    }
}

impl Drop for PooledConnection<'_> {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            self.pool.abandon(conn);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlconduit_core::{DriverErrorKind, Error, RowCursor};
    use std::collections::HashSet;
    use std::sync::atomic::AtomicBool;

    #[derive(Default)]
    struct Journal {
        events: Mutex<Vec<String>>,
        fail_rollback: AtomicBool,
    }

    impl Journal {
        fn push(&self, event: impl Into<String>) {
            self.events.lock().unwrap().push(event.into());
        }

        fn take(&self) -> Vec<String> {
            std::mem::take(&mut *self.events.lock().unwrap())
        }
    }

    struct Recording {
        journal: Arc<Journal>,
        transactional: bool,
    }

    struct RecordingConnection {
        journal: Arc<Journal>,
    }

    struct NoRows;

    impl RowCursor for NoRows {
        fn fetch_one(&mut self) -> Result<Option<sqlconduit_core::Row>> {
            Ok(None)
        }
    }

    impl DriverConnection for RecordingConnection {
        fn execute(&mut self, sql: &str) -> Result<u64> {
            self.journal.push(sql);
            Ok(1)
        }

        fn open_cursor(&mut self, sql: &str) -> Result<Box<dyn RowCursor>> {
            self.journal.push(sql);
            Ok(Box::new(NoRows))
        }

        fn commit(&mut self) -> Result<()> {
            self.journal.push("COMMIT");
            Ok(())
        }

        fn rollback(&mut self) -> Result<()> {
            self.journal.push("ROLLBACK");
            if self.journal.fail_rollback.load(Ordering::SeqCst) {
                return Err(Error::driver(DriverErrorKind::Connect, "connection lost", None));
            }
            Ok(())
        }
    }

    impl Dialect for Recording {
        fn name(&self) -> &'static str {
            "recording"
        }

        fn supports_transactions(&self) -> bool {
            self.transactional
        }

        fn connect(&self) -> Result<Box<dyn DriverConnection>> {
            self.journal.push("CONNECT");
            Ok(Box::new(RecordingConnection {
                journal: Arc::clone(&self.journal),
            }))
        }
    }

    fn pool(transactional: bool, config: PoolConfig) -> (ConnectionPool, Arc<Journal>) {
        let journal = Arc::new(Journal::default());
        let dialect = Recording {
            journal: Arc::clone(&journal),
            transactional,
        };
        (ConnectionPool::new(Arc::new(dialect), config), journal)
    }

    #[test]
    fn pool_grows_on_demand() {
        let (pool, _) = pool(true, PoolConfig::default());
        assert_eq!(pool.stats(), PoolStats::default());

        let a = pool.borrow().unwrap();
        let b = pool.borrow().unwrap();
        assert_eq!((a.serial(), b.serial()), (1, 2));
        assert_eq!(pool.stats().outstanding, 2);

        pool.reclaim(a);
        pool.reclaim(b);
        let stats = pool.stats();
        assert_eq!((stats.created, stats.idle, stats.outstanding), (2, 2, 0));

        let c = pool.borrow().unwrap();
        assert!(c.serial() <= 2);
        assert_eq!(pool.stats().created, 2);
    }

    #[test]
    fn release_commits_by_default() {
        let (pool, journal) = pool(true, PoolConfig::default());
        let conn = pool.borrow().unwrap();
        pool.release(conn, AutoCommit::default()).unwrap();
        assert_eq!(journal.take(), vec!["CONNECT", "COMMIT"]);
    }

    #[test]
    fn release_rolls_back_when_disabled() {
        let (pool, journal) = pool(true, PoolConfig::default());
        let conn = pool.borrow().unwrap();
        pool.release(conn, AutoCommit::Rollback).unwrap();
        assert_eq!(journal.take(), vec!["CONNECT", "ROLLBACK"]);
    }

    #[test]
    fn exception_policy_rolls_back_and_keeps_handle() {
        let (pool, journal) = pool(true, PoolConfig::default());
        let conn = pool.borrow().unwrap();
        let err = pool.release(conn, AutoCommit::Exception).unwrap_err();

        assert!(matches!(err, Error::TransactionPolicy(ref e) if e.connection == 1));
        assert_eq!(journal.take(), vec!["CONNECT", "ROLLBACK"]);
        assert_eq!(pool.stats().idle, 1);
        assert_eq!(pool.stats().outstanding, 0);
    }

    #[test]
    fn exception_policy_survives_failed_rollback() {
        let (pool, journal) = pool(true, PoolConfig::default());
        journal.fail_rollback.store(true, Ordering::SeqCst);
        let conn = pool.borrow().unwrap();
        let err = pool.release(conn, AutoCommit::Exception).unwrap_err();

        assert!(err.is_policy_violation());
        assert_eq!(journal.take(), vec!["CONNECT", "ROLLBACK"]);
        assert_eq!((pool.stats().idle, pool.stats().outstanding), (1, 0));
    }

    #[test]
    fn non_transactional_release_skips_policy() {
        let (pool, journal) = pool(false, PoolConfig::default());
        let conn = pool.borrow().unwrap();
        pool.release(conn, AutoCommit::Exception).unwrap();
        let conn = pool.borrow().unwrap();
        pool.abandon(conn);
        assert_eq!(journal.take(), vec!["CONNECT"]);
    }

    #[test]
    fn detached_mode_drops_released_handles() {
        let (pool, journal) = pool(true, PoolConfig::new().mode(PoolMode::Detached));
        let conn = pool.borrow().unwrap();
        pool.release(conn, AutoCommit::Commit).unwrap();
        let conn = pool.borrow().unwrap();
        assert_eq!(conn.serial(), 2);
        pool.reclaim(conn);
        assert_eq!(pool.stats().idle, 0);
        assert_eq!(journal.take(), vec!["CONNECT", "COMMIT", "CONNECT"]);
    }

    #[test]
    fn run_with_connection_prefers_closure_error() {
        let (pool, journal) = pool(true, PoolConfig::default());
        let err = pool
            .run_with_connection(AutoCommit::Exception, |conn| {
                conn.execute("DELETE FROM t")?;
                Err::<(), _>(Error::Custom("boom".to_string()))
            })
            .unwrap_err();
        assert!(matches!(err, Error::Custom(ref m) if m == "boom"));
        assert_eq!(journal.take(), vec!["CONNECT", "DELETE FROM t", "ROLLBACK"]);
        assert_eq!(pool.stats().outstanding, 0);
    }

    #[test]
    fn run_with_connection_returns_value() {
        let (pool, journal) = pool(true, PoolConfig::default());
        let affected = pool
            .run_with_connection(AutoCommit::Commit, |conn| conn.execute("UPDATE t SET a = 1"))
            .unwrap();
        assert_eq!(affected, 1);
        assert_eq!(journal.take(), vec!["CONNECT", "UPDATE t SET a = 1", "COMMIT"]);
    }

    #[test]
    fn concurrent_borrowers_share_the_pool() {
        let (pool, _) = pool(true, PoolConfig::default());
        let pool = Arc::new(pool);
        let in_use = Arc::new(Mutex::new(HashSet::new()));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let pool = Arc::clone(&pool);
                let in_use = Arc::clone(&in_use);
                std::thread::spawn(move || {
                    for _ in 0..25 {
                        pool.run_with_connection(AutoCommit::Commit, |conn| {
                            assert!(
                                in_use.lock().unwrap().insert(conn.serial()),
                                "connection {} handed to two borrowers",
                                conn.serial()
                            );
                            let affected = conn.execute("SELECT 1");
                            in_use.lock().unwrap().remove(&conn.serial());
                            affected
                        })
                        .unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        let stats = pool.stats();
        assert_eq!(stats.outstanding, 0);
        assert!(stats.created >= 1 && stats.created <= 8);
        assert_eq!(stats.idle as u64, stats.created);
    }

    #[test]
    fn dropped_guard_rolls_back() {
        let (pool, journal) = pool(true, PoolConfig::default());
        {
            let mut conn = pool.get().unwrap();
            conn.execute("INSERT INTO t VALUES (1)").unwrap();
        }
        assert_eq!(journal.take(), vec!["CONNECT", "INSERT INTO t VALUES (1)", "ROLLBACK"]);
        assert_eq!(pool.stats().idle, 1);
    }

    #[test]
    fn detached_guard_skips_drop_path() {
        let (pool, journal) = pool(true, PoolConfig::default());
        let conn = pool.get().unwrap().detach();
        assert_eq!(pool.stats().outstanding, 1);
        pool.reclaim(conn);
        assert_eq!(journal.take(), vec!["CONNECT"]);
        assert_eq!(pool.stats().outstanding, 0);
    }
}
