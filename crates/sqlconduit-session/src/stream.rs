//! Lazy, forward-only streams of hydrated instances.

use crate::database::Database;
use crate::queryable::hydrate_row;
use crate::transaction::TxState;
use sqlconduit_core::{CacheSet, Hydrate, Result, RowCursor};
use sqlconduit_pool::PhysicalConnection;
use std::cell::Cell;
use std::fmt;
use std::iter::FusedIterator;
use std::marker::PhantomData;
use std::sync::Arc;

/// Where a stream is in its life.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    /// Rows may still be pulled.
    Active,
    /// The cursor ran dry; any pool-owned connection was released.
    Exhausted,
    /// Ended early by `dispose`, drop, or a fetch error.
    Released,
}

/// A lazy sequence of instances produced by one select.
///
/// Each pull fetches a single row and hydrates it through the cache of the
/// surface that opened the stream. A stream opened on a [`Database`] owns
/// its connection and releases it with the auto-commit policy once the
/// cursor is exhausted; dropping or disposing it earlier returns the
/// connection too. A stream opened inside a transaction never touches the
/// transaction's connection, and it ends as [`StreamState::Released`] as
/// soon as that transaction commits or rolls back.
pub struct ResultCursorStream<'a, M> {
    db: &'a Database,
    cache: &'a CacheSet,
    cursor: Option<Box<dyn RowCursor>>,
    /// `None` when pinned to a transaction
    conn: Option<PhysicalConnection>,
    /// State of the owning transaction, when pinned
    scope: Option<&'a Cell<TxState>>,
    lazy: bool,
    state: StreamState,
    _marker: PhantomData<fn() -> M>,
}

impl<'a, M: Hydrate> ResultCursorStream<'a, M> {
    /// A stream that owns its pooled connection.
    pub(crate) fn pooled(
        db: &'a Database,
        cache: &'a CacheSet,
        cursor: Box<dyn RowCursor>,
        conn: PhysicalConnection,
        lazy: bool,
    ) -> Self {
        Self {
            db,
            cache,
            cursor: Some(cursor),
            conn: Some(conn),
            scope: None,
            lazy,
            state: StreamState::Active,
            _marker: PhantomData,
        }
    }

    /// A stream over a transaction's connection; it lives no longer
    /// than the transaction stays active.
    pub(crate) fn pinned(
        db: &'a Database,
        cache: &'a CacheSet,
        cursor: Box<dyn RowCursor>,
        scope: &'a Cell<TxState>,
        lazy: bool,
    ) -> Self {
        Self {
            db,
            cache,
            cursor: Some(cursor),
            conn: None,
            scope: Some(scope),
            lazy,
            state: StreamState::Active,
            _marker: PhantomData,
        }
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    /// Stop early and give the connection back.
    ///
    /// A pool-owned connection is released with the auto-commit policy and
    /// its outcome is returned. Disposing a finished stream does nothing.
    pub fn dispose(&mut self) -> Result<()> {
        if self.state != StreamState::Active {
            return Ok(());
        }
        self.state = StreamState::Released;
        self.release_connection()
    }

    fn finish(&mut self) -> Result<()> {
        self.state = StreamState::Exhausted;
        self.release_connection()
    }

    fn release_connection(&mut self) -> Result<()> {
        // The cursor must be gone before its connection is committed.
        self.cursor = None;
        match self.conn.take() {
            Some(conn) => {
                self.db.log_release(conn.serial());
                self.db.pool().release(conn, self.db.config().auto_commit)
            }
            None => Ok(()),
        }
    }

    fn fail(&mut self) {
        self.state = StreamState::Released;
        self.cursor = None;
        if let Some(conn) = self.conn.take() {
            self.db.pool().abandon(conn);
        }
    }
}

impl<M: Hydrate> Iterator for ResultCursorStream<'_, M> {
    type Item = Result<Arc<M>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.state != StreamState::Active {
            return None;
        }
        if self.scope.is_some_and(|scope| scope.get() != TxState::Active) {
            tracing::debug!("Select stream outlived its transaction");
            self.state = StreamState::Released;
            self.cursor = None;
            return None;
        }
        let cursor = self.cursor.as_mut()?;
        match cursor.fetch_one() {
            Ok(Some(row)) => {
                if self.db.config().debug_output {
                    tracing::trace!(row = ?row, "Select row");
                }
                Some(hydrate_row::<M>(self.cache, row, self.lazy))
            }
            Ok(None) => self.finish().err().map(Err),
            Err(error) => {
                self.fail();
                Some(Err(error))
            }
        }
    }
}

impl<M: Hydrate> FusedIterator for ResultCursorStream<'_, M> {}

impl<M> Drop for ResultCursorStream<'_, M> {
    fn drop(&mut self) {
        self.cursor = None;
        if let Some(conn) = self.conn.take() {
            tracing::debug!(connection = conn.serial(), "Select stream dropped before exhaustion");
            self.db.pool().abandon(conn);
        }
    }
}

impl<M> fmt::Debug for ResultCursorStream<'_, M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResultCursorStream")
            .field("state", &self.state)
            .field("connection", &self.conn.as_ref().map(PhysicalConnection::serial))
            .field("lazy", &self.lazy)
            .finish_non_exhaustive()
    }
}
