//! SQLite connections and cursors.
//!
//! A [`SqliteConnection`] follows DB-API transaction semantics: unless
//! auto-commit is switched on, the first data-modifying statement after a
//! commit or rollback opens a transaction with `BEGIN`, and it stays open
//! until [`commit`](DriverConnection::commit) or
//! [`rollback`](DriverConnection::rollback). Read-only statements never
//! open one. Committing or rolling back with no transaction open does
//! nothing.

#![allow(clippy::borrow_as_ptr)]

use crate::config::SqliteConfig;
use crate::types;
use libsqlite3_sys as ffi;
use sqlconduit_core::{DriverConnection, DriverErrorKind, Error, Result, Row, RowCursor, Value};
use std::ffi::{CStr, CString, c_int};
use std::fmt;
use std::ptr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// An open `sqlite3*`, closed when the last owner drops it.
struct RawDb(*mut ffi::sqlite3);

// SAFETY: handles are opened with SQLITE_OPEN_FULLMUTEX and every access
// also goes through the Mutex in `SharedDb`.
unsafe impl Send for RawDb {}

impl Drop for RawDb {
    fn drop(&mut self) {
        // SAFETY: the pointer came from sqlite3_open_v2 and is closed once.
        // Every cursor holds the `SharedDb` and finalizes its statement
        // first, so no statement outlives this handle.
        unsafe { ffi::sqlite3_close(self.0) };
    }
}

/// Shared by a connection and every cursor it opened.
type SharedDb = Arc<Mutex<RawDb>>;

fn lock(db: &SharedDb) -> MutexGuard<'_, RawDb> {
    db.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A prepared statement, finalized on drop.
struct Stmt(*mut ffi::sqlite3_stmt);

// SAFETY: the statement is only stepped while its database's Mutex is held.
unsafe impl Send for Stmt {}

impl Drop for Stmt {
    fn drop(&mut self) {
        // SAFETY: the pointer came from sqlite3_prepare_v2 and is finalized once.
        unsafe { ffi::sqlite3_finalize(self.0) };
    }
}

/// A connection to a SQLite database.
pub struct SqliteConnection {
    db: SharedDb,
    path: String,
    auto_commit: bool,
}

impl SqliteConnection {
    /// Open a connection with the given configuration.
    pub fn open(config: &SqliteConfig) -> Result<Self> {
        let c_path = CString::new(config.path.as_str()).map_err(|_| {
            Error::driver(
                DriverErrorKind::Connect,
                "invalid path: contains a NUL byte",
                None,
            )
        })?;

        let mut db: *mut ffi::sqlite3 = ptr::null_mut();
        // SAFETY: valid pointers; the return code is checked below.
        let rc = unsafe {
            ffi::sqlite3_open_v2(
                c_path.as_ptr(),
                &mut db,
                config.flags.to_sqlite_flags(),
                ptr::null(),
            )
        };

        if rc != ffi::SQLITE_OK {
            let message = if db.is_null() {
                // SAFETY: errstr returns a static string for any code.
                unsafe { CStr::from_ptr(ffi::sqlite3_errstr(rc)) }
                    .to_string_lossy()
                    .into_owned()
            } else {
                // SAFETY: db is a handle returned by open_v2; it is closed right after.
                unsafe {
                    let message = CStr::from_ptr(ffi::sqlite3_errmsg(db))
                        .to_string_lossy()
                        .into_owned();
                    ffi::sqlite3_close(db);
                    message
                }
            };
            return Err(Error::driver(
                DriverErrorKind::Connect,
                format!("failed to open {}: {message}", config.path),
                None,
            ));
        }

        if config.busy_timeout_ms > 0 {
            let ms = c_int::try_from(config.busy_timeout_ms).unwrap_or(c_int::MAX);
            // SAFETY: db is valid.
            unsafe { ffi::sqlite3_busy_timeout(db, ms) };
        }

        tracing::debug!(path = %config.path, "Opened SQLite connection");
        Ok(Self {
            db: Arc::new(Mutex::new(RawDb(db))),
            path: config.path.clone(),
            auto_commit: false,
        })
    }

    /// Open a private in-memory database.
    pub fn open_memory() -> Result<Self> {
        Self::open(&SqliteConfig::memory())
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Whether a transaction is currently open on this handle.
    pub fn in_transaction(&self) -> bool {
        let db = lock(&self.db);
        // SAFETY: db is valid.
        unsafe { ffi::sqlite3_get_autocommit(db.0) == 0 }
    }

    /// Run SQL text directly, with no implicit `BEGIN`. The text may hold
    /// several statements.
    pub fn execute_raw(&self, sql: &str) -> Result<()> {
        let db = lock(&self.db);
        exec(&db, sql)
    }

    /// Prepare `sql`, opening the implicit transaction first when the
    /// statement may write.
    fn prepare(&self, db: &RawDb, sql: &str) -> Result<Stmt> {
        let c_sql = CString::new(sql).map_err(|_| {
            Error::driver(DriverErrorKind::Syntax, "SQL contains a NUL byte", Some(sql))
        })?;
        let mut stmt: *mut ffi::sqlite3_stmt = ptr::null_mut();
        // SAFETY: valid pointers; the return code is checked below.
        let rc = unsafe {
            ffi::sqlite3_prepare_v2(db.0, c_sql.as_ptr(), -1, &mut stmt, ptr::null_mut())
        };
        if rc != ffi::SQLITE_OK {
            return Err(last_error(db, Some(sql)));
        }
        if stmt.is_null() {
            return Err(Error::driver(
                DriverErrorKind::Syntax,
                "SQL text holds no statement",
                Some(sql),
            ));
        }
        let stmt = Stmt(stmt);

        // SAFETY: db and stmt are valid.
        let begin = unsafe {
            !self.auto_commit
                && ffi::sqlite3_get_autocommit(db.0) != 0
                && ffi::sqlite3_stmt_readonly(stmt.0) == 0
        };
        if begin {
            exec(db, "BEGIN")?;
        }
        Ok(stmt)
    }

    fn end_transaction(&mut self, sql: &str) -> Result<()> {
        let db = lock(&self.db);
        // SAFETY: db is valid.
        if unsafe { ffi::sqlite3_get_autocommit(db.0) } != 0 {
            return Ok(());
        }
        exec(&db, sql)
    }
}

impl DriverConnection for SqliteConnection {
    fn execute(&mut self, sql: &str) -> Result<u64> {
        let db = lock(&self.db);
        // SAFETY: db is valid.
        let before = unsafe { ffi::sqlite3_total_changes(db.0) };
        let stmt = self.prepare(&db, sql)?;
        loop {
            // SAFETY: stmt is valid and the handle is locked.
            match unsafe { ffi::sqlite3_step(stmt.0) } {
                ffi::SQLITE_ROW => {}
                ffi::SQLITE_DONE => break,
                _ => return Err(last_error(&db, Some(sql))),
            }
        }
        drop(stmt);
        // SAFETY: db is valid.
        let after = unsafe { ffi::sqlite3_total_changes(db.0) };
        Ok(u64::try_from(after - before).unwrap_or(0))
    }

    fn open_cursor(&mut self, sql: &str) -> Result<Box<dyn RowCursor>> {
        let db = lock(&self.db);
        let stmt = self.prepare(&db, sql)?;
        // SAFETY: stmt is valid.
        let columns = unsafe { types::column_names(stmt.0) };
        drop(db);
        Ok(Box::new(SqliteCursor {
            stmt: Some(stmt),
            db: Arc::clone(&self.db),
            columns,
            sql: sql.to_string(),
        }))
    }

    fn commit(&mut self) -> Result<()> {
        self.end_transaction("COMMIT")
    }

    fn rollback(&mut self) -> Result<()> {
        self.end_transaction("ROLLBACK")
    }

    /// Turning auto-commit on commits any open transaction first.
    fn set_auto_commit(&mut self, enabled: bool) -> Result<()> {
        if enabled && !self.auto_commit {
            self.commit()?;
        }
        self.auto_commit = enabled;
        Ok(())
    }

    fn last_insert_id(&mut self) -> Result<Value> {
        let db = lock(&self.db);
        // SAFETY: db is valid.
        Ok(Value::Int(unsafe { ffi::sqlite3_last_insert_rowid(db.0) }))
    }
}

impl fmt::Debug for SqliteConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqliteConnection")
            .field("path", &self.path)
            .field("auto_commit", &self.auto_commit)
            .finish_non_exhaustive()
    }
}

/// Forward-only cursor over one statement's rows.
///
/// Holds its own reference to the database handle, so it may outlive the
/// borrow of the connection that opened it. The statement is finalized
/// as soon as it is exhausted or fails.
pub struct SqliteCursor {
    // Declared before `db` so the statement is finalized first.
    stmt: Option<Stmt>,
    db: SharedDb,
    columns: Arc<[String]>,
    sql: String,
}

impl RowCursor for SqliteCursor {
    fn fetch_one(&mut self) -> Result<Option<Row>> {
        let Some(raw) = self.stmt.as_ref().map(|s| s.0) else {
            return Ok(None);
        };
        let db = lock(&self.db);
        // SAFETY: raw is a live statement and the handle is locked.
        match unsafe { ffi::sqlite3_step(raw) } {
            ffi::SQLITE_ROW => {
                let values = (0..self.columns.len())
                    .map(|i| {
                        let index = c_int::try_from(i).unwrap_or(c_int::MAX);
                        // SAFETY: the statement is on a row and `index` is in range.
                        unsafe { types::read_column(raw, index) }
                    })
                    .collect();
                Ok(Some(Row::with_columns(Arc::clone(&self.columns), values)))
            }
            ffi::SQLITE_DONE => {
                self.stmt = None;
                Ok(None)
            }
            _ => {
                let error = last_error(&db, Some(&self.sql));
                self.stmt = None;
                Err(error)
            }
        }
    }
}

impl fmt::Debug for SqliteCursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqliteCursor")
            .field("sql", &self.sql)
            .field("open", &self.stmt.is_some())
            .finish_non_exhaustive()
    }
}

fn exec(db: &RawDb, sql: &str) -> Result<()> {
    let c_sql = CString::new(sql)
        .map_err(|_| Error::driver(DriverErrorKind::Syntax, "SQL contains a NUL byte", Some(sql)))?;
    let mut errmsg: *mut std::ffi::c_char = ptr::null_mut();

    // SAFETY: all pointers are valid.
    let rc = unsafe { ffi::sqlite3_exec(db.0, c_sql.as_ptr(), None, ptr::null_mut(), &mut errmsg) };
    if rc == ffi::SQLITE_OK {
        return Ok(());
    }

    let message = if errmsg.is_null() {
        // SAFETY: errstr returns a static string for any code.
        unsafe { CStr::from_ptr(ffi::sqlite3_errstr(rc)) }
            .to_string_lossy()
            .into_owned()
    } else {
        // SAFETY: errmsg was allocated by SQLite and is freed once.
        unsafe {
            let message = CStr::from_ptr(errmsg).to_string_lossy().into_owned();
            ffi::sqlite3_free(errmsg.cast());
            message
        }
    };
    Err(Error::driver(error_kind(rc, &message), message, Some(sql)))
}

fn last_error(db: &RawDb, sql: Option<&str>) -> Error {
    // SAFETY: db is valid; errmsg points into SQLite-owned memory copied at once.
    let (code, message) = unsafe {
        let code = ffi::sqlite3_errcode(db.0);
        let message = CStr::from_ptr(ffi::sqlite3_errmsg(db.0))
            .to_string_lossy()
            .into_owned();
        (code, message)
    };
    Error::driver(error_kind(code, &message), message, sql)
}

fn error_kind(code: c_int, message: &str) -> DriverErrorKind {
    match code & 0xff {
        ffi::SQLITE_CONSTRAINT => DriverErrorKind::Constraint,
        ffi::SQLITE_BUSY | ffi::SQLITE_LOCKED => DriverErrorKind::Busy,
        ffi::SQLITE_NOTFOUND => DriverErrorKind::NotFound,
        ffi::SQLITE_CANTOPEN => DriverErrorKind::Connect,
        ffi::SQLITE_ERROR if message.starts_with("no such") => DriverErrorKind::NotFound,
        ffi::SQLITE_ERROR if message.contains("syntax error") => DriverErrorKind::Syntax,
        _ => DriverErrorKind::Database,
    }
}
