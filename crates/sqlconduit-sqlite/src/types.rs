//! Reading SQLite result columns into [`Value`]s.
//!
//! SQLite has five storage classes; each maps to one `Value` variant:
//!
//! | Storage class | Value |
//! |---------------|-------|
//! | NULL | `Null` |
//! | INTEGER | `Int` |
//! | REAL | `Double` |
//! | TEXT | `Text` (invalid UTF-8 replaced) |
//! | BLOB | `Bytes` |
//!
//! Writing goes the other way through SQL literals, so there is no binding
//! code here.

use libsqlite3_sys as ffi;
use sqlconduit_core::Value;
use std::ffi::{CStr, c_int};
use std::sync::Arc;

/// Read one column of the current row.
///
/// # Safety
/// - `stmt` must be a valid prepared statement positioned on a row
/// - `index` must be a valid 0-based column index
pub unsafe fn read_column(stmt: *mut ffi::sqlite3_stmt, index: c_int) -> Value {
    // SAFETY: upheld by the caller.
    unsafe {
        match ffi::sqlite3_column_type(stmt, index) {
            ffi::SQLITE_INTEGER => Value::Int(ffi::sqlite3_column_int64(stmt, index)),
            ffi::SQLITE_FLOAT => Value::Double(ffi::sqlite3_column_double(stmt, index)),
            ffi::SQLITE_TEXT => {
                let ptr = ffi::sqlite3_column_text(stmt, index);
                if ptr.is_null() {
                    return Value::Null;
                }
                let len = usize::try_from(ffi::sqlite3_column_bytes(stmt, index)).unwrap_or(0);
                let bytes = std::slice::from_raw_parts(ptr, len);
                Value::Text(String::from_utf8_lossy(bytes).into_owned())
            }
            ffi::SQLITE_BLOB => {
                let ptr = ffi::sqlite3_column_blob(stmt, index);
                let len = usize::try_from(ffi::sqlite3_column_bytes(stmt, index)).unwrap_or(0);
                if ptr.is_null() || len == 0 {
                    Value::Bytes(Vec::new())
                } else {
                    Value::Bytes(std::slice::from_raw_parts(ptr.cast::<u8>(), len).to_vec())
                }
            }
            _ => Value::Null,
        }
    }
}

/// Column names of a prepared statement, shared by every row it yields.
///
/// # Safety
/// `stmt` must be a valid prepared statement.
pub unsafe fn column_names(stmt: *mut ffi::sqlite3_stmt) -> Arc<[String]> {
    // SAFETY: upheld by the caller.
    let count = unsafe { ffi::sqlite3_column_count(stmt) };
    (0..count)
        .map(|i| {
            // SAFETY: `i` is below the column count.
            let ptr = unsafe { ffi::sqlite3_column_name(stmt, i) };
            if ptr.is_null() {
                format!("col{i}")
            } else {
                // SAFETY: SQLite returns a NUL-terminated string valid until the next call.
                unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned()
            }
        })
        .collect()
}
