//! Settings for opening SQLite databases.

use libsqlite3_sys as ffi;
use sqlconduit_core::{ConfigErrorKind, Error, ParsedUri, Result};
use std::ffi::c_int;
use std::sync::atomic::{AtomicU64, Ordering};

static MEMORY_DATABASES: AtomicU64 = AtomicU64::new(1);

/// Configuration for opening SQLite connections.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqliteConfig {
    /// Database file path, `:memory:`, or a `file:` URI filename.
    pub path: String,
    pub flags: OpenFlags,
    /// Busy timeout in milliseconds; 0 disables it.
    pub busy_timeout_ms: u32,
}

/// Flags controlling how the database is opened.
///
/// URI filenames are always enabled and handles are always opened in
/// serialized mode, since a cursor may share its handle with the
/// connection that opened it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpenFlags {
    pub read_only: bool,
    /// Create the file if it does not exist (ignored when read-only).
    pub create: bool,
    pub shared_cache: bool,
}

impl Default for OpenFlags {
    fn default() -> Self {
        Self {
            read_only: false,
            create: true,
            shared_cache: false,
        }
    }
}

impl OpenFlags {
    pub fn read_only() -> Self {
        Self {
            read_only: true,
            create: false,
            shared_cache: false,
        }
    }

    pub(crate) fn to_sqlite_flags(self) -> c_int {
        let mut flags = ffi::SQLITE_OPEN_URI | ffi::SQLITE_OPEN_FULLMUTEX;
        if self.read_only {
            flags |= ffi::SQLITE_OPEN_READONLY;
        } else {
            flags |= ffi::SQLITE_OPEN_READWRITE;
            if self.create {
                flags |= ffi::SQLITE_OPEN_CREATE;
            }
        }
        if self.shared_cache {
            flags |= ffi::SQLITE_OPEN_SHAREDCACHE;
        }
        flags
    }
}

impl Default for SqliteConfig {
    fn default() -> Self {
        Self {
            path: ":memory:".to_string(),
            flags: OpenFlags::default(),
            busy_timeout_ms: 5000,
        }
    }
}

impl SqliteConfig {
    /// A file-based database.
    pub fn file(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    /// A private in-memory database. Every connection opened from this
    /// config sees its own empty database.
    pub fn memory() -> Self {
        Self::default()
    }

    /// A named in-memory database shared by every connection of this
    /// process that opens the same name. It lives until the last of them
    /// closes.
    pub fn shared_memory(name: &str) -> Self {
        Self::file(format!("file:{name}?mode=memory&cache=shared"))
    }

    /// Build a config from a `sqlite:` URI.
    ///
    /// `sqlite:/path` and `sqlite:///path` name a file. The URI must not
    /// name a host. `sqlite:/:memory:` gets a fresh shared in-memory
    /// database, so every pooled connection sees the same data.
    pub fn from_uri(uri: &ParsedUri) -> Result<Self> {
        if let Some(host) = &uri.host {
            return Err(Error::config(
                ConfigErrorKind::MalformedUri,
                format!("sqlite URIs cannot name a host ({host:?}); use sqlite:///path"),
            ));
        }
        if uri.path == "/:memory:" {
            let n = MEMORY_DATABASES.fetch_add(1, Ordering::Relaxed);
            return Ok(Self::shared_memory(&format!("sqlconduit-memory-{n}")));
        }
        Ok(Self::file(uri.path.clone()))
    }

    pub fn flags(mut self, flags: OpenFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn busy_timeout(mut self, ms: u32) -> Self {
        self.busy_timeout_ms = ms;
        self
    }
}
