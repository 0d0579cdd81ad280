//! Error types for SQLConduit operations.

use std::fmt;

/// The primary error type for all SQLConduit operations.
#[derive(Debug)]
pub enum Error {
    /// Malformed identifiers, duplicate or missing registrations, bad settings
    Config(ConfigError),
    /// Implicit commit/rollback attempted while implicit transactions are disallowed
    TransactionPolicy(TransactionPolicyError),
    /// Failure reported by the underlying database client
    Driver(DriverError),
    /// A dialect hook required by the generic layer was not supplied
    Unimplemented(UnimplementedError),
    /// Operation on a transaction that already terminated
    Transaction(TransactionError),
    /// Type conversion errors
    Type(TypeError),
    /// Custom error with message
    Custom(String),
}

#[derive(Debug)]
pub struct ConfigError {
    pub kind: ConfigErrorKind,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigErrorKind {
    /// URI does not follow `scheme:/...`
    MalformedUri,
    /// A different factory already claims the scheme
    DuplicateScheme,
    /// A different instance is already bound to the name
    DuplicateName,
    /// Name contains the reserved `:` separator
    ReservedName,
    /// No factory registered for the scheme
    UnknownScheme,
    /// No instance registered under the name
    UnknownName,
    /// The factory reports its driver is unavailable
    Unsupported,
    /// Select specification violates its invariants
    InvalidSelect,
    /// A configuration value could not be interpreted
    InvalidSetting,
}

/// Raised when a connection is released outside a transaction while the
/// auto-commit mode forbids implicit COMMIT/ROLLBACK.
#[derive(Debug)]
pub struct TransactionPolicyError {
    /// Issuance serial of the connection that was rolled back
    pub connection: u64,
}

#[derive(Debug)]
pub struct DriverError {
    pub kind: DriverErrorKind,
    pub message: String,
    pub sql: Option<String>,
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverErrorKind {
    /// Failed to establish the connection
    Connect,
    /// SQL could not be parsed
    Syntax,
    /// Constraint violation (unique, foreign key, not null)
    Constraint,
    /// Table or column not found
    NotFound,
    /// Database busy or locked
    Busy,
    /// Any other database error
    Database,
}

#[derive(Debug)]
pub struct UnimplementedError {
    pub dialect: &'static str,
    pub operation: &'static str,
}

#[derive(Debug)]
pub struct TransactionError {
    pub kind: TransactionErrorKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionErrorKind {
    AlreadyCommitted,
    AlreadyRolledBack,
}

#[derive(Debug)]
pub struct TypeError {
    pub expected: &'static str,
    pub actual: String,
    pub column: Option<String>,
}

impl Error {
    /// Shorthand for a configuration error.
    pub fn config(kind: ConfigErrorKind, message: impl Into<String>) -> Self {
        Error::Config(ConfigError {
            kind,
            message: message.into(),
        })
    }

    /// Shorthand for a driver error without an underlying source.
    pub fn driver(kind: DriverErrorKind, message: impl Into<String>, sql: Option<&str>) -> Self {
        Error::Driver(DriverError {
            kind,
            message: message.into(),
            sql: sql.map(str::to_string),
            source: None,
        })
    }

    /// Shorthand for a missing dialect hook.
    pub fn unimplemented(dialect: &'static str, operation: &'static str) -> Self {
        Error::Unimplemented(UnimplementedError { dialect, operation })
    }

    /// The configuration error kind, if this is a configuration error.
    pub fn config_kind(&self) -> Option<ConfigErrorKind> {
        match self {
            Error::Config(e) => Some(e.kind),
            _ => None,
        }
    }

    /// Is this an implicit-transaction policy violation?
    pub fn is_policy_violation(&self) -> bool {
        matches!(self, Error::TransactionPolicy(_))
    }

    /// Get the SQL that caused this error, if available
    pub fn sql(&self) -> Option<&str> {
        match self {
            Error::Driver(d) => d.sql.as_deref(),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Config(e) => write!(f, "Configuration error: {}", e.message),
            Error::TransactionPolicy(e) => write!(f, "{}", e),
            Error::Driver(e) => write!(f, "Driver error: {}", e),
            Error::Unimplemented(e) => write!(f, "{}", e),
            Error::Transaction(e) => write!(f, "Transaction error: {}", e),
            Error::Type(e) => write!(f, "Type error: {}", e),
            Error::Custom(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Driver(e) => e
                .source
                .as_deref()
                .map(|err| err as &(dyn std::error::Error + 'static)),
            _ => None,
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl fmt::Display for TransactionPolicyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Connection {} used outside of a transaction; implicit COMMIT or ROLLBACK not allowed",
            self.connection
        )
    }
}

impl fmt::Display for DriverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.sql {
            Some(sql) => write!(f, "{} (in `{}`)", self.message, sql),
            None => write!(f, "{}", self.message),
        }
    }
}

impl fmt::Display for UnimplementedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Dialect '{}' does not implement {}",
            self.dialect, self.operation
        )
    }
}

impl fmt::Display for TransactionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            TransactionErrorKind::AlreadyCommitted => write!(f, "transaction already committed"),
            TransactionErrorKind::AlreadyRolledBack => {
                write!(f, "transaction already rolled back")
            }
        }
    }
}

impl fmt::Display for TypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(col) = &self.column {
            write!(
                f,
                "expected {} for column '{}', found {}",
                self.expected, col, self.actual
            )
        } else {
            write!(f, "expected {}, found {}", self.expected, self.actual)
        }
    }
}

impl From<ConfigError> for Error {
    fn from(err: ConfigError) -> Self {
        Error::Config(err)
    }
}

impl From<TransactionPolicyError> for Error {
    fn from(err: TransactionPolicyError) -> Self {
        Error::TransactionPolicy(err)
    }
}

impl From<DriverError> for Error {
    fn from(err: DriverError) -> Self {
        Error::Driver(err)
    }
}

impl From<UnimplementedError> for Error {
    fn from(err: UnimplementedError) -> Self {
        Error::Unimplemented(err)
    }
}

impl From<TransactionError> for Error {
    fn from(err: TransactionError) -> Self {
        Error::Transaction(err)
    }
}

impl From<TypeError> for Error {
    fn from(err: TypeError) -> Self {
        Error::Type(err)
    }
}

/// Result type alias for SQLConduit operations.
pub type Result<T> = std::result::Result<T, Error>;
