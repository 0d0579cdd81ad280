//! MySQL connection parameters.

use sqlconduit_core::{ParsedUri, Result};

/// What a native MySQL client needs to connect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MysqlConfig {
    /// Hostname or IP address
    pub host: String,
    /// Port number (default: 3306)
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
}

impl Default for MysqlConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 3306,
            user: String::new(),
            password: String::new(),
            database: String::new(),
        }
    }
}

impl MysqlConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a config from a `mysql:` URI.
    ///
    /// The database is the path without its slashes. Missing user and
    /// password become empty strings and a missing host is `localhost`.
    /// A `host:port` suffix overrides the default port.
    pub fn from_uri(uri: &ParsedUri) -> Result<Self> {
        let mut config = Self::new()
            .user(uri.user.clone().unwrap_or_default())
            .password(uri.password.clone().unwrap_or_default())
            .database(uri.path.trim_matches('/'));
        if let Some(host) = uri.host.as_deref() {
            config = match host.rsplit_once(':') {
                Some((name, port)) if !name.is_empty() => match port.parse() {
                    Ok(port) => config.host(name).port(port),
                    Err(_) => config.host(host),
                },
                _ => config.host(host),
            };
        }
        Ok(config)
    }

    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn user(mut self, user: impl Into<String>) -> Self {
        self.user = user.into();
        self
    }

    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = password.into();
        self
    }

    pub fn database(mut self, database: impl Into<String>) -> Self {
        self.database = database.into();
        self
    }
}
