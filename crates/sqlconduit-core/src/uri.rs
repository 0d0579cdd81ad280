//! Connection URI parsing.
//!
//! Grammar, applied to everything after the first `:`:
//!
//! - `/path` (exactly one slash): no host, path is the remainder.
//! - `///path`: no host, path is the remainder after the third slash.
//! - `//host/path` or `//host`: host up to the next slash, path after it.
//!
//! A host containing `@` carries `user[:password]` before the first `@`.
//! The returned path always starts with `/`.

use crate::error::{ConfigErrorKind, Error};
use crate::Result;
use std::fmt;

/// The components of a `scheme:/...` connection URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedUri {
    pub scheme: String,
    pub user: Option<String>,
    pub password: Option<String>,
    pub host: Option<String>,
    pub path: String,
}

impl ParsedUri {
    /// Parse a connection URI.
    pub fn parse(uri: &str) -> Result<Self> {
        let (scheme, rest) = uri.split_once(':').ok_or_else(|| {
            Error::config(
                ConfigErrorKind::MalformedUri,
                format!("URI {uri:?} has no scheme separator"),
            )
        })?;
        if scheme.is_empty() {
            return Err(Error::config(
                ConfigErrorKind::MalformedUri,
                format!("URI {uri:?} has an empty scheme"),
            ));
        }
        if !rest.starts_with('/') {
            return Err(Error::config(
                ConfigErrorKind::MalformedUri,
                format!("URIs must start with scheme:/ -- you did not include a / (in {rest:?})"),
            ));
        }

        let (host, rest) = if !rest.starts_with("//") {
            (None, &rest[1..])
        } else if let Some(after) = rest.strip_prefix("///") {
            (None, after)
        } else {
            let after = &rest[2..];
            match after.split_once('/') {
                Some((host, path)) => (Some(host), path),
                None => (Some(after), ""),
            }
        };

        let host = host.filter(|h| !h.is_empty());
        let (user, password, host) = match host.and_then(|h| h.split_once('@')) {
            Some((auth, real_host)) => {
                let (user, password) = match auth.split_once(':') {
                    Some((user, password)) => (user, Some(password.to_string())),
                    None => (auth, None),
                };
                (Some(user.to_string()), password, Some(real_host.to_string()))
            }
            None => (None, None, host.map(str::to_string)),
        };

        Ok(Self {
            scheme: scheme.to_string(),
            user,
            password,
            host,
            path: format!("/{rest}"),
        })
    }
}

impl fmt::Display for ParsedUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://", self.scheme)?;
        if let Some(user) = &self.user {
            write!(f, "{user}")?;
            if let Some(password) = &self.password {
                write!(f, ":{password}")?;
            }
            write!(f, "@")?;
        }
        if let Some(host) = &self.host {
            write!(f, "{host}")?;
        }
        write!(f, "{}", self.path)
    }
}
