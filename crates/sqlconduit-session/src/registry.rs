//! Resolution of database identifiers to live [`Database`] instances.
//!
//! An identifier is either a URI (`scheme:/...`) handled by the factory
//! registered for its scheme, or a plain name bound with
//! [`ConnectionRegistry::register_instance`]. Every successful resolution
//! is memoized under the exact identifier text, so two spellings of the
//! same database resolve to two separate instances.

use crate::database::Database;
use sqlconduit_core::{ConfigErrorKind, Error, ParsedUri, Result};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Builds databases for one or more URI schemes.
pub trait ConnectionFactory: Send + Sync {
    /// Whether the backend's client is usable in this process.
    fn is_supported(&self) -> bool {
        true
    }

    fn connection_from_uri(&self, uri: &ParsedUri) -> Result<Arc<Database>>;
}

#[derive(Default)]
struct RegistryState {
    schemes: HashMap<String, Arc<dyn ConnectionFactory>>,
    names: HashMap<String, Arc<Database>>,
    resolved: HashMap<String, Arc<Database>>,
}

/// Scheme and name registrations plus memoized resolutions.
///
/// Starts empty. Share it by reference (or `Arc`) with whatever needs to
/// resolve identifiers.
#[derive(Default)]
pub struct ConnectionRegistry {
    state: Mutex<RegistryState>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, RegistryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register `factory` for every scheme in `schemes`.
    ///
    /// Registering the same factory again is allowed; claiming a scheme
    /// already held by a different factory is an error, and in that case
    /// no scheme is registered.
    pub fn register<I, S>(&self, schemes: I, factory: Arc<dyn ConnectionFactory>) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let schemes: Vec<String> = schemes.into_iter().map(Into::into).collect();
        let mut state = self.state();
        for scheme in &schemes {
            if let Some(existing) = state.schemes.get(scheme) {
                if !Arc::ptr_eq(existing, &factory) {
                    return Err(Error::config(
                        ConfigErrorKind::DuplicateScheme,
                        format!("a driver has already been registered for the URI scheme {scheme}"),
                    ));
                }
            }
        }
        for scheme in schemes {
            tracing::debug!(scheme = %scheme, "Registered connection factory");
            state.schemes.insert(scheme, Arc::clone(&factory));
        }
        Ok(())
    }

    /// Bind `name` to an existing database.
    pub fn register_instance(&self, db: Arc<Database>, name: &str) -> Result<()> {
        if name.contains(':') {
            return Err(Error::config(
                ConfigErrorKind::ReservedName,
                format!("database names cannot contain ':' ({name:?})"),
            ));
        }
        let mut state = self.state();
        if let Some(existing) = state.names.get(name) {
            if !Arc::ptr_eq(existing, &db) {
                return Err(Error::config(
                    ConfigErrorKind::DuplicateName,
                    format!("an instance has already been registered with the name {name}"),
                ));
            }
        }
        tracing::debug!(name, "Registered database instance");
        state.names.insert(name.to_string(), db);
        Ok(())
    }

    /// Resolve a URI or registered name to a database.
    ///
    /// The result is cached under `identifier` for the registry's lifetime;
    /// later registrations do not affect identifiers already resolved.
    pub fn resolve(&self, identifier: &str) -> Result<Arc<Database>> {
        let factory = {
            let state = self.state();
            if let Some(db) = state.resolved.get(identifier) {
                return Ok(Arc::clone(db));
            }
            match identifier.split_once(':') {
                Some((scheme, _)) => {
                    let factory = state.schemes.get(scheme).cloned().ok_or_else(|| {
                        Error::config(
                            ConfigErrorKind::UnknownScheme,
                            format!("no driver exists for {scheme}"),
                        )
                    })?;
                    Some(factory)
                }
                None => None,
            }
        };

        let db = match factory {
            Some(factory) => {
                let uri = ParsedUri::parse(identifier)?;
                if !factory.is_supported() {
                    return Err(Error::config(
                        ConfigErrorKind::Unsupported,
                        format!("the driver for {} is not available", uri.scheme),
                    ));
                }
                // Opened outside the lock: factories may connect.
                factory.connection_from_uri(&uri)?
            }
            None => self.state().names.get(identifier).cloned().ok_or_else(|| {
                Error::config(
                    ConfigErrorKind::UnknownName,
                    format!("no database is registered under the name {identifier}"),
                )
            })?,
        };

        let mut state = self.state();
        let winner = state
            .resolved
            .entry(identifier.to_string())
            .or_insert(db);
        tracing::debug!(identifier, "Resolved database");
        Ok(Arc::clone(winner))
    }

    /// Whether `identifier` has a memoized resolution.
    pub fn is_cached(&self, identifier: &str) -> bool {
        self.state().resolved.contains_key(identifier)
    }
}

impl fmt::Debug for ConnectionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state();
        let mut schemes: Vec<&str> = state.schemes.keys().map(String::as_str).collect();
        schemes.sort_unstable();
        let mut names: Vec<&str> = state.names.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_struct("ConnectionRegistry")
            .field("schemes", &schemes)
            .field("names", &names)
            .field("resolved", &state.resolved.len())
            .finish()
    }
}
