//! The MySQL dialect and its `mysql:` URI factory.
//!
//! This crate speaks no wire protocol. Connections come from a
//! [`MysqlConnector`] supplied by the application, typically a thin
//! adapter over whichever MySQL client it already links.

use crate::config::MysqlConfig;
use sqlconduit_core::{
    ColumnDef, Dialect, DriverConnection, EntityDescriptor, Error, ParsedUri, Result, Value,
    ansi_literal,
};
use sqlconduit_session::{ConnectionFactory, ConnectionRegistry, Database, DatabaseConfig};
use std::fmt;
use std::sync::Arc;

/// URI schemes served by [`MysqlFactory`].
pub const SCHEMES: &[&str] = &["mysql"];

/// Opens a native MySQL connection.
pub type MysqlConnector =
    Arc<dyn Fn(&MysqlConfig) -> Result<Box<dyn DriverConnection>> + Send + Sync>;

/// MySQL SQL fragments.
///
/// Connections are treated as non-transactional: releasing one never
/// issues COMMIT or ROLLBACK.
#[derive(Clone, Default)]
pub struct MysqlDialect {
    config: MysqlConfig,
    connector: Option<MysqlConnector>,
}

impl MysqlDialect {
    pub fn new(config: MysqlConfig) -> Self {
        Self {
            config,
            connector: None,
        }
    }

    pub fn connector(mut self, connector: MysqlConnector) -> Self {
        self.connector = Some(connector);
        self
    }

    pub fn config(&self) -> &MysqlConfig {
        &self.config
    }
}

impl Dialect for MysqlDialect {
    fn name(&self) -> &'static str {
        "mysql"
    }

    fn supports_transactions(&self) -> bool {
        false
    }

    fn connect(&self) -> Result<Box<dyn DriverConnection>> {
        let connector = self
            .connector
            .as_ref()
            .ok_or_else(|| Error::unimplemented(self.name(), "connect"))?;
        tracing::debug!(
            host = %self.config.host,
            port = self.config.port,
            database = %self.config.database,
            "Opening MySQL connection"
        );
        connector(&self.config)
    }

    fn limit_offset(&self, start: u64, end: Option<u64>) -> Result<String> {
        Ok(match (start, end) {
            (0, Some(end)) => format!("LIMIT {end}"),
            (start, None) => format!("LIMIT {start}, -1"),
            (start, Some(end)) => format!("LIMIT {start}, {}", end.saturating_sub(start)),
        })
    }

    fn create_column(&self, column: &ColumnDef) -> Result<String> {
        let mut sql = format!("{} {}", column.db_name, column.sql_type);
        if column.not_null {
            sql.push_str(" NOT NULL");
        }
        if let Some(default) = &column.default {
            sql.push_str(" DEFAULT ");
            sql.push_str(default);
        }
        Ok(sql)
    }

    fn create_id_column(&self, entity: &EntityDescriptor) -> Result<String> {
        Ok(format!("{} INT PRIMARY KEY AUTO_INCREMENT", entity.id_name))
    }

    fn join_sql_type(&self) -> Result<String> {
        Ok("INT NOT NULL".to_string())
    }

    /// Table names are compared case-insensitively.
    fn table_exists(&self, conn: &mut dyn DriverConnection, table: &str) -> Result<bool> {
        let rows = conn.query_all("SHOW TABLES")?;
        Ok(rows.iter().any(|row| {
            row.get(0)
                .and_then(Value::as_str)
                .is_some_and(|name| name.eq_ignore_ascii_case(table))
        }))
    }

    fn sql_literal(&self, value: &Value) -> String {
        match value {
            Value::Text(s) => mysql_quote(s),
            other => ansi_literal(other),
        }
    }
}

/// Quote a string the way `mysql_real_escape_string` does.
fn mysql_quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('\'');
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '"' => out.push_str("\\\""),
            '\0' => out.push_str("\\0"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\x1a' => out.push_str("\\Z"),
            c => out.push(c),
        }
    }
    out.push('\'');
    out
}

impl fmt::Debug for MysqlDialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MysqlDialect")
            .field("host", &self.config.host)
            .field("port", &self.config.port)
            .field("database", &self.config.database)
            .field("connector", &self.connector.is_some())
            .finish_non_exhaustive()
    }
}

/// Builds a [`Database`] for each `mysql:` URI.
///
/// Without a connector the factory reports itself unsupported, so
/// resolving a `mysql:` URI fails up front instead of at first use.
#[derive(Clone, Default)]
pub struct MysqlFactory {
    database: DatabaseConfig,
    connector: Option<MysqlConnector>,
}

impl MysqlFactory {
    pub fn new(database: DatabaseConfig) -> Self {
        Self {
            database,
            connector: None,
        }
    }

    pub fn connector(mut self, connector: MysqlConnector) -> Self {
        self.connector = Some(connector);
        self
    }

    /// Register this factory for [`SCHEMES`].
    pub fn register(self, registry: &ConnectionRegistry) -> Result<()> {
        registry.register(SCHEMES.iter().copied(), Arc::new(self))
    }
}

impl ConnectionFactory for MysqlFactory {
    fn is_supported(&self) -> bool {
        self.connector.is_some()
    }

    fn connection_from_uri(&self, uri: &ParsedUri) -> Result<Arc<Database>> {
        let mut dialect = MysqlDialect::new(MysqlConfig::from_uri(uri)?);
        if let Some(connector) = &self.connector {
            dialect = dialect.connector(Arc::clone(connector));
        }
        let db = Database::new(Arc::new(dialect), self.database.clone()).with_uri(uri.clone());
        Ok(Arc::new(db))
    }
}

impl fmt::Debug for MysqlFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MysqlFactory")
            .field("database", &self.database)
            .field("connector", &self.connector.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlconduit_core::{ConfigErrorKind, Row, RowCursor};
    use sqlconduit_session::Queryable;
    use std::sync::Mutex;

    /// Answers `SHOW TABLES` with a fixed list and records everything else.
    struct Scripted {
        tables: Vec<&'static str>,
        log: Arc<Mutex<Vec<String>>>,
    }

    struct Rows(std::vec::IntoIter<Row>);

    impl RowCursor for Rows {
        fn fetch_one(&mut self) -> Result<Option<Row>> {
            Ok(self.0.next())
        }
    }

    impl DriverConnection for Scripted {
        fn execute(&mut self, sql: &str) -> Result<u64> {
            self.log.lock().unwrap().push(sql.to_string());
            Ok(1)
        }

        fn open_cursor(&mut self, sql: &str) -> Result<Box<dyn RowCursor>> {
            self.log.lock().unwrap().push(sql.to_string());
            let rows: Vec<Row> = self
                .tables
                .iter()
                .map(|t| Row::new(vec!["Tables_in_db".into()], vec![Value::from(*t)]))
                .collect();
            Ok(Box::new(Rows(rows.into_iter())))
        }

        fn commit(&mut self) -> Result<()> {
            self.log.lock().unwrap().push("COMMIT".to_string());
            Ok(())
        }

        fn rollback(&mut self) -> Result<()> {
            self.log.lock().unwrap().push("ROLLBACK".to_string());
            Ok(())
        }

        fn last_insert_id(&mut self) -> Result<Value> {
            Ok(Value::Int(42))
        }
    }

    fn scripted(log: &Arc<Mutex<Vec<String>>>) -> MysqlConnector {
        let log = Arc::clone(log);
        Arc::new(move |_config: &MysqlConfig| {
            Ok(Box::new(Scripted {
                tables: vec!["Person", "tag"],
                log: Arc::clone(&log),
            }) as Box<dyn DriverConnection>)
        })
    }

    #[test]
    fn limit_fixtures() {
        let d = MysqlDialect::default();
        assert_eq!(d.limit_offset(0, Some(10)).unwrap(), "LIMIT 10");
        assert_eq!(d.limit_offset(5, None).unwrap(), "LIMIT 5, -1");
        assert_eq!(d.limit_offset(5, Some(10)).unwrap(), "LIMIT 5, 5");
    }

    #[test]
    fn ddl_fragments() {
        let d = MysqlDialect::default();
        let entity = EntityDescriptor::new("person");
        assert_eq!(
            d.create_id_column(&entity).unwrap(),
            "id INT PRIMARY KEY AUTO_INCREMENT"
        );
        assert_eq!(d.join_sql_type().unwrap(), "INT NOT NULL");
        let column = ColumnDef::new("name", "VARCHAR(100)").not_null();
        assert_eq!(d.create_column(&column).unwrap(), "name VARCHAR(100) NOT NULL");
        assert!(!d.supports_transactions());
    }

    #[test]
    fn literals_escape_backslashes() {
        let d = MysqlDialect::default();
        assert_eq!(d.sql_literal(&Value::from(r"a\'b")), r"'a\\\'b'");
        assert_eq!(d.sql_literal(&Value::from("line\n")), r"'line\n'");
        assert_eq!(d.sql_literal(&Value::Int(3)), "3");
        assert_eq!(d.sql_literal(&Value::Null), "NULL");
    }

    #[test]
    fn connect_without_connector_is_unimplemented() {
        let err = MysqlDialect::default().connect().err().unwrap();
        assert!(matches!(
            err,
            Error::Unimplemented(ref e) if e.dialect == "mysql" && e.operation == "connect"
        ));
    }

    #[test]
    fn table_exists_ignores_case() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let d = MysqlDialect::default().connector(scripted(&log));
        let mut conn = d.connect().unwrap();
        assert!(d.table_exists(&mut *conn, "person").unwrap());
        assert!(d.table_exists(&mut *conn, "TAG").unwrap());
        assert!(!d.table_exists(&mut *conn, "other").unwrap());
        assert_eq!(log.lock().unwrap()[0], "SHOW TABLES");
    }

    #[test]
    fn factory_support_follows_connector() {
        let registry = ConnectionRegistry::new();
        MysqlFactory::default().register(&registry).unwrap();
        let err = registry.resolve("mysql://bob@dbhost/mydb").unwrap_err();
        assert_eq!(err.config_kind(), Some(ConfigErrorKind::Unsupported));
    }

    #[test]
    fn released_connections_skip_commit() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let registry = ConnectionRegistry::new();
        MysqlFactory::default()
            .connector(scripted(&log))
            .register(&registry)
            .unwrap();
        let db = registry.resolve("mysql://bob@dbhost/mydb").unwrap();
        assert_eq!(db.uri().as_deref(), Some("mysql://bob@dbhost/mydb"));

        db.query("DELETE FROM person").unwrap();
        let id = db
            .query_insert_id("person", "id", None, &["name"], &[Value::from("Ann")])
            .unwrap();
        assert_eq!(id, Value::Int(42));
        assert_eq!(
            *log.lock().unwrap(),
            ["DELETE FROM person", "INSERT INTO person (name) VALUES ('Ann')"]
        );
    }
}
