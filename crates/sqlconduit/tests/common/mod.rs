//! Shared fixtures: a scripted in-process driver that records every call,
//! and a small `Person` entity.

#![allow(dead_code)]

use sqlconduit::error::TypeError;
use sqlconduit::{
    Cached, ColumnDef, Database, DatabaseConfig, Dialect, DriverConnection, DriverErrorKind,
    EntityDescriptor, Error, Hydrate, Result, Row, RowCursor, Value,
};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock};

/// State shared by a scripted dialect and all its connections.
#[derive(Default)]
pub struct Script {
    log: Mutex<Vec<String>>,
    rows: Mutex<Vec<Vec<Value>>>,
    fail_on: Mutex<Option<String>>,
    fail_commit: AtomicBool,
    opened: AtomicUsize,
}

impl Script {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Rows returned by every cursor opened from now on.
    pub fn set_rows(&self, rows: Vec<Vec<Value>>) {
        *self.rows.lock().unwrap() = rows;
    }

    /// Make statements containing `needle` fail.
    pub fn fail_on(&self, needle: &str) {
        *self.fail_on.lock().unwrap() = Some(needle.to_string());
    }

    pub fn fail_commit(&self, fail: bool) {
        self.fail_commit.store(fail, Ordering::SeqCst);
    }

    pub fn log(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    pub fn clear_log(&self) {
        self.log.lock().unwrap().clear();
    }

    /// Entries equal to `entry`, across all connections.
    pub fn count(&self, entry: &str) -> usize {
        self.log()
            .iter()
            .filter(|line| line.split_once(": ").is_some_and(|(_, rest)| rest == entry))
            .count()
    }

    fn record(&self, conn: usize, entry: &str) {
        self.log.lock().unwrap().push(format!("{conn}: {entry}"));
    }

    fn check(&self, sql: &str) -> Result<()> {
        match &*self.fail_on.lock().unwrap() {
            Some(needle) if sql.contains(needle.as_str()) => Err(Error::driver(
                DriverErrorKind::Database,
                "scripted failure",
                Some(sql),
            )),
            _ => Ok(()),
        }
    }
}

/// A dialect whose connections only record what they are asked to do.
pub struct Scripted {
    pub script: Arc<Script>,
    pub transactional: bool,
}

impl Scripted {
    pub fn database(script: &Arc<Script>, config: DatabaseConfig) -> Database {
        let dialect = Self {
            script: Arc::clone(script),
            transactional: true,
        };
        Database::new(Arc::new(dialect), config)
    }
}

impl Dialect for Scripted {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn supports_transactions(&self) -> bool {
        self.transactional
    }

    fn connect(&self) -> Result<Box<dyn DriverConnection>> {
        let id = self.script.opened.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(Box::new(ScriptedConnection {
            id,
            script: Arc::clone(&self.script),
        }))
    }

    fn limit_offset(&self, start: u64, end: Option<u64>) -> Result<String> {
        Ok(match (start, end) {
            (0, Some(end)) => format!("LIMIT {end}"),
            (start, None) => format!("LIMIT -1 OFFSET {start}"),
            (start, Some(end)) => format!("LIMIT {} OFFSET {start}", end - start),
        })
    }
}

pub struct ScriptedConnection {
    id: usize,
    script: Arc<Script>,
}

impl DriverConnection for ScriptedConnection {
    fn execute(&mut self, sql: &str) -> Result<u64> {
        self.script.record(self.id, sql);
        self.script.check(sql)?;
        Ok(1)
    }

    fn open_cursor(&mut self, sql: &str) -> Result<Box<dyn RowCursor>> {
        self.script.record(self.id, sql);
        self.script.check(sql)?;
        let rows = self.script.rows.lock().unwrap().clone();
        Ok(Box::new(ScriptedCursor {
            id: self.id,
            script: Arc::clone(&self.script),
            rows: rows.into_iter(),
        }))
    }

    fn commit(&mut self) -> Result<()> {
        self.script.record(self.id, "COMMIT");
        if self.script.fail_commit.load(Ordering::SeqCst) {
            return Err(Error::driver(DriverErrorKind::Busy, "scripted commit failure", None));
        }
        Ok(())
    }

    fn rollback(&mut self) -> Result<()> {
        self.script.record(self.id, "ROLLBACK");
        Ok(())
    }

    fn set_auto_commit(&mut self, enabled: bool) -> Result<()> {
        self.script.record(self.id, &format!("autocommit={enabled}"));
        Ok(())
    }

    fn last_insert_id(&mut self) -> Result<Value> {
        Ok(Value::Int(100))
    }
}

struct ScriptedCursor {
    id: usize,
    script: Arc<Script>,
    rows: std::vec::IntoIter<Vec<Value>>,
}

impl RowCursor for ScriptedCursor {
    fn fetch_one(&mut self) -> Result<Option<Row>> {
        Ok(self.rows.next().map(|values| {
            let names = (0..values.len()).map(|i| format!("col{i}")).collect();
            Row::new(names, values)
        }))
    }
}

impl Drop for ScriptedCursor {
    fn drop(&mut self) {
        self.script.record(self.id, "CLOSE");
    }
}

/// A row-mapped entity with one `name` column.
#[derive(Debug)]
pub struct Person {
    pub id: i64,
    name: Mutex<Option<String>>,
    expired: AtomicBool,
    /// Times `sync` repopulated this instance
    pub syncs: AtomicUsize,
}

impl Person {
    pub fn name(&self) -> Option<String> {
        self.name.lock().unwrap().clone()
    }
}

fn name_from(columns: &[Value]) -> Result<Option<String>> {
    match columns.first() {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Text(name)) => Ok(Some(name.clone())),
        Some(other) => Err(Error::Type(TypeError {
            expected: "TEXT",
            actual: other.type_name().to_string(),
            column: Some("name".to_string()),
        })),
    }
}

impl Cached for Person {
    fn expire(&self) {
        self.expired.store(true, Ordering::SeqCst);
    }

    fn is_expired(&self) -> bool {
        self.expired.load(Ordering::SeqCst)
    }
}

impl Hydrate for Person {
    fn descriptor() -> &'static EntityDescriptor {
        static PERSON: OnceLock<EntityDescriptor> = OnceLock::new();
        PERSON.get_or_init(|| {
            EntityDescriptor::new("person").column(ColumnDef::new("name", "TEXT"))
        })
    }

    fn hydrate(id: Value, columns: Option<Vec<Value>>) -> Result<Self> {
        let id = id.as_i64().ok_or_else(|| {
            Error::Type(TypeError {
                expected: "INTEGER",
                actual: id.type_name().to_string(),
                column: Some("id".to_string()),
            })
        })?;
        let name = match &columns {
            Some(columns) => name_from(columns)?,
            None => None,
        };
        Ok(Self {
            id,
            name: Mutex::new(name),
            expired: AtomicBool::new(false),
            syncs: AtomicUsize::new(0),
        })
    }

    fn sync(&self, columns: Vec<Value>) -> Result<()> {
        *self.name.lock().unwrap() = name_from(&columns)?;
        self.expired.store(false, Ordering::SeqCst);
        self.syncs.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub fn person_rows(rows: &[(i64, &str)]) -> Vec<Vec<Value>> {
    rows.iter()
        .map(|(id, name)| vec![Value::Int(*id), Value::from(*name)])
        .collect()
}
