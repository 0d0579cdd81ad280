mod common;

use common::Person;
use sqlconduit::prelude::*;
use sqlconduit::{Compare, builder, default_registry};

fn people_db(registry: &ConnectionRegistry) -> Arc<Database> {
    let db = registry.resolve("sqlite:/:memory:").unwrap();
    db.create_table(Person::descriptor()).unwrap();
    for name in ["Ann", "Bo", "Cy"] {
        db.query_insert_id("person", "id", None, &["name"], &[Value::from(name)])
            .unwrap();
    }
    db
}

fn names(db: &Database, options: SelectOptions) -> Vec<String> {
    let spec = SelectSpec::new(Person::descriptor()).options(options);
    db.iter_select::<Person>(&spec)
        .unwrap()
        .map(|p| p.unwrap().name().unwrap_or_default())
        .collect()
}

#[test]
fn crud_and_selects() {
    let registry = default_registry(DatabaseConfig::new()).unwrap();
    let db = people_db(&registry);
    assert!(db.table_exists("person").unwrap());
    assert!(!db.table_exists("nobody").unwrap());

    let id = db
        .query_insert_id("person", "id", Some(Value::Int(10)), &["name"], &[Value::from("Di")])
        .unwrap();
    assert_eq!(id, Value::Int(10));

    assert_eq!(
        names(&db, SelectOptions::new().order_by(["-name"])),
        ["Di", "Cy", "Bo", "Ann"]
    );
    assert_eq!(
        names(&db, SelectOptions::new().order_by(["name"]).slice(Some(1), Some(3)).unwrap()),
        ["Bo", "Cy"]
    );
    assert_eq!(
        names(&db, SelectOptions::new().order_by(["id"]).reversed(true).slice(Some(3), None).unwrap()),
        ["Ann"]
    );

    let spec = SelectSpec::new(Person::descriptor())
        .filter(Compare::ne("name", "Bo"))
        .options(SelectOptions::new().slice(None, Some(1)).unwrap());
    assert_eq!(db.count_select(&spec).unwrap(), 3);

    let entity = Person::descriptor();
    db.update_row(entity, &Value::Int(2), &[("name".to_string(), Value::from("Bob"))])
        .unwrap();
    let row = db.select_one(entity, &Value::Int(2), &["name"]).unwrap().unwrap();
    assert_eq!(row.get(0), Some(&Value::from("Bob")));

    db.delete_row(entity, &Value::Int(10)).unwrap();
    assert_eq!(db.select_ids(entity, "name", &Value::from("Di")).unwrap(), Vec::<Value>::new());
    assert_eq!(
        db.select_ids(entity, "name", &Value::from("Cy")).unwrap(),
        [Value::Int(3)]
    );

    let stats = db.stats();
    assert_eq!(stats.outstanding, 0);
    assert_eq!(stats.idle as u64, stats.created);
}

#[test]
fn rollback_restores_rows_and_expires_instances() {
    let registry = default_registry(DatabaseConfig::new()).unwrap();
    let db = people_db(&registry);
    let entity = Person::descriptor();

    let tx = db.transaction().unwrap();
    let ann: Arc<Person> = tx.get(1).unwrap().unwrap();
    tx.update_row(entity, &Value::Int(1), &[("name".to_string(), Value::from("Zed"))])
        .unwrap();
    assert_eq!(
        tx.select_one(entity, &Value::Int(1), &["name"]).unwrap().unwrap().get(0),
        Some(&Value::from("Zed"))
    );
    tx.rollback().unwrap();
    assert!(ann.is_expired());

    let fresh: Arc<Person> = db.get(1).unwrap().unwrap();
    assert_eq!(fresh.name().as_deref(), Some("Ann"));

    let tx = db.transaction().unwrap();
    tx.update_row(entity, &Value::Int(1), &[("name".to_string(), Value::from("Ava"))])
        .unwrap();
    tx.commit().unwrap();
    let row = db.select_one(entity, &Value::Int(1), &["name"]).unwrap().unwrap();
    assert_eq!(row.get(0), Some(&Value::from("Ava")));
}

#[test]
fn dropped_stream_leaves_no_lock_behind() {
    let registry = default_registry(DatabaseConfig::new()).unwrap();
    let db = people_db(&registry);
    let spec = SelectSpec::new(Person::descriptor());
    {
        let mut stream = db.iter_select::<Person>(&spec).unwrap();
        assert!(stream.next().unwrap().is_ok());
    }
    db.query("INSERT INTO person (name) VALUES ('Eve')").unwrap();
    assert_eq!(names(&db, SelectOptions::new()).len(), 4);
    assert_eq!(db.stats().created, 1);
}

#[test]
fn scope_stream_stops_at_commit() {
    let registry = default_registry(DatabaseConfig::new()).unwrap();
    let db = people_db(&registry);
    let spec = SelectSpec::new(Person::descriptor())
        .options(SelectOptions::new().order_by(["id"]));

    let tx = db.transaction().unwrap();
    let mut stream = tx.iter_select::<Person>(&spec).unwrap();
    assert_eq!(stream.next().unwrap().unwrap().id, 1);
    tx.commit().unwrap();
    assert!(stream.next().is_none());
    assert_eq!(stream.state(), StreamState::Released);
    drop(stream);

    db.query("INSERT INTO person (name) VALUES ('Eve')").unwrap();
    assert_eq!(names(&db, SelectOptions::new()).len(), 4);
}

#[test]
fn schema_helpers() {
    let registry = default_registry(DatabaseConfig::new()).unwrap();
    let db = people_db(&registry);

    let tags = JoinTable::new("person_tag", "person_id", "tag_id");
    db.create_join_table(&tags).unwrap();
    db.join_insert(&tags, &Value::Int(1), &Value::Int(7)).unwrap();
    db.join_insert(&tags, &Value::Int(1), &Value::Int(8)).unwrap();
    let mut linked = db.join_select(&tags, &Value::Int(1)).unwrap();
    linked.sort_by_key(|v| v.as_i64());
    assert_eq!(linked, [Value::Int(7), Value::Int(8)]);
    db.join_delete(&tags, &Value::Int(1), &Value::Int(7)).unwrap();
    assert_eq!(db.join_select(&tags, &Value::Int(1)).unwrap(), [Value::Int(8)]);
    db.drop_join_table(&tags).unwrap();
    assert!(!db.table_exists("person_tag").unwrap());

    db.add_column("person", &ColumnDef::new("email", "TEXT").default_sql("''"))
        .unwrap();
    let row = db
        .query_one("SELECT email FROM person WHERE id = 1")
        .unwrap()
        .unwrap();
    assert_eq!(row.get(0), Some(&Value::from("")));
    db.drop_column("person", "email").unwrap();

    db.clear_table("person").unwrap();
    assert!(names(&db, SelectOptions::new()).is_empty());
    db.drop_table("person").unwrap();
    assert!(!db.table_exists("person").unwrap());
}

#[test]
fn file_database_isolates_uncommitted_work() {
    let path = std::env::temp_dir().join(format!("sqlconduit-e2e-{}.db", std::process::id()));
    let _ = std::fs::remove_file(&path);
    let uri = format!("sqlite://{}", path.display());

    let registry = default_registry(DatabaseConfig::new()).unwrap();
    let db = registry.resolve(&uri).unwrap();
    db.create_table(Person::descriptor()).unwrap();

    let count = |db: &Database| {
        let spec = SelectSpec::new(Person::descriptor());
        db.count_select(&spec).unwrap()
    };

    let tx = db.transaction().unwrap();
    tx.query_insert_id("person", "id", None, &["name"], &[Value::from("Ann")])
        .unwrap();
    assert_eq!(count(&db), 0);
    tx.commit().unwrap();
    assert_eq!(count(&db), 1);

    // Writes outside a transaction are committed on release.
    let sql = builder::insert_sql(db.dialect(), "person", &["name"], &[Value::from("Bo")]);
    db.query(&sql).unwrap();
    let other = sqlconduit::sqlite::SqliteFactory::default();
    let registry = ConnectionRegistry::new();
    other.register(&registry).unwrap();
    assert_eq!(count(&registry.resolve(&uri).unwrap()), 2);

    drop(tx);
    drop(db);
    let _ = std::fs::remove_file(&path);
}
