//! # Rollcall IDB
//!
//! Local JSON record store, shaped after IndexedDB. The page writes
//! attendance records here while offline; the worker's background-sync
//! probe only reads it.
//!
//! ```text
//! IdbFactory ── name ──▶ Database (version)
//!                            └── name ──▶ ObjectStore (StoreSchema)
//!                                            └── key ──▶ JSON value
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Record store errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IdbError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Constraint error: {0}")]
    Constraint(String),

    #[error("Data error: {0}")]
    Data(String),

    #[error("Version error: {0}")]
    Version(String),
}

pub type Result<T> = std::result::Result<T, IdbError>;

/// Where a record's key comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeySource {
    /// A top-level field of the record (string or number).
    Field(String),
    /// A counter owned by the store.
    Generated,
}

/// Name and keying of an object store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreSchema {
    pub name: String,
    pub key: KeySource,
}

impl StoreSchema {
    /// Records keyed by one of their own fields.
    pub fn keyed_by(name: &str, field: &str) -> Self {
        Self {
            name: name.to_string(),
            key: KeySource::Field(field.to_string()),
        }
    }

    /// Records keyed by a store-generated counter.
    pub fn generated(name: &str) -> Self {
        Self {
            name: name.to_string(),
            key: KeySource::Generated,
        }
    }
}

/// Records of one kind, ordered by key.
#[derive(Debug, Clone)]
pub struct ObjectStore {
    schema: StoreSchema,
    records: BTreeMap<String, JsonValue>,
    next_id: u64,
}

impl ObjectStore {
    pub fn new(schema: StoreSchema) -> Self {
        Self {
            schema,
            records: BTreeMap::new(),
            next_id: 1,
        }
    }

    pub fn name(&self) -> &str {
        &self.schema.name
    }

    pub fn schema(&self) -> &StoreSchema {
        &self.schema
    }

    /// Insert a new record. Fails if the key is taken.
    pub fn insert(&mut self, value: JsonValue) -> Result<String> {
        let key = self.key_for(&value)?;
        if self.records.contains_key(&key) {
            return Err(IdbError::Constraint(format!(
                "{}: key {key} already exists",
                self.schema.name
            )));
        }
        self.records.insert(key.clone(), value);
        Ok(key)
    }

    /// Insert or replace a record.
    pub fn upsert(&mut self, value: JsonValue) -> Result<String> {
        let key = self.key_for(&value)?;
        self.records.insert(key.clone(), value);
        Ok(key)
    }

    pub fn get(&self, key: &str) -> Option<&JsonValue> {
        self.records.get(key)
    }

    /// Records in key order.
    pub fn records(&self) -> impl Iterator<Item = (&str, &JsonValue)> {
        self.records.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn remove(&mut self, key: &str) -> Option<JsonValue> {
        self.records.remove(key)
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn key_for(&mut self, value: &JsonValue) -> Result<String> {
        match &self.schema.key {
            KeySource::Generated => {
                let id = self.next_id;
                self.next_id += 1;
                Ok(id.to_string())
            }
            KeySource::Field(field) => match value.get(field) {
                Some(JsonValue::String(s)) => Ok(s.clone()),
                Some(JsonValue::Number(n)) => Ok(n.to_string()),
                Some(other) => Err(IdbError::Data(format!(
                    "{}: key field {field} must be a string or number, got {other}",
                    self.schema.name
                ))),
                None => Err(IdbError::Data(format!(
                    "{}: record has no {field} field",
                    self.schema.name
                ))),
            },
        }
    }
}

/// A named, versioned set of object stores.
#[derive(Debug, Clone)]
pub struct Database {
    pub name: String,
    pub version: u64,
    stores: HashMap<String, ObjectStore>,
}

impl Database {
    pub fn new(name: &str, version: u64) -> Self {
        Self {
            name: name.to_string(),
            version,
            stores: HashMap::new(),
        }
    }

    /// Create a store. Fails if the name is taken.
    pub fn create_store(&mut self, schema: StoreSchema) -> Result<&mut ObjectStore> {
        if self.stores.contains_key(&schema.name) {
            return Err(IdbError::Constraint(format!(
                "{}: store {} already exists",
                self.name, schema.name
            )));
        }
        let name = schema.name.clone();
        Ok(self
            .stores
            .entry(name)
            .or_insert_with(|| ObjectStore::new(schema)))
    }

    pub fn store(&self, name: &str) -> Result<&ObjectStore> {
        self.stores
            .get(name)
            .ok_or_else(|| IdbError::NotFound(format!("{}: store {name}", self.name)))
    }

    pub fn store_mut(&mut self, name: &str) -> Result<&mut ObjectStore> {
        let db = &self.name;
        self.stores
            .get_mut(name)
            .ok_or_else(|| IdbError::NotFound(format!("{db}: store {name}")))
    }

    /// Store names, sorted.
    pub fn store_names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.stores.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

/// Name and version of an existing database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseInfo {
    pub name: String,
    pub version: u64,
}

/// Entry point to the record store. Clones share the same databases.
#[derive(Debug, Clone, Default)]
pub struct IdbFactory {
    databases: Arc<RwLock<HashMap<String, Database>>>,
}

impl IdbFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a database, creating it or raising its version. Stores survive
    /// a version change. `None` opens at the current version (1 if new).
    pub async fn open(&self, name: &str, version: Option<u64>) -> Result<u64> {
        let mut databases = self.databases.write().await;

        let current = databases.get(name).map(|db| db.version);
        let requested = version.unwrap_or_else(|| current.unwrap_or(1));

        match current {
            Some(current) if requested < current => {
                return Err(IdbError::Version(format!(
                    "{name}: cannot open version {requested}, already at {current}"
                )));
            }
            Some(current) if requested > current => {
                debug!(db = name, from = current, to = requested, "Upgrading database");
            }
            Some(_) => {}
            None => info!(db = name, version = requested, "Creating database"),
        }

        let db = databases
            .entry(name.to_string())
            .or_insert_with(|| Database::new(name, requested));
        db.version = requested;
        Ok(requested)
    }

    /// Delete a database. Deleting one that does not exist is fine.
    pub async fn delete_database(&self, name: &str) {
        if self.databases.write().await.remove(name).is_some() {
            info!(db = name, "Database deleted");
        }
    }

    /// Existing databases, sorted by name.
    pub async fn databases(&self) -> Vec<DatabaseInfo> {
        let databases = self.databases.read().await;
        let mut infos: Vec<_> = databases
            .values()
            .map(|db| DatabaseInfo {
                name: db.name.clone(),
                version: db.version,
            })
            .collect();
        infos.sort_by(|a, b| a.name.cmp(&b.name));
        infos
    }

    /// Run a read-only closure against a database.
    pub async fn read<R>(&self, name: &str, f: impl FnOnce(&Database) -> Result<R>) -> Result<R> {
        let databases = self.databases.read().await;
        let db = databases
            .get(name)
            .ok_or_else(|| IdbError::NotFound(format!("database {name}")))?;
        f(db)
    }

    /// Run a read-write closure against a database.
    pub async fn write<R>(
        &self,
        name: &str,
        f: impl FnOnce(&mut Database) -> Result<R>,
    ) -> Result<R> {
        let mut databases = self.databases.write().await;
        let db = databases
            .get_mut(name)
            .ok_or_else(|| IdbError::NotFound(format!("database {name}")))?;
        f(db)
    }

    /// Number of records in a store.
    pub async fn count(&self, db: &str, store: &str) -> Result<usize> {
        self.read(db, |db| Ok(db.store(store)?.len())).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_field_keys() {
        let mut store = ObjectStore::new(StoreSchema::keyed_by("pending", "id"));

        assert_eq!(store.insert(json!({"id": "r1", "kind": "checkin"})).unwrap(), "r1");
        assert_eq!(store.insert(json!({"id": 7, "kind": "checkin"})).unwrap(), "7");
        assert!(matches!(
            store.insert(json!({"id": "r1", "kind": "checkout"})),
            Err(IdbError::Constraint(_))
        ));
        assert!(matches!(store.insert(json!({"kind": "checkout"})), Err(IdbError::Data(_))));
        assert!(matches!(store.insert(json!({"id": [1, 2]})), Err(IdbError::Data(_))));
    }

    #[test]
    fn test_upsert_replaces() {
        let mut store = ObjectStore::new(StoreSchema::keyed_by("pending", "id"));
        store.insert(json!({"id": "r1", "kind": "checkin"})).unwrap();
        store.upsert(json!({"id": "r1", "kind": "checkout"})).unwrap();

        assert_eq!(store.len(), 1);
        assert_eq!(store.get("r1").unwrap()["kind"], "checkout");
    }

    #[test]
    fn test_generated_keys_in_order() {
        let mut store = ObjectStore::new(StoreSchema::generated("pending"));
        store.insert(json!({"kind": "checkin"})).unwrap();
        store.insert(json!({"kind": "checkout"})).unwrap();

        let keys: Vec<_> = store.records().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["1", "2"]);

        assert!(store.remove("1").is_some());
        assert!(store.remove("1").is_none());
        store.clear();
        assert!(store.is_empty());
    }

    #[test]
    fn test_database_stores() {
        let mut db = Database::new("attendance-db", 1);
        db.create_store(StoreSchema::generated("pending-records")).unwrap();
        db.create_store(StoreSchema::keyed_by("students", "id")).unwrap();

        assert!(matches!(
            db.create_store(StoreSchema::generated("students")),
            Err(IdbError::Constraint(_))
        ));
        assert_eq!(db.store_names(), vec!["pending-records", "students"]);
        assert!(matches!(db.store("missing"), Err(IdbError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_upgrade_keeps_records() {
        let idb = IdbFactory::new();
        assert_eq!(idb.open("attendance-db", None).await.unwrap(), 1);
        idb.write("attendance-db", |db| {
            db.create_store(StoreSchema::generated("pending-records"))?
                .insert(json!({"kind": "checkin"}))?;
            Ok(())
        })
        .await
        .unwrap();

        assert_eq!(idb.open("attendance-db", Some(3)).await.unwrap(), 3);
        assert_eq!(idb.count("attendance-db", "pending-records").await.unwrap(), 1);
        assert!(matches!(
            idb.open("attendance-db", Some(2)).await,
            Err(IdbError::Version(_))
        ));
        assert_eq!(idb.open("attendance-db", None).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_missing_database() {
        let idb = IdbFactory::new();
        assert!(matches!(
            idb.count("attendance-db", "pending-records").await,
            Err(IdbError::NotFound(_))
        ));

        idb.delete_database("attendance-db").await;
        assert!(idb.databases().await.is_empty());
    }

    #[tokio::test]
    async fn test_clones_share_databases() {
        let idb = IdbFactory::new();
        let other = idb.clone();
        idb.open("b", None).await.unwrap();
        other.open("a", Some(2)).await.unwrap();

        assert_eq!(
            idb.databases().await,
            vec![
                DatabaseInfo {
                    name: "a".to_string(),
                    version: 2
                },
                DatabaseInfo {
                    name: "b".to_string(),
                    version: 1
                },
            ]
        );
    }
}
