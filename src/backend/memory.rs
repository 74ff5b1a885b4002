//! In-process backend
//!
//! Implements [`DataStore`] and [`ObjectStore`] over Tokio `RwLock`ed maps.
//! Generated columns (`id`, the creation timestamp, `upvotes`) are filled in
//! the way the hosted schema fills them. Operations can be made to fail per
//! table so callers' error paths can be exercised.

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
use tokio::sync::RwLock;

use super::{
    BackendError, BackendResult, Bucket, DataStore, Filter, ObjectStore, ObjectUpload, Select,
};

const PUBLIC_BASE: &str = "http://memory.local/storage/v1/object/public";

static NULL: Value = Value::Null;

/// Table operation kinds, used for failure injection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Select,
    Insert,
    Update,
    Delete,
}

#[derive(Debug, Clone)]
struct StoredObject {
    bytes: Vec<u8>,
    content_type: String,
}

/// In-memory stand-in for the hosted database and object storage
#[derive(Default)]
pub struct MemoryBackend {
    tables: RwLock<HashMap<String, Vec<Value>>>,
    buckets: RwLock<HashMap<String, HashMap<String, StoredObject>>>,
    failures: RwLock<HashSet<(String, Operation)>>,
    storage_down: RwLock<bool>,
    calls: AtomicUsize,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Backend with the given buckets already created
    pub async fn with_buckets(names: &[&str]) -> Self {
        let backend = Self::new();
        for name in names {
            backend.create_bucket(name).await;
        }
        backend
    }

    pub async fn create_bucket(&self, name: &str) {
        self.buckets
            .write()
            .await
            .entry(name.to_string())
            .or_default();
    }

    /// Make every `operation` on `table` fail with a 503
    pub async fn fail(&self, table: &str, operation: Operation) {
        self.failures
            .write()
            .await
            .insert((table.to_string(), operation));
    }

    /// Clear all injected failures
    pub async fn recover(&self) {
        self.failures.write().await.clear();
        *self.storage_down.write().await = false;
    }

    /// Make every storage call fail
    pub async fn fail_storage(&self) {
        *self.storage_down.write().await = true;
    }

    /// Number of calls served so far (successful or not)
    pub fn calls(&self) -> usize {
        self.calls.load(AtomicOrdering::SeqCst)
    }

    /// Raw rows of a table, in insertion order
    pub async fn rows(&self, table: &str) -> Vec<Value> {
        self.tables
            .read()
            .await
            .get(table)
            .cloned()
            .unwrap_or_default()
    }

    /// Stored object bytes and content type
    pub async fn object(&self, bucket: &str, path: &str) -> Option<(Vec<u8>, String)> {
        self.buckets
            .read()
            .await
            .get(bucket)
            .and_then(|objects| objects.get(path))
            .map(|o| (o.bytes.clone(), o.content_type.clone()))
    }

    pub async fn object_count(&self, bucket: &str) -> usize {
        self.buckets
            .read()
            .await
            .get(bucket)
            .map(HashMap::len)
            .unwrap_or(0)
    }

    async fn check(&self, table: &str, operation: Operation) -> BackendResult<()> {
        self.calls.fetch_add(1, AtomicOrdering::SeqCst);
        if self
            .failures
            .read()
            .await
            .contains(&(table.to_string(), operation))
        {
            return Err(BackendError::Api {
                status: 503,
                message: format!("{:?} on {} is failing", operation, table),
            });
        }
        Ok(())
    }

    async fn check_storage(&self) -> BackendResult<()> {
        self.calls.fetch_add(1, AtomicOrdering::SeqCst);
        if *self.storage_down.read().await {
            return Err(BackendError::Unavailable);
        }
        Ok(())
    }
}

/// Columns the hosted schema generates on insert
fn generated_columns(table: &str) -> Vec<(&'static str, Value)> {
    let now = Value::String(Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true));
    let id = Value::String(uuid::Uuid::new_v4().to_string());
    match table {
        "questions" => vec![("id", id), ("timestamp", now)],
        "answers" => vec![("id", id), ("timestamp", now), ("upvotes", Value::from(0))],
        _ => vec![("id", id), ("created_at", now)],
    }
}

fn matches(row: &Value, filter: &Filter) -> bool {
    let field = row.get(filter.column()).unwrap_or(&NULL);
    match filter {
        Filter::Eq(_, expected) => match field {
            Value::String(s) => s == expected,
            Value::Null => false,
            other => other.to_string() == *expected,
        },
        Filter::NotNull(_) => !field.is_null(),
    }
}

fn matches_all(row: &Value, filters: &[Filter]) -> bool {
    filters.iter().all(|f| matches(row, f))
}

/// Nulls first, then numbers, then strings
fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => Ordering::Less,
        (_, Value::Null) => Ordering::Greater,
        (Value::Number(x), Value::Number(y)) => {
            let x = x.as_f64().unwrap_or(0.0);
            let y = y.as_f64().unwrap_or(0.0);
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (x, y) => x.to_string().cmp(&y.to_string()),
    }
}

#[async_trait]
impl DataStore for MemoryBackend {
    async fn select(&self, table: &str, query: &Select) -> BackendResult<Vec<Value>> {
        self.check(table, Operation::Select).await?;

        let tables = self.tables.read().await;
        let mut rows: Vec<Value> = tables
            .get(table)
            .map(|rows| {
                rows.iter()
                    .filter(|row| matches_all(row, &query.filters))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        if let Some(order) = &query.order {
            // Stable sort keeps insertion order among equal keys
            rows.sort_by(|a, b| {
                let ord = compare_values(
                    a.get(&order.column).unwrap_or(&NULL),
                    b.get(&order.column).unwrap_or(&NULL),
                );
                if order.ascending {
                    ord
                } else {
                    ord.reverse()
                }
            });
        }
        if let Some(limit) = query.limit {
            rows.truncate(limit);
        }

        Ok(rows)
    }

    async fn insert(&self, table: &str, row: Value) -> BackendResult<Value> {
        self.check(table, Operation::Insert).await?;

        let mut fields: Map<String, Value> = match row {
            Value::Object(map) => map,
            other => {
                return Err(BackendError::Api {
                    status: 400,
                    message: format!("expected an object row, got {}", other),
                })
            }
        };
        for (column, value) in generated_columns(table) {
            let missing = fields.get(column).map_or(true, Value::is_null);
            if missing {
                fields.insert(column.to_string(), value);
            }
        }

        let stored = Value::Object(fields);
        self.tables
            .write()
            .await
            .entry(table.to_string())
            .or_default()
            .push(stored.clone());

        Ok(stored)
    }

    async fn update(
        &self,
        table: &str,
        filters: &[Filter],
        patch: Value,
    ) -> BackendResult<Vec<Value>> {
        self.check(table, Operation::Update).await?;

        let patch = match patch {
            Value::Object(map) => map,
            _ => return Ok(Vec::new()),
        };

        let mut tables = self.tables.write().await;
        let mut updated = Vec::new();
        if let Some(rows) = tables.get_mut(table) {
            for row in rows.iter_mut().filter(|row| matches_all(row, filters)) {
                if let Value::Object(fields) = row {
                    for (k, v) in &patch {
                        fields.insert(k.clone(), v.clone());
                    }
                }
                updated.push(row.clone());
            }
        }

        Ok(updated)
    }

    async fn delete(&self, table: &str, filters: &[Filter]) -> BackendResult<usize> {
        self.check(table, Operation::Delete).await?;

        let mut tables = self.tables.write().await;
        let Some(rows) = tables.get_mut(table) else {
            return Ok(0);
        };
        let before = rows.len();
        rows.retain(|row| !matches_all(row, filters));
        Ok(before - rows.len())
    }
}

#[async_trait]
impl ObjectStore for MemoryBackend {
    async fn list_buckets(&self) -> BackendResult<Vec<Bucket>> {
        self.check_storage().await?;

        let mut buckets: Vec<Bucket> = self
            .buckets
            .read()
            .await
            .keys()
            .map(|name| Bucket {
                id: name.clone(),
                name: name.clone(),
                public: true,
            })
            .collect();
        buckets.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(buckets)
    }

    async fn put_object(
        &self,
        bucket: &str,
        path: &str,
        upload: ObjectUpload,
    ) -> BackendResult<()> {
        self.check_storage().await?;

        let mut buckets = self.buckets.write().await;
        let objects = buckets
            .get_mut(bucket)
            .ok_or_else(|| BackendError::BucketNotFound(bucket.to_string()))?;

        if objects.contains_key(path) && !upload.upsert {
            return Err(BackendError::Conflict(path.to_string()));
        }
        objects.insert(
            path.to_string(),
            StoredObject {
                bytes: upload.bytes,
                content_type: upload.content_type,
            },
        );
        Ok(())
    }

    fn public_url(&self, bucket: &str, path: &str) -> String {
        format!("{}/{}/{}", PUBLIC_BASE, bucket, path)
    }
}
