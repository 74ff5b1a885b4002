//! Remote Data Client
//!
//! Table-style access to the hosted backend plus bucket object storage.
//!
//! ## Architecture
//!
//! - **DataStore**: select/insert/update/delete against named tables
//! - **ObjectStore**: bucket listing, non-overwriting puts, public URLs
//! - **RestClient**: both traits over the hosted REST endpoints
//! - **MemoryBackend**: both traits in process, for tests and demos
//!
//! Rows travel as `serde_json::Value`; the typed helpers at the bottom of
//! this module decode them into the crate's models.

mod error;
mod memory;
mod rest;

pub use error::{BackendError, BackendResult};
pub use memory::{MemoryBackend, Operation};
pub use rest::{RestClient, RestConfig};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Row filter understood by every backend
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// `column = value`
    Eq(String, String),
    /// `column IS NOT NULL`
    NotNull(String),
}

impl Filter {
    pub fn eq(column: impl Into<String>, value: impl Into<String>) -> Self {
        Filter::Eq(column.into(), value.into())
    }

    pub fn column(&self) -> &str {
        match self {
            Filter::Eq(c, _) | Filter::NotNull(c) => c,
        }
    }
}

/// Sort order for a select
#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    pub column: String,
    pub ascending: bool,
}

/// A select query: filters, optional ordering, optional limit
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Select {
    pub filters: Vec<Filter>,
    pub order: Option<Order>,
    pub limit: Option<usize>,
}

impl Select {
    /// Every row of the table
    pub fn all() -> Self {
        Self::default()
    }

    pub fn eq(mut self, column: impl Into<String>, value: impl Into<String>) -> Self {
        self.filters.push(Filter::eq(column, value));
        self
    }

    pub fn not_null(mut self, column: impl Into<String>) -> Self {
        self.filters.push(Filter::NotNull(column.into()));
        self
    }

    pub fn order_by(mut self, column: impl Into<String>, ascending: bool) -> Self {
        self.order = Some(Order {
            column: column.into(),
            ascending,
        });
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Table-style operations against the hosted database
#[async_trait]
pub trait DataStore: Send + Sync {
    /// Rows matching the query
    async fn select(&self, table: &str, query: &Select) -> BackendResult<Vec<Value>>;

    /// Insert one row and return it as stored (with generated columns)
    async fn insert(&self, table: &str, row: Value) -> BackendResult<Value>;

    /// Patch every row matching `filters`, returning the updated rows
    async fn update(&self, table: &str, filters: &[Filter], patch: Value)
        -> BackendResult<Vec<Value>>;

    /// Delete every row matching `filters`, returning how many went away
    async fn delete(&self, table: &str, filters: &[Filter]) -> BackendResult<usize>;
}

/// A storage bucket as reported by the hosted service
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct Bucket {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub public: bool,
}

/// Payload and options for a single object put
#[derive(Debug, Clone)]
pub struct ObjectUpload {
    pub bytes: Vec<u8>,
    pub content_type: String,
    pub cache_control_secs: u64,
    /// Overwrite an existing object at the same path
    pub upsert: bool,
}

/// Bucket-style object storage
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn list_buckets(&self) -> BackendResult<Vec<Bucket>>;

    async fn put_object(&self, bucket: &str, path: &str, upload: ObjectUpload)
        -> BackendResult<()>;

    /// Public URL of an object; no request is made
    fn public_url(&self, bucket: &str, path: &str) -> String;
}

// ============================================
// Typed helpers
// ============================================

/// Decode raw rows into `T`
pub fn decode_rows<T: DeserializeOwned>(rows: Vec<Value>) -> BackendResult<Vec<T>> {
    rows.into_iter()
        .map(|row| serde_json::from_value(row).map_err(BackendError::from))
        .collect()
}

/// Select and decode
pub async fn fetch_rows<T: DeserializeOwned>(
    store: &dyn DataStore,
    table: &str,
    query: &Select,
) -> BackendResult<Vec<T>> {
    decode_rows(store.select(table, query).await?)
}

/// First row matching the query, if any
pub async fn fetch_one<T: DeserializeOwned>(
    store: &dyn DataStore,
    table: &str,
    query: Select,
) -> BackendResult<Option<T>> {
    let rows = store.select(table, &query.limit(1)).await?;
    match rows.into_iter().next() {
        Some(row) => Ok(Some(serde_json::from_value(row)?)),
        None => Ok(None),
    }
}

/// Serialize, insert and decode the stored representation
pub async fn insert_row<N: Serialize + Sync, T: DeserializeOwned>(
    store: &dyn DataStore,
    table: &str,
    row: &N,
) -> BackendResult<T> {
    let stored = store.insert(table, serde_json::to_value(row)?).await?;
    Ok(serde_json::from_value(stored)?)
}
