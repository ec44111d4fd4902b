//! In-memory record store.
//!
//! [`MemoryStore`] keeps records in process memory, keyed by table name
//! and record key. It backs local development and tests; the trait's
//! contract matches a key-value service (get/put by table + key, scan by
//! table), so a hosted implementation can be swapped in without touching
//! workflow code.

use super::RecordStore;
use crate::error::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;

/// An in-memory [`RecordStore`].
///
/// Tables are created on first write. Scans return records in key order,
/// so test assertions are deterministic.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<HashMap<String, BTreeMap<String, Value>>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records in a table (0 when the table does not exist).
    pub async fn count(&self, table: &str) -> usize {
        self.tables
            .read()
            .await
            .get(table)
            .map_or(0, BTreeMap::len)
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn get(&self, table: &str, key: &str) -> Result<Option<Value>> {
        Ok(self
            .tables
            .read()
            .await
            .get(table)
            .and_then(|t| t.get(key))
            .cloned())
    }

    async fn put(&self, table: &str, key: &str, record: Value) -> Result<()> {
        self.tables
            .write()
            .await
            .entry(table.to_string())
            .or_default()
            .insert(key.to_string(), record);
        Ok(())
    }

    async fn scan(&self, table: &str) -> Result<Vec<Value>> {
        Ok(self
            .tables
            .read()
            .await
            .get(table)
            .map(|t| t.values().cloned().collect())
            .unwrap_or_default())
    }
}
