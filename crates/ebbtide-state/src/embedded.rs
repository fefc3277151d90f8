//! Embedded redb backend for the shared store interface.
//!
//! Single-node deployments have no external store to coordinate through;
//! this backend persists the same key-value interface into a local redb
//! database so the rest of the system is unaware of the difference.

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use redb::{Database, ReadableDatabase, TableDefinition};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::store::SharedStore;

/// Key-value records, JSON-encoded [`Stored`] values.
const KV: TableDefinition<&str, &[u8]> = TableDefinition::new("kv");

/// Convert any `Display` error into a `StoreError` variant via a closure factory.
macro_rules! map_err {
    ($variant:ident) => {
        |e| StoreError::$variant(e.to_string())
    };
}

#[derive(Serialize, Deserialize)]
struct Stored {
    value: String,
    /// Unix timestamp (seconds) after which the record reads as missing.
    expires_at: Option<u64>,
}

/// redb-backed [`SharedStore`].
#[derive(Clone)]
pub struct EmbeddedStore {
    db: Arc<Database>,
}

impl EmbeddedStore {
    /// Open (or create) a persistent store at the given path.
    pub fn open(path: &Path) -> StoreResult<Self> {
        let db = Database::create(path).map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_table()?;
        debug!(?path, "embedded store opened");
        Ok(store)
    }

    /// Create an ephemeral in-memory store (for testing).
    pub fn open_in_memory() -> StoreResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_table()?;
        Ok(store)
    }

    fn ensure_table(&self) -> StoreResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        // Opening a table in a write transaction creates it if absent.
        txn.open_table(KV).map_err(map_err!(Table))?;
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    fn put(&self, key: &str, stored: &Stored) -> StoreResult<()> {
        let value = serde_json::to_vec(stored).map_err(map_err!(Serialize))?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(KV).map_err(map_err!(Table))?;
            table
                .insert(key, value.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }
}

impl SharedStore for EmbeddedStore {
    fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(KV).map_err(map_err!(Table))?;
        match table.get(key).map_err(map_err!(Read))? {
            Some(guard) => {
                let stored: Stored =
                    serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?;
                if stored.expires_at.is_some_and(|at| epoch_secs() >= at) {
                    return Ok(None);
                }
                Ok(Some(stored.value))
            }
            None => Ok(None),
        }
    }

    fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        self.put(
            key,
            &Stored {
                value: value.to_string(),
                expires_at: None,
            },
        )
    }

    fn set_with_expiry(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<()> {
        self.put(
            key,
            &Stored {
                value: value.to_string(),
                expires_at: Some(epoch_secs() + ttl.as_secs()),
            },
        )
    }

    fn delete(&self, key: &str) -> StoreResult<bool> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let existed;
        {
            let mut table = txn.open_table(KV).map_err(map_err!(Table))?;
            existed = table.remove(key).map_err(map_err!(Write))?.is_some();
        }
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(existed)
    }
}

fn epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_and_get() {
        let store = EmbeddedStore::open_in_memory().unwrap();
        store.set("a", "1").unwrap();

        assert_eq!(store.get("a").unwrap(), Some("1".to_string()));
        assert_eq!(store.get("missing").unwrap(), None);
    }

    #[test]
    fn delete_reports_existence() {
        let store = EmbeddedStore::open_in_memory().unwrap();
        store.set("a", "1").unwrap();

        assert!(store.delete("a").unwrap());
        assert!(!store.delete("a").unwrap());
        assert_eq!(store.get("a").unwrap(), None);
    }

    #[test]
    fn expired_keys_read_as_missing() {
        let store = EmbeddedStore::open_in_memory().unwrap();
        store
            .set_with_expiry("a", "1", Duration::from_secs(0))
            .unwrap();
        assert_eq!(store.get("a").unwrap(), None);
    }

    #[test]
    fn unexpired_keys_are_readable() {
        let store = EmbeddedStore::open_in_memory().unwrap();
        store
            .set_with_expiry("a", "1", Duration::from_secs(3600))
            .unwrap();
        assert_eq!(store.get("a").unwrap(), Some("1".to_string()));
    }

    #[test]
    fn persistence_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("test.redb");

        {
            let store = EmbeddedStore::open(&db_path).unwrap();
            store.set("worker", "{\"count\":3}").unwrap();
        }

        // Reopen the same database file.
        let store = EmbeddedStore::open(&db_path).unwrap();
        assert_eq!(store.get("worker").unwrap(), Some("{\"count\":3}".to_string()));
    }
}
