//! Durable mirror of map entries.
//!
//! A [`PersistenceBridge`] scopes rows by the map's identifier, replays them
//! into a fresh [`KeyHistoryIndex`] at startup, and writes every new entry
//! through to its [`RowStore`] before the write is acknowledged. Keys and
//! values are stored as JSON text.

mod sqlite;

pub use sqlite::SqliteRowStore;

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::Debug;
use std::hash::Hash;
use tracing::{debug, trace};

use crate::error::{ErrorCode, TsihError, TsihResult};
use crate::versioning::{KeyHistoryIndex, VersionNumber};

/// One durable row, already encoded for storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredRow {
    /// JSON-encoded key.
    pub key: String,
    pub version: i64,
    /// JSON-encoded value.
    pub value: String,
}

/// Keyed row storage shared by any number of identifiers.
///
/// Implementations must make `upsert_row` durable before returning.
pub trait RowStore: Send + Sync {
    /// Insert the row, or replace the value of the row with the same
    /// `(identifier, key, version)`.
    fn upsert_row(&self, identifier: &str, row: &StoredRow) -> TsihResult<()>;

    /// All rows stored under `identifier`.
    fn scan_rows(&self, identifier: &str) -> TsihResult<Vec<StoredRow>>;

    /// Release the backend, reporting any error the release produces.
    fn close(self: Box<Self>) -> TsihResult<()> {
        Ok(())
    }
}

/// Mirrors entries of one map into an optional [`RowStore`].
///
/// Whether a store is present is fixed at construction; without one every
/// operation is a no-op.
pub struct PersistenceBridge {
    identifier: String,
    store: Option<Box<dyn RowStore>>,
}

impl PersistenceBridge {
    /// A bridge that persists nothing.
    pub fn disabled(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            store: None,
        }
    }

    /// A bridge writing through to `store`.
    pub fn new(identifier: impl Into<String>, store: Box<dyn RowStore>) -> Self {
        Self {
            identifier: identifier.into(),
            store: Some(store),
        }
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn is_enabled(&self) -> bool {
        self.store.is_some()
    }

    /// Rebuild the history of this identifier from the store.
    ///
    /// Any unreadable or undecodable row fails the whole load.
    pub fn load<K, V>(&self) -> TsihResult<KeyHistoryIndex<K, V>>
    where
        K: DeserializeOwned + Eq + Hash + Debug,
        V: DeserializeOwned,
    {
        let mut index = KeyHistoryIndex::new();
        let Some(store) = &self.store else {
            return Ok(index);
        };

        let rows = store
            .scan_rows(&self.identifier)
            .map_err(|e| e.with_persistence_code(ErrorCode::PerLoadFailed))?;
        let count = rows.len();

        for row in rows {
            let version = VersionNumber::try_from(row.version).map_err(|_| {
                TsihError::corrupt_row(&self.identifier, format!("negative version {}", row.version))
            })?;
            let key: K = serde_json::from_str(&row.key)
                .map_err(|e| TsihError::corrupt_row(&self.identifier, format!("key: {}", e)))?;
            let value: V = serde_json::from_str(&row.value)
                .map_err(|e| TsihError::corrupt_row(&self.identifier, format!("value: {}", e)))?;
            index.put(key, version, value);
        }

        debug!(
            identifier = %self.identifier,
            rows = count,
            keys = index.len(),
            "Loaded history from row store"
        );
        Ok(index)
    }

    /// Encode an entry without touching the store.
    ///
    /// Returns `None` when persistence is disabled, so nothing is encoded.
    /// Keys and values whose encoding would not load back fail here.
    pub fn prepare<K, V>(
        &self,
        key: &K,
        version: VersionNumber,
        value: &V,
    ) -> TsihResult<Option<StoredRow>>
    where
        K: Serialize + DeserializeOwned,
        V: Serialize + DeserializeOwned,
    {
        if self.store.is_none() {
            return Ok(None);
        }
        let version =
            i64::try_from(version).map_err(|_| TsihError::version_out_of_range(version))?;
        Ok(Some(StoredRow {
            key: encode(key, "key")?,
            version,
            value: encode(value, "value")?,
        }))
    }

    /// Durably write a row produced by [`PersistenceBridge::prepare`].
    pub fn commit(&self, row: &StoredRow) -> TsihResult<()> {
        let Some(store) = &self.store else {
            return Ok(());
        };
        trace!(identifier = %self.identifier, version = row.version, "Mirroring entry");
        store.upsert_row(&self.identifier, row)
    }

    /// Encode and durably write one entry.
    pub fn mirror<K, V>(&self, key: &K, version: VersionNumber, value: &V) -> TsihResult<()>
    where
        K: Serialize + DeserializeOwned,
        V: Serialize + DeserializeOwned,
    {
        match self.prepare(key, version, value)? {
            Some(row) => self.commit(&row),
            None => Ok(()),
        }
    }

    /// Release the underlying store.
    pub fn close(self) -> TsihResult<()> {
        match self.store {
            Some(store) => {
                debug!(identifier = %self.identifier, "Closing row store");
                store.close()
            }
            None => Ok(()),
        }
    }
}

/// JSON-encode `item`, rejecting encodings that do not decode back.
///
/// serde_json writes non-finite floats as `null`, which a later load could
/// not turn back into the original type.
fn encode<T>(item: &T, what: &str) -> TsihResult<String>
where
    T: Serialize + DeserializeOwned,
{
    let encoded = serde_json::to_string(item)?;
    serde_json::from_str::<T>(&encoded).map_err(|e| {
        TsihError::serialization(format!("{} does not survive encoding as {}: {}", what, encoded, e))
    })?;
    Ok(encoded)
}

impl Debug for PersistenceBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistenceBridge")
            .field("identifier", &self.identifier)
            .field("enabled", &self.is_enabled())
            .finish()
    }
}

#[cfg(test)]
mockall::mock! {
    pub Store {}

    impl RowStore for Store {
        fn upsert_row(&self, identifier: &str, row: &StoredRow) -> TsihResult<()>;
        fn scan_rows(&self, identifier: &str) -> TsihResult<Vec<StoredRow>>;
    }
}
