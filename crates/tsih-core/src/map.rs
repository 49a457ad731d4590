//! The versioned map facade.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::borrow::Borrow;
use std::fmt::Debug;
use std::hash::Hash;
use tracing::{debug, trace, warn};
use uuid::Uuid;

use crate::config::MapConfig;
use crate::error::TsihResult;
use crate::persistence::{PersistenceBridge, RowStore, SqliteRowStore};
use crate::versioning::{Entry, KeyHistoryIndex, VersionCursor, VersionNumber};

/// A key-value map where every write is recorded at a version and reads can
/// ask for the value of a key at any version.
///
/// Writes are mirrored to the configured row store before they return.
/// Reads are answered from memory only.
///
/// If mirroring fails, the write has already been applied in memory and the
/// error is returned to the caller: the map and its durable copy then
/// disagree until the entry is written again.
#[derive(Debug)]
pub struct VersionedMap<K, V> {
    cursor: VersionCursor,
    index: KeyHistoryIndex<K, V>,
    bridge: PersistenceBridge,
}

impl<K, V> VersionedMap<K, V>
where
    K: Eq + Hash + Debug + Serialize + DeserializeOwned,
    V: Serialize + DeserializeOwned,
{
    /// An empty in-memory map at version 0 with manual versioning.
    pub fn new() -> Self {
        Self {
            cursor: VersionCursor::default(),
            index: KeyHistoryIndex::new(),
            bridge: PersistenceBridge::disabled(fresh_identifier()),
        }
    }

    /// Open a map from its configuration.
    ///
    /// With a persistence target, the SQLite database is opened (and created
    /// if needed) and every row stored under the map's name is reloaded.
    pub fn open(config: MapConfig) -> TsihResult<Self> {
        match config.persistence_target.clone() {
            Some(path) => {
                let store = SqliteRowStore::new(&path)?;
                Self::with_store(config, Box::new(store))
            }
            None => {
                let name = config.name.unwrap_or_else(fresh_identifier);
                debug!(name = %name, "Opening in-memory versioned map");
                Ok(Self {
                    cursor: VersionCursor::new(config.version, config.auto_version),
                    index: KeyHistoryIndex::new(),
                    bridge: PersistenceBridge::disabled(name),
                })
            }
        }
    }

    /// Open a map over an arbitrary row store, reloading its history.
    ///
    /// `config.persistence_target` is ignored. A load failure leaves no map
    /// behind.
    pub fn with_store(config: MapConfig, store: Box<dyn RowStore>) -> TsihResult<Self> {
        let name = match config.name {
            Some(name) => name,
            None => {
                let name = fresh_identifier();
                warn!(
                    name = %name,
                    "Persistent map opened without a name; its rows cannot be reloaded by a later instance"
                );
                name
            }
        };

        let bridge = PersistenceBridge::new(name, store);
        let index = bridge.load()?;
        debug!(
            name = %bridge.identifier(),
            keys = index.len(),
            version = config.version,
            auto_version = config.auto_version,
            "Opened persistent versioned map"
        );

        Ok(Self {
            cursor: VersionCursor::new(config.version, config.auto_version),
            index,
            bridge,
        })
    }

    /// Value of `key` at the current version.
    pub fn read<Q>(&self, key: &Q) -> TsihResult<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + Debug + ?Sized,
    {
        self.read_at(self.cursor.current(), key)
    }

    /// Value of `key` at `version`: the newest entry written at or before it.
    pub fn read_at<Q>(&self, version: VersionNumber, key: &Q) -> TsihResult<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + Debug + ?Sized,
    {
        self.index.get(key, version)
    }

    /// Record `value` for `key` and return the version it landed at.
    ///
    /// With auto-versioning the current version is bumped first, so the
    /// write lands at the new version.
    pub fn write(&mut self, key: K, value: V) -> TsihResult<VersionNumber> {
        let version = self.cursor.write_version()?;
        // Encoding failures must leave the map untouched.
        let row = self.bridge.prepare(&key, version, &value)?;
        self.cursor.advance_for_write()?;

        trace!(?key, version, "Writing entry");
        self.index.put(key, version, value);

        if let Some(row) = row {
            if let Err(err) = self.bridge.commit(&row) {
                warn!(
                    name = %self.bridge.identifier(),
                    version,
                    error = %err,
                    "Mirror failed after in-memory write; durable copy is behind"
                );
                return Err(err);
            }
        }
        Ok(version)
    }

    /// The current version.
    pub fn version(&self) -> VersionNumber {
        self.cursor.current()
    }

    /// Move the current version anywhere, including backwards.
    pub fn set_version(&mut self, version: VersionNumber) {
        self.cursor.set(version);
    }

    pub fn auto_version(&self) -> bool {
        self.cursor.is_auto()
    }

    pub fn set_auto_version(&mut self, auto_version: bool) {
        self.cursor.set_auto(auto_version);
    }

    /// Identifier scoping this map's rows.
    pub fn name(&self) -> &str {
        self.bridge.identifier()
    }

    pub fn is_persistent(&self) -> bool {
        self.bridge.is_enabled()
    }

    /// Versions at which `key` was written, ascending.
    pub fn versions_of<Q>(&self, key: &Q) -> Vec<VersionNumber>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.index.versions_of(key)
    }

    /// Every recorded `(version, value)` of `key`, ascending.
    pub fn history<Q>(&self, key: &Q) -> impl Iterator<Item = (VersionNumber, &V)>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.index
            .history(key)
            .iter()
            .map(|Entry { version, value }| (*version, value))
    }

    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.index.contains_key(key)
    }

    /// Keys written at any version.
    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.index.keys()
    }

    /// Number of distinct keys written at any version.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Highest version any key was written at.
    pub fn latest_version(&self) -> Option<VersionNumber> {
        self.index.latest_version()
    }

    /// All keys readable at `version`, with their values there.
    pub fn snapshot_at(&self, version: VersionNumber) -> Vec<(&K, &V)> {
        self.index.snapshot_at(version)
    }

    /// Release the row store, reporting any error the release produces.
    ///
    /// Dropping the map releases it as well, silently.
    pub fn close(self) -> TsihResult<()> {
        self.bridge.close()
    }
}

impl<K, V> Default for VersionedMap<K, V>
where
    K: Eq + Hash + Debug + Serialize + DeserializeOwned,
    V: Serialize + DeserializeOwned,
{
    fn default() -> Self {
        Self::new()
    }
}

fn fresh_identifier() -> String {
    format!("map-{}", Uuid::new_v4())
}
