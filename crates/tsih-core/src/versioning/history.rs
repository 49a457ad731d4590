//! Per-key version history with point-in-time lookup.

use std::borrow::Borrow;
use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;

use crate::error::{TsihError, TsihResult};
use crate::versioning::VersionNumber;

/// A single recorded value of a key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry<V> {
    pub version: VersionNumber,
    pub value: V,
}

/// In-memory history of every key, each kept sorted by version.
///
/// Invariant: for every key the entries are strictly increasing in version,
/// so there is at most one value per `(key, version)` pair.
#[derive(Debug, Clone)]
pub struct KeyHistoryIndex<K, V> {
    entries: HashMap<K, Vec<Entry<V>>>,
}

impl<K, V> Default for KeyHistoryIndex<K, V> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }
}

impl<K, V> KeyHistoryIndex<K, V>
where
    K: Eq + Hash + Debug,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the value of `key` at `version`.
    ///
    /// Returns the value that was replaced, if any.
    pub fn put(&mut self, key: K, version: VersionNumber, value: V) -> Option<V> {
        let history = self.entries.entry(key).or_default();

        // Writes at or past the tail are the common case.
        match history.last_mut() {
            None => {
                history.push(Entry { version, value });
                return None;
            }
            Some(last) if last.version < version => {
                history.push(Entry { version, value });
                return None;
            }
            Some(last) if last.version == version => {
                return Some(std::mem::replace(&mut last.value, value));
            }
            Some(_) => {}
        }

        match history.binary_search_by_key(&version, |e| e.version) {
            Ok(pos) => Some(std::mem::replace(&mut history[pos].value, value)),
            Err(pos) => {
                history.insert(pos, Entry { version, value });
                None
            }
        }
    }

    /// Value of the newest entry for `key` whose version is `<= version`.
    pub fn get<Q>(&self, key: &Q, version: VersionNumber) -> TsihResult<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + Debug + ?Sized,
    {
        let history = self
            .entries
            .get(key)
            .filter(|h| !h.is_empty())
            .ok_or_else(|| TsihError::key_not_found(format!("{:?}", key), version))?;

        let idx = history.partition_point(|e| e.version <= version);
        if idx == 0 {
            return Err(TsihError::before_history(
                format!("{:?}", key),
                version,
                history[0].version,
            ));
        }
        Ok(&history[idx - 1].value)
    }

    /// Versions recorded for `key`, ascending. Empty if the key is unknown.
    pub fn versions_of<Q>(&self, key: &Q) -> Vec<VersionNumber>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.entries
            .get(key)
            .map(|h| h.iter().map(|e| e.version).collect())
            .unwrap_or_default()
    }

    /// Full ordered history of `key`.
    pub fn history<Q>(&self, key: &Q) -> &[Entry<V>]
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.entries.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.entries.contains_key(key)
    }

    /// Every key that has at least one entry, in arbitrary order.
    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.entries.keys()
    }

    /// Number of distinct keys.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total number of entries across all keys.
    pub fn entry_count(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    /// Highest version recorded for any key.
    pub fn latest_version(&self) -> Option<VersionNumber> {
        self.entries
            .values()
            .filter_map(|h| h.last().map(|e| e.version))
            .max()
    }

    /// Every key resolvable at `version`, paired with its value there.
    pub fn snapshot_at(&self, version: VersionNumber) -> Vec<(&K, &V)> {
        self.entries
            .iter()
            .filter_map(|(key, history)| {
                let idx = history.partition_point(|e| e.version <= version);
                (idx > 0).then(|| (key, &history[idx - 1].value))
            })
            .collect()
    }
}
