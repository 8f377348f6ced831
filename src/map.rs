//! DbMap Module
//!
//! The typed map facade. Composes a key serializer, the key hasher, an
//! index, a data store, the compression codec and a value serializer:
//!
//! ```text
//! put(key, value)
//!   key ──serialize──▶ bytes ──hash──▶ h
//!   value ──serialize──▶ bytes ──compress──▶ data.write ──▶ locator
//!   index.put(h, locator) ──▶ previous? ──▶ data.free(previous)
//!
//! get(key)
//!   key ──▶ h ──▶ index.get(h) ──▶ locator ──▶ data.read ──▶ decompress ──▶ deserialize
//! ```
//!
//! ## Collisions
//! Only the truncated hash of a key is stored, never the key itself. Two
//! keys with the same hash share one entry: the second `put` replaces the
//! first, and `get` on either returns the last value written. Callers that
//! need exact-key safety at narrow hash widths check [`DbMap::hash_of`]
//! before inserting.
//!
//! ## Concurrency
//! All methods take `&self`. The open index and data store sit behind one
//! mutex, so puts and removes on a container are serialized.

use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info, trace, warn};

use crate::config::ContainerConfig;
use crate::data::{open_data, DataLookup, DataStats};
use crate::db::Container;
use crate::error::{PorkError, Result};
use crate::hasher::KeyHasher;
use crate::index::{open_index, IndexLookup};
use crate::serializer::{BincodeSerializer, Serializer};

// =============================================================================
// Options
// =============================================================================

/// Everything needed to open a [`DbMap`]
pub struct DbMapOptions<K, V> {
    pub config: ContainerConfig,
    pub key_serializer: Box<dyn Serializer<K>>,
    pub value_serializer: Box<dyn Serializer<V>>,
}

impl<K, V> DbMapOptions<K, V> {
    pub fn new(
        config: ContainerConfig,
        key_serializer: Box<dyn Serializer<K>>,
        value_serializer: Box<dyn Serializer<V>>,
    ) -> Self {
        Self {
            config,
            key_serializer,
            value_serializer,
        }
    }
}

impl<K, V> DbMapOptions<K, V>
where
    K: Serialize + DeserializeOwned + 'static,
    V: Serialize + DeserializeOwned + 'static,
{
    /// Bincode for both keys and values
    pub fn bincode(config: ContainerConfig) -> Self {
        Self::new(
            config,
            Box::new(BincodeSerializer::<K>::new()),
            Box::new(BincodeSerializer::<V>::new()),
        )
    }
}

/// Map-level usage snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MapStats {
    /// Entries in the index
    pub entries: usize,
    /// Data store usage
    pub data: DataStats,
}

// =============================================================================
// DbMap
// =============================================================================

/// Open index and data store of a container
struct Storage {
    index: Box<dyn IndexLookup>,
    data: Box<dyn DataLookup>,
}

impl Storage {
    /// Data first, so the index never reaches disk ahead of what it points to
    fn flush(&mut self) -> Result<()> {
        self.data.flush()?;
        self.index.flush()
    }

    fn close(self) -> Result<()> {
        let data_result = self.data.close();
        let index_result = self.index.close();
        data_result.and(index_result)
    }
}

/// A typed, disk-backed map bound to one container directory
pub struct DbMap<K, V> {
    name: String,
    dir: PathBuf,
    config: ContainerConfig,
    hasher: KeyHasher,
    key_serializer: Box<dyn Serializer<K>>,
    value_serializer: Box<dyn Serializer<V>>,
    /// `None` once closed
    storage: Mutex<Option<Storage>>,
}

impl<K, V> DbMap<K, V> {
    /// Open or create a map in `dir`
    ///
    /// The directory is created if missing. Reopening a directory requires
    /// the configuration it was created with.
    pub fn open(name: &str, dir: &Path, options: DbMapOptions<K, V>) -> Result<Self> {
        let DbMapOptions {
            config,
            key_serializer,
            value_serializer,
        } = options;

        fs::create_dir_all(dir)?;

        // If the data store fails to open, the index is dropped (and its
        // handles released) on the way out
        let index = open_index(dir, config.index(), config.hash_bits())?;
        let data = open_data(dir, config.data())?;

        info!(
            container = name,
            dir = %dir.display(),
            hash_bits = config.hash_bits(),
            index = ?config.index(),
            data = ?config.data(),
            "opened container"
        );

        Ok(Self {
            name: name.to_string(),
            dir: dir.to_path_buf(),
            config,
            hasher: KeyHasher::new(config.hasher(), config.hash_bits()),
            key_serializer,
            value_serializer,
            storage: Mutex::new(Some(Storage { index, data })),
        })
    }

    /// Container name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Container directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn config(&self) -> &ContainerConfig {
        &self.config
    }

    /// Whether `close()` has run
    pub fn is_closed(&self) -> bool {
        self.storage.lock().is_none()
    }

    /// Truncated hash the map files `key` under
    pub fn hash_of(&self, key: &K) -> Result<u64> {
        let bytes = self.key_serializer.serialize(key)?;
        Ok(self.hasher.hash(&bytes))
    }

    /// Insert or replace the value for `key`
    ///
    /// The new value is written before the index is updated; the replaced
    /// value is freed last.
    pub fn put(&self, key: &K, value: &V) -> Result<()> {
        let hash = self.hash_of(key)?;
        let bytes = self.encode_value(value)?;

        self.with_storage(|storage| {
            let locator = storage.data.write(&bytes)?;

            let previous = match storage.index.put(hash, locator) {
                Ok(previous) => previous,
                Err(e) => {
                    // Not indexed, so nothing can reach it
                    if let Err(free_err) = storage.data.free(locator, false) {
                        warn!(container = %self.name, error = %free_err, "failed to release unindexed value");
                    }
                    return Err(e);
                }
            };

            // The new value is live; a failed free only leaks the old one
            if let Some(previous) = previous {
                if let Err(e) = storage.data.free(previous, false) {
                    warn!(container = %self.name, error = %e, "failed to release replaced value");
                }
            }
            trace!(container = %self.name, hash, len = bytes.len(), replaced = previous.is_some(), "put");
            Ok(())
        })
    }

    /// Insert every pair from `entries`, one at a time
    pub fn put_all<I>(&self, entries: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, V)>,
    {
        for (key, value) in entries {
            self.put(&key, &value)?;
        }
        Ok(())
    }

    /// Value stored for `key`, or `None` on a miss
    pub fn get(&self, key: &K) -> Result<Option<V>> {
        let hash = self.hash_of(key)?;

        let bytes = self.with_storage(|storage| match storage.index.get(hash)? {
            Some(locator) => storage.data.read(locator).map(Some),
            None => Ok(None),
        })?;

        match bytes {
            Some(bytes) => self.decode_value(&bytes).map(Some),
            None => Ok(None),
        }
    }

    /// Whether an entry exists for the hash of `key`
    pub fn contains_key(&self, key: &K) -> Result<bool> {
        let hash = self.hash_of(key)?;
        self.with_storage(|storage| Ok(storage.index.get(hash)?.is_some()))
    }

    /// Remove the entry for `key`, returning whether one existed
    ///
    /// `shrink` asks the data store to give freed space back to the
    /// filesystem immediately (sectored store only).
    pub fn remove(&self, key: &K, shrink: bool) -> Result<bool> {
        let hash = self.hash_of(key)?;

        self.with_storage(|storage| match storage.index.remove(hash)? {
            Some(locator) => {
                storage.data.free(locator, shrink)?;
                trace!(container = %self.name, hash, shrink, "removed");
                Ok(true)
            }
            None => Ok(false),
        })
    }

    /// Number of entries
    pub fn len(&self) -> Result<usize> {
        self.with_storage(|storage| Ok(storage.index.entries()?.len()))
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Visit every (hash, value) pair
    ///
    /// The container stays locked for the whole walk; `f` must not call
    /// back into this map.
    pub fn for_each<F>(&self, mut f: F) -> Result<()>
    where
        F: FnMut(u64, V),
    {
        self.with_storage(|storage| {
            for (hash, locator) in storage.index.entries()? {
                let bytes = storage.data.read(locator)?;
                f(hash, self.decode_value(&bytes)?);
            }
            Ok(())
        })
    }

    /// Every stored value, in index order
    pub fn values(&self) -> Result<Vec<V>> {
        let mut values = Vec::new();
        self.for_each(|_, value| values.push(value))?;
        Ok(values)
    }

    /// Entry count and data store usage
    pub fn stats(&self) -> Result<MapStats> {
        self.with_storage(|storage| {
            Ok(MapStats {
                entries: storage.index.entries()?.len(),
                data: storage.data.stats()?,
            })
        })
    }

    /// Persist data and index without closing
    pub fn flush(&self) -> Result<()> {
        self.with_storage(Storage::flush)
    }

    /// Flush and release every file handle and mapping
    ///
    /// Later operations fail with [`PorkError::Closed`]. Closing twice is a
    /// no-op.
    pub fn close(&self) -> Result<()> {
        let storage = self.storage.lock().take();
        match storage {
            Some(storage) => {
                storage.close()?;
                info!(container = %self.name, "closed container");
                Ok(())
            }
            None => {
                debug!(container = %self.name, "container already closed");
                Ok(())
            }
        }
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    fn with_storage<R>(&self, f: impl FnOnce(&mut Storage) -> Result<R>) -> Result<R> {
        let mut guard = self.storage.lock();
        match guard.as_mut() {
            Some(storage) => f(storage),
            None => Err(PorkError::Closed(self.name.clone())),
        }
    }

    fn encode_value(&self, value: &V) -> Result<Vec<u8>> {
        let serialized = self.value_serializer.serialize(value)?;
        self.config.compression().compress(&serialized)
    }

    fn decode_value(&self, bytes: &[u8]) -> Result<V> {
        let serialized = self.config.compression().decompress(bytes)?;
        self.value_serializer.deserialize(&serialized)
    }
}

impl<K, V> Drop for DbMap<K, V> {
    fn drop(&mut self) {
        if let Some(storage) = self.storage.get_mut().take() {
            warn!(container = %self.name, "container dropped without close, closing now");
            if let Err(e) = storage.close() {
                warn!(container = %self.name, error = %e, "close on drop failed");
            }
        }
    }
}

impl<K, V> Container for DbMap<K, V>
where
    K: 'static,
    V: 'static,
{
    type Options = DbMapOptions<K, V>;

    fn open(name: &str, dir: &Path, options: Self::Options) -> Result<Self> {
        DbMap::open(name, dir, options)
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn flush(&self) -> Result<()> {
        DbMap::flush(self)
    }

    fn close(&self) -> Result<()> {
        DbMap::close(self)
    }
}
