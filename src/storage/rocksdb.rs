//! RocksDB plumbing for the persistent message store.
//!
//! Values are bincode-encoded. Keys that belong to a board are laid out as
//! `{board}:{suffix}` so a board's records can be scanned by prefix. Writes
//! that must land together go through a [`RocksBatch`].

use crate::error::{BoardError, Result};
use rocksdb::{
    BoundColumnFamily, ColumnFamilyDescriptor, DBWithThreadMode, IteratorMode, MultiThreaded,
    Options, WriteBatch,
};
use serde::{de::DeserializeOwned, Serialize};
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, trace};

/// Separator between the parts of a composite key.
const KEY_SEPARATOR: u8 = b':';

// =============================================================================
// Configuration
// =============================================================================

/// Tuning knobs for the RocksDB instance.
#[derive(Debug, Clone)]
pub struct RocksDbConfig {
    pub max_open_files: i32,
    /// Number of info log files to keep.
    pub keep_log_file_num: usize,
    /// Maximum total WAL size in bytes.
    pub max_wal_size: u64,
    pub write_buffer_size: usize,
    pub max_write_buffer_number: i32,
    /// Background threads; defaults to the number of CPUs.
    pub parallelism: usize,
}

impl Default for RocksDbConfig {
    fn default() -> Self {
        Self {
            max_open_files: 128,
            keep_log_file_num: 2,
            max_wal_size: 32 * 1024 * 1024,
            write_buffer_size: 16 * 1024 * 1024,
            max_write_buffer_number: 2,
            parallelism: num_cpus::get(),
        }
    }
}

impl RocksDbConfig {
    /// Settings for importing large message dumps: bigger memtables, fewer
    /// flushes.
    pub fn bulk_import() -> Self {
        Self {
            max_wal_size: 128 * 1024 * 1024,
            write_buffer_size: 64 * 1024 * 1024,
            max_write_buffer_number: 4,
            ..Self::default()
        }
    }

    fn build_options(&self) -> Options {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);
        opts.set_max_open_files(self.max_open_files);
        opts.set_keep_log_file_num(self.keep_log_file_num);
        opts.set_max_total_wal_size(self.max_wal_size);
        opts.increase_parallelism(self.parallelism.max(1) as i32);
        opts.set_write_buffer_size(self.write_buffer_size);
        opts.set_max_write_buffer_number(self.max_write_buffer_number);
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        opts
    }
}

// =============================================================================
// Keys and values
// =============================================================================

/// Prefix shared by every key of `scope`: `{scope}:`.
pub fn key_prefix(scope: &[u8]) -> Vec<u8> {
    let mut key = Vec::with_capacity(scope.len() + 1);
    key.extend_from_slice(scope);
    key.push(KEY_SEPARATOR);
    key
}

/// Creates `{scope}:{suffix}`.
pub fn composite_key(scope: &[u8], suffix: &[u8]) -> Vec<u8> {
    let mut key = key_prefix(scope);
    key.extend_from_slice(suffix);
    key
}

fn encode<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>> {
    bincode::serialize(value)
        .map_err(|e| BoardError::serialization(format!("Failed to serialize: {}", e)))
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    bincode::deserialize(bytes)
        .map_err(|e| BoardError::serialization(format!("Failed to deserialize: {}", e)))
}

// =============================================================================
// Database handle
// =============================================================================

/// An open database with a fixed set of column families.
pub struct RocksDbHandle {
    db: Arc<DBWithThreadMode<MultiThreaded>>,
}

impl fmt::Debug for RocksDbHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RocksDbHandle")
            .field("path", &self.db.path())
            .finish()
    }
}

impl RocksDbHandle {
    /// Opens (or creates) the database at `db_path`.
    pub fn open(
        db_path: impl AsRef<Path>,
        config: &RocksDbConfig,
        column_families: &[&str],
    ) -> Result<Self> {
        let opts = config.build_options();
        let descriptors: Vec<_> = column_families
            .iter()
            .map(|cf| ColumnFamilyDescriptor::new(*cf, Options::default()))
            .collect();

        let db = DBWithThreadMode::<MultiThreaded>::open_cf_descriptors(
            &opts,
            db_path.as_ref(),
            descriptors,
        )
        .map_err(|e| BoardError::storage(format!("Failed to open RocksDB: {}", e)))?;

        Ok(Self { db: Arc::new(db) })
    }

    fn cf(&self, name: &str) -> Result<Arc<BoundColumnFamily<'_>>> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| BoardError::storage(format!("Column family '{}' not found", name)))
    }

    /// Writes a single value outside of any batch.
    pub fn put<T: Serialize + ?Sized>(&self, cf_name: &str, key: &[u8], value: &T) -> Result<()> {
        let cf = self.cf(cf_name)?;
        let bytes = encode(value)?;
        trace!(cf = cf_name, value_bytes = bytes.len(), "db_put");
        self.db
            .put_cf(&cf, key, bytes)
            .map_err(|e| BoardError::storage(format!("Failed to write: {}", e)))
    }

    pub fn get<T: DeserializeOwned>(&self, cf_name: &str, key: &[u8]) -> Result<Option<T>> {
        let cf = self.cf(cf_name)?;
        let bytes = self
            .db
            .get_pinned_cf(&cf, key)
            .map_err(|e| BoardError::storage(format!("Failed to read: {}", e)))?;
        trace!(cf = cf_name, found = bytes.is_some(), "db_get");
        bytes.map(|b| decode(&b)).transpose()
    }

    /// Every key of a column family, in key order.
    pub fn keys(&self, cf_name: &str) -> Result<Vec<Vec<u8>>> {
        let cf = self.cf(cf_name)?;
        self.db
            .iterator_cf(&cf, IteratorMode::Start)
            .map(|item| {
                item.map(|(key, _)| key.into_vec())
                    .map_err(|e| BoardError::storage(format!("Iterator error: {}", e)))
            })
            .collect()
    }

    /// Keys starting with `prefix`, in key order.
    pub fn keys_with_prefix(&self, cf_name: &str, prefix: &[u8]) -> Result<Vec<Vec<u8>>> {
        self.walk_prefix(cf_name, prefix, |key, _| Ok(key.to_vec()))
    }

    /// Decoded entries whose key starts with `prefix`, with the prefix
    /// stripped from each key.
    ///
    /// A read or decode error aborts the scan; partial results are never
    /// returned.
    pub fn scan_prefix<T: DeserializeOwned>(
        &self,
        cf_name: &str,
        prefix: &[u8],
    ) -> Result<Vec<(Vec<u8>, T)>> {
        self.walk_prefix(cf_name, prefix, |key, value| {
            Ok((key[prefix.len()..].to_vec(), decode(value)?))
        })
    }

    fn walk_prefix<R, F>(&self, cf_name: &str, prefix: &[u8], mut visit: F) -> Result<Vec<R>>
    where
        F: FnMut(&[u8], &[u8]) -> Result<R>,
    {
        let cf = self.cf(cf_name)?;
        let mut out = Vec::new();
        for item in self.db.prefix_iterator_cf(&cf, prefix) {
            let (key, value) =
                item.map_err(|e| BoardError::storage(format!("Iterator error: {}", e)))?;
            if !key.starts_with(prefix) {
                break;
            }
            out.push(visit(&key, &value)?);
        }
        debug!(
            cf = cf_name,
            prefix_len = prefix.len(),
            records = out.len(),
            "db_walk_prefix: completed"
        );
        Ok(out)
    }

    /// Starts an atomic write batch.
    pub fn batch(&self) -> RocksBatch<'_> {
        RocksBatch {
            handle: self,
            batch: WriteBatch::default(),
        }
    }
}

// =============================================================================
// Write batches
// =============================================================================

/// Writes applied all at once by [`RocksBatch::commit`].
///
/// Dropping the batch without committing discards it.
pub struct RocksBatch<'a> {
    handle: &'a RocksDbHandle,
    batch: WriteBatch,
}

impl<'a> RocksBatch<'a> {
    pub fn put<T: Serialize + ?Sized>(
        &mut self,
        cf_name: &str,
        key: &[u8],
        value: &T,
    ) -> Result<()> {
        let cf = self.handle.cf(cf_name)?;
        self.batch.put_cf(&cf, key, encode(value)?);
        Ok(())
    }

    pub fn delete(&mut self, cf_name: &str, key: &[u8]) -> Result<()> {
        let cf = self.handle.cf(cf_name)?;
        self.batch.delete_cf(&cf, key);
        Ok(())
    }

    /// Number of queued operations.
    pub fn len(&self) -> usize {
        self.batch.len()
    }

    pub fn is_empty(&self) -> bool {
        self.batch.is_empty()
    }

    pub fn commit(self) -> Result<()> {
        let ops = self.batch.len();
        self.handle
            .db
            .write(self.batch)
            .map_err(|e| BoardError::storage(format!("Failed to write batch: {}", e)))?;
        trace!(ops = ops, "db_batch: committed");
        Ok(())
    }
}
