//! Storage utilities.
//!
//! - `rocksdb`: RocksDB configuration, key layout, typed reads and atomic
//!   write batches, used by [`RocksStore`](crate::board::RocksStore)

pub mod rocksdb;

pub use rocksdb::{composite_key, key_prefix, RocksBatch, RocksDbConfig, RocksDbHandle};
