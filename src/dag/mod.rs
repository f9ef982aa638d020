//! Generic DAG infrastructure.
//!
//! This module provides the primitives the threading engine builds on:
//!
//! - [`ContentHash`]: 64-byte SHA3-512 content address for any message
//! - [`DagNodeOps`]: Trait for types that can participate in DAG operations
//! - [`topological_order`]: cycle-tolerant parents-before-children ordering
//!
//! These primitives are domain-agnostic.

mod hash;
pub mod ops;

pub use hash::{current_timestamp_millis, ContentHash};
pub use ops::{topological_order, topological_sort_hashes, DagNodeOps};
