//! The mirror's synchronization and retrieval pipeline.
//!
//! A run opens the catalog, optionally refreshes the index snapshot, reconciles the
//! index into the catalog and then downloads every pending archive. Each stage drains
//! completely before the next one starts.

use error::MirrorError;

pub mod database;
pub mod error;
pub mod fetch;
pub mod pipeline;
pub mod pool;
pub mod reconcile;
pub mod storage;
pub mod types;
pub mod writer;

#[cfg(test)]
mod test_utils;

pub type MirrorResult<T> = std::result::Result<T, MirrorError>;
