//! Registry index handling for the depot mirror.
//!
//! The index is a directory tree with one file per package, holding one JSON record per
//! published version, plus a `config.json` at the root naming the registry endpoints.
//!
//! - [`config`] reads `config.json` and derives [`depot_dl::endpoints::RegistryEndpoints`]
//! - [`index`] walks the tree and parses version records
//! - [`git`] refreshes a local checkout of the index

pub mod config;
pub mod error;
pub mod git;
pub mod index;

pub use config::IndexConfig;
pub use error::{ErrorContext, RegistryError, Result};
pub use git::{GitIndex, IndexSource};
pub use index::{EntryReader, IndexEntry, IndexWalker};
