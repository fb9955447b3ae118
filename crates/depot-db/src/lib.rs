//! Catalog store for the registry mirror.
//!
//! - [`connection`] opens the SQLite catalog and applies embedded migrations
//! - [`repository::catalog::CatalogRepository`] holds every catalog query

pub mod connection;
pub mod error;
pub mod migration;
pub mod models;
pub mod repository;
pub mod schema;
