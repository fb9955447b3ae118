//! Repository pattern implementations for catalog operations.

pub mod catalog;
