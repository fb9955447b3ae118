pub mod connection;

pub use connection::CatalogDb;
