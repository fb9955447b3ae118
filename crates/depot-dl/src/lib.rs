pub mod api;
pub mod endpoints;
pub mod error;
pub mod http_client;
