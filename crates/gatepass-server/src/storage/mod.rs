//! SQLite storage for the GatePass server.
//!
//! Provides persistence for registries, records, credentials and the access log.

mod db;
mod models;
mod queries_access_log;
mod queries_credentials;
mod queries_registry;


pub use db::{DatabaseError, GateDatabase};
pub use models::*;
pub use queries_access_log::NewAccessLogEntry;
pub use queries_registry::NewRecord;
