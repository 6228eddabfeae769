//! SQLite database for the GatePass server.

pub use gatepass_core::db::DatabaseError;

gatepass_core::define_database!(GateDatabase, "Gate database migrations complete");
