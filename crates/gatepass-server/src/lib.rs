//! `GatePass` Access Server Library
//!
//! Core functionality for the `GatePass` server:
//! - SQLite storage for registries, records, credentials and the access log
//! - Registry resolution across dynamically shaped registries
//! - Credential issuance with signed QR payloads
//! - The verify-and-decide engine and its audit trail
//! - HTTP API (axum)

pub mod audit;
pub mod credentials;
pub mod engine;
pub mod registry;
pub mod server;
pub mod storage;
