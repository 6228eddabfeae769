//! `GatePass` Scanning Station Library
//!
//! - Scan debouncer: drops repeated decodes of one presented symbol
//! - Single-slot feed between capture and verification
//! - HTTP client for the server's verify endpoint

pub mod client;
pub mod debounce;
pub mod feed;
pub mod station;

pub use client::{ClientError, StationConfig, VerifyClient, VerifyReply};
pub use debounce::ScanDebouncer;
pub use feed::{ScanConsumer, ScanPublisher, scan_feed};
