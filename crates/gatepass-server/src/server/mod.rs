//! HTTP API for scanning stations and the admin side.

pub mod api;
pub mod error;
pub mod routes;

#[cfg(test)]
mod routes_tests;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use gatepass_core::config::StorageConfig;
use gatepass_crypto::PayloadSigner;
use tower_http::trace::TraceLayer;

use crate::audit::{AccessLogWriter, AuditHealth};
use crate::credentials::CredentialIssuer;
use crate::engine::VerificationEngine;
use crate::storage::GateDatabase;

pub use error::ApiError;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub engine: VerificationEngine,
    pub issuer: CredentialIssuer,
    pub db: GateDatabase,
    pub health: Arc<AuditHealth>,
}

impl AppState {
    /// Wire the engine, issuer and audit writer around one database.
    pub fn new(db: GateDatabase, signer: Arc<PayloadSigner>, storage: &StorageConfig) -> Self {
        let health = Arc::new(AuditHealth::new());
        let log = AccessLogWriter::new(db.clone(), storage.log_timeout(), Arc::clone(&health));
        Self {
            engine: VerificationEngine::new(
                db.clone(),
                Arc::clone(&signer),
                log,
                storage.timeout(),
            ),
            issuer: CredentialIssuer::new(db.clone(), signer),
            db,
            health,
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/v1/verify", post(routes::verify))
        .route("/v1/issue", post(routes::issue))
        .route("/v1/credentials/{id}/payload", post(routes::refresh_payload))
        .route("/v1/credentials/{id}/revoke", post(routes::revoke))
        .route("/v1/access-log", get(routes::access_log))
        .route("/v1/access-log/count", get(routes::access_log_count))
        .route("/health", get(routes::health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
