//! HTTP handlers.

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use serde_json::json;
use tracing::instrument;

use super::AppState;
use super::api::{
    CountResponse, IssueBody, IssueResponse, PageQuery, RevokeResponse, VerifyBody,
    VerifyResponse,
};
use super::error::ApiError;
use crate::audit::HealthSnapshot;
use crate::engine::VerifyRequest;
use crate::storage::AccessLogEntry;

/// Header carrying the scanning operator.
pub const OPERATOR_HEADER: &str = "x-operator";
const ANONYMOUS_ACTOR: &str = "anonymous";

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// User agent and forwarding chain, kept as a small JSON object.
fn client_meta(headers: &HeaderMap) -> Option<String> {
    let user_agent = header(headers, "user-agent");
    let forwarded_for = header(headers, "x-forwarded-for");
    if user_agent.is_none() && forwarded_for.is_none() {
        return None;
    }
    Some(json!({ "userAgent": user_agent, "forwardedFor": forwarded_for }).to_string())
}

/// `POST /v1/verify`: always answers 200 with a decision.
#[instrument(skip_all, fields(rpc = "verify"))]
pub async fn verify(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<VerifyBody>,
) -> Json<VerifyResponse> {
    let actor = header(&headers, OPERATOR_HEADER)
        .map(str::to_string)
        .or(body.actor)
        .unwrap_or_else(|| ANONYMOUS_ACTOR.to_string());

    let outcome = state
        .engine
        .verify(VerifyRequest {
            payload: body.payload,
            location: body.location,
            registry_hint: body.registry_hint,
            actor,
            attempt_id: body.attempt_id,
            client_meta: client_meta(&headers),
        })
        .await;

    Json(outcome.into())
}

/// `POST /v1/issue`
#[instrument(skip_all, fields(rpc = "issue"))]
pub async fn issue(
    State(state): State<AppState>,
    Json(body): Json<IssueBody>,
) -> Result<Json<IssueResponse>, ApiError> {
    let issued = state.issuer.issue(&body.record_id, &body.registry_id).await?;
    Ok(Json(issued.into()))
}

/// `POST /v1/credentials/{id}/payload`
#[instrument(skip(state), fields(rpc = "refresh_payload"))]
pub async fn refresh_payload(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<IssueResponse>, ApiError> {
    let issued = state.issuer.refresh_payload(&id).await?;
    Ok(Json(issued.into()))
}

/// `POST /v1/credentials/{id}/revoke`
#[instrument(skip(state), fields(rpc = "revoke"))]
pub async fn revoke(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<RevokeResponse>, ApiError> {
    let revoked = state.issuer.revoke(&id).await?;
    Ok(Json(RevokeResponse {
        credential_id: id,
        revoked,
    }))
}

/// `GET /v1/access-log?limit&offset`, newest first.
pub async fn access_log(
    State(state): State<AppState>,
    Query(page): Query<PageQuery>,
) -> Result<Json<Vec<AccessLogEntry>>, ApiError> {
    let rows = state
        .db
        .list_access_log(page.limit(), page.offset())
        .await?;
    Ok(Json(rows))
}

/// `GET /v1/access-log/count`
pub async fn access_log_count(
    State(state): State<AppState>,
) -> Result<Json<CountResponse>, ApiError> {
    let count = state.db.count_access_log().await?;
    Ok(Json(CountResponse { count }))
}

/// `GET /health`
pub async fn health(State(state): State<AppState>) -> Json<HealthSnapshot> {
    Json(state.health.snapshot())
}
