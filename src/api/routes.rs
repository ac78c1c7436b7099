use std::sync::Arc;
use std::time::Instant;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;

use crate::dispatch::PolicyDispatcher;
use crate::domain::RuleKind;
use crate::service::RuleService;

use super::error::ApiError;
use super::request::{AddRequest, DeleteRequest, ToggleRequest};
use super::response::{HealthResponse, MutationResponse, RuleListing, ToggleResponse};

/// Shared application state.
pub struct AppState {
    pub service: Arc<RuleService>,
    /// Kept for the advisory connectivity flag on `/health`.
    pub enforcer: Arc<PolicyDispatcher>,
    pub start_time: Instant,
    pub version: String,
}

/// Create the application router.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/firewall/rules", get(handle_list).put(handle_toggle))
        .route(
            "/api/firewall/:kind",
            axum::routing::post(handle_add).delete(handle_delete),
        )
        .route("/health", get(handle_health))
        .with_state(state)
}

/// `POST /api/firewall/:kind` — add a batch of rules.
async fn handle_add(
    State(state): State<Arc<AppState>>,
    Path(kind): Path<RuleKind>,
    Json(req): Json<AddRequest>,
) -> Result<Response, ApiError> {
    let values = req.validated_values(kind).map_err(ApiError::Validation)?;

    state.service.add_rules(kind, req.mode, values.clone()).await?;

    Ok((
        StatusCode::CREATED,
        Json(MutationResponse::success(kind, req.mode, &values)),
    )
        .into_response())
}

/// `DELETE /api/firewall/:kind` — delete a batch of rules.
async fn handle_delete(
    State(state): State<Arc<AppState>>,
    Path(kind): Path<RuleKind>,
    Json(req): Json<DeleteRequest>,
) -> Result<Response, ApiError> {
    let values = req.validated_values(kind).map_err(ApiError::Validation)?;

    state.service.delete_rules(kind, req.mode, values.clone()).await?;

    Ok(Json(MutationResponse::success(kind, req.mode, &values)).into_response())
}

#[derive(Debug, Deserialize)]
struct ListQuery {
    /// Plural kind filter: `ips`, `urls` or `ports`.
    #[serde(rename = "type")]
    kind: Option<String>,
}

/// `GET /api/firewall/rules` — list all rules, bucketed by kind and mode.
async fn handle_list(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> Result<Response, ApiError> {
    let filter = match query.kind.as_deref() {
        Some(plural) => Some(RuleKind::from_plural(plural).ok_or_else(|| {
            ApiError::Validation(format!("unknown type filter: {plural:?}"))
        })?),
        None => None,
    };

    let rows = state.service.list_rules(filter).await?;
    let listing = RuleListing::from_rows(&rows);

    match filter {
        Some(kind) => Ok(Json(serde_json::json!({
            kind.plural(): listing.section(kind),
        }))
        .into_response()),
        None => Ok(Json(listing).into_response()),
    }
}

/// `PUT /api/firewall/rules` — toggle `active` across kind sections.
async fn handle_toggle(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ToggleRequest>,
) -> Result<Response, ApiError> {
    let sections = req.into_sections().map_err(ApiError::Validation)?;

    if sections.is_empty() {
        return Ok(Json(ToggleResponse { updated: vec![] }).into_response());
    }

    let updated = state.service.toggle_rules(sections).await?;

    Ok(Json(ToggleResponse { updated }).into_response())
}

/// Health check endpoint.
async fn handle_health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: state.version.clone(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        enforcer_connected: state.enforcer.is_connected(),
    })
}
