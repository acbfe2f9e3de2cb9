//! Triage officer and engineer queues

use axum::{
    extract::State,
    routing::{get, patch, post},
    Json, Router,
};
use lifecycle::{AcceptSuggestion, Suggestion, Ticket, TriageRequest, User};

use super::auth::Caller;
use super::error::ApiResult;
use super::extract::{ApiJson, ApiPath};
use super::tickets::update_status;
use super::AppStateArc;

pub fn routes() -> Router<AppStateArc> {
    Router::new()
        .route("/triage/tickets/pending", get(pending))
        .route("/triage/tickets/:id", patch(triage_ticket))
        .route("/triage/tickets/:id/suggestion", get(suggestion))
        .route("/triage/tickets/:id/suggestion/accept", post(accept_suggestion))
        .route("/tickets/:id/assignable-engineers", get(assignable_engineers))
}

pub fn engineer_routes() -> Router<AppStateArc> {
    Router::new()
        .route("/engineer/tickets/pending", get(pending))
        .route("/engineer/tickets/:id", patch(update_status))
}

/// Role-scoped work queue: untriaged tickets for officers, open assignments
/// for engineers
async fn pending(
    State(state): State<AppStateArc>,
    Caller(actor): Caller,
) -> ApiResult<Json<Vec<Ticket>>> {
    Ok(Json(state.service.pending(&actor).await?))
}

async fn triage_ticket(
    State(state): State<AppStateArc>,
    Caller(actor): Caller,
    ApiPath(id): ApiPath<String>,
    ApiJson(req): ApiJson<TriageRequest>,
) -> ApiResult<Json<Ticket>> {
    Ok(Json(state.service.triage(&id, req, &actor).await?))
}

async fn suggestion(
    State(state): State<AppStateArc>,
    Caller(actor): Caller,
    ApiPath(id): ApiPath<String>,
) -> ApiResult<Json<Suggestion>> {
    Ok(Json(state.service.suggest(&id, &actor).await?))
}

async fn accept_suggestion(
    State(state): State<AppStateArc>,
    Caller(actor): Caller,
    ApiPath(id): ApiPath<String>,
    ApiJson(req): ApiJson<AcceptSuggestion>,
) -> ApiResult<Json<Ticket>> {
    Ok(Json(state.service.accept_suggestion(&id, req, &actor).await?))
}

async fn assignable_engineers(
    State(state): State<AppStateArc>,
    Caller(actor): Caller,
    ApiPath(id): ApiPath<String>,
) -> ApiResult<Json<Vec<User>>> {
    Ok(Json(state.service.assignable_engineers(&id, &actor).await?))
}
