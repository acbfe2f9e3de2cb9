//! Ticket routes shared by every role

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, patch, post},
    Json, Router,
};
use lifecycle::{
    ActivityLogEntry, NewTicket, Page, PageRequest, Priority, Severity, Ticket, TicketStatus,
};
use serde::Deserialize;

use super::auth::{Caller, IdempotencyKey};
use super::error::ApiResult;
use super::extract::{ApiJson, ApiPath, ApiQuery};
use super::AppStateArc;

pub fn routes() -> Router<AppStateArc> {
    Router::new()
        .route("/tickets", post(create_ticket))
        .route("/tickets/mine", get(my_tickets))
        .route("/tickets/:id", get(get_ticket))
        .route("/tickets/:id/logs", get(ticket_logs))
        .route("/tickets/:id/status", patch(update_status))
        .route("/tickets/:id/priority", patch(update_priority))
        .route("/tickets/:id/comments", post(add_comment))
        .route("/tickets/:id/attachments", post(add_attachment))
        .route("/tickets/:id/feedback", post(submit_feedback))
        .route("/tickets/:id/reopen", post(reopen_ticket))
}

/// Body of a status update, also used by the engineer route
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct StatusUpdate {
    pub status: TicketStatus,
    #[serde(default)]
    pub note: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PriorityUpdate {
    #[serde(default)]
    priority: Option<Priority>,
    #[serde(default)]
    severity: Option<Severity>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CommentBody {
    text: String,
    #[serde(default)]
    internal_only: bool,
}

#[derive(Debug, Deserialize)]
struct AttachmentBody {
    name: String,
}

#[derive(Debug, Deserialize)]
struct FeedbackBody {
    rating: u8,
    #[serde(default)]
    comment: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ReopenBody {
    reason: String,
}

async fn create_ticket(
    State(state): State<AppStateArc>,
    Caller(actor): Caller,
    IdempotencyKey(key): IdempotencyKey,
    ApiJson(req): ApiJson<NewTicket>,
) -> ApiResult<(StatusCode, Json<Ticket>)> {
    let ticket = state.service.create(req, key.as_deref(), &actor).await?;
    Ok((StatusCode::CREATED, Json(ticket)))
}

async fn my_tickets(
    State(state): State<AppStateArc>,
    Caller(actor): Caller,
) -> ApiResult<Json<Vec<Ticket>>> {
    Ok(Json(state.service.my_tickets(&actor).await?))
}

async fn get_ticket(
    State(state): State<AppStateArc>,
    Caller(actor): Caller,
    ApiPath(id): ApiPath<String>,
) -> ApiResult<Json<Ticket>> {
    Ok(Json(state.service.get(&id, &actor).await?))
}

async fn ticket_logs(
    State(state): State<AppStateArc>,
    Caller(actor): Caller,
    ApiPath(id): ApiPath<String>,
    ApiQuery(page): ApiQuery<PageRequest>,
) -> ApiResult<Json<Page<ActivityLogEntry>>> {
    Ok(Json(state.service.logs(&id, &actor, page).await?))
}

pub(super) async fn update_status(
    State(state): State<AppStateArc>,
    Caller(actor): Caller,
    ApiPath(id): ApiPath<String>,
    ApiJson(req): ApiJson<StatusUpdate>,
) -> ApiResult<Json<Ticket>> {
    let ticket = state
        .service
        .transition(&id, req.status, req.note.as_deref(), &actor)
        .await?;
    Ok(Json(ticket))
}

async fn update_priority(
    State(state): State<AppStateArc>,
    Caller(actor): Caller,
    ApiPath(id): ApiPath<String>,
    ApiJson(req): ApiJson<PriorityUpdate>,
) -> ApiResult<Json<Ticket>> {
    let ticket = state
        .service
        .change_priority(&id, req.priority, req.severity, &actor)
        .await?;
    Ok(Json(ticket))
}

async fn add_comment(
    State(state): State<AppStateArc>,
    Caller(actor): Caller,
    ApiPath(id): ApiPath<String>,
    ApiJson(req): ApiJson<CommentBody>,
) -> ApiResult<(StatusCode, Json<Ticket>)> {
    let ticket = state
        .service
        .comment(&id, &req.text, req.internal_only, &actor)
        .await?;
    Ok((StatusCode::CREATED, Json(ticket)))
}

async fn add_attachment(
    State(state): State<AppStateArc>,
    Caller(actor): Caller,
    ApiPath(id): ApiPath<String>,
    ApiJson(req): ApiJson<AttachmentBody>,
) -> ApiResult<(StatusCode, Json<Ticket>)> {
    let ticket = state.service.add_attachment(&id, &req.name, &actor).await?;
    Ok((StatusCode::CREATED, Json(ticket)))
}

async fn submit_feedback(
    State(state): State<AppStateArc>,
    Caller(actor): Caller,
    ApiPath(id): ApiPath<String>,
    ApiJson(req): ApiJson<FeedbackBody>,
) -> ApiResult<Json<Ticket>> {
    let ticket = state
        .service
        .feedback(&id, req.rating, req.comment.as_deref(), &actor)
        .await?;
    Ok(Json(ticket))
}

async fn reopen_ticket(
    State(state): State<AppStateArc>,
    Caller(actor): Caller,
    ApiPath(id): ApiPath<String>,
    ApiJson(req): ApiJson<ReopenBody>,
) -> ApiResult<Json<Ticket>> {
    Ok(Json(state.service.reopen(&id, &req.reason, &actor).await?))
}
