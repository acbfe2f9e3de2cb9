//! Manager and directory routes

use axum::{
    extract::State,
    routing::get,
    Json, Router,
};
use lifecycle::{Team, Ticket, TicketFilter, User};

use super::auth::Caller;
use super::error::ApiResult;
use super::extract::ApiQuery;
use super::AppStateArc;

pub fn routes() -> Router<AppStateArc> {
    Router::new()
        .route("/manager/tickets", get(all_tickets))
        .route("/users/unassigned-engineers", get(unassigned_engineers))
        .route("/teams", get(list_teams))
}

async fn all_tickets(
    State(state): State<AppStateArc>,
    Caller(actor): Caller,
    ApiQuery(filter): ApiQuery<TicketFilter>,
) -> ApiResult<Json<Vec<Ticket>>> {
    Ok(Json(state.service.all_tickets(&actor, filter).await?))
}

async fn unassigned_engineers(
    State(state): State<AppStateArc>,
    Caller(actor): Caller,
) -> ApiResult<Json<Vec<User>>> {
    Ok(Json(state.service.unassigned_engineers(&actor).await?))
}

async fn list_teams(
    State(state): State<AppStateArc>,
    Caller(actor): Caller,
) -> ApiResult<Json<Vec<Team>>> {
    Ok(Json(state.service.list_teams(&actor).await?))
}
