//! Team lead routes

use axum::{
    extract::State,
    routing::{get, patch},
    Json, Router,
};
use lifecycle::{MemberChanges, Team, Ticket, User, UserId, MAX_SLA_HOURS};
use serde::Deserialize;

use super::auth::Caller;
use super::error::{ApiError, ApiResult};
use super::extract::{ApiJson, ApiPath, ApiQuery};
use super::AppStateArc;

/// No SLA runs longer than the policy cap, so neither does a risk window
const MAX_THRESHOLD_MINUTES: i64 = MAX_SLA_HOURS * 60;

pub fn routes() -> Router<AppStateArc> {
    Router::new()
        .route("/team-lead/tickets/active", get(active))
        .route("/team-lead/tickets/sla-risk", get(sla_risk))
        .route("/team-lead/tickets/:id/reassign", patch(reassign))
        .route("/team-lead/team", get(team))
        .route("/team-lead/team/members", get(members).patch(update_members))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RiskQuery {
    #[serde(default)]
    threshold_minutes: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReassignBody {
    engineer_ids: Vec<UserId>,
}

async fn active(
    State(state): State<AppStateArc>,
    Caller(actor): Caller,
) -> ApiResult<Json<Vec<Ticket>>> {
    Ok(Json(state.service.team_active(&actor).await?))
}

async fn sla_risk(
    State(state): State<AppStateArc>,
    Caller(actor): Caller,
    ApiQuery(query): ApiQuery<RiskQuery>,
) -> ApiResult<Json<Vec<Ticket>>> {
    let threshold = match query.threshold_minutes {
        Some(m) if !(1..=MAX_THRESHOLD_MINUTES).contains(&m) => {
            return Err(ApiError::bad_request(format!(
                "thresholdMinutes must be between 1 and {}",
                MAX_THRESHOLD_MINUTES
            )))
        }
        Some(m) => Some(chrono::Duration::minutes(m)),
        None => None,
    };
    Ok(Json(state.service.team_sla_risk(&actor, threshold).await?))
}

async fn reassign(
    State(state): State<AppStateArc>,
    Caller(actor): Caller,
    ApiPath(id): ApiPath<String>,
    ApiJson(req): ApiJson<ReassignBody>,
) -> ApiResult<Json<Ticket>> {
    Ok(Json(state.service.reassign(&id, req.engineer_ids, &actor).await?))
}

async fn team(State(state): State<AppStateArc>, Caller(actor): Caller) -> ApiResult<Json<Team>> {
    Ok(Json(state.service.team(&actor).await?))
}

async fn members(
    State(state): State<AppStateArc>,
    Caller(actor): Caller,
) -> ApiResult<Json<Vec<User>>> {
    Ok(Json(state.service.team_members(&actor).await?))
}

async fn update_members(
    State(state): State<AppStateArc>,
    Caller(actor): Caller,
    ApiJson(changes): ApiJson<MemberChanges>,
) -> ApiResult<Json<Team>> {
    Ok(Json(state.service.update_team_members(&actor, changes).await?))
}
