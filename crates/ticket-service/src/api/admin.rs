//! Directory administration for managers and NOC admins

use axum::{
    extract::State,
    routing::{get, patch},
    Json, Router,
};
use lifecycle::{Role, User};
use serde::Deserialize;

use super::auth::Caller;
use super::error::ApiResult;
use super::extract::{ApiJson, ApiPath};
use super::AppStateArc;

pub fn routes() -> Router<AppStateArc> {
    Router::new()
        .route("/admin/users", get(list_users))
        .route("/admin/users/:id/role", patch(change_role))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RoleChange {
    #[serde(alias = "role")]
    new_role: Role,
}

async fn list_users(
    State(state): State<AppStateArc>,
    Caller(actor): Caller,
) -> ApiResult<Json<Vec<User>>> {
    Ok(Json(state.service.list_users(&actor).await?))
}

async fn change_role(
    State(state): State<AppStateArc>,
    Caller(actor): Caller,
    ApiPath(id): ApiPath<String>,
    ApiJson(req): ApiJson<RoleChange>,
) -> ApiResult<Json<User>> {
    Ok(Json(state.service.change_role(&actor, &id, req.new_role).await?))
}
