//! Guards API
//!
//! Listing and administering the users of an organization.

use axum::{
    extract::{State, Path, Query},
    Json,
};
use chrono::{DateTime, Utc};
use utoipa_axum::{router::OpenApiRouter, routes};
use utoipa::{ToSchema, IntoParams};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use crate::role::repository::RoleRepository;
use crate::user::entity::User;
use crate::user::repository::{GuardFilter, UserRepository};
use crate::shared::api_common::{optional_text, LimitParams};
use crate::shared::error::PlatformError;
use crate::shared::middleware::Authenticated;

/// Guard response DTO (never carries the password hash)
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GuardResponse {
    pub id: String,
    pub email: String,
    pub full_name: String,
    pub phone: Option<String>,
    pub department: Option<String>,
    pub role_id: String,
    pub role_name: Option<String>,
    pub active: bool,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl GuardResponse {
    pub fn from_user(u: User, role_name: Option<String>) -> Self {
        Self {
            id: u.id,
            email: u.email,
            full_name: u.full_name,
            phone: u.phone,
            department: u.department,
            role_id: u.role_id,
            role_name,
            active: u.active,
            last_login_at: u.last_login_at,
            created_at: u.created_at,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GuardListResponse {
    pub guards: Vec<GuardResponse>,
    pub total: usize,
}

/// Query parameters for the guard list
#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct GuardsQuery {
    pub active: Option<bool>,
    pub role_id: Option<String>,
    pub department: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateGuardStatusRequest {
    pub active: bool,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateGuardRoleRequest {
    pub role_id: String,
}

#[derive(Clone)]
pub struct GuardsState {
    pub user_repo: Arc<UserRepository>,
    pub role_repo: Arc<RoleRepository>,
}

async fn role_name(state: &GuardsState, organization_id: &str, role_id: &str) -> Result<Option<String>, PlatformError> {
    Ok(state.role_repo.find_by_id(organization_id, role_id).await?.map(|r| r.name))
}

/// List guards
#[utoipa::path(
    get,
    path = "",
    tag = "guards",
    operation_id = "getApiGuards",
    params(GuardsQuery, LimitParams),
    responses(
        (status = 200, description = "List of guards", body = GuardListResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_guards(
    State(state): State<GuardsState>,
    auth: Authenticated,
    Query(query): Query<GuardsQuery>,
    Query(limit): Query<LimitParams>,
) -> Result<Json<GuardListResponse>, PlatformError> {
    let filter = GuardFilter {
        active: query.active,
        role_id: optional_text(query.role_id),
        department: optional_text(query.department),
    };

    let users = state.user_repo
        .find_filtered(&auth.organization_id, &filter, limit.limit())
        .await?;

    let role_names: HashMap<String, String> = state.role_repo
        .find_all(&auth.organization_id)
        .await?
        .into_iter()
        .map(|r| (r.id, r.name))
        .collect();

    let guards: Vec<GuardResponse> = users
        .into_iter()
        .map(|u| {
            let name = role_names.get(&u.role_id).cloned();
            GuardResponse::from_user(u, name)
        })
        .collect();

    let total = guards.len();
    Ok(Json(GuardListResponse { guards, total }))
}

/// Get guard by ID
#[utoipa::path(
    get,
    path = "/{id}",
    tag = "guards",
    operation_id = "getApiGuardsById",
    params(
        ("id" = String, Path, description = "User ID")
    ),
    responses(
        (status = 200, description = "Guard found", body = GuardResponse),
        (status = 404, description = "Guard not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_guard(
    State(state): State<GuardsState>,
    auth: Authenticated,
    Path(id): Path<String>,
) -> Result<Json<GuardResponse>, PlatformError> {
    let user = state.user_repo.find_by_id(&auth.organization_id, &id).await?
        .ok_or_else(|| PlatformError::not_found("User", &id))?;
    let name = role_name(&state, &auth.organization_id, &user.role_id).await?;
    Ok(Json(GuardResponse::from_user(user, name)))
}

/// Activate or deactivate a guard
#[utoipa::path(
    put,
    path = "/{id}/status",
    tag = "guards",
    operation_id = "putApiGuardsByIdStatus",
    params(
        ("id" = String, Path, description = "User ID")
    ),
    request_body = UpdateGuardStatusRequest,
    responses(
        (status = 200, description = "Status updated", body = GuardResponse),
        (status = 400, description = "Cannot deactivate yourself"),
        (status = 404, description = "Guard not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_guard_status(
    State(state): State<GuardsState>,
    auth: Authenticated,
    Path(id): Path<String>,
    Json(req): Json<UpdateGuardStatusRequest>,
) -> Result<Json<GuardResponse>, PlatformError> {
    if !req.active && id == auth.user_id {
        return Err(PlatformError::validation("You cannot deactivate your own account"));
    }

    let user = state.user_repo.set_active(&auth.organization_id, &id, req.active).await?
        .ok_or_else(|| PlatformError::not_found("User", &id))?;

    tracing::info!(user_id = %user.id, active = user.active, "Guard status updated");
    let name = role_name(&state, &auth.organization_id, &user.role_id).await?;
    Ok(Json(GuardResponse::from_user(user, name)))
}

/// Change a guard's role
#[utoipa::path(
    put,
    path = "/{id}/role",
    tag = "guards",
    operation_id = "putApiGuardsByIdRole",
    params(
        ("id" = String, Path, description = "User ID")
    ),
    request_body = UpdateGuardRoleRequest,
    responses(
        (status = 200, description = "Role updated", body = GuardResponse),
        (status = 404, description = "Guard or role not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_guard_role(
    State(state): State<GuardsState>,
    auth: Authenticated,
    Path(id): Path<String>,
    Json(req): Json<UpdateGuardRoleRequest>,
) -> Result<Json<GuardResponse>, PlatformError> {
    let role = state.role_repo.find_by_id(&auth.organization_id, &req.role_id).await?
        .ok_or_else(|| PlatformError::not_found("Role", &req.role_id))?;

    let user = state.user_repo.set_role(&auth.organization_id, &id, &role.id).await?
        .ok_or_else(|| PlatformError::not_found("User", &id))?;

    tracing::info!(user_id = %user.id, role_id = %role.id, "Guard role updated");
    Ok(Json(GuardResponse::from_user(user, Some(role.name))))
}

pub fn guards_router(state: GuardsState) -> OpenApiRouter {
    OpenApiRouter::new()
        .routes(routes!(list_guards))
        .routes(routes!(get_guard))
        .routes(routes!(update_guard_status))
        .routes(routes!(update_guard_role))
        .with_state(state)
}
