//! Roles API
//!
//! REST endpoints for role management within the caller's organization.

use axum::{
    extract::{State, Path},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use utoipa_axum::{router::OpenApiRouter, routes};
use utoipa::ToSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::role::entity::{Permissions, Role};
use crate::role::repository::RoleRepository;
use crate::user::repository::UserRepository;
use crate::shared::error::PlatformError;
use crate::shared::api_common::{optional_text, required_text, SuccessResponse};
use crate::shared::middleware::Authenticated;

/// Create role request
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateRoleRequest {
    /// Unique within the organization
    pub name: String,

    pub description: Option<String>,

    /// `"*"` or a map of resource to allowed actions
    #[schema(value_type = Object)]
    pub permissions: Permissions,
}

/// Update role request
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRoleRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    #[schema(value_type = Option<Object>)]
    pub permissions: Option<Permissions>,
}

/// Role response DTO
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RoleResponse {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    #[schema(value_type = Object)]
    pub permissions: Permissions,
    /// Permission map with wildcards expanded
    pub effective_permissions: BTreeMap<String, Vec<String>>,
    pub built_in: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Role> for RoleResponse {
    fn from(r: Role) -> Self {
        Self {
            id: r.id,
            name: r.name,
            description: r.description,
            effective_permissions: r.permissions.effective(),
            permissions: r.permissions,
            built_in: r.built_in,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RoleListResponse {
    pub roles: Vec<RoleResponse>,
    pub total: usize,
}

/// Roles service state
#[derive(Clone)]
pub struct RolesState {
    pub role_repo: Arc<RoleRepository>,
    pub user_repo: Arc<UserRepository>,
}

async fn load_role(state: &RolesState, organization_id: &str, id: &str) -> Result<Role, PlatformError> {
    state.role_repo.find_by_id(organization_id, id).await?
        .ok_or_else(|| PlatformError::not_found("Role", id))
}

/// List roles
#[utoipa::path(
    get,
    path = "",
    tag = "roles",
    operation_id = "getApiRoles",
    responses(
        (status = 200, description = "List of roles", body = RoleListResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_roles(
    State(state): State<RolesState>,
    auth: Authenticated,
) -> Result<Json<RoleListResponse>, PlatformError> {
    let roles: Vec<RoleResponse> = state.role_repo
        .find_all(&auth.organization_id)
        .await?
        .into_iter()
        .map(Into::into)
        .collect();

    let total = roles.len();
    Ok(Json(RoleListResponse { roles, total }))
}

/// Create a new role
#[utoipa::path(
    post,
    path = "",
    tag = "roles",
    operation_id = "postApiRoles",
    request_body = CreateRoleRequest,
    responses(
        (status = 201, description = "Role created", body = RoleResponse),
        (status = 400, description = "Validation error"),
        (status = 409, description = "Duplicate role name")
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_role(
    State(state): State<RolesState>,
    auth: Authenticated,
    Json(req): Json<CreateRoleRequest>,
) -> Result<(StatusCode, Json<RoleResponse>), PlatformError> {
    let name = required_text("name", &req.name)?;
    req.permissions.validate().map_err(PlatformError::validation)?;

    if state.role_repo.find_by_name(&auth.organization_id, &name).await?.is_some() {
        return Err(PlatformError::duplicate("Role", "name", &name));
    }

    let mut role = Role::new(&auth.organization_id, &name, req.permissions);
    role.description = optional_text(req.description);

    state.role_repo.insert(&role).await
        .map_err(|e| e.on_duplicate("Role", "name", &name))?;

    tracing::info!(role_id = %role.id, organization_id = %role.organization_id, "Role created");
    Ok((StatusCode::CREATED, Json(role.into())))
}

/// Get role by ID
#[utoipa::path(
    get,
    path = "/{id}",
    tag = "roles",
    operation_id = "getApiRolesById",
    params(
        ("id" = String, Path, description = "Role ID")
    ),
    responses(
        (status = 200, description = "Role found", body = RoleResponse),
        (status = 404, description = "Role not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_role(
    State(state): State<RolesState>,
    auth: Authenticated,
    Path(id): Path<String>,
) -> Result<Json<RoleResponse>, PlatformError> {
    let role = load_role(&state, &auth.organization_id, &id).await?;
    Ok(Json(role.into()))
}

/// Update role
#[utoipa::path(
    put,
    path = "/{id}",
    tag = "roles",
    operation_id = "putApiRolesById",
    params(
        ("id" = String, Path, description = "Role ID")
    ),
    request_body = UpdateRoleRequest,
    responses(
        (status = 200, description = "Role updated", body = RoleResponse),
        (status = 400, description = "Built-in role or validation error"),
        (status = 404, description = "Role not found"),
        (status = 409, description = "Duplicate role name")
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_role(
    State(state): State<RolesState>,
    auth: Authenticated,
    Path(id): Path<String>,
    Json(req): Json<UpdateRoleRequest>,
) -> Result<Json<RoleResponse>, PlatformError> {
    let mut role = load_role(&state, &auth.organization_id, &id).await?;

    if !role.can_modify() {
        return Err(PlatformError::validation(format!(
            "Role {} is built in and cannot be modified",
            role.name
        )));
    }

    if let Some(name) = req.name {
        let name = required_text("name", &name)?;
        if name != role.name {
            if state.role_repo.find_by_name(&auth.organization_id, &name).await?.is_some() {
                return Err(PlatformError::duplicate("Role", "name", &name));
            }
            role.name = name;
        }
    }
    if req.description.is_some() {
        role.description = optional_text(req.description);
    }
    if let Some(permissions) = req.permissions {
        permissions.validate().map_err(PlatformError::validation)?;
        role.permissions = permissions;
    }

    role.updated_at = Utc::now();
    let name = role.name.clone();
    state.role_repo.update(&role).await
        .map_err(|e| e.on_duplicate("Role", "name", &name))?;

    Ok(Json(role.into()))
}

/// Delete role
#[utoipa::path(
    delete,
    path = "/{id}",
    tag = "roles",
    operation_id = "deleteApiRolesById",
    params(
        ("id" = String, Path, description = "Role ID")
    ),
    responses(
        (status = 200, description = "Role deleted", body = SuccessResponse),
        (status = 400, description = "Built-in role"),
        (status = 404, description = "Role not found"),
        (status = 409, description = "Role still assigned to users")
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_role(
    State(state): State<RolesState>,
    auth: Authenticated,
    Path(id): Path<String>,
) -> Result<Json<SuccessResponse>, PlatformError> {
    let role = load_role(&state, &auth.organization_id, &id).await?;

    if !role.can_modify() {
        return Err(PlatformError::validation(format!(
            "Role {} is built in and cannot be deleted",
            role.name
        )));
    }

    let assigned = state.user_repo.count_by_role(&auth.organization_id, &role.id).await?;
    if assigned > 0 {
        return Err(PlatformError::conflict(format!(
            "Role {} is assigned to {} user(s)",
            role.name, assigned
        )));
    }

    state.role_repo.delete(&auth.organization_id, &role.id).await?;
    tracing::info!(role_id = %role.id, "Role deleted");

    Ok(Json(SuccessResponse::ok()))
}

pub fn roles_router(state: RolesState) -> OpenApiRouter {
    OpenApiRouter::new()
        .routes(routes!(list_roles, create_role))
        .routes(routes!(get_role, update_role, delete_role))
        .with_state(state)
}
