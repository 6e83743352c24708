//! Patrol Routes API

use axum::{
    extract::{State, Path, Query},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use utoipa_axum::{router::OpenApiRouter, routes};
use utoipa::{ToSchema, IntoParams};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::patrol::repository::PatrolRepository;
use crate::patrol_route::entity::{normalize_checkpoints, validate_duration, PatrolRoute, DEFAULT_ESTIMATED_DURATION_MINUTES};
use crate::patrol_route::repository::PatrolRouteRepository;
use crate::shared::api_common::{optional_text, required_text, SuccessResponse};
use crate::shared::error::PlatformError;
use crate::shared::middleware::Authenticated;

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreatePatrolRouteRequest {
    pub name: String,
    pub description: Option<String>,
    /// Checkpoint labels in walking order
    pub checkpoints: Vec<String>,
    pub estimated_duration_minutes: Option<i64>,
}

/// Update route request; absent fields are left unchanged
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePatrolRouteRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub checkpoints: Option<Vec<String>>,
    pub estimated_duration_minutes: Option<i64>,
    pub active: Option<bool>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PatrolRouteResponse {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub checkpoints: Vec<String>,
    pub estimated_duration_minutes: i64,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<PatrolRoute> for PatrolRouteResponse {
    fn from(r: PatrolRoute) -> Self {
        Self {
            id: r.id,
            name: r.name,
            description: r.description,
            checkpoints: r.checkpoints,
            estimated_duration_minutes: r.estimated_duration_minutes,
            active: r.active,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PatrolRouteListResponse {
    pub routes: Vec<PatrolRouteResponse>,
    pub total: usize,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct PatrolRoutesQuery {
    #[serde(default)]
    pub active_only: bool,
}

#[derive(Clone)]
pub struct PatrolRoutesState {
    pub route_repo: Arc<PatrolRouteRepository>,
    pub patrol_repo: Arc<PatrolRepository>,
}

async fn load_route(state: &PatrolRoutesState, organization_id: &str, id: &str) -> Result<PatrolRoute, PlatformError> {
    state.route_repo.find_by_id(organization_id, id).await?
        .ok_or_else(|| PlatformError::not_found("PatrolRoute", id))
}

/// List patrol routes
#[utoipa::path(
    get,
    path = "",
    tag = "patrol-routes",
    operation_id = "getApiPatrolRoutes",
    params(PatrolRoutesQuery),
    responses(
        (status = 200, description = "Patrol routes", body = PatrolRouteListResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_routes(
    State(state): State<PatrolRoutesState>,
    auth: Authenticated,
    Query(query): Query<PatrolRoutesQuery>,
) -> Result<Json<PatrolRouteListResponse>, PlatformError> {
    let routes: Vec<PatrolRouteResponse> = state.route_repo
        .find_all(&auth.organization_id, query.active_only)
        .await?
        .into_iter()
        .map(Into::into)
        .collect();
    let total = routes.len();
    Ok(Json(PatrolRouteListResponse { routes, total }))
}

/// Create a patrol route
#[utoipa::path(
    post,
    path = "",
    tag = "patrol-routes",
    operation_id = "postApiPatrolRoutes",
    request_body = CreatePatrolRouteRequest,
    responses(
        (status = 201, description = "Route created", body = PatrolRouteResponse),
        (status = 400, description = "Validation error")
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_route(
    State(state): State<PatrolRoutesState>,
    auth: Authenticated,
    Json(req): Json<CreatePatrolRouteRequest>,
) -> Result<(StatusCode, Json<PatrolRouteResponse>), PlatformError> {
    let name = required_text("name", &req.name)?;
    let checkpoints = normalize_checkpoints(req.checkpoints)?;
    let duration = validate_duration(req.estimated_duration_minutes.unwrap_or(DEFAULT_ESTIMATED_DURATION_MINUTES))?;

    let route = PatrolRoute::new(&auth.organization_id, name, checkpoints)
        .with_description(optional_text(req.description))
        .with_estimated_duration(duration);
    state.route_repo.insert(&route).await?;

    tracing::info!(route_id = %route.id, checkpoints = route.checkpoints.len(), "Patrol route created");
    Ok((StatusCode::CREATED, Json(route.into())))
}

/// Get patrol route by ID
#[utoipa::path(
    get,
    path = "/{id}",
    tag = "patrol-routes",
    operation_id = "getApiPatrolRoutesById",
    params(
        ("id" = String, Path, description = "Route ID")
    ),
    responses(
        (status = 200, description = "Route found", body = PatrolRouteResponse),
        (status = 404, description = "Route not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_route(
    State(state): State<PatrolRoutesState>,
    auth: Authenticated,
    Path(id): Path<String>,
) -> Result<Json<PatrolRouteResponse>, PlatformError> {
    Ok(Json(load_route(&state, &auth.organization_id, &id).await?.into()))
}

/// Update a patrol route
///
/// Checkpoints cannot change while patrols on the route are scheduled or
/// running, since their progress refers to the current labels.
#[utoipa::path(
    put,
    path = "/{id}",
    tag = "patrol-routes",
    operation_id = "putApiPatrolRoutesById",
    params(
        ("id" = String, Path, description = "Route ID")
    ),
    request_body = UpdatePatrolRouteRequest,
    responses(
        (status = 200, description = "Route updated", body = PatrolRouteResponse),
        (status = 400, description = "Validation error"),
        (status = 404, description = "Route not found"),
        (status = 409, description = "Route has open patrols")
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_route(
    State(state): State<PatrolRoutesState>,
    auth: Authenticated,
    Path(id): Path<String>,
    Json(req): Json<UpdatePatrolRouteRequest>,
) -> Result<Json<PatrolRouteResponse>, PlatformError> {
    let mut route = load_route(&state, &auth.organization_id, &id).await?;

    if let Some(name) = req.name {
        route.name = required_text("name", &name)?;
    }
    if req.description.is_some() {
        route.description = optional_text(req.description);
    }
    if let Some(checkpoints) = req.checkpoints {
        let checkpoints = normalize_checkpoints(checkpoints)?;
        if checkpoints != route.checkpoints {
            let open = state.patrol_repo.count_open_for_route(&auth.organization_id, &id).await?;
            if open > 0 {
                return Err(PlatformError::conflict(format!(
                    "Route has {} scheduled or running patrols; checkpoints cannot change",
                    open
                )));
            }
            route.checkpoints = checkpoints;
        }
    }
    if let Some(minutes) = req.estimated_duration_minutes {
        route.estimated_duration_minutes = validate_duration(minutes)?;
    }
    if let Some(active) = req.active {
        route.active = active;
    }

    route.updated_at = Utc::now();
    state.route_repo.update(&route).await?;

    Ok(Json(route.into()))
}

/// Delete a patrol route
#[utoipa::path(
    delete,
    path = "/{id}",
    tag = "patrol-routes",
    operation_id = "deleteApiPatrolRoutesById",
    params(
        ("id" = String, Path, description = "Route ID")
    ),
    responses(
        (status = 200, description = "Route deleted", body = SuccessResponse),
        (status = 404, description = "Route not found"),
        (status = 409, description = "Route has open patrols")
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_route(
    State(state): State<PatrolRoutesState>,
    auth: Authenticated,
    Path(id): Path<String>,
) -> Result<Json<SuccessResponse>, PlatformError> {
    let open = state.patrol_repo.count_open_for_route(&auth.organization_id, &id).await?;
    if open > 0 {
        return Err(PlatformError::conflict(format!(
            "Route has {} scheduled or running patrols",
            open
        )));
    }

    if !state.route_repo.delete(&auth.organization_id, &id).await? {
        return Err(PlatformError::not_found("PatrolRoute", &id));
    }
    tracing::info!(route_id = %id, "Patrol route deleted");
    Ok(Json(SuccessResponse::ok()))
}

pub fn patrol_routes_router(state: PatrolRoutesState) -> OpenApiRouter {
    OpenApiRouter::new()
        .routes(routes!(list_routes, create_route))
        .routes(routes!(get_route, update_route, delete_route))
        .with_state(state)
}
