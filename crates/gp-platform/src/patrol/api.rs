//! Patrols API

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

use crate::geo::Coordinates;
use crate::patrol::entity::{CheckpointVisit, Patrol, PatrolStats, PatrolStatus};
use crate::patrol::repository::{PatrolFilter, PatrolRepository};
use crate::patrol_route::entity::PatrolRoute;
use crate::patrol_route::repository::PatrolRouteRepository;
use crate::user::repository::UserRepository;
use crate::shared::api_common::{optional_text, required_text, LimitParams};
use crate::shared::error::PlatformError;
use crate::shared::middleware::Authenticated;

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreatePatrolRequest {
    pub route_id: String,
    /// Assigned guard; defaults to the caller
    pub guard_id: Option<String>,
    pub scheduled_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VisitCheckpointRequest {
    pub checkpoint: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PatrolResponse {
    pub id: String,
    pub route_id: String,
    pub guard_id: String,
    pub status: PatrolStatus,
    pub total_checkpoints: i64,
    pub completed_checkpoints: i64,
    pub visits: Vec<CheckpointVisitResponse>,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CheckpointVisitResponse {
    pub checkpoint: String,
    pub visited_at: DateTime<Utc>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl From<CheckpointVisit> for CheckpointVisitResponse {
    fn from(v: CheckpointVisit) -> Self {
        Self {
            checkpoint: v.checkpoint,
            visited_at: v.visited_at,
            latitude: v.latitude,
            longitude: v.longitude,
        }
    }
}

impl From<Patrol> for PatrolResponse {
    fn from(p: Patrol) -> Self {
        Self {
            id: p.id,
            route_id: p.route_id,
            guard_id: p.guard_id,
            status: p.status,
            total_checkpoints: p.total_checkpoints,
            completed_checkpoints: p.completed_checkpoints,
            visits: p.visits.into_iter().map(Into::into).collect(),
            scheduled_at: p.scheduled_at,
            started_at: p.started_at,
            completed_at: p.completed_at,
            created_at: p.created_at,
            updated_at: p.updated_at,
        }
    }
}

/// Patrol with the route it follows
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PatrolDetailResponse {
    #[serde(flatten)]
    pub patrol: PatrolResponse,
    pub route_name: Option<String>,
    pub checkpoints: Vec<String>,
    pub next_checkpoint: Option<String>,
}

impl PatrolDetailResponse {
    fn new(patrol: Patrol, route: Option<&PatrolRoute>) -> Self {
        let next_checkpoint = route
            .filter(|_| patrol.status.is_open())
            .and_then(|r| patrol.next_unvisited(r))
            .map(str::to_string);
        Self {
            route_name: route.map(|r| r.name.clone()),
            checkpoints: route.map(|r| r.checkpoints.clone()).unwrap_or_default(),
            next_checkpoint,
            patrol: patrol.into(),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PatrolListResponse {
    pub patrols: Vec<PatrolResponse>,
    pub total: usize,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct PatrolsQuery {
    pub status: Option<PatrolStatus>,
    pub guard_id: Option<String>,
    pub route_id: Option<String>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct PatrolStatsQuery {
    pub guard_id: Option<String>,
    pub route_id: Option<String>,
    /// Only patrols created at or after this instant
    pub from: Option<DateTime<Utc>>,
    /// Only patrols created at or before this instant
    pub to: Option<DateTime<Utc>>,
}

#[derive(Clone)]
pub struct PatrolsState {
    pub patrol_repo: Arc<PatrolRepository>,
    pub route_repo: Arc<PatrolRouteRepository>,
    pub user_repo: Arc<UserRepository>,
}

async fn load_patrol(state: &PatrolsState, organization_id: &str, id: &str) -> Result<Patrol, PlatformError> {
    state.patrol_repo.find_by_id(organization_id, id).await?
        .ok_or_else(|| PlatformError::not_found("Patrol", id))
}

async fn load_route(state: &PatrolsState, organization_id: &str, id: &str) -> Result<PatrolRoute, PlatformError> {
    state.route_repo.find_by_id(organization_id, id).await?
        .ok_or_else(|| PlatformError::not_found("PatrolRoute", id))
}

/// Apply `change` and store it, failing with 409 if a concurrent request won
async fn apply_transition<F>(
    state: &PatrolsState,
    organization_id: &str,
    id: &str,
    change: F,
) -> Result<PatrolDetailResponse, PlatformError>
where
    F: FnOnce(&mut Patrol, &PatrolRoute) -> Result<(), PlatformError>,
{
    let mut patrol = load_patrol(state, organization_id, id).await?;
    let route = load_route(state, organization_id, &patrol.route_id).await?;
    let (read_status, read_completed) = (patrol.status, patrol.completed_checkpoints);

    change(&mut patrol, &route)?;

    if !state.patrol_repo.replace_if_unchanged(&patrol, read_status, read_completed).await? {
        return Err(PlatformError::conflict("Patrol was modified by another request, retry"));
    }

    tracing::info!(
        patrol_id = %patrol.id,
        from = read_status.as_str(),
        to = patrol.status.as_str(),
        completed = patrol.completed_checkpoints,
        "Patrol updated"
    );
    Ok(PatrolDetailResponse::new(patrol, Some(&route)))
}

/// List patrols, newest first
#[utoipa::path(
    get,
    path = "",
    tag = "patrols",
    operation_id = "getApiPatrols",
    params(PatrolsQuery, LimitParams),
    responses(
        (status = 200, description = "Patrols", body = PatrolListResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_patrols(
    State(state): State<PatrolsState>,
    auth: Authenticated,
    Query(query): Query<PatrolsQuery>,
    Query(limit): Query<LimitParams>,
) -> Result<Json<PatrolListResponse>, PlatformError> {
    let filter = PatrolFilter {
        status: query.status,
        guard_id: optional_text(query.guard_id),
        route_id: optional_text(query.route_id),
        ..Default::default()
    };
    let patrols: Vec<PatrolResponse> = state.patrol_repo
        .find(&auth.organization_id, &filter, Some(limit.limit()))
        .await?
        .into_iter()
        .map(Into::into)
        .collect();
    let total = patrols.len();
    Ok(Json(PatrolListResponse { patrols, total }))
}

/// Schedule a patrol on a route
#[utoipa::path(
    post,
    path = "",
    tag = "patrols",
    operation_id = "postApiPatrols",
    request_body = CreatePatrolRequest,
    responses(
        (status = 201, description = "Patrol scheduled", body = PatrolDetailResponse),
        (status = 400, description = "Route inactive or guard inactive"),
        (status = 404, description = "Route or guard not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_patrol(
    State(state): State<PatrolsState>,
    auth: Authenticated,
    Json(req): Json<CreatePatrolRequest>,
) -> Result<(StatusCode, Json<PatrolDetailResponse>), PlatformError> {
    let route_id = required_text("routeId", &req.route_id)?;
    let route = load_route(&state, &auth.organization_id, &route_id).await?;
    if !route.active {
        return Err(PlatformError::validation(format!("Route {} is inactive", route.name)));
    }

    let guard_id = optional_text(req.guard_id).unwrap_or_else(|| auth.user_id.clone());
    let guard = state.user_repo.find_by_id(&auth.organization_id, &guard_id).await?
        .ok_or_else(|| PlatformError::not_found("Guard", &guard_id))?;
    if !guard.active {
        return Err(PlatformError::validation("Cannot assign a patrol to an inactive guard"));
    }

    let patrol = Patrol::new(&route, guard.id, req.scheduled_at);
    state.patrol_repo.insert(&patrol).await?;

    tracing::info!(patrol_id = %patrol.id, route_id = %route.id, guard_id = %patrol.guard_id, "Patrol scheduled");
    Ok((StatusCode::CREATED, Json(PatrolDetailResponse::new(patrol, Some(&route)))))
}

/// Patrol statistics for the organization
#[utoipa::path(
    get,
    path = "/stats",
    tag = "patrols",
    operation_id = "getApiPatrolsStats",
    params(PatrolStatsQuery),
    responses(
        (status = 200, description = "Patrol statistics", body = PatrolStats)
    ),
    security(("bearer_auth" = []))
)]
pub async fn patrol_stats(
    State(state): State<PatrolsState>,
    auth: Authenticated,
    Query(query): Query<PatrolStatsQuery>,
) -> Result<Json<PatrolStats>, PlatformError> {
    let filter = PatrolFilter {
        status: None,
        guard_id: optional_text(query.guard_id),
        route_id: optional_text(query.route_id),
        from: query.from,
        to: query.to,
    };
    let patrols = state.patrol_repo.find(&auth.organization_id, &filter, None).await?;
    Ok(Json(PatrolStats::from_patrols(&patrols)))
}

/// Get patrol by ID
#[utoipa::path(
    get,
    path = "/{id}",
    tag = "patrols",
    operation_id = "getApiPatrolsById",
    params(
        ("id" = String, Path, description = "Patrol ID")
    ),
    responses(
        (status = 200, description = "Patrol found", body = PatrolDetailResponse),
        (status = 404, description = "Patrol not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_patrol(
    State(state): State<PatrolsState>,
    auth: Authenticated,
    Path(id): Path<String>,
) -> Result<Json<PatrolDetailResponse>, PlatformError> {
    let patrol = load_patrol(&state, &auth.organization_id, &id).await?;
    // A deleted route leaves its finished patrols readable
    let route = state.route_repo.find_by_id(&auth.organization_id, &patrol.route_id).await?;
    Ok(Json(PatrolDetailResponse::new(patrol, route.as_ref())))
}

/// Start a scheduled patrol
#[utoipa::path(
    post,
    path = "/{id}/start",
    tag = "patrols",
    operation_id = "postApiPatrolsByIdStart",
    params(
        ("id" = String, Path, description = "Patrol ID")
    ),
    responses(
        (status = 200, description = "Patrol started", body = PatrolDetailResponse),
        (status = 400, description = "Patrol is not scheduled"),
        (status = 404, description = "Patrol not found"),
        (status = 409, description = "Concurrent modification")
    ),
    security(("bearer_auth" = []))
)]
pub async fn start_patrol(
    State(state): State<PatrolsState>,
    auth: Authenticated,
    Path(id): Path<String>,
) -> Result<Json<PatrolDetailResponse>, PlatformError> {
    let now = Utc::now();
    let detail = apply_transition(&state, &auth.organization_id, &id, |p, _| p.start(now)).await?;
    Ok(Json(detail))
}

/// Record a checkpoint visit
#[utoipa::path(
    post,
    path = "/{id}/checkpoints",
    tag = "patrols",
    operation_id = "postApiPatrolsByIdCheckpoints",
    params(
        ("id" = String, Path, description = "Patrol ID")
    ),
    request_body = VisitCheckpointRequest,
    responses(
        (status = 200, description = "Checkpoint recorded", body = PatrolDetailResponse),
        (status = 400, description = "Patrol not running or unknown checkpoint"),
        (status = 404, description = "Patrol not found"),
        (status = 409, description = "Checkpoint already visited")
    ),
    security(("bearer_auth" = []))
)]
pub async fn visit_checkpoint(
    State(state): State<PatrolsState>,
    auth: Authenticated,
    Path(id): Path<String>,
    Json(req): Json<VisitCheckpointRequest>,
) -> Result<Json<PatrolDetailResponse>, PlatformError> {
    let position = Coordinates::from_optional(req.latitude, req.longitude)?;
    let checkpoint = required_text("checkpoint", &req.checkpoint)?;
    let now = Utc::now();

    let detail = apply_transition(&state, &auth.organization_id, &id, |p, route| {
        p.visit(route, &checkpoint, position, now)
    })
    .await?;
    Ok(Json(detail))
}

/// Complete a running patrol
#[utoipa::path(
    post,
    path = "/{id}/complete",
    tag = "patrols",
    operation_id = "postApiPatrolsByIdComplete",
    params(
        ("id" = String, Path, description = "Patrol ID")
    ),
    responses(
        (status = 200, description = "Patrol completed", body = PatrolDetailResponse),
        (status = 400, description = "Patrol is not running"),
        (status = 404, description = "Patrol not found"),
        (status = 409, description = "Concurrent modification")
    ),
    security(("bearer_auth" = []))
)]
pub async fn complete_patrol(
    State(state): State<PatrolsState>,
    auth: Authenticated,
    Path(id): Path<String>,
) -> Result<Json<PatrolDetailResponse>, PlatformError> {
    let now = Utc::now();
    let detail = apply_transition(&state, &auth.organization_id, &id, |p, _| p.complete(now)).await?;
    Ok(Json(detail))
}

/// Cancel a scheduled or running patrol
#[utoipa::path(
    post,
    path = "/{id}/cancel",
    tag = "patrols",
    operation_id = "postApiPatrolsByIdCancel",
    params(
        ("id" = String, Path, description = "Patrol ID")
    ),
    responses(
        (status = 200, description = "Patrol cancelled", body = PatrolDetailResponse),
        (status = 400, description = "Patrol already finished"),
        (status = 404, description = "Patrol not found"),
        (status = 409, description = "Concurrent modification")
    ),
    security(("bearer_auth" = []))
)]
pub async fn cancel_patrol(
    State(state): State<PatrolsState>,
    auth: Authenticated,
    Path(id): Path<String>,
) -> Result<Json<PatrolDetailResponse>, PlatformError> {
    let now = Utc::now();
    let detail = apply_transition(&state, &auth.organization_id, &id, |p, _| p.cancel(now)).await?;
    Ok(Json(detail))
}

pub fn patrols_router(state: PatrolsState) -> OpenApiRouter {
    OpenApiRouter::new()
        .routes(routes!(list_patrols, create_patrol))
        .routes(routes!(patrol_stats))
        .routes(routes!(get_patrol))
        .routes(routes!(start_patrol))
        .routes(routes!(visit_checkpoint))
        .routes(routes!(complete_patrol))
        .routes(routes!(cancel_patrol))
        .with_state(state)
}
