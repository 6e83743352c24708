//! Backup Requests API

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

use crate::backup_request::entity::{BackupRequest, BackupStatus};
use crate::backup_request::repository::BackupRequestRepository;
use crate::geo::Coordinates;
use crate::patrol::repository::PatrolRepository;
use crate::patrol_route::repository::PatrolRouteRepository;
use crate::shared::api_common::{optional_text, LimitParams};
use crate::shared::error::PlatformError;
use crate::shared::middleware::Authenticated;

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateBackupRequest {
    pub latitude: f64,
    pub longitude: f64,
    pub message: Option<String>,
    pub patrol_id: Option<String>,
    /// Derived from the patrol's progress when omitted
    pub nearest_checkpoint: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BackupRequestResponse {
    pub id: String,
    pub guard_id: String,
    pub patrol_id: Option<String>,
    pub nearest_checkpoint: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    pub message: Option<String>,
    pub status: BackupStatus,
    pub acknowledged_by: Option<String>,
    pub acknowledged_at: Option<DateTime<Utc>>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<BackupRequest> for BackupRequestResponse {
    fn from(r: BackupRequest) -> Self {
        Self {
            id: r.id,
            guard_id: r.guard_id,
            patrol_id: r.patrol_id,
            nearest_checkpoint: r.nearest_checkpoint,
            latitude: r.latitude,
            longitude: r.longitude,
            message: r.message,
            status: r.status,
            acknowledged_by: r.acknowledged_by,
            acknowledged_at: r.acknowledged_at,
            resolved_at: r.resolved_at,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BackupRequestListResponse {
    pub requests: Vec<BackupRequestResponse>,
    pub total: usize,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct BackupRequestsQuery {
    pub status: Option<BackupStatus>,
}

#[derive(Clone)]
pub struct BackupRequestsState {
    pub backup_repo: Arc<BackupRequestRepository>,
    pub patrol_repo: Arc<PatrolRepository>,
    pub route_repo: Arc<PatrolRouteRepository>,
}

async fn load_request(state: &BackupRequestsState, organization_id: &str, id: &str) -> Result<BackupRequest, PlatformError> {
    state.backup_repo.find_by_id(organization_id, id).await?
        .ok_or_else(|| PlatformError::not_found("BackupRequest", id))
}

/// Checkpoint to report for a request raised during a patrol
async fn derive_nearest_checkpoint(
    state: &BackupRequestsState,
    organization_id: &str,
    patrol_id: &str,
) -> Result<Option<String>, PlatformError> {
    let patrol = state.patrol_repo.find_by_id(organization_id, patrol_id).await?
        .ok_or_else(|| PlatformError::not_found("Patrol", patrol_id))?;
    let route = state.route_repo.find_by_id(organization_id, &patrol.route_id).await?;
    Ok(route
        .as_ref()
        .and_then(|r| patrol.nearest_checkpoint(r))
        .map(str::to_string))
}

/// Store a transition, rejecting it when another request changed the status first
async fn apply_transition<F>(
    state: &BackupRequestsState,
    organization_id: &str,
    id: &str,
    change: F,
) -> Result<BackupRequest, PlatformError>
where
    F: FnOnce(&mut BackupRequest) -> Result<(), PlatformError>,
{
    let mut request = load_request(state, organization_id, id).await?;
    let read_status = request.status;
    change(&mut request)?;

    if !state.backup_repo.replace_if_status(&request, read_status).await? {
        return Err(PlatformError::conflict("Backup request was modified by another request, retry"));
    }

    tracing::info!(
        backup_request_id = %request.id,
        from = read_status.as_str(),
        to = request.status.as_str(),
        "Backup request updated"
    );
    Ok(request)
}

/// List backup requests, newest first
#[utoipa::path(
    get,
    path = "",
    tag = "backup-requests",
    operation_id = "getApiBackupRequests",
    params(BackupRequestsQuery, LimitParams),
    responses(
        (status = 200, description = "Backup requests", body = BackupRequestListResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_backup_requests(
    State(state): State<BackupRequestsState>,
    auth: Authenticated,
    Query(query): Query<BackupRequestsQuery>,
    Query(limit): Query<LimitParams>,
) -> Result<Json<BackupRequestListResponse>, PlatformError> {
    let requests: Vec<BackupRequestResponse> = state.backup_repo
        .find(&auth.organization_id, query.status, limit.limit())
        .await?
        .into_iter()
        .map(Into::into)
        .collect();
    let total = requests.len();
    Ok(Json(BackupRequestListResponse { requests, total }))
}

/// Request backup at the caller's position
#[utoipa::path(
    post,
    path = "",
    tag = "backup-requests",
    operation_id = "postApiBackupRequests",
    request_body = CreateBackupRequest,
    responses(
        (status = 201, description = "Backup requested", body = BackupRequestResponse),
        (status = 400, description = "Invalid coordinates"),
        (status = 404, description = "Patrol not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_backup_request(
    State(state): State<BackupRequestsState>,
    auth: Authenticated,
    Json(req): Json<CreateBackupRequest>,
) -> Result<(StatusCode, Json<BackupRequestResponse>), PlatformError> {
    let position = Coordinates::new(req.latitude, req.longitude)?;

    let patrol_id = optional_text(req.patrol_id);
    let nearest_checkpoint = match (optional_text(req.nearest_checkpoint), &patrol_id) {
        (Some(given), _) => Some(given),
        (None, Some(patrol_id)) => derive_nearest_checkpoint(&state, &auth.organization_id, patrol_id).await?,
        (None, None) => None,
    };

    let request = BackupRequest::new(&auth.organization_id, &auth.user_id, position)
        .on_patrol(patrol_id, nearest_checkpoint)
        .with_message(optional_text(req.message));
    state.backup_repo.insert(&request).await?;

    tracing::warn!(
        backup_request_id = %request.id,
        guard_id = %request.guard_id,
        nearest_checkpoint = ?request.nearest_checkpoint,
        "Backup requested"
    );
    Ok((StatusCode::CREATED, Json(request.into())))
}

/// Get backup request by ID
#[utoipa::path(
    get,
    path = "/{id}",
    tag = "backup-requests",
    operation_id = "getApiBackupRequestsById",
    params(
        ("id" = String, Path, description = "Backup request ID")
    ),
    responses(
        (status = 200, description = "Backup request found", body = BackupRequestResponse),
        (status = 404, description = "Backup request not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_backup_request(
    State(state): State<BackupRequestsState>,
    auth: Authenticated,
    Path(id): Path<String>,
) -> Result<Json<BackupRequestResponse>, PlatformError> {
    Ok(Json(load_request(&state, &auth.organization_id, &id).await?.into()))
}

/// Acknowledge a pending backup request
#[utoipa::path(
    post,
    path = "/{id}/acknowledge",
    tag = "backup-requests",
    operation_id = "postApiBackupRequestsByIdAcknowledge",
    params(
        ("id" = String, Path, description = "Backup request ID")
    ),
    responses(
        (status = 200, description = "Acknowledged", body = BackupRequestResponse),
        (status = 400, description = "Request is not pending"),
        (status = 404, description = "Backup request not found"),
        (status = 409, description = "Concurrent modification")
    ),
    security(("bearer_auth" = []))
)]
pub async fn acknowledge_backup_request(
    State(state): State<BackupRequestsState>,
    auth: Authenticated,
    Path(id): Path<String>,
) -> Result<Json<BackupRequestResponse>, PlatformError> {
    let now = Utc::now();
    let user_id = auth.user_id.clone();
    let request = apply_transition(&state, &auth.organization_id, &id, |r| r.acknowledge(user_id, now)).await?;
    Ok(Json(request.into()))
}

/// Resolve a backup request
#[utoipa::path(
    post,
    path = "/{id}/resolve",
    tag = "backup-requests",
    operation_id = "postApiBackupRequestsByIdResolve",
    params(
        ("id" = String, Path, description = "Backup request ID")
    ),
    responses(
        (status = 200, description = "Resolved", body = BackupRequestResponse),
        (status = 400, description = "Request already resolved"),
        (status = 404, description = "Backup request not found"),
        (status = 409, description = "Concurrent modification")
    ),
    security(("bearer_auth" = []))
)]
pub async fn resolve_backup_request(
    State(state): State<BackupRequestsState>,
    auth: Authenticated,
    Path(id): Path<String>,
) -> Result<Json<BackupRequestResponse>, PlatformError> {
    let now = Utc::now();
    let request = apply_transition(&state, &auth.organization_id, &id, |r| r.resolve(now)).await?;
    Ok(Json(request.into()))
}

pub fn backup_requests_router(state: BackupRequestsState) -> OpenApiRouter {
    OpenApiRouter::new()
        .routes(routes!(list_backup_requests, create_backup_request))
        .routes(routes!(get_backup_request))
        .routes(routes!(acknowledge_backup_request))
        .routes(routes!(resolve_backup_request))
        .with_state(state)
}
