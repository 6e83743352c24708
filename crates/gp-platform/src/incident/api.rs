//! Incidents API

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
use crate::incident::entity::{Incident, IncidentSeverity, IncidentStatus};
use crate::incident::repository::{IncidentFilter, IncidentRepository};
use crate::patrol::repository::PatrolRepository;
use crate::shared::api_common::{optional_text, required_text, LimitParams};
use crate::shared::error::PlatformError;
use crate::shared::middleware::Authenticated;

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReportIncidentRequest {
    pub title: String,
    pub description: String,
    /// Defaults to MEDIUM
    pub severity: Option<IncidentSeverity>,
    pub patrol_id: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateIncidentStatusRequest {
    pub status: IncidentStatus,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct IncidentResponse {
    pub id: String,
    pub reported_by: String,
    pub patrol_id: Option<String>,
    pub title: String,
    pub description: String,
    pub severity: IncidentSeverity,
    pub status: IncidentStatus,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl From<Incident> for IncidentResponse {
    fn from(i: Incident) -> Self {
        Self {
            id: i.id,
            reported_by: i.reported_by,
            patrol_id: i.patrol_id,
            title: i.title,
            description: i.description,
            severity: i.severity,
            status: i.status,
            latitude: i.latitude,
            longitude: i.longitude,
            created_at: i.created_at,
            updated_at: i.updated_at,
            resolved_at: i.resolved_at,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct IncidentListResponse {
    pub incidents: Vec<IncidentResponse>,
    pub total: usize,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct IncidentsQuery {
    pub status: Option<IncidentStatus>,
    pub severity: Option<IncidentSeverity>,
    pub reported_by: Option<String>,
    pub patrol_id: Option<String>,
}

#[derive(Clone)]
pub struct IncidentsState {
    pub incident_repo: Arc<IncidentRepository>,
    pub patrol_repo: Arc<PatrolRepository>,
}

async fn load_incident(state: &IncidentsState, organization_id: &str, id: &str) -> Result<Incident, PlatformError> {
    state.incident_repo.find_by_id(organization_id, id).await?
        .ok_or_else(|| PlatformError::not_found("Incident", id))
}

/// List incidents, newest first
#[utoipa::path(
    get,
    path = "",
    tag = "incidents",
    operation_id = "getApiIncidents",
    params(IncidentsQuery, LimitParams),
    responses(
        (status = 200, description = "Incidents", body = IncidentListResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_incidents(
    State(state): State<IncidentsState>,
    auth: Authenticated,
    Query(query): Query<IncidentsQuery>,
    Query(limit): Query<LimitParams>,
) -> Result<Json<IncidentListResponse>, PlatformError> {
    let filter = IncidentFilter {
        status: query.status,
        severity: query.severity,
        reported_by: optional_text(query.reported_by),
        patrol_id: optional_text(query.patrol_id),
    };
    let incidents: Vec<IncidentResponse> = state.incident_repo
        .find(&auth.organization_id, &filter, limit.limit())
        .await?
        .into_iter()
        .map(Into::into)
        .collect();
    let total = incidents.len();
    Ok(Json(IncidentListResponse { incidents, total }))
}

/// Report an incident
#[utoipa::path(
    post,
    path = "",
    tag = "incidents",
    operation_id = "postApiIncidents",
    request_body = ReportIncidentRequest,
    responses(
        (status = 201, description = "Incident reported", body = IncidentResponse),
        (status = 400, description = "Validation error"),
        (status = 404, description = "Patrol not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn report_incident(
    State(state): State<IncidentsState>,
    auth: Authenticated,
    Json(req): Json<ReportIncidentRequest>,
) -> Result<(StatusCode, Json<IncidentResponse>), PlatformError> {
    let title = required_text("title", &req.title)?;
    let description = required_text("description", &req.description)?;
    let position = Coordinates::from_optional(req.latitude, req.longitude)?;

    let patrol_id = optional_text(req.patrol_id);
    if let Some(patrol_id) = &patrol_id {
        if state.patrol_repo.find_by_id(&auth.organization_id, patrol_id).await?.is_none() {
            return Err(PlatformError::not_found("Patrol", patrol_id));
        }
    }

    let incident = Incident::new(
        &auth.organization_id,
        &auth.user_id,
        title,
        description,
        req.severity.unwrap_or_default(),
    )
    .on_patrol(patrol_id)
    .at(position);
    state.incident_repo.insert(&incident).await?;

    tracing::info!(
        incident_id = %incident.id,
        severity = incident.severity.as_str(),
        reported_by = %incident.reported_by,
        "Incident reported"
    );
    Ok((StatusCode::CREATED, Json(incident.into())))
}

/// Get incident by ID
#[utoipa::path(
    get,
    path = "/{id}",
    tag = "incidents",
    operation_id = "getApiIncidentsById",
    params(
        ("id" = String, Path, description = "Incident ID")
    ),
    responses(
        (status = 200, description = "Incident found", body = IncidentResponse),
        (status = 404, description = "Incident not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_incident(
    State(state): State<IncidentsState>,
    auth: Authenticated,
    Path(id): Path<String>,
) -> Result<Json<IncidentResponse>, PlatformError> {
    Ok(Json(load_incident(&state, &auth.organization_id, &id).await?.into()))
}

/// Change incident status
#[utoipa::path(
    put,
    path = "/{id}/status",
    tag = "incidents",
    operation_id = "putApiIncidentsByIdStatus",
    params(
        ("id" = String, Path, description = "Incident ID")
    ),
    request_body = UpdateIncidentStatusRequest,
    responses(
        (status = 200, description = "Status updated", body = IncidentResponse),
        (status = 400, description = "Incident is closed"),
        (status = 404, description = "Incident not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_incident_status(
    State(state): State<IncidentsState>,
    auth: Authenticated,
    Path(id): Path<String>,
    Json(req): Json<UpdateIncidentStatusRequest>,
) -> Result<Json<IncidentResponse>, PlatformError> {
    let mut incident = load_incident(&state, &auth.organization_id, &id).await?;
    let previous = incident.status;

    incident.change_status(req.status, Utc::now())?;
    state.incident_repo.update(&incident).await?;

    tracing::info!(
        incident_id = %incident.id,
        from = previous.as_str(),
        to = incident.status.as_str(),
        "Incident status changed"
    );
    Ok(Json(incident.into()))
}

pub fn incidents_router(state: IncidentsState) -> OpenApiRouter {
    OpenApiRouter::new()
        .routes(routes!(list_incidents, report_incident))
        .routes(routes!(get_incident))
        .routes(routes!(update_incident_status))
        .with_state(state)
}
