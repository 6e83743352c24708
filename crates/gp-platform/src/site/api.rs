//! Sites API

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
use crate::site::entity::Site;
use crate::site::repository::SiteRepository;
use crate::shared::api_common::{optional_text, required_text, SuccessResponse};
use crate::shared::error::PlatformError;
use crate::shared::middleware::Authenticated;

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateSiteRequest {
    pub name: String,
    pub address: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    /// Geofence radius in meters; requires coordinates
    pub radius_meters: Option<f64>,
}

/// Update site request; absent fields are left unchanged
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSiteRequest {
    pub name: Option<String>,
    pub address: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub radius_meters: Option<f64>,
    pub active: Option<bool>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SiteResponse {
    pub id: String,
    pub name: String,
    pub address: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub radius_meters: Option<f64>,
    pub geofenced: bool,
    pub qr_token: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Site> for SiteResponse {
    fn from(s: Site) -> Self {
        Self {
            geofenced: s.geofence().is_some(),
            id: s.id,
            name: s.name,
            address: s.address,
            latitude: s.latitude,
            longitude: s.longitude,
            radius_meters: s.radius_meters,
            qr_token: s.qr_token,
            active: s.active,
            created_at: s.created_at,
            updated_at: s.updated_at,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SiteListResponse {
    pub sites: Vec<SiteResponse>,
    pub total: usize,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct SitesQuery {
    /// Only return active sites
    #[serde(default)]
    pub active_only: bool,
}

#[derive(Clone)]
pub struct SitesState {
    pub site_repo: Arc<SiteRepository>,
}

fn validate_radius(radius_meters: Option<f64>) -> Result<Option<f64>, PlatformError> {
    match radius_meters {
        Some(r) if !r.is_finite() || r <= 0.0 => {
            Err(PlatformError::validation("radiusMeters must be greater than 0"))
        }
        other => Ok(other),
    }
}

fn apply_location(
    site: &mut Site,
    latitude: Option<f64>,
    longitude: Option<f64>,
    radius_meters: Option<f64>,
) -> Result<(), PlatformError> {
    if let Some(location) = Coordinates::from_optional(latitude, longitude)? {
        site.latitude = Some(location.latitude);
        site.longitude = Some(location.longitude);
    }
    if let Some(radius) = validate_radius(radius_meters)? {
        site.radius_meters = Some(radius);
    }
    if site.radius_meters.is_some() && (site.latitude.is_none() || site.longitude.is_none()) {
        return Err(PlatformError::validation(
            "radiusMeters requires latitude and longitude",
        ));
    }
    Ok(())
}

async fn load_site(state: &SitesState, organization_id: &str, id: &str) -> Result<Site, PlatformError> {
    state.site_repo.find_by_id(organization_id, id).await?
        .ok_or_else(|| PlatformError::not_found("Site", id))
}

/// List sites
#[utoipa::path(
    get,
    path = "",
    tag = "sites",
    operation_id = "getApiSites",
    params(SitesQuery),
    responses(
        (status = 200, description = "Sites", body = SiteListResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_sites(
    State(state): State<SitesState>,
    auth: Authenticated,
    Query(query): Query<SitesQuery>,
) -> Result<Json<SiteListResponse>, PlatformError> {
    let sites: Vec<SiteResponse> = state.site_repo
        .find_all(&auth.organization_id, query.active_only)
        .await?
        .into_iter()
        .map(Into::into)
        .collect();
    let total = sites.len();
    Ok(Json(SiteListResponse { sites, total }))
}

/// Create a site
#[utoipa::path(
    post,
    path = "",
    tag = "sites",
    operation_id = "postApiSites",
    request_body = CreateSiteRequest,
    responses(
        (status = 201, description = "Site created", body = SiteResponse),
        (status = 400, description = "Validation error")
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_site(
    State(state): State<SitesState>,
    auth: Authenticated,
    Json(req): Json<CreateSiteRequest>,
) -> Result<(StatusCode, Json<SiteResponse>), PlatformError> {
    let mut site = Site::new(&auth.organization_id, required_text("name", &req.name)?);
    site.address = optional_text(req.address);
    apply_location(&mut site, req.latitude, req.longitude, req.radius_meters)?;

    state.site_repo.insert(&site).await?;
    tracing::info!(site_id = %site.id, geofenced = site.geofence().is_some(), "Site created");

    Ok((StatusCode::CREATED, Json(site.into())))
}

/// Get site by ID
#[utoipa::path(
    get,
    path = "/{id}",
    tag = "sites",
    operation_id = "getApiSitesById",
    params(
        ("id" = String, Path, description = "Site ID")
    ),
    responses(
        (status = 200, description = "Site found", body = SiteResponse),
        (status = 404, description = "Site not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_site(
    State(state): State<SitesState>,
    auth: Authenticated,
    Path(id): Path<String>,
) -> Result<Json<SiteResponse>, PlatformError> {
    Ok(Json(load_site(&state, &auth.organization_id, &id).await?.into()))
}

/// Update a site
#[utoipa::path(
    put,
    path = "/{id}",
    tag = "sites",
    operation_id = "putApiSitesById",
    params(
        ("id" = String, Path, description = "Site ID")
    ),
    request_body = UpdateSiteRequest,
    responses(
        (status = 200, description = "Site updated", body = SiteResponse),
        (status = 400, description = "Validation error"),
        (status = 404, description = "Site not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_site(
    State(state): State<SitesState>,
    auth: Authenticated,
    Path(id): Path<String>,
    Json(req): Json<UpdateSiteRequest>,
) -> Result<Json<SiteResponse>, PlatformError> {
    let mut site = load_site(&state, &auth.organization_id, &id).await?;

    if let Some(name) = req.name {
        site.name = required_text("name", &name)?;
    }
    if req.address.is_some() {
        site.address = optional_text(req.address);
    }
    apply_location(&mut site, req.latitude, req.longitude, req.radius_meters)?;
    if let Some(active) = req.active {
        site.active = active;
    }

    site.updated_at = Utc::now();
    state.site_repo.update(&site).await?;

    Ok(Json(site.into()))
}

/// Delete a site
#[utoipa::path(
    delete,
    path = "/{id}",
    tag = "sites",
    operation_id = "deleteApiSitesById",
    params(
        ("id" = String, Path, description = "Site ID")
    ),
    responses(
        (status = 200, description = "Site deleted", body = SuccessResponse),
        (status = 404, description = "Site not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_site(
    State(state): State<SitesState>,
    auth: Authenticated,
    Path(id): Path<String>,
) -> Result<Json<SuccessResponse>, PlatformError> {
    if !state.site_repo.delete(&auth.organization_id, &id).await? {
        return Err(PlatformError::not_found("Site", &id));
    }
    tracing::info!(site_id = %id, "Site deleted");
    Ok(Json(SuccessResponse::ok()))
}

/// Issue a new QR token for a site, invalidating the printed one
#[utoipa::path(
    post,
    path = "/{id}/qr",
    tag = "sites",
    operation_id = "postApiSitesByIdQr",
    params(
        ("id" = String, Path, description = "Site ID")
    ),
    responses(
        (status = 200, description = "QR token rotated", body = SiteResponse),
        (status = 404, description = "Site not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn rotate_site_qr(
    State(state): State<SitesState>,
    auth: Authenticated,
    Path(id): Path<String>,
) -> Result<Json<SiteResponse>, PlatformError> {
    let mut site = load_site(&state, &auth.organization_id, &id).await?;
    site.rotate_qr_token();
    state.site_repo.update(&site).await
        .map_err(|e| e.on_duplicate("Site", "qrToken", "<rotated>"))?;

    tracing::info!(site_id = %site.id, "Site QR token rotated");
    Ok(Json(site.into()))
}

pub fn sites_router(state: SitesState) -> OpenApiRouter {
    OpenApiRouter::new()
        .routes(routes!(list_sites, create_site))
        .routes(routes!(get_site, update_site, delete_site))
        .routes(routes!(rotate_site_qr))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_location() {
        let mut site = Site::new("ORG", "Gate");
        apply_location(&mut site, Some(40.0), Some(-74.0), Some(150.0)).unwrap();
        assert!(site.geofence().is_some());

        let mut site = Site::new("ORG", "Gate");
        assert!(apply_location(&mut site, None, None, Some(50.0)).is_err());
        assert!(apply_location(&mut site, Some(40.0), None, None).is_err());
        assert!(apply_location(&mut site, Some(40.0), Some(-74.0), Some(0.0)).is_err());
        assert!(apply_location(&mut site, Some(95.0), Some(-74.0), None).is_err());

        let mut site = Site::new("ORG", "Lobby");
        apply_location(&mut site, None, None, None).unwrap();
        assert!(site.geofence().is_none());
    }
}
