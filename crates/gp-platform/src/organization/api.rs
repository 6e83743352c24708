//! Organization API
//!
//! The caller's own organization profile.

use axum::{extract::State, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;
use utoipa_axum::{router::OpenApiRouter, routes};

use crate::organization::entity::Organization;
use crate::organization::repository::OrganizationRepository;
use crate::shared::api_common::{optional_text, required_text};
use crate::shared::error::PlatformError;
use crate::shared::middleware::Authenticated;

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OrganizationResponse {
    pub id: String,
    pub name: String,
    pub contact_email: Option<String>,
    pub timezone: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Organization> for OrganizationResponse {
    fn from(o: Organization) -> Self {
        Self {
            id: o.id,
            name: o.name,
            contact_email: o.contact_email,
            timezone: o.timezone,
            active: o.active,
            created_at: o.created_at,
            updated_at: o.updated_at,
        }
    }
}

/// Update organization request; absent fields are left unchanged
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateOrganizationRequest {
    pub name: Option<String>,
    pub contact_email: Option<String>,
    pub timezone: Option<String>,
}

#[derive(Clone)]
pub struct OrganizationState {
    pub organization_repo: Arc<OrganizationRepository>,
}

/// Get the caller's organization
#[utoipa::path(
    get,
    path = "",
    tag = "organization",
    operation_id = "getApiOrganization",
    responses(
        (status = 200, description = "Organization", body = OrganizationResponse),
        (status = 404, description = "Organization not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_organization(
    State(state): State<OrganizationState>,
    auth: Authenticated,
) -> Result<Json<OrganizationResponse>, PlatformError> {
    let org = state.organization_repo.find_by_id(&auth.organization_id).await?
        .ok_or_else(|| PlatformError::not_found("Organization", &auth.organization_id))?;
    Ok(Json(org.into()))
}

/// Update the caller's organization
#[utoipa::path(
    put,
    path = "",
    tag = "organization",
    operation_id = "putApiOrganization",
    request_body = UpdateOrganizationRequest,
    responses(
        (status = 200, description = "Organization updated", body = OrganizationResponse),
        (status = 400, description = "Validation error"),
        (status = 404, description = "Organization not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_organization(
    State(state): State<OrganizationState>,
    auth: Authenticated,
    Json(req): Json<UpdateOrganizationRequest>,
) -> Result<Json<OrganizationResponse>, PlatformError> {
    let mut org = state.organization_repo.find_by_id(&auth.organization_id).await?
        .ok_or_else(|| PlatformError::not_found("Organization", &auth.organization_id))?;

    if let Some(name) = req.name {
        org.name = required_text("name", &name)?;
    }
    if req.contact_email.is_some() {
        org.contact_email = optional_text(req.contact_email);
    }
    if let Some(tz) = req.timezone {
        org.timezone = required_text("timezone", &tz)?;
    }

    org.updated_at = Utc::now();
    state.organization_repo.update(&org).await?;

    Ok(Json(org.into()))
}

pub fn organization_router(state: OrganizationState) -> OpenApiRouter {
    OpenApiRouter::new()
        .routes(routes!(get_organization, update_organization))
        .with_state(state)
}
