//! Attendance API
//!
//! Check-in resolves the site from a scanned QR token or an explicit site id,
//! enforces the site geofence and rejects rapid duplicate submissions.

use axum::{
    extract::{State, Query},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Duration, Utc};
use utoipa_axum::{router::OpenApiRouter, routes};
use utoipa::{ToSchema, IntoParams};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::attendance::entity::{
    ensure_outside_duplicate_window, is_on_duty, require_open_check_in,
    AttendanceKind, AttendanceMethod, AttendanceRecord,
};
use crate::attendance::repository::{AttendanceFilter, AttendanceRepository};
use crate::geo::Coordinates;
use crate::site::entity::Site;
use crate::site::repository::SiteRepository;
use crate::shared::api_common::{optional_text, LimitParams};
use crate::shared::error::PlatformError;
use crate::shared::middleware::Authenticated;

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CheckInRequest {
    /// Token scanned from the site QR code
    pub qr_token: Option<String>,
    /// Site chosen without scanning
    pub site_id: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    /// Reported GPS accuracy in meters
    pub accuracy: Option<f64>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CheckOutRequest {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub accuracy: Option<f64>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceResponse {
    pub id: String,
    pub user_id: String,
    pub site_id: Option<String>,
    pub kind: AttendanceKind,
    pub method: AttendanceMethod,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub accuracy: Option<f64>,
    /// Whole meters from the site center, when a geofence applied
    pub distance_meters: Option<i64>,
    pub recorded_at: DateTime<Utc>,
}

impl From<AttendanceRecord> for AttendanceResponse {
    fn from(r: AttendanceRecord) -> Self {
        Self {
            id: r.id,
            user_id: r.user_id,
            site_id: r.site_id,
            kind: r.kind,
            method: r.method,
            latitude: r.latitude,
            longitude: r.longitude,
            accuracy: r.accuracy,
            distance_meters: r.distance_meters.map(|d| d.round() as i64),
            recorded_at: r.recorded_at,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CheckInResponse {
    pub record: AttendanceResponse,
    pub site_name: Option<String>,
    /// False when the site has no geofence configured
    pub geofence_enforced: bool,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CheckOutResponse {
    pub record: AttendanceResponse,
    pub checked_in_at: DateTime<Utc>,
    pub shift_minutes: i64,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceStatusResponse {
    pub on_duty: bool,
    pub latest: Option<AttendanceResponse>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceListResponse {
    pub records: Vec<AttendanceResponse>,
    pub total: usize,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct AttendanceQuery {
    pub user_id: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

#[derive(Clone)]
pub struct AttendanceState {
    pub attendance_repo: Arc<AttendanceRepository>,
    pub site_repo: Arc<SiteRepository>,
    /// Minimum spacing between two submissions of the same kind
    pub duplicate_window: Duration,
}

/// Find the site a check-in refers to, if any
async fn resolve_site(
    state: &AttendanceState,
    organization_id: &str,
    qr_token: Option<String>,
    site_id: Option<String>,
) -> Result<Option<Site>, PlatformError> {
    match (optional_text(qr_token), optional_text(site_id)) {
        (Some(_), Some(_)) => Err(PlatformError::validation(
            "Provide either qrToken or siteId, not both",
        )),
        (Some(token), None) => state.site_repo
            .find_by_qr_token(organization_id, &token)
            .await?
            .map(Some)
            .ok_or_else(|| PlatformError::not_found("Site", "scanned QR code")),
        (None, Some(id)) => {
            let site = state.site_repo.find_by_id(organization_id, &id).await?
                .ok_or_else(|| PlatformError::not_found("Site", &id))?;
            if !site.active {
                return Err(PlatformError::validation(format!("Site {} is inactive", site.name)));
            }
            Ok(Some(site))
        }
        (None, None) => Ok(None),
    }
}

/// Check in
#[utoipa::path(
    post,
    path = "/check-in",
    tag = "attendance",
    operation_id = "postApiAttendanceCheckIn",
    request_body = CheckInRequest,
    responses(
        (status = 201, description = "Checked in", body = CheckInResponse),
        (status = 400, description = "Invalid coordinates or outside the site geofence"),
        (status = 404, description = "Unknown QR code or site"),
        (status = 409, description = "Duplicate check-in")
    ),
    security(("bearer_auth" = []))
)]
pub async fn check_in(
    State(state): State<AttendanceState>,
    auth: Authenticated,
    Json(req): Json<CheckInRequest>,
) -> Result<(StatusCode, Json<CheckInResponse>), PlatformError> {
    let position = Coordinates::new(req.latitude, req.longitude)?;
    let method = if optional_text(req.qr_token.clone()).is_some() {
        AttendanceMethod::Qr
    } else {
        AttendanceMethod::Gps
    };

    let site = resolve_site(&state, &auth.organization_id, req.qr_token, req.site_id).await?;

    let fence_check = match site.as_ref().and_then(Site::geofence) {
        Some(fence) => Some(fence.enforce(position).inspect_err(|_| {
            tracing::info!(user_id = %auth.user_id, "Check-in rejected outside geofence");
        })?),
        None => None,
    };

    let now = Utc::now();
    let previous = state.attendance_repo
        .find_latest(&auth.organization_id, &auth.user_id, Some(AttendanceKind::CheckIn))
        .await?;
    ensure_outside_duplicate_window(previous.as_ref(), now, state.duplicate_window)?;

    let record = AttendanceRecord::new(&auth.organization_id, &auth.user_id, AttendanceKind::CheckIn, method, now)
        .at_site(site.as_ref().map(|s| s.id.clone()))
        .with_position(Some(position), req.accuracy)
        .with_distance(fence_check.map(|c| c.distance_m));
    state.attendance_repo.insert(&record).await?;

    tracing::info!(
        user_id = %record.user_id,
        site_id = ?record.site_id,
        method = ?record.method,
        "Checked in"
    );

    Ok((
        StatusCode::CREATED,
        Json(CheckInResponse {
            record: record.into(),
            site_name: site.map(|s| s.name),
            geofence_enforced: fence_check.is_some(),
        }),
    ))
}

/// Check out
#[utoipa::path(
    post,
    path = "/check-out",
    tag = "attendance",
    operation_id = "postApiAttendanceCheckOut",
    request_body = CheckOutRequest,
    responses(
        (status = 201, description = "Checked out", body = CheckOutResponse),
        (status = 400, description = "Invalid coordinates"),
        (status = 404, description = "No active check-in"),
        (status = 409, description = "Duplicate check-out")
    ),
    security(("bearer_auth" = []))
)]
pub async fn check_out(
    State(state): State<AttendanceState>,
    auth: Authenticated,
    Json(req): Json<CheckOutRequest>,
) -> Result<(StatusCode, Json<CheckOutResponse>), PlatformError> {
    let position = Coordinates::from_optional(req.latitude, req.longitude)?;

    let latest = state.attendance_repo
        .find_latest(&auth.organization_id, &auth.user_id, None)
        .await?;
    let open = require_open_check_in(latest)?;

    let now = Utc::now();
    let previous = state.attendance_repo
        .find_latest(&auth.organization_id, &auth.user_id, Some(AttendanceKind::CheckOut))
        .await?;
    ensure_outside_duplicate_window(previous.as_ref(), now, state.duplicate_window)?;

    let method = if position.is_some() {
        AttendanceMethod::Gps
    } else {
        AttendanceMethod::Manual
    };
    let record = AttendanceRecord::new(&auth.organization_id, &auth.user_id, AttendanceKind::CheckOut, method, now)
        .at_site(open.site_id.clone())
        .with_position(position, req.accuracy);
    state.attendance_repo.insert(&record).await?;

    let shift_minutes = (now - open.recorded_at).num_minutes();
    tracing::info!(user_id = %record.user_id, shift_minutes, "Checked out");

    Ok((
        StatusCode::CREATED,
        Json(CheckOutResponse {
            record: record.into(),
            checked_in_at: open.recorded_at,
            shift_minutes,
        }),
    ))
}

/// Current attendance status of the caller
#[utoipa::path(
    get,
    path = "/status",
    tag = "attendance",
    operation_id = "getApiAttendanceStatus",
    responses(
        (status = 200, description = "Attendance status", body = AttendanceStatusResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn attendance_status(
    State(state): State<AttendanceState>,
    auth: Authenticated,
) -> Result<Json<AttendanceStatusResponse>, PlatformError> {
    let latest = state.attendance_repo
        .find_latest(&auth.organization_id, &auth.user_id, None)
        .await?;

    Ok(Json(AttendanceStatusResponse {
        on_duty: is_on_duty(latest.as_ref()),
        latest: latest.map(Into::into),
    }))
}

/// List attendance records, newest first
#[utoipa::path(
    get,
    path = "",
    tag = "attendance",
    operation_id = "getApiAttendance",
    params(AttendanceQuery, LimitParams),
    responses(
        (status = 200, description = "Attendance records", body = AttendanceListResponse),
        (status = 400, description = "Invalid time range")
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_attendance(
    State(state): State<AttendanceState>,
    auth: Authenticated,
    Query(query): Query<AttendanceQuery>,
    Query(limit): Query<LimitParams>,
) -> Result<Json<AttendanceListResponse>, PlatformError> {
    if let (Some(from), Some(to)) = (query.from, query.to) {
        if from > to {
            return Err(PlatformError::validation("from must not be after to"));
        }
    }

    let filter = AttendanceFilter {
        user_id: optional_text(query.user_id),
        from: query.from,
        to: query.to,
    };

    let records: Vec<AttendanceResponse> = state.attendance_repo
        .find(&auth.organization_id, &filter, limit.limit())
        .await?
        .into_iter()
        .map(Into::into)
        .collect();

    let total = records.len();
    Ok(Json(AttendanceListResponse { records, total }))
}

pub fn attendance_router(state: AttendanceState) -> OpenApiRouter {
    OpenApiRouter::new()
        .routes(routes!(list_attendance))
        .routes(routes!(check_in))
        .routes(routes!(check_out))
        .routes(routes!(attendance_status))
        .with_state(state)
}
