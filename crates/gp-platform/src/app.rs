//! Platform Router Assembly
//!
//! Wires repositories and services into the per-aggregate API states and
//! nests their routers under `/api`. The binary adds Swagger UI, tracing and
//! CORS on top of what is returned here.

use std::sync::Arc;

use axum::Router;
use chrono::Duration;
use mongodb::Database;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::openapi::OpenApi;
use utoipa_axum::router::OpenApiRouter;

use crate::attendance::{attendance_router, AttendanceRepository, AttendanceState};
use crate::auth::{auth_router, AuthService, AuthState, PasswordService, SessionCookieSettings};
use crate::backup_request::{backup_requests_router, BackupRequestRepository, BackupRequestsState};
use crate::incident::{incidents_router, IncidentRepository, IncidentsState};
use crate::organization::{organization_router, OrganizationRepository, OrganizationState};
use crate::patrol::{patrols_router, PatrolRepository, PatrolsState};
use crate::patrol_route::{patrol_routes_router, PatrolRouteRepository, PatrolRoutesState};
use crate::registration_token::{
    registration_tokens_router, RegistrationTokenRepository, RegistrationTokensState,
};
use crate::role::{roles_router, RoleRepository, RolesState};
use crate::shared::health_api::{health_router, HealthState};
use crate::shared::middleware::{AppState, AuthLayer};
use crate::site::{sites_router, SiteRepository, SitesState};
use crate::tracking::{tracking_router, GpsPositionRepository, MongoPositionSource, TrackingState};
use crate::user::{guards_router, GuardsState, UserRepository};

/// Tunables that shape request handling
#[derive(Debug, Clone)]
pub struct PlatformSettings {
    pub session_cookie: SessionCookieSettings,
    pub duplicate_window_secs: u64,
    pub live_window_minutes: u32,
    pub stream_interval_secs: u64,
    pub registration_expiry_hours: u32,
}

impl Default for PlatformSettings {
    fn default() -> Self {
        Self {
            session_cookie: SessionCookieSettings::default(),
            duplicate_window_secs: 60,
            live_window_minutes: 30,
            stream_interval_secs: 10,
            registration_expiry_hours: 72,
        }
    }
}

/// Everything the HTTP layer needs besides the database
pub struct Platform {
    pub db: Database,
    pub auth_service: Arc<AuthService>,
    pub password_service: Arc<PasswordService>,
    pub health: HealthState,
    pub settings: PlatformSettings,
}

impl Platform {
    /// Build the API router with auth middleware applied, plus its OpenAPI document
    pub fn into_router(self) -> (Router, OpenApi) {
        let db = &self.db;
        let settings = &self.settings;

        let organization_repo = Arc::new(OrganizationRepository::new(db));
        let role_repo = Arc::new(RoleRepository::new(db));
        let user_repo = Arc::new(UserRepository::new(db));
        let token_repo = Arc::new(RegistrationTokenRepository::new(db));
        let site_repo = Arc::new(SiteRepository::new(db));
        let attendance_repo = Arc::new(AttendanceRepository::new(db));
        let gps_repo = Arc::new(GpsPositionRepository::new(db));
        let route_repo = Arc::new(PatrolRouteRepository::new(db));
        let patrol_repo = Arc::new(PatrolRepository::new(db));
        let incident_repo = Arc::new(IncidentRepository::new(db));
        let backup_repo = Arc::new(BackupRequestRepository::new(db));

        let auth_state = AuthState {
            auth_service: self.auth_service.clone(),
            password_service: self.password_service.clone(),
            user_repo: user_repo.clone(),
            role_repo: role_repo.clone(),
            organization_repo: organization_repo.clone(),
            token_repo: token_repo.clone(),
            cookie: settings.session_cookie.clone(),
        };
        let organization_state = OrganizationState { organization_repo: organization_repo.clone() };
        let roles_state = RolesState { role_repo: role_repo.clone(), user_repo: user_repo.clone() };
        let guards_state = GuardsState { user_repo: user_repo.clone(), role_repo: role_repo.clone() };
        let tokens_state = RegistrationTokensState {
            token_repo,
            role_repo,
            organization_repo,
            default_expiry_hours: settings.registration_expiry_hours as i64,
        };
        let sites_state = SitesState { site_repo: site_repo.clone() };
        let attendance_state = AttendanceState {
            attendance_repo,
            site_repo,
            duplicate_window: Duration::seconds(settings.duplicate_window_secs as i64),
        };
        let tracking_state = TrackingState {
            gps_repo: gps_repo.clone(),
            source: Arc::new(MongoPositionSource::new(gps_repo, user_repo.clone())),
            live_window: Duration::minutes(settings.live_window_minutes as i64),
            stream_interval: std::time::Duration::from_secs(settings.stream_interval_secs.max(1)),
        };
        let routes_state = PatrolRoutesState {
            route_repo: route_repo.clone(),
            patrol_repo: patrol_repo.clone(),
        };
        let patrols_state = PatrolsState {
            patrol_repo: patrol_repo.clone(),
            route_repo: route_repo.clone(),
            user_repo,
        };
        let incidents_state = IncidentsState {
            incident_repo,
            patrol_repo: patrol_repo.clone(),
        };
        let backup_state = BackupRequestsState {
            backup_repo,
            patrol_repo,
            route_repo,
        };

        let (router, mut openapi) = OpenApiRouter::new()
            .nest("/api/auth", auth_router(auth_state))
            .nest("/api/organization", organization_router(organization_state))
            .nest("/api/roles", roles_router(roles_state))
            .nest("/api/guards", guards_router(guards_state))
            .nest("/api/registration-tokens", registration_tokens_router(tokens_state))
            .nest("/api/sites", sites_router(sites_state))
            .nest("/api/attendance", attendance_router(attendance_state))
            .nest("/api/gps", tracking_router(tracking_state))
            .nest("/api/patrol-routes", patrol_routes_router(routes_state))
            .nest("/api/patrols", patrols_router(patrols_state))
            .nest("/api/incidents", incidents_router(incidents_state))
            .nest("/api/backup-requests", backup_requests_router(backup_state))
            .split_for_parts();

        openapi.info.title = "Guardpost API".to_string();
        openapi.info.version = env!("CARGO_PKG_VERSION").to_string();
        openapi.info.description = Some("Attendance, live tracking, patrols and incidents for security guard teams".to_string());
        openapi.components.get_or_insert_with(Default::default).add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );

        let app_state = AppState {
            auth_service: self.auth_service,
            session_cookie_name: settings.session_cookie.name.clone(),
        };

        let app = router
            .nest("/health", health_router(self.health))
            .layer(AuthLayer::new(app_state));

        (app, openapi)
    }
}
