//! Registration Tokens API
//!
//! Issue, list, revoke, and publicly validate onboarding tokens.
//! Consumption happens during signup in the auth API.

use axum::{
    extract::{State, Path, Query},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use utoipa_axum::{router::OpenApiRouter, routes};
use utoipa::{ToSchema, IntoParams};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use crate::organization::repository::OrganizationRepository;
use crate::registration_token::entity::{RegistrationToken, TokenKind, TokenUnusable, MAX_EXPIRY_HOURS};
use crate::registration_token::repository::RegistrationTokenRepository;
use crate::role::repository::RoleRepository;
use crate::shared::api_common::{optional_text, LimitParams};
use crate::shared::error::PlatformError;
use crate::shared::middleware::Authenticated;

/// Attempts at drawing a code that does not collide with an existing one
const ISSUE_ATTEMPTS: usize = 3;

/// Issue token request
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct IssueTokenRequest {
    pub kind: TokenKind,
    /// Role granted to users who sign up with this token
    pub role_id: String,
    pub department: Option<String>,
    /// Omit for unlimited uses
    pub max_uses: Option<i64>,
    /// Defaults to the configured expiry (72 hours)
    pub expires_in_hours: Option<i64>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationTokenResponse {
    pub id: String,
    pub kind: TokenKind,
    pub code: String,
    pub role_id: String,
    pub role_name: Option<String>,
    pub department: Option<String>,
    pub max_uses: Option<i64>,
    pub used_count: i64,
    pub remaining_uses: Option<i64>,
    pub expires_at: Option<DateTime<Utc>>,
    pub active: bool,
    /// ACTIVE, REVOKED, EXPIRED or EXHAUSTED
    pub status: String,
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl RegistrationTokenResponse {
    fn from_token(t: RegistrationToken, role_name: Option<String>, now: DateTime<Utc>) -> Self {
        let status = match t.usability(now) {
            Ok(()) => "ACTIVE",
            Err(TokenUnusable::Revoked) => "REVOKED",
            Err(TokenUnusable::Expired) => "EXPIRED",
            Err(TokenUnusable::Exhausted) => "EXHAUSTED",
        };
        Self {
            remaining_uses: t.remaining_uses(),
            id: t.id,
            kind: t.kind,
            code: t.code,
            role_id: t.role_id,
            role_name,
            department: t.department,
            max_uses: t.max_uses,
            used_count: t.used_count,
            expires_at: t.expires_at,
            active: t.active,
            status: status.to_string(),
            created_by: t.created_by,
            created_at: t.created_at,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationTokenListResponse {
    pub tokens: Vec<RegistrationTokenResponse>,
    pub total: usize,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ValidateTokenQuery {
    /// Access code or QR token
    pub token: String,
}

/// What a prospective guard is signing up for
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TokenValidationResponse {
    pub valid: bool,
    pub kind: TokenKind,
    pub organization_name: String,
    pub role_name: String,
    pub department: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Clone)]
pub struct RegistrationTokensState {
    pub token_repo: Arc<RegistrationTokenRepository>,
    pub role_repo: Arc<RoleRepository>,
    pub organization_repo: Arc<OrganizationRepository>,
    pub default_expiry_hours: i64,
}

/// Look up a presented token and make sure it can still be used.
///
/// Unknown tokens are 404, revoked/expired/exhausted ones are 400.
pub async fn find_usable_token(
    repo: &RegistrationTokenRepository,
    presented: &str,
    now: DateTime<Utc>,
) -> Result<RegistrationToken, PlatformError> {
    let presented = presented.trim();
    if presented.is_empty() {
        return Err(PlatformError::validation("token is required"));
    }

    let token = repo.find_by_code(presented).await?
        .ok_or_else(|| PlatformError::not_found("RegistrationToken", presented))?;

    token.usability(now)
        .map_err(|reason| PlatformError::validation(reason.reason()))?;

    Ok(token)
}

/// List registration tokens
#[utoipa::path(
    get,
    path = "",
    tag = "registration-tokens",
    operation_id = "getApiRegistrationTokens",
    params(LimitParams),
    responses(
        (status = 200, description = "Tokens", body = RegistrationTokenListResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_tokens(
    State(state): State<RegistrationTokensState>,
    auth: Authenticated,
    Query(limit): Query<LimitParams>,
) -> Result<Json<RegistrationTokenListResponse>, PlatformError> {
    let role_names: HashMap<String, String> = state.role_repo
        .find_all(&auth.organization_id)
        .await?
        .into_iter()
        .map(|r| (r.id, r.name))
        .collect();

    let now = Utc::now();
    let tokens: Vec<RegistrationTokenResponse> = state.token_repo
        .find_all(&auth.organization_id, limit.limit())
        .await?
        .into_iter()
        .map(|t| {
            let role_name = role_names.get(&t.role_id).cloned();
            RegistrationTokenResponse::from_token(t, role_name, now)
        })
        .collect();

    let total = tokens.len();
    Ok(Json(RegistrationTokenListResponse { tokens, total }))
}

/// Issue a registration token
#[utoipa::path(
    post,
    path = "",
    tag = "registration-tokens",
    operation_id = "postApiRegistrationTokens",
    request_body = IssueTokenRequest,
    responses(
        (status = 201, description = "Token issued", body = RegistrationTokenResponse),
        (status = 400, description = "Validation error"),
        (status = 404, description = "Role not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn issue_token(
    State(state): State<RegistrationTokensState>,
    auth: Authenticated,
    Json(req): Json<IssueTokenRequest>,
) -> Result<(StatusCode, Json<RegistrationTokenResponse>), PlatformError> {
    if req.max_uses.is_some_and(|n| n < 1) {
        return Err(PlatformError::validation("maxUses must be at least 1"));
    }
    let expires_in_hours = req.expires_in_hours.unwrap_or(state.default_expiry_hours);
    if !(1..=MAX_EXPIRY_HOURS).contains(&expires_in_hours) {
        return Err(PlatformError::validation(format!(
            "expiresInHours must be between 1 and {}",
            MAX_EXPIRY_HOURS
        )));
    }

    let role = state.role_repo.find_by_id(&auth.organization_id, &req.role_id).await?
        .ok_or_else(|| PlatformError::not_found("Role", &req.role_id))?;
    let department = optional_text(req.department);

    let mut attempt = 0;
    let token = loop {
        attempt += 1;
        let token = RegistrationToken::new(&auth.organization_id, req.kind, &role.id)
            .with_department(department.clone())
            .with_max_uses(req.max_uses)
            .expiring_in(expires_in_hours)?
            .created_by(&auth.user_id);

        match state.token_repo.insert(&token).await {
            Ok(()) => break token,
            Err(e) if e.is_duplicate_key() && attempt < ISSUE_ATTEMPTS => {
                tracing::warn!(attempt, "Registration code collision, drawing a new one");
            }
            Err(e) => return Err(e),
        }
    };

    tracing::info!(
        token_id = %token.id,
        kind = ?token.kind,
        role_id = %token.role_id,
        "Registration token issued"
    );

    let response = RegistrationTokenResponse::from_token(token, Some(role.name), Utc::now());
    Ok((StatusCode::CREATED, Json(response)))
}

/// Validate a registration token (public)
#[utoipa::path(
    get,
    path = "/validate",
    tag = "registration-tokens",
    operation_id = "getApiRegistrationTokensValidate",
    params(ValidateTokenQuery),
    responses(
        (status = 200, description = "Token usable", body = TokenValidationResponse),
        (status = 400, description = "Token revoked, expired or exhausted"),
        (status = 404, description = "Unknown token")
    )
)]
pub async fn validate_token(
    State(state): State<RegistrationTokensState>,
    Query(query): Query<ValidateTokenQuery>,
) -> Result<Json<TokenValidationResponse>, PlatformError> {
    let token = find_usable_token(&state.token_repo, &query.token, Utc::now()).await?;

    let organization = state.organization_repo.find_by_id(&token.organization_id).await?
        .ok_or_else(|| PlatformError::not_found("Organization", &token.organization_id))?;
    let role = state.role_repo.find_by_id(&token.organization_id, &token.role_id).await?
        .ok_or_else(|| PlatformError::not_found("Role", &token.role_id))?;

    Ok(Json(TokenValidationResponse {
        valid: true,
        kind: token.kind,
        organization_name: organization.name,
        role_name: role.name,
        department: token.department,
        expires_at: token.expires_at,
    }))
}

/// Revoke a registration token
#[utoipa::path(
    post,
    path = "/{id}/revoke",
    tag = "registration-tokens",
    operation_id = "postApiRegistrationTokensByIdRevoke",
    params(
        ("id" = String, Path, description = "Token ID")
    ),
    responses(
        (status = 200, description = "Token revoked", body = RegistrationTokenResponse),
        (status = 404, description = "Token not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn revoke_token(
    State(state): State<RegistrationTokensState>,
    auth: Authenticated,
    Path(id): Path<String>,
) -> Result<Json<RegistrationTokenResponse>, PlatformError> {
    let token = state.token_repo.revoke(&auth.organization_id, &id).await?
        .ok_or_else(|| PlatformError::not_found("RegistrationToken", &id))?;

    tracing::info!(token_id = %token.id, "Registration token revoked");

    let role_name = state.role_repo.find_by_id(&auth.organization_id, &token.role_id).await?
        .map(|r| r.name);
    Ok(Json(RegistrationTokenResponse::from_token(token, role_name, Utc::now())))
}

pub fn registration_tokens_router(state: RegistrationTokensState) -> OpenApiRouter {
    OpenApiRouter::new()
        .routes(routes!(list_tokens, issue_token))
        .routes(routes!(validate_token))
        .routes(routes!(revoke_token))
        .with_state(state)
}
