//! Auth API Endpoints
//!
//! - POST /auth/login - Password login
//! - POST /auth/logout - Clear the session cookie
//! - GET /auth/me - Current user, organization, role and permissions
//! - POST /auth/signup - Self-registration with a registration token

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use chrono::Utc;
use utoipa_axum::{router::OpenApiRouter, routes};
use utoipa::ToSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::auth::auth_service::AuthService;
use crate::auth::password_service::PasswordService;
use crate::organization::repository::OrganizationRepository;
use crate::registration_token::api::find_usable_token;
use crate::registration_token::repository::RegistrationTokenRepository;
use crate::role::repository::RoleRepository;
use crate::user::entity::{normalize_email, User};
use crate::user::repository::UserRepository;
use crate::shared::api_common::{optional_text, required_text};
use crate::shared::error::PlatformError;
use crate::shared::middleware::Authenticated;

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SignupRequest {
    /// Access code or QR token handed out by a supervisor
    pub token: String,
    pub email: String,
    pub password: String,
    pub full_name: String,
    pub phone: Option<String>,
}

/// Session established by login or signup
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    /// Same token as the session cookie, for Bearer use by mobile clients
    pub token: String,
    pub token_type: String,
    pub expires_in: i64,
    pub user_id: String,
    pub organization_id: String,
    pub role_id: String,
    pub email: String,
    pub name: String,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MeOrganization {
    pub id: String,
    pub name: String,
    pub timezone: String,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MeRole {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CurrentUserResponse {
    pub id: String,
    pub email: String,
    pub full_name: String,
    pub phone: Option<String>,
    pub department: Option<String>,
    pub organization: MeOrganization,
    pub role: Option<MeRole>,
    /// Resource to allowed actions, wildcards expanded
    pub permissions: BTreeMap<String, Vec<String>>,
}

/// Session cookie attributes
#[derive(Debug, Clone)]
pub struct SessionCookieSettings {
    pub name: String,
    pub secure: bool,
    /// Strict, Lax or None
    pub same_site: String,
}

impl Default for SessionCookieSettings {
    fn default() -> Self {
        Self {
            name: "gp_session".to_string(),
            secure: true,
            same_site: "Lax".to_string(),
        }
    }
}

#[derive(Clone)]
pub struct AuthState {
    pub auth_service: Arc<AuthService>,
    pub password_service: Arc<PasswordService>,
    pub user_repo: Arc<UserRepository>,
    pub role_repo: Arc<RoleRepository>,
    pub organization_repo: Arc<OrganizationRepository>,
    pub token_repo: Arc<RegistrationTokenRepository>,
    pub cookie: SessionCookieSettings,
}

impl AuthState {
    fn session_cookie(&self, token: String) -> Cookie<'static> {
        let same_site = match self.cookie.same_site.to_lowercase().as_str() {
            "strict" => SameSite::Strict,
            "none" => SameSite::None,
            _ => SameSite::Lax,
        };

        Cookie::build((self.cookie.name.clone(), token))
            .path("/")
            .http_only(true)
            .secure(self.cookie.secure)
            .same_site(same_site)
            .max_age(time::Duration::seconds(self.auth_service.session_expiry_secs()))
            .build()
    }

    /// Issue a token for `user` and attach it to the jar
    fn start_session(&self, jar: CookieJar, user: &User) -> Result<(CookieJar, SessionResponse), PlatformError> {
        let token = self.auth_service.generate_session_token(user)?;
        let jar = jar.add(self.session_cookie(token.clone()));

        Ok((jar, SessionResponse {
            token,
            token_type: "Bearer".to_string(),
            expires_in: self.auth_service.session_expiry_secs(),
            user_id: user.id.clone(),
            organization_id: user.organization_id.clone(),
            role_id: user.role_id.clone(),
            email: user.email.clone(),
            name: user.display_name().to_string(),
        }))
    }
}

/// Login with email and password
///
/// Sets an http-only session cookie and returns the same token for Bearer use.
#[utoipa::path(
    post,
    path = "/login",
    tag = "auth",
    operation_id = "postApiAuthLogin",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = SessionResponse),
        (status = 401, description = "Invalid credentials or inactive account")
    )
)]
pub async fn login(
    State(state): State<AuthState>,
    jar: CookieJar,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, PlatformError> {
    let email = req.email.trim().to_lowercase();
    let user = state.user_repo.find_by_email(&email).await?
        .ok_or(PlatformError::InvalidCredentials)?;

    let password_valid = match user.password_hash.as_deref() {
        Some(hash) => state.password_service.verify_password(&req.password, hash)?,
        None => false,
    };
    if !password_valid {
        tracing::info!(user_id = %user.id, "Login rejected: bad password");
        return Err(PlatformError::InvalidCredentials);
    }

    if !user.active {
        return Err(PlatformError::unauthorized("Account is not active"));
    }
    let organization_active = state.organization_repo.find_by_id(&user.organization_id).await?
        .is_some_and(|o| o.active);
    if !organization_active {
        return Err(PlatformError::unauthorized("Organization is not active"));
    }

    state.user_repo.record_login(&user.id, Utc::now()).await?;
    let (jar, session) = state.start_session(jar, &user)?;

    tracing::info!(user_id = %user.id, organization_id = %user.organization_id, "User logged in");
    Ok((jar, Json(session)))
}

/// Logout
///
/// Clears the session cookie. Tokens are stateless and stay valid until
/// they expire.
#[utoipa::path(
    post,
    path = "/logout",
    tag = "auth",
    operation_id = "postApiAuthLogout",
    responses(
        (status = 204, description = "Logout successful"),
        (status = 401, description = "Not authenticated")
    ),
    security(("bearer_auth" = []))
)]
pub async fn logout(
    State(state): State<AuthState>,
    jar: CookieJar,
    auth: Authenticated,
) -> impl IntoResponse {
    let cookie = Cookie::build((state.cookie.name.clone(), ""))
        .path("/")
        .http_only(true)
        .max_age(time::Duration::ZERO)
        .build();

    tracing::debug!(user_id = %auth.user_id, "User logged out");
    (jar.add(cookie), StatusCode::NO_CONTENT)
}

/// Current user
#[utoipa::path(
    get,
    path = "/me",
    tag = "auth",
    operation_id = "getApiAuthMe",
    responses(
        (status = 200, description = "Current user info", body = CurrentUserResponse),
        (status = 401, description = "Not authenticated")
    ),
    security(("bearer_auth" = []))
)]
pub async fn me(
    State(state): State<AuthState>,
    auth: Authenticated,
) -> Result<Json<CurrentUserResponse>, PlatformError> {
    let user = state.user_repo.find_by_id(&auth.organization_id, &auth.user_id).await?
        .ok_or_else(|| PlatformError::unauthorized("User no longer exists"))?;
    let organization = state.organization_repo.find_by_id(&user.organization_id).await?
        .ok_or_else(|| PlatformError::unauthorized("Organization no longer exists"))?;
    // Current role, not the one in the token, so role changes show up at once
    let role = state.role_repo.find_by_id(&user.organization_id, &user.role_id).await?;

    let permissions = role
        .as_ref()
        .map(|r| r.permissions.effective())
        .unwrap_or_default();

    Ok(Json(CurrentUserResponse {
        id: user.id,
        email: user.email,
        full_name: user.full_name,
        phone: user.phone,
        department: user.department,
        organization: MeOrganization {
            id: organization.id,
            name: organization.name,
            timezone: organization.timezone,
        },
        role: role.map(|r| MeRole { id: r.id, name: r.name }),
        permissions,
    }))
}

/// Sign up with a registration token
///
/// Creates an active user with the token's role and department and starts
/// a session. The token use is given back when the user cannot be stored.
#[utoipa::path(
    post,
    path = "/signup",
    tag = "auth",
    operation_id = "postApiAuthSignup",
    request_body = SignupRequest,
    responses(
        (status = 201, description = "Account created", body = SessionResponse),
        (status = 400, description = "Invalid input or unusable token"),
        (status = 404, description = "Unknown token"),
        (status = 409, description = "Email already registered")
    )
)]
pub async fn signup(
    State(state): State<AuthState>,
    jar: CookieJar,
    Json(req): Json<SignupRequest>,
) -> Result<impl IntoResponse, PlatformError> {
    let now = Utc::now();
    let token = find_usable_token(&state.token_repo, &req.token, now).await?;

    let email = normalize_email(&req.email)?;
    let full_name = required_text("fullName", &req.full_name)?;
    // Hash before consuming so a policy failure does not burn a use
    let password_hash = state.password_service.hash_password(&req.password)?;

    if state.user_repo.exists_by_email(&email).await? {
        return Err(PlatformError::duplicate("User", "email", &email));
    }

    let token = state.token_repo.consume(&token.id, now).await?
        .ok_or_else(|| PlatformError::validation("Registration token is no longer usable"))?;

    let user = User::new(&token.organization_id, &token.role_id, &email, full_name)
        .with_password_hash(password_hash)
        .with_department(token.department.clone())
        .with_phone(optional_text(req.phone));
    if let Err(e) = state.user_repo.insert(&user).await {
        // A concurrent signup took the email after the existence check
        if let Err(release_err) = state.token_repo.release(&token.id, Utc::now()).await {
            tracing::warn!(
                registration_token_id = %token.id,
                error = %release_err,
                "Failed to release registration token use"
            );
        }
        return Err(e.on_duplicate("User", "email", &email));
    }

    let (jar, session) = state.start_session(jar, &user)?;

    tracing::info!(
        user_id = %user.id,
        organization_id = %user.organization_id,
        registration_token_id = %token.id,
        "Guard signed up"
    );
    Ok((StatusCode::CREATED, jar, Json(session)))
}

pub fn auth_router(state: AuthState) -> OpenApiRouter {
    OpenApiRouter::new()
        .routes(routes!(login))
        .routes(routes!(logout))
        .routes(routes!(me))
        .routes(routes!(signup))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signup_request_shape() {
        let req: SignupRequest = serde_json::from_str(
            r#"{"token":"AB12CD34","email":"g@x.io","password":"Patrol2024","fullName":"G"}"#,
        )
        .unwrap();
        assert_eq!(req.full_name, "G");
        assert!(req.phone.is_none());
    }

    #[test]
    fn test_default_cookie_settings() {
        let settings = SessionCookieSettings::default();
        assert_eq!(settings.name, "gp_session");
        assert!(settings.secure);
        assert_eq!(settings.same_site, "Lax");
    }
}
