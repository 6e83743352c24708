//! API Middleware
//!
//! Session authentication for Axum handlers.
//! Accepts a Bearer token in the Authorization header or the session cookie.

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::{Layer, Service};

use crate::auth::auth_service::{extract_bearer_token, AuthService, SessionClaims};
use crate::shared::error::PlatformError;

/// Shared services the extractors need, injected by [`AuthLayer`]
#[derive(Clone)]
pub struct AppState {
    pub auth_service: Arc<AuthService>,
    pub session_cookie_name: String,
}

/// Who is calling, taken from a validated session token
#[derive(Debug, Clone, PartialEq)]
pub struct AuthContext {
    pub user_id: String,
    pub organization_id: String,
    pub role_id: String,
    pub email: String,
    pub name: String,
}

impl From<SessionClaims> for AuthContext {
    fn from(claims: SessionClaims) -> Self {
        Self {
            user_id: claims.sub,
            organization_id: claims.org,
            role_id: claims.role,
            email: claims.email,
            name: claims.name,
        }
    }
}

/// Authenticated user extractor; rejects with 401
pub struct Authenticated(pub AuthContext);

impl std::ops::Deref for Authenticated {
    type Target = AuthContext;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// Bearer header first, then the session cookie
fn extract_token(parts: &Parts, cookie_name: &str) -> Option<String> {
    parts.headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(extract_bearer_token)
        .map(String::from)
        .or_else(|| {
            CookieJar::from_headers(&parts.headers)
                .get(cookie_name)
                .map(|c| c.value().to_string())
                .filter(|v| !v.is_empty())
        })
}

#[async_trait]
impl<S> FromRequestParts<S> for Authenticated
where
    S: Send + Sync,
{
    type Rejection = PlatformError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let app_state = parts.extensions.get::<AppState>()
            .ok_or_else(|| PlatformError::internal("Auth service not configured"))?;

        let token = extract_token(parts, &app_state.session_cookie_name)
            .ok_or_else(|| PlatformError::unauthorized("Missing authentication token"))?;

        let claims = app_state.auth_service.validate_token(&token)?;
        Ok(Authenticated(claims.into()))
    }
}

/// Layer that puts [`AppState`] into request extensions so that
/// [`Authenticated`] can find it
#[derive(Clone)]
pub struct AuthLayer {
    state: AppState,
}

impl AuthLayer {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }
}

impl<S> Layer<S> for AuthLayer {
    type Service = AuthMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        AuthMiddleware {
            inner,
            state: self.state.clone(),
        }
    }
}

#[derive(Clone)]
pub struct AuthMiddleware<S> {
    inner: S,
    state: AppState,
}

impl<S, B> Service<axum::http::Request<B>> for AuthMiddleware<S>
where
    S: Service<axum::http::Request<B>, Response = Response> + Send + Clone + 'static,
    S::Future: Send + 'static,
    B: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: axum::http::Request<B>) -> Self::Future {
        req.extensions_mut().insert(self.state.clone());
        Box::pin(self.inner.call(req))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{header::COOKIE, Request};

    fn parts(headers: &[(axum::http::HeaderName, &str)]) -> Parts {
        let mut builder = Request::builder().uri("/");
        for (name, value) in headers {
            builder = builder.header(name, *value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn test_bearer_header_preferred() {
        let p = parts(&[(AUTHORIZATION, "Bearer from-header"), (COOKIE, "gp_session=from-cookie")]);
        assert_eq!(extract_token(&p, "gp_session").as_deref(), Some("from-header"));
    }

    #[test]
    fn test_cookie_fallback() {
        let p = parts(&[(COOKIE, "theme=dark; gp_session=from-cookie")]);
        assert_eq!(extract_token(&p, "gp_session").as_deref(), Some("from-cookie"));
        assert_eq!(extract_token(&p, "other"), None);
    }

    #[test]
    fn test_no_credentials() {
        assert_eq!(extract_token(&parts(&[]), "gp_session"), None);
        assert_eq!(extract_token(&parts(&[(AUTHORIZATION, "Basic abc")]), "gp_session"), None);
    }
}
