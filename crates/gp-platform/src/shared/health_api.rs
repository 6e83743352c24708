//! Health Check Endpoints
//!
//! - /health - Combined health status
//! - /health/live - Liveness probe
//! - /health/ready - Readiness probe

use axum::{
    routing::get,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json, Router,
};
use utoipa::ToSchema;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use chrono::{DateTime, Utc};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum HealthStatus {
    Up,
    Down,
    /// Functional but not fully initialized
    Degraded,
}

/// Individual health check result
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HealthCheck {
    pub name: String,

    pub status: HealthStatus,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: HealthStatus,

    pub timestamp: DateTime<Utc>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub checks: Vec<HealthCheck>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SimpleHealthResponse {
    pub status: HealthStatus,
}

#[derive(Clone)]
pub struct HealthState {
    /// Pinged by the combined and readiness checks when present
    pub db: Option<mongodb::Database>,

    pub version: Option<String>,

    /// Set once indexes exist and seeding finished
    pub ready: Arc<AtomicBool>,
}

impl HealthState {
    pub fn new(db: Option<mongodb::Database>, version: Option<String>) -> Self {
        Self {
            db,
            version,
            ready: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn set_ready(&self) {
        self.ready.store(true, Ordering::SeqCst);
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }
}

async fn check_mongo(db: &mongodb::Database) -> HealthCheck {
    let start = std::time::Instant::now();
    let result = db.run_command(mongodb::bson::doc! { "ping": 1 }).await;
    let duration_ms = Some(start.elapsed().as_millis() as u64);

    match result {
        Ok(_) => HealthCheck {
            name: "mongodb".to_string(),
            status: HealthStatus::Up,
            message: None,
            duration_ms,
        },
        Err(e) => HealthCheck {
            name: "mongodb".to_string(),
            status: HealthStatus::Down,
            message: Some(format!("Connection failed: {}", e)),
            duration_ms,
        },
    }
}

fn status_code(status: HealthStatus) -> StatusCode {
    if status == HealthStatus::Down {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    }
}

/// Combined health check
#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
        (status = 503, description = "Service is unhealthy", body = HealthResponse)
    )
)]
pub async fn get_health(State(state): State<HealthState>) -> Response {
    let mut checks = Vec::new();
    let mut overall = HealthStatus::Up;

    if let Some(db) = &state.db {
        let check = check_mongo(db).await;
        if check.status == HealthStatus::Down {
            overall = HealthStatus::Down;
        }
        checks.push(check);
    }

    if !state.is_ready() && overall == HealthStatus::Up {
        overall = HealthStatus::Degraded;
    }

    let response = HealthResponse {
        status: overall,
        timestamp: Utc::now(),
        version: state.version.clone(),
        checks,
    };
    (status_code(overall), Json(response)).into_response()
}

/// Liveness probe
#[utoipa::path(
    get,
    path = "/health/live",
    tag = "health",
    responses(
        (status = 200, description = "Service is alive", body = SimpleHealthResponse)
    )
)]
pub async fn get_liveness() -> Json<SimpleHealthResponse> {
    Json(SimpleHealthResponse { status: HealthStatus::Up })
}

/// Readiness probe
///
/// 503 until startup completed or while MongoDB is unreachable.
#[utoipa::path(
    get,
    path = "/health/ready",
    tag = "health",
    responses(
        (status = 200, description = "Service is ready", body = SimpleHealthResponse),
        (status = 503, description = "Service is not ready", body = SimpleHealthResponse)
    )
)]
pub async fn get_readiness(State(state): State<HealthState>) -> Response {
    let status = if !state.is_ready() {
        HealthStatus::Down
    } else if let Some(db) = &state.db {
        check_mongo(db).await.status
    } else {
        HealthStatus::Up
    };

    (status_code(status), Json(SimpleHealthResponse { status })).into_response()
}

/// Health routes, to be nested under `/health`
pub fn health_router(state: HealthState) -> Router {
    Router::new()
        .route("/", get(get_health))
        .route("/live", get(get_liveness))
        .route("/ready", get(get_readiness))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_health_status_serialization() {
        assert_eq!(serde_json::to_string(&HealthStatus::Up).unwrap(), "\"UP\"");
        assert_eq!(serde_json::to_string(&HealthStatus::Degraded).unwrap(), "\"DEGRADED\"");
    }

    #[test]
    fn test_ready_flag() {
        let state = HealthState::new(None, None);
        assert!(!state.is_ready());
        state.set_ready();
        assert!(state.is_ready());
        // Clones share the flag
        assert!(state.clone().is_ready());
    }

    #[tokio::test]
    async fn test_readiness_without_db() {
        let state = HealthState::new(None, Some("0.1.0".into()));
        let response = get_readiness(State(state.clone())).await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        state.set_ready();
        let response = get_readiness(State(state)).await;
        assert_eq!(response.status(), StatusCode::OK);
    }
}
