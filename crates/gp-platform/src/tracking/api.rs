//! GPS Tracking API

use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    extract::{State, Path, Query},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use chrono::{DateTime, Duration, Utc};
use futures::stream::{self, Stream};
use utoipa_axum::{router::OpenApiRouter, routes};
use utoipa::{ToSchema, IntoParams};
use serde::{Deserialize, Serialize};

use crate::geo::Coordinates;
use crate::tracking::aggregator::{live_snapshot, LivePosition, PositionSource};
use crate::tracking::entity::{GpsPosition, Telemetry};
use crate::tracking::repository::GpsPositionRepository;
use crate::shared::api_common::{optional_text, string_or_number, LimitParams};
use crate::shared::error::PlatformError;
use crate::shared::middleware::Authenticated;

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RecordPositionRequest {
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy: Option<f64>,
    /// Battery level, 0 to 100
    pub battery: Option<f64>,
    /// Degrees clockwise from north, 0 up to but excluding 360
    pub heading: Option<f64>,
    pub speed: Option<f64>,
    pub patrol_id: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PositionResponse {
    pub id: String,
    pub user_id: String,
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy: Option<f64>,
    pub battery: Option<f64>,
    pub heading: Option<f64>,
    pub speed: Option<f64>,
    pub patrol_id: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

impl From<GpsPosition> for PositionResponse {
    fn from(p: GpsPosition) -> Self {
        Self {
            id: p.id,
            user_id: p.user_id,
            latitude: p.latitude,
            longitude: p.longitude,
            accuracy: p.accuracy,
            battery: p.battery,
            heading: p.heading,
            speed: p.speed,
            patrol_id: p.patrol_id,
            recorded_at: p.recorded_at,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LivePositionsResponse {
    pub positions: Vec<LivePosition>,
    pub total: usize,
    pub window_minutes: i64,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PositionHistoryResponse {
    pub user_id: String,
    pub positions: Vec<PositionResponse>,
    pub total: usize,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct LiveQuery {
    /// Look-back window in minutes; defaults to the configured window
    #[serde(default, deserialize_with = "string_or_number::deserialize_u32_opt")]
    pub window_minutes: Option<u32>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct HistoryQuery {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

#[derive(Clone)]
pub struct TrackingState {
    pub gps_repo: Arc<GpsPositionRepository>,
    pub source: Arc<dyn PositionSource>,
    pub live_window: Duration,
    pub stream_interval: std::time::Duration,
}

impl TrackingState {
    fn window(&self, requested: Option<u32>) -> Result<Duration, PlatformError> {
        match requested {
            Some(0) => Err(PlatformError::validation("windowMinutes must be at least 1")),
            Some(minutes) => Ok(Duration::minutes(minutes as i64)),
            None => Ok(self.live_window),
        }
    }
}

/// Record a device position
#[utoipa::path(
    post,
    path = "/positions",
    tag = "gps",
    operation_id = "postApiGpsPositions",
    request_body = RecordPositionRequest,
    responses(
        (status = 201, description = "Position recorded", body = PositionResponse),
        (status = 400, description = "Invalid coordinates or telemetry")
    ),
    security(("bearer_auth" = []))
)]
pub async fn record_position(
    State(state): State<TrackingState>,
    auth: Authenticated,
    Json(req): Json<RecordPositionRequest>,
) -> Result<(StatusCode, Json<PositionResponse>), PlatformError> {
    let position = Coordinates::new(req.latitude, req.longitude)?;
    let telemetry = Telemetry {
        accuracy: req.accuracy,
        battery: req.battery,
        heading: req.heading,
        speed: req.speed,
    };
    telemetry.validate()?;

    let row = GpsPosition::new(&auth.organization_id, &auth.user_id, position, Utc::now())
        .with_telemetry(telemetry)
        .on_patrol(optional_text(req.patrol_id));
    state.gps_repo.insert(&row).await?;

    tracing::debug!(user_id = %row.user_id, "Position recorded");
    Ok((StatusCode::CREATED, Json(row.into())))
}

/// Latest position of every guard seen within the window
#[utoipa::path(
    get,
    path = "/live",
    tag = "gps",
    operation_id = "getApiGpsLive",
    params(LiveQuery),
    responses(
        (status = 200, description = "Live positions", body = LivePositionsResponse),
        (status = 400, description = "Invalid window")
    ),
    security(("bearer_auth" = []))
)]
pub async fn live_positions(
    State(state): State<TrackingState>,
    auth: Authenticated,
    Query(query): Query<LiveQuery>,
) -> Result<Json<LivePositionsResponse>, PlatformError> {
    let window = state.window(query.window_minutes)?;
    let positions = live_snapshot(state.source.as_ref(), &auth.organization_id, window, Utc::now()).await?;
    let total = positions.len();

    Ok(Json(LivePositionsResponse {
        positions,
        total,
        window_minutes: window.num_minutes(),
    }))
}

/// Build one `positions` event, or an `error` event when the snapshot fails
async fn snapshot_event(state: &TrackingState, organization_id: &str, window: Duration) -> Event {
    let positions = match live_snapshot(state.source.as_ref(), organization_id, window, Utc::now()).await {
        Ok(positions) => positions,
        Err(e) => {
            tracing::warn!(organization_id, error = %e, "Live snapshot failed");
            return Event::default().event("error").data("snapshot unavailable");
        }
    };
    match Event::default().event("positions").json_data(&positions) {
        Ok(event) => event,
        Err(e) => {
            tracing::warn!(organization_id, error = %e, "Live snapshot encoding failed");
            Event::default().event("error").data("snapshot unavailable")
        }
    }
}

/// Live positions pushed as server-sent events
///
/// Emits a `positions` event immediately and then once per stream interval
/// until the client disconnects.
#[utoipa::path(
    get,
    path = "/stream",
    tag = "gps",
    operation_id = "getApiGpsStream",
    params(LiveQuery),
    responses(
        (status = 200, description = "Event stream of live positions", content_type = "text/event-stream", body = Vec<LivePosition>),
        (status = 400, description = "Invalid window")
    ),
    security(("bearer_auth" = []))
)]
pub async fn live_stream(
    State(state): State<TrackingState>,
    auth: Authenticated,
    Query(query): Query<LiveQuery>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, PlatformError> {
    let window = state.window(query.window_minutes)?;
    let ticker = tokio::time::interval(state.stream_interval);
    let organization_id = auth.organization_id;

    tracing::debug!(organization_id = %organization_id, "Live stream opened");

    let events = stream::unfold(
        (ticker, state, organization_id),
        move |(mut ticker, state, organization_id)| async move {
            ticker.tick().await;
            let event = snapshot_event(&state, &organization_id, window).await;
            Some((Ok(event), (ticker, state, organization_id)))
        },
    );

    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}

/// Position trail of one guard, oldest first
#[utoipa::path(
    get,
    path = "/history/{user_id}",
    tag = "gps",
    operation_id = "getApiGpsHistoryByUserId",
    params(
        ("user_id" = String, Path, description = "Guard user ID"),
        HistoryQuery,
        LimitParams
    ),
    responses(
        (status = 200, description = "Position history", body = PositionHistoryResponse),
        (status = 400, description = "Invalid time range")
    ),
    security(("bearer_auth" = []))
)]
pub async fn position_history(
    State(state): State<TrackingState>,
    auth: Authenticated,
    Path(user_id): Path<String>,
    Query(query): Query<HistoryQuery>,
    Query(limit): Query<LimitParams>,
) -> Result<Json<PositionHistoryResponse>, PlatformError> {
    if let (Some(from), Some(to)) = (query.from, query.to) {
        if from > to {
            return Err(PlatformError::validation("from must not be after to"));
        }
    }

    let positions: Vec<PositionResponse> = state.gps_repo
        .find_history(&auth.organization_id, &user_id, query.from, query.to, limit.limit())
        .await?
        .into_iter()
        .map(Into::into)
        .collect();

    let total = positions.len();
    Ok(Json(PositionHistoryResponse { user_id, positions, total }))
}

pub fn tracking_router(state: TrackingState) -> OpenApiRouter {
    OpenApiRouter::new()
        .routes(routes!(record_position))
        .routes(routes!(live_positions))
        .routes(routes!(live_stream))
        .routes(routes!(position_history))
        .with_state(state)
}
