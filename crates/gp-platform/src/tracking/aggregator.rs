//! Live position aggregation
//!
//! Reduces a window of raw position rows to one row per guard and attaches
//! the guard's display name. The reduction is a single pass: a row replaces
//! the one kept for its user when its `recordedAt` is greater than or equal,
//! so among equal timestamps the row seen last wins.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use crate::shared::error::Result;
use crate::tracking::entity::GpsPosition;
use crate::tracking::repository::GpsPositionRepository;
use crate::user::repository::UserRepository;

/// Newest known position of one guard
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LivePosition {
    pub user_id: String,
    pub display_name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy: Option<f64>,
    pub battery: Option<f64>,
    pub heading: Option<f64>,
    pub speed: Option<f64>,
    pub patrol_id: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

impl LivePosition {
    fn from_row(row: GpsPosition, display_name: String) -> Self {
        Self {
            user_id: row.user_id,
            display_name,
            latitude: row.latitude,
            longitude: row.longitude,
            accuracy: row.accuracy,
            battery: row.battery,
            heading: row.heading,
            speed: row.speed,
            patrol_id: row.patrol_id,
            recorded_at: row.recorded_at,
        }
    }
}

/// Keep the newest row per user, ordered by user id
pub fn latest_per_user<I>(rows: I) -> Vec<GpsPosition>
where
    I: IntoIterator<Item = GpsPosition>,
{
    let mut latest: BTreeMap<String, GpsPosition> = BTreeMap::new();
    for row in rows {
        match latest.get(&row.user_id) {
            Some(kept) if row.recorded_at < kept.recorded_at => {}
            _ => {
                latest.insert(row.user_id.clone(), row);
            }
        }
    }
    latest.into_values().collect()
}

/// Where live positions and guard names come from
#[async_trait]
pub trait PositionSource: Send + Sync {
    /// Rows recorded at or after `since`, in storage order
    async fn positions_since(&self, organization_id: &str, since: DateTime<Utc>) -> Result<Vec<GpsPosition>>;

    /// Display names keyed by user id; unknown ids are simply absent
    async fn display_names(&self, organization_id: &str, user_ids: &[String]) -> Result<HashMap<String, String>>;
}

/// [`PositionSource`] over the MongoDB repositories
pub struct MongoPositionSource {
    gps_repo: Arc<GpsPositionRepository>,
    user_repo: Arc<UserRepository>,
}

impl MongoPositionSource {
    pub fn new(gps_repo: Arc<GpsPositionRepository>, user_repo: Arc<UserRepository>) -> Self {
        Self { gps_repo, user_repo }
    }
}

#[async_trait]
impl PositionSource for MongoPositionSource {
    async fn positions_since(&self, organization_id: &str, since: DateTime<Utc>) -> Result<Vec<GpsPosition>> {
        self.gps_repo.find_since(organization_id, since).await
    }

    async fn display_names(&self, organization_id: &str, user_ids: &[String]) -> Result<HashMap<String, String>> {
        let users = self.user_repo.find_by_ids(organization_id, user_ids).await?;
        Ok(users
            .into_iter()
            .map(|u| {
                let name = u.display_name().to_string();
                (u.id, name)
            })
            .collect())
    }
}

/// One position per guard seen within `window` before `now`
pub async fn live_snapshot(
    source: &dyn PositionSource,
    organization_id: &str,
    window: Duration,
    now: DateTime<Utc>,
) -> Result<Vec<LivePosition>> {
    let rows = source.positions_since(organization_id, now - window).await?;
    let latest = latest_per_user(rows);

    let user_ids: Vec<String> = latest.iter().map(|p| p.user_id.clone()).collect();
    let names = source.display_names(organization_id, &user_ids).await?;

    Ok(latest
        .into_iter()
        .map(|row| {
            let name = names.get(&row.user_id).cloned().unwrap_or_else(|| row.user_id.clone());
            LivePosition::from_row(row, name)
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::Coordinates;
    use chrono::TimeZone;

    fn row(user: &str, lat: f64, secs: i64) -> GpsPosition {
        let at = Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap();
        GpsPosition::new("ORG", user, Coordinates::new(lat, 0.0).unwrap(), at)
    }

    #[test]
    fn test_keeps_newest_per_user() {
        let rows = vec![
            row("B", 1.0, 10),
            row("A", 2.0, 30),
            row("B", 3.0, 50),
            row("A", 4.0, 20),
        ];
        let latest = latest_per_user(rows);

        assert_eq!(latest.len(), 2);
        assert_eq!(latest[0].user_id, "A");
        assert_eq!(latest[0].latitude, 2.0);
        assert_eq!(latest[1].user_id, "B");
        assert_eq!(latest[1].latitude, 3.0);
    }

    #[test]
    fn test_equal_timestamps_later_row_wins() {
        let rows = vec![row("A", 1.0, 10), row("A", 2.0, 10)];
        let latest = latest_per_user(rows);
        assert_eq!(latest.len(), 1);
        assert_eq!(latest[0].latitude, 2.0);
    }

    #[test]
    fn test_empty_input() {
        assert!(latest_per_user(Vec::new()).is_empty());
    }

    #[test]
    fn test_telemetry_passes_through() {
        let mut r = row("A", 1.0, 10);
        r.battery = Some(42.0);
        r.heading = Some(90.0);
        let latest = latest_per_user(vec![r.clone()]);
        assert_eq!(latest[0], r);
    }

    struct FakeSource {
        rows: Vec<GpsPosition>,
        names: HashMap<String, String>,
    }

    #[async_trait]
    impl PositionSource for FakeSource {
        async fn positions_since(&self, _org: &str, since: DateTime<Utc>) -> Result<Vec<GpsPosition>> {
            Ok(self.rows.iter().filter(|r| r.recorded_at >= since).cloned().collect())
        }

        async fn display_names(&self, _org: &str, user_ids: &[String]) -> Result<HashMap<String, String>> {
            Ok(self.names
                .iter()
                .filter(|(id, _)| user_ids.contains(id))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect())
        }
    }

    #[tokio::test]
    async fn test_snapshot_window_and_names() {
        let source = FakeSource {
            rows: vec![row("A", 1.0, 0), row("B", 2.0, 1_500), row("C", 3.0, 1_700)],
            names: HashMap::from([("B".to_string(), "Bea Guard".to_string())]),
        };
        let now = Utc.timestamp_opt(1_700_000_000 + 1_800, 0).unwrap();

        let live = live_snapshot(&source, "ORG", Duration::minutes(10), now).await.unwrap();

        assert_eq!(live.len(), 2);
        assert_eq!(live[0].user_id, "B");
        assert_eq!(live[0].display_name, "Bea Guard");
        // Deleted or unknown users fall back to their id
        assert_eq!(live[1].user_id, "C");
        assert_eq!(live[1].display_name, "C");
    }
}
