//! Patrol Entity
//!
//! Lifecycle:
//!
//! ```text
//! SCHEDULED --start--> IN_PROGRESS --complete--> COMPLETED
//!     |                     |
//!     +-------cancel--------+------------------> CANCELLED
//! ```
//!
//! Checkpoints may only be visited while IN_PROGRESS, each at most once.

use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use bson::serde_helpers::{chrono_datetime_as_bson_datetime, chrono_datetime_as_bson_datetime_optional};
use utoipa::ToSchema;

use crate::geo::Coordinates;
use crate::patrol_route::entity::PatrolRoute;
use crate::shared::error::{PlatformError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PatrolStatus {
    Scheduled,
    InProgress,
    Completed,
    Cancelled,
}

impl PatrolStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            PatrolStatus::Scheduled => "SCHEDULED",
            PatrolStatus::InProgress => "IN_PROGRESS",
            PatrolStatus::Completed => "COMPLETED",
            PatrolStatus::Cancelled => "CANCELLED",
        }
    }

    /// Still occupies its route
    pub fn is_open(self) -> bool {
        matches!(self, PatrolStatus::Scheduled | PatrolStatus::InProgress)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CheckpointVisit {
    pub checkpoint: String,

    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub visited_at: DateTime<Utc>,

    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub latitude: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub longitude: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Patrol {
    #[serde(rename = "_id")]
    pub id: String,

    pub organization_id: String,

    pub route_id: String,

    pub guard_id: String,

    pub status: PatrolStatus,

    /// Checkpoint count of the route when the patrol was created
    pub total_checkpoints: i64,

    pub completed_checkpoints: i64,

    #[serde(default)]
    pub visits: Vec<CheckpointVisit>,

    #[serde(default, with = "chrono_datetime_as_bson_datetime_optional")]
    pub scheduled_at: Option<DateTime<Utc>>,

    #[serde(default, with = "chrono_datetime_as_bson_datetime_optional")]
    pub started_at: Option<DateTime<Utc>>,

    #[serde(default, with = "chrono_datetime_as_bson_datetime_optional")]
    pub completed_at: Option<DateTime<Utc>>,

    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,

    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

impl Patrol {
    pub fn new(route: &PatrolRoute, guard_id: impl Into<String>, scheduled_at: Option<DateTime<Utc>>) -> Self {
        let now = Utc::now();
        Self {
            id: crate::TsidGenerator::generate(),
            organization_id: route.organization_id.clone(),
            route_id: route.id.clone(),
            guard_id: guard_id.into(),
            status: PatrolStatus::Scheduled,
            total_checkpoints: route.checkpoints.len() as i64,
            completed_checkpoints: 0,
            visits: Vec::new(),
            scheduled_at,
            started_at: None,
            completed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn transition(&mut self, allowed: &[PatrolStatus], action: &str, to: PatrolStatus, now: DateTime<Utc>) -> Result<()> {
        if !allowed.contains(&self.status) {
            return Err(PlatformError::invalid_transition("patrol", self.status.as_str(), action));
        }
        self.status = to;
        self.updated_at = now;
        Ok(())
    }

    pub fn start(&mut self, now: DateTime<Utc>) -> Result<()> {
        self.transition(&[PatrolStatus::Scheduled], "start", PatrolStatus::InProgress, now)?;
        self.started_at = Some(now);
        Ok(())
    }

    pub fn complete(&mut self, now: DateTime<Utc>) -> Result<()> {
        self.transition(&[PatrolStatus::InProgress], "complete", PatrolStatus::Completed, now)?;
        self.completed_at = Some(now);
        Ok(())
    }

    pub fn cancel(&mut self, now: DateTime<Utc>) -> Result<()> {
        self.transition(
            &[PatrolStatus::Scheduled, PatrolStatus::InProgress],
            "cancel",
            PatrolStatus::Cancelled,
            now,
        )
    }

    pub fn is_visited(&self, checkpoint: &str) -> bool {
        self.visits.iter().any(|v| v.checkpoint == checkpoint)
    }

    /// Record a visit to one of the route's checkpoints
    pub fn visit(
        &mut self,
        route: &PatrolRoute,
        checkpoint: &str,
        position: Option<Coordinates>,
        now: DateTime<Utc>,
    ) -> Result<()> {
        if self.status != PatrolStatus::InProgress {
            return Err(PlatformError::invalid_transition("patrol", self.status.as_str(), "visit a checkpoint of"));
        }
        let checkpoint = checkpoint.trim();
        if !route.has_checkpoint(checkpoint) {
            return Err(PlatformError::validation(format!(
                "'{}' is not a checkpoint of route {}",
                checkpoint, route.name
            )));
        }
        if self.is_visited(checkpoint) {
            return Err(PlatformError::conflict(format!("Checkpoint '{}' already visited", checkpoint)));
        }

        self.visits.push(CheckpointVisit {
            checkpoint: checkpoint.to_string(),
            visited_at: now,
            latitude: position.map(|p| p.latitude),
            longitude: position.map(|p| p.longitude),
        });
        self.completed_checkpoints += 1;
        self.updated_at = now;
        Ok(())
    }

    /// First route checkpoint not yet visited, in route order
    pub fn next_unvisited<'a>(&self, route: &'a PatrolRoute) -> Option<&'a str> {
        route
            .checkpoints
            .iter()
            .map(String::as_str)
            .find(|c| !self.is_visited(c))
    }

    /// Where a guard on this patrol most likely is: the next checkpoint to
    /// visit, or the last one once everything has been visited
    pub fn nearest_checkpoint<'a>(&self, route: &'a PatrolRoute) -> Option<&'a str> {
        self.next_unvisited(route).or_else(|| route.last_checkpoint())
    }
}

/// Aggregate figures over a set of patrols
#[derive(Debug, Clone, Default, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PatrolStats {
    pub total: u64,
    pub scheduled: u64,
    pub in_progress: u64,
    pub completed: u64,
    pub cancelled: u64,
    /// completed / total, 0 when there are no patrols
    pub completion_rate: f64,
    /// Visited checkpoints over expected checkpoints across all patrols
    pub checkpoint_completion_rate: f64,
}

fn ratio(part: i64, whole: i64) -> f64 {
    if whole <= 0 {
        0.0
    } else {
        part as f64 / whole as f64
    }
}

impl PatrolStats {
    pub fn from_patrols<'a, I>(patrols: I) -> Self
    where
        I: IntoIterator<Item = &'a Patrol>,
    {
        let mut stats = PatrolStats::default();
        let mut visited = 0i64;
        let mut expected = 0i64;

        for patrol in patrols {
            stats.total += 1;
            match patrol.status {
                PatrolStatus::Scheduled => stats.scheduled += 1,
                PatrolStatus::InProgress => stats.in_progress += 1,
                PatrolStatus::Completed => stats.completed += 1,
                PatrolStatus::Cancelled => stats.cancelled += 1,
            }
            visited += patrol.completed_checkpoints;
            expected += patrol.total_checkpoints;
        }

        stats.completion_rate = ratio(stats.completed as i64, stats.total as i64);
        stats.checkpoint_completion_rate = ratio(visited, expected);
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn route() -> PatrolRoute {
        PatrolRoute::new("ORG", "Loop", vec!["Gate".into(), "Lobby".into(), "Roof".into()])
    }

    #[test]
    fn test_new_patrol_copies_route() {
        let r = route();
        let p = Patrol::new(&r, "G1", None);
        assert_eq!(p.status, PatrolStatus::Scheduled);
        assert_eq!(p.total_checkpoints, 3);
        assert_eq!(p.completed_checkpoints, 0);
        assert_eq!(p.route_id, r.id);
        assert_eq!(p.organization_id, "ORG");
    }

    #[test]
    fn test_lifecycle() {
        let r = route();
        let mut p = Patrol::new(&r, "G1", None);
        let now = Utc::now();

        p.start(now).unwrap();
        assert_eq!(p.status, PatrolStatus::InProgress);
        assert_eq!(p.started_at, Some(now));

        p.visit(&r, "Lobby", None, now).unwrap();
        assert_eq!(p.completed_checkpoints, 1);

        p.complete(now).unwrap();
        assert_eq!(p.status, PatrolStatus::Completed);
        assert!(p.completed_at.is_some());
    }

    #[test]
    fn test_invalid_transitions() {
        let r = route();
        let now = Utc::now();
        let mut p = Patrol::new(&r, "G1", None);

        // Not started yet
        assert!(matches!(p.complete(now), Err(PlatformError::InvalidTransition { .. })));
        assert!(matches!(p.visit(&r, "Gate", None, now), Err(PlatformError::InvalidTransition { .. })));

        p.start(now).unwrap();
        assert!(matches!(p.start(now), Err(PlatformError::InvalidTransition { .. })));

        p.cancel(now).unwrap();
        assert_eq!(p.status, PatrolStatus::Cancelled);
        assert!(p.cancel(now).is_err());
        assert!(p.start(now).is_err());
    }

    #[test]
    fn test_cancel_from_scheduled() {
        let mut p = Patrol::new(&route(), "G1", None);
        p.cancel(Utc::now()).unwrap();
        assert_eq!(p.status, PatrolStatus::Cancelled);
    }

    #[test]
    fn test_visit_rules() {
        let r = route();
        let now = Utc::now();
        let mut p = Patrol::new(&r, "G1", None);
        p.start(now).unwrap();

        let pos = Coordinates::new(10.0, 20.0).unwrap();
        p.visit(&r, " Gate ", Some(pos), now).unwrap();
        assert_eq!(p.visits[0].checkpoint, "Gate");
        assert_eq!(p.visits[0].latitude, Some(10.0));

        assert!(matches!(p.visit(&r, "Gate", None, now), Err(PlatformError::Conflict { .. })));
        assert!(matches!(p.visit(&r, "Basement", None, now), Err(PlatformError::Validation { .. })));
        assert_eq!(p.completed_checkpoints, 1);
    }

    #[test]
    fn test_nearest_checkpoint() {
        let r = route();
        let now = Utc::now();
        let mut p = Patrol::new(&r, "G1", None);
        assert_eq!(p.nearest_checkpoint(&r), Some("Gate"));

        p.start(now).unwrap();
        p.visit(&r, "Gate", None, now).unwrap();
        p.visit(&r, "Roof", None, now).unwrap();
        assert_eq!(p.next_unvisited(&r), Some("Lobby"));

        p.visit(&r, "Lobby", None, now).unwrap();
        assert_eq!(p.next_unvisited(&r), None);
        assert_eq!(p.nearest_checkpoint(&r), Some("Roof"));
    }

    #[test]
    fn test_stats() {
        assert_eq!(PatrolStats::from_patrols(&Vec::<Patrol>::new()), PatrolStats::default());

        let r = route();
        let now = Utc::now();
        let scheduled = Patrol::new(&r, "G1", None);
        let mut done = Patrol::new(&r, "G2", None);
        done.start(now).unwrap();
        for cp in ["Gate", "Lobby", "Roof"] {
            done.visit(&r, cp, None, now).unwrap();
        }
        done.complete(now).unwrap();
        let mut cancelled = Patrol::new(&r, "G3", None);
        cancelled.cancel(now).unwrap();
        let mut running = Patrol::new(&r, "G4", None);
        running.start(now).unwrap();

        let stats = PatrolStats::from_patrols(&[scheduled, done, cancelled, running]);
        assert_eq!(stats.total, 4);
        assert_eq!(stats.scheduled, 1);
        assert_eq!(stats.in_progress, 1);
        assert_eq!(stats.completed, 1);
        assert_eq!(stats.cancelled, 1);
        assert_eq!(stats.completion_rate, 0.25);
        assert_eq!(stats.checkpoint_completion_rate, 3.0 / 12.0);
    }
}
