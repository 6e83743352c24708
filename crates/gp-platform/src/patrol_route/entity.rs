//! Patrol Route Entity

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use bson::serde_helpers::chrono_datetime_as_bson_datetime;

use crate::shared::error::{PlatformError, Result};

pub const DEFAULT_ESTIMATED_DURATION_MINUTES: i64 = 30;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatrolRoute {
    #[serde(rename = "_id")]
    pub id: String,

    pub organization_id: String,

    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub description: Option<String>,

    /// Checkpoint labels in walking order, unique within the route
    pub checkpoints: Vec<String>,

    pub estimated_duration_minutes: i64,

    pub active: bool,

    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,

    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

impl PatrolRoute {
    pub fn new(organization_id: impl Into<String>, name: impl Into<String>, checkpoints: Vec<String>) -> Self {
        let now = Utc::now();
        Self {
            id: crate::TsidGenerator::generate(),
            organization_id: organization_id.into(),
            name: name.into(),
            description: None,
            checkpoints,
            estimated_duration_minutes: DEFAULT_ESTIMATED_DURATION_MINUTES,
            active: true,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_description(mut self, description: Option<String>) -> Self {
        self.description = description;
        self
    }

    pub fn with_estimated_duration(mut self, minutes: i64) -> Self {
        self.estimated_duration_minutes = minutes;
        self
    }

    pub fn has_checkpoint(&self, label: &str) -> bool {
        self.checkpoints.iter().any(|c| c == label)
    }

    pub fn last_checkpoint(&self) -> Option<&str> {
        self.checkpoints.last().map(String::as_str)
    }
}

/// Trim labels and reject empty, duplicate or missing checkpoints
pub fn normalize_checkpoints(labels: Vec<String>) -> Result<Vec<String>> {
    if labels.is_empty() {
        return Err(PlatformError::validation("a route needs at least one checkpoint"));
    }

    let mut seen = HashSet::new();
    let mut normalized = Vec::with_capacity(labels.len());
    for (i, label) in labels.into_iter().enumerate() {
        let label = label.trim().to_string();
        if label.is_empty() {
            return Err(PlatformError::validation(format!("checkpoint {} has an empty label", i + 1)));
        }
        if !seen.insert(label.clone()) {
            return Err(PlatformError::validation(format!("duplicate checkpoint '{}'", label)));
        }
        normalized.push(label);
    }
    Ok(normalized)
}

/// Estimated duration must be a positive number of minutes
pub fn validate_duration(minutes: i64) -> Result<i64> {
    if minutes < 1 {
        return Err(PlatformError::validation("estimatedDurationMinutes must be at least 1"));
    }
    Ok(minutes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_normalize_trims_and_keeps_order() {
        let cps = normalize_checkpoints(labels(&["  Gate ", "Lobby", "Roof"])).unwrap();
        assert_eq!(cps, labels(&["Gate", "Lobby", "Roof"]));
    }

    #[test]
    fn test_normalize_rejects_bad_lists() {
        assert!(normalize_checkpoints(vec![]).is_err());
        assert!(normalize_checkpoints(labels(&["Gate", "   "])).is_err());
        // Duplicates are detected after trimming
        assert!(normalize_checkpoints(labels(&["Gate", " Gate"])).is_err());
    }

    #[test]
    fn test_route_helpers() {
        let route = PatrolRoute::new("ORG", "Night loop", labels(&["A", "B"]));
        assert!(route.active);
        assert_eq!(route.estimated_duration_minutes, DEFAULT_ESTIMATED_DURATION_MINUTES);
        assert!(route.has_checkpoint("B"));
        assert!(!route.has_checkpoint("C"));
        assert_eq!(route.last_checkpoint(), Some("B"));
    }

    #[test]
    fn test_validate_duration() {
        assert_eq!(validate_duration(45).unwrap(), 45);
        assert!(validate_duration(0).is_err());
    }
}
