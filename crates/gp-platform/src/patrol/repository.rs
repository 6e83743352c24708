//! Patrol Repository

use chrono::{DateTime, Utc};
use mongodb::{
    Collection, Database,
    bson::{doc, Document},
    options::FindOptions,
};
use futures::TryStreamExt;
use crate::patrol::entity::{Patrol, PatrolStatus};
use crate::shared::error::Result;

#[derive(Debug, Default, Clone)]
pub struct PatrolFilter {
    pub status: Option<PatrolStatus>,
    pub guard_id: Option<String>,
    pub route_id: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl PatrolFilter {
    fn to_document(&self, organization_id: &str) -> Document {
        let mut filter = doc! { "organizationId": organization_id };
        if let Some(status) = self.status {
            filter.insert("status", status.as_str());
        }
        if let Some(guard_id) = &self.guard_id {
            filter.insert("guardId", guard_id);
        }
        if let Some(route_id) = &self.route_id {
            filter.insert("routeId", route_id);
        }
        let mut range = Document::new();
        if let Some(from) = self.from {
            range.insert("$gte", bson::DateTime::from_chrono(from));
        }
        if let Some(to) = self.to {
            range.insert("$lte", bson::DateTime::from_chrono(to));
        }
        if !range.is_empty() {
            filter.insert("createdAt", range);
        }
        filter
    }
}

pub struct PatrolRepository {
    collection: Collection<Patrol>,
}

impl PatrolRepository {
    pub fn new(db: &Database) -> Self {
        Self {
            collection: db.collection("patrols"),
        }
    }

    pub async fn insert(&self, patrol: &Patrol) -> Result<()> {
        self.collection.insert_one(patrol).await?;
        Ok(())
    }

    pub async fn find_by_id(&self, organization_id: &str, id: &str) -> Result<Option<Patrol>> {
        Ok(self.collection
            .find_one(doc! { "_id": id, "organizationId": organization_id })
            .await?)
    }

    /// Newest first; `limit` of None returns every match
    pub async fn find(&self, organization_id: &str, filter: &PatrolFilter, limit: Option<i64>) -> Result<Vec<Patrol>> {
        let options = FindOptions::builder()
            .sort(doc! { "createdAt": -1, "_id": -1 })
            .limit(limit)
            .build();
        let cursor = self.collection
            .find(filter.to_document(organization_id))
            .with_options(options)
            .await?;
        Ok(cursor.try_collect().await?)
    }

    /// Replace the stored patrol only if nobody changed it since it was read.
    ///
    /// The stored status and visit count must still equal `read_status` and
    /// `read_completed`. Returns false when the patrol moved on meanwhile.
    pub async fn replace_if_unchanged(
        &self,
        patrol: &Patrol,
        read_status: PatrolStatus,
        read_completed: i64,
    ) -> Result<bool> {
        let result = self.collection
            .replace_one(
                doc! {
                    "_id": &patrol.id,
                    "organizationId": &patrol.organization_id,
                    "status": read_status.as_str(),
                    "completedCheckpoints": read_completed
                },
                patrol,
            )
            .await?;
        Ok(result.matched_count > 0)
    }

    /// Scheduled or running patrols on a route
    pub async fn count_open_for_route(&self, organization_id: &str, route_id: &str) -> Result<u64> {
        Ok(self.collection
            .count_documents(doc! {
                "organizationId": organization_id,
                "routeId": route_id,
                "status": { "$in": [PatrolStatus::Scheduled.as_str(), PatrolStatus::InProgress.as_str()] }
            })
            .await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_document() {
        let filter = PatrolFilter {
            status: Some(PatrolStatus::InProgress),
            guard_id: Some("G1".into()),
            ..Default::default()
        };
        let doc = filter.to_document("ORG");
        assert_eq!(doc.get_str("organizationId").unwrap(), "ORG");
        assert_eq!(doc.get_str("status").unwrap(), "IN_PROGRESS");
        assert_eq!(doc.get_str("guardId").unwrap(), "G1");
        assert!(!doc.contains_key("routeId"));
        assert!(!doc.contains_key("createdAt"));
    }
}
