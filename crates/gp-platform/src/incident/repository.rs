//! Incident Repository

use mongodb::{
    Collection, Database,
    bson::{doc, Document},
    options::FindOptions,
};
use futures::TryStreamExt;
use crate::incident::entity::{Incident, IncidentSeverity, IncidentStatus};
use crate::shared::error::Result;

#[derive(Debug, Default, Clone)]
pub struct IncidentFilter {
    pub status: Option<IncidentStatus>,
    pub severity: Option<IncidentSeverity>,
    pub reported_by: Option<String>,
    pub patrol_id: Option<String>,
}

impl IncidentFilter {
    fn to_document(&self, organization_id: &str) -> Document {
        let mut filter = doc! { "organizationId": organization_id };
        if let Some(status) = self.status {
            filter.insert("status", status.as_str());
        }
        if let Some(severity) = self.severity {
            filter.insert("severity", severity.as_str());
        }
        if let Some(reported_by) = &self.reported_by {
            filter.insert("reportedBy", reported_by);
        }
        if let Some(patrol_id) = &self.patrol_id {
            filter.insert("patrolId", patrol_id);
        }
        filter
    }
}

pub struct IncidentRepository {
    collection: Collection<Incident>,
}

impl IncidentRepository {
    pub fn new(db: &Database) -> Self {
        Self {
            collection: db.collection("incidents"),
        }
    }

    pub async fn insert(&self, incident: &Incident) -> Result<()> {
        self.collection.insert_one(incident).await?;
        Ok(())
    }

    pub async fn find_by_id(&self, organization_id: &str, id: &str) -> Result<Option<Incident>> {
        Ok(self.collection
            .find_one(doc! { "_id": id, "organizationId": organization_id })
            .await?)
    }

    /// Newest first
    pub async fn find(&self, organization_id: &str, filter: &IncidentFilter, limit: i64) -> Result<Vec<Incident>> {
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

    pub async fn update(&self, incident: &Incident) -> Result<()> {
        self.collection
            .replace_one(doc! { "_id": &incident.id, "organizationId": &incident.organization_id }, incident)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_document() {
        let filter = IncidentFilter {
            status: Some(IncidentStatus::Open),
            severity: Some(IncidentSeverity::Critical),
            ..Default::default()
        };
        let doc = filter.to_document("ORG");
        assert_eq!(doc.get_str("status").unwrap(), "OPEN");
        assert_eq!(doc.get_str("severity").unwrap(), "CRITICAL");
        assert!(!doc.contains_key("reportedBy"));
    }
}
