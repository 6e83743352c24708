//! Attendance Repository

use chrono::{DateTime, Utc};
use mongodb::{
    Collection, Database,
    bson::{doc, Document},
    options::{FindOneOptions, FindOptions},
};
use futures::TryStreamExt;
use crate::attendance::entity::{AttendanceKind, AttendanceRecord};
use crate::shared::error::Result;

#[derive(Debug, Default, Clone)]
pub struct AttendanceFilter {
    pub user_id: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl AttendanceFilter {
    fn to_document(&self, organization_id: &str) -> Document {
        let mut filter = doc! { "organizationId": organization_id };
        if let Some(user_id) = &self.user_id {
            filter.insert("userId", user_id);
        }
        let mut range = Document::new();
        if let Some(from) = self.from {
            range.insert("$gte", bson::DateTime::from_chrono(from));
        }
        if let Some(to) = self.to {
            range.insert("$lte", bson::DateTime::from_chrono(to));
        }
        if !range.is_empty() {
            filter.insert("recordedAt", range);
        }
        filter
    }
}

pub struct AttendanceRepository {
    collection: Collection<AttendanceRecord>,
}

impl AttendanceRepository {
    pub fn new(db: &Database) -> Self {
        Self {
            collection: db.collection("attendance_records"),
        }
    }

    pub async fn insert(&self, record: &AttendanceRecord) -> Result<()> {
        self.collection.insert_one(record).await?;
        Ok(())
    }

    /// Most recent record for a user, optionally of one kind
    pub async fn find_latest(
        &self,
        organization_id: &str,
        user_id: &str,
        kind: Option<AttendanceKind>,
    ) -> Result<Option<AttendanceRecord>> {
        let mut filter = doc! { "organizationId": organization_id, "userId": user_id };
        if let Some(kind) = kind {
            filter.insert("kind", kind.as_str());
        }
        let options = FindOneOptions::builder()
            .sort(doc! { "recordedAt": -1, "_id": -1 })
            .build();
        Ok(self.collection.find_one(filter).with_options(options).await?)
    }

    /// Newest first
    pub async fn find(&self, organization_id: &str, filter: &AttendanceFilter, limit: i64) -> Result<Vec<AttendanceRecord>> {
        let options = FindOptions::builder()
            .sort(doc! { "recordedAt": -1, "_id": -1 })
            .limit(limit)
            .build();
        let cursor = self.collection
            .find(filter.to_document(organization_id))
            .with_options(options)
            .await?;
        Ok(cursor.try_collect().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_filter_document() {
        let now = Utc::now();
        let filter = AttendanceFilter {
            user_id: Some("U1".into()),
            from: Some(now - Duration::hours(8)),
            to: None,
        };
        let doc = filter.to_document("ORG");
        assert_eq!(doc.get_str("userId").unwrap(), "U1");
        let range = doc.get_document("recordedAt").unwrap();
        assert!(range.contains_key("$gte"));
        assert!(!range.contains_key("$lte"));

        let empty = AttendanceFilter::default().to_document("ORG");
        assert!(!empty.contains_key("recordedAt"));
    }
}
