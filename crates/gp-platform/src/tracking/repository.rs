//! GPS Position Repository

use chrono::{DateTime, Utc};
use mongodb::{
    Collection, Database,
    bson::{doc, Document},
    options::FindOptions,
};
use futures::TryStreamExt;
use crate::tracking::entity::GpsPosition;
use crate::shared::error::Result;

pub struct GpsPositionRepository {
    collection: Collection<GpsPosition>,
}

fn time_range(from: Option<DateTime<Utc>>, to: Option<DateTime<Utc>>) -> Option<Document> {
    let mut range = Document::new();
    if let Some(from) = from {
        range.insert("$gte", bson::DateTime::from_chrono(from));
    }
    if let Some(to) = to {
        range.insert("$lte", bson::DateTime::from_chrono(to));
    }
    (!range.is_empty()).then_some(range)
}

impl GpsPositionRepository {
    pub fn new(db: &Database) -> Self {
        Self {
            collection: db.collection("gps_positions"),
        }
    }

    pub async fn insert(&self, position: &GpsPosition) -> Result<()> {
        self.collection.insert_one(position).await?;
        Ok(())
    }

    /// All positions of the organization recorded at or after `since`,
    /// oldest first
    pub async fn find_since(&self, organization_id: &str, since: DateTime<Utc>) -> Result<Vec<GpsPosition>> {
        let options = FindOptions::builder()
            .sort(doc! { "recordedAt": 1, "_id": 1 })
            .build();
        let cursor = self.collection
            .find(doc! {
                "organizationId": organization_id,
                "recordedAt": { "$gte": bson::DateTime::from_chrono(since) }
            })
            .with_options(options)
            .await?;
        Ok(cursor.try_collect().await?)
    }

    /// One guard's `limit` most recent positions, oldest first
    pub async fn find_history(
        &self,
        organization_id: &str,
        user_id: &str,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
        limit: i64,
    ) -> Result<Vec<GpsPosition>> {
        let mut filter = doc! { "organizationId": organization_id, "userId": user_id };
        if let Some(range) = time_range(from, to) {
            filter.insert("recordedAt", range);
        }
        let cursor = self.collection.find(filter).with_options(newest_first(limit)).await?;
        let mut rows: Vec<GpsPosition> = cursor.try_collect().await?;
        rows.reverse();
        Ok(rows)
    }
}

/// The `limit` most recent rows; callers reverse them into oldest-first order
fn newest_first(limit: i64) -> FindOptions {
    FindOptions::builder()
        .sort(doc! { "recordedAt": -1, "_id": -1 })
        .limit(limit)
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_time_range() {
        assert!(time_range(None, None).is_none());

        let now = Utc::now();
        let range = time_range(Some(now - Duration::hours(1)), Some(now)).unwrap();
        assert!(range.contains_key("$gte"));
        assert!(range.contains_key("$lte"));
    }

    #[test]
    fn test_history_keeps_most_recent_rows() {
        let options = newest_first(50);
        let sort = options.sort.unwrap();
        assert_eq!(sort.get_i32("recordedAt").unwrap(), -1);
        assert_eq!(options.limit, Some(50));
    }
}
