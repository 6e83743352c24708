//! Backup Request Repository

use mongodb::{Collection, Database, bson::doc, options::FindOptions};
use futures::TryStreamExt;
use crate::backup_request::entity::{BackupRequest, BackupStatus};
use crate::shared::error::Result;

pub struct BackupRequestRepository {
    collection: Collection<BackupRequest>,
}

impl BackupRequestRepository {
    pub fn new(db: &Database) -> Self {
        Self {
            collection: db.collection("backup_requests"),
        }
    }

    pub async fn insert(&self, request: &BackupRequest) -> Result<()> {
        self.collection.insert_one(request).await?;
        Ok(())
    }

    pub async fn find_by_id(&self, organization_id: &str, id: &str) -> Result<Option<BackupRequest>> {
        Ok(self.collection
            .find_one(doc! { "_id": id, "organizationId": organization_id })
            .await?)
    }

    /// Newest first
    pub async fn find(&self, organization_id: &str, status: Option<BackupStatus>, limit: i64) -> Result<Vec<BackupRequest>> {
        let mut filter = doc! { "organizationId": organization_id };
        if let Some(status) = status {
            filter.insert("status", status.as_str());
        }
        let options = FindOptions::builder()
            .sort(doc! { "createdAt": -1, "_id": -1 })
            .limit(limit)
            .build();
        let cursor = self.collection.find(filter).with_options(options).await?;
        Ok(cursor.try_collect().await?)
    }

    /// Store `request` only while the stored status is still `read_status`
    pub async fn replace_if_status(&self, request: &BackupRequest, read_status: BackupStatus) -> Result<bool> {
        let result = self.collection
            .replace_one(
                doc! {
                    "_id": &request.id,
                    "organizationId": &request.organization_id,
                    "status": read_status.as_str()
                },
                request,
            )
            .await?;
        Ok(result.matched_count > 0)
    }
}
