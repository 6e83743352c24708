//! Site Repository

use mongodb::{Collection, Database, bson::doc, options::FindOptions};
use futures::TryStreamExt;
use crate::site::entity::Site;
use crate::shared::error::Result;

pub struct SiteRepository {
    collection: Collection<Site>,
}

impl SiteRepository {
    pub fn new(db: &Database) -> Self {
        Self {
            collection: db.collection("sites"),
        }
    }

    pub async fn insert(&self, site: &Site) -> Result<()> {
        self.collection.insert_one(site).await?;
        Ok(())
    }

    pub async fn find_by_id(&self, organization_id: &str, id: &str) -> Result<Option<Site>> {
        Ok(self.collection
            .find_one(doc! { "_id": id, "organizationId": organization_id })
            .await?)
    }

    /// Resolve a scanned QR token to an active site of the organization
    pub async fn find_by_qr_token(&self, organization_id: &str, qr_token: &str) -> Result<Option<Site>> {
        Ok(self.collection
            .find_one(doc! {
                "qrToken": qr_token,
                "organizationId": organization_id,
                "active": true
            })
            .await?)
    }

    pub async fn find_all(&self, organization_id: &str, active_only: bool) -> Result<Vec<Site>> {
        let mut filter = doc! { "organizationId": organization_id };
        if active_only {
            filter.insert("active", true);
        }
        let cursor = self.collection
            .find(filter)
            .with_options(FindOptions::builder().sort(doc! { "name": 1 }).build())
            .await?;
        Ok(cursor.try_collect().await?)
    }

    pub async fn update(&self, site: &Site) -> Result<()> {
        self.collection
            .replace_one(doc! { "_id": &site.id, "organizationId": &site.organization_id }, site)
            .await?;
        Ok(())
    }

    pub async fn delete(&self, organization_id: &str, id: &str) -> Result<bool> {
        let result = self.collection
            .delete_one(doc! { "_id": id, "organizationId": organization_id })
            .await?;
        Ok(result.deleted_count > 0)
    }
}
