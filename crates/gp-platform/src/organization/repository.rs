//! Organization Repository

use mongodb::{Collection, Database, bson::doc};
use crate::organization::entity::Organization;
use crate::shared::error::Result;

pub struct OrganizationRepository {
    collection: Collection<Organization>,
}

impl OrganizationRepository {
    pub fn new(db: &Database) -> Self {
        Self {
            collection: db.collection("organizations"),
        }
    }

    pub async fn insert(&self, organization: &Organization) -> Result<()> {
        self.collection.insert_one(organization).await?;
        Ok(())
    }

    pub async fn find_by_id(&self, id: &str) -> Result<Option<Organization>> {
        Ok(self.collection.find_one(doc! { "_id": id }).await?)
    }

    pub async fn find_by_name(&self, name: &str) -> Result<Option<Organization>> {
        Ok(self.collection.find_one(doc! { "name": name }).await?)
    }

    pub async fn update(&self, organization: &Organization) -> Result<()> {
        self.collection
            .replace_one(doc! { "_id": &organization.id }, organization)
            .await?;
        Ok(())
    }
}
