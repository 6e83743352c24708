//! Role Repository

use mongodb::{Collection, Database, bson::doc, options::FindOptions};
use futures::TryStreamExt;
use crate::role::entity::Role;
use crate::shared::error::Result;

pub struct RoleRepository {
    collection: Collection<Role>,
}

impl RoleRepository {
    pub fn new(db: &Database) -> Self {
        Self {
            collection: db.collection("roles"),
        }
    }

    pub async fn insert(&self, role: &Role) -> Result<()> {
        self.collection.insert_one(role).await?;
        Ok(())
    }

    pub async fn insert_many(&self, roles: &[Role]) -> Result<()> {
        if roles.is_empty() {
            return Ok(());
        }
        self.collection.insert_many(roles).await?;
        Ok(())
    }

    pub async fn find_by_id(&self, organization_id: &str, id: &str) -> Result<Option<Role>> {
        Ok(self.collection
            .find_one(doc! { "_id": id, "organizationId": organization_id })
            .await?)
    }

    pub async fn find_by_name(&self, organization_id: &str, name: &str) -> Result<Option<Role>> {
        Ok(self.collection
            .find_one(doc! { "organizationId": organization_id, "name": name })
            .await?)
    }

    pub async fn find_all(&self, organization_id: &str) -> Result<Vec<Role>> {
        let cursor = self.collection
            .find(doc! { "organizationId": organization_id })
            .with_options(FindOptions::builder().sort(doc! { "name": 1 }).build())
            .await?;
        Ok(cursor.try_collect().await?)
    }

    pub async fn update(&self, role: &Role) -> Result<()> {
        self.collection
            .replace_one(doc! { "_id": &role.id, "organizationId": &role.organization_id }, role)
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
