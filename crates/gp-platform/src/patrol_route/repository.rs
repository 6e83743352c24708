//! Patrol Route Repository

use mongodb::{Collection, Database, bson::doc, options::FindOptions};
use futures::TryStreamExt;
use crate::patrol_route::entity::PatrolRoute;
use crate::shared::error::Result;

pub struct PatrolRouteRepository {
    collection: Collection<PatrolRoute>,
}

impl PatrolRouteRepository {
    pub fn new(db: &Database) -> Self {
        Self {
            collection: db.collection("patrol_routes"),
        }
    }

    pub async fn insert(&self, route: &PatrolRoute) -> Result<()> {
        self.collection.insert_one(route).await?;
        Ok(())
    }

    pub async fn find_by_id(&self, organization_id: &str, id: &str) -> Result<Option<PatrolRoute>> {
        Ok(self.collection
            .find_one(doc! { "_id": id, "organizationId": organization_id })
            .await?)
    }

    pub async fn find_all(&self, organization_id: &str, active_only: bool) -> Result<Vec<PatrolRoute>> {
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

    pub async fn update(&self, route: &PatrolRoute) -> Result<()> {
        self.collection
            .replace_one(doc! { "_id": &route.id, "organizationId": &route.organization_id }, route)
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
