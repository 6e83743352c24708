//! User Repository

use chrono::{DateTime, Utc};
use mongodb::{
    Collection, Database,
    bson::{doc, Document},
    options::{FindOptions, ReturnDocument},
};
use futures::TryStreamExt;
use crate::user::entity::User;
use crate::shared::error::Result;

/// Filters for the guard list
#[derive(Debug, Default, Clone)]
pub struct GuardFilter {
    pub active: Option<bool>,
    pub role_id: Option<String>,
    pub department: Option<String>,
}

impl GuardFilter {
    fn to_document(&self, organization_id: &str) -> Document {
        let mut filter = doc! { "organizationId": organization_id };
        if let Some(active) = self.active {
            filter.insert("active", active);
        }
        if let Some(role_id) = &self.role_id {
            filter.insert("roleId", role_id);
        }
        if let Some(department) = &self.department {
            filter.insert("department", department);
        }
        filter
    }
}

pub struct UserRepository {
    collection: Collection<User>,
}

impl UserRepository {
    pub fn new(db: &Database) -> Self {
        Self {
            collection: db.collection("users"),
        }
    }

    pub async fn insert(&self, user: &User) -> Result<()> {
        self.collection.insert_one(user).await?;
        Ok(())
    }

    pub async fn find_by_id(&self, organization_id: &str, id: &str) -> Result<Option<User>> {
        Ok(self.collection
            .find_one(doc! { "_id": id, "organizationId": organization_id })
            .await?)
    }

    /// Login lookup; emails are unique across organizations
    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        Ok(self.collection
            .find_one(doc! { "email": email.trim().to_lowercase() })
            .await?)
    }

    pub async fn exists_by_email(&self, email: &str) -> Result<bool> {
        let count = self.collection
            .count_documents(doc! { "email": email.trim().to_lowercase() })
            .await?;
        Ok(count > 0)
    }

    pub async fn find_filtered(&self, organization_id: &str, filter: &GuardFilter, limit: i64) -> Result<Vec<User>> {
        let options = FindOptions::builder()
            .sort(doc! { "fullName": 1 })
            .limit(limit)
            .build();
        let cursor = self.collection
            .find(filter.to_document(organization_id))
            .with_options(options)
            .await?;
        Ok(cursor.try_collect().await?)
    }

    pub async fn find_by_ids(&self, organization_id: &str, ids: &[String]) -> Result<Vec<User>> {
        if ids.is_empty() {
            return Ok(vec![]);
        }
        let cursor = self.collection
            .find(doc! { "organizationId": organization_id, "_id": { "$in": ids } })
            .await?;
        Ok(cursor.try_collect().await?)
    }

    pub async fn count_by_role(&self, organization_id: &str, role_id: &str) -> Result<u64> {
        Ok(self.collection
            .count_documents(doc! { "organizationId": organization_id, "roleId": role_id })
            .await?)
    }

    pub async fn set_active(&self, organization_id: &str, id: &str, active: bool) -> Result<Option<User>> {
        self.set_fields(organization_id, id, doc! { "active": active }).await
    }

    pub async fn set_role(&self, organization_id: &str, id: &str, role_id: &str) -> Result<Option<User>> {
        self.set_fields(organization_id, id, doc! { "roleId": role_id }).await
    }

    async fn set_fields(&self, organization_id: &str, id: &str, mut fields: Document) -> Result<Option<User>> {
        fields.insert("updatedAt", bson::DateTime::from_chrono(Utc::now()));
        Ok(self.collection
            .find_one_and_update(
                doc! { "_id": id, "organizationId": organization_id },
                doc! { "$set": fields },
            )
            .return_document(ReturnDocument::After)
            .await?)
    }

    pub async fn record_login(&self, id: &str, at: DateTime<Utc>) -> Result<()> {
        self.collection
            .update_one(
                doc! { "_id": id },
                doc! { "$set": { "lastLoginAt": bson::DateTime::from_chrono(at) } },
            )
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guard_filter_document() {
        let filter = GuardFilter {
            active: Some(false),
            role_id: Some("R1".into()),
            department: None,
        };
        let doc = filter.to_document("ORG");
        assert_eq!(doc.get_str("organizationId").unwrap(), "ORG");
        assert!(!doc.get_bool("active").unwrap());
        assert_eq!(doc.get_str("roleId").unwrap(), "R1");
        assert!(!doc.contains_key("department"));
    }
}
