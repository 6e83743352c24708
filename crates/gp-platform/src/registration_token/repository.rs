//! Registration Token Repository

use chrono::{DateTime, Utc};
use mongodb::{
    Collection, Database,
    bson::{doc, Document},
    options::{FindOptions, ReturnDocument},
};
use futures::TryStreamExt;
use crate::registration_token::entity::RegistrationToken;
use crate::shared::error::Result;

pub struct RegistrationTokenRepository {
    collection: Collection<RegistrationToken>,
}

/// Matches a token that is active, unexpired at `now` and below its usage cap
fn consumable_filter(id: &str, now: DateTime<Utc>) -> Document {
    doc! {
        "_id": id,
        "active": true,
        "$and": [
            { "$or": [
                { "expiresAt": null },
                { "expiresAt": { "$gt": bson::DateTime::from_chrono(now) } }
            ] },
            { "$or": [
                { "maxUses": null },
                { "$expr": { "$lt": ["$usedCount", "$maxUses"] } }
            ] }
        ]
    }
}

/// Matches a token with at least one recorded use
fn releasable_filter(id: &str) -> Document {
    doc! { "_id": id, "usedCount": { "$gt": 0_i64 } }
}

impl RegistrationTokenRepository {
    pub fn new(db: &Database) -> Self {
        Self {
            collection: db.collection("registration_tokens"),
        }
    }

    pub async fn insert(&self, token: &RegistrationToken) -> Result<()> {
        self.collection.insert_one(token).await?;
        Ok(())
    }

    pub async fn find_by_id(&self, organization_id: &str, id: &str) -> Result<Option<RegistrationToken>> {
        Ok(self.collection
            .find_one(doc! { "_id": id, "organizationId": organization_id })
            .await?)
    }

    /// Public lookup by the presented secret
    pub async fn find_by_code(&self, code: &str) -> Result<Option<RegistrationToken>> {
        Ok(self.collection.find_one(doc! { "code": code }).await?)
    }

    pub async fn find_all(&self, organization_id: &str, limit: i64) -> Result<Vec<RegistrationToken>> {
        let options = FindOptions::builder()
            .sort(doc! { "createdAt": -1 })
            .limit(limit)
            .build();
        let cursor = self.collection
            .find(doc! { "organizationId": organization_id })
            .with_options(options)
            .await?;
        Ok(cursor.try_collect().await?)
    }

    pub async fn revoke(&self, organization_id: &str, id: &str) -> Result<Option<RegistrationToken>> {
        Ok(self.collection
            .find_one_and_update(
                doc! { "_id": id, "organizationId": organization_id },
                doc! { "$set": {
                    "active": false,
                    "updatedAt": bson::DateTime::from_chrono(Utc::now())
                } },
            )
            .return_document(ReturnDocument::After)
            .await?)
    }

    /// Atomically take one use of the token.
    ///
    /// Returns None when the token stopped being usable between lookup and
    /// consumption (revoked, expired or exhausted by a concurrent signup).
    pub async fn consume(&self, id: &str, now: DateTime<Utc>) -> Result<Option<RegistrationToken>> {
        Ok(self.collection
            .find_one_and_update(
                consumable_filter(id, now),
                doc! {
                    "$inc": { "usedCount": 1_i64 },
                    "$set": { "updatedAt": bson::DateTime::from_chrono(now) }
                },
            )
            .return_document(ReturnDocument::After)
            .await?)
    }

    /// Give back a use taken by [`consume`](Self::consume) when the signup
    /// that took it did not go through
    pub async fn release(&self, id: &str, now: DateTime<Utc>) -> Result<()> {
        self.collection
            .update_one(
                releasable_filter(id),
                doc! {
                    "$inc": { "usedCount": -1_i64 },
                    "$set": { "updatedAt": bson::DateTime::from_chrono(now) }
                },
            )
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_consumable_filter_shape() {
        let filter = consumable_filter("TOKEN1", Utc::now());
        assert_eq!(filter.get_str("_id").unwrap(), "TOKEN1");
        assert!(filter.get_bool("active").unwrap());
        let clauses = filter.get_array("$and").unwrap();
        assert_eq!(clauses.len(), 2);
    }

    #[test]
    fn test_release_never_goes_below_zero() {
        let filter = releasable_filter("TOKEN1");
        assert_eq!(filter.get_str("_id").unwrap(), "TOKEN1");
        assert_eq!(filter.get_document("usedCount").unwrap().get_i64("$gt").unwrap(), 0);
    }
}
