//! MongoDB Index Initialization
//!
//! Creates indexes for all collections on application startup. The unique
//! indexes back the 409 responses for duplicate emails, registration codes,
//! site QR tokens and role names.

use mongodb::{Database, IndexModel, bson::{doc, Document}, options::IndexOptions};
use tracing::info;

/// Raw GPS rows older than this are dropped by MongoDB
const GPS_TTL_SECONDS: u64 = 90 * 24 * 60 * 60;

fn index(keys: Document) -> IndexModel {
    IndexModel::builder()
        .keys(keys)
        .options(IndexOptions::builder().background(true).build())
        .build()
}

fn unique_index(keys: Document) -> IndexModel {
    IndexModel::builder()
        .keys(keys)
        .options(IndexOptions::builder().unique(true).background(true).build())
        .build()
}

async fn create(db: &Database, collection: &str, models: Vec<IndexModel>) -> Result<(), mongodb::error::Error> {
    db.collection::<Document>(collection).create_indexes(models).await?;
    info!("Created indexes on {}", collection);
    Ok(())
}

/// Initialize all MongoDB indexes
pub async fn initialize_indexes(db: &Database) -> Result<(), mongodb::error::Error> {
    info!("Initializing MongoDB indexes...");

    create(db, "organizations", vec![unique_index(doc! { "name": 1 })]).await?;

    create(db, "users", vec![
        unique_index(doc! { "email": 1 }),
        index(doc! { "organizationId": 1, "roleId": 1 }),
        index(doc! { "organizationId": 1, "active": 1 }),
    ]).await?;

    create(db, "roles", vec![unique_index(doc! { "organizationId": 1, "name": 1 })]).await?;

    create(db, "registration_tokens", vec![
        unique_index(doc! { "code": 1 }),
        index(doc! { "organizationId": 1, "createdAt": -1 }),
    ]).await?;

    create(db, "sites", vec![
        unique_index(doc! { "qrToken": 1 }),
        index(doc! { "organizationId": 1, "name": 1 }),
    ]).await?;

    create(db, "attendance_records", vec![
        index(doc! { "organizationId": 1, "userId": 1, "recordedAt": -1 }),
        index(doc! { "organizationId": 1, "recordedAt": -1 }),
    ]).await?;

    create(db, "gps_positions", vec![
        index(doc! { "organizationId": 1, "recordedAt": 1 }),
        index(doc! { "organizationId": 1, "userId": 1, "recordedAt": 1 }),
        IndexModel::builder()
            .keys(doc! { "recordedAt": 1 })
            .options(IndexOptions::builder()
                .expire_after(std::time::Duration::from_secs(GPS_TTL_SECONDS))
                .name("recordedAt_ttl".to_string())
                .background(true)
                .build())
            .build(),
    ]).await?;

    create(db, "patrol_routes", vec![index(doc! { "organizationId": 1, "name": 1 })]).await?;

    create(db, "patrols", vec![
        index(doc! { "organizationId": 1, "createdAt": -1 }),
        index(doc! { "organizationId": 1, "routeId": 1, "status": 1 }),
        index(doc! { "organizationId": 1, "guardId": 1 }),
    ]).await?;

    create(db, "incidents", vec![
        index(doc! { "organizationId": 1, "createdAt": -1 }),
        index(doc! { "organizationId": 1, "status": 1, "severity": 1 }),
    ]).await?;

    create(db, "backup_requests", vec![index(doc! { "organizationId": 1, "status": 1, "createdAt": -1 })]).await?;

    info!("MongoDB indexes initialized successfully");
    Ok(())
}
