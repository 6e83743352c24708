//! Development Data Seeder
//!
//! Seeds a demo organization on startup when dev mode is on. Running it
//! again against a seeded database does nothing.
//!
//! Default credentials:
//!   Admin: admin@guardpost.local / DevPassword123
//!   Guard: guard@guardpost.local / DevPassword123

use mongodb::Database;
use tracing::info;

use crate::auth::password_service::{Argon2Config, PasswordPolicy, PasswordService};
use crate::geo::Coordinates;
use crate::organization::{Organization, OrganizationRepository};
use crate::patrol_route::{PatrolRoute, PatrolRouteRepository};
use crate::registration_token::{RegistrationToken, RegistrationTokenRepository, TokenKind};
use crate::role::entity::builtin;
use crate::role::{Role, RoleRepository};
use crate::site::{Site, SiteRepository};
use crate::user::{User, UserRepository};
use crate::shared::error::{PlatformError, Result};

const DEV_ORGANIZATION: &str = "Guardpost Demo";
const DEV_PASSWORD: &str = "DevPassword123";

pub struct DevDataSeeder {
    db: Database,
    password_service: PasswordService,
}

impl DevDataSeeder {
    pub fn new(db: Database) -> Result<Self> {
        let password_service = PasswordService::new(Argon2Config::testing(), PasswordPolicy::default())?;
        Ok(Self { db, password_service })
    }

    pub async fn seed(&self) -> Result<()> {
        let organization_repo = OrganizationRepository::new(&self.db);
        if organization_repo.find_by_name(DEV_ORGANIZATION).await?.is_some() {
            info!("Development data already present, skipping seed");
            return Ok(());
        }

        info!("=== DEV DATA SEEDER ===");

        let organization = Organization::new(DEV_ORGANIZATION).with_contact_email("ops@guardpost.local");
        organization_repo.insert(&organization).await?;

        let roles = Role::built_in_defaults(&organization.id);
        RoleRepository::new(&self.db).insert_many(&roles).await?;
        let role_id = |name: &str| {
            roles.iter()
                .find(|r| r.name == name)
                .map(|r| r.id.clone())
                .ok_or_else(|| PlatformError::internal(format!("built-in role {} missing", name)))
        };

        let users = UserRepository::new(&self.db);
        let password_hash = self.password_service.hash_password(DEV_PASSWORD)?;
        users.insert(
            &User::new(&organization.id, role_id(builtin::ADMIN)?, "admin@guardpost.local", "Demo Admin")
                .with_password_hash(password_hash.clone()),
        ).await?;
        users.insert(
            &User::new(&organization.id, role_id(builtin::GUARD)?, "guard@guardpost.local", "Demo Guard")
                .with_password_hash(password_hash)
                .with_department(Some("Night shift".to_string())),
        ).await?;

        let site = Site::new(&organization.id, "Head Office")
            .with_location(Coordinates::new(51.5074, -0.1278)?, Some(150.0));
        SiteRepository::new(&self.db).insert(&site).await?;

        let route = PatrolRoute::new(
            &organization.id,
            "Perimeter",
            vec!["Main gate".into(), "Loading dock".into(), "Car park".into(), "Roof access".into()],
        )
        .with_description(Some("Outer loop of the head office".to_string()));
        PatrolRouteRepository::new(&self.db).insert(&route).await?;

        let token = RegistrationToken::new(&organization.id, TokenKind::Code, role_id(builtin::GUARD)?)
            .with_max_uses(Some(10))
            .expiring_in(24 * 30)?;
        RegistrationTokenRepository::new(&self.db).insert(&token).await?;

        info!(organization_id = %organization.id, "Seeded organization {}", DEV_ORGANIZATION);
        info!("  Admin: admin@guardpost.local / {}", DEV_PASSWORD);
        info!("  Guard: guard@guardpost.local / {}", DEV_PASSWORD);
        info!("  Site QR token: {}", site.qr_token);
        info!("  Guard signup code: {}", token.code);
        info!("=======================");

        Ok(())
    }
}
