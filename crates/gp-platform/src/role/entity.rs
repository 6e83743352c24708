//! Role and Permission Entities

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use chrono::{DateTime, Utc};
use bson::serde_helpers::chrono_datetime_as_bson_datetime;
use std::collections::BTreeMap;

/// Grants every action on every resource
pub const WILDCARD: &str = "*";

/// Built-in role names seeded for every organization
pub mod builtin {
    pub const ADMIN: &str = "admin";
    pub const SUPERVISOR: &str = "supervisor";
    pub const GUARD: &str = "guard";
}

/// Permission set of a role.
///
/// Stored either as the string `"*"` or as a map `resource -> [action]`.
/// An action list may itself contain `"*"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Permissions {
    All,
    Scoped(BTreeMap<String, Vec<String>>),
}

impl Permissions {
    pub fn none() -> Self {
        Self::Scoped(BTreeMap::new())
    }

    pub fn scoped<R, A>(entries: impl IntoIterator<Item = (R, Vec<A>)>) -> Self
    where
        R: Into<String>,
        A: Into<String>,
    {
        Self::Scoped(
            entries
                .into_iter()
                .map(|(r, actions)| (r.into(), actions.into_iter().map(Into::into).collect()))
                .collect(),
        )
    }

    /// Whether `action` on `resource` is granted
    pub fn allows(&self, resource: &str, action: &str) -> bool {
        match self {
            Permissions::All => true,
            Permissions::Scoped(map) => [resource, WILDCARD]
                .iter()
                .filter_map(|r| map.get(*r))
                .any(|actions| actions.iter().any(|a| a == action || a == WILDCARD)),
        }
    }

    /// Effective map with wildcards expanded against the known catalog
    pub fn effective(&self) -> BTreeMap<String, Vec<String>> {
        catalog()
            .iter()
            .filter_map(|(resource, actions)| {
                let granted: Vec<String> = actions
                    .iter()
                    .filter(|a| self.allows(resource, a))
                    .map(|a| a.to_string())
                    .collect();
                (!granted.is_empty()).then(|| (resource.to_string(), granted))
            })
            .collect()
    }

    /// Reject resources or actions outside the catalog
    pub fn validate(&self) -> std::result::Result<(), String> {
        let Permissions::Scoped(map) = self else {
            return Ok(());
        };
        for (resource, actions) in map {
            if resource == WILDCARD {
                continue;
            }
            let Some((_, known)) = catalog().iter().find(|(r, _)| *r == resource.as_str()) else {
                return Err(format!("Unknown permission resource: {}", resource));
            };
            if let Some(bad) = actions.iter().find(|a| *a != WILDCARD && !known.contains(&a.as_str())) {
                return Err(format!("Unknown action {} for resource {}", bad, resource));
            }
        }
        Ok(())
    }
}

/// Resources and the actions that exist on them
pub fn catalog() -> &'static [(&'static str, &'static [&'static str])] {
    &[
        ("organization", &["read", "update"]),
        ("roles", &["read", "create", "update", "delete"]),
        ("guards", &["read", "update"]),
        ("registration_tokens", &["read", "create", "revoke"]),
        ("sites", &["read", "create", "update", "delete"]),
        ("attendance", &["read", "create"]),
        ("gps", &["read", "create"]),
        ("patrol_routes", &["read", "create", "update", "delete"]),
        ("patrols", &["read", "create", "update"]),
        ("incidents", &["read", "create", "update"]),
        ("backup_requests", &["read", "create", "update"]),
    ]
}

impl Serialize for Permissions {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Permissions::All => serializer.serialize_str(WILDCARD),
            Permissions::Scoped(map) => map.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for Permissions {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Wildcard(String),
            Map(BTreeMap<String, Vec<String>>),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Wildcard(s) if s == WILDCARD => Ok(Permissions::All),
            Raw::Wildcard(s) => Err(serde::de::Error::custom(format!(
                "permissions must be \"*\" or a map, got {:?}",
                s
            ))),
            Raw::Map(map) => Ok(Permissions::Scoped(map)),
        }
    }
}

/// Role definition, unique by name within an organization
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Role {
    #[serde(rename = "_id")]
    pub id: String,

    pub organization_id: String,

    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub description: Option<String>,

    pub permissions: Permissions,

    /// Seeded roles cannot be modified or deleted
    #[serde(default)]
    pub built_in: bool,

    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,

    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

impl Role {
    pub fn new(organization_id: impl Into<String>, name: impl Into<String>, permissions: Permissions) -> Self {
        let now = Utc::now();
        Self {
            id: crate::TsidGenerator::generate(),
            organization_id: organization_id.into(),
            name: name.into(),
            description: None,
            permissions,
            built_in: false,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    fn built_in(mut self) -> Self {
        self.built_in = true;
        self
    }

    pub fn can_modify(&self) -> bool {
        !self.built_in
    }

    /// The admin / supervisor / guard roles every organization starts with
    pub fn built_in_defaults(organization_id: &str) -> Vec<Role> {
        let supervisor = Permissions::scoped([
            ("organization", vec!["read"]),
            ("guards", vec!["read", "update"]),
            ("registration_tokens", vec!["read", "create", "revoke"]),
            ("sites", vec!["read"]),
            ("attendance", vec!["read", "create"]),
            ("gps", vec!["read", "create"]),
            ("patrol_routes", vec!["*"]),
            ("patrols", vec!["*"]),
            ("incidents", vec!["*"]),
            ("backup_requests", vec!["*"]),
        ]);
        let guard = Permissions::scoped([
            ("attendance", vec!["read", "create"]),
            ("gps", vec!["create"]),
            ("patrols", vec!["read", "update"]),
            ("incidents", vec!["read", "create"]),
            ("backup_requests", vec!["create"]),
        ]);

        vec![
            Role::new(organization_id, builtin::ADMIN, Permissions::All)
                .with_description("Full access to the organization")
                .built_in(),
            Role::new(organization_id, builtin::SUPERVISOR, supervisor)
                .with_description("Runs shifts, patrols and incident response")
                .built_in(),
            Role::new(organization_id, builtin::GUARD, guard)
                .with_description("Field guard")
                .built_in(),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wildcard_allows_everything() {
        assert!(Permissions::All.allows("patrols", "delete"));
        assert!(Permissions::All.allows("anything", "at-all"));
    }

    #[test]
    fn test_scoped_permissions() {
        let perms = Permissions::scoped([
            ("patrols", vec!["read"]),
            ("incidents", vec!["*"]),
        ]);
        assert!(perms.allows("patrols", "read"));
        assert!(!perms.allows("patrols", "update"));
        assert!(perms.allows("incidents", "update"));
        assert!(!perms.allows("sites", "read"));

        let all_read = Permissions::scoped([("*", vec!["read"])]);
        assert!(all_read.allows("sites", "read"));
        assert!(!all_read.allows("sites", "delete"));
    }

    #[test]
    fn test_effective_expands_wildcards() {
        let perms = Permissions::scoped([("incidents", vec!["*"])]);
        let effective = perms.effective();
        assert_eq!(effective.len(), 1);
        assert_eq!(effective["incidents"], vec!["read", "create", "update"]);

        let full = Permissions::All.effective();
        assert_eq!(full.len(), catalog().len());
    }

    #[test]
    fn test_serde_forms() {
        let json = serde_json::to_string(&Permissions::All).unwrap();
        assert_eq!(json, "\"*\"");
        let back: Permissions = serde_json::from_str("\"*\"").unwrap();
        assert_eq!(back, Permissions::All);

        let map: Permissions = serde_json::from_str(r#"{"patrols":["read","update"]}"#).unwrap();
        assert!(map.allows("patrols", "update"));

        assert!(serde_json::from_str::<Permissions>("\"admin\"").is_err());
    }

    #[test]
    fn test_validate_against_catalog() {
        assert!(Permissions::All.validate().is_ok());
        assert!(Permissions::scoped([("patrols", vec!["read", "*"])]).validate().is_ok());
        assert!(Permissions::scoped([("*", vec!["read"])]).validate().is_ok());
        assert!(Permissions::scoped([("payroll", vec!["read"])]).validate().is_err());
        assert!(Permissions::scoped([("patrols", vec!["launch"])]).validate().is_err());
    }

    #[test]
    fn test_built_in_defaults() {
        let roles = Role::built_in_defaults("ORG1");
        let names: Vec<&str> = roles.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["admin", "supervisor", "guard"]);
        assert!(roles.iter().all(|r| r.built_in && !r.can_modify()));
        assert!(roles.iter().all(|r| r.permissions.validate().is_ok()));
        assert_eq!(roles[0].permissions, Permissions::All);
    }

    #[test]
    fn test_role_bson_round_trip() {
        let role = Role::built_in_defaults("ORG1").remove(1);
        let doc = bson::to_document(&role).unwrap();
        assert!(doc.get_document("permissions").is_ok());
        let back: Role = bson::from_document(doc).unwrap();
        assert_eq!(back.permissions, role.permissions);
    }
}
