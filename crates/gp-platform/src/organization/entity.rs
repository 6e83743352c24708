//! Organization Entity

use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use bson::serde_helpers::chrono_datetime_as_bson_datetime;

fn default_timezone() -> String {
    "UTC".to_string()
}

/// A security company using the platform
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Organization {
    /// TSID as Crockford Base32 string
    #[serde(rename = "_id")]
    pub id: String,

    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub contact_email: Option<String>,

    /// IANA zone name used by clients for shift display
    #[serde(default = "default_timezone")]
    pub timezone: String,

    pub active: bool,

    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,

    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

impl Organization {
    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: crate::TsidGenerator::generate(),
            name: name.into(),
            contact_email: None,
            timezone: default_timezone(),
            active: true,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_contact_email(mut self, email: impl Into<String>) -> Self {
        self.contact_email = Some(email.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_organization() {
        let org = Organization::new("Acme Security").with_contact_email("ops@acme.test");
        assert_eq!(org.id.len(), 13);
        assert_eq!(org.timezone, "UTC");
        assert!(org.active);
        assert_eq!(org.contact_email.as_deref(), Some("ops@acme.test"));
    }

    #[test]
    fn test_bson_shape() {
        let org = Organization::new("Acme Security");
        let doc = bson::to_document(&org).unwrap();
        assert_eq!(doc.get_str("_id").unwrap(), org.id);
        assert!(doc.get_datetime("createdAt").is_ok());
        assert!(!doc.contains_key("contactEmail"));

        let back: Organization = bson::from_document(doc).unwrap();
        assert_eq!(back.name, "Acme Security");
    }
}
