//! Member records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One tenant-scoped row of the root table.
///
/// The lifecycle engine never creates or edits members directly; it only
/// copies them and rewrites their identity columns during structural changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberRecord {
    /// Organization identity.
    pub organization: String,
    /// Sub-unit identity.
    pub subunit: String,
    /// Member id.
    pub id: Uuid,
    /// Given name.
    pub first_name: String,
    /// Family name.
    pub last_name: String,
    /// Login name, unique within a sub-unit.
    pub username: String,
    /// Stored credential. Hashing happens outside this crate.
    pub password: String,
    /// Creation time.
    pub create_at: DateTime<Utc>,
    /// Last update time.
    pub update_at: Option<DateTime<Utc>>,
    /// Soft-delete time.
    pub delete_at: Option<DateTime<Utc>>,
    /// Role within the tenant.
    pub role: String,
}

impl MemberRecord {
    /// Creates a member with a fresh id and the given identity.
    pub fn new(
        organization: impl Into<String>,
        subunit: impl Into<String>,
        username: impl Into<String>,
    ) -> Self {
        Self {
            organization: organization.into(),
            subunit: subunit.into(),
            id: Uuid::new_v4(),
            first_name: String::new(),
            last_name: String::new(),
            username: username.into(),
            password: String::new(),
            create_at: Utc::now(),
            update_at: None,
            delete_at: None,
            role: "member".to_string(),
        }
    }

    /// Sets the member's names.
    pub fn with_name(mut self, first: impl Into<String>, last: impl Into<String>) -> Self {
        self.first_name = first.into();
        self.last_name = last.into();
        self
    }

    /// Sets the member's role.
    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = role.into();
        self
    }

    /// Sets the stored credential.
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = password.into();
        self
    }

    /// Returns a copy carrying a different identity.
    pub fn with_identity(&self, organization: &str, subunit: &str) -> Self {
        Self {
            organization: organization.to_string(),
            subunit: subunit.to_string(),
            ..self.clone()
        }
    }

    /// Overwrites the columns an upsert replaces, keeping id and key columns.
    pub fn overwrite_from(&mut self, incoming: &MemberRecord) {
        self.first_name = incoming.first_name.clone();
        self.last_name = incoming.last_name.clone();
        self.password = incoming.password.clone();
        self.create_at = incoming.create_at;
        self.update_at = incoming.update_at;
        self.delete_at = incoming.delete_at;
        self.role = incoming.role.clone();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_member_defaults() {
        let member = MemberRecord::new("acme", "north", "jdoe");
        assert_eq!(member.organization, "acme");
        assert_eq!(member.subunit, "north");
        assert_eq!(member.username, "jdoe");
        assert_eq!(member.role, "member");
        assert!(member.delete_at.is_none());
    }

    #[test]
    fn test_with_identity_keeps_id() {
        let member = MemberRecord::new("acme", "north", "jdoe").with_role("admin");
        let moved = member.with_identity("globex", "hq");
        assert_eq!(moved.id, member.id);
        assert_eq!(moved.organization, "globex");
        assert_eq!(moved.subunit, "hq");
        assert_eq!(moved.role, "admin");
    }

    #[test]
    fn test_overwrite_keeps_key_columns() {
        let mut existing = MemberRecord::new("acme", "north", "jdoe").with_role("member");
        let incoming = MemberRecord::new("acme", "north", "jdoe")
            .with_role("admin")
            .with_password("x");
        let id = existing.id;

        existing.overwrite_from(&incoming);
        assert_eq!(existing.id, id);
        assert_eq!(existing.role, "admin");
        assert_eq!(existing.password, "x");
    }
}
