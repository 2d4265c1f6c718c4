//! Identity model - registered club accounts.

use serde::Serialize;
use sqlx::FromRow;
use utoipa::ToSchema;

use super::role::{Role, UnknownRole};

/// Account status. Accounts are never deleted, only deactivated.
///
/// `Pending` is an applicant whose registration is still under review; they
/// sign in to follow it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum IdentityStatus {
    Active,
    Pending,
    Inactive,
}

impl IdentityStatus {
    /// Stored spellings are `AKTIF` and `PENDING`; anything else is inactive.
    pub fn from_stored(raw: &str) -> Self {
        match raw.trim().to_ascii_uppercase().as_str() {
            "ACTIVE" | "AKTIF" => IdentityStatus::Active,
            "PENDING" => IdentityStatus::Pending,
            _ => IdentityStatus::Inactive,
        }
    }

    pub fn as_stored(&self) -> &'static str {
        match self {
            IdentityStatus::Active => "AKTIF",
            IdentityStatus::Pending => "PENDING",
            IdentityStatus::Inactive => "NONAKTIF",
        }
    }
}

/// Identity entity with its credential hash.
#[derive(Debug, Clone)]
pub struct Identity {
    pub id: String,
    pub email: String,
    pub display_name: String,
    pub role: Role,
    pub status: IdentityStatus,
    pub credential_hash: String,
    pub nim: Option<String>,
}

impl Identity {
    pub fn can_sign_in(&self) -> bool {
        matches!(
            self.status,
            IdentityStatus::Active | IdentityStatus::Pending
        )
    }

    /// Public projection, safe to return to clients.
    pub fn profile(&self) -> IdentityProfile {
        IdentityProfile {
            id: self.id.clone(),
            email: self.email.clone(),
            display_name: self.display_name.clone(),
            role: self.role,
            nim: self.nim.clone(),
        }
    }
}

/// Identity without credential material.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct IdentityProfile {
    #[schema(example = "clx0a1b2c0000abcd")]
    pub id: String,
    #[schema(example = "anggota@mapala.ac.id")]
    pub email: String,
    #[schema(example = "Ahmad Rizki")]
    pub display_name: String,
    pub role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nim: Option<String>,
}

/// Raw `users` row as stored; converted into [`Identity`] at the store boundary.
#[derive(Debug, Clone, FromRow)]
pub struct IdentityRow {
    pub id: String,
    pub email: String,
    pub name: Option<String>,
    pub role: String,
    pub status: String,
    pub password_hash: String,
    pub nim: Option<String>,
}

impl TryFrom<IdentityRow> for Identity {
    type Error = UnknownRole;

    fn try_from(row: IdentityRow) -> Result<Self, Self::Error> {
        let role = Role::from_stored(&row.role)?;
        Ok(Identity {
            display_name: row.name.unwrap_or_else(|| row.email.clone()),
            id: row.id,
            email: row.email,
            role,
            status: IdentityStatus::from_stored(&row.status),
            credential_hash: row.password_hash,
            nim: row.nim,
        })
    }
}

impl From<Identity> for IdentityRow {
    fn from(identity: Identity) -> Self {
        IdentityRow {
            id: identity.id,
            email: identity.email,
            name: Some(identity.display_name),
            role: identity.role.as_stored().to_string(),
            status: identity.status.as_stored().to_string(),
            password_hash: identity.credential_hash,
            nim: identity.nim,
        }
    }
}
