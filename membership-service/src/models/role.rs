//! Member roles.
//!
//! The `users` table keeps the club's own spellings (`ADMIN`, `ANGGOTA`,
//! `MAHASISWA_BARU`). [`Role::from_stored`] is the only place raw role
//! strings are interpreted; everything past it compares enum values.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;

/// Closed set of roles. Serialized upper-case (`"ADMIN"`, `"MEMBER"`, `"APPLICANT"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    Admin,
    Member,
    Applicant,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown role: {0}")]
pub struct UnknownRole(pub String);

impl Role {
    pub const ALL: [Role; 3] = [Role::Admin, Role::Member, Role::Applicant];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "ADMIN",
            Role::Member => "MEMBER",
            Role::Applicant => "APPLICANT",
        }
    }

    /// Normalize a role value read from the credential store.
    pub fn from_stored(raw: &str) -> Result<Self, UnknownRole> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "ADMIN" => Ok(Role::Admin),
            "MEMBER" | "ANGGOTA" => Ok(Role::Member),
            "APPLICANT" | "MAHASISWA_BARU" => Ok(Role::Applicant),
            _ => Err(UnknownRole(raw.to_string())),
        }
    }

    /// Spelling written back to the `users` table.
    pub fn as_stored(&self) -> &'static str {
        match self {
            Role::Admin => "ADMIN",
            Role::Member => "ANGGOTA",
            Role::Applicant => "MAHASISWA_BARU",
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Role::Applicant => 0,
            Role::Member => 1,
            Role::Admin => 2,
        }
    }

    /// True when this role is `required` or a superset of it.
    pub fn satisfies(&self, required: Role) -> bool {
        self.rank() >= required.rank()
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::from_stored(s)
    }
}
