//! Authentication and authorization module
//!
//! Provides JWT-based identity and the roles used for BHAP administration.

mod extract;
mod jwt;
mod password;

pub use extract::{CurrentUser, MaybeUser};
pub use jwt::{create_tokens, decode_token, refresh_tokens, TokenPair};
pub use password::{hash_password, verify_password};

use crate::bhap::BhapError;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// User roles for authorization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Can author, discuss and vote on BHAPs
    Member,
    /// Can also move any BHAP between statuses
    Admin,
}

impl Role {
    pub fn can_administer(&self) -> bool {
        matches!(self, Role::Admin)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Member => "member",
            Role::Admin => "admin",
        }
    }
}

impl Default for Role {
    fn default() -> Self {
        Role::Member
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = BhapError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "member" => Ok(Role::Member),
            "admin" => Ok(Role::Admin),
            other => Err(BhapError::Storage(format!("Unknown role {:?}", other))),
        }
    }
}

/// The authenticated user behind a request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Identity {
    pub user_id: i64,
    pub role: Role,
}
