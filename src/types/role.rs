use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Authorization role. Each role carries an explicit rank and roles compare
/// by rank only, so inserting a new role never reorders the existing ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Deactivated,
    Unverified,
    Verified,
    Moderator,
    Admin,
}

impl Role {
    pub const ALL: [Role; 5] = [
        Role::Deactivated,
        Role::Unverified,
        Role::Verified,
        Role::Moderator,
        Role::Admin,
    ];

    /// Rank stored in the `auth_level` column.
    #[must_use]
    pub const fn rank(self) -> i64 {
        match self {
            Role::Deactivated => 1,
            Role::Unverified => 2,
            Role::Verified => 3,
            Role::Moderator => 20,
            Role::Admin => 50,
        }
    }

    pub fn from_rank(rank: i64) -> Result<Role> {
        Self::ALL
            .into_iter()
            .find(|role| role.rank() == rank)
            .ok_or(Error::InvalidRole(rank))
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Role::Deactivated => "deactivated",
            Role::Unverified => "unverified",
            Role::Verified => "verified",
            Role::Moderator => "moderator",
            Role::Admin => "admin",
        }
    }

    /// Human readable label used in role pickers.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Role::Deactivated => "Deactivated User",
            Role::Unverified => "Unverified User",
            Role::Verified => "Verified User",
            Role::Moderator => "Moderator",
            Role::Admin => "Administrator",
        }
    }
}

impl PartialOrd for Role {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Role {
    fn cmp(&self, other: &Self) -> Ordering {
        self.rank().cmp(&other.rank())
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<Role> for i64 {
    fn from(role: Role) -> Self {
        role.rank()
    }
}

impl TryFrom<i64> for Role {
    type Error = Error;

    fn try_from(rank: i64) -> Result<Self> {
        Role::from_rank(rank)
    }
}

/// Which ceiling applies when one user changes another user's role.
///
/// The role change route itself requires an administrator, whose ceiling is
/// `Admin` under either variant. The policy only restricts anything once that
/// route is opened to a lower role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RoleChangePolicy {
    /// The acting user's own role is the ceiling for both the granted role
    /// and the target's current role.
    #[default]
    ActorRank,
    /// The fixed admin role is the ceiling.
    AdminThreshold,
}

impl RoleChangePolicy {
    #[must_use]
    pub fn ceiling(self, actor: Role) -> Role {
        match self {
            RoleChangePolicy::ActorRank => actor,
            RoleChangePolicy::AdminThreshold => Role::Admin,
        }
    }
}
