//! Role-based authorization checks.
//!
//! Checks are plain functions over a [`Principal`] so handlers and
//! extractors share one implementation. A failed check yields a [`Denial`]
//! carrying the user-facing messages.

use crate::types::{Role, RoleChangePolicy, User};

pub const LOGIN_REQUIRED: &str = "You must be logged in to view this page";
pub const DEACTIVATED: &str = "This account has been deactivated";
pub const UNVERIFIED: &str = "This account has not yet been verified by a moderator";
pub const NOT_AUTHORISED: &str = "You are not authorised to view this page";
pub const NOT_OWNER: &str = "You are not authorised to edit data created by someone else";
pub const ROLE_ABOVE_OWN: &str = "You cannot promote someone to a role above your own.";
pub const TARGET_ABOVE_OWN: &str =
    "You cannot change the user role for someone with a higher role than your own.";

/// The caller of a request.
#[derive(Debug, Clone, Default)]
pub enum Principal {
    #[default]
    Anonymous,
    User(User),
}

impl Principal {
    /// Anonymous callers rank below every role.
    #[must_use]
    pub fn rank(&self) -> i64 {
        match self {
            Principal::Anonymous => 0,
            Principal::User(user) => user.role.rank(),
        }
    }

    #[must_use]
    pub fn user(&self) -> Option<&User> {
        match self {
            Principal::Anonymous => None,
            Principal::User(user) => Some(user),
        }
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        matches!(self, Principal::User(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Denial {
    pub messages: Vec<&'static str>,
}

impl Denial {
    fn new(messages: Vec<&'static str>) -> Self {
        Self { messages }
    }
}

/// Grants access iff the principal is signed in with at least `required`.
pub fn require(principal: &Principal, required: Role) -> Result<&User, Denial> {
    let Principal::User(user) = principal else {
        return Err(Denial::new(vec![LOGIN_REQUIRED]));
    };

    if user.role >= required {
        return Ok(user);
    }

    let messages = match user.role {
        Role::Deactivated => vec![DEACTIVATED, NOT_AUTHORISED],
        Role::Unverified => vec![UNVERIFIED, NOT_AUTHORISED],
        _ => vec![NOT_AUTHORISED],
    };
    Err(Denial::new(messages))
}

/// Below moderator, users may only mutate records they created.
pub fn check_owner(user: &User, creator_id: i64) -> Result<(), Denial> {
    if user.role >= Role::Moderator || user.id == creator_id {
        Ok(())
    } else {
        Err(Denial::new(vec![NOT_OWNER]))
    }
}

pub fn check_role_change(
    policy: RoleChangePolicy,
    actor: &User,
    target: &User,
    role: Role,
) -> Result<(), Denial> {
    let ceiling = policy.ceiling(actor.role);
    if role > ceiling {
        return Err(Denial::new(vec![ROLE_ABOVE_OWN]));
    }
    if target.role > ceiling {
        return Err(Denial::new(vec![TARGET_ABOVE_OWN]));
    }
    Ok(())
}
