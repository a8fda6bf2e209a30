pub mod gate;
mod middleware;
mod password;
mod token;

pub use gate::{Denial, Principal};
pub use middleware::{RequestContext, RequireAdmin, RequireLogin, RequireModerator, RequireVerified};
pub use password::{hash_password, verify_password};
pub use token::{IssuedToken, TokenGenerator, generate_signup_key, token_lookup};

use crate::error::Result;
use crate::store::{SIGNUP_KEY, Store};

/// Replaces the signup key; the previous key stops granting verification.
pub fn rotate_signup_key(store: &dyn Store) -> Result<String> {
    let key = store.set_attr(SIGNUP_KEY, &generate_signup_key())?;
    tracing::info!("Signup key rotated");
    Ok(key)
}
