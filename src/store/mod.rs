pub mod ledger;
pub mod query;
mod record;
mod schema;
mod sqlite;

pub use ledger::{Change, Deletion, Diff};
pub use query::{Arg, Column, Filter, Order, Query, Selection, Table};
pub use record::{Record, Row, StoreExt};
pub use sqlite::SqliteStore;

use crate::error::Result;
use crate::types::*;

/// Attrs key holding the current signup key.
pub const SIGNUP_KEY: &str = "signup_key";

/// Store defines the database interface.
///
/// Every mutating operation runs in a single transaction together with the
/// ledger rows it produces. `actor` is the user performing the operation and
/// is recorded as the author of those ledger rows.
pub trait Store: Send + Sync {
    fn initialize(&self) -> Result<()>;

    // Generic reads
    fn select(&self, query: &Query) -> Result<Vec<Row>>;

    // Attribute operations
    fn get_attr(&self, key: &str) -> Result<Option<String>>;
    fn set_attr(&self, key: &str, value: &str) -> Result<String>;

    // User operations
    fn create_user(&self, user: &NewUser, role: Role) -> Result<User>;
    fn signup_user(&self, user: &NewUser, signup_key: Option<&str>) -> Result<User>;
    fn update_user_role(&self, actor: &User, user_id: i64, role: Role) -> Result<Diff>;
    fn update_password(&self, actor: &User, user_id: i64, password_hash: &str) -> Result<()>;
    fn has_admin(&self) -> Result<bool>;

    // Citation operations
    fn create_citation(&self, actor: &User, citation: &NewCitation) -> Result<Citation>;
    fn update_citation(&self, actor: &User, id: i64, patch: &CitationPatch) -> Result<Diff>;
    fn delete_citation(&self, actor: &User, id: i64) -> Result<Deletion>;

    // Data operations
    fn create_data(&self, actor: &User, rows: &[NewData]) -> Result<Vec<Data>>;
    fn update_data(&self, actor: &User, id: i64, patch: &DataPatch) -> Result<Diff>;
    fn delete_data(&self, actor: &User, id: i64) -> Result<Deletion>;

    // Session operations
    fn create_session(&self, session: &Session) -> Result<()>;
    fn get_session_by_lookup(&self, lookup: &str) -> Result<Option<Session>>;
    fn delete_session(&self, id: &str) -> Result<bool>;
    fn update_session_last_used(&self, id: &str) -> Result<()>;
}
