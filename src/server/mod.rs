mod admin;
mod dm;
pub mod dto;
pub mod response;
mod router;
mod search;
mod user;
pub mod validation;

pub use router::{AppState, create_router};
