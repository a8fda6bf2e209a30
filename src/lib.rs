//! # Cheis
//!
//! A citation and sample-data registry server, usable both as a standalone
//! binary and as a library.
//!
//! ## Library Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use cheis::config::ServerConfig;
//! use cheis::server::{AppState, create_router};
//! use cheis::store::{SqliteStore, Store};
//!
//! let config = ServerConfig::default();
//! let store = SqliteStore::new(config.db_path()).unwrap();
//! store.initialize().unwrap();
//!
//! let state = Arc::new(AppState::new(Arc::new(store), &config));
//! let router = create_router(state);
//! // Serve with axum...
//! ```
//!
//! ## Feature Flags
//!
//! - `cli` (default): Builds the `cheis` binary. Disable with `default-features = false`.

pub mod auth;
pub mod catalog;
pub mod config;
pub mod error;
pub mod server;
pub mod store;
pub mod types;
