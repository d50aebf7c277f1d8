//! # Taskhive
//!
//! A group task server, usable both as a standalone binary and as a library.
//! Users form groups through invite codes, grant admin roles, and attach
//! notes to tasks; every mutation is gated by membership, admin, and
//! ownership checks, and removals cascade so no orphaned rows survive.
//!
//! ## Library Usage
//!
//! ```toml
//! [dependencies]
//! taskhive = { version = "0.1", default-features = false }
//! ```
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use std::path::PathBuf;
//! use taskhive::server::{AppState, create_router};
//! use taskhive::store::{SqliteStore, Store};
//!
//! let store = SqliteStore::new(&PathBuf::from("./data/taskhive.db")).unwrap();
//! store.initialize().unwrap();
//!
//! let state = Arc::new(AppState::new(Arc::new(store)));
//! let router = create_router(state);
//! // Serve with axum...
//! ```
//!
//! ## Feature Flags
//!
//! - `cli` (default): builds the `taskhive` binary and its interactive
//!   prompts. Disable with `default-features = false` for library use.

pub mod auth;
pub mod config;
pub mod error;
pub mod server;
pub mod store;
pub mod types;
