//! Session management for statekeeper
//!
//! This crate provides per-visitor key/value sessions addressed by an opaque
//! identifier. It defines a `SessionStore` trait with a file-backed
//! implementation (one JSON file per session, expired by modification time)
//! and an in-memory one.

pub mod adapters;
pub mod id;
pub mod policy;
pub mod store;

pub use adapters::{FileSessionStore, InMemorySessionStore};
pub use id::{generate_session_id, is_valid_session_id, resolve_session_id, ResolvedId};
pub use policy::{destroy_or_log, load_or_empty, save_or_log};
pub use store::{SessionData, SessionError, SessionInfo, SessionResult, SessionStore};
