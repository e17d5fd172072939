// Shared pieces of the statekeeper workspace:
// - Configuration loading (file + environment)
// - Shared error types

// Export config module - Configuration loading
pub mod config;
pub use config::*;

// Export errors module - Shared error types
pub mod errors;
pub use errors::*;
