//! Session store implementations

mod file;
mod in_memory;

pub use file::{FileSessionStore, SESSION_FILE_PREFIX};
pub use in_memory::InMemorySessionStore;
