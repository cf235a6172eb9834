//! Persisted session registry and the reaper that clears orphaned rows.

pub mod reaper;
pub mod session_registry;

pub use reaper::RegistryReaper;
pub use session_registry::SessionRegistry;
