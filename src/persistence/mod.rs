//! Durable session state: registry file and per-session metadata.

pub mod index_store;
pub mod metadata;

pub use index_store::IndexStore;
