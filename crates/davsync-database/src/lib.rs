//! # davsync-database
//!
//! The metadata store. [`store`] defines one trait per table family;
//! [`repositories`] implements them on PostgreSQL and [`memory`] implements
//! them in process for tests and database-less runs. Callers receive the
//! implementations bundled in a [`Stores`] handle instead of reaching for a
//! global connection.

pub mod connection;
pub mod memory;
pub mod migration;
pub mod repositories;
pub mod store;

pub use connection::DatabasePool;
pub use memory::MemoryStore;
pub use store::{FavoriteStore, NodeStore, SettingsStore, ShareStore, Stores, TrashStore};
