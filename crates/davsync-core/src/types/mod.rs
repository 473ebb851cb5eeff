//! Core type definitions used across the davsync workspace.

pub mod id;
pub mod identity;
pub mod path;

pub use id::*;
pub use identity::Identity;
pub use path::StoragePath;
