//! # davsync-core
//!
//! Core crate for davsync. Contains configuration schemas, typed node and
//! share identifiers, the [`StoragePath`](types::path::StoragePath) value
//! type used for every path computation, the caller
//! [`Identity`](types::identity::Identity), and the unified error system.
//!
//! This crate has **no** internal dependencies on other davsync crates.

pub mod config;
pub mod error;
pub mod result;
pub mod types;

pub use error::AppError;
pub use result::AppResult;
pub use types::identity::Identity;
pub use types::path::StoragePath;
