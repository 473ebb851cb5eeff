//! Convenience result type alias for davsync.

use crate::error::AppError;

/// A specialized `Result` type for davsync operations.
pub type AppResult<T> = Result<T, AppError>;
