//! PostgreSQL implementations of the store traits.

pub mod favorite;
pub mod node;
pub mod settings;
pub mod share;
pub mod trash;

pub use favorite::FavoriteRepository;
pub use node::NodeRepository;
pub use settings::SettingsRepository;
pub use share::ShareRepository;
pub use trash::TrashRepository;

use davsync_core::error::{AppError, ErrorKind};

/// Wrap a sqlx error, surfacing unique violations as `Conflict`.
pub(crate) fn db_error(context: &str, err: sqlx::Error) -> AppError {
    let unique = err
        .as_database_error()
        .is_some_and(|db| db.is_unique_violation());
    if unique {
        AppError::with_source(ErrorKind::Conflict, format!("{context}: path already taken"), err)
    } else {
        AppError::with_source(ErrorKind::Database, context.to_string(), err)
    }
}
