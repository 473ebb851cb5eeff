//! Per-user favorite markers.

pub mod model;

pub use model::Favorite;
