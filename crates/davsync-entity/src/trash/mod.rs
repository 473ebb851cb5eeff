//! Links from trashed nodes back to where they came from.

pub mod model;

pub use model::TrashNode;
