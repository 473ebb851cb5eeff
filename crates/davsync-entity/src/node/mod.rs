//! File and directory nodes.

pub mod model;

pub use model::{DIRECTORY_MIME_TYPE, Node};
