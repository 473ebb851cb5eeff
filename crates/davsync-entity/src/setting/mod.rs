//! Persisted key/value settings.

pub mod model;

pub use model::{DAV_ROOT, Setting, VERSION};
