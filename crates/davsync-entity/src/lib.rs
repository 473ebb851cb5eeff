//! # davsync-entity
//!
//! Row models of the metadata store. Every struct in this crate is either a
//! table row (deriving `sqlx::FromRow`) or the input for creating one.

pub mod favorite;
pub mod node;
pub mod setting;
pub mod share;
pub mod trash;

pub use favorite::Favorite;
pub use node::{DIRECTORY_MIME_TYPE, Node};
pub use setting::{DAV_ROOT, Setting, VERSION};
pub use share::{CreateShare, Share, ShareType};
pub use trash::TrashNode;
