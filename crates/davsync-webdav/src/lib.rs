//! ownCloud-compatible WebDAV front end for davsync.
//!
//! Requests under the WebDAV prefix are authenticated from a signed session
//! token, mapped from the caller's view (own files plus incoming shares)
//! onto physical storage paths, mirrored into the metadata stores and then
//! served by a generic WebDAV engine. Multi-status answers are patched with
//! the vendor properties sync clients expect. A few JSON endpoints for the
//! trash bin, favorites and server status sit next to the tree.

pub mod api;
pub mod auth;
pub mod backend;
pub mod context;
pub mod handler;
pub mod methods;
pub mod patcher;
pub mod properties;
pub mod provision;
pub mod resolver;
pub mod server;
pub mod trash;
pub mod walk;

pub use api::{ApiHandler, ApiRoute};
pub use auth::SessionDecoder;
pub use backend::{DavBackend, LocalDavBackend};
pub use context::DavContext;
pub use handler::DavHandler;
pub use server::{Router, WebDavServer};
