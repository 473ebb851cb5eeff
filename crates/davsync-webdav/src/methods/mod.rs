//! WebDAV method adapters.
//!
//! Each adapter resolves the client path, performs the matching node store
//! mutation and delegates the rewritten request to the backend.

pub mod copy;
pub mod delete;
pub mod get_put;
pub mod mkcol;
pub mod move_op;
pub mod passthrough;
pub mod propfind;

pub use copy::handle_copy;
pub use delete::handle_delete;
pub use get_put::{handle_get, handle_head, handle_put};
pub use mkcol::handle_mkcol;
pub use move_op::handle_move;
pub use passthrough::{handle_options, handle_resolved};
pub use propfind::handle_propfind;

use http::{Response, StatusCode};

use crate::backend::{DavBody, full_body};

/// An empty response with `status`.
pub fn status_response(status: StatusCode) -> Response<DavBody> {
    let mut response = Response::new(full_body(bytes::Bytes::new()));
    *response.status_mut() = status;
    response
}
