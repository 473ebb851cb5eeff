//! WebDAV request handler: dispatches HTTP methods to the adapters.

use std::sync::Arc;

use bytes::Bytes;
use http::header::CONTENT_TYPE;
use http::{HeaderValue, Request, Response, StatusCode};
use tracing;

use davsync_core::error::{AppError, ErrorKind};
use davsync_core::types::identity::Identity;

use crate::backend::{DavBody, full_body};
use crate::context::DavContext;
use crate::methods;
use crate::provision;

/// WebDAV request handler
#[derive(Debug, Clone)]
pub struct DavHandler {
    ctx: Arc<DavContext>,
}

impl DavHandler {
    /// Create a new DAV handler
    pub fn new(ctx: Arc<DavContext>) -> Self {
        Self { ctx }
    }

    /// Shared adapter state.
    pub fn context(&self) -> &DavContext {
        &self.ctx
    }

    /// Handle a WebDAV request below the mount prefix on behalf of
    /// `identity`.
    pub async fn handle(&self, identity: &Identity, req: Request<Bytes>) -> Response<DavBody> {
        let ctx = self.ctx.as_ref();

        if req.method() == http::Method::OPTIONS {
            return methods::handle_options(ctx, req).await;
        }
        if identity.is_anonymous() {
            return error_response(&AppError::authentication("No valid session"));
        }

        let client = match ctx.client_path(req.uri().path()) {
            Ok(Some(path)) => path,
            Ok(None) => {
                return error_response(&AppError::not_found(format!(
                    "'{}' is outside the WebDAV mount",
                    req.uri().path()
                )));
            }
            Err(e) => return error_response(&e),
        };

        if let Err(e) = provision::ensure_home(ctx, identity).await {
            return error_response(&e);
        }

        let method = req.method().clone();
        let result = match method.as_str() {
            "PROPFIND" => methods::handle_propfind(ctx, identity, &client, req).await,
            "GET" => methods::handle_get(ctx, identity, &client, req).await,
            "HEAD" => methods::handle_head(ctx, identity, &client, req).await,
            "PUT" => methods::handle_put(ctx, identity, &client, req).await,
            "MKCOL" => methods::handle_mkcol(ctx, identity, &client, req).await,
            "DELETE" => methods::handle_delete(ctx, identity, &client, req).await,
            "MOVE" => methods::handle_move(ctx, identity, &client, req).await,
            "COPY" => methods::handle_copy(ctx, identity, &client, req).await,
            _ => methods::handle_resolved(ctx, identity, &client, req).await,
        };

        match result {
            Ok(response) => response,
            Err(e) => {
                tracing::debug!("{} '{}' failed for {}", method, client, identity.username);
                error_response(&e)
            }
        }
    }
}

/// HTTP status an error surfaces as.
pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Conflict => StatusCode::CONFLICT,
        ErrorKind::Authentication => StatusCode::UNAUTHORIZED,
        ErrorKind::Validation => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Convert an AppError to a bare status response. Details go to the log
/// only.
pub fn error_response(error: &AppError) -> Response<DavBody> {
    let status = status_for(error.kind);
    if error.kind.is_client_error() {
        tracing::debug!("Request rejected: {}", error);
    } else {
        tracing::error!("Request failed: {}", error);
    }

    let reason = status.canonical_reason().unwrap_or_default();
    let mut response = Response::new(full_body(reason));
    *response.status_mut() = status;
    response.headers_mut().insert(
        CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    response
}
