//! The generic WebDAV engine behind the adapters.
//!
//! Adapters never touch the protocol themselves: they rewrite the inbound
//! request (path, method, `Destination`) and hand it to a [`DavBackend`].
//! Production uses [`LocalDavBackend`], a `dav-server` handler serving the
//! DAV root with an in-memory lock system.

use std::path::Path;

use async_trait::async_trait;
use bytes::Bytes;
use dav_server::DavHandler;
use dav_server::localfs::LocalFs;
use dav_server::memls::MemLs;
use http::{HeaderMap, Request, Response, StatusCode};
use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::{BodyExt, Full};

use davsync_core::error::{AppError, ErrorKind};
use davsync_core::result::AppResult;

/// Response body type used across the crate.
pub type DavBody = UnsyncBoxBody<Bytes, std::io::Error>;

/// Wrap a buffered payload.
pub fn full_body(bytes: impl Into<Bytes>) -> DavBody {
    Full::new(bytes.into())
        .map_err(|never| match never {})
        .boxed_unsync()
}

/// A generic WebDAV protocol handler rooted at the DAV root.
///
/// Request paths are `<prefix>/<storage path>`.
#[async_trait]
pub trait DavBackend: Send + Sync {
    /// Serve one request.
    async fn serve(&self, req: Request<Bytes>) -> Response<DavBody>;
}

/// `dav-server` over the local filesystem.
#[derive(Clone)]
pub struct LocalDavBackend {
    handler: DavHandler,
}

impl LocalDavBackend {
    /// Serve `root` under `prefix`.
    pub fn new(root: &Path, prefix: &str) -> Self {
        let handler = DavHandler::builder()
            .strip_prefix(prefix.to_string())
            .filesystem(LocalFs::new(root, false, false, false))
            .locksystem(MemLs::new())
            .build_handler();
        Self { handler }
    }
}

#[async_trait]
impl DavBackend for LocalDavBackend {
    async fn serve(&self, req: Request<Bytes>) -> Response<DavBody> {
        let req = req.map(Full::new);
        self.handler
            .handle(req)
            .await
            .map(|body| body.boxed_unsync())
    }
}

impl std::fmt::Debug for LocalDavBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalDavBackend").finish_non_exhaustive()
    }
}

/// A backend response fully read into memory.
#[derive(Debug, Clone)]
pub struct CapturedResponse {
    /// Status code.
    pub status: StatusCode,
    /// Headers as sent by the backend.
    pub headers: HeaderMap,
    /// Entire body.
    pub body: Bytes,
}

impl CapturedResponse {
    /// Buffer `response`.
    pub async fn capture(response: Response<DavBody>) -> AppResult<Self> {
        let (parts, body) = response.into_parts();
        let body = body
            .collect()
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::Storage, "Failed to buffer WebDAV response", e)
            })?
            .to_bytes();
        Ok(Self {
            status: parts.status,
            headers: parts.headers,
            body,
        })
    }

    /// Whether this is a `207 Multi-Status` answer.
    pub fn is_multistatus(&self) -> bool {
        self.status == StatusCode::MULTI_STATUS
    }

    /// Send the response on unchanged.
    pub fn into_response(self) -> Response<DavBody> {
        let body = self.body.clone();
        self.with_body(body)
    }

    /// Send the status and headers on with a replacement body.
    pub fn with_body(self, body: impl Into<Bytes>) -> Response<DavBody> {
        let body: Bytes = body.into();
        let mut response = Response::new(full_body(body.clone()));
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        response
            .headers_mut()
            .insert(http::header::CONTENT_LENGTH, http::HeaderValue::from(body.len()));
        response
    }
}
