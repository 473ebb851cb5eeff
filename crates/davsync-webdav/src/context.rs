//! Shared state handed to every adapter.

use std::path::PathBuf;
use std::sync::Arc;

use bytes::Bytes;
use http::{HeaderMap, Method, Request, Response, Uri};

use davsync_core::error::AppError;
use davsync_core::result::AppResult;
use davsync_core::types::path::StoragePath;
use davsync_database::Stores;

use crate::backend::{DavBackend, DavBody};
use crate::resolver::PathResolver;

/// Stores, backend and mount layout.
#[derive(Clone)]
pub struct DavContext {
    /// Metadata stores.
    pub stores: Stores,
    /// Generic WebDAV engine.
    pub backend: Arc<dyn DavBackend>,
    /// Physical root every storage path lives under.
    pub dav_root: PathBuf,
    /// URL prefix of the WebDAV mount, without trailing slash.
    pub prefix: String,
}

impl DavContext {
    /// Create a context.
    pub fn new(
        stores: Stores,
        backend: Arc<dyn DavBackend>,
        dav_root: impl Into<PathBuf>,
        prefix: &str,
    ) -> Self {
        Self {
            stores,
            backend,
            dav_root: dav_root.into(),
            prefix: prefix.trim_end_matches('/').to_string(),
        }
    }

    /// Path resolver over this context's stores.
    pub fn resolver(&self) -> PathResolver<'_> {
        PathResolver::new(self.stores.nodes.as_ref(), self.stores.shares.as_ref())
    }

    /// Physical location of `path`.
    pub fn fs_path(&self, path: &StoragePath) -> PathBuf {
        path.to_fs_path(&self.dav_root)
    }

    /// URL path addressing `path` on the backend.
    pub fn backend_uri(&self, path: &StoragePath) -> String {
        format!("{}/{}", self.prefix, path.to_encoded())
    }

    /// Client-facing href for a client path. Directories end in exactly one
    /// slash.
    pub fn client_href(&self, client: &StoragePath, is_dir: bool) -> String {
        let mut href = format!("{}/{}", self.prefix, client.to_encoded());
        if is_dir && !href.ends_with('/') {
            href.push('/');
        }
        href
    }

    /// Client path of a request URL path, or `None` when the URL lies outside
    /// the mount.
    pub fn client_path(&self, uri_path: &str) -> AppResult<Option<StoragePath>> {
        match uri_path.strip_prefix(&self.prefix) {
            Some(rest) if rest.is_empty() || rest.starts_with('/') => {
                StoragePath::from_encoded(rest).map(Some)
            }
            _ => Ok(None),
        }
    }

    /// Client path named by a `Destination` header (absolute URL or path).
    pub fn destination(&self, headers: &HeaderMap) -> AppResult<StoragePath> {
        let raw = headers
            .get("Destination")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| AppError::validation("Missing Destination header"))?;

        let path = if raw.contains("://") {
            let uri: Uri = raw
                .parse()
                .map_err(|_| AppError::validation(format!("Malformed Destination '{raw}'")))?;
            uri.path().to_string()
        } else {
            raw.to_string()
        };

        self.client_path(&path)?.ok_or_else(|| {
            AppError::validation(format!("Destination '{raw}' is outside the WebDAV mount"))
        })
    }

    /// Point `req` at `target`, keeping its query string.
    pub fn rewrite(&self, mut req: Request<Bytes>, target: &StoragePath) -> AppResult<Request<Bytes>> {
        *req.uri_mut() = self.target_uri(req.uri(), target)?;
        Ok(req)
    }

    /// A fresh backend request for `target`.
    pub fn sub_request(
        &self,
        method: Method,
        target: &StoragePath,
        headers: &HeaderMap,
        body: Bytes,
    ) -> AppResult<Request<Bytes>> {
        let mut req = Request::new(body);
        *req.method_mut() = method;
        *req.uri_mut() = self.target_uri(&Uri::from_static("/"), target)?;
        *req.headers_mut() = headers.clone();
        Ok(req)
    }

    /// Hand a rewritten request to the backend.
    pub async fn delegate(&self, req: Request<Bytes>) -> Response<DavBody> {
        self.backend.serve(req).await
    }

    fn target_uri(&self, original: &Uri, target: &StoragePath) -> AppResult<Uri> {
        let mut uri = self.backend_uri(target);
        if let Some(query) = original.query() {
            uri.push('?');
            uri.push_str(query);
        }
        uri.parse()
            .map_err(|_| AppError::internal(format!("Cannot build request URI '{uri}'")))
    }
}

impl std::fmt::Debug for DavContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DavContext")
            .field("dav_root", &self.dav_root)
            .field("prefix", &self.prefix)
            .finish_non_exhaustive()
    }
}
