//! Shared test helpers for integration tests.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;

use bytes::Bytes;
use http::{HeaderMap, Method, Request, StatusCode};
use tempfile::TempDir;

use davsync_core::types::identity::Identity;
use davsync_core::types::path::StoragePath;
use davsync_database::Stores;
use davsync_entity::{CreateShare, Node, Share, ShareType};
use davsync_webdav::backend::CapturedResponse;
use davsync_webdav::{ApiHandler, ApiRoute, DavContext, DavHandler, LocalDavBackend};

/// Mount prefix used by every test.
pub const PREFIX: &str = "/remote.php/webdav";

/// Body asking for the vendor properties the patcher fills in.
pub const OC_PROPFIND: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<d:propfind xmlns:d="DAV:" xmlns:oc="http://owncloud.org/ns">
  <d:prop>
    <d:resourcetype/>
    <oc:fileid/>
    <oc:permissions/>
    <oc:share-types/>
    <oc:favorite/>
    <oc:owner-display-name/>
    <oc:size/>
  </d:prop>
</d:propfind>"#;

/// A collected response.
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl TestResponse {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.body).expect("response is not JSON")
    }
}

/// Test application context
pub struct TestApp {
    /// Keeps the DAV root alive.
    pub dir: TempDir,
    pub stores: Stores,
    pub ctx: Arc<DavContext>,
    pub dav: DavHandler,
    pub api: ApiHandler,
}

impl TestApp {
    /// A fresh app over an empty DAV root and in-memory metadata.
    pub fn new() -> Self {
        let dir = TempDir::new().expect("Failed to create DAV root");
        let stores = Stores::memory();
        let backend = Arc::new(LocalDavBackend::new(dir.path(), PREFIX));
        let ctx = Arc::new(DavContext::new(
            stores.clone(),
            backend,
            dir.path(),
            PREFIX,
        ));
        Self {
            dav: DavHandler::new(Arc::clone(&ctx)),
            api: ApiHandler::new(Arc::clone(&ctx)),
            dir,
            stores,
            ctx,
        }
    }

    pub fn user(name: &str) -> Identity {
        Identity::new(name, vec![])
    }

    pub fn member(name: &str, orgs: &[&str]) -> Identity {
        Identity::new(name, orgs.iter().map(|o| o.to_string()).collect())
    }

    /// Send a WebDAV request for the client path `path`.
    pub async fn request(
        &self,
        identity: &Identity,
        method: &str,
        path: &str,
        headers: &[(&str, &str)],
        body: impl Into<Bytes>,
    ) -> TestResponse {
        let req = build(method, &format!("{PREFIX}{path}"), headers, body.into());
        collect(self.dav.handle(identity, req).await).await
    }

    /// Send a request to a JSON endpoint.
    pub async fn api_request(
        &self,
        identity: &Identity,
        method: &str,
        uri: &str,
        body: impl Into<Bytes>,
    ) -> TestResponse {
        let req = build(method, uri, &[], body.into());
        let route = ApiRoute::match_path(req.uri().path()).expect("not an API route");
        collect(self.api.handle(route, identity, req).await).await
    }

    pub async fn put(&self, identity: &Identity, path: &str, contents: &str) -> TestResponse {
        let response = self
            .request(identity, "PUT", path, &[("Content-Type", "text/plain")], contents.to_string())
            .await;
        assert!(
            response.status.is_success(),
            "PUT {path} answered {}",
            response.status
        );
        response
    }

    pub async fn mkcol(&self, identity: &Identity, path: &str) -> TestResponse {
        let response = self.request(identity, "MKCOL", path, &[], Bytes::new()).await;
        assert_eq!(response.status, StatusCode::CREATED, "MKCOL {path}");
        response
    }

    pub async fn propfind(&self, identity: &Identity, path: &str, depth: &str) -> TestResponse {
        self.request(
            identity,
            "PROPFIND",
            path,
            &[("Depth", depth), ("Content-Type", "application/xml")],
            OC_PROPFIND,
        )
        .await
    }

    pub async fn node(&self, path: &str) -> Option<Node> {
        self.stores
            .nodes
            .get(&StoragePath::parse(path).unwrap())
            .await
            .unwrap()
    }

    pub async fn share(&self, path: &str, target: &str, share_type: ShareType) -> Share {
        let node = self.node(path).await.expect("shared node must exist");
        self.stores
            .shares
            .create(&CreateShare {
                node_id: node.id,
                permissions: 31,
                target: target.to_string(),
                share_type,
            })
            .await
            .unwrap()
    }

    /// Physical location of a storage path.
    pub fn disk(&self, path: &str) -> PathBuf {
        self.dir.path().join(path)
    }
}

fn build(method: &str, uri: &str, headers: &[(&str, &str)], body: Bytes) -> Request<Bytes> {
    let mut builder = Request::builder()
        .method(Method::from_bytes(method.as_bytes()).unwrap())
        .uri(uri)
        .header("Content-Length", body.len());
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    builder.body(body).unwrap()
}

async fn collect(response: http::Response<davsync_webdav::backend::DavBody>) -> TestResponse {
    let captured = CapturedResponse::capture(response).await.unwrap();
    TestResponse {
        status: captured.status,
        headers: captured.headers,
        body: captured.body,
    }
}
