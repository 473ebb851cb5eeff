//! PROPFIND adapter (RFC 4918 Section 9.1) and response patching.

use std::collections::HashSet;

use bytes::Bytes;
use http::{HeaderMap, HeaderValue, Method, Request, Response, StatusCode};
use tracing;
use xmltree::Element;

use davsync_core::result::AppResult;
use davsync_core::types::id::NodeId;
use davsync_core::types::identity::Identity;
use davsync_core::types::path::{FILES_DIR, StoragePath};
use davsync_entity::{Node, Share};

use crate::backend::{CapturedResponse, DavBody};
use crate::context::DavContext;
use crate::patcher::{self, Multistatus};
use crate::properties::{OcProperty, requested_properties};
use crate::resolver::{Mount, Resolved};

/// Handle a PROPFIND request
///
/// The backend's multi-status answer is buffered and patched: hrefs are
/// mapped back to client paths and vendor properties the backend could not
/// answer are filled in from the node and share records. A listing of the
/// home directory additionally gets one entry per incoming share.
pub async fn handle_propfind(
    ctx: &DavContext,
    identity: &Identity,
    client: &StoragePath,
    req: Request<Bytes>,
) -> AppResult<Response<DavBody>> {
    let depth = req
        .headers()
        .get("Depth")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("infinity")
        .to_string();
    tracing::debug!(
        "PROPFIND: user={}, path='{}', depth={}",
        identity.username,
        client,
        depth
    );

    let resolved = if client.is_root() {
        Resolved::home(identity)
    } else {
        ctx.resolver().resolve(client, identity).await?
    };

    let method = req.method().clone();
    let headers = req.headers().clone();
    let body = req.body().clone();
    let requested = requested_properties(&body);

    let captured = CapturedResponse::capture(ctx.delegate(ctx.rewrite(req, &resolved.path)?).await)
        .await?;
    if !captured.is_multistatus() {
        return Ok(captured.into_response());
    }
    let Some(mut document) = Multistatus::parse(&captured.body) else {
        tracing::warn!("PROPFIND '{}' answered 207 with an unreadable body", resolved.path);
        return Ok(captured.into_response());
    };

    let patcher = Patcher {
        ctx,
        identity,
        requested: &requested,
    };

    let mut seen: HashSet<NodeId> = HashSet::new();
    for response in document.responses_mut() {
        if let Some(id) = patcher.patch_listed(response, &resolved.mount).await? {
            seen.insert(id);
        }
    }

    if client.is_root() {
        for share in ctx.stores.shares.get_all_effective(identity).await? {
            if seen.contains(&share.node_id) {
                continue;
            }
            if let Some(response) = patcher.share_entry(&share, &method, &headers, &body).await? {
                seen.insert(share.node_id);
                document.push_response(response);
            }
        }
    }

    Ok(captured.with_body(document.finish()?))
}

/// Per-request patching state.
struct Patcher<'a> {
    ctx: &'a DavContext,
    identity: &'a Identity,
    requested: &'a [String],
}

impl Patcher<'_> {
    /// Rewrite one listed response and fill in its vendor properties.
    /// Returns the id of the node behind it, when known.
    async fn patch_listed(&self, response: &mut Element, mount: &Mount) -> AppResult<Option<NodeId>> {
        let Some(href) = patcher::href(response) else {
            tracing::warn!("PROPFIND response without href");
            return Ok(None);
        };
        let storage = match self.ctx.client_path(&href)? {
            Some(path) => path,
            None => {
                tracing::warn!("PROPFIND href '{}' is outside the WebDAV mount", href);
                return Ok(None);
            }
        };
        let node = self.ctx.stores.nodes.get(&storage).await?;

        let is_dir = node
            .as_ref()
            .map(|n| n.is_dir)
            .unwrap_or_else(|| patcher::is_collection(response));
        match mount.client_path_for(&storage) {
            Some(client) => patcher::set_href(response, &self.ctx.client_href(&client, is_dir)),
            None => tracing::warn!("'{}' is outside the listed mount", storage),
        }

        let Some(node) = node else {
            tracing::warn!("'{}' is on disk but has no node record", storage);
            return Ok(None);
        };
        let shares = self.ctx.stores.shares.get_by_node(node.id).await?;
        self.patch_properties(response, &node, &shares).await?;
        Ok(Some(node.id))
    }

    /// The Depth-0 entry of an incoming share, flattened to the top level.
    async fn share_entry(
        &self,
        share: &Share,
        method: &Method,
        headers: &HeaderMap,
        body: &Bytes,
    ) -> AppResult<Option<Element>> {
        let Some(node) = self.ctx.stores.nodes.find_by_id(share.node_id).await? else {
            tracing::warn!("Share {} points at missing node {}", share.id, share.node_id);
            return Ok(None);
        };
        let path = node.storage_path()?;
        if path.segments().get(1).map(String::as_str) != Some(FILES_DIR) {
            tracing::debug!("Share {} points at '{}' outside files, skipping", share.id, path);
            return Ok(None);
        }

        let mut headers = headers.clone();
        headers.insert("Depth", HeaderValue::from_static("0"));
        headers.remove(http::header::CONTENT_LENGTH);
        let req = self
            .ctx
            .sub_request(method.clone(), &path, &headers, body.clone())?;
        let captured = CapturedResponse::capture(self.ctx.delegate(req).await).await?;
        if captured.status != StatusCode::MULTI_STATUS {
            tracing::warn!(
                "Skipping share {} of '{}': backend answered {}",
                share.id,
                path,
                captured.status
            );
            return Ok(None);
        }
        let Some(mut response) =
            Multistatus::parse(&captured.body).and_then(Multistatus::into_first_response)
        else {
            tracing::warn!("Skipping share {} of '{}': empty multistatus", share.id, path);
            return Ok(None);
        };

        let flat = StoragePath::root().child(node.name());
        patcher::set_href(&mut response, &self.ctx.client_href(&flat, node.is_dir));
        self.patch_properties(&mut response, &node, std::slice::from_ref(share))
            .await?;
        Ok(Some(response))
    }

    async fn patch_properties(
        &self,
        response: &mut Element,
        node: &Node,
        shares: &[Share],
    ) -> AppResult<()> {
        let missing = patcher::missing_properties(response);
        for name in self.requested {
            if !missing.contains(name) {
                continue;
            }
            let Some(property) = OcProperty::from_name(name) else {
                continue;
            };
            if let Some(value) = property
                .render(self.ctx, self.identity, node, shares)
                .await?
            {
                patcher::resolve_missing(response, name, value);
            }
        }
        patcher::prune_empty_not_found(response);
        Ok(())
    }
}
