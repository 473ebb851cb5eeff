//! MOVE adapter (RFC 4918 Section 9.9).

use bytes::Bytes;
use http::{HeaderValue, Request, Response};
use tracing;

use davsync_core::error::AppError;
use davsync_core::result::AppResult;
use davsync_core::types::identity::Identity;
use davsync_core::types::path::StoragePath;

use crate::backend::DavBody;
use crate::context::DavContext;
use crate::walk;

/// Source and destination of a MOVE or COPY, both resolved to storage paths.
#[derive(Debug, Clone)]
pub struct TransferPlan {
    /// Existing source subtree.
    pub source: StoragePath,
    /// Destination root; nothing exists there yet.
    pub target: StoragePath,
}

impl TransferPlan {
    /// Resolve both ends of a MOVE/COPY and check the structural rules.
    ///
    /// Conflict when the destination is the source or below it (compared as
    /// client paths and as storage paths), when the destination parent is
    /// missing, or when something already exists at the destination.
    pub async fn prepare(
        ctx: &DavContext,
        identity: &Identity,
        client: &StoragePath,
        headers: &http::HeaderMap,
    ) -> AppResult<Self> {
        let dest_client = ctx.destination(headers)?;

        let (Some(leaf), false) = (dest_client.leaf(), client.is_root()) else {
            return Err(AppError::conflict("Cannot move or copy the home directory"));
        };
        if dest_client.starts_with(client) {
            return Err(AppError::conflict(format!(
                "Cannot place '{client}' inside itself at '{dest_client}'"
            )));
        }

        let resolver = ctx.resolver();
        let source = resolver.resolve(client, identity).await?;
        if !ctx.stores.nodes.exists(&source.path).await? {
            return Err(AppError::not_found(format!("'{client}' does not exist")));
        }

        let dest_parent_client = dest_client.parent().unwrap_or_default();
        let dest_parent = resolver.resolve(&dest_parent_client, identity).await?;
        if !ctx.stores.nodes.exists(&dest_parent.path).await? {
            return Err(AppError::conflict(format!(
                "Destination parent '{dest_parent_client}' does not exist"
            )));
        }
        let target = dest_parent.path.child(leaf);

        if target.starts_with(&source.path) {
            return Err(AppError::conflict(format!(
                "'{}' would end up inside itself",
                source.path
            )));
        }
        if ctx.stores.nodes.exists(&target).await? {
            return Err(AppError::conflict(format!("'{dest_client}' already exists")));
        }

        Ok(Self {
            source: source.path,
            target,
        })
    }

    /// Owner of everything below the destination.
    pub fn target_owner(&self) -> &str {
        self.target.owner().unwrap_or_default()
    }

    /// Where `path` (inside the source) ends up.
    pub fn destination_of(&self, path: &StoragePath) -> StoragePath {
        let rest = path.strip_prefix(&self.source).unwrap_or_default();
        self.target.join(&rest)
    }

    /// Point the request at the source and its `Destination` at the target.
    pub fn rewrite(&self, ctx: &DavContext, req: Request<Bytes>) -> AppResult<Request<Bytes>> {
        let mut req = ctx.rewrite(req, &self.source)?;
        let header = HeaderValue::from_str(&ctx.backend_uri(&self.target))
            .map_err(|e| AppError::internal(format!("Invalid Destination header: {e}")))?;
        req.headers_mut().insert("Destination", header);
        Ok(req)
    }
}

/// Handle a MOVE request
///
/// Every node of the source subtree is re-pathed and handed to the owner of
/// the destination, so moving into someone else's share transfers the
/// files to them.
pub async fn handle_move(
    ctx: &DavContext,
    identity: &Identity,
    client: &StoragePath,
    req: Request<Bytes>,
) -> AppResult<Response<DavBody>> {
    tracing::debug!("MOVE: user={}, src='{}'", identity.username, client);

    let plan = TransferPlan::prepare(ctx, identity, client, req.headers()).await?;

    let new_owner = plan.target_owner();
    for entry in walk::subtree(&ctx.dav_root, &plan.source).await? {
        let Some(node) = ctx.stores.nodes.get(&entry.path).await? else {
            tracing::warn!("'{}' is on disk but has no node record, skipping", entry.path);
            continue;
        };
        ctx.stores
            .nodes
            .transfer(&entry.path, &plan.destination_of(&entry.path), new_owner)
            .await?;
        if node.owner != new_owner {
            // A grant to the new owner would now point at their own node.
            let dropped = ctx
                .stores
                .shares
                .delete_by_node_and_target(node.id, new_owner)
                .await?;
            if dropped > 0 {
                tracing::debug!("Dropped {} grant(s) of '{}' to its new owner", dropped, node.path);
            }
        }
    }

    let response = ctx.delegate(plan.rewrite(ctx, req)?).await;
    if response.status().is_success() {
        tracing::info!("MOVE completed: '{}' → '{}'", plan.source, plan.target);
    } else {
        tracing::warn!(
            "Backend answered {} for MOVE '{}'; node records already moved",
            response.status(),
            plan.source
        );
    }
    Ok(response)
}
