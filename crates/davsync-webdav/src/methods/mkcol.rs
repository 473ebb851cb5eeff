//! MKCOL adapter (RFC 4918 Section 9.3).

use bytes::Bytes;
use http::{Request, Response};
use tracing;

use davsync_core::error::AppError;
use davsync_core::result::AppResult;
use davsync_core::types::identity::Identity;
use davsync_core::types::path::StoragePath;
use davsync_entity::DIRECTORY_MIME_TYPE;

use crate::backend::DavBody;
use crate::context::DavContext;

/// Handle a MKCOL request (create collection/folder)
///
/// The directory node is written before the backend creates the directory.
/// The owner is the first segment of the resolved path, so a directory made
/// inside someone else's share belongs to the share's owner.
pub async fn handle_mkcol(
    ctx: &DavContext,
    identity: &Identity,
    client: &StoragePath,
    req: Request<Bytes>,
) -> AppResult<Response<DavBody>> {
    tracing::debug!("MKCOL: user={}, path='{}'", identity.username, client);

    if client.is_root() {
        return Err(AppError::conflict("The home directory already exists"));
    }

    let target = ctx.resolver().resolve_target(client, identity).await?;
    if ctx.stores.nodes.exists(&target.path).await? {
        return Err(AppError::conflict(format!("'{client}' already exists")));
    }
    let parent = target
        .path
        .parent()
        .ok_or_else(|| AppError::internal(format!("'{}' has no parent", target.path)))?;
    if !ctx.stores.nodes.exists(&parent).await? {
        return Err(AppError::not_found(format!("Parent of '{client}' does not exist")));
    }

    ctx.stores
        .nodes
        .save(&target.path, target.owner(), true, DIRECTORY_MIME_TYPE)
        .await?;

    let response = ctx.delegate(ctx.rewrite(req, &target.path)?).await;
    if response.status().is_success() {
        tracing::info!("Created collection '{}' via WebDAV", target.path);
    } else {
        tracing::warn!(
            "Backend answered {} for MKCOL '{}'; node record kept",
            response.status(),
            target.path
        );
    }
    Ok(response)
}
