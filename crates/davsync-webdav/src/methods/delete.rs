//! DELETE adapter: unshare or move to trash.

use bytes::Bytes;
use http::{HeaderValue, Method, Request, Response, StatusCode};
use tracing;

use davsync_core::error::AppError;
use davsync_core::result::AppResult;
use davsync_core::types::identity::Identity;
use davsync_core::types::path::StoragePath;
use davsync_entity::ShareType;

use crate::backend::DavBody;
use crate::context::DavContext;
use crate::methods::status_response;
use crate::trash::relocate_to_trash;

/// Handle a DELETE request
///
/// Deleting the mount point of an incoming share only removes the caller's
/// personal share rows. Anything else is relocated into the owner's trash: node
/// records first, then the request is turned into a MOVE for the backend.
pub async fn handle_delete(
    ctx: &DavContext,
    identity: &Identity,
    client: &StoragePath,
    req: Request<Bytes>,
) -> AppResult<Response<DavBody>> {
    tracing::debug!("DELETE: user={}, path='{}'", identity.username, client);

    if client.is_root() {
        return Err(AppError::conflict("Cannot delete the home directory"));
    }

    let resolved = ctx.resolver().resolve(client, identity).await?;

    if let (true, Some(root)) = (resolved.is_share_mount(), resolved.share_root.as_ref()) {
        let mut removed = 0;
        for share in ctx.stores.shares.get_by_node(root.id).await? {
            if share.target == identity.username
                && share.share_type != ShareType::Link
                && ctx.stores.shares.delete_by_id(share.id).await?
            {
                removed += 1;
            }
        }
        tracing::info!(
            "Unshared '{}' for {} ({} share rows removed)",
            root.path,
            identity.username,
            removed
        );
        return Ok(status_response(StatusCode::NO_CONTENT));
    }

    if !ctx.stores.nodes.exists(&resolved.path).await? {
        return Err(AppError::not_found(format!("'{client}' does not exist")));
    }

    let destination = relocate_to_trash(ctx, &resolved.path).await?;

    let mut req = ctx.rewrite(req, &resolved.path)?;
    *req.method_mut() = Method::from_bytes(b"MOVE")
        .map_err(|e| AppError::internal(format!("Invalid method: {e}")))?;
    let header = HeaderValue::from_str(&ctx.backend_uri(&destination))
        .map_err(|e| AppError::internal(format!("Invalid Destination header: {e}")))?;
    req.headers_mut().insert("Destination", header);
    req.headers_mut()
        .insert("Overwrite", HeaderValue::from_static("F"));

    let response = ctx.delegate(req).await;
    if response.status().is_success() {
        tracing::info!("Moved '{}' to trash at '{}'", resolved.path, destination);
        return Ok(status_response(StatusCode::NO_CONTENT));
    }

    tracing::warn!(
        "Backend answered {} moving '{}' to trash; node records already relocated",
        response.status(),
        resolved.path
    );
    Ok(response)
}
