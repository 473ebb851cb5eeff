//! GET, HEAD, and PUT adapters.

use bytes::Bytes;
use http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use http::{HeaderValue, Request, Response, StatusCode};
use tracing;

use davsync_core::error::AppError;
use davsync_core::result::AppResult;
use davsync_core::types::identity::Identity;
use davsync_core::types::path::StoragePath;

use crate::backend::DavBody;
use crate::context::DavContext;
use crate::methods::status_response;

/// Handle a GET request (download file)
pub async fn handle_get(
    ctx: &DavContext,
    identity: &Identity,
    client: &StoragePath,
    req: Request<Bytes>,
) -> AppResult<Response<DavBody>> {
    tracing::debug!("GET: user={}, path='{}'", identity.username, client);

    let resolved = ctx.resolver().resolve(client, identity).await?;
    let leaf = resolved.path.leaf().unwrap_or_default().to_string();

    let mut response = ctx.delegate(ctx.rewrite(req, &resolved.path)?).await;

    if response.status().is_success() {
        let disposition = format!("attachment; filename={leaf}");
        match HeaderValue::from_bytes(disposition.as_bytes()) {
            Ok(value) => {
                response.headers_mut().insert(CONTENT_DISPOSITION, value);
            }
            Err(_) => tracing::warn!("Cannot send '{}' as a filename header", leaf),
        }
    }

    Ok(response)
}

/// Handle a HEAD request. HEAD on the WebDAV root is a server ping.
pub async fn handle_head(
    ctx: &DavContext,
    identity: &Identity,
    client: &StoragePath,
    req: Request<Bytes>,
) -> AppResult<Response<DavBody>> {
    tracing::debug!("HEAD: user={}, path='{}'", identity.username, client);

    if client.is_root() {
        return Ok(status_response(StatusCode::OK));
    }

    let resolved = ctx.resolver().resolve(client, identity).await?;
    Ok(ctx.delegate(ctx.rewrite(req, &resolved.path)?).await)
}

/// Handle a PUT request (upload/overwrite file)
///
/// PUT replaces whole files: any node already at the target is dropped and
/// recreated with the mime type of the new upload before the bytes are
/// written.
pub async fn handle_put(
    ctx: &DavContext,
    identity: &Identity,
    client: &StoragePath,
    req: Request<Bytes>,
) -> AppResult<Response<DavBody>> {
    tracing::debug!(
        "PUT: user={}, path='{}', size={}",
        identity.username,
        client,
        req.body().len()
    );

    let Some(file_name) = client.leaf() else {
        return Err(AppError::conflict("Cannot PUT to the home directory"));
    };

    let target = ctx.resolver().resolve_parent(client, identity).await?;
    let parent = target
        .path
        .parent()
        .ok_or_else(|| AppError::internal(format!("'{}' has no parent", target.path)))?;
    if !ctx.stores.nodes.exists(&parent).await? {
        return Err(AppError::not_found(format!("Parent of '{client}' does not exist")));
    }

    if let Some(existing) = ctx.stores.nodes.get(&target.path).await? {
        if existing.is_dir {
            return Err(AppError::conflict(format!("'{client}' is a directory")));
        }
    }

    let mime = req
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| {
            mime_guess::from_path(file_name)
                .first_or_octet_stream()
                .essence_str()
                .to_string()
        });

    ctx.stores.nodes.delete_by_prefix(&target.path).await?;
    ctx.stores
        .nodes
        .save(&target.path, target.owner(), false, &mime)
        .await?;

    let response = ctx.delegate(ctx.rewrite(req, &target.path)?).await;
    if response.status().is_success() {
        tracing::info!("Stored '{}' ({}) via WebDAV", target.path, mime);
    } else {
        tracing::warn!(
            "Backend answered {} for PUT '{}'; node record kept",
            response.status(),
            target.path
        );
    }
    Ok(response)
}
