//! OPTIONS and the methods without metadata side effects.

use bytes::Bytes;
use http::{Request, Response};
use tracing;

use davsync_core::result::AppResult;
use davsync_core::types::identity::Identity;
use davsync_core::types::path::StoragePath;

use crate::backend::DavBody;
use crate::context::DavContext;

/// Handle an OPTIONS request; the backend answers as is.
pub async fn handle_options(ctx: &DavContext, req: Request<Bytes>) -> Response<DavBody> {
    ctx.delegate(req).await
}

/// Handle PROPPATCH, LOCK, UNLOCK and any method without an adapter:
/// resolve, rewrite, delegate.
pub async fn handle_resolved(
    ctx: &DavContext,
    identity: &Identity,
    client: &StoragePath,
    req: Request<Bytes>,
) -> AppResult<Response<DavBody>> {
    tracing::debug!(
        "{}: user={}, path='{}'",
        req.method(),
        identity.username,
        client
    );

    let resolved = ctx.resolver().resolve(client, identity).await?;
    Ok(ctx.delegate(ctx.rewrite(req, &resolved.path)?).await)
}
