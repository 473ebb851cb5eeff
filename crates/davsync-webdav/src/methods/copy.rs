//! COPY adapter (RFC 4918 Section 9.8).

use bytes::Bytes;
use http::{Request, Response};
use tracing;

use davsync_core::result::AppResult;
use davsync_core::types::identity::Identity;
use davsync_core::types::path::StoragePath;

use crate::backend::DavBody;
use crate::context::DavContext;
use crate::methods::move_op::TransferPlan;
use crate::walk;

/// Handle a COPY request
pub async fn handle_copy(
    ctx: &DavContext,
    identity: &Identity,
    client: &StoragePath,
    req: Request<Bytes>,
) -> AppResult<Response<DavBody>> {
    tracing::debug!("COPY: user={}, src='{}'", identity.username, client);

    let plan = TransferPlan::prepare(ctx, identity, client, req.headers()).await?;

    let mut created = 0usize;
    for entry in walk::subtree(&ctx.dav_root, &plan.source).await? {
        let Some(node) = ctx.stores.nodes.get(&entry.path).await? else {
            tracing::warn!("'{}' is on disk but has no node record, skipping", entry.path);
            continue;
        };
        ctx.stores
            .nodes
            .save(
                &plan.destination_of(&entry.path),
                plan.target_owner(),
                node.is_dir,
                &node.mime_type,
            )
            .await?;
        created += 1;
    }

    let response = ctx.delegate(plan.rewrite(ctx, req)?).await;
    tracing::info!(
        "COPY '{}' → '{}': {} nodes, backend answered {}",
        plan.source,
        plan.target,
        created,
        response.status()
    );
    Ok(response)
}
