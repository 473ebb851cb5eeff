//! Per-user container provisioning.

use tracing;

use davsync_core::error::ErrorKind;
use davsync_core::result::AppResult;
use davsync_core::types::identity::Identity;
use davsync_core::types::path::StoragePath;
use davsync_entity::DIRECTORY_MIME_TYPE;

use crate::context::DavContext;

/// Make sure `<user>`, `<user>/files` and `<user>/files_trash` exist on disk
/// and as directory nodes owned by the user.
pub async fn ensure_home(ctx: &DavContext, identity: &Identity) -> AppResult<()> {
    let user = identity.username.as_str();
    let containers = [
        StoragePath::user_root(user),
        StoragePath::home(user),
        StoragePath::trash_root(user),
    ];

    for container in &containers {
        tokio::fs::create_dir_all(ctx.fs_path(container)).await?;
        if !ctx.stores.nodes.exists(container).await? {
            match ctx
                .stores
                .nodes
                .save(container, user, true, DIRECTORY_MIME_TYPE)
                .await
            {
                Ok(_) => tracing::info!("Provisioned '{}' for {}", container, user),
                // A concurrent request provisioned it first.
                Err(e) if e.kind == ErrorKind::Conflict => {}
                Err(e) => return Err(e),
            }
        }
    }

    Ok(())
}
