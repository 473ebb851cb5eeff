//! JSON endpoints next to the WebDAV tree: server status, trash bin,
//! favorites, name search and storage statistics.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::UNIX_EPOCH;

use bytes::Bytes;
use http::header::CONTENT_TYPE;
use http::{HeaderValue, Method, Request, Response, StatusCode};
use percent_encoding::percent_decode_str;
use serde::{Deserialize, Serialize};
use tracing;

use davsync_core::error::AppError;
use davsync_core::result::AppResult;
use davsync_core::types::id::NodeId;
use davsync_core::types::identity::Identity;
use davsync_core::types::path::StoragePath;
use davsync_entity::{Node, VERSION};

use crate::backend::{DavBody, full_body};
use crate::context::DavContext;
use crate::handler::error_response;
use crate::properties::share_type_codes;
use crate::provision;
use crate::trash::{TrashBin, TrashEntry, TrashedItem};
use crate::walk;

/// Tag the web UI uses to mark favorites.
pub const FAVORITE_TAG: &str = "_$!<Favorite>!$_";

const TRASH_LIST: &str = "/index.php/apps/files_trashbin/ajax/list.php";
const TRASH_UNDELETE: &str = "/index.php/apps/files_trashbin/ajax/undelete.php";
const TRASH_DELETE: &str = "/index.php/apps/files_trashbin/ajax/delete.php";
const FAVORITE_FILES: &str = "/index.php/apps/files/api/v1/files";
const FAVORITE_LIST: &str = "/index.php/apps/files/api/v1/tags/_$!<Favorite>!$_/files";
const SEARCH: &str = "/index.php/core/search";
const STORAGE_STATS: &str = "/index.php/apps/files/ajax/getstoragestats.php";

const UPLOAD_MAX_FILESIZE: u64 = 537_919_488;
const MAX_HUMAN_FILESIZE: &str = "Upload (max. 513 MB)";

/// A JSON endpoint matched from a request path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiRoute {
    /// `GET /status.php`
    Status,
    /// `GET .../files_trashbin/ajax/list.php`
    TrashList,
    /// `POST .../files_trashbin/ajax/undelete.php`
    TrashUndelete,
    /// `POST .../files_trashbin/ajax/delete.php`
    TrashDelete,
    /// `POST .../api/v1/files/<client path>`, still percent-encoded.
    Tag(String),
    /// `GET .../api/v1/tags/<favorite tag>/files`
    Favorites,
    /// `GET /index.php/core/search?query=<name>`
    Search,
    /// `GET .../files/ajax/getstoragestats.php`
    StorageStats,
}

impl ApiRoute {
    /// Match a request path against the JSON endpoints.
    pub fn match_path(path: &str) -> Option<Self> {
        let route = match path {
            "/status.php" => Self::Status,
            TRASH_LIST => Self::TrashList,
            TRASH_UNDELETE => Self::TrashUndelete,
            TRASH_DELETE => Self::TrashDelete,
            SEARCH => Self::Search,
            STORAGE_STATS => Self::StorageStats,
            _ => {
                // The tag in the listing URL arrives either raw or encoded.
                let decoded = percent_decode_str(path).decode_utf8_lossy();
                if decoded == FAVORITE_LIST {
                    return Some(Self::Favorites);
                }
                let rest = path.strip_prefix(FAVORITE_FILES)?;
                if !rest.is_empty() && !rest.starts_with('/') {
                    return None;
                }
                Self::Tag(rest.to_string())
            }
        };
        Some(route)
    }

    fn requires_session(&self) -> bool {
        !matches!(self, Self::Status)
    }
}

/// `status.php` body.
#[derive(Debug, Serialize)]
struct StatusBody {
    installed: bool,
    maintenance: bool,
    version: String,
    versionstring: String,
    edition: String,
}

/// Envelope of every trash answer.
#[derive(Debug, Serialize)]
struct Envelope<T> {
    data: T,
    status: &'static str,
}

#[derive(Debug, Serialize)]
struct TrashListing {
    directory: String,
    files: Vec<TrashEntry>,
    permission: i32,
}

#[derive(Debug, Serialize)]
struct TrashOutcome {
    success: Vec<TrashedItem>,
}

/// Body of `undelete.php` and `delete.php`, from JSON or a form.
#[derive(Debug, Default, Deserialize, PartialEq, Eq)]
pub struct TrashRequest {
    /// Trash directory the names are relative to.
    #[serde(default)]
    pub dir: String,
    /// Names inside `dir`.
    #[serde(default)]
    pub files: Vec<String>,
    /// Purge everything in `dir`.
    #[serde(default)]
    pub allfiles: bool,
}

impl TrashRequest {
    /// Parse a JSON object or an `application/x-www-form-urlencoded` body.
    /// The form's `files` field may hold a JSON array.
    pub fn parse(body: &[u8]) -> AppResult<Self> {
        let trimmed = body.trim_ascii_start();
        if trimmed.starts_with(b"{") {
            return serde_json::from_slice(trimmed)
                .map_err(|e| AppError::validation(format!("Malformed trash request: {e}")));
        }

        let mut request = Self::default();
        let raw = std::str::from_utf8(body)
            .map_err(|_| AppError::validation("Trash request is not UTF-8"))?;
        for (key, value) in form_pairs(raw) {
            match key.as_str() {
                "dir" => request.dir = value,
                "allfiles" => request.allfiles = value == "true",
                "files" if value.starts_with('[') => {
                    let names: Vec<String> = serde_json::from_str(&value).map_err(|e| {
                        AppError::validation(format!("Malformed files list: {e}"))
                    })?;
                    request.files.extend(names);
                }
                "files" | "files[]" => request.files.push(value),
                _ => {}
            }
        }
        Ok(request)
    }
}

fn form_pairs(raw: &str) -> impl Iterator<Item = (String, String)> + '_ {
    raw.split('&').filter(|pair| !pair.is_empty()).map(|pair| {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        (form_decode(key), form_decode(value))
    })
}

fn form_decode(raw: &str) -> String {
    percent_decode_str(&raw.replace('+', " "))
        .decode_utf8_lossy()
        .into_owned()
}

fn query_param(query: Option<&str>, name: &str) -> Option<String> {
    form_pairs(query.unwrap_or_default())
        .find(|(key, _)| key == name)
        .map(|(_, value)| value)
}

/// Body of the tag endpoint.
#[derive(Debug, Default, Serialize, Deserialize)]
struct TagBody {
    #[serde(default)]
    tags: Vec<String>,
}

#[derive(Debug, Serialize)]
struct FavoriteListing {
    files: Vec<FavoriteEntry>,
}

/// One favorited node in the listing.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FavoriteEntry {
    etag: String,
    id: NodeId,
    mimetype: String,
    mtime: i64,
    name: String,
    parent_id: Option<NodeId>,
    path: String,
    permissions: i32,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    share_types: Vec<i32>,
    size: u64,
    tags: Vec<String>,
    #[serde(rename = "type")]
    kind: String,
}

/// One search hit. Every value is a string.
#[derive(Debug, Serialize)]
struct SearchHit {
    id: String,
    link: String,
    mime: String,
    mime_type: String,
    modified: String,
    name: String,
    path: String,
    permissions: String,
    size: String,
    #[serde(rename = "type")]
    kind: String,
}

/// A node found by name, with the client path it is reachable under.
struct NameMatch {
    node: Node,
    client: StoragePath,
    permissions: i32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StorageStats {
    upload_max_filesize: u64,
    max_human_filesize: &'static str,
    free_space: u64,
    used_space_percent: u8,
    owner: String,
    owner_display_name: String,
}

/// JSON endpoint handler
#[derive(Debug, Clone)]
pub struct ApiHandler {
    ctx: Arc<DavContext>,
}

impl ApiHandler {
    /// Create a handler over the shared adapter state.
    pub fn new(ctx: Arc<DavContext>) -> Self {
        Self { ctx }
    }

    /// Answer `route` on behalf of `identity`.
    pub async fn handle(
        &self,
        route: ApiRoute,
        identity: &Identity,
        req: Request<Bytes>,
    ) -> Response<DavBody> {
        if route.requires_session() && identity.is_anonymous() {
            return error_response(&AppError::authentication("No valid session"));
        }

        let result = match (&route, req.method()) {
            (ApiRoute::Status, &Method::GET) => self.status().await,
            (ApiRoute::TrashList, &Method::GET) => self.trash_list(identity, &req).await,
            (ApiRoute::TrashUndelete, &Method::POST) => {
                self.trash_undelete(identity, req.body()).await
            }
            (ApiRoute::TrashDelete, &Method::POST) => self.trash_delete(identity, req.body()).await,
            (ApiRoute::Tag(path), &Method::POST) => self.tag(identity, path, req.body()).await,
            (ApiRoute::Favorites, &Method::GET) => self.favorites(identity).await,
            (ApiRoute::Search, &Method::GET) => {
                let query = query_param(req.uri().query(), "query").unwrap_or_default();
                self.search(identity, &query).await
            }
            (ApiRoute::StorageStats, &Method::GET) => self.storage_stats(identity).await,
            _ => {
                tracing::warn!("{} called with {}", req.uri().path(), req.method());
                return status_only(StatusCode::METHOD_NOT_ALLOWED);
            }
        };

        result.unwrap_or_else(|e| error_response(&e))
    }

    async fn status(&self) -> AppResult<Response<DavBody>> {
        let version = self
            .ctx
            .stores
            .settings
            .get(VERSION)
            .await?
            .unwrap_or_default();
        json_response(&StatusBody {
            installed: true,
            maintenance: false,
            versionstring: version.clone(),
            version,
            edition: String::new(),
        })
    }

    async fn trash_list(
        &self,
        identity: &Identity,
        req: &Request<Bytes>,
    ) -> AppResult<Response<DavBody>> {
        provision::ensure_home(&self.ctx, identity).await?;
        let dir = query_param(req.uri().query(), "dir").unwrap_or_else(|| "/".to_string());
        let files = TrashBin::new(&self.ctx, identity)
            .list(&StoragePath::parse(&dir)?)
            .await?;
        tracing::debug!("Trash listing of '{}' for {}: {} entries", dir, identity.username, files.len());

        json_response(&Envelope {
            data: TrashListing {
                directory: dir,
                files,
                permission: 0,
            },
            status: "success",
        })
    }

    async fn trash_undelete(&self, identity: &Identity, body: &[u8]) -> AppResult<Response<DavBody>> {
        let request = TrashRequest::parse(body)?;
        let dir = StoragePath::parse(&request.dir)?;
        let bin = TrashBin::new(&self.ctx, identity);

        let mut names = request.files;
        if request.allfiles {
            names = bin.names(&dir).await?;
        }

        let mut success = Vec::new();
        for name in names {
            let item = bin.locate(&dir, &name).await?;
            let timestamp = bin.timestamp(&item).await?;
            bin.restore(&item).await?;
            success.push(TrashedItem {
                filename: name,
                timestamp: timestamp.to_string(),
            });
        }

        json_response(&Envelope {
            data: TrashOutcome { success },
            status: "success",
        })
    }

    async fn trash_delete(&self, identity: &Identity, body: &[u8]) -> AppResult<Response<DavBody>> {
        let request = TrashRequest::parse(body)?;
        let dir = StoragePath::parse(&request.dir)?;
        let bin = TrashBin::new(&self.ctx, identity);

        let mut success = Vec::new();
        if request.allfiles {
            for name in bin.names(&dir).await? {
                let item = bin.locate(&dir, &name).await?;
                bin.purge(&item).await?;
            }
        } else {
            for name in request.files {
                let item = bin.locate(&dir, &name).await?;
                let timestamp = bin.purge(&item).await?;
                success.push(TrashedItem {
                    filename: name,
                    timestamp: timestamp.to_string(),
                });
            }
        }

        json_response(&Envelope {
            data: TrashOutcome { success },
            status: "success",
        })
    }

    async fn tag(
        &self,
        identity: &Identity,
        encoded: &str,
        body: &[u8],
    ) -> AppResult<Response<DavBody>> {
        let client = StoragePath::from_encoded(encoded)?;
        let tags: TagBody = if body.trim_ascii().is_empty() {
            TagBody::default()
        } else {
            serde_json::from_slice(body)
                .map_err(|e| AppError::validation(format!("Malformed tag request: {e}")))?
        };

        let resolved = self.ctx.resolver().resolve(&client, identity).await?;
        let favorites = &self.ctx.stores.favorites;
        favorites.unmark(&resolved.path, &identity.username).await?;
        if tags.tags.iter().any(|t| t == FAVORITE_TAG) {
            favorites.mark(&resolved.path, &identity.username).await?;
            tracing::debug!("{} marked '{}' as favorite", identity.username, resolved.path);
        }

        json_response(&tags)
    }

    async fn favorites(&self, identity: &Identity) -> AppResult<Response<DavBody>> {
        let home = self
            .ctx
            .stores
            .nodes
            .get(&StoragePath::home(&identity.username))
            .await?;

        let mut files = Vec::new();
        for node in self.ctx.stores.favorites.list(&identity.username).await? {
            match self.favorite_entry(identity, &node, home.as_ref()).await {
                Ok(entry) => files.push(entry),
                Err(e) => tracing::error!("Skipping favorite '{}': {}", node.path, e),
            }
        }
        json_response(&FavoriteListing { files })
    }

    async fn favorite_entry(
        &self,
        identity: &Identity,
        node: &Node,
        home: Option<&Node>,
    ) -> AppResult<FavoriteEntry> {
        let path = node.storage_path()?;
        let physical = self.ctx.fs_path(&path);
        let metadata = tokio::fs::metadata(&physical).await?;
        let size = if node.is_dir {
            walk::tree_size(physical).await?
        } else {
            metadata.len()
        };
        let mtime = metadata
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_millis() as i64)
            .unwrap_or_default();

        let owner_home = StoragePath::home(&node.owner);
        let parent = path
            .parent()
            .and_then(|p| p.strip_prefix(&owner_home))
            .unwrap_or_default();
        let shares = self.ctx.stores.shares.get_by_node(node.id).await?;

        Ok(FavoriteEntry {
            etag: node.id.to_string(),
            id: node.id,
            mimetype: node.mime_type.clone(),
            mtime,
            name: node.name().to_string(),
            parent_id: home.map(|h| h.id),
            path: format!("/{parent}"),
            permissions: if node.is_dir { 31 } else { 27 },
            share_types: if node.owner == identity.username {
                share_type_codes(&shares)
            } else {
                Vec::new()
            },
            size,
            tags: vec![FAVORITE_TAG.to_string()],
            kind: if node.is_dir { "dir" } else { "file" }.to_string(),
        })
    }

    /// Nodes named exactly `query` in the caller's tree and in every share
    /// reaching the caller. Own nodes come first; a node is listed once.
    async fn search(&self, identity: &Identity, query: &str) -> AppResult<Response<DavBody>> {
        if query.is_empty() || query.contains('/') {
            return json_response(&Vec::<SearchHit>::new());
        }
        let Ok(name) = StoragePath::from_segments(vec![query.to_string()]) else {
            return json_response(&Vec::<SearchHit>::new());
        };

        let matches = self.find_by_name(identity, &name).await?;
        let mut hits = Vec::with_capacity(matches.len());
        for found in matches {
            match self.search_hit(&found).await {
                Ok(hit) => hits.push(hit),
                Err(e) => tracing::error!("Skipping search hit '{}': {}", found.node.path, e),
            }
        }
        tracing::debug!("Search '{}' for {}: {} hits", query, identity.username, hits.len());
        json_response(&hits)
    }

    async fn find_by_name(
        &self,
        identity: &Identity,
        name: &StoragePath,
    ) -> AppResult<Vec<NameMatch>> {
        let nodes = &self.ctx.stores.nodes;
        let mut seen = HashSet::new();
        let mut found = Vec::new();

        let home = StoragePath::home(&identity.username);
        for node in nodes.find_by_name_suffix(name, &identity.username).await? {
            let Some(client) = node.storage_path()?.strip_prefix(&home) else {
                continue;
            };
            if client.is_root() || !seen.insert(node.id) {
                continue;
            }
            let permissions = if node.is_dir { 31 } else { 27 };
            found.push(NameMatch {
                node,
                client,
                permissions,
            });
        }

        for share in self.ctx.stores.shares.get_all_effective(identity).await? {
            let Some(root) = nodes.find_by_id(share.node_id).await? else {
                continue;
            };
            let root_path = root.storage_path()?;
            let live = root_path
                .strip_prefix(&StoragePath::home(&root.owner))
                .is_some_and(|rest| !rest.is_root());
            if !live {
                continue;
            }
            let mount = StoragePath::root().child(root.name());
            for node in nodes.find_by_name_suffix(name, &root.owner).await? {
                let Some(rest) = node.storage_path()?.strip_prefix(&root_path) else {
                    continue;
                };
                if !seen.insert(node.id) {
                    continue;
                }
                found.push(NameMatch {
                    node,
                    client: mount.join(&rest),
                    permissions: share.permissions,
                });
            }
        }
        Ok(found)
    }

    async fn search_hit(&self, found: &NameMatch) -> AppResult<SearchHit> {
        let node = &found.node;
        let physical = self.ctx.fs_path(&node.storage_path()?);
        let metadata = tokio::fs::metadata(&physical).await?;
        let size = if node.is_dir {
            walk::tree_size(physical).await?
        } else {
            metadata.len()
        };
        let modified = metadata
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_secs())
            .unwrap_or_default();
        let dir = found.client.parent().unwrap_or_default();

        Ok(SearchHit {
            id: node.id.to_string(),
            link: format!("/index.php/apps/files/?dir=/{dir}&scrollto={}", node.name()),
            mime: node.mime_type.clone(),
            mime_type: node.mime_type.clone(),
            modified: modified.to_string(),
            name: node.name().to_string(),
            path: found.client.to_string(),
            permissions: found.permissions.to_string(),
            size: size.to_string(),
            kind: if node.is_dir { "folder" } else { "file" }.to_string(),
        })
    }

    async fn storage_stats(&self, identity: &Identity) -> AppResult<Response<DavBody>> {
        let free_space = walk::free_space(self.ctx.dav_root.clone()).await?;
        json_response(&Envelope {
            data: StorageStats {
                upload_max_filesize: UPLOAD_MAX_FILESIZE,
                max_human_filesize: MAX_HUMAN_FILESIZE,
                free_space,
                used_space_percent: 0,
                owner: identity.username.clone(),
                owner_display_name: identity.username.clone(),
            },
            status: "success",
        })
    }
}

fn json_response<T: Serialize>(value: &T) -> AppResult<Response<DavBody>> {
    let body = serde_json::to_vec(value)?;
    let mut response = Response::new(full_body(body));
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    Ok(response)
}

fn status_only(status: StatusCode) -> Response<DavBody> {
    let mut response = Response::new(full_body(Bytes::new()));
    *response.status_mut() = status;
    response
}
