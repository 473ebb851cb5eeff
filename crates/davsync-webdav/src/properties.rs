//! Vendor properties synthesized into PROPFIND answers.
//!
//! The WebDAV engine knows nothing about `oc:fileid`, `oc:permissions` and
//! friends, so it reports them in the `404 Not Found` propstat. Each
//! [`OcProperty`] knows how to compute its value from the node record, the
//! node's shares and the caller.

use xmltree::{Element, XMLNode};

use davsync_core::result::AppResult;
use davsync_core::types::identity::Identity;
use davsync_entity::{Node, Share};

use crate::context::DavContext;
use crate::walk;

/// DAV namespace
pub const DAV_NS: &str = "DAV:";

/// Vendor namespace of the ownCloud properties
pub const OC_NS: &str = "http://owncloud.org/ns";

/// Prefix bound to [`OC_NS`] in every patched document
pub const OC_PREFIX: &str = "oc";

/// A property the patcher knows how to fill in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OcProperty {
    /// `oc:fileid`, the node id
    FileId,
    /// `oc:id`, the node id again
    Id,
    /// `oc:permissions`
    Permissions,
    /// `oc:share-types`
    ShareTypes,
    /// `oc:favorite`
    Favorite,
    /// `oc:size`, recursive for directories
    Size,
    /// `oc:owner-display-name`
    OwnerDisplayName,
}

impl OcProperty {
    /// Every patchable property.
    pub const ALL: [OcProperty; 7] = [
        Self::FileId,
        Self::Id,
        Self::Permissions,
        Self::ShareTypes,
        Self::Favorite,
        Self::Size,
        Self::OwnerDisplayName,
    ];

    /// Property for an element local name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.name() == name)
    }

    /// Element local name.
    pub fn name(self) -> &'static str {
        match self {
            Self::FileId => "fileid",
            Self::Id => "id",
            Self::Permissions => "permissions",
            Self::ShareTypes => "share-types",
            Self::Favorite => "favorite",
            Self::Size => "size",
            Self::OwnerDisplayName => "owner-display-name",
        }
    }

    /// The patched element, or `None` when the property stays unknown for
    /// this node.
    pub async fn render(
        self,
        ctx: &DavContext,
        identity: &Identity,
        node: &Node,
        shares: &[Share],
    ) -> AppResult<Option<Element>> {
        let element = match self {
            Self::FileId | Self::Id => text_element(self.name(), node.id.to_string()),
            Self::Permissions => {
                text_element(self.name(), permission_string(node, &identity.username))
            }
            Self::ShareTypes => {
                let codes = share_type_codes(shares);
                if codes.is_empty() {
                    return Ok(None);
                }
                let mut element = oc_element(self.name());
                for code in codes {
                    element
                        .children
                        .push(XMLNode::Element(text_element("share-type", code.to_string())));
                }
                element
            }
            Self::Favorite => {
                let favorite = ctx
                    .stores
                    .favorites
                    .is_favorite(node.id, &identity.username)
                    .await?;
                text_element(self.name(), if favorite { "1" } else { "0" })
            }
            Self::Size => {
                let path = ctx.fs_path(&node.storage_path()?);
                text_element(self.name(), walk::tree_size(path).await?.to_string())
            }
            Self::OwnerDisplayName => text_element(self.name(), node.owner.clone()),
        };
        Ok(Some(element))
    }
}

/// Permission string a caller sees for a node.
///
/// Files get `RDNVW`, directories `RDNVCK`; an `S` is prepended when the
/// caller does not own the node.
pub fn permission_string(node: &Node, username: &str) -> String {
    let base = if node.is_dir { "RDNVCK" } else { "RDNVW" };
    if node.owner == username {
        base.to_string()
    } else {
        format!("S{base}")
    }
}

/// Distinct share type codes in first-seen order.
pub fn share_type_codes(shares: &[Share]) -> Vec<i32> {
    let mut codes: Vec<i32> = Vec::new();
    for share in shares {
        let code = share.share_type.code();
        if !codes.contains(&code) {
            codes.push(code);
        }
    }
    codes
}

/// Local names of the properties a PROPFIND body asks for. Empty for an
/// empty body, `allprop` and `propname`.
pub fn requested_properties(body: &[u8]) -> Vec<String> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Vec::new();
    }
    let Ok(root) = Element::parse(body) else {
        return Vec::new();
    };
    let mut names = Vec::new();
    collect_prop_names(&root, &mut names);
    names
}

fn collect_prop_names(element: &Element, names: &mut Vec<String>) {
    for child in element.children.iter().filter_map(XMLNode::as_element) {
        if child.name == "prop" {
            for prop in child.children.iter().filter_map(XMLNode::as_element) {
                if !names.contains(&prop.name) {
                    names.push(prop.name.clone());
                }
            }
        } else {
            collect_prop_names(child, names);
        }
    }
}

/// An empty element in the vendor namespace.
pub fn oc_element(name: &str) -> Element {
    let mut element = Element::new(name);
    element.prefix = Some(OC_PREFIX.to_string());
    element.namespace = Some(OC_NS.to_string());
    element
}

fn text_element(name: &str, text: impl Into<String>) -> Element {
    let mut element = oc_element(name);
    element.children.push(XMLNode::Text(text.into()));
    element
}

#[cfg(test)]
mod tests {
    use super::*;
    use davsync_core::types::id::{NodeId, ShareId};
    use davsync_entity::ShareType;

    fn node(owner: &str, is_dir: bool) -> Node {
        Node {
            id: NodeId(7),
            owner: owner.to_string(),
            path: format!("{owner}/files/x"),
            is_dir,
            mime_type: "text/plain".to_string(),
            deleted: false,
        }
    }

    fn share(id: i64, share_type: ShareType) -> Share {
        Share {
            id: ShareId(id),
            node_id: NodeId(7),
            target: "org".to_string(),
            permissions: 31,
            share_type,
            created_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn test_permission_strings() {
        assert_eq!(permission_string(&node("alice", false), "alice"), "RDNVW");
        assert_eq!(permission_string(&node("alice", false), "bob"), "SRDNVW");
        assert_eq!(permission_string(&node("alice", true), "alice"), "RDNVCK");
        assert_eq!(permission_string(&node("alice", true), "bob"), "SRDNVCK");
    }

    #[test]
    fn test_share_type_codes_distinct() {
        let shares = vec![
            share(1, ShareType::Group),
            share(2, ShareType::User),
            share(3, ShareType::Group),
        ];
        assert_eq!(share_type_codes(&shares), vec![1, 0]);
        assert!(share_type_codes(&[]).is_empty());
    }

    #[test]
    fn test_from_name() {
        assert_eq!(OcProperty::from_name("fileid"), Some(OcProperty::FileId));
        assert_eq!(
            OcProperty::from_name("owner-display-name"),
            Some(OcProperty::OwnerDisplayName)
        );
        assert_eq!(OcProperty::from_name("getetag"), None);
    }

    #[test]
    fn test_requested_properties() {
        let body = br#"<?xml version="1.0"?>
            <d:propfind xmlns:d="DAV:" xmlns:oc="http://owncloud.org/ns">
              <d:prop>
                <d:getlastmodified/>
                <oc:fileid/>
                <oc:permissions/>
              </d:prop>
            </d:propfind>"#;
        assert_eq!(
            requested_properties(body),
            vec!["getlastmodified", "fileid", "permissions"]
        );
        assert!(requested_properties(b"").is_empty());
        assert!(requested_properties(b"<d:propfind xmlns:d=\"DAV:\"><d:allprop/></d:propfind>").is_empty());
    }
}
