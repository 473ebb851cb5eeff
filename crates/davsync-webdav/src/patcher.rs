//! Multi-status document surgery.
//!
//! [`Multistatus`] wraps the parsed `<d:multistatus>` of a PROPFIND answer.
//! The free functions below operate on one `<d:response>` element: reading
//! and replacing its href, listing the properties the engine could not
//! answer, and moving a synthesized property from the `404` propstat into
//! the `200` one.

use std::collections::BTreeMap;

use xmltree::{Element, EmitterConfig, Namespace, XMLNode};

use davsync_core::error::{AppError, ErrorKind};
use davsync_core::result::AppResult;

use crate::properties::{DAV_NS, OC_NS, OC_PREFIX};

const STATUS_OK: &str = "HTTP/1.1 200 OK";

/// A parsed multi-status body.
#[derive(Debug, Clone)]
pub struct Multistatus {
    root: Element,
}

impl Multistatus {
    /// Parse `body`; `None` when it is not a DAV multi-status document.
    pub fn parse(body: &[u8]) -> Option<Self> {
        let root = Element::parse(body).ok()?;
        is_dav(&root, "multistatus").then_some(Self { root })
    }

    /// The `<response>` children.
    pub fn responses_mut(&mut self) -> impl Iterator<Item = &mut Element> {
        self.root
            .children
            .iter_mut()
            .filter_map(XMLNode::as_mut_element)
            .filter(|e| is_dav(e, "response"))
    }

    /// The first `<response>`, consuming the document.
    pub fn into_first_response(self) -> Option<Element> {
        self.root
            .children
            .into_iter()
            .filter_map(|node| match node {
                XMLNode::Element(e) if is_dav(&e, "response") => Some(e),
                _ => None,
            })
            .next()
    }

    /// Append a `<response>`.
    pub fn push_response(&mut self, response: Element) {
        self.root.children.push(XMLNode::Element(response));
    }

    /// Lowercase every namespace prefix, bind the vendor prefix on the root
    /// and serialize.
    pub fn finish(mut self) -> AppResult<Vec<u8>> {
        lowercase_prefixes(&mut self.root);
        self.root
            .namespaces
            .get_or_insert_with(Namespace::empty)
            .put(OC_PREFIX, OC_NS);

        let mut out = Vec::new();
        self.root
            .write_with_config(
                &mut out,
                EmitterConfig::new()
                    .perform_indent(false)
                    .write_document_declaration(true),
            )
            .map_err(|e| {
                AppError::new(
                    ErrorKind::Serialization,
                    format!("Failed to write multistatus: {e}"),
                )
            })?;
        Ok(out)
    }
}

/// Text of the response's `<href>`.
pub fn href(response: &Element) -> Option<String> {
    dav_child(response, "href")
        .and_then(|h| h.get_text())
        .map(|t| t.trim().to_string())
}

/// Replace the response's `<href>` text.
pub fn set_href(response: &mut Element, value: &str) {
    let prefix = response.prefix.clone();
    let position = response
        .children
        .iter()
        .position(|n| n.as_element().is_some_and(|e| is_dav(e, "href")));
    let href = match position {
        Some(idx) => match response.children[idx].as_mut_element() {
            Some(e) => e,
            None => return,
        },
        None => {
            response
                .children
                .insert(0, XMLNode::Element(dav_element("href", prefix)));
            match response.children[0].as_mut_element() {
                Some(e) => e,
                None => return,
            }
        }
    };
    href.children = vec![XMLNode::Text(value.to_string())];
}

/// Whether any propstat reports `<resourcetype><collection/></resourcetype>`.
pub fn is_collection(response: &Element) -> bool {
    dav_children(response, "propstat")
        .filter_map(|ps| dav_child(ps, "prop"))
        .filter_map(|prop| dav_child(prop, "resourcetype"))
        .any(|rt| dav_child(rt, "collection").is_some())
}

/// Local names of the properties reported in the `404` propstat.
pub fn missing_properties(response: &Element) -> Vec<String> {
    let Some(idx) = propstat_index(response, "404") else {
        return Vec::new();
    };
    response.children[idx]
        .as_element()
        .and_then(|ps| dav_child(ps, "prop"))
        .map(|prop| {
            prop.children
                .iter()
                .filter_map(XMLNode::as_element)
                .map(|e| e.name.clone())
                .collect()
        })
        .unwrap_or_default()
}

/// Drop `name` from the `404` propstat and add `value` to the `200` one,
/// creating it when the response has none. Returns whether `name` was
/// missing in the first place.
pub fn resolve_missing(response: &mut Element, name: &str, value: Element) -> bool {
    let Some(not_found) = propstat_index(response, "404") else {
        return false;
    };
    let taken = response.children[not_found]
        .as_mut_element()
        .and_then(|ps| dav_child_mut(ps, "prop"))
        .and_then(|prop| prop.take_child(name));
    if taken.is_none() {
        return false;
    }

    let found = match propstat_index(response, "200") {
        Some(idx) => idx,
        None => {
            let prefix = response.prefix.clone();
            let mut propstat = dav_element("propstat", prefix.clone());
            propstat
                .children
                .push(XMLNode::Element(dav_element("prop", prefix.clone())));
            let mut status = dav_element("status", prefix);
            status.children.push(XMLNode::Text(STATUS_OK.to_string()));
            propstat.children.push(XMLNode::Element(status));
            response
                .children
                .insert(not_found, XMLNode::Element(propstat));
            not_found
        }
    };

    if let Some(prop) = response.children[found]
        .as_mut_element()
        .and_then(|ps| dav_child_mut(ps, "prop"))
    {
        prop.children.push(XMLNode::Element(value));
    }
    true
}

/// Remove a `404` propstat whose `<prop>` has become empty.
pub fn prune_empty_not_found(response: &mut Element) {
    let Some(idx) = propstat_index(response, "404") else {
        return;
    };
    let empty = response.children[idx]
        .as_element()
        .and_then(|ps| dav_child(ps, "prop"))
        .is_none_or(|prop| !prop.children.iter().any(|n| n.as_element().is_some()));
    if empty {
        response.children.remove(idx);
    }
}

fn propstat_index(response: &Element, code: &str) -> Option<usize> {
    response.children.iter().position(|node| {
        node.as_element()
            .filter(|e| is_dav(e, "propstat"))
            .and_then(|ps| dav_child(ps, "status"))
            .and_then(|s| s.get_text())
            .is_some_and(|text| text.split_whitespace().nth(1) == Some(code))
    })
}

fn is_dav(element: &Element, name: &str) -> bool {
    element.name == name && element.namespace.as_deref() == Some(DAV_NS)
}

fn dav_children<'a>(element: &'a Element, name: &'a str) -> impl Iterator<Item = &'a Element> {
    element
        .children
        .iter()
        .filter_map(XMLNode::as_element)
        .filter(move |e| is_dav(e, name))
}

fn dav_child<'a>(element: &'a Element, name: &str) -> Option<&'a Element> {
    element
        .children
        .iter()
        .filter_map(XMLNode::as_element)
        .find(|e| is_dav(e, name))
}

fn dav_child_mut<'a>(element: &'a mut Element, name: &str) -> Option<&'a mut Element> {
    element
        .children
        .iter_mut()
        .filter_map(XMLNode::as_mut_element)
        .find(|e| is_dav(e, name))
}

fn dav_element(name: &str, prefix: Option<String>) -> Element {
    let mut element = Element::new(name);
    element.prefix = prefix;
    element.namespace = Some(DAV_NS.to_string());
    element
}

fn lowercase_prefixes(element: &mut Element) {
    if let Some(prefix) = element.prefix.as_mut() {
        *prefix = prefix.to_lowercase();
    }
    if let Some(namespaces) = element.namespaces.as_mut() {
        let lowered: BTreeMap<String, String> = std::mem::take(&mut namespaces.0)
            .into_iter()
            .map(|(prefix, uri)| (prefix.to_lowercase(), uri))
            .collect();
        namespaces.0 = lowered;
    }
    for child in element.children.iter_mut().filter_map(XMLNode::as_mut_element) {
        lowercase_prefixes(child);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::properties::oc_element;

    const LISTING: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<D:multistatus xmlns:D="DAV:">
  <D:response>
    <D:href>/remote.php/webdav/alice/files/docs/</D:href>
    <D:propstat>
      <D:prop><D:resourcetype><D:collection/></D:resourcetype></D:prop>
      <D:status>HTTP/1.1 200 OK</D:status>
    </D:propstat>
    <D:propstat>
      <D:prop><fileid xmlns="http://owncloud.org/ns"/><unknown xmlns="urn:x"/></D:prop>
      <D:status>HTTP/1.1 404 Not Found</D:status>
    </D:propstat>
  </D:response>
  <D:response>
    <D:href>/remote.php/webdav/alice/files/docs/a.txt</D:href>
    <D:propstat>
      <D:prop><fileid xmlns="http://owncloud.org/ns"/></D:prop>
      <D:status>HTTP/1.1 404 Not Found</D:status>
    </D:propstat>
  </D:response>
</D:multistatus>"#;

    fn fileid(text: &str) -> Element {
        let mut e = oc_element("fileid");
        e.children.push(XMLNode::Text(text.to_string()));
        e
    }

    #[test]
    fn test_not_multistatus() {
        assert!(Multistatus::parse(b"<html/>").is_none());
        assert!(Multistatus::parse(b"not xml").is_none());
    }

    #[test]
    fn test_href_and_collection() {
        let mut doc = Multistatus::parse(LISTING.as_bytes()).unwrap();
        let mut responses: Vec<&mut Element> = doc.responses_mut().collect();
        assert_eq!(responses.len(), 2);
        assert_eq!(
            href(responses[0]).as_deref(),
            Some("/remote.php/webdav/alice/files/docs/")
        );
        assert!(is_collection(responses[0]));
        assert!(!is_collection(responses[1]));

        set_href(responses[1], "/remote.php/webdav/docs/a.txt");
        assert_eq!(href(responses[1]).as_deref(), Some("/remote.php/webdav/docs/a.txt"));
    }

    #[test]
    fn test_resolve_missing_moves_property() {
        let mut doc = Multistatus::parse(LISTING.as_bytes()).unwrap();
        let response = doc.responses_mut().next().unwrap();
        assert_eq!(missing_properties(response), vec!["fileid", "unknown"]);

        assert!(resolve_missing(response, "fileid", fileid("12")));
        assert!(!resolve_missing(response, "getetag", fileid("12")));
        assert_eq!(missing_properties(response), vec!["unknown"]);

        prune_empty_not_found(response);
        assert_eq!(missing_properties(response), vec!["unknown"]);
    }

    #[test]
    fn test_found_propstat_created_and_empty_not_found_removed() {
        let mut doc = Multistatus::parse(LISTING.as_bytes()).unwrap();
        let response = doc.responses_mut().nth(1).unwrap();

        assert!(resolve_missing(response, "fileid", fileid("13")));
        prune_empty_not_found(response);

        let propstats: Vec<&Element> = dav_children(response, "propstat").collect();
        assert_eq!(propstats.len(), 1);
        let status = dav_child(propstats[0], "status").unwrap().get_text().unwrap();
        assert_eq!(status, STATUS_OK);
        let prop = dav_child(propstats[0], "prop").unwrap();
        assert_eq!(prop.get_child("fileid").unwrap().get_text().unwrap(), "13");
    }

    #[test]
    fn test_finish_lowercases_and_binds_vendor_prefix() {
        let mut doc = Multistatus::parse(LISTING.as_bytes()).unwrap();
        let response = doc.responses_mut().next().unwrap();
        resolve_missing(response, "fileid", fileid("12"));

        let out = String::from_utf8(doc.finish().unwrap()).unwrap();
        assert!(out.contains("<d:multistatus"));
        assert!(out.contains("xmlns:d=\"DAV:\""));
        assert!(out.contains("xmlns:oc=\"http://owncloud.org/ns\""));
        assert!(out.contains("<oc:fileid>12</oc:fileid>"));
        assert!(!out.contains("<D:"));
    }

    #[test]
    fn test_into_first_response() {
        let doc = Multistatus::parse(LISTING.as_bytes()).unwrap();
        let first = doc.into_first_response().unwrap();
        assert_eq!(
            href(&first).as_deref(),
            Some("/remote.php/webdav/alice/files/docs/")
        );
    }
}
