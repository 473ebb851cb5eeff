//! Segment-based path algebra.
//!
//! Every path the server reasons about (client paths below the WebDAV
//! prefix, storage paths of the form `<owner>/files/...`, hrefs coming back
//! from the WebDAV engine) is turned into a [`StoragePath`] at the edge.
//! Prefix tests, joins and ancestor walks then work on whole segments, so
//! `alice/files/a` is never mistaken for a prefix of `alice/files/ab`.

use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::str::FromStr;

use percent_encoding::{AsciiSet, CONTROLS, percent_decode_str, utf8_percent_encode};

use crate::error::AppError;

/// Characters escaped inside one href segment. `+` is left alone because
/// sync clients send it literally and expect it back literally.
const SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}')
    .add(b'/')
    .add(b'\\');

/// Name of the per-user directory holding live files.
pub const FILES_DIR: &str = "files";
/// Name of the per-user directory holding trashed files.
pub const TRASH_DIR: &str = "files_trash";

/// An ordered list of non-empty path segments.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StoragePath {
    segments: Vec<String>,
}

impl StoragePath {
    /// The empty path (the WebDAV root or the DAV root directory).
    pub fn root() -> Self {
        Self::default()
    }

    /// Parse a `/`-separated, already decoded path.
    ///
    /// Empty and `.` segments are dropped; `..` is rejected.
    pub fn parse(raw: &str) -> Result<Self, AppError> {
        let mut segments = Vec::new();
        for segment in raw.split('/') {
            match segment {
                "" | "." => continue,
                ".." => {
                    return Err(AppError::validation(format!(
                        "Parent traversal is not allowed in '{raw}'"
                    )));
                }
                s => segments.push(s.to_string()),
            }
        }
        Ok(Self { segments })
    }

    /// Parse a percent-encoded path, decoding each segment on its own.
    ///
    /// `+` is never turned into a space.
    pub fn from_encoded(raw: &str) -> Result<Self, AppError> {
        let mut decoded = Vec::new();
        for segment in raw.split('/').filter(|s| !s.is_empty()) {
            let text = percent_decode_str(segment)
                .decode_utf8()
                .map_err(|e| {
                    AppError::with_source(
                        crate::error::ErrorKind::Validation,
                        format!("Path segment '{segment}' is not valid UTF-8"),
                        e,
                    )
                })?;
            if text.contains('/') {
                return Err(AppError::validation(format!(
                    "Encoded separator in path segment '{segment}'"
                )));
            }
            decoded.push(text.into_owned());
        }
        Self::from_segments(decoded)
    }

    /// Build a path from individual segments.
    pub fn from_segments<I, S>(segments: I) -> Result<Self, AppError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut out = Vec::new();
        for segment in segments {
            let segment = segment.into();
            if segment == ".." || segment.contains('/') {
                return Err(AppError::validation(format!(
                    "Invalid path segment '{segment}'"
                )));
            }
            if segment.is_empty() || segment == "." {
                continue;
            }
            out.push(segment);
        }
        Ok(Self { segments: out })
    }

    /// `<user>`: the account container.
    pub fn user_root(username: &str) -> Self {
        Self {
            segments: vec![username.to_string()],
        }
    }

    /// `<user>/files`: the home directory every client path is relative to.
    pub fn home(username: &str) -> Self {
        Self::user_root(username).child(FILES_DIR)
    }

    /// `<user>/files_trash`: the trash container.
    pub fn trash_root(username: &str) -> Self {
        Self::user_root(username).child(TRASH_DIR)
    }

    /// The segments of this path.
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Number of segments.
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// Whether this is the empty path.
    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// First segment. For storage paths this is the owning username.
    pub fn owner(&self) -> Option<&str> {
        self.segments.first().map(String::as_str)
    }

    /// Last segment.
    pub fn leaf(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    /// The path without its last segment, or `None` for the root.
    pub fn parent(&self) -> Option<Self> {
        if self.segments.is_empty() {
            return None;
        }
        Some(Self {
            segments: self.segments[..self.segments.len() - 1].to_vec(),
        })
    }

    /// Append one segment taken from outside input. Names that are empty,
    /// `.`, `..`, or contain a separator or NUL are rejected.
    pub fn try_child(&self, name: &str) -> Result<Self, AppError> {
        if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\0']) {
            return Err(AppError::validation(format!("Invalid file name '{name}'")));
        }
        Ok(self.child(name))
    }

    /// Append one segment. `name` must already be a single valid segment;
    /// use [`try_child`](Self::try_child) for names from requests.
    pub fn child(&self, name: &str) -> Self {
        let mut segments = self.segments.clone();
        if !name.is_empty() {
            segments.push(name.to_string());
        }
        Self { segments }
    }

    /// Append all segments of `other`.
    pub fn join(&self, other: &StoragePath) -> Self {
        let mut segments = self.segments.clone();
        segments.extend(other.segments.iter().cloned());
        Self { segments }
    }

    /// Replace the last segment.
    pub fn with_leaf(&self, name: &str) -> Self {
        match self.parent() {
            Some(parent) => parent.child(name),
            None => Self::root().child(name),
        }
    }

    /// Segment-wise prefix test. Every path starts with the root.
    pub fn starts_with(&self, prefix: &StoragePath) -> bool {
        self.segments.len() >= prefix.segments.len()
            && self.segments[..prefix.segments.len()] == prefix.segments[..]
    }

    /// Segment-wise suffix test.
    pub fn ends_with(&self, suffix: &StoragePath) -> bool {
        let n = suffix.segments.len();
        self.segments.len() >= n && self.segments[self.segments.len() - n..] == suffix.segments[..]
    }

    /// The remainder after `prefix`, or `None` when `prefix` does not match.
    pub fn strip_prefix(&self, prefix: &StoragePath) -> Option<Self> {
        if !self.starts_with(prefix) {
            return None;
        }
        Some(Self {
            segments: self.segments[prefix.segments.len()..].to_vec(),
        })
    }

    /// Non-empty leading sub-paths, longest first: `a/b/c`, `a/b`, `a`.
    pub fn prefixes(&self) -> impl Iterator<Item = StoragePath> + '_ {
        (1..=self.segments.len()).rev().map(move |n| Self {
            segments: self.segments[..n].to_vec(),
        })
    }

    /// Non-empty trailing sub-paths, longest first: `a/b/c`, `b/c`, `c`.
    pub fn suffixes(&self) -> impl Iterator<Item = StoragePath> + '_ {
        (0..self.segments.len()).map(move |start| Self {
            segments: self.segments[start..].to_vec(),
        })
    }

    /// Percent-encode each segment and join them with `/`.
    pub fn to_encoded(&self) -> String {
        self.segments
            .iter()
            .map(|s| utf8_percent_encode(s, SEGMENT).to_string())
            .collect::<Vec<_>>()
            .join("/")
    }

    /// Location of this path below a physical root directory.
    pub fn to_fs_path(&self, root: &Path) -> PathBuf {
        let mut buf = root.to_path_buf();
        for segment in &self.segments {
            buf.push(segment);
        }
        buf
    }

    /// Inverse of [`to_fs_path`](Self::to_fs_path).
    pub fn from_fs_path(root: &Path, path: &Path) -> Result<Self, AppError> {
        let relative = path.strip_prefix(root).map_err(|_| {
            AppError::internal(format!(
                "'{}' is not below '{}'",
                path.display(),
                root.display()
            ))
        })?;
        let mut segments = Vec::new();
        for component in relative.components() {
            match component {
                Component::Normal(name) => segments.push(name.to_string_lossy().into_owned()),
                Component::CurDir => continue,
                _ => {
                    return Err(AppError::internal(format!(
                        "Unexpected component in '{}'",
                        relative.display()
                    )));
                }
            }
        }
        Ok(Self { segments })
    }
}

impl fmt::Display for StoragePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segments.join("/"))
    }
}

impl FromStr for StoragePath {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(s: &str) -> StoragePath {
        StoragePath::parse(s).unwrap()
    }

    #[test]
    fn test_parse_normalizes_slashes() {
        assert_eq!(p("/alice//files/a/").to_string(), "alice/files/a");
        assert!(p("/").is_root());
        assert!(StoragePath::parse("alice/../bob").is_err());
    }

    #[test]
    fn test_prefix_is_segment_bounded() {
        assert!(p("alice/files/a/b").starts_with(&p("alice/files/a")));
        assert!(!p("alice/files/ab").starts_with(&p("alice/files/a")));
        assert!(p("alice").starts_with(&StoragePath::root()));
    }

    #[test]
    fn test_strip_prefix_and_join() {
        let rest = p("alice/files/shared/report.txt")
            .strip_prefix(&p("alice/files"))
            .unwrap();
        assert_eq!(rest.to_string(), "shared/report.txt");
        assert_eq!(p("bob/files").join(&rest).to_string(), "bob/files/shared/report.txt");
        assert!(p("alice/x").strip_prefix(&p("bob")).is_none());
    }

    #[test]
    fn test_parent_leaf_owner() {
        let path = p("alice/files/doc.txt");
        assert_eq!(path.owner(), Some("alice"));
        assert_eq!(path.leaf(), Some("doc.txt"));
        assert_eq!(path.parent().unwrap().to_string(), "alice/files");
        assert!(StoragePath::root().parent().is_none());
        assert_eq!(path.with_leaf("other.txt").to_string(), "alice/files/other.txt");
    }

    #[test]
    fn test_prefixes_and_suffixes_walk_longest_first() {
        let path = p("a/b/c");
        let prefixes: Vec<String> = path.prefixes().map(|x| x.to_string()).collect();
        assert_eq!(prefixes, vec!["a/b/c", "a/b", "a"]);
        let suffixes: Vec<String> = path.suffixes().map(|x| x.to_string()).collect();
        assert_eq!(suffixes, vec!["a/b/c", "b/c", "c"]);
        assert_eq!(StoragePath::root().prefixes().count(), 0);
    }

    #[test]
    fn test_ends_with() {
        assert!(p("alice/files/shared").ends_with(&p("shared")));
        assert!(!p("alice/files/xshared").ends_with(&p("shared")));
    }

    #[test]
    fn test_encoded_keeps_plus_literal() {
        let path = StoragePath::from_encoded("/a%20b/c+d/%C3%A9").unwrap();
        assert_eq!(path.segments(), ["a b", "c+d", "é"]);
        assert_eq!(path.to_encoded(), "a%20b/c+d/%C3%A9");
    }

    #[test]
    fn test_encoded_separator_rejected() {
        assert!(StoragePath::from_encoded("/a%2Fb").is_err());
    }

    #[test]
    fn test_fs_round_trip() {
        let root = Path::new("/srv/dav");
        let path = p("alice/files/a.txt");
        let fs = path.to_fs_path(root);
        assert_eq!(fs, PathBuf::from("/srv/dav/alice/files/a.txt"));
        assert_eq!(StoragePath::from_fs_path(root, &fs).unwrap(), path);
    }

    #[test]
    fn test_try_child_rejects_traversal() {
        let trash = p("alice/files_trash");
        assert_eq!(trash.try_child("a.txt").unwrap().to_string(), "alice/files_trash/a.txt");
        for bad in ["", ".", "..", "../../bob/files/secret.txt", "a/b", "nul\0byte"] {
            assert!(trash.try_child(bad).is_err(), "{bad:?}");
        }
    }

    #[test]
    fn test_well_known_containers() {
        assert_eq!(StoragePath::home("bob").to_string(), "bob/files");
        assert_eq!(StoragePath::trash_root("bob").to_string(), "bob/files_trash");
    }
}
