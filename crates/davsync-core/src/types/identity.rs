//! The caller identity threaded explicitly through every adapter call.

use serde::{Deserialize, Serialize};

/// Who is making a request.
///
/// An absent or invalid session is represented by the zero value (empty
/// username); see [`Identity::is_anonymous`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Login name; also the first segment of every path the user owns.
    pub username: String,
    /// Flat list of dotted group-hierarchy strings (`org`, `org.eng`, ...).
    pub organizations: Vec<String>,
}

impl Identity {
    /// Create an identity for `username` with the given memberships.
    pub fn new(username: impl Into<String>, organizations: Vec<String>) -> Self {
        Self {
            username: username.into(),
            organizations,
        }
    }

    /// Whether this is the zero value produced for a missing session.
    pub fn is_anonymous(&self) -> bool {
        self.username.is_empty()
    }

    /// Whether a group share addressed to `target` reaches this caller.
    ///
    /// A target covers a membership when it equals it or is a dotted
    /// ancestor of it: `org` covers `org` and `org.eng`, not `organic`.
    pub fn is_member_of(&self, target: &str) -> bool {
        self.organizations
            .iter()
            .any(|org| group_covers(target, org))
    }

    /// Every group target that reaches this caller: each organization and
    /// all of its dotted ancestors, most specific first, without repeats.
    pub fn group_targets(&self) -> Vec<String> {
        let mut targets: Vec<String> = Vec::new();
        for org in &self.organizations {
            let mut current = org.as_str();
            loop {
                if !current.is_empty() && !targets.iter().any(|t| t == current) {
                    targets.push(current.to_string());
                }
                match current.rfind('.') {
                    Some(idx) => current = &current[..idx],
                    None => break,
                }
            }
        }
        targets
    }

    /// Top-level organizations of this caller, in first-seen order.
    pub fn group_roots(&self) -> Vec<String> {
        let mut roots: Vec<String> = Vec::new();
        for org in &self.organizations {
            let root = org.split('.').next().unwrap_or_default();
            if !root.is_empty() && !roots.iter().any(|r| r == root) {
                roots.push(root.to_string());
            }
        }
        roots
    }
}

/// `true` when `target` equals `group` or `group` is a dotted subgroup of it.
pub fn group_covers(target: &str, group: &str) -> bool {
    match group.strip_prefix(target) {
        Some("") => !target.is_empty(),
        Some(rest) => !target.is_empty() && rest.starts_with('.'),
        None => false,
    }
}
