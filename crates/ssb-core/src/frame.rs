//! Frame context resolution
//!
//! Maps an anchor's `target` attribute onto a [`NavigationTarget`] given the
//! position of the current window in the frame tree. Only navigations that
//! replace or escape the top-level document are ever candidates for redirect.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::types::NavigationTarget;

// =============================================================================
// Frame Identity
// =============================================================================

/// Position of the current window in the frame tree.
pub trait FrameIdentity {
    /// `window == window.top`
    fn is_top_level(&self) -> bool;

    /// `window.parent == window.top`. True for the top window itself.
    fn parent_is_top(&self) -> bool;

    /// Whether a `frame` or `iframe` with this `name` exists anywhere in the
    /// top document.
    fn has_named_frame(&self, name: &str) -> bool;

    /// The top-level document's current domain.
    fn top_domain(&self) -> &str;
}

/// Frame identity captured once at startup.
///
/// Frames are not expected to appear after load, so a snapshot stays valid
/// for the lifetime of the page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrameSnapshot {
    is_top_level: bool,
    parent_is_top: bool,
    frame_names: Vec<String>,
    top_domain: String,
}

impl FrameSnapshot {
    pub fn new(is_top_level: bool, parent_is_top: bool, top_domain: impl Into<String>) -> Self {
        Self {
            is_top_level,
            // the top window is its own parent
            parent_is_top: is_top_level || parent_is_top,
            frame_names: Vec::new(),
            top_domain: top_domain.into(),
        }
    }

    /// Snapshot for the top-level document.
    pub fn top_level(top_domain: impl Into<String>) -> Self {
        Self::new(true, true, top_domain)
    }

    /// Snapshot for a nested frame.
    pub fn nested(top_domain: impl Into<String>, parent_is_top: bool) -> Self {
        Self::new(false, parent_is_top, top_domain)
    }

    pub fn with_frame_name(mut self, name: impl Into<String>) -> Self {
        self.add_frame_name(name);
        self
    }

    pub fn add_frame_name(&mut self, name: impl Into<String>) {
        let name = name.into();
        if !name.is_empty() && !self.has_named_frame(&name) {
            self.frame_names.push(name);
        }
    }
}

impl FrameIdentity for FrameSnapshot {
    fn is_top_level(&self) -> bool {
        self.is_top_level
    }

    fn parent_is_top(&self) -> bool {
        self.parent_is_top
    }

    fn has_named_frame(&self, name: &str) -> bool {
        self.frame_names.iter().any(|n| n.eq_ignore_ascii_case(name))
    }

    fn top_domain(&self) -> &str {
        &self.top_domain
    }
}

impl<F: FrameIdentity + ?Sized> FrameIdentity for &F {
    fn is_top_level(&self) -> bool {
        (**self).is_top_level()
    }

    fn parent_is_top(&self) -> bool {
        (**self).parent_is_top()
    }

    fn has_named_frame(&self, name: &str) -> bool {
        (**self).has_named_frame(name)
    }

    fn top_domain(&self) -> &str {
        (**self).top_domain()
    }
}

/// Serialized frame identity, as sent by the page side.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase", default)]
#[ts(export)]
pub struct FrameDescriptor {
    pub is_top_level: bool,
    pub parent_is_top: bool,
    pub frame_names: Vec<String>,
    pub domain: String,
}

impl From<FrameDescriptor> for FrameSnapshot {
    fn from(desc: FrameDescriptor) -> Self {
        let mut snapshot = FrameSnapshot::new(desc.is_top_level, desc.parent_is_top, desc.domain);
        for name in desc.frame_names {
            snapshot.add_frame_name(name);
        }
        snapshot
    }
}

// =============================================================================
// Target Resolution
// =============================================================================

/// Parsed form of a raw `target` attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawTarget<'a> {
    SelfFrame,
    Top,
    Parent,
    Blank,
    Named(&'a str),
}

impl<'a> RawTarget<'a> {
    /// Parse a raw attribute. Keywords are case-insensitive; empty means `_self`.
    pub fn parse(raw: &'a str) -> Self {
        if raw.is_empty() || raw.eq_ignore_ascii_case("_self") {
            Self::SelfFrame
        } else if raw.eq_ignore_ascii_case("_top") {
            Self::Top
        } else if raw.eq_ignore_ascii_case("_parent") {
            Self::Parent
        } else if raw.eq_ignore_ascii_case("_blank") {
            Self::Blank
        } else {
            Self::Named(raw)
        }
    }
}

/// Resolve a raw `target` attribute against the current frame.
pub fn resolve_target<F: FrameIdentity + ?Sized>(raw_target: &str, frame: &F) -> NavigationTarget {
    match RawTarget::parse(raw_target) {
        RawTarget::Top => NavigationTarget::Internal,
        RawTarget::SelfFrame => {
            if frame.is_top_level() {
                NavigationTarget::Internal
            } else {
                NavigationTarget::SubFrame
            }
        }
        RawTarget::Parent => {
            if frame.parent_is_top() {
                NavigationTarget::Internal
            } else {
                NavigationTarget::SubFrame
            }
        }
        RawTarget::Blank => NavigationTarget::External,
        RawTarget::Named(name) => {
            if frame.has_named_frame(name) {
                NavigationTarget::SubFrame
            } else {
                NavigationTarget::External
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_raw_target() {
        assert_eq!(RawTarget::parse(""), RawTarget::SelfFrame);
        assert_eq!(RawTarget::parse("_SELF"), RawTarget::SelfFrame);
        assert_eq!(RawTarget::parse("_Top"), RawTarget::Top);
        assert_eq!(RawTarget::parse("_parent"), RawTarget::Parent);
        assert_eq!(RawTarget::parse("_BLANK"), RawTarget::Blank);
        assert_eq!(RawTarget::parse("preview"), RawTarget::Named("preview"));
    }

    #[test]
    fn test_resolve_top_level() {
        let top = FrameSnapshot::top_level("example.com");
        assert_eq!(resolve_target("", &top), NavigationTarget::Internal);
        assert_eq!(resolve_target("_self", &top), NavigationTarget::Internal);
        assert_eq!(resolve_target("_top", &top), NavigationTarget::Internal);
        assert_eq!(resolve_target("_parent", &top), NavigationTarget::Internal);
        assert_eq!(resolve_target("_blank", &top), NavigationTarget::External);
        assert_eq!(resolve_target("somewhere", &top), NavigationTarget::External);
    }

    #[test]
    fn test_resolve_nested() {
        let child = FrameSnapshot::nested("example.com", true);
        assert_eq!(resolve_target("", &child), NavigationTarget::SubFrame);
        assert_eq!(resolve_target("_top", &child), NavigationTarget::Internal);
        assert_eq!(resolve_target("_parent", &child), NavigationTarget::Internal);

        let grandchild = FrameSnapshot::nested("example.com", false);
        assert_eq!(resolve_target("_parent", &grandchild), NavigationTarget::SubFrame);
        assert_eq!(resolve_target("_blank", &grandchild), NavigationTarget::External);
    }

    #[test]
    fn test_resolve_named_frame() {
        let top = FrameSnapshot::top_level("example.com").with_frame_name("preview");
        assert_eq!(resolve_target("preview", &top), NavigationTarget::SubFrame);
        assert_eq!(resolve_target("PREVIEW", &top), NavigationTarget::SubFrame);
        assert_eq!(resolve_target("other", &top), NavigationTarget::External);
    }

    #[test]
    fn test_top_level_parent_is_top() {
        let top = FrameSnapshot::new(true, false, "example.com");
        assert!(top.parent_is_top());
    }

    #[test]
    fn test_descriptor_into_snapshot() {
        let desc: FrameDescriptor = serde_json::from_str(
            r#"{"isTopLevel":false,"parentIsTop":true,"frameNames":["x"],"domain":"example.com"}"#,
        )
        .unwrap();
        let snap = FrameSnapshot::from(desc);
        assert!(!snap.is_top_level());
        assert!(snap.parent_is_top());
        assert!(snap.has_named_frame("x"));
        assert_eq!(snap.top_domain(), "example.com");
    }

    #[test]
    fn test_frame_names_deduplicated() {
        let mut snap = FrameSnapshot::top_level("example.com");
        snap.add_frame_name("a");
        snap.add_frame_name("A");
        snap.add_frame_name("");
        assert_eq!(snap, FrameSnapshot::top_level("example.com").with_frame_name("a"));
    }

    #[test]
    fn test_named_frame_ignores_ascii_case() {
        let top = FrameSnapshot::top_level("example.com").with_frame_name("Preview");
        assert_eq!(resolve_target("Preview", &top), NavigationTarget::SubFrame);
        assert_eq!(resolve_target("preview", &top), NavigationTarget::SubFrame);
        assert_eq!(resolve_target("PREVIEW", &top), NavigationTarget::SubFrame);
        assert_eq!(resolve_target("Preview2", &top), NavigationTarget::External);

        let child = FrameSnapshot::nested("example.com", true).with_frame_name("Sidebar");
        assert_eq!(resolve_target("sidebar", &child), NavigationTarget::SubFrame);
    }
}
