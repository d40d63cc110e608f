//! Core type definitions for the link interceptor
//!
//! These types describe a single clicked link, where its navigation would
//! land, and the decision the engine reached for it.

use std::fmt;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

// =============================================================================
// Navigation Targets
// =============================================================================

/// Where a navigation would take place, relative to the wrapped app.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum NavigationTarget {
    /// Replaces the top-level document of the app
    Internal,
    /// Opens a new browsing context the app does not track
    External,
    /// Stays below the top-level document (never redirected)
    SubFrame,
}

impl NavigationTarget {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Internal => "internal",
            Self::External => "external",
            Self::SubFrame => "subframe",
        }
    }

    /// Whether the navigation affects the top-level browsing context.
    #[inline]
    pub fn is_top_level(self) -> bool {
        !matches!(self, Self::SubFrame)
    }
}

impl fmt::Display for NavigationTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Mouse Events
// =============================================================================

/// The mouse interaction that triggered a dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Click,
    Mousedown,
}

impl EventKind {
    /// Parse from a DOM event type string.
    pub fn from_str(s: &str) -> Option<Self> {
        if s.eq_ignore_ascii_case("click") {
            Some(Self::Click)
        } else if s.eq_ignore_ascii_case("mousedown") {
            Some(Self::Mousedown)
        } else {
            None
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Click => "click",
            Self::Mousedown => "mousedown",
        }
    }
}

bitflags::bitflags! {
    /// Listener slots installed on an anchor element.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ListenerKinds: u8 {
        const CLICK = 1 << 0;
        const MOUSEDOWN = 1 << 1;

        /// Every listener the interceptor installs
        const ALL = Self::CLICK.bits() | Self::MOUSEDOWN.bits();
    }
}

impl From<EventKind> for ListenerKinds {
    fn from(kind: EventKind) -> Self {
        match kind {
            EventKind::Click => Self::CLICK,
            EventKind::Mousedown => Self::MOUSEDOWN,
        }
    }
}

// =============================================================================
// Link Descriptor
// =============================================================================

/// The subject of a single decision, built fresh for every mouse event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkDescriptor<'a> {
    /// Link URL, absolute or relative
    pub href: &'a str,
    /// Raw `target` attribute, possibly empty
    pub raw_target: &'a str,
    /// Event that produced this descriptor
    pub event: EventKind,
}

impl<'a> LinkDescriptor<'a> {
    pub fn new(href: &'a str, raw_target: &'a str, event: EventKind) -> Self {
        Self { href, raw_target, event }
    }

    pub fn click(href: &'a str, raw_target: &'a str) -> Self {
        Self::new(href, raw_target, EventKind::Click)
    }

    pub fn mousedown(href: &'a str) -> Self {
        Self::new(href, "", EventKind::Mousedown)
    }

    #[inline]
    pub fn is_mousedown(&self) -> bool {
        self.event == EventKind::Mousedown
    }
}

// =============================================================================
// Decisions
// =============================================================================

/// Tri-state redirect verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verdict {
    /// No step has claimed the link yet
    #[default]
    Undecided,
    /// Let the wrapper follow the link
    Allow,
    /// Hand the link to the external handler
    Redirect,
}

impl Verdict {
    #[inline]
    pub fn is_decided(self) -> bool {
        self != Self::Undecided
    }
}

impl From<bool> for Verdict {
    fn from(redirect: bool) -> Self {
        if redirect {
            Self::Redirect
        } else {
            Self::Allow
        }
    }
}

/// The step of the decision chain that settled a link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DecisionReason {
    /// Mousedown only notifies; the click decides
    Mousedown,
    /// Navigation stays inside a sub-frame
    SubFrame,
    /// Internal link to the top document's own domain
    SameDomain,
    /// Internal relative link
    RelativeLink,
    /// The rule predicate answered
    RulePredicate,
    /// No rule predicate was available
    NoPredicate,
}

impl DecisionReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Mousedown => "mousedown",
            Self::SubFrame => "sub-top-level target",
            Self::SameDomain => "link to same domain",
            Self::RelativeLink => "relative link",
            Self::RulePredicate => "rules",
            Self::NoPredicate => "no rules",
        }
    }
}

/// Final decision for one mouse event on a link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RedirectDecision {
    /// Never `Undecided` once returned by the engine
    pub verdict: Verdict,
    /// Resolved target; `None` for mousedown, which never resolves one
    pub target: Option<NavigationTarget>,
    /// Step that settled the decision (for diagnostics)
    pub reason: DecisionReason,
}

impl RedirectDecision {
    /// Provisional decision reported for a mousedown.
    pub fn deferred() -> Self {
        Self {
            verdict: Verdict::Allow,
            target: None,
            reason: DecisionReason::Mousedown,
        }
    }

    pub fn settled(verdict: Verdict, target: NavigationTarget, reason: DecisionReason) -> Self {
        Self {
            verdict,
            target: Some(target),
            reason,
        }
    }

    #[inline]
    pub fn is_deferred(&self) -> bool {
        self.reason == DecisionReason::Mousedown
    }

    /// Whether default navigation must be cancelled.
    #[inline]
    pub fn should_redirect(&self) -> bool {
        !self.is_deferred() && self.verdict == Verdict::Redirect
    }

    /// Label for the target class, as shown in diagnostics.
    pub fn target_label(&self) -> &'static str {
        match self.target {
            None => "deferred",
            Some(NavigationTarget::SubFrame) => "ignored-subframe",
            Some(target) => target.as_str(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_kind_from_str() {
        assert_eq!(EventKind::from_str("click"), Some(EventKind::Click));
        assert_eq!(EventKind::from_str("MouseDown"), Some(EventKind::Mousedown));
        assert_eq!(EventKind::from_str("mouseup"), None);
    }

    #[test]
    fn test_listener_kinds_from_event() {
        assert_eq!(ListenerKinds::from(EventKind::Click), ListenerKinds::CLICK);
        assert!(ListenerKinds::ALL.contains(ListenerKinds::from(EventKind::Mousedown)));
    }

    #[test]
    fn test_deferred_never_redirects() {
        let mut decision = RedirectDecision::deferred();
        decision.verdict = Verdict::Redirect;
        assert!(decision.is_deferred());
        assert!(!decision.should_redirect());
        assert_eq!(decision.target_label(), "deferred");
    }

    #[test]
    fn test_target_labels() {
        let sub = RedirectDecision::settled(Verdict::Allow, NavigationTarget::SubFrame, DecisionReason::SubFrame);
        assert_eq!(sub.target_label(), "ignored-subframe");
        let ext = RedirectDecision::settled(Verdict::Redirect, NavigationTarget::External, DecisionReason::RulePredicate);
        assert_eq!(ext.target_label(), "external");
        assert!(ext.should_redirect());
    }

    #[test]
    fn test_verdict_from_bool() {
        assert_eq!(Verdict::from(true), Verdict::Redirect);
        assert_eq!(Verdict::from(false), Verdict::Allow);
        assert!(!Verdict::Undecided.is_decided());
    }
}
