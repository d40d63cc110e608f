//! Redirect Decision Engine
//!
//! A short-circuit chain evaluated in order; the first step that settles the
//! verdict wins:
//!
//! 1. mousedown: deferred, only a notification
//! 2. empty href: not a link, no decision at all
//! 3. sub-frame target: never redirected
//! 4. internal target with the same-domain option: same-domain or relative
//!    links stay in the app
//! 5. everything else: the rule predicate
//!
//! Structural checks run before the predicate so user rules can never
//! redirect a sub-frame navigation.

use log::debug;

use crate::frame::{resolve_target, FrameIdentity};
use crate::rules::RuleSet;
use crate::types::{DecisionReason, LinkDescriptor, NavigationTarget, RedirectDecision, Verdict};
use crate::url::UrlClass;

// =============================================================================
// Decision Engine
// =============================================================================

/// Decision engine over a borrowed rule set.
pub struct DecisionEngine<'r, R: ?Sized> {
    rules: &'r R,
}

impl<'r, R: RuleSet + ?Sized> DecisionEngine<'r, R> {
    pub fn new(rules: &'r R) -> Self {
        Self { rules }
    }

    /// Decide one mouse event. Returns `None` when the anchor has no href.
    pub fn decide<F: FrameIdentity + ?Sized>(
        &self,
        link: &LinkDescriptor<'_>,
        frame: &F,
    ) -> Option<RedirectDecision> {
        if link.href.is_empty() {
            return None;
        }

        if link.is_mousedown() {
            debug!("mousedown on {} -- deferring to click", link.href);
            return Some(RedirectDecision::deferred());
        }

        let target = resolve_target(link.raw_target, frame);
        let url = UrlClass::of(link.href);
        let decision = self.decide_resolved(link.href, target, &url, frame.top_domain());

        debug!(
            "click on {} [{}] -- {} ({})",
            link.href,
            decision.target_label(),
            if decision.should_redirect() { "redirect" } else { "allow" },
            decision.reason.as_str(),
        );

        Some(decision)
    }

    /// Decide a click whose target and URL class are already known.
    pub fn decide_resolved(
        &self,
        href: &str,
        target: NavigationTarget,
        url: &UrlClass<'_>,
        top_domain: &str,
    ) -> RedirectDecision {
        let (verdict, reason) = self.short_circuit(target, url, top_domain);
        if verdict.is_decided() {
            return RedirectDecision::settled(verdict, target, reason);
        }

        match self.rules.should_redirect(href, target) {
            Some(redirect) => {
                RedirectDecision::settled(Verdict::from(redirect), target, DecisionReason::RulePredicate)
            }
            None => RedirectDecision::settled(Verdict::Allow, target, DecisionReason::NoPredicate),
        }
    }

    /// Structural checks that settle a click without the predicate.
    fn short_circuit(
        &self,
        target: NavigationTarget,
        url: &UrlClass<'_>,
        top_domain: &str,
    ) -> (Verdict, DecisionReason) {
        match target {
            NavigationTarget::SubFrame => (Verdict::Allow, DecisionReason::SubFrame),
            NavigationTarget::Internal
                if self.rules.ignore_all_internal_same_domain() == Some(true) =>
            {
                if url.is_same_domain(top_domain) {
                    (Verdict::Allow, DecisionReason::SameDomain)
                } else if !url.absolute {
                    (Verdict::Allow, DecisionReason::RelativeLink)
                } else {
                    (Verdict::Undecided, DecisionReason::RulePredicate)
                }
            }
            _ => (Verdict::Undecided, DecisionReason::RulePredicate),
        }
    }
}

/// Decide one mouse event against a rule set.
pub fn decide<R, F>(link: &LinkDescriptor<'_>, frame: &F, rules: &R) -> Option<RedirectDecision>
where
    R: RuleSet + ?Sized,
    F: FrameIdentity + ?Sized,
{
    DecisionEngine::new(rules).decide(link, frame)
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;
    use crate::frame::FrameSnapshot;
    use crate::rules::{FnRules, Options};

    /// xorshift32, enough to vary rule configurations deterministically
    struct Rng(u32);

    impl Rng {
        fn next(&mut self) -> u32 {
            let mut x = self.0;
            x ^= x << 13;
            x ^= x >> 17;
            x ^= x << 5;
            self.0 = x;
            x
        }

        fn flag(&mut self) -> Option<bool> {
            match self.next() % 3 {
                0 => None,
                1 => Some(false),
                _ => Some(true),
            }
        }
    }

    struct RandomRules {
        ignore: Option<bool>,
        answer: Option<bool>,
    }

    impl RuleSet for RandomRules {
        fn ignore_all_internal_same_domain(&self) -> Option<bool> {
            self.ignore
        }

        fn should_redirect(&self, _href: &str, _target: NavigationTarget) -> Option<bool> {
            self.answer
        }
    }

    const HREFS: &[&str] = &[
        "http://example.com/x",
        "http://other.com/y",
        "/relative",
        "mailto:me@example.com",
        "https://example.com",
    ];

    const TARGETS: &[&str] = &["", "_self", "_top", "_parent", "_blank", "preview", "elsewhere"];

    #[test]
    fn test_subframe_never_redirects() {
        let mut rng = Rng(0x9e37_79b9);
        let frames = [
            FrameSnapshot::top_level("example.com").with_frame_name("preview"),
            FrameSnapshot::nested("example.com", true).with_frame_name("preview"),
            FrameSnapshot::nested("example.com", false).with_frame_name("preview"),
        ];

        for _ in 0..500 {
            let rules = RandomRules { ignore: rng.flag(), answer: rng.flag() };
            let frame = &frames[rng.next() as usize % frames.len()];
            let href = HREFS[rng.next() as usize % HREFS.len()];
            let target = TARGETS[rng.next() as usize % TARGETS.len()];

            let decision = decide(&LinkDescriptor::click(href, target), frame, &rules).unwrap();
            if decision.target == Some(NavigationTarget::SubFrame) {
                assert!(!decision.should_redirect());
                assert_eq!(decision.reason, DecisionReason::SubFrame);
            }
        }
    }

    #[test]
    fn test_mousedown_is_deferred() {
        let rules = FnRules::new(Options::default(), |_, _| true);
        let frame = FrameSnapshot::top_level("example.com");

        let down = decide(&LinkDescriptor::mousedown("http://other.com/"), &frame, &rules).unwrap();
        assert!(down.is_deferred());
        assert!(!down.should_redirect());

        let click = decide(&LinkDescriptor::click("http://other.com/", ""), &frame, &rules).unwrap();
        assert!(click.should_redirect());
    }

    #[test]
    fn test_empty_href_is_not_a_link() {
        let rules = FnRules::new(Options::default(), |_, _| true);
        let frame = FrameSnapshot::top_level("example.com");
        assert_eq!(decide(&LinkDescriptor::click("", "_blank"), &frame, &rules), None);
        assert_eq!(decide(&LinkDescriptor::mousedown(""), &frame, &rules), None);
    }

    #[test]
    fn test_decision_is_pure() {
        let mut rng = Rng(12345);
        let frame = FrameSnapshot::nested("example.com", true).with_frame_name("preview");
        for _ in 0..100 {
            let rules = RandomRules { ignore: rng.flag(), answer: rng.flag() };
            let href = HREFS[rng.next() as usize % HREFS.len()];
            let target = TARGETS[rng.next() as usize % TARGETS.len()];
            let link = LinkDescriptor::click(href, target);
            assert_eq!(decide(&link, &frame, &rules), decide(&link, &frame, &rules));
            assert_eq!(resolve_target(target, &frame), resolve_target(target, &frame));
            assert_eq!(UrlClass::of(href), UrlClass::of(href));
        }
    }

    #[test]
    fn test_same_domain_short_circuit() {
        let called = Cell::new(false);
        let rules = FnRules::new(Options::ignoring_internal_same_domain(), |_, _| {
            called.set(true);
            true
        });
        let frame = FrameSnapshot::top_level("example.com");

        let decision = decide(&LinkDescriptor::click("http://example.com/a", ""), &frame, &rules).unwrap();
        assert_eq!(decision.reason, DecisionReason::SameDomain);
        assert!(!decision.should_redirect());
        assert!(!called.get());
    }

    #[test]
    fn test_internal_other_domain_uses_predicate() {
        let rules = FnRules::new(Options::ignoring_internal_same_domain(), |_, target| {
            target == NavigationTarget::Internal
        });
        let frame = FrameSnapshot::top_level("example.com");

        let decision = decide(&LinkDescriptor::click("http://other.com/a", "_top"), &frame, &rules).unwrap();
        assert_eq!(decision.reason, DecisionReason::RulePredicate);
        assert!(decision.should_redirect());
    }

    #[test]
    fn test_flag_unset_uses_predicate() {
        let rules = FnRules::new(Options::default(), |_, _| true);
        let frame = FrameSnapshot::top_level("example.com");
        let decision = decide(&LinkDescriptor::click("/relative", ""), &frame, &rules).unwrap();
        assert_eq!(decision.reason, DecisionReason::RulePredicate);
        assert!(decision.should_redirect());
    }

    #[test]
    fn test_missing_predicate_allows() {
        let frame = FrameSnapshot::top_level("example.com");
        let decision = decide(&LinkDescriptor::click("http://other.com/", "_blank"), &frame, &Options::default()).unwrap();
        assert_eq!(decision.reason, DecisionReason::NoPredicate);
        assert!(!decision.should_redirect());
    }
}
