//! Redirect rule matching
//!
//! Precedence: important redirect > keep > redirect > no match. Rules only
//! see top-level targets; sub-frame navigation never reaches the predicate.

use ssb_core::url::{get_host_position, is_at_separator};
use ssb_core::{NavigationTarget, Options, RuleSet};

use crate::optimizer::{optimize_rules, OptimizeStats};
use crate::parser::{parse_rule_list, CompiledRule, RuleAction, RuleFlags, TargetMask};

// =============================================================================
// Redirect Rules
// =============================================================================

/// Compiled rule lists plus the user options.
#[derive(Debug, Clone, Default)]
pub struct RedirectRules {
    options: Options,
    rules: Vec<CompiledRule>,
    loaded: bool,
}

impl RedirectRules {
    /// Options only; no rule list was loaded, so the predicate is unavailable.
    pub fn without_lists(options: Options) -> Self {
        Self {
            options,
            rules: Vec::new(),
            loaded: false,
        }
    }

    /// Use rules that were already parsed and optimized.
    pub fn new(options: Options, rules: Vec<CompiledRule>) -> Self {
        Self {
            options,
            rules,
            loaded: true,
        }
    }

    /// Parse and optimize several lists. Each rule records the index of its list.
    pub fn from_lists<S: AsRef<str>>(options: Options, lists: &[S]) -> (Self, OptimizeStats) {
        let mut all_rules = Vec::new();
        for (list_id, text) in lists.iter().enumerate() {
            let mut rules = parse_rule_list(text.as_ref());
            for rule in &mut rules {
                rule.list_id = list_id as u16;
            }
            all_rules.extend(rules);
        }

        let stats = optimize_rules(&mut all_rules);
        log::debug!(
            "compiled {} rule lists: {} -> {} rules",
            lists.len(),
            stats.before,
            stats.after
        );

        (Self::new(options, all_rules), stats)
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn rules(&self) -> &[CompiledRule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// The rule that decides `href`, if any.
    pub fn matching_rule(&self, href: &str, target: NavigationTarget) -> Option<&CompiledRule> {
        let mask = TargetMask::from(target);
        if mask.is_empty() {
            return None;
        }

        let mut best_keep: Option<&CompiledRule> = None;
        let mut best_redirect: Option<&CompiledRule> = None;

        for rule in &self.rules {
            if !rule.target_mask.intersects(mask) || !rule_matches(rule, href) {
                continue;
            }
            match rule.action {
                RuleAction::Redirect if rule.flags.contains(RuleFlags::IMPORTANT) => return Some(rule),
                RuleAction::Redirect => {
                    best_redirect.get_or_insert(rule);
                }
                RuleAction::Keep => {
                    best_keep.get_or_insert(rule);
                }
            }
        }

        best_keep.or(best_redirect)
    }
}

impl RuleSet for RedirectRules {
    fn ignore_all_internal_same_domain(&self) -> Option<bool> {
        self.options.ignore_all_internal_same_domain
    }

    fn should_redirect(&self, href: &str, target: NavigationTarget) -> Option<bool> {
        if !self.loaded {
            return None;
        }
        let redirect = self
            .matching_rule(href, target)
            .is_some_and(|rule| rule.action == RuleAction::Redirect);
        Some(redirect)
    }
}

// =============================================================================
// Pattern Matching
// =============================================================================

/// Check one rule's pattern against a URL.
///
/// The pattern is split on `*` into segments. Each segment is placed at its
/// leftmost match after the previous one, so matching is a single pass with
/// no backtracking. Only the first segment honors the left and host anchors,
/// and only the last one honors the right anchor.
pub fn rule_matches(rule: &CompiledRule, url: &str) -> bool {
    let text = url.as_bytes();
    let match_case = rule.flags.contains(RuleFlags::MATCH_CASE);
    let right_anchor = rule.flags.contains(RuleFlags::HAS_RIGHT_ANCHOR);

    let segments: Vec<&[u8]> = rule.pattern.as_bytes().split(|&b| b == b'*').collect();
    let last = segments.len() - 1;

    let mut url_pos = 0;
    for (i, segment) in segments.iter().enumerate() {
        let must_end = right_anchor && i == last;
        let place = |start: usize| {
            match_segment(url, start, segment, match_case).filter(|&end| !must_end || end == text.len())
        };

        let found = if i > 0 {
            (url_pos..=text.len()).find_map(place)
        } else if rule.flags.contains(RuleFlags::HAS_HOST_ANCHOR) {
            // the domain must begin at a label boundary inside the host
            let (host_start, host_end) = match get_host_position(url) {
                Some(pos) => pos,
                None => return false,
            };
            (host_start..host_end)
                .filter(|&p| p == host_start || text[p - 1] == b'.')
                .find_map(place)
        } else if rule.flags.contains(RuleFlags::HAS_LEFT_ANCHOR) {
            place(0)
        } else {
            (0..=text.len()).find_map(place)
        };

        match found {
            Some(end) => url_pos = end,
            None => return false,
        }
    }

    true
}

/// Match one wildcard-free segment at `start`, returning where it ends.
/// `^` matches a single separator byte, or the end of the URL.
fn match_segment(url: &str, start: usize, segment: &[u8], match_case: bool) -> Option<usize> {
    let text = url.as_bytes();
    let mut pos = start;

    for &p in segment {
        if p == b'^' {
            if !is_at_separator(url, pos) {
                return None;
            }
            if pos < text.len() {
                pos += 1;
            }
            continue;
        }
        match text.get(pos) {
            Some(&c) if bytes_equal(c, p, match_case) => pos += 1,
            _ => return None,
        }
    }

    Some(pos)
}

#[inline]
fn bytes_equal(a: u8, b: u8, match_case: bool) -> bool {
    if match_case {
        a == b
    } else {
        a.eq_ignore_ascii_case(&b)
    }
}
