use std::collections::HashSet;

use crate::parser::{CompiledRule, RuleAction, RuleFlags, TargetMask};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OptimizeStats {
    pub before: usize,
    pub after: usize,
    pub deduped: usize,
    pub badfilter_rules: usize,
    pub badfiltered_rules: usize,
}

/// Drop `badfilter` rules together with the rules they cancel, then
/// duplicates. List origin does not make two rules different.
pub fn optimize_rules(rules: &mut Vec<CompiledRule>) -> OptimizeStats {
    let before = rules.len();
    let mut badfilter_keys: HashSet<RuleKey> = HashSet::new();
    let mut badfilter_rules = 0usize;

    for rule in rules.iter() {
        if rule.is_badfilter {
            badfilter_rules += 1;
            badfilter_keys.insert(RuleKey::from(rule));
        }
    }

    let mut badfiltered_rules = 0usize;
    rules.retain(|rule| {
        if rule.is_badfilter {
            return false;
        }
        if badfilter_keys.contains(&RuleKey::from(rule)) {
            badfiltered_rules += 1;
            return false;
        }
        true
    });

    let mut seen: HashSet<RuleKey> = HashSet::new();
    let mut deduped = 0usize;
    rules.retain(|rule| {
        if seen.insert(RuleKey::from(rule)) {
            true
        } else {
            deduped += 1;
            false
        }
    });

    let after = rules.len();

    OptimizeStats {
        before,
        after,
        deduped,
        badfilter_rules,
        badfiltered_rules,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct RuleKey {
    action: RuleAction,
    flags: RuleFlags,
    target_mask: TargetMask,
    pattern: String,
}

impl From<&CompiledRule> for RuleKey {
    fn from(rule: &CompiledRule) -> Self {
        Self {
            action: rule.action,
            flags: rule.flags,
            target_mask: rule.target_mask,
            pattern: rule.pattern.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_rule_list;

    #[test]
    fn test_dedupe() {
        let mut rules = parse_rule_list("||a.com^\n||A.com^\n||a.com^$external\n@@||a.com^");
        let stats = optimize_rules(&mut rules);
        assert_eq!(stats.before, 4);
        assert_eq!(stats.deduped, 1);
        assert_eq!(stats.after, 3);
    }

    #[test]
    fn test_badfilter_cancels_matching_rule() {
        let mut rules = parse_rule_list("||a.com^$external\n||a.com^$external,badfilter\n||b.com^");
        let stats = optimize_rules(&mut rules);
        assert_eq!(stats.badfilter_rules, 1);
        assert_eq!(stats.badfiltered_rules, 1);
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].domain, "b.com");
    }

    #[test]
    fn test_badfilter_ignores_list_origin() {
        let mut first = parse_rule_list("||a.com^");
        let mut second = parse_rule_list("||a.com^$badfilter");
        for rule in &mut second {
            rule.list_id = 1;
        }
        first.append(&mut second);
        optimize_rules(&mut first);
        assert!(first.is_empty());
    }
}
