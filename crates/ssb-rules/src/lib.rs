//! SSB Redirect Rule Lists
//!
//! This crate compiles redirect rule lists (ad-block style filter syntax) and
//! provides the rule predicate the core decision engine consults.

pub mod parser;
pub mod optimizer;
pub mod matcher;

pub use matcher::{rule_matches, RedirectRules};
pub use optimizer::{optimize_rules, OptimizeStats};
pub use parser::{parse_rule_list, parse_rule_list_strict, CompiledRule, RuleAction, RuleFlags, RuleListError, TargetMask};
