//! Redirect configuration consumed by the decision engine
//!
//! The engine reads rules but never changes them. A missing flag or a missing
//! predicate means "rule not triggered", never an error.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::types::NavigationTarget;

/// User options that short-circuit the rule predicate.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase", default)]
#[ts(export)]
pub struct Options {
    /// Never redirect internal links that stay on the top document's domain
    #[serde(skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub ignore_all_internal_same_domain: Option<bool>,
}

impl Options {
    pub fn ignoring_internal_same_domain() -> Self {
        Self {
            ignore_all_internal_same_domain: Some(true),
        }
    }
}

/// Read-only rule configuration for one decision.
pub trait RuleSet {
    /// The "ignore all internal same-domain navigation" flag, if set.
    fn ignore_all_internal_same_domain(&self) -> Option<bool>;

    /// The rule predicate, or `None` when no predicate is available.
    fn should_redirect(&self, href: &str, target: NavigationTarget) -> Option<bool>;
}

impl RuleSet for Options {
    fn ignore_all_internal_same_domain(&self) -> Option<bool> {
        self.ignore_all_internal_same_domain
    }

    fn should_redirect(&self, _href: &str, _target: NavigationTarget) -> Option<bool> {
        None
    }
}

impl<R: RuleSet + ?Sized> RuleSet for &R {
    fn ignore_all_internal_same_domain(&self) -> Option<bool> {
        (**self).ignore_all_internal_same_domain()
    }

    fn should_redirect(&self, href: &str, target: NavigationTarget) -> Option<bool> {
        (**self).should_redirect(href, target)
    }
}

impl<R: RuleSet + ?Sized> RuleSet for Box<R> {
    fn ignore_all_internal_same_domain(&self) -> Option<bool> {
        (**self).ignore_all_internal_same_domain()
    }

    fn should_redirect(&self, href: &str, target: NavigationTarget) -> Option<bool> {
        (**self).should_redirect(href, target)
    }
}

/// Options paired with a closure predicate.
pub struct FnRules<F> {
    pub options: Options,
    predicate: F,
}

impl<F> FnRules<F>
where
    F: Fn(&str, NavigationTarget) -> bool,
{
    pub fn new(options: Options, predicate: F) -> Self {
        Self { options, predicate }
    }
}

impl<F> RuleSet for FnRules<F>
where
    F: Fn(&str, NavigationTarget) -> bool,
{
    fn ignore_all_internal_same_domain(&self) -> Option<bool> {
        self.options.ignore_all_internal_same_domain
    }

    fn should_redirect(&self, href: &str, target: NavigationTarget) -> Option<bool> {
        Some((self.predicate)(href, target))
    }
}
