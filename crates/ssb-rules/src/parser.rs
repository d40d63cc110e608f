use ssb_core::NavigationTarget;
use thiserror::Error;

// =============================================================================
// Rule Types
// =============================================================================

/// What a matched rule asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuleAction {
    /// Exception rule (@@...) - keep the link inside the app
    Keep,
    /// Hand the link to the external handler
    Redirect,
}

bitflags::bitflags! {
    /// Flags for rule behavior.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct RuleFlags: u8 {
        /// $important - redirect even when a keep rule matches
        const IMPORTANT = 1 << 0;
        /// Case-sensitive matching ($match-case)
        const MATCH_CASE = 1 << 1;
        /// Rule has left anchor (starts with |)
        const HAS_LEFT_ANCHOR = 1 << 2;
        /// Rule has right anchor (ends with |)
        const HAS_RIGHT_ANCHOR = 1 << 3;
        /// Rule has hostname anchor (||)
        const HAS_HOST_ANCHOR = 1 << 4;
    }
}

bitflags::bitflags! {
    /// Navigation targets a rule applies to.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct TargetMask: u8 {
        const INTERNAL = 1 << 0;
        const EXTERNAL = 1 << 1;

        const ALL = Self::INTERNAL.bits() | Self::EXTERNAL.bits();
    }
}

impl From<NavigationTarget> for TargetMask {
    fn from(target: NavigationTarget) -> Self {
        match target {
            NavigationTarget::Internal => Self::INTERNAL,
            NavigationTarget::External => Self::EXTERNAL,
            NavigationTarget::SubFrame => Self::empty(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledRule {
    pub action: RuleAction,
    pub flags: RuleFlags,
    pub target_mask: TargetMask,
    /// Host of a `||` rule, lowercased; empty otherwise
    pub domain: String,
    /// Pattern text without anchors; starts with `domain` for `||` rules
    pub pattern: String,
    pub list_id: u16,
    pub is_badfilter: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuleListError {
    #[error("line {line}: invalid option '{option}'")]
    InvalidOption { line: usize, option: String },
    #[error("line {line}: empty pattern")]
    EmptyPattern { line: usize },
}

// =============================================================================
// Parsing
// =============================================================================

/// Parse a rule list, skipping lines that do not parse.
pub fn parse_rule_list(text: &str) -> Vec<CompiledRule> {
    let mut rules = Vec::new();

    for (idx, raw_line) in text.lines().enumerate() {
        match parse_line(raw_line, idx + 1) {
            Ok(Some(rule)) => rules.push(rule),
            Ok(None) => {}
            Err(err) => log::debug!("skipping rule: {}", err),
        }
    }

    rules
}

/// Parse a rule list, failing on the first line that does not parse.
pub fn parse_rule_list_strict(text: &str) -> Result<Vec<CompiledRule>, RuleListError> {
    let mut rules = Vec::new();

    for (idx, raw_line) in text.lines().enumerate() {
        if let Some(rule) = parse_line(raw_line, idx + 1)? {
            rules.push(rule);
        }
    }

    Ok(rules)
}

fn parse_line(raw_line: &str, line_no: usize) -> Result<Option<CompiledRule>, RuleListError> {
    let mut line = raw_line.trim();
    if line.is_empty() || is_comment_line(line) {
        return Ok(None);
    }

    let mut action = RuleAction::Redirect;
    if let Some(rest) = line.strip_prefix("@@") {
        action = RuleAction::Keep;
        line = rest.trim_start();
    }

    let (pattern_part, options_text) = split_rule_options(line);
    let options = match options_text {
        Some(options_text) => parse_options(options_text, line_no)?,
        None => ParsedOptions::default(),
    };

    let parsed = parse_pattern(pattern_part.trim()).ok_or(RuleListError::EmptyPattern { line: line_no })?;

    Ok(Some(CompiledRule {
        action,
        flags: options.flags | parsed.anchor_flags,
        target_mask: options.target_mask,
        domain: parsed.domain,
        pattern: parsed.pattern,
        list_id: 0,
        is_badfilter: options.is_badfilter,
    }))
}

fn is_comment_line(line: &str) -> bool {
    line.starts_with('!') || line.starts_with('[') || line.starts_with('#')
}

fn split_rule_options(line: &str) -> (&str, Option<&str>) {
    match line.rfind('$') {
        Some(pos) => (&line[..pos], Some(&line[pos + 1..])),
        None => (line, None),
    }
}

struct ParsedOptions {
    flags: RuleFlags,
    target_mask: TargetMask,
    is_badfilter: bool,
}

impl Default for ParsedOptions {
    fn default() -> Self {
        Self {
            flags: RuleFlags::empty(),
            target_mask: TargetMask::ALL,
            is_badfilter: false,
        }
    }
}

fn parse_options(text: &str, line_no: usize) -> Result<ParsedOptions, RuleListError> {
    let mut flags = RuleFlags::empty();
    let mut target_include = TargetMask::empty();
    let mut target_exclude = TargetMask::empty();
    let mut is_badfilter = false;

    for raw in text.split(',') {
        let raw = raw.trim();
        if raw.is_empty() {
            continue;
        }

        let lower = raw.to_ascii_lowercase();
        let (negated, name) = match lower.strip_prefix('~') {
            Some(rest) => (true, rest),
            None => (false, lower.as_str()),
        };

        let invalid = || RuleListError::InvalidOption {
            line: line_no,
            option: raw.to_string(),
        };

        match name {
            "important" if !negated => flags |= RuleFlags::IMPORTANT,
            "match-case" | "match_case" if !negated => flags |= RuleFlags::MATCH_CASE,
            "badfilter" if !negated => is_badfilter = true,
            "internal" | "external" => {
                let mask = if name == "internal" {
                    TargetMask::INTERNAL
                } else {
                    TargetMask::EXTERNAL
                };
                if negated {
                    target_exclude |= mask;
                } else {
                    target_include |= mask;
                }
            }
            _ => return Err(invalid()),
        }
    }

    let base = if target_include.is_empty() {
        TargetMask::ALL
    } else {
        target_include
    };
    let target_mask = base - target_exclude;
    if target_mask.is_empty() {
        return Err(RuleListError::InvalidOption {
            line: line_no,
            option: text.trim().to_string(),
        });
    }

    Ok(ParsedOptions {
        flags,
        target_mask,
        is_badfilter,
    })
}

struct ParsedPattern {
    domain: String,
    pattern: String,
    anchor_flags: RuleFlags,
}

fn parse_pattern(line: &str) -> Option<ParsedPattern> {
    let (mut anchor_flags, rest) = if let Some(rest) = line.strip_prefix("||") {
        (RuleFlags::HAS_HOST_ANCHOR, rest)
    } else if let Some(rest) = line.strip_prefix('|') {
        (RuleFlags::HAS_LEFT_ANCHOR, rest)
    } else {
        (RuleFlags::empty(), line)
    };

    let rest = match rest.strip_suffix('|') {
        Some(stripped) => {
            anchor_flags |= RuleFlags::HAS_RIGHT_ANCHOR;
            stripped
        }
        None => rest,
    };

    let pattern = collapse_wildcards(rest);
    if pattern.is_empty() {
        return None;
    }

    if !anchor_flags.contains(RuleFlags::HAS_HOST_ANCHOR) {
        return Some(ParsedPattern {
            domain: String::new(),
            pattern,
            anchor_flags,
        });
    }

    let domain = extract_pattern_domain(&pattern)?.to_ascii_lowercase();
    let pattern = format!("{}{}", domain, &pattern[domain.len()..]);

    Some(ParsedPattern {
        domain,
        pattern,
        anchor_flags,
    })
}

/// Leading host part of a `||` pattern.
fn extract_pattern_domain(pattern: &str) -> Option<&str> {
    let end = pattern
        .find(|ch: char| matches!(ch, '/' | '^' | '*' | '?' | '#' | ':'))
        .unwrap_or(pattern.len());
    let host = &pattern[..end];

    if host.is_empty()
        || !host
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'.' || b == b'-')
    {
        return None;
    }

    Some(host)
}

fn collapse_wildcards(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len());
    for ch in pattern.chars() {
        if ch == '*' && out.ends_with('*') {
            continue;
        }
        out.push(ch);
    }
    out
}
