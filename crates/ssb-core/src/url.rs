//! Fast URL helpers for link classification
//!
//! These functions avoid allocations and work directly on string slices.
//! The classifier half is deliberately loose: hrefs come straight from
//! anchor attributes and must never make the interceptor fail.

// =============================================================================
// Link Classification
// =============================================================================

/// Whether an href is absolute. Any colon counts.
#[inline]
pub fn is_absolute(href: &str) -> bool {
    href.as_bytes().contains(&b':')
}

/// Extract the domain of an href: the text between `://` and the next `/`
/// (or the end of the string). No case, port or trailing-dot normalization.
pub fn extract_domain(href: &str) -> Option<&str> {
    let mut from = 0;
    while let Some(pos) = href[from..].find("://") {
        let start = from + pos + 3;
        let rest = &href[start..];
        let end = rest.find('/').unwrap_or(rest.len());
        if end > 0 {
            return Some(&rest[..end]);
        }
        from = start;
    }
    None
}

/// Absolute/domain classification of a single href.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UrlClass<'a> {
    pub absolute: bool,
    pub domain: Option<&'a str>,
}

impl<'a> UrlClass<'a> {
    pub fn of(href: &'a str) -> Self {
        Self {
            absolute: is_absolute(href),
            domain: extract_domain(href),
        }
    }

    /// Exact comparison against the top-level document's domain.
    /// A missing domain is never same-domain.
    #[inline]
    pub fn is_same_domain(&self, top_domain: &str) -> bool {
        self.domain.is_some_and(|domain| domain == top_domain)
    }
}

// =============================================================================
// Scheme & Host Positions
// =============================================================================

/// Get the position after "://".
#[inline]
pub fn get_scheme_end(url: &str) -> Option<usize> {
    let bytes = url.as_bytes();

    let colon_pos = bytes.iter().position(|&b| b == b':')?;

    if bytes.len() > colon_pos + 2
        && bytes[colon_pos + 1] == b'/'
        && bytes[colon_pos + 2] == b'/'
    {
        return Some(colon_pos + 3);
    }

    None
}

/// Get the start and end positions of the hostname in a URL.
/// Userinfo and port are excluded.
#[inline]
pub fn get_host_position(url: &str) -> Option<(usize, usize)> {
    let scheme_end = get_scheme_end(url)?;
    let bytes = url.as_bytes();

    let mut host_start = scheme_end;
    for (i, &b) in bytes.iter().enumerate().skip(scheme_end) {
        if b == b'@' {
            host_start = i + 1;
            break;
        }
        if b == b'/' || b == b'?' || b == b'#' {
            break;
        }
    }

    let mut host_end = bytes.len();
    for (i, &b) in bytes.iter().enumerate().skip(host_start) {
        if b == b'/' || b == b'?' || b == b'#' || b == b':' {
            host_end = i;
            break;
        }
    }

    Some((host_start, host_end))
}

// =============================================================================
// Separator Check
// =============================================================================

/// Whether a byte is a rule-pattern separator (`^`).
/// Letters, digits and `_ - . %` are not separators.
#[inline]
pub fn is_separator_char(c: u8) -> bool {
    !(c.is_ascii_alphanumeric() || matches!(c, b'_' | b'-' | b'.' | b'%'))
}

/// Check if position in string is at a separator. The end of the string counts.
#[inline]
pub fn is_at_separator(s: &str, pos: usize) -> bool {
    if pos >= s.len() {
        return true;
    }
    is_separator_char(s.as_bytes()[pos])
}
