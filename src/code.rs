//! Dotted hierarchical codes.
//!
//! A code such as `CIVIL.CONCRETE.FOOTING` is a path of uppercase segments;
//! its depth is the segment count and its parent code drops the last segment.

use crate::error::CatalogError;
use once_cell::sync::Lazy;
use regex::Regex;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Deepest code the catalog accepts.
pub const MAX_LEVEL: usize = 5;

/// Segment separator.
pub const SEPARATOR: char = '.';

static SEGMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Z0-9_-]+$").expect("segment pattern is valid"));

static NON_ALNUM_RUN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^A-Z0-9]+").expect("slug pattern is valid"));

/// Count of non-empty segments.
pub fn depth(code: &str) -> usize {
    code.split(SEPARATOR).filter(|s| !s.is_empty()).count()
}

/// Code with the last segment removed, `None` for a single segment.
pub fn parent_code(code: &str) -> Option<&str> {
    code.rsplit_once(SEPARATOR).map(|(parent, _)| parent)
}

pub fn last_segment(code: &str) -> &str {
    code.rsplit_once(SEPARATOR).map_or(code, |(_, last)| last)
}

/// Every proper prefix of `code`, shortest first: `A.B.C` gives `A`, `A.B`.
pub fn ancestor_codes(code: &str) -> Vec<&str> {
    code.match_indices(SEPARATOR)
        .map(|(idx, _)| &code[..idx])
        .collect()
}

/// Normalize a free-text label into one uppercase code segment.
///
/// Diacritics are stripped, runs of anything that is not `A-Z`/`0-9` become a
/// single underscore, and edge underscores are trimmed. `"Béton armé (m³)"`
/// becomes `BETON_ARME_M3`.
pub fn slug(label: &str) -> String {
    let folded: String = label
        .nfkd()
        .filter(|c| !is_combining_mark(*c))
        .collect::<String>()
        .to_uppercase();
    NON_ALNUM_RUN
        .replace_all(&folded, "_")
        .trim_matches('_')
        .to_string()
}

/// Suggested code for a new child labelled `label`, or `None` when the label
/// has nothing that survives [`slug`].
pub fn suggest_code(parent_code: Option<&str>, label: &str) -> Option<String> {
    let segment = slug(label);
    if segment.is_empty() {
        return None;
    }
    Some(match parent_code.map(str::trim).filter(|p| !p.is_empty()) {
        Some(parent) => format!("{}{}{}", parent.to_uppercase(), SEPARATOR, segment),
        None => segment,
    })
}

/// Trim and uppercase a candidate code and check its shape.
///
/// # Errors
///
/// `InvalidCode` for an empty code, an empty segment, or a segment with
/// characters outside `A-Z 0-9 _ -`.
pub fn normalize_code(raw: &str) -> Result<String, CatalogError> {
    let code = raw.trim().to_uppercase();
    if code.is_empty() {
        return Err(CatalogError::InvalidCode {
            code,
            reason: "code is empty".to_string(),
        });
    }
    if let Some(bad) = code.split(SEPARATOR).find(|s| !SEGMENT.is_match(s)) {
        let reason = if bad.is_empty() {
            "code has an empty segment".to_string()
        } else {
            format!("segment `{bad}` may only contain A-Z, 0-9, '_' and '-'")
        };
        return Err(CatalogError::InvalidCode { code, reason });
    }
    Ok(code)
}

/// Reject codes deeper than `max_level`.
pub fn check_depth(code: &str, max_level: usize) -> Result<(), CatalogError> {
    let depth = depth(code);
    if depth > max_level {
        return Err(CatalogError::CodeDepthExceeded {
            code: code.to_string(),
            depth,
            max_level,
        });
    }
    Ok(())
}

/// Normalize and depth-check in one step.
pub fn validate(raw: &str, max_level: usize) -> Result<String, CatalogError> {
    let code = normalize_code(raw)?;
    check_depth(&code, max_level)?;
    Ok(code)
}
