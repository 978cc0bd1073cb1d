//! Ordered-precedence lookups over optional fields

/// Return the first candidate that is present and non-empty.
///
/// Candidates are checked in order, so the slice order *is* the precedence.
pub fn first_non_empty<'a>(candidates: &[Option<&'a str>]) -> Option<&'a str> {
    candidates
        .iter()
        .flatten()
        .copied()
        .find(|value| !value.is_empty())
}

/// Like [`first_non_empty`], falling back to `default` when nothing matches.
pub fn first_non_empty_or<'a>(candidates: &[Option<&'a str>], default: &'a str) -> &'a str {
    first_non_empty(candidates).unwrap_or(default)
}
