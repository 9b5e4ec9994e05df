use std::collections::HashSet;

/// Author associations allowed to issue commands when nothing else is configured.
pub const DEFAULT_TRUSTED_AUTHOR_ASSOCIATIONS: [&str; 2] = ["OWNER", "MEMBER"];

/// Normalize an author association for case-insensitive matching.
pub fn normalize_author_association(raw: &str) -> String {
    raw.trim().to_ascii_uppercase()
}

/// Build the normalized trusted-association set from CLI or configuration values.
pub fn build_trusted_author_associations<'a>(
    associations: impl IntoIterator<Item = &'a str>,
) -> HashSet<String> {
    associations
        .into_iter()
        .map(normalize_author_association)
        .filter(|association| !association.is_empty())
        .collect::<HashSet<_>>()
}

pub fn default_trusted_author_associations() -> HashSet<String> {
    build_trusted_author_associations(DEFAULT_TRUSTED_AUTHOR_ASSOCIATIONS)
}

/// Return true when the comment author's association is in the trusted set.
///
/// Org membership must be public on GitHub for `author_association` to report
/// `MEMBER`; private members show up as `CONTRIBUTOR` or `NONE`.
pub fn is_trusted_author_association(association: &str, trusted: &HashSet<String>) -> bool {
    let normalized = normalize_author_association(association);
    !normalized.is_empty() && trusted.contains(&normalized)
}
