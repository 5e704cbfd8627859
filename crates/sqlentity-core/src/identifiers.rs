//! SQL identifier checks.
//!
//! Table and column names are concatenated into generated SQL text, so every
//! name that enters entity metadata must be a plain identifier. Values never
//! pass through here; they are always bound as parameters.

use std::sync::OnceLock;

use regex::Regex;

use crate::error::{Error, MetadataErrorKind, Result};

/// A bare or schema-qualified identifier: `users`, `app.users`, `_tmp1`.
const IDENTIFIER_PATTERN: &str = r"^[A-Za-z_][A-Za-z0-9_]*(\.[A-Za-z_][A-Za-z0-9_]*)?$";

fn identifier_regex() -> Option<&'static Regex> {
    static REGEX: OnceLock<Option<Regex>> = OnceLock::new();
    REGEX
        .get_or_init(|| Regex::new(IDENTIFIER_PATTERN).ok())
        .as_ref()
}

/// Check whether `name` is safe to splice into SQL as an identifier.
///
/// # Examples
///
/// ```
/// use sqlentity_core::identifiers::is_valid_identifier;
///
/// assert!(is_valid_identifier("heroes"));
/// assert!(is_valid_identifier("app.heroes"));
/// assert!(!is_valid_identifier("heroes; DROP TABLE x"));
/// ```
pub fn is_valid_identifier(name: &str) -> bool {
    identifier_regex().is_some_and(|re| re.is_match(name))
}

/// Reject names that are not plain identifiers.
pub(crate) fn check_identifier(entity: &str, what: &str, name: &str) -> Result<()> {
    if is_valid_identifier(name) {
        Ok(())
    } else {
        Err(Error::metadata(
            MetadataErrorKind::InvalidIdentifier,
            entity,
            format!("{} '{}' is not a valid SQL identifier", what, name),
        ))
    }
}
