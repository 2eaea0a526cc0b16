//! Validated storage identifiers.
//!
//! Collection and field names end up inside storage commands as identifiers,
//! which cannot be bound as parameters. An [`Ident`] can only be built through
//! [`Ident::new`], so every name that reaches the storage layer has passed the
//! allow-list below. Rendered commands additionally double-quote identifiers.

use std::borrow::Borrow;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::IdentError;

/// Maximum identifier length in bytes.
pub const MAX_IDENT_LEN: usize = 63;

/// Words that cannot be used as identifiers, compared case-insensitively.
const RESERVED: &[&str] = &[
    "all", "analyse", "analyze", "and", "any", "array", "as", "asc", "asymmetric", "both",
    "case", "cast", "check", "collate", "column", "constraint", "create", "current_catalog",
    "current_date", "current_role", "current_time", "current_timestamp", "current_user",
    "default", "deferrable", "delete", "desc", "distinct", "do", "drop", "else", "end",
    "except", "false", "fetch", "for", "foreign", "from", "grant", "group", "having", "in",
    "initially", "insert", "intersect", "into", "lateral", "leading", "limit", "localtime",
    "localtimestamp", "not", "null", "offset", "on", "only", "or", "order", "placing",
    "primary", "references", "returning", "select", "session_user", "some", "symmetric",
    "table", "then", "to", "trailing", "true", "union", "unique", "update", "user", "using",
    "values", "variadic", "when", "where", "window", "with",
];

/// A name that is safe to place in a storage command.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Ident(String);

impl Ident {
    /// Validates `raw` as an identifier.
    ///
    /// Accepts `[A-Za-z_][A-Za-z0-9_]*` of at most [`MAX_IDENT_LEN`] bytes that
    /// is neither a reserved word nor in the `pg_` system namespace.
    ///
    /// # Example
    ///
    /// ```
    /// use vectorbase_core::Ident;
    ///
    /// assert!(Ident::new("docs").is_ok());
    /// assert!(Ident::new("docs; DROP TABLE users").is_err());
    /// ```
    pub fn new(raw: impl Into<String>) -> Result<Self, IdentError> {
        let raw = raw.into();

        if raw.is_empty() {
            return Err(IdentError::Empty);
        }
        if raw.len() > MAX_IDENT_LEN {
            return Err(IdentError::TooLong(raw));
        }
        if let Some(ch) = raw
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || *c == '_'))
        {
            return Err(IdentError::InvalidChar { name: raw, ch });
        }
        if raw.as_bytes()[0].is_ascii_digit() {
            return Err(IdentError::LeadingDigit(raw));
        }

        let lower = raw.to_ascii_lowercase();
        if lower.starts_with("pg_") || RESERVED.binary_search(&lower.as_str()).is_ok() {
            return Err(IdentError::Reserved(raw));
        }

        Ok(Self(raw))
    }

    /// Returns the identifier text.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the identifier wrapped in double quotes for command text.
    pub fn quoted(&self) -> String {
        // The allow-list excludes `"`, so no escaping is needed.
        format!("\"{}\"", self.0)
    }
}

impl TryFrom<String> for Ident {
    type Error = IdentError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<&str> for Ident {
    type Error = IdentError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Ident> for String {
    fn from(ident: Ident) -> Self {
        ident.0
    }
}

impl AsRef<str> for Ident {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for Ident {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Ident {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reserved_list_is_sorted() {
        // binary_search depends on it
        let mut sorted = RESERVED.to_vec();
        sorted.sort_unstable();
        assert_eq!(sorted, RESERVED);
    }

    #[test]
    fn test_valid_identifiers() {
        for name in ["docs", "Docs_2024", "_private", "a", "embedding_384"] {
            assert_eq!(Ident::new(name).unwrap().as_str(), name);
        }
    }

    #[test]
    fn test_rejects_empty() {
        assert_eq!(Ident::new(""), Err(IdentError::Empty));
    }

    #[test]
    fn test_rejects_injection_attempts() {
        for name in [
            "docs; DROP TABLE users",
            "docs--",
            "\"docs\"",
            "docs name",
            "docs)",
            "d\u{e9}j\u{e0}",
        ] {
            assert!(
                matches!(Ident::new(name), Err(IdentError::InvalidChar { .. })),
                "{name} should be rejected"
            );
        }
    }

    #[test]
    fn test_rejects_leading_digit() {
        assert_eq!(
            Ident::new("1docs"),
            Err(IdentError::LeadingDigit("1docs".into()))
        );
    }

    #[test]
    fn test_rejects_reserved_words_any_case() {
        assert!(matches!(Ident::new("select"), Err(IdentError::Reserved(_))));
        assert!(matches!(Ident::new("TABLE"), Err(IdentError::Reserved(_))));
        assert!(matches!(Ident::new("pg_class"), Err(IdentError::Reserved(_))));
    }

    #[test]
    fn test_rejects_too_long() {
        let name = "a".repeat(MAX_IDENT_LEN + 1);
        assert!(matches!(Ident::new(name), Err(IdentError::TooLong(_))));
        assert!(Ident::new("a".repeat(MAX_IDENT_LEN)).is_ok());
    }

    #[test]
    fn test_quoted() {
        assert_eq!(Ident::new("docs").unwrap().quoted(), "\"docs\"");
    }

    #[test]
    fn test_deserialize_validates() {
        let ok: Ident = serde_json::from_str("\"docs\"").unwrap();
        assert_eq!(ok.as_str(), "docs");
        assert!(serde_json::from_str::<Ident>("\"bad name\"").is_err());
    }
}
