//! Identity handling module for Catalog-Harvest
//!
//! An identity is the durable key of a catalog item (e.g. a numeric product id).
//! Identities always hold their canonical text form, which is the form sent to
//! the remote store.

mod canonical;
mod extract;

use crate::IdentityError;
use serde::{Deserialize, Serialize};
use std::fmt;

// Re-export main functions
pub use canonical::canonicalize;
pub use extract::extract_from_url;

/// Canonical identity of a catalog item
///
/// Construction always goes through [`canonicalize`], so two identities compare
/// equal exactly when their canonical text forms are equal (`"12.000"` and
/// `"12"` are the same identity).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Identity(String);

impl Identity {
    /// Parses an identity from its textual form
    ///
    /// Accepts a run of ASCII digits with at most one decimal point. Surrounding
    /// whitespace is ignored.
    ///
    /// # Examples
    ///
    /// ```
    /// use catalog_harvest::identity::Identity;
    ///
    /// assert_eq!(Identity::parse("64.1000").unwrap().as_str(), "64.1");
    /// assert_eq!(Identity::parse("3529").unwrap().as_str(), "3529");
    /// assert!(Identity::parse("12a").is_err());
    /// ```
    pub fn parse(raw: &str) -> Result<Self, IdentityError> {
        let trimmed = raw.trim();

        let mut dots = 0;
        for c in trimmed.chars() {
            match c {
                '0'..='9' => {}
                '.' => dots += 1,
                _ => return Err(IdentityError::Malformed(raw.to_string())),
            }
        }

        if dots > 1 || !trimmed.starts_with(|c: char| c.is_ascii_digit()) {
            return Err(IdentityError::Malformed(raw.to_string()));
        }

        Ok(Self(canonicalize(trimmed)))
    }

    /// Builds an identity from a JSON number
    ///
    /// Floats that carry an integral value (`12.0`) collapse to their integral
    /// canonical form (`"12"`).
    pub fn from_number(number: &serde_json::Number) -> Result<Self, IdentityError> {
        Self::parse(&number.to_string())
    }

    /// Returns the canonical text form
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Identity {
    type Error = IdentityError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Identity> for String {
    fn from(identity: Identity) -> Self {
        identity.0
    }
}

impl std::str::FromStr for Identity {
    type Err = IdentityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
