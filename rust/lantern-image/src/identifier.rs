//! Image identifiers.

use std::{fmt::Display, str::FromStr};

use ::serde::{Deserialize, Serialize};

use crate::LanternImageError;

/// An [`Identifier`] names a logical image within the service. Identifiers
/// are opaque, caller-supplied strings that must be safe to embed in a URL
/// path segment: non-empty, free of path separators and NUL bytes, and not
/// beginning with a dot (which also excludes the `.` and `..` segments).
///
/// Resolvers apply their own containment checks on top of this; identifier
/// validation is the first line, not the only one.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct Identifier(String);

impl Identifier {
    /// Returns the raw string form of this identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Identifier {
    type Error = LanternImageError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if value.is_empty() {
            return Err(LanternImageError::InvalidIdentifier(
                "Identifier may not be empty".into(),
            ));
        }

        if value.starts_with('.') {
            return Err(LanternImageError::InvalidIdentifier(format!(
                "Identifier \"{value}\" may not begin with a dot"
            )));
        }

        if let Some(character) = value.chars().find(|c| matches!(c, '/' | '\\' | '\0')) {
            return Err(LanternImageError::InvalidIdentifier(format!(
                "Identifier \"{value}\" contains forbidden character {character:?}"
            )));
        }

        Ok(Self(value))
    }
}

impl FromStr for Identifier {
    type Err = LanternImageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Identifier::try_from(s.to_owned())
    }
}

impl From<Identifier> for String {
    fn from(value: Identifier) -> Self {
        value.0
    }
}

impl From<&Identifier> for String {
    fn from(value: &Identifier) -> Self {
        value.0.clone()
    }
}

impl Display for Identifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_accepts_plain_identifiers() -> anyhow::Result<()> {
        for candidate in ["cat", "abcdef1234567890", "page-1_verso", "a.b.c", "12%34"] {
            let identifier = Identifier::from_str(candidate)?;
            assert_eq!(identifier.as_str(), candidate);
        }

        Ok(())
    }

    #[test]
    fn it_rejects_path_like_identifiers() {
        for candidate in ["", "..", ".hidden", "a/b", "a\\b", "/etc/passwd", "a\0b"] {
            let result = Identifier::from_str(candidate);
            assert!(
                matches!(result, Err(LanternImageError::InvalidIdentifier(_))),
                "expected rejection of {candidate:?}"
            );
        }
    }

    #[test]
    fn it_round_trips_through_display() -> anyhow::Result<()> {
        let identifier = Identifier::from_str("cat")?;
        assert_eq!(identifier.to_string(), "cat");
        assert_eq!(String::from(&identifier), "cat");

        Ok(())
    }
}
