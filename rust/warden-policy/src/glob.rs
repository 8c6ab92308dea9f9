use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::PolicyError;

/// Name pattern used by rules and member rules.
///
/// Four shapes are accepted: `*` matches anything, `prefix*` and `*suffix`
/// match by prefix and suffix, and anything without a `*` matches exactly.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct Glob(Pattern);

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
enum Pattern {
    Any,
    Prefix(String),
    Suffix(String),
    Exact(String),
}

impl Glob {
    /// The pattern matching every name.
    pub const fn any() -> Self {
        Self(Pattern::Any)
    }

    /// A pattern matching exactly `name`, which must not contain `*`.
    pub(crate) fn literal(name: &str) -> Self {
        debug_assert!(!name.contains('*'));
        Self(Pattern::Exact(name.to_owned()))
    }

    /// Parse a pattern.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError::InvalidGlob`] for an empty pattern or one with
    /// a `*` in any position other than the first or last.
    pub fn parse(pattern: &str) -> Result<Self, PolicyError> {
        let invalid = |reason| PolicyError::InvalidGlob {
            glob: pattern.to_owned(),
            reason,
        };

        if pattern.is_empty() {
            return Err(invalid("pattern is empty"));
        }
        if pattern == "*" {
            return Ok(Self(Pattern::Any));
        }
        let parsed = if let Some(prefix) = pattern.strip_suffix('*') {
            Pattern::Prefix(prefix.to_owned())
        } else if let Some(suffix) = pattern.strip_prefix('*') {
            Pattern::Suffix(suffix.to_owned())
        } else {
            Pattern::Exact(pattern.to_owned())
        };
        match &parsed {
            Pattern::Prefix(rest) | Pattern::Suffix(rest) | Pattern::Exact(rest)
                if rest.contains('*') =>
            {
                Err(invalid("`*` may only appear at the start or the end"))
            }
            _ => Ok(Self(parsed)),
        }
    }

    /// Whether `name` matches.
    pub fn matches(&self, name: &str) -> bool {
        match &self.0 {
            Pattern::Any => true,
            Pattern::Prefix(prefix) => name.starts_with(prefix.as_str()),
            Pattern::Suffix(suffix) => name.ends_with(suffix.as_str()),
            Pattern::Exact(exact) => name == exact,
        }
    }

    /// Whether this is the `*` pattern.
    pub fn is_any(&self) -> bool {
        matches!(self.0, Pattern::Any)
    }
}

impl Display for Glob {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.0 {
            Pattern::Any => f.write_str("*"),
            Pattern::Prefix(prefix) => write!(f, "{prefix}*"),
            Pattern::Suffix(suffix) => write!(f, "*{suffix}"),
            Pattern::Exact(exact) => f.write_str(exact),
        }
    }
}

impl FromStr for Glob {
    type Err = PolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl From<Glob> for String {
    fn from(glob: Glob) -> Self {
        glob.to_string()
    }
}

impl TryFrom<String> for Glob {
    type Error = PolicyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl TryFrom<&str> for Glob {
    type Error = PolicyError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn glob(pattern: &str) -> Glob {
        Glob::parse(pattern).unwrap()
    }

    #[test]
    fn it_matches_everything_with_a_lone_star() {
        assert!(glob("*").is_any());
        assert!(glob("*").matches(""));
        assert!(glob("*").matches("/org/example"));
    }

    #[test]
    fn it_matches_prefixes_and_suffixes() {
        assert!(glob("/org/*").matches("/org/example"));
        assert!(glob("/org/*").matches("/org/"));
        assert!(!glob("/org/*").matches("/com/example"));

        assert!(glob("*.Chat").matches("org.example.Chat"));
        assert!(!glob("*.Chat").matches("org.example.Chat2"));
    }

    #[test]
    fn it_matches_literals_exactly() {
        assert!(glob("ping").matches("ping"));
        assert!(!glob("ping").matches("pings"));
        assert!(!glob("ping").matches("bing"));
    }

    #[test]
    fn it_rejects_malformed_patterns() {
        for pattern in ["", "**", "a*b", "*a*", "a**"] {
            assert!(
                matches!(Glob::parse(pattern), Err(PolicyError::InvalidGlob { .. })),
                "{pattern:?} should be rejected"
            );
        }
    }

    #[test]
    fn it_displays_the_parsed_pattern() {
        for pattern in ["*", "org.*", "*.Chat", "exact"] {
            assert_eq!(glob(pattern).to_string(), pattern);
        }
    }

    #[test]
    fn it_rejects_malformed_patterns_when_decoding() {
        assert!(serde_json::from_str::<Glob>("\"a*b\"").is_err());
        assert_eq!(serde_json::from_str::<Glob>("\"a*\"").unwrap(), glob("a*"));
    }
}
