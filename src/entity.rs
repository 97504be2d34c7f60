//! # Entity Identifiers
//!
//! An [`EntityId`] identifies a participant in an OpenID Connect Federation.
//! Identifiers are absolute HTTPS URLs; this module normalises them so the
//! same entity always compares and hashes identically regardless of how a
//! caller or peer server happened to write the URL.

use std::fmt;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::Error;

/// An absolute HTTPS URL identifying a federation entity.
///
/// Normalisation lower-cases the scheme and host, strips any fragment and
/// query, and removes a single trailing slash (so `https://Example.com/a/`
/// and `https://example.com/a` are the same entity). The path is otherwise
/// kept verbatim - federation identifiers are case-sensitive below the
/// authority component.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(try_from = "String", into = "String")]
pub struct EntityId(String);

impl EntityId {
    /// Parse and normalise an entity identifier.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidEntityId`] if `raw` is not an absolute
    /// `https` URL.
    pub fn parse(raw: &str) -> Result<Self, Error> {
        let mut url = Url::parse(raw)
            .map_err(|e| Error::InvalidEntityId { value: raw.to_string(), reason: e.to_string() })?;

        if url.scheme() != "https" {
            return Err(Error::InvalidEntityId {
                value: raw.to_string(),
                reason: "entity identifiers must use the https scheme".into(),
            });
        }
        if url.host_str().is_none() {
            return Err(Error::InvalidEntityId {
                value: raw.to_string(),
                reason: "entity identifiers must have a host".into(),
            });
        }

        url.set_fragment(None);
        url.set_query(None);

        let mut normalised = url.to_string();
        if normalised.ends_with('/') && normalised.matches('/').count() > 3 {
            normalised.pop();
        }

        Ok(Self(normalised))
    }

    /// Returns the normalised identifier as a `&str`.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Builds the well-known entity configuration URL for this entity.
    #[must_use]
    pub fn well_known_configuration_url(&self) -> String {
        format!("{}/.well-known/openid-federation", self.0)
    }
}

impl TryFrom<String> for EntityId {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<EntityId> for String {
    fn from(value: EntityId) -> Self {
        value.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for EntityId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalises_scheme_and_host_case() {
        let a = EntityId::parse("HTTPS://Example.COM/leaf").unwrap();
        let b = EntityId::parse("https://example.com/leaf").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn strips_query_and_fragment() {
        let id = EntityId::parse("https://example.com/leaf?foo=bar#frag").unwrap();
        assert_eq!(id.as_str(), "https://example.com/leaf");
    }

    #[test]
    fn preserves_path_case() {
        let id = EntityId::parse("https://example.com/Leaf").unwrap();
        assert_eq!(id.as_str(), "https://example.com/Leaf");
    }

    #[test]
    fn rejects_non_https() {
        assert!(EntityId::parse("http://example.com").is_err());
    }

    #[test]
    fn trailing_slash_on_subpath_is_removed() {
        let id = EntityId::parse("https://example.com/leaf/").unwrap();
        assert_eq!(id.as_str(), "https://example.com/leaf");
    }

    #[test]
    fn bare_root_keeps_no_trailing_slash_ambiguity() {
        let id = EntityId::parse("https://example.com").unwrap();
        assert_eq!(id.as_str(), "https://example.com/");
    }
}
