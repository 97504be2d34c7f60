//! # Metadata Policy Engine
//!
//! Federation metadata policies are composed top-down (anchor toward leaf)
//! into a single effective policy per claim, then applied to the leaf's
//! self-asserted metadata. The operator set is closed - the federation
//! specification enumerates exactly seven of them - so they are modelled as
//! named fields on [`ClaimPolicy`] rather than an open-ended registry.

mod apply;
mod compose;

pub use apply::apply_policy;
pub use compose::compose_chain_policy;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::chain::TrustChain;
use crate::error::Error;
use crate::statement::EntityTypeTag;

/// The operators that may apply to a single claim, in the fixed order they
/// are applied: `default` -> `add` -> `value` -> `one_of` -> `subset_of` ->
/// `superset_of` -> `essential`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ClaimPolicy {
    /// Override the claim's value outright.
    pub value: Option<Value>,
    /// Extend the claim (treated as a set) with these values.
    pub add: Option<Vec<Value>>,
    /// Populate the claim with this value if it is absent.
    pub default: Option<Value>,
    /// The claim's value must be one of these.
    pub one_of: Option<Vec<Value>>,
    /// The claim's value (a set) must be a subset of these.
    pub subset_of: Option<Vec<Value>>,
    /// The claim's value (a set) must be a superset of these.
    pub superset_of: Option<Vec<Value>>,
    /// The claim must be present after policy application.
    pub essential: Option<bool>,
}

/// Wire representation of a claim's policy operators, used only to detect
/// unknown operator names during deserialization - the federation
/// specification enumerates a closed set, and anything else is an error
/// per [`Error::UnknownOperator`].
#[derive(Deserialize)]
struct RawClaimPolicy {
    value: Option<Value>,
    add: Option<Vec<Value>>,
    default: Option<Value>,
    one_of: Option<Vec<Value>>,
    subset_of: Option<Vec<Value>>,
    superset_of: Option<Vec<Value>>,
    essential: Option<bool>,
    #[serde(flatten)]
    extra: HashMap<String, Value>,
}

impl ClaimPolicy {
    /// Parses a single claim's policy operators from its JSON object form,
    /// rejecting any operator outside the closed federation set.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownOperator`] if the object contains a key that
    /// is not one of the seven recognised operators.
    pub fn from_value(value: Value) -> Result<Self, Error> {
        let raw: RawClaimPolicy = serde_json::from_value(value)
            .map_err(|e| Error::Internal(anyhow::anyhow!("malformed claim policy: {e}")))?;
        if let Some(unknown) = raw.extra.keys().next() {
            return Err(Error::UnknownOperator { operator: unknown.clone() });
        }
        Ok(Self {
            value: raw.value,
            add: raw.add,
            default: raw.default,
            one_of: raw.one_of,
            subset_of: raw.subset_of,
            superset_of: raw.superset_of,
            essential: raw.essential,
        })
    }
}

impl Serialize for ClaimPolicy {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeMap;
        let mut map = serializer.serialize_map(None)?;
        if let Some(v) = &self.value {
            map.serialize_entry("value", v)?;
        }
        if let Some(v) = &self.add {
            map.serialize_entry("add", v)?;
        }
        if let Some(v) = &self.default {
            map.serialize_entry("default", v)?;
        }
        if let Some(v) = &self.one_of {
            map.serialize_entry("one_of", v)?;
        }
        if let Some(v) = &self.subset_of {
            map.serialize_entry("subset_of", v)?;
        }
        if let Some(v) = &self.superset_of {
            map.serialize_entry("superset_of", v)?;
        }
        if let Some(v) = &self.essential {
            map.serialize_entry("essential", v)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for ClaimPolicy {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Self::from_value(value).map_err(serde::de::Error::custom)
    }
}

/// Resolves `entity_type` metadata for the leaf of `chain`: composes the
/// policy carried by every non-leaf statement in the chain and applies it
/// to the leaf's own self-asserted metadata for that entity type.
///
/// # Errors
///
/// Propagates [`Error::PolicyConflict`] from composition and
/// [`Error::PolicyViolation`] / [`Error::EssentialClaimMissing`] from
/// application.
pub fn resolve_metadata(chain: &TrustChain, entity_type: &EntityTypeTag) -> Result<Map<String, Value>, Error> {
    let mut metadata = chain.leaf().metadata.get(entity_type).cloned().unwrap_or_default();
    let composed = compose_chain_policy(chain, entity_type)?;
    apply_policy(&composed, &mut metadata)?;
    Ok(metadata)
}
