//! Status normalization.
//!
//! Carriers describe the same delivery states in wildly different words. A
//! [`StatusMapping`] is an ordered list of `(substring, status)` rules; the
//! first rule whose substring occurs in the raw text (case-insensitively)
//! decides the canonical status. Order matters when substrings overlap
//! ("not delivered" must precede "delivered"), so the mapping is a list, not
//! a hash map.

use parcelwatch_core::CanonicalStatus;
use serde::de::{self, MapAccess, SeqAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Map raw carrier status text to a canonical status.
///
/// Pure and deterministic. Returns [`CanonicalStatus::Unknown`] when no rule
/// matches.
#[must_use]
pub fn normalize(raw_text: &str, mapping: &StatusMapping) -> CanonicalStatus {
    let haystack = raw_text.to_lowercase();
    mapping
        .rules()
        .iter()
        .find(|rule| haystack.contains(rule.needle()))
        .map_or(CanonicalStatus::Unknown, StatusRule::status)
}

/// One substring rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusRule {
    contains: String,
    needle: String,
    status: CanonicalStatus,
}

impl StatusRule {
    /// Create a rule matching `contains` anywhere in the status text.
    #[must_use]
    pub fn new(contains: impl Into<String>, status: CanonicalStatus) -> Self {
        let contains = contains.into();
        let needle = contains.to_lowercase();
        Self {
            contains,
            needle,
            status,
        }
    }

    /// The substring as declared.
    #[must_use]
    pub fn contains(&self) -> &str {
        &self.contains
    }

    fn needle(&self) -> &str {
        &self.needle
    }

    /// The status this rule assigns.
    #[must_use]
    pub fn status(&self) -> CanonicalStatus {
        self.status
    }
}

/// Ordered substring-to-status rules for one carrier.
///
/// Deserializes from either a TOML table (document order is precedence):
///
/// ```toml
/// [status_mapping]
/// "out for delivery" = "out_for_delivery"
/// "delivered" = "delivered"
/// ```
///
/// or an array of tables with `contains` / `status` keys.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusMapping {
    rules: Vec<StatusRule>,
}

impl StatusMapping {
    /// Create a mapping from rules in precedence order.
    #[must_use]
    pub fn new(rules: Vec<StatusRule>) -> Self {
        Self { rules }
    }

    /// Rules in precedence order.
    #[must_use]
    pub fn rules(&self) -> &[StatusRule] {
        &self.rules
    }

    /// Number of rules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Whether the mapping has no rules.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl<S: Into<String>> FromIterator<(S, CanonicalStatus)> for StatusMapping {
    fn from_iter<I: IntoIterator<Item = (S, CanonicalStatus)>>(iter: I) -> Self {
        Self::new(
            iter.into_iter()
                .map(|(contains, status)| StatusRule::new(contains, status))
                .collect(),
        )
    }
}

impl Serialize for StatusMapping {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.rules.len()))?;
        for rule in &self.rules {
            map.serialize_entry(&rule.contains, &rule.status)?;
        }
        map.end()
    }
}

#[derive(Deserialize)]
struct RuleEntry {
    contains: String,
    status: CanonicalStatus,
}

struct StatusMappingVisitor;

impl<'de> Visitor<'de> for StatusMappingVisitor {
    type Value = StatusMapping;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a table of substring = status pairs or a list of {contains, status} rules")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
        let mut rules = Vec::new();
        while let Some((contains, status)) = access.next_entry::<String, CanonicalStatus>()? {
            rules.push(StatusRule::new(contains, status));
        }
        Ok(StatusMapping::new(rules))
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
        let mut rules = Vec::new();
        while let Some(entry) = access.next_element::<RuleEntry>()? {
            if entry.contains.is_empty() {
                return Err(de::Error::custom("status rule substring cannot be empty"));
            }
            rules.push(StatusRule::new(entry.contains, entry.status));
        }
        Ok(StatusMapping::new(rules))
    }
}

impl<'de> Deserialize<'de> for StatusMapping {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(StatusMappingVisitor)
    }
}
