//! Attribute filters for nodes and edges.

use crate::record::Attributes;
use crate::value::Value;
use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};

/// Attribute name to the set of values it may take.
///
/// A record passes when, for every attribute in the set, at least one of
/// its values is allowed. Values compare by their text rendering, so
/// `true`, `42` and `"42"` are interchangeable in configuration.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "IndexMap<String, Value>", into = "IndexMap<String, Vec<String>>")]
pub struct FilterSet {
    constraints: IndexMap<String, IndexSet<String>>,
}

impl FilterSet {
    /// Create an empty filter (passes everything).
    pub fn new() -> Self {
        Self::default()
    }

    /// Allow `values` for `attribute` (adds to any values already allowed).
    pub fn allow<I, S>(mut self, attribute: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extend(attribute, values);
        self
    }

    pub fn extend<I, S>(&mut self, attribute: impl Into<String>, values: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.constraints
            .entry(attribute.into())
            .or_default()
            .extend(values.into_iter().map(Into::into));
    }

    pub fn get(&self, attribute: &str) -> Option<&IndexSet<String>> {
        self.constraints.get(attribute)
    }

    pub fn contains_key(&self, attribute: &str) -> bool {
        self.constraints.contains_key(attribute)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &IndexSet<String>)> {
        self.constraints.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }

    /// Evaluate a record against this filter.
    pub fn matches(&self, record: &impl Attributes) -> bool {
        matches(record, self)
    }
}

impl From<IndexMap<String, Value>> for FilterSet {
    fn from(raw: IndexMap<String, Value>) -> Self {
        let constraints = raw
            .into_iter()
            .map(|(attribute, value)| {
                let allowed: IndexSet<String> =
                    value.into_scalars().iter().filter_map(Value::to_text).collect();
                (attribute, allowed)
            })
            .collect();
        Self { constraints }
    }
}

impl From<FilterSet> for IndexMap<String, Vec<String>> {
    fn from(filter: FilterSet) -> Self {
        filter
            .constraints
            .into_iter()
            .map(|(k, v)| (k, v.into_iter().collect()))
            .collect()
    }
}

/// AND across attributes, OR within an attribute.
///
/// An attribute that the filter constrains but the record lacks fails the
/// match; an empty allowed-set places no restriction.
pub fn matches(record: &impl Attributes, filter: &FilterSet) -> bool {
    filter.constraints.iter().all(|(attribute, allowed)| {
        if allowed.is_empty() {
            return true;
        }
        let Some(value) = record.attribute(attribute) else {
            return false;
        };
        value
            .scalars()
            .filter_map(Value::to_text)
            .any(|text| allowed.contains(&text))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{Edge, Node};

    fn gene() -> Node {
        Node::new("HGNC:11603")
            .with_category(["biolink:Gene"])
            .with_property("in_taxon", "NCBITaxon:9606")
            .with_property("negated", false)
    }

    #[test]
    fn test_empty_filter_passes() {
        assert!(FilterSet::new().matches(&gene()));
    }

    #[test]
    fn test_or_within_attribute() {
        let filter = FilterSet::new().allow("category", ["biolink:Gene", "biolink:Disease"]);
        assert!(filter.matches(&gene()));
        let filter = FilterSet::new().allow("category", ["biolink:Disease"]);
        assert!(!filter.matches(&gene()));
    }

    #[test]
    fn test_and_across_attributes() {
        let filter = FilterSet::new()
            .allow("category", ["biolink:Gene"])
            .allow("in_taxon", ["NCBITaxon:10090"]);
        assert!(!filter.matches(&gene()));
    }

    #[test]
    fn test_missing_attribute_fails() {
        let filter = FilterSet::new().allow("provided_by", ["hgnc"]);
        assert!(!filter.matches(&gene()));
    }

    #[test]
    fn test_empty_allowed_set_is_unrestricted() {
        let filter = FilterSet::new().allow("provided_by", Vec::<String>::new());
        assert!(filter.matches(&gene()));
    }

    #[test]
    fn test_scalars_compare_as_text() {
        let filter = FilterSet::new().allow("negated", ["false"]);
        assert!(filter.matches(&gene()));
    }

    #[test]
    fn test_edge_attributes() {
        let edge = Edge::new("HGNC:11603", "biolink:related_to", "MONDO:0005002")
            .with_relation("RO:0003304");
        let filter = FilterSet::new()
            .allow("predicate", ["biolink:related_to"])
            .allow("relation", ["RO:0003304"]);
        assert!(filter.matches(&edge));
    }

    #[test]
    fn test_deserialize_scalar_or_list() {
        let filter: FilterSet = serde_json::from_str(
            r#"{"category": ["biolink:Gene", "biolink:Disease"], "negated": false}"#,
        )
        .unwrap();
        assert_eq!(filter.get("category").unwrap().len(), 2);
        assert!(filter.get("negated").unwrap().contains("false"));
    }
}
