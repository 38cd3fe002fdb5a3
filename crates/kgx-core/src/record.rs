//! Nodes, edges and the record stream between sources, sinks and the store.

use crate::error::KgxError;
use crate::value::{Properties, PropertiesExt, Value};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;

/// Category given to nodes that declare none.
pub const DEFAULT_CATEGORY: &str = "biolink:NamedThing";

/// Predicate used when a relation cannot be mapped to a biolink predicate.
pub const DEFAULT_PREDICATE: &str = "biolink:related_to";

/// Properties that are always stored as arrays, even with one element.
pub const MULTIVALUED_PROPERTIES: &[&str] = &[
    "category",
    "provided_by",
    "xref",
    "synonym",
    "same_as",
    "publications",
];

/// Core node columns, in output order.
pub const NODE_CORE_FIELDS: &[&str] = &["id", "category"];

/// Core edge columns, in output order.
pub const EDGE_CORE_FIELDS: &[&str] = &["id", "subject", "predicate", "object", "relation", "type"];

pub fn is_multivalued(name: &str) -> bool {
    MULTIVALUED_PROPERTIES.contains(&name)
}

/// A typed entity in the graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Properties", into = "Properties")]
pub struct Node {
    pub id: String,
    pub category: Vec<String>,
    pub properties: Properties,
}

impl Node {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            category: vec![DEFAULT_CATEGORY.to_string()],
            properties: Properties::new(),
        }
    }

    /// Replace the categories (an empty list falls back to the default).
    pub fn with_category<I, S>(mut self, categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.category.clear();
        for category in categories {
            push_unique(&mut self.category, category.into());
        }
        self.normalize();
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties = self.properties.with(key, value);
        normalize_multivalued(&mut self.properties);
        self
    }

    pub fn name(&self) -> Option<&str> {
        self.properties.get("name").and_then(Value::as_str)
    }

    /// Build a node from a flat attribute bag (`id`, `category`, properties).
    pub fn from_properties(mut props: Properties) -> Result<Self, KgxError> {
        let id = take_text(&mut props, "id")
            .ok_or_else(|| KgxError::malformed("node record has no id"))?;
        let category = props
            .shift_remove("category")
            .map(text_list)
            .unwrap_or_default();
        normalize_multivalued(&mut props);

        let mut node = Self {
            id,
            category: Vec::new(),
            properties: props,
        };
        for c in category {
            push_unique(&mut node.category, c);
        }
        node.normalize();
        Ok(node)
    }

    /// Flatten back to an attribute bag, core fields first.
    pub fn to_properties(&self) -> Properties {
        let mut props = Properties::new();
        props.insert("id".into(), Value::from(self.id.clone()));
        props.insert(
            "category".into(),
            Value::Array(self.category.iter().cloned().map(Value::String).collect()),
        );
        for (key, value) in &self.properties {
            props.insert(key.clone(), value.clone());
        }
        props
    }

    /// Merge a re-inserted node: categories and array properties are
    /// unioned, scalars are overwritten by `other`.
    pub fn merge(&mut self, other: Node) {
        let was_default = self.category == [DEFAULT_CATEGORY];
        if was_default && other.category != [DEFAULT_CATEGORY] {
            self.category.clear();
        }
        for category in other.category {
            if was_default || category != DEFAULT_CATEGORY {
                push_unique(&mut self.category, category);
            }
        }
        self.normalize();
        self.properties.merge_from(other.properties);
    }

    fn normalize(&mut self) {
        if self.category.is_empty() {
            self.category.push(DEFAULT_CATEGORY.to_string());
        }
    }
}

impl TryFrom<Properties> for Node {
    type Error = KgxError;

    fn try_from(props: Properties) -> Result<Self, Self::Error> {
        Node::from_properties(props)
    }
}

impl From<Node> for Properties {
    fn from(node: Node) -> Self {
        node.to_properties()
    }
}

/// A typed, attributed relationship between two nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Properties", into = "Properties")]
pub struct Edge {
    pub subject: String,
    pub object: String,
    pub predicate: String,
    pub relation: Option<String>,
    pub edge_type: Option<String>,
    pub id: Option<String>,
    pub properties: Properties,
}

impl Edge {
    pub fn new(
        subject: impl Into<String>,
        predicate: impl Into<String>,
        object: impl Into<String>,
    ) -> Self {
        Self {
            subject: subject.into(),
            object: object.into(),
            predicate: predicate.into(),
            relation: None,
            edge_type: None,
            id: None,
            properties: Properties::new(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_relation(mut self, relation: impl Into<String>) -> Self {
        self.relation = Some(relation.into());
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties = self.properties.with(key, value);
        normalize_multivalued(&mut self.properties);
        self
    }

    /// Key distinguishing parallel edges between the same pair of nodes.
    ///
    /// `predicate|id` when the edge carries an id, `predicate|relation` when
    /// the relation adds information, otherwise the bare predicate.
    pub fn key(&self) -> String {
        match (&self.id, &self.relation) {
            (Some(id), _) => format!("{}|{}", self.predicate, id),
            (None, Some(relation)) if *relation != self.predicate => {
                format!("{}|{}", self.predicate, relation)
            }
            _ => self.predicate.clone(),
        }
    }

    /// Build an edge from a flat attribute bag.
    ///
    /// `subject`, `object` and `predicate` are required.
    pub fn from_properties(mut props: Properties) -> Result<Self, KgxError> {
        let subject = take_text(&mut props, "subject");
        let object = take_text(&mut props, "object");
        let predicate = take_text(&mut props, "predicate");
        let (subject, object, predicate) = match (subject, object, predicate) {
            (Some(s), Some(o), Some(p)) => (s, o, p),
            (s, o, p) => {
                let missing: Vec<&str> = [("subject", s), ("object", o), ("predicate", p)]
                    .into_iter()
                    .filter(|(_, v)| v.is_none())
                    .map(|(name, _)| name)
                    .collect();
                return Err(KgxError::malformed(format!(
                    "edge record is missing {}",
                    missing.join(", ")
                )));
            }
        };
        let relation = take_text(&mut props, "relation");
        let edge_type = take_text(&mut props, "type");
        let id = take_text(&mut props, "id");
        normalize_multivalued(&mut props);

        Ok(Self {
            subject,
            object,
            predicate,
            relation,
            edge_type,
            id,
            properties: props,
        })
    }

    pub fn to_properties(&self) -> Properties {
        let mut props = Properties::new();
        if let Some(id) = &self.id {
            props.insert("id".into(), Value::from(id.clone()));
        }
        props.insert("subject".into(), Value::from(self.subject.clone()));
        props.insert("predicate".into(), Value::from(self.predicate.clone()));
        props.insert("object".into(), Value::from(self.object.clone()));
        if let Some(relation) = &self.relation {
            props.insert("relation".into(), Value::from(relation.clone()));
        }
        if let Some(edge_type) = &self.edge_type {
            props.insert("type".into(), Value::from(edge_type.clone()));
        }
        for (key, value) in &self.properties {
            props.insert(key.clone(), value.clone());
        }
        props
    }

    pub fn merge(&mut self, other: Edge) {
        if other.relation.is_some() {
            self.relation = other.relation;
        }
        if other.edge_type.is_some() {
            self.edge_type = other.edge_type;
        }
        if other.id.is_some() {
            self.id = other.id;
        }
        self.properties.merge_from(other.properties);
    }
}

impl TryFrom<Properties> for Edge {
    type Error = KgxError;

    fn try_from(props: Properties) -> Result<Self, Self::Error> {
        Edge::from_properties(props)
    }
}

impl From<Edge> for Properties {
    fn from(edge: Edge) -> Self {
        edge.to_properties()
    }
}

/// One unit of the stream between sources, sinks and the store.
#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    Node(Node),
    Edge(Edge),
}

impl Record {
    /// Classify a flat attribute bag: it is an edge if it names both endpoints.
    pub fn from_properties(props: Properties) -> Result<Self, KgxError> {
        if props.contains_key("subject") && props.contains_key("object") {
            Edge::from_properties(props).map(Record::Edge)
        } else {
            Node::from_properties(props).map(Record::Node)
        }
    }

    pub fn to_properties(&self) -> Properties {
        match self {
            Record::Node(node) => node.to_properties(),
            Record::Edge(edge) => edge.to_properties(),
        }
    }

    pub fn as_node(&self) -> Option<&Node> {
        match self {
            Record::Node(node) => Some(node),
            Record::Edge(_) => None,
        }
    }

    pub fn as_edge(&self) -> Option<&Edge> {
        match self {
            Record::Edge(edge) => Some(edge),
            Record::Node(_) => None,
        }
    }
}

impl From<Node> for Record {
    fn from(node: Node) -> Self {
        Record::Node(node)
    }
}

impl From<Edge> for Record {
    fn from(edge: Edge) -> Self {
        Record::Edge(edge)
    }
}

/// Read access to a record's attributes by name, for filtering.
pub trait Attributes {
    fn attribute(&self, name: &str) -> Option<Cow<'_, Value>>;
}

impl Attributes for Node {
    fn attribute(&self, name: &str) -> Option<Cow<'_, Value>> {
        match name {
            "id" => Some(Cow::Owned(Value::from(self.id.clone()))),
            "category" => Some(Cow::Owned(Value::from(self.category.clone()))),
            _ => self.properties.get(name).map(Cow::Borrowed),
        }
    }
}

impl Attributes for Edge {
    fn attribute(&self, name: &str) -> Option<Cow<'_, Value>> {
        let text = |s: &str| Some(Cow::Owned(Value::from(s)));
        match name {
            "subject" => text(&self.subject),
            "object" => text(&self.object),
            "predicate" => text(&self.predicate),
            "relation" => self.relation.as_deref().and_then(text),
            "type" => self.edge_type.as_deref().and_then(text),
            "id" => self.id.as_deref().and_then(text),
            _ => self.properties.get(name).map(Cow::Borrowed),
        }
    }
}

/// An edge together with the categories of its endpoints.
///
/// Exposes the derived `subject_category` and `object_category` attributes.
pub struct EdgeView<'a> {
    pub edge: &'a Edge,
    pub subject_category: &'a [String],
    pub object_category: &'a [String],
}

impl Attributes for EdgeView<'_> {
    fn attribute(&self, name: &str) -> Option<Cow<'_, Value>> {
        let categories = match name {
            "subject_category" => self.subject_category,
            "object_category" => self.object_category,
            _ => return self.edge.attribute(name),
        };
        if categories.is_empty() {
            None
        } else {
            Some(Cow::Owned(Value::from(categories.to_vec())))
        }
    }
}

fn push_unique(list: &mut Vec<String>, item: String) {
    if !item.is_empty() && !list.contains(&item) {
        list.push(item);
    }
}

fn take_text(props: &mut Properties, key: &str) -> Option<String> {
    props
        .shift_remove(key)
        .and_then(|v| match v {
            Value::Array(items) => items.into_iter().find_map(|v| v.to_text()),
            other => other.to_text(),
        })
        .filter(|s| !s.is_empty())
}

fn text_list(value: Value) -> Vec<String> {
    value
        .into_scalars()
        .into_iter()
        .filter_map(|v| v.to_text())
        .collect()
}

/// Promote multivalued properties to arrays.
pub fn normalize_multivalued(props: &mut Properties) {
    for (key, value) in props.iter_mut() {
        if is_multivalued(key) && !matches!(value, Value::Array(_) | Value::Null) {
            let scalar = std::mem::replace(value, Value::Null);
            *value = Value::Array(vec![scalar]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_defaults_category() {
        let node = Node::from_properties(Properties::new().with("id", "HP:0000006")).unwrap();
        assert_eq!(node.category, vec![DEFAULT_CATEGORY]);
    }

    #[test]
    fn test_node_requires_id() {
        let err = Node::from_properties(Properties::new().with("name", "x")).unwrap_err();
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_multivalued_promoted() {
        let node = Node::from_properties(
            Properties::new()
                .with("id", "HGNC:11603")
                .with("category", "biolink:Gene")
                .with("provided_by", "hgnc.tsv"),
        )
        .unwrap();
        assert_eq!(node.category, vec!["biolink:Gene"]);
        assert_eq!(node.properties["provided_by"], Value::from(vec!["hgnc.tsv"]));
    }

    #[test]
    fn test_node_merge() {
        let mut a = Node::new("HGNC:11603")
            .with_category(["biolink:Gene"])
            .with_property("name", "TBX4")
            .with_property("synonym", vec!["a"]);
        let b = Node::new("HGNC:11603")
            .with_category(["biolink:NamedThing", "biolink:GeneOrGeneProduct"])
            .with_property("name", "T-box 4")
            .with_property("synonym", vec!["b"]);
        a.merge(b);
        assert_eq!(a.category, vec!["biolink:Gene", "biolink:GeneOrGeneProduct"]);
        assert_eq!(a.name(), Some("T-box 4"));
        assert_eq!(a.properties["synonym"], Value::from(vec!["a", "b"]));
    }

    #[test]
    fn test_merge_replaces_default_category() {
        let mut a = Node::new("HP:1");
        a.merge(Node::new("HP:1").with_category(["biolink:PhenotypicFeature"]));
        assert_eq!(a.category, vec!["biolink:PhenotypicFeature"]);
    }

    #[test]
    fn test_edge_key() {
        let e = Edge::new("A", "biolink:related_to", "B");
        assert_eq!(e.key(), "biolink:related_to");
        let e = e.with_id("X:1");
        assert_eq!(e.key(), "biolink:related_to|X:1");
        let e = Edge::new("A", "biolink:related_to", "B").with_relation("RO:0002410");
        assert_eq!(e.key(), "biolink:related_to|RO:0002410");
    }

    #[test]
    fn test_edge_requires_endpoints_and_predicate() {
        let err = Edge::from_properties(
            Properties::new().with("subject", "A").with("object", "B"),
        )
        .unwrap_err();
        assert_eq!(err.to_string(), "malformed record: edge record is missing predicate");
    }

    #[test]
    fn test_record_classification() {
        let edge = Record::from_properties(
            Properties::new()
                .with("subject", "A")
                .with("predicate", "biolink:interacts_with")
                .with("object", "B"),
        )
        .unwrap();
        assert!(edge.as_edge().is_some());
        let node = Record::from_properties(Properties::new().with("id", "A")).unwrap();
        assert!(node.as_node().is_some());
    }

    #[test]
    fn test_serde_through_properties() {
        let edge = Edge::new("A", "biolink:interacts_with", "B").with_property("score", 0.5);
        let json = serde_json::to_string(&edge).unwrap();
        assert_eq!(
            json,
            r#"{"subject":"A","predicate":"biolink:interacts_with","object":"B","score":0.5}"#
        );
        let back: Edge = serde_json::from_str(&json).unwrap();
        assert_eq!(back, edge);
    }

    #[test]
    fn test_edge_view_categories() {
        let edge = Edge::new("A", "biolink:related_to", "B");
        let gene = vec!["biolink:Gene".to_string()];
        let view = EdgeView {
            edge: &edge,
            subject_category: &gene,
            object_category: &[],
        };
        assert_eq!(
            view.attribute("subject_category").unwrap().into_owned(),
            Value::from(vec!["biolink:Gene"])
        );
        assert!(view.attribute("object_category").is_none());
        assert!(view.attribute("predicate").is_some());
    }
}
