//! In-memory graph store: a directed multigraph keyed by node id and by
//! `(subject, object, edge key)`.

use crate::error::ReferentialWarning;
use crate::io::IterSource;
use crate::record::{Edge, Node, Record};
use indexmap::IndexMap;
use indexmap::map::Entry;

#[derive(Debug, Clone, Default)]
pub struct GraphStore {
    nodes: IndexMap<String, Node>,
    edges: IndexMap<(String, String), IndexMap<String, Edge>>,
    edge_count: usize,
}

impl GraphStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a node, merging into an existing node with the same id.
    pub fn add_node(&mut self, node: Node) {
        match self.nodes.entry(node.id.clone()) {
            Entry::Occupied(mut existing) => existing.get_mut().merge(node),
            Entry::Vacant(slot) => {
                slot.insert(node);
            }
        }
    }

    /// Insert an edge, merging into an existing edge with the same
    /// subject, object and key.
    ///
    /// The edge is stored even if an endpoint is unknown; the returned
    /// warning names the missing endpoints.
    pub fn add_edge(&mut self, edge: Edge) -> Option<ReferentialWarning> {
        let missing: Vec<String> = [&edge.subject, &edge.object]
            .into_iter()
            .filter(|id| !self.nodes.contains_key(id.as_str()))
            .cloned()
            .collect();
        let warning = (!missing.is_empty()).then(|| ReferentialWarning {
            subject: edge.subject.clone(),
            object: edge.object.clone(),
            missing,
        });

        let parallel = self
            .edges
            .entry((edge.subject.clone(), edge.object.clone()))
            .or_default();
        match parallel.entry(edge.key()) {
            Entry::Occupied(mut existing) => existing.get_mut().merge(edge),
            Entry::Vacant(slot) => {
                slot.insert(edge);
                self.edge_count += 1;
            }
        }
        warning
    }

    pub fn get_node(&self, id: &str) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn contains_node(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    /// All parallel edges from `subject` to `object`.
    pub fn get_edge(&self, subject: &str, object: &str) -> Vec<&Edge> {
        self.edges
            .get(&(subject.to_string(), object.to_string()))
            .map(|parallel| parallel.values().collect())
            .unwrap_or_default()
    }

    pub fn number_of_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn number_of_edges(&self) -> usize {
        self.edge_count
    }

    /// Nodes in first-insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// Edges in first-insertion order of their endpoint pair.
    pub fn edges(&self) -> impl Iterator<Item = &Edge> {
        self.edges.values().flat_map(|parallel| parallel.values())
    }

    pub fn categories_of(&self, id: &str) -> Option<&[String]> {
        self.nodes.get(id).map(|n| n.category.as_slice())
    }

    /// A source replaying the store: every node, then every edge.
    pub fn source(&self) -> IterSource<impl Iterator<Item = Record> + '_> {
        IterSource::new(
            self.nodes()
                .cloned()
                .map(Record::Node)
                .chain(self.edges().cloned().map(Record::Edge)),
        )
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
        self.edges.clear();
        self.edge_count = 0;
    }
}
