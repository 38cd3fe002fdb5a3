//! Property-graph databases as a sink and a source.
//!
//! The database is reached through [`PropertyGraphClient`], a batched
//! merge/fetch API. [`InMemoryPropertyGraph`] implements it for tests and
//! for piping graphs between transformations.

use kgx_core::{Edge, GraphStore, KgxError, Node, Record, Sink, Source};
use std::collections::VecDeque;

/// Default number of records per client call.
pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// Transactional append API of a property-graph database.
///
/// `merge_*` must be idempotent: nodes are keyed by id, edges by
/// `(subject, object, key)`. Re-merging a record updates it in place.
pub trait PropertyGraphClient {
    fn merge_nodes(&mut self, nodes: &[Node]) -> Result<(), KgxError>;

    fn merge_edges(&mut self, edges: &[Edge]) -> Result<(), KgxError>;

    /// Up to `limit` nodes starting at `offset`, in a stable order.
    fn fetch_nodes(&self, offset: usize, limit: usize) -> Result<Vec<Node>, KgxError>;

    /// Up to `limit` edges starting at `offset`, in a stable order.
    fn fetch_edges(&self, offset: usize, limit: usize) -> Result<Vec<Edge>, KgxError>;
}

/// A property graph held in memory.
#[derive(Debug, Default)]
pub struct InMemoryPropertyGraph {
    graph: GraphStore,
    transactions: usize,
}

impl InMemoryPropertyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn graph(&self) -> &GraphStore {
        &self.graph
    }

    /// Number of merge calls received.
    pub fn transactions(&self) -> usize {
        self.transactions
    }
}

impl PropertyGraphClient for InMemoryPropertyGraph {
    fn merge_nodes(&mut self, nodes: &[Node]) -> Result<(), KgxError> {
        for node in nodes {
            self.graph.add_node(node.clone());
        }
        self.transactions += 1;
        Ok(())
    }

    fn merge_edges(&mut self, edges: &[Edge]) -> Result<(), KgxError> {
        for edge in edges {
            self.graph.add_edge(edge.clone());
        }
        self.transactions += 1;
        Ok(())
    }

    fn fetch_nodes(&self, offset: usize, limit: usize) -> Result<Vec<Node>, KgxError> {
        Ok(self.graph.nodes().skip(offset).take(limit).cloned().collect())
    }

    fn fetch_edges(&self, offset: usize, limit: usize) -> Result<Vec<Edge>, KgxError> {
        Ok(self.graph.edges().skip(offset).take(limit).cloned().collect())
    }
}

/// Buffers records and merges them into the database in batches.
///
/// Pending nodes are always merged before pending edges so endpoints exist
/// by the time an edge arrives.
pub struct PropertyGraphSink<C> {
    client: C,
    batch_size: usize,
    nodes: Vec<Node>,
    edges: Vec<Edge>,
}

impl<C: PropertyGraphClient> PropertyGraphSink<C> {
    pub fn new(client: C) -> Self {
        Self::with_batch_size(client, DEFAULT_BATCH_SIZE)
    }

    pub fn with_batch_size(client: C, batch_size: usize) -> Self {
        let batch_size = batch_size.max(1);
        Self {
            client,
            batch_size,
            nodes: Vec::with_capacity(batch_size),
            edges: Vec::new(),
        }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn into_client(self) -> C {
        self.client
    }

    fn flush_nodes(&mut self) -> Result<(), KgxError> {
        if !self.nodes.is_empty() {
            tracing::debug!(count = self.nodes.len(), "merging node batch");
            self.client.merge_nodes(&self.nodes)?;
            self.nodes.clear();
        }
        Ok(())
    }

    fn flush_edges(&mut self) -> Result<(), KgxError> {
        if !self.edges.is_empty() {
            tracing::debug!(count = self.edges.len(), "merging edge batch");
            self.client.merge_edges(&self.edges)?;
            self.edges.clear();
        }
        Ok(())
    }
}

impl<C: PropertyGraphClient> Sink for PropertyGraphSink<C> {
    fn write_node(&mut self, node: &Node) -> Result<(), KgxError> {
        self.nodes.push(node.clone());
        if self.nodes.len() >= self.batch_size {
            self.flush_nodes()?;
        }
        Ok(())
    }

    fn write_edge(&mut self, edge: &Edge) -> Result<(), KgxError> {
        self.edges.push(edge.clone());
        if self.edges.len() >= self.batch_size {
            self.flush_nodes()?;
            self.flush_edges()?;
        }
        Ok(())
    }

    fn finalize(&mut self) -> Result<(), KgxError> {
        self.flush_nodes()?;
        self.flush_edges()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Nodes,
    Edges,
    Done,
}

/// Pages through a database: all nodes, then all edges.
pub struct PropertyGraphSource<'a, C> {
    client: &'a C,
    page_size: usize,
    offset: usize,
    phase: Phase,
    page: VecDeque<Record>,
}

impl<'a, C: PropertyGraphClient> PropertyGraphSource<'a, C> {
    pub fn new(client: &'a C) -> Self {
        Self::with_page_size(client, DEFAULT_BATCH_SIZE)
    }

    pub fn with_page_size(client: &'a C, page_size: usize) -> Self {
        Self {
            client,
            page_size: page_size.max(1),
            offset: 0,
            phase: Phase::Nodes,
            page: VecDeque::new(),
        }
    }

    fn fetch_page(&mut self) -> Result<(), KgxError> {
        let fetched: Vec<Record> = match self.phase {
            Phase::Nodes => self
                .client
                .fetch_nodes(self.offset, self.page_size)?
                .into_iter()
                .map(Record::Node)
                .collect(),
            Phase::Edges => self
                .client
                .fetch_edges(self.offset, self.page_size)?
                .into_iter()
                .map(Record::Edge)
                .collect(),
            Phase::Done => Vec::new(),
        };
        if fetched.len() < self.page_size {
            self.phase = match self.phase {
                Phase::Nodes => Phase::Edges,
                _ => Phase::Done,
            };
            self.offset = 0;
        } else {
            self.offset += fetched.len();
        }
        self.page.extend(fetched);
        Ok(())
    }
}

impl<C: PropertyGraphClient> Source for PropertyGraphSource<'_, C> {
    fn next_record(&mut self) -> Result<Option<Record>, KgxError> {
        while self.page.is_empty() && self.phase != Phase::Done {
            self.fetch_page()?;
        }
        Ok(self.page.pop_front())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kgx_core::read_all;

    fn graph() -> (Vec<Node>, Vec<Edge>) {
        let nodes = (0..5)
            .map(|i| Node::new(format!("HGNC:{i}")).with_category(["biolink:Gene"]))
            .collect();
        let edges = (0..4)
            .map(|i| {
                Edge::new(
                    format!("HGNC:{i}"),
                    "biolink:interacts_with",
                    format!("HGNC:{}", i + 1),
                )
            })
            .collect();
        (nodes, edges)
    }

    fn load(batch_size: usize) -> InMemoryPropertyGraph {
        let (nodes, edges) = graph();
        let mut sink = PropertyGraphSink::with_batch_size(InMemoryPropertyGraph::new(), batch_size);
        for edge in &edges {
            sink.write_edge(edge).unwrap();
        }
        for node in &nodes {
            sink.write_node(node).unwrap();
        }
        sink.finalize().unwrap();
        sink.into_client()
    }

    #[test]
    fn test_sink_batches() {
        let client = load(2);
        assert_eq!(client.graph().number_of_nodes(), 5);
        assert_eq!(client.graph().number_of_edges(), 4);
        // edges: 2 full batches; nodes: 2 full batches + a final one of 1
        assert_eq!(client.transactions(), 5);
    }

    #[test]
    fn test_merge_is_idempotent() {
        let (nodes, edges) = graph();
        let mut client = InMemoryPropertyGraph::new();
        client.merge_nodes(&nodes).unwrap();
        client.merge_edges(&edges).unwrap();
        client.merge_nodes(&nodes).unwrap();
        client.merge_edges(&edges).unwrap();
        assert_eq!(client.graph().number_of_nodes(), 5);
        assert_eq!(client.graph().number_of_edges(), 4);
    }

    #[test]
    fn test_source_pages_nodes_then_edges() {
        let client = load(DEFAULT_BATCH_SIZE);
        for page_size in [1, 2, 5, 100] {
            let mut source = PropertyGraphSource::with_page_size(&client, page_size);
            let (records, skipped) = read_all(&mut source).unwrap();
            assert_eq!(skipped, 0);
            assert_eq!(records.len(), 9, "page size {page_size}");
            assert!(records[..5].iter().all(|r| r.as_node().is_some()));
            assert!(records[5..].iter().all(|r| r.as_edge().is_some()));
        }
    }
}
