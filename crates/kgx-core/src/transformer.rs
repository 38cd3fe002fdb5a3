//! Transformer: drives records from a source through the filters into the
//! graph store and/or a sink.
//!
//! The transformer owns the policy (filtering, dangling-edge pruning, error
//! propagation); formats only parse and serialize.

use crate::config::{TransformConfig, TransformContext};
use crate::error::KgxError;
use crate::filter::FilterSet;
use crate::format::{Format, InputSpec, OutputSpec};
use crate::io::{ChainSource, Sink, Source};
use crate::record::{Edge, EdgeView, Node, Record};
use crate::registry::Registry;
use crate::store::GraphStore;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Callback invoked with every record that passes the filters.
pub type Inspector = Box<dyn FnMut(&Record)>;

/// Counters for one transformation run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransformStats {
    pub nodes_read: usize,
    pub edges_read: usize,
    /// Nodes rejected by the node filter.
    pub nodes_filtered: usize,
    /// Edges rejected by the edge filter.
    pub edges_filtered: usize,
    /// Edges dropped because an endpoint was rejected by the node filter.
    pub edges_pruned: usize,
    pub nodes_written: usize,
    pub edges_written: usize,
    /// Records dropped on recoverable errors.
    pub records_skipped: usize,
    /// Edges stored before one of their endpoints was known.
    pub dangling_edges: usize,
    /// Store size at the end of the run.
    pub graph_nodes: usize,
    pub graph_edges: usize,
    pub duration: Duration,
}

/// Orchestrates reading, filtering, storing and writing.
pub struct Transformer {
    registry: Arc<Registry>,
    ctx: TransformContext,
    node_filters: FilterSet,
    edge_filters: FilterSet,
    store: GraphStore,
    inspector: Option<Inspector>,
    /// Categories of every node read, passing or not. Only kept while an
    /// edge filter constrains endpoint categories.
    seen_categories: HashMap<String, Vec<String>>,
    track_categories: bool,
    /// Nodes rejected by the node filter. Only kept while pruning.
    rejected: HashSet<String>,
}

impl Transformer {
    pub fn new(registry: Arc<Registry>, config: TransformConfig) -> Self {
        Self::with_context(registry, TransformContext::new(config))
    }

    pub fn with_context(registry: Arc<Registry>, ctx: TransformContext) -> Self {
        let node_filters = node_filters_for(&ctx.config);
        let edge_filters = ctx.config.edge_filters.clone();
        let track_categories = ["subject_category", "object_category"]
            .iter()
            .any(|attribute| edge_filters.contains_key(attribute));
        Self {
            registry,
            ctx,
            node_filters,
            edge_filters,
            store: GraphStore::new(),
            inspector: None,
            seen_categories: HashMap::new(),
            track_categories,
            rejected: HashSet::new(),
        }
    }

    /// Set a callback that sees every record passing the filters.
    pub fn with_inspector(mut self, inspector: impl FnMut(&Record) + 'static) -> Self {
        self.inspector = Some(Box::new(inspector));
        self
    }

    pub fn context(&self) -> &TransformContext {
        &self.ctx
    }

    pub fn store(&self) -> &GraphStore {
        &self.store
    }

    pub fn into_store(self) -> GraphStore {
        self.store
    }

    /// The node filter in effect, including categories propagated from
    /// `subject_category` / `object_category` edge filters.
    pub fn node_filters(&self) -> &FilterSet {
        &self.node_filters
    }

    /// Read `input` into the graph store.
    pub fn transform(&mut self, input: &InputSpec) -> Result<TransformStats, KgxError> {
        let mut source = self.open_source(input)?;
        self.transform_source(&mut source, None)
    }

    /// Stream `input` straight to `output`.
    ///
    /// Records are also kept in the store when `store_while_streaming` is set.
    pub fn transform_stream(
        &mut self,
        input: &InputSpec,
        output: &OutputSpec,
    ) -> Result<TransformStats, KgxError> {
        let mut source = self.open_source(input)?;
        let mut sink = self.open_sink(output)?;
        self.transform_source(&mut source, Some(sink.as_mut()))
    }

    /// Drive any source, into the store or through `sink`.
    ///
    /// The sink, if any, is finalized after the source is exhausted.
    pub fn transform_source(
        &mut self,
        source: &mut dyn Source,
        mut sink: Option<&mut dyn Sink>,
    ) -> Result<TransformStats, KgxError> {
        let start = Instant::now();
        let keep = sink.is_none() || self.ctx.config.store_while_streaming;
        let mut stats = TransformStats::default();

        loop {
            match source.next_record() {
                Ok(Some(record)) => {
                    self.process(record, sink.as_deref_mut(), keep, &mut stats)?
                }
                Ok(None) => break,
                Err(e) if e.is_recoverable() => {
                    tracing::warn!(error = %e, "skipping record");
                    stats.records_skipped += 1;
                }
                Err(e) => return Err(e),
            }
        }

        if let Some(sink) = sink {
            sink.finalize()?;
        }

        stats.graph_nodes = self.store.number_of_nodes();
        stats.graph_edges = self.store.number_of_edges();
        stats.duration = start.elapsed();
        log_summary(&stats);
        Ok(stats)
    }

    /// Write the graph store to `output`.
    pub fn save(&self, output: &OutputSpec) -> Result<TransformStats, KgxError> {
        let mut sink = self.open_sink(output)?;
        self.save_to_sink(sink.as_mut())
    }

    /// Write the graph store through any sink: every node, then every edge.
    pub fn save_to_sink(&self, sink: &mut dyn Sink) -> Result<TransformStats, KgxError> {
        let start = Instant::now();
        let mut stats = TransformStats::default();
        for node in self.store.nodes() {
            sink.write_node(node)?;
            stats.nodes_written += 1;
        }
        for edge in self.store.edges() {
            sink.write_edge(edge)?;
            stats.edges_written += 1;
        }
        sink.finalize()?;
        stats.graph_nodes = self.store.number_of_nodes();
        stats.graph_edges = self.store.number_of_edges();
        stats.duration = start.elapsed();
        tracing::info!(
            nodes = stats.nodes_written,
            edges = stats.edges_written,
            "graph saved"
        );
        Ok(stats)
    }

    fn process(
        &mut self,
        record: Record,
        sink: Option<&mut (dyn Sink + '_)>,
        keep: bool,
        stats: &mut TransformStats,
    ) -> Result<(), KgxError> {
        match &record {
            Record::Node(node) => {
                stats.nodes_read += 1;
                if !self.accept_node(node) {
                    stats.nodes_filtered += 1;
                    return Ok(());
                }
            }
            Record::Edge(edge) => {
                stats.edges_read += 1;
                if !self.accept_edge(edge) {
                    stats.edges_filtered += 1;
                    return Ok(());
                }
                if self.is_dangling(edge) {
                    tracing::debug!(subject = %edge.subject, object = %edge.object, "pruning edge");
                    stats.edges_pruned += 1;
                    return Ok(());
                }
            }
        }

        if let Some(inspector) = self.inspector.as_mut() {
            inspector(&record);
        }

        match record {
            Record::Node(node) => {
                if let Some(sink) = sink {
                    sink.write_node(&node)?;
                    stats.nodes_written += 1;
                }
                if keep {
                    self.store.add_node(node);
                }
            }
            Record::Edge(edge) => {
                if let Some(sink) = sink {
                    sink.write_edge(&edge)?;
                    stats.edges_written += 1;
                }
                if keep {
                    if let Some(warning) = self.store.add_edge(edge) {
                        tracing::warn!("{}", warning);
                        stats.dangling_edges += 1;
                    }
                }
            }
        }
        Ok(())
    }

    fn accept_node(&mut self, node: &Node) -> bool {
        if self.track_categories {
            let seen = self.seen_categories.entry(node.id.clone()).or_default();
            for category in &node.category {
                if !seen.contains(category) {
                    seen.push(category.clone());
                }
            }
        }

        let accepted = self.node_filters.matches(node);
        if self.ctx.config.prune_dangling_edges {
            if accepted {
                self.rejected.remove(&node.id);
            } else {
                self.rejected.insert(node.id.clone());
            }
        }
        accepted
    }

    fn accept_edge(&self, edge: &Edge) -> bool {
        if self.edge_filters.is_empty() {
            return true;
        }
        let view = EdgeView {
            edge,
            subject_category: self.categories_of(&edge.subject),
            object_category: self.categories_of(&edge.object),
        };
        self.edge_filters.matches(&view)
    }

    fn categories_of(&self, id: &str) -> &[String] {
        self.seen_categories
            .get(id)
            .map(Vec::as_slice)
            .or_else(|| self.store.categories_of(id))
            .unwrap_or(&[])
    }

    fn is_dangling(&self, edge: &Edge) -> bool {
        self.ctx.config.prune_dangling_edges
            && (self.rejected.contains(&edge.subject) || self.rejected.contains(&edge.object))
    }

    fn format_for(
        &self,
        tag: Option<&str>,
        path: Option<&Path>,
    ) -> Result<Arc<dyn Format>, KgxError> {
        match (tag, path) {
            (Some(tag), _) => self.registry.resolve(tag),
            (None, Some(path)) => {
                let id = self
                    .registry
                    .detect(path)
                    .ok_or_else(|| KgxError::UnsupportedFormat(path.display().to_string()))?;
                self.registry.resolve(id)
            }
            (None, None) => Err(KgxError::Config("no input files".into())),
        }
    }

    /// Resolve the input format and chain its files. No file is opened yet.
    fn open_source(&self, input: &InputSpec) -> Result<ChainSource, KgxError> {
        let format = self.format_for(
            input.format.as_deref(),
            input.filenames.first().map(|p| p.as_path()),
        )?;
        tracing::info!(format = %format.decl().id, files = input.filenames.len(), "reading");
        let ctx = self.ctx.clone();
        let input = input.clone();
        let paths = input.filenames.clone();
        Ok(ChainSource::new(paths, move |path| {
            format.open_source(path, input.compression_for(path), &ctx)
        }))
    }

    fn open_sink(&self, output: &OutputSpec) -> Result<Box<dyn Sink>, KgxError> {
        let format = self.format_for(output.format.as_deref(), Some(&output.filename))?;
        tracing::info!(format = %format.decl().id, path = %output.filename.display(), "writing");
        format.open_sink(output, &self.ctx)
    }
}

/// The node filter, widened by subject/object categories from the edge filter.
fn node_filters_for(config: &TransformConfig) -> FilterSet {
    let mut filters = config.node_filters.clone();
    for attribute in ["subject_category", "object_category"] {
        if let Some(categories) = config.edge_filters.get(attribute) {
            filters.extend("category", categories.iter().cloned());
        }
    }
    filters
}

fn log_summary(stats: &TransformStats) {
    tracing::info!(
        nodes_read = stats.nodes_read,
        edges_read = stats.edges_read,
        nodes_filtered = stats.nodes_filtered,
        edges_filtered = stats.edges_filtered,
        edges_pruned = stats.edges_pruned,
        skipped = stats.records_skipped,
        graph_nodes = stats.graph_nodes,
        graph_edges = stats.graph_edges,
        elapsed_ms = stats.duration.as_millis() as u64,
        "transform complete"
    );
}
