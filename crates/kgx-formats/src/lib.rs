//! Format implementations for kgx.
//!
//! Each format is a [`kgx_core::Format`] that opens streaming sources and
//! sinks. Enable formats via feature flags.
//!
//! # Features
//!
//! ## Tabular formats
//! - `tsv` (default) - `{base}_nodes.tsv` / `{base}_edges.tsv`
//! - `csv` (default) - the same layout, comma-separated
//!
//! ## Document formats
//! - `json` (default) - one `{"nodes": [...], "edges": [...]}` document
//! - `jsonl` (default) - JSON Lines, nodes and edges in separate files
//!
//! ## RDF formats
//! - `ntriples` (default) - N-Triples with edges reified as associations
//!
//! ## Compression
//! - `gzip` (default) - transparent `.gz` input and output
//!
//! ## Feature group
//! - `all` - All formats
//!
//! # Property graphs
//!
//! The property-graph sink and source are always available but have no
//! format tag: they talk to a database through a [`PropertyGraphClient`]
//! rather than to files, so there is no path to detect or open. Hand them to
//! the transformer directly instead of going through the registry:
//!
//! ```
//! use kgx_core::{Edge, IterSource, Node, Record, TransformConfig, Transformer};
//! use kgx_formats::{InMemoryPropertyGraph, PropertyGraphSink, PropertyGraphSource};
//! use std::sync::Arc;
//!
//! let registry = Arc::new(kgx_formats::registry());
//! let mut t = Transformer::new(registry.clone(), TransformConfig::new());
//! let records = vec![
//!     Record::from(Node::new("HGNC:1")),
//!     Record::from(Node::new("HGNC:2")),
//!     Record::from(Edge::new("HGNC:1", "biolink:interacts_with", "HGNC:2")),
//! ];
//! t.transform_source(&mut IterSource::new(records), None)?;
//!
//! let mut sink = PropertyGraphSink::new(InMemoryPropertyGraph::new());
//! t.save_to_sink(&mut sink)?;
//! let client = sink.into_client();
//!
//! let mut back = Transformer::new(registry, TransformConfig::new());
//! back.transform_source(&mut PropertyGraphSource::new(&client), None)?;
//! assert_eq!(back.store().number_of_edges(), 1);
//! # Ok::<(), kgx_core::KgxError>(())
//! ```

mod compression;
pub mod property_graph;

#[cfg(any(feature = "tsv", feature = "csv"))]
pub mod tabular;

#[cfg(feature = "json")]
pub mod json;

#[cfg(feature = "jsonl")]
pub mod jsonl;

#[cfg(feature = "ntriples")]
pub mod rdf;

pub use compression::{OutputFile, open_reader};
pub use property_graph::{
    InMemoryPropertyGraph, PropertyGraphClient, PropertyGraphSink, PropertyGraphSource,
};

use kgx_core::Registry;

/// Register every enabled format with the registry.
pub fn register_all(registry: &mut Registry) {
    #[cfg(feature = "tsv")]
    registry.register(tabular::TabularFormat::tsv());

    #[cfg(feature = "csv")]
    registry.register(tabular::TabularFormat::csv());

    #[cfg(feature = "json")]
    registry.register(json::JsonFormat);

    #[cfg(feature = "jsonl")]
    registry.register(jsonl::JsonlFormat);

    #[cfg(feature = "ntriples")]
    registry.register(rdf::NTriplesFormat);
}

/// A registry with every enabled format.
pub fn registry() -> Registry {
    let mut registry = Registry::new();
    register_all(&mut registry);
    registry
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_all() {
        let registry = registry();
        #[cfg(feature = "tsv")]
        assert!(registry.get("tsv").is_some());
        #[cfg(feature = "ntriples")]
        {
            assert!(registry.get("ntriples").is_some());
            assert_eq!(
                registry.detect(std::path::Path::new("graph.nt.gz")),
                Some("nt")
            );
        }
        #[cfg(feature = "json")]
        assert!(registry.get("JSON").is_some());
    }
}
