//! Transformation configuration and the context handed to formats.
//!
//! A `TransformConfig` is plain data, loadable from JSON, YAML or TOML.
//! A `TransformContext` is the resolved form sources and sinks work with:
//! default prefixes merged with user prefixes, plus the category lookup.

use crate::category::{CategoryLookup, StaticCategoryLookup};
use crate::error::KgxError;
use crate::filter::FilterSet;
use crate::prefix::PrefixMap;
use crate::types::PropertyTypeMap;
use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Options for a transformation run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransformConfig {
    /// Filters every node must pass.
    pub node_filters: FilterSet,

    /// Filters every edge must pass.
    pub edge_filters: FilterSet,

    /// Extra CURIE prefixes; these override the built-in ones.
    pub prefix_map: PrefixMap,

    /// RDF predicates (CURIE or IRI) whose IRI objects are node properties
    /// rather than edges.
    pub node_property_predicates: IndexSet<String>,

    /// RDF predicate IRI to property name.
    pub predicate_mappings: IndexMap<String, String>,

    /// Declared property types.
    pub property_types: PropertyTypeMap,

    /// Drop edges whose subject or object was rejected by the node filter.
    pub prune_dangling_edges: bool,

    /// In streaming mode, also keep records in the graph store.
    pub store_while_streaming: bool,

    pub tabular: TabularOptions,

    pub rdf: RdfOptions,
}

/// Tabular (TSV/CSV) options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TabularOptions {
    /// Field delimiter override; by default tab for TSV and comma for CSV.
    pub delimiter: Option<char>,

    /// Delimiter between the values of a multi-valued cell.
    pub list_delimiter: char,

    /// Node columns to write. Empty means the union of all keys seen.
    pub node_columns: Vec<String>,

    /// Edge columns to write. Empty means the union of all keys seen.
    pub edge_columns: Vec<String>,
}

impl Default for TabularOptions {
    fn default() -> Self {
        Self {
            delimiter: None,
            list_delimiter: '|',
            node_columns: Vec::new(),
            edge_columns: Vec::new(),
        }
    }
}

/// RDF reader options.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RdfOptions {
    /// Flush complete statement groups once this many subjects are buffered.
    pub flush_threshold: Option<usize>,
}

impl TransformConfig {
    /// Create a config with all defaults.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_node_filters(mut self, filters: FilterSet) -> Self {
        self.node_filters = filters;
        self
    }

    pub fn with_edge_filters(mut self, filters: FilterSet) -> Self {
        self.edge_filters = filters;
        self
    }

    pub fn with_property_types(mut self, types: PropertyTypeMap) -> Self {
        self.property_types = types;
        self
    }

    pub fn prune_dangling_edges(mut self, prune: bool) -> Self {
        self.prune_dangling_edges = prune;
        self
    }

    /// Parse a config from bytes, detecting the syntax from `path`.
    ///
    /// Falls back to YAML, which also accepts JSON.
    pub fn from_bytes(data: &[u8], path: Option<&str>) -> Result<Self, KgxError> {
        let format = path
            .and_then(detect_syntax)
            .unwrap_or_else(|| "yaml".to_string());

        Self::from_bytes_format(data, &format)
    }

    /// Parse a config from bytes with explicit syntax.
    pub fn from_bytes_format(data: &[u8], format: &str) -> Result<Self, KgxError> {
        match format {
            "json" => serde_json::from_slice(data).map_err(|e| KgxError::Config(e.to_string())),
            "yaml" | "yml" => {
                serde_yaml::from_slice(data).map_err(|e| KgxError::Config(e.to_string()))
            }
            "toml" => {
                let s = std::str::from_utf8(data)
                    .map_err(|e| KgxError::Config(format!("invalid UTF-8: {}", e)))?;
                toml::from_str(s).map_err(|e| KgxError::Config(e.to_string()))
            }
            _ => Err(KgxError::Config(format!(
                "unsupported config format: {}",
                format
            ))),
        }
    }

    /// Serialize to bytes in the given syntax.
    pub fn to_bytes(&self, format: &str) -> Result<Vec<u8>, KgxError> {
        match format {
            "json" => {
                serde_json::to_vec_pretty(self).map_err(|e| KgxError::Config(e.to_string()))
            }
            "yaml" | "yml" => serde_yaml::to_string(self)
                .map(String::into_bytes)
                .map_err(|e| KgxError::Config(e.to_string())),
            "toml" => toml::to_string_pretty(self)
                .map(String::into_bytes)
                .map_err(|e| KgxError::Config(e.to_string())),
            _ => Err(KgxError::Config(format!(
                "unsupported config format: {}",
                format
            ))),
        }
    }
}

fn detect_syntax(path: &str) -> Option<String> {
    let ext = std::path::Path::new(path).extension()?.to_str()?;
    match ext.to_lowercase().as_str() {
        "json" => Some("json".into()),
        "yaml" | "yml" => Some("yaml".into()),
        "toml" => Some("toml".into()),
        _ => None,
    }
}

/// Resolved configuration shared by every source and sink of a run.
#[derive(Clone)]
pub struct TransformContext {
    pub config: Arc<TransformConfig>,
    /// Built-in prefixes overlaid with `config.prefix_map`.
    pub prefixes: PrefixMap,
    pub categories: Arc<dyn CategoryLookup>,
}

impl TransformContext {
    pub fn new(config: TransformConfig) -> Self {
        let mut prefixes = PrefixMap::with_defaults();
        prefixes.extend(&config.prefix_map);
        Self {
            config: Arc::new(config),
            prefixes,
            categories: Arc::new(StaticCategoryLookup::default()),
        }
    }

    /// Replace the category lookup.
    pub fn with_category_lookup(mut self, lookup: impl CategoryLookup + 'static) -> Self {
        self.categories = Arc::new(lookup);
        self
    }

    pub fn property_types(&self) -> &PropertyTypeMap {
        &self.config.property_types
    }
}

impl Default for TransformContext {
    fn default() -> Self {
        Self::new(TransformConfig::default())
    }
}

impl std::fmt::Debug for TransformContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransformContext")
            .field("config", &self.config)
            .field("prefixes", &self.prefixes.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PropertyType;

    #[test]
    fn test_yaml_config() {
        let yaml = r#"
node_filters:
  category:
    - biolink:Gene
    - biolink:Disease
edge_filters:
  predicate: biolink:related_to
property_types:
  pos: float
prune_dangling_edges: true
tabular:
  list_delimiter: ";"
"#;
        let config = TransformConfig::from_bytes(yaml.as_bytes(), Some("config.yaml")).unwrap();
        assert_eq!(config.node_filters.get("category").unwrap().len(), 2);
        assert!(
            config
                .edge_filters
                .get("predicate")
                .unwrap()
                .contains("biolink:related_to")
        );
        assert_eq!(config.property_types.get("pos"), Some(&PropertyType::Float));
        assert!(config.prune_dangling_edges);
        assert_eq!(config.tabular.list_delimiter, ';');
        assert_eq!(config.rdf.flush_threshold, None);
    }

    #[test]
    fn test_toml_config() {
        let toml = r#"
node_property_predicates = ["biolink:same_as"]

[prefix_map]
ZFIN = "http://zfin.org/"

[rdf]
flush_threshold = 1000
"#;
        let config = TransformConfig::from_bytes(toml.as_bytes(), Some("kgx.toml")).unwrap();
        assert!(config.node_property_predicates.contains("biolink:same_as"));
        assert_eq!(config.rdf.flush_threshold, Some(1000));
        let ctx = TransformContext::new(config);
        assert_eq!(ctx.prefixes.stem("ZFIN"), Some("http://zfin.org/"));
        assert!(ctx.prefixes.stem("biolink").is_some());
    }

    #[test]
    fn test_json_roundtrip() {
        let config = TransformConfig::new()
            .with_node_filters(FilterSet::new().allow("category", ["biolink:Gene"]))
            .prune_dangling_edges(true);
        let bytes = config.to_bytes("json").unwrap();
        let parsed = TransformConfig::from_bytes_format(&bytes, "json").unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_unknown_syntax() {
        let err = TransformConfig::from_bytes_format(b"", "ini").unwrap_err();
        assert!(matches!(err, KgxError::Config(_)));
    }
}
