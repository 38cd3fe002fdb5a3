//! Format declarations and the trait format implementations provide.

use crate::config::TransformContext;
use crate::error::KgxError;
use crate::io::{Sink, Source};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Declaration of a serialization format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormatDecl {
    /// Format tag used on the command line and in configs (`tsv`, `nt`, ...).
    pub id: String,
    /// Human-readable description.
    #[serde(default)]
    pub description: String,
    /// File extensions recognised by [`Registry::detect`](crate::Registry::detect).
    #[serde(default)]
    pub extensions: Vec<String>,
    /// Alternative tags.
    #[serde(default)]
    pub aliases: Vec<String>,
}

impl FormatDecl {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            description: String::new(),
            extensions: Vec::new(),
            aliases: Vec::new(),
        }
    }

    pub fn description(mut self, desc: impl Into<String>) -> Self {
        self.description = desc.into();
        self
    }

    pub fn extension(mut self, ext: impl Into<String>) -> Self {
        self.extensions.push(ext.into());
        self
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into());
        self
    }
}

/// A serialization format: opens sources for reading and sinks for writing.
pub trait Format: Send + Sync {
    fn decl(&self) -> &FormatDecl;

    /// Open one input file as a record source.
    fn open_source(
        &self,
        path: &Path,
        compression: Compression,
        ctx: &TransformContext,
    ) -> Result<Box<dyn Source>, KgxError>;

    /// Open the output described by `output` as a record sink.
    fn open_sink(
        &self,
        output: &OutputSpec,
        ctx: &TransformContext,
    ) -> Result<Box<dyn Sink>, KgxError>;
}

/// On-disk compression of an input or output file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    #[default]
    None,
    Gzip,
}

impl Compression {
    /// Detect compression from a `.gz` suffix.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("gz") => Compression::Gzip,
            _ => Compression::None,
        }
    }
}

/// Where records come from: one format, one or more files.
#[derive(Debug, Clone, Default)]
pub struct InputSpec {
    /// Format tag; detected from the first file's extension when absent.
    pub format: Option<String>,
    /// Files, read strictly in this order.
    pub filenames: Vec<PathBuf>,
    /// Compression; detected per file when absent.
    pub compression: Option<Compression>,
}

impl InputSpec {
    pub fn new<I, P>(filenames: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            format: None,
            filenames: filenames.into_iter().map(Into::into).collect(),
            compression: None,
        }
    }

    pub fn format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }

    pub fn compression(mut self, compression: Compression) -> Self {
        self.compression = Some(compression);
        self
    }

    /// Compression for one of the input files.
    pub fn compression_for(&self, path: &Path) -> Compression {
        self.compression.unwrap_or_else(|| Compression::from_path(path))
    }
}

/// Where records go.
///
/// For formats that split nodes and edges into separate files, `filename`
/// is the base name (`out` gives `out_nodes.tsv` and `out_edges.tsv`).
#[derive(Debug, Clone)]
pub struct OutputSpec {
    pub format: Option<String>,
    pub filename: PathBuf,
    pub compression: Option<Compression>,
}

impl OutputSpec {
    pub fn new(filename: impl Into<PathBuf>) -> Self {
        Self {
            format: None,
            filename: filename.into(),
            compression: None,
        }
    }

    pub fn format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }

    pub fn compression(mut self, compression: Compression) -> Self {
        self.compression = Some(compression);
        self
    }

    pub fn effective_compression(&self) -> Compression {
        self.compression
            .unwrap_or_else(|| Compression::from_path(&self.filename))
    }

    /// Path of a split output file: `{base}_{part}.{ext}`, with `.gz`
    /// appended when compressed.
    ///
    /// Any extension already present on `filename` is dropped first.
    pub fn part_path(&self, part: &str, ext: &str) -> PathBuf {
        let mut base = self.filename.clone();
        if Compression::from_path(&base) == Compression::Gzip {
            base.set_extension("");
        }
        if base.extension().is_some_and(|e| e == ext) {
            base.set_extension("");
        }
        let stem = base
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let mut name = format!("{stem}_{part}.{ext}");
        if self.effective_compression() == Compression::Gzip {
            name.push_str(".gz");
        }
        base.with_file_name(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compression_detection() {
        assert_eq!(
            Compression::from_path(Path::new("graph.json.gz")),
            Compression::Gzip
        );
        assert_eq!(Compression::from_path(Path::new("graph.json")), Compression::None);
    }

    #[test]
    fn test_part_paths() {
        let out = OutputSpec::new("out/graph");
        assert_eq!(out.part_path("nodes", "tsv"), PathBuf::from("out/graph_nodes.tsv"));

        let out = OutputSpec::new("out/graph.tsv");
        assert_eq!(out.part_path("edges", "tsv"), PathBuf::from("out/graph_edges.tsv"));

        let out = OutputSpec::new("graph.jsonl.gz");
        assert_eq!(
            out.part_path("nodes", "jsonl"),
            PathBuf::from("graph_nodes.jsonl.gz")
        );
    }

    #[test]
    fn test_format_decl_builder() {
        let decl = FormatDecl::new("tsv")
            .description("Tab-separated values")
            .extension("tsv")
            .alias("tab");
        assert_eq!(decl.extensions, vec!["tsv"]);
        assert_eq!(decl.aliases, vec!["tab"]);
    }
}
