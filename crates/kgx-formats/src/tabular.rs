//! Delimited text: a node file and an edge file, one record per row.

use crate::compression::{OutputFile, open_reader};
use indexmap::IndexSet;
use kgx_core::{
    Compression, EDGE_CORE_FIELDS, Edge, Format, FormatDecl, KgxError, NODE_CORE_FIELDS, Node,
    OutputSpec, Properties, Record, Sink, Source, TransformContext, Value, is_multivalued,
};
use std::io::Read;
use std::path::{Path, PathBuf};

/// Field separator family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Tsv,
    Csv,
}

impl Dialect {
    fn id(self) -> &'static str {
        match self {
            Dialect::Tsv => "tsv",
            Dialect::Csv => "csv",
        }
    }

    fn default_delimiter(self) -> u8 {
        match self {
            Dialect::Tsv => b'\t',
            Dialect::Csv => b',',
        }
    }

    fn delimiter(self, ctx: &TransformContext) -> Result<u8, KgxError> {
        match ctx.config.tabular.delimiter {
            None => Ok(self.default_delimiter()),
            Some(c) if c.is_ascii() => Ok(c as u8),
            Some(c) => Err(KgxError::Config(format!(
                "field delimiter must be ASCII, got {c:?}"
            ))),
        }
    }
}

/// TSV or CSV.
pub struct TabularFormat {
    dialect: Dialect,
}

impl TabularFormat {
    pub fn tsv() -> Self {
        Self {
            dialect: Dialect::Tsv,
        }
    }

    pub fn csv() -> Self {
        Self {
            dialect: Dialect::Csv,
        }
    }
}

impl Format for TabularFormat {
    fn decl(&self) -> &FormatDecl {
        match self.dialect {
            Dialect::Tsv => {
                static DECL: std::sync::OnceLock<FormatDecl> = std::sync::OnceLock::new();
                DECL.get_or_init(|| {
                    FormatDecl::new("tsv")
                        .description("Tab-separated node and edge files")
                        .extension("tsv")
                        .extension("txt")
                        .alias("tab")
                })
            }
            Dialect::Csv => {
                static DECL: std::sync::OnceLock<FormatDecl> = std::sync::OnceLock::new();
                DECL.get_or_init(|| {
                    FormatDecl::new("csv")
                        .description("Comma-separated node and edge files")
                        .extension("csv")
                })
            }
        }
    }

    fn open_source(
        &self,
        path: &Path,
        compression: Compression,
        ctx: &TransformContext,
    ) -> Result<Box<dyn Source>, KgxError> {
        let reader = open_reader(path, compression)?;
        let source = TabularSource::new(reader, self.dialect, ctx, path)?;
        Ok(Box::new(source))
    }

    fn open_sink(
        &self,
        output: &OutputSpec,
        ctx: &TransformContext,
    ) -> Result<Box<dyn Sink>, KgxError> {
        Ok(Box::new(TabularSink::new(output, self.dialect, ctx)?))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RowKind {
    Node,
    Edge,
}

/// Reads one node file or one edge file; which one is decided by the header.
pub struct TabularSource<R> {
    reader: csv::Reader<R>,
    headers: Vec<String>,
    kind: RowKind,
    row: csv::StringRecord,
    list_delimiter: char,
    ctx: TransformContext,
    name: String,
    dialect: Dialect,
}

impl<R: Read> TabularSource<R> {
    pub fn new(
        reader: R,
        dialect: Dialect,
        ctx: &TransformContext,
        path: &Path,
    ) -> Result<Self, KgxError> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(dialect.delimiter(ctx)?)
            .has_headers(true)
            .from_reader(reader);
        let headers: Vec<String> = reader
            .headers()
            .map_err(|e| KgxError::parse(dialect.id(), e))?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();

        let has = |name: &str| headers.iter().any(|h| h == name);
        let kind = if has("subject") && has("object") {
            RowKind::Edge
        } else if has("id") {
            RowKind::Node
        } else {
            return Err(KgxError::parse(
                dialect.id(),
                format!(
                    "{}: header has neither id nor subject/object columns",
                    path.display()
                ),
            ));
        };

        Ok(Self {
            reader,
            headers,
            kind,
            row: csv::StringRecord::new(),
            list_delimiter: ctx.config.tabular.list_delimiter,
            ctx: ctx.clone(),
            name: path.display().to_string(),
            dialect,
        })
    }

    fn cell_value(&self, column: &str, cell: &str) -> Value {
        if is_multivalued(column) || cell.contains(self.list_delimiter) {
            Value::Array(
                cell.split(self.list_delimiter)
                    .map(str::trim)
                    .filter(|part| !part.is_empty())
                    .map(Value::from)
                    .collect(),
            )
        } else {
            Value::from(cell)
        }
    }
}

impl<R: Read> Source for TabularSource<R> {
    fn next_record(&mut self) -> Result<Option<Record>, KgxError> {
        let more = match self.reader.read_record(&mut self.row) {
            Ok(more) => more,
            Err(e) => {
                return Err(match e.kind() {
                    csv::ErrorKind::UnequalLengths { .. } => {
                        KgxError::malformed(format!("{}: {}", self.name, e))
                    }
                    _ => KgxError::parse(self.dialect.id(), format!("{}: {}", self.name, e)),
                });
            }
        };
        if !more {
            return Ok(None);
        }

        let mut props = Properties::new();
        for (column, cell) in self.headers.iter().zip(self.row.iter()) {
            if cell.is_empty() {
                continue;
            }
            props.insert(column.clone(), self.cell_value(column, cell));
        }
        self.ctx.property_types().coerce_properties(&mut props);

        match self.kind {
            RowKind::Node => Node::from_properties(props).map(|n| Some(Record::Node(n))),
            RowKind::Edge => Edge::from_properties(props).map(|e| Some(Record::Edge(e))),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Style {
    dialect: Dialect,
    delimiter: u8,
    list_delimiter: char,
}

impl Style {
    fn open(
        &self,
        path: &Path,
        compression: Compression,
        header: &[String],
    ) -> Result<csv::Writer<OutputFile>, KgxError> {
        let file = OutputFile::create(path, compression)?;
        // Cells holding the delimiter, a quote or a line break are quoted
        let mut writer = csv::WriterBuilder::new()
            .delimiter(self.delimiter)
            .quote_style(csv::QuoteStyle::Necessary)
            .from_writer(file);
        writer
            .write_record(header)
            .map_err(|e| KgxError::write(self.dialect.id(), e))?;
        Ok(writer)
    }

    fn render(&self, value: &Value) -> String {
        match value {
            Value::Array(items) => {
                let delimiter = self.list_delimiter.to_string();
                items
                    .iter()
                    .filter_map(Value::to_text)
                    .collect::<Vec<_>>()
                    .join(&delimiter)
            }
            other => other.to_text().unwrap_or_default(),
        }
    }

    fn write_row(
        &self,
        writer: &mut csv::Writer<OutputFile>,
        props: &Properties,
        header: &[String],
    ) -> Result<(), KgxError> {
        let row: Vec<String> = header
            .iter()
            .map(|column| props.get(column).map(|v| self.render(v)).unwrap_or_default())
            .collect();
        writer
            .write_record(&row)
            .map_err(|e| KgxError::write(self.dialect.id(), e))
    }
}

/// One of the two output files.
struct Part {
    path: PathBuf,
    compression: Compression,
    /// Configured columns; empty means derive from the data.
    columns: Vec<String>,
    required: &'static [&'static str],
    core: &'static [&'static str],
    writer: Option<csv::Writer<OutputFile>>,
    buffered: Vec<Properties>,
    keys: IndexSet<String>,
}

impl Part {
    fn new(
        path: PathBuf,
        compression: Compression,
        columns: Vec<String>,
        required: &'static [&'static str],
        core: &'static [&'static str],
    ) -> Self {
        Self {
            path,
            compression,
            columns,
            required,
            core,
            writer: None,
            buffered: Vec::new(),
            keys: IndexSet::new(),
        }
    }

    fn write(&mut self, style: &Style, props: Properties) -> Result<(), KgxError> {
        if self.columns.is_empty() {
            self.keys.extend(props.keys().cloned());
            self.buffered.push(props);
            return Ok(());
        }
        if self.writer.is_none() {
            self.writer = Some(style.open(&self.path, self.compression, &self.columns)?);
        }
        match self.writer.as_mut() {
            Some(writer) => style.write_row(writer, &props, &self.columns),
            None => Ok(()),
        }
    }

    /// Core columns first (in canonical order), then the rest as first seen.
    fn derived_header(&self) -> Vec<String> {
        let mut header: Vec<String> = self
            .core
            .iter()
            .filter(|c| self.required.contains(c) || self.keys.contains(**c))
            .map(|c| c.to_string())
            .collect();
        for key in &self.keys {
            if !self.core.contains(&key.as_str()) {
                header.push(key.clone());
            }
        }
        header
    }

    fn finish(&mut self, style: &Style) -> Result<(), KgxError> {
        let header = if self.columns.is_empty() {
            self.derived_header()
        } else {
            self.columns.clone()
        };
        let mut writer = match self.writer.take() {
            Some(writer) => writer,
            None => style.open(&self.path, self.compression, &header)?,
        };
        for props in std::mem::take(&mut self.buffered) {
            style.write_row(&mut writer, &props, &header)?;
        }
        writer.flush().map_err(|e| KgxError::io(&self.path, e))?;
        let file = writer
            .into_inner()
            .map_err(|e| KgxError::write(style.dialect.id(), e.error()))?;
        file.finish()
    }
}

/// Writes `{base}_nodes.{ext}` and `{base}_edges.{ext}`.
///
/// With configured columns rows are written as they arrive; otherwise they
/// are held until [`finalize`](Sink::finalize) so the header can cover every
/// key.
pub struct TabularSink {
    style: Style,
    nodes: Part,
    edges: Part,
}

impl TabularSink {
    pub fn new(
        output: &OutputSpec,
        dialect: Dialect,
        ctx: &TransformContext,
    ) -> Result<Self, KgxError> {
        let ext = dialect.id();
        let compression = output.effective_compression();
        let options = &ctx.config.tabular;
        Ok(Self {
            style: Style {
                dialect,
                delimiter: dialect.delimiter(ctx)?,
                list_delimiter: options.list_delimiter,
            },
            nodes: Part::new(
                output.part_path("nodes", ext),
                compression,
                options.node_columns.clone(),
                &["id", "category"],
                NODE_CORE_FIELDS,
            ),
            edges: Part::new(
                output.part_path("edges", ext),
                compression,
                options.edge_columns.clone(),
                &["subject", "predicate", "object"],
                EDGE_CORE_FIELDS,
            ),
        })
    }
}

impl Sink for TabularSink {
    fn write_node(&mut self, node: &Node) -> Result<(), KgxError> {
        self.nodes.write(&self.style, node.to_properties())
    }

    fn write_edge(&mut self, edge: &Edge) -> Result<(), KgxError> {
        self.edges.write(&self.style, edge.to_properties())
    }

    fn finalize(&mut self) -> Result<(), KgxError> {
        self.nodes.finish(&self.style)?;
        self.edges.finish(&self.style)
    }
}
