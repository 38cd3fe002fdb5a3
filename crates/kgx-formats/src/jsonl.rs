//! JSON Lines: one record per line, nodes and edges in separate files.

use crate::compression::{OutputFile, open_reader};
use kgx_core::{
    Compression, Edge, Format, FormatDecl, KgxError, Node, OutputSpec, Properties, Record, Sink,
    Source, TransformContext,
};
use std::io::{BufRead, Write};
use std::path::Path;

const FORMAT: &str = "jsonl";

pub struct JsonlFormat;

impl Format for JsonlFormat {
    fn decl(&self) -> &FormatDecl {
        static DECL: std::sync::OnceLock<FormatDecl> = std::sync::OnceLock::new();
        DECL.get_or_init(|| {
            FormatDecl::new(FORMAT)
                .description("JSON Lines, one node or edge object per line")
                .extension("jsonl")
                .alias("ndjson")
        })
    }

    fn open_source(
        &self,
        path: &Path,
        compression: Compression,
        ctx: &TransformContext,
    ) -> Result<Box<dyn Source>, KgxError> {
        let reader = open_reader(path, compression)?;
        Ok(Box::new(JsonlSource::new(reader, ctx)))
    }

    fn open_sink(
        &self,
        output: &OutputSpec,
        _ctx: &TransformContext,
    ) -> Result<Box<dyn Sink>, KgxError> {
        let compression = output.effective_compression();
        let nodes = OutputFile::create(output.part_path("nodes", FORMAT), compression)?;
        let edges = OutputFile::create(output.part_path("edges", FORMAT), compression)?;
        Ok(Box::new(JsonlSink {
            nodes: Some(nodes),
            edges: Some(edges),
        }))
    }
}

/// Reads records line by line. A line with both `subject` and `object` is
/// an edge, anything else a node.
pub struct JsonlSource<R> {
    reader: R,
    ctx: TransformContext,
    line: String,
    line_number: usize,
}

impl<R: BufRead> JsonlSource<R> {
    pub fn new(reader: R, ctx: &TransformContext) -> Self {
        Self {
            reader,
            ctx: ctx.clone(),
            line: String::new(),
            line_number: 0,
        }
    }
}

impl<R: BufRead> Source for JsonlSource<R> {
    fn next_record(&mut self) -> Result<Option<Record>, KgxError> {
        loop {
            self.line.clear();
            let read = self
                .reader
                .read_line(&mut self.line)
                .map_err(|e| KgxError::parse(FORMAT, e))?;
            if read == 0 {
                return Ok(None);
            }
            self.line_number += 1;

            let text = self.line.trim();
            if text.is_empty() {
                continue;
            }

            let mut props: Properties = serde_json::from_str(text).map_err(|e| {
                KgxError::malformed(format!("line {}: {}", self.line_number, e))
            })?;
            self.ctx.property_types().coerce_properties(&mut props);
            return Record::from_properties(props).map(Some);
        }
    }
}

pub struct JsonlSink {
    nodes: Option<OutputFile>,
    edges: Option<OutputFile>,
}

fn write_line<T: serde::Serialize>(
    out: &mut Option<OutputFile>,
    value: &T,
) -> Result<(), KgxError> {
    let out = out
        .as_mut()
        .ok_or_else(|| KgxError::write(FORMAT, "sink already finalized"))?;
    serde_json::to_writer(&mut *out, value).map_err(|e| KgxError::write(FORMAT, e))?;
    out.write_all(b"\n").map_err(|e| out.error(e))
}

impl Sink for JsonlSink {
    fn write_node(&mut self, node: &Node) -> Result<(), KgxError> {
        write_line(&mut self.nodes, node)
    }

    fn write_edge(&mut self, edge: &Edge) -> Result<(), KgxError> {
        write_line(&mut self.edges, edge)
    }

    fn finalize(&mut self) -> Result<(), KgxError> {
        for out in [self.nodes.take(), self.edges.take()].into_iter().flatten() {
            out.finish()?;
        }
        Ok(())
    }
}
