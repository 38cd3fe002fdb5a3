//! JSON document format: `{"nodes": [...], "edges": [...]}`.
//!
//! Both directions stream. The source walks the document structure itself
//! and hands each array element to `serde_json`; the sink writes nodes
//! straight out and spills edges to a temporary file until the end.

use crate::compression::{OutputFile, open_reader};
use kgx_core::{
    Compression, Edge, Format, FormatDecl, KgxError, Node, OutputSpec, Properties, Record, Sink,
    Source, TransformContext,
};
use serde::Deserialize;
use serde::de::IgnoredAny;
use std::fs::File;
use std::io::{self, BufRead, BufWriter, Seek, Write};
use std::path::Path;

const FORMAT: &str = "json";

pub struct JsonFormat;

impl Format for JsonFormat {
    fn decl(&self) -> &FormatDecl {
        static DECL: std::sync::OnceLock<FormatDecl> = std::sync::OnceLock::new();
        DECL.get_or_init(|| {
            FormatDecl::new(FORMAT)
                .description("Single JSON document with nodes and edges arrays")
                .extension("json")
        })
    }

    fn open_source(
        &self,
        path: &Path,
        compression: Compression,
        ctx: &TransformContext,
    ) -> Result<Box<dyn Source>, KgxError> {
        let reader = open_reader(path, compression)?;
        Ok(Box::new(JsonSource::new(reader, ctx)))
    }

    fn open_sink(
        &self,
        output: &OutputSpec,
        _ctx: &TransformContext,
    ) -> Result<Box<dyn Sink>, KgxError> {
        let out = OutputFile::create(&output.filename, output.effective_compression())?;
        Ok(Box::new(JsonSink::new(out)?))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Start,
    /// Inside the top-level object, before a key.
    Object,
    Nodes,
    Edges,
    Done,
}

/// Pulls one node or edge at a time out of a JSON document.
pub struct JsonSource<R> {
    reader: R,
    state: State,
    ctx: TransformContext,
}

impl<R: BufRead> JsonSource<R> {
    pub fn new(reader: R, ctx: &TransformContext) -> Self {
        Self {
            reader,
            state: State::Start,
            ctx: ctx.clone(),
        }
    }

    fn peek(&mut self) -> Result<Option<u8>, KgxError> {
        let buf = self.reader.fill_buf().map_err(|e| KgxError::parse(FORMAT, e))?;
        Ok(buf.first().copied())
    }

    /// Skip whitespace and return the next byte without consuming it.
    fn peek_token(&mut self) -> Result<Option<u8>, KgxError> {
        loop {
            match self.peek()? {
                Some(b) if b.is_ascii_whitespace() => self.reader.consume(1),
                other => return Ok(other),
            }
        }
    }

    fn expect(&mut self, byte: u8) -> Result<(), KgxError> {
        match self.peek_token()? {
            Some(b) if b == byte => {
                self.reader.consume(1);
                Ok(())
            }
            Some(b) => Err(KgxError::parse(
                FORMAT,
                format!("expected '{}', found '{}'", byte as char, b as char),
            )),
            None => Err(KgxError::parse(
                FORMAT,
                format!("expected '{}', found end of input", byte as char),
            )),
        }
    }

    fn deserialize<T: for<'de> Deserialize<'de>>(&mut self) -> Result<T, serde_json::Error> {
        let mut de = serde_json::Deserializer::from_reader(&mut self.reader);
        T::deserialize(&mut de)
    }

    /// Advance through the top-level object to the next array element, or
    /// to the end of the document.
    fn advance(&mut self) -> Result<(), KgxError> {
        loop {
            match self.state {
                State::Start => {
                    self.expect(b'{')?;
                    self.state = State::Object;
                }
                State::Object => match self.peek_token()? {
                    None | Some(b'}') => {
                        self.state = State::Done;
                        return Ok(());
                    }
                    Some(b',') => self.reader.consume(1),
                    Some(b'"') => {
                        let key: String = self
                            .deserialize()
                            .map_err(|e| KgxError::parse(FORMAT, e))?;
                        self.expect(b':')?;
                        match key.as_str() {
                            "nodes" | "edges" => {
                                self.expect(b'[')?;
                                self.state = if key == "nodes" {
                                    State::Nodes
                                } else {
                                    State::Edges
                                };
                            }
                            other => {
                                tracing::debug!(key = other, "ignoring top-level key");
                                self.deserialize::<IgnoredAny>()
                                    .map_err(|e| KgxError::parse(FORMAT, e))?;
                            }
                        }
                    }
                    Some(b) => {
                        return Err(KgxError::parse(
                            FORMAT,
                            format!("unexpected '{}' in top-level object", b as char),
                        ));
                    }
                },
                State::Nodes | State::Edges => match self.peek_token()? {
                    Some(b']') => {
                        self.reader.consume(1);
                        self.state = State::Object;
                    }
                    Some(b',') => self.reader.consume(1),
                    Some(_) => return Ok(()),
                    None => {
                        return Err(KgxError::parse(FORMAT, "unterminated array"));
                    }
                },
                State::Done => return Ok(()),
            }
        }
    }
}

impl<R: BufRead> Source for JsonSource<R> {
    fn next_record(&mut self) -> Result<Option<Record>, KgxError> {
        self.advance()?;
        let state = self.state;
        if state == State::Done {
            return Ok(None);
        }

        let mut props: Properties = match self.deserialize() {
            Ok(props) => props,
            Err(e) if e.is_data() => return Err(KgxError::malformed(e.to_string())),
            Err(e) => return Err(KgxError::parse(FORMAT, e)),
        };
        self.ctx.property_types().coerce_properties(&mut props);

        if state == State::Nodes {
            Node::from_properties(props).map(|n| Some(Record::Node(n)))
        } else {
            Edge::from_properties(props).map(|e| Some(Record::Edge(e)))
        }
    }
}

/// Writes the JSON document without holding the graph in memory.
pub struct JsonSink {
    out: Option<OutputFile>,
    edges: BufWriter<File>,
    nodes_written: usize,
    edges_written: usize,
}

impl JsonSink {
    pub fn new(mut out: OutputFile) -> Result<Self, KgxError> {
        out.write_all(b"{\"nodes\":[").map_err(|e| out.error(e))?;
        let spill = tempfile::tempfile().map_err(|e| KgxError::io(std::env::temp_dir(), e))?;
        Ok(Self {
            out: Some(out),
            edges: BufWriter::new(spill),
            nodes_written: 0,
            edges_written: 0,
        })
    }

    fn out(&mut self) -> Result<&mut OutputFile, KgxError> {
        self.out
            .as_mut()
            .ok_or_else(|| KgxError::write(FORMAT, "sink already finalized"))
    }

    fn spill_error(e: impl ToString) -> KgxError {
        KgxError::write(FORMAT, format!("edge spill file: {}", e.to_string()))
    }
}

impl Sink for JsonSink {
    fn write_node(&mut self, node: &Node) -> Result<(), KgxError> {
        let first = self.nodes_written == 0;
        let out = self.out()?;
        let separator: &[u8] = if first { b"\n" } else { b",\n" };
        out.write_all(separator).map_err(|e| out.error(e))?;
        serde_json::to_writer(&mut *out, node).map_err(|e| KgxError::write(FORMAT, e))?;
        self.nodes_written += 1;
        Ok(())
    }

    fn write_edge(&mut self, edge: &Edge) -> Result<(), KgxError> {
        let separator: &[u8] = if self.edges_written == 0 { b"\n" } else { b",\n" };
        self.edges.write_all(separator).map_err(Self::spill_error)?;
        serde_json::to_writer(&mut self.edges, edge).map_err(Self::spill_error)?;
        self.edges_written += 1;
        Ok(())
    }

    fn finalize(&mut self) -> Result<(), KgxError> {
        let mut out = self
            .out
            .take()
            .ok_or_else(|| KgxError::write(FORMAT, "sink already finalized"))?;
        self.edges.flush().map_err(Self::spill_error)?;
        let spill = self.edges.get_mut();
        spill.rewind().map_err(Self::spill_error)?;

        let result = (|| -> io::Result<()> {
            out.write_all(b"\n],\"edges\":[")?;
            io::copy(spill, &mut out)?;
            out.write_all(b"\n]}\n")
        })();
        result.map_err(|e| out.error(e))?;
        out.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kgx_core::{PropertyType, PropertyTypeMap, TransformConfig, Value, read_all};
    use std::io::Cursor;

    fn read(text: &str, ctx: &TransformContext) -> (Vec<Record>, usize) {
        let mut source = JsonSource::new(Cursor::new(text.as_bytes().to_vec()), ctx);
        read_all(&mut source).unwrap()
    }

    #[test]
    fn test_streams_both_arrays() {
        let ctx = TransformContext::default();
        let (records, skipped) = read(
            r#"{
                "nodes": [
                    {"id": "HGNC:11603", "category": ["biolink:Gene"], "name": "TBX4"},
                    {"id": "MONDO:0005002", "category": "biolink:Disease"}
                ],
                "edges": [
                    {"subject": "HGNC:11603", "predicate": "biolink:related_to", "object": "MONDO:0005002"}
                ]
            }"#,
            &ctx,
        );
        assert_eq!(skipped, 0);
        assert_eq!(records.len(), 3);
        assert_eq!(records[1].as_node().unwrap().category, vec!["biolink:Disease"]);
        assert!(records[2].as_edge().is_some());
    }

    #[test]
    fn test_unknown_keys_and_edges_first() {
        let ctx = TransformContext::default();
        let (records, _) = read(
            r#"{"version": 2, "meta": {"source": "x", "list": [1, 2]},
                "edges": [{"subject": "A", "predicate": "biolink:related_to", "object": "B"}],
                "nodes": [{"id": "A"}], "trailer": null}"#,
            &ctx,
        );
        assert_eq!(records.len(), 2);
        assert!(records[0].as_edge().is_some());
        assert_eq!(records[1].as_node().unwrap().id, "A");
    }

    #[test]
    fn test_malformed_element_is_skipped() {
        let ctx = TransformContext::default();
        let (records, skipped) = read(
            r#"{"nodes": [{"name": "no id"}, {"id": "B"}, "not an object", {"id": "C"}]}"#,
            &ctx,
        );
        assert_eq!(skipped, 2);
        let ids: Vec<_> = records
            .iter()
            .filter_map(Record::as_node)
            .map(|n| n.id.as_str())
            .collect();
        assert_eq!(ids, vec!["B", "C"]);
    }

    #[test]
    fn test_truncated_document_is_fatal() {
        let ctx = TransformContext::default();
        let mut source = JsonSource::new(Cursor::new(br#"{"nodes": [{"id": "A"}"#.to_vec()), &ctx);
        assert!(source.next_record().unwrap().is_some());
        assert!(!source.next_record().unwrap_err().is_recoverable());
    }

    #[test]
    fn test_declared_types_applied() {
        let config = TransformConfig::new()
            .with_property_types(PropertyTypeMap::new().with("pos", PropertyType::Float));
        let ctx = TransformContext::new(config);
        let (records, _) = read(r#"{"nodes": [{"id": "A", "pos": "332"}]}"#, &ctx);
        assert_eq!(records[0].as_node().unwrap().properties["pos"], Value::Float(332.0));
    }

    #[test]
    fn test_sink_edges_before_nodes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("graph.json");
        let out = OutputFile::create(&path, Compression::None).unwrap();
        let mut sink = JsonSink::new(out).unwrap();
        sink.write_edge(&Edge::new("A", "biolink:related_to", "B")).unwrap();
        sink.write_node(&Node::new("A")).unwrap();
        sink.write_edge(&Edge::new("B", "biolink:related_to", "A")).unwrap();
        sink.write_node(&Node::new("B")).unwrap();
        sink.finalize().unwrap();

        let doc: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(doc["nodes"].as_array().unwrap().len(), 2);
        assert_eq!(doc["edges"].as_array().unwrap().len(), 2);
        assert_eq!(doc["nodes"][0]["id"], "A");
        assert_eq!(doc["edges"][1]["subject"], "B");
    }

    #[test]
    fn test_sink_empty_graph() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.json");
        let out = OutputFile::create(&path, Compression::None).unwrap();
        let mut sink = JsonSink::new(out).unwrap();
        sink.finalize().unwrap();
        let doc: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(doc, serde_json::json!({"nodes": [], "edges": []}));
    }
}
