//! De-reification: write nodes and edges as N-Triples.

use super::{FORMAT, LOCAL_ID, Object, Vocabulary, vocab};
use crate::compression::OutputFile;
use kgx_core::{Edge, KgxError, Node, PropertyType, Sink, TransformContext, Value};
use rio_api::formatter::TriplesFormatter;
use rio_api::model::{BlankNode, Literal, NamedNode, Subject, Term, Triple};
use rio_turtle::NTriplesFormatter;
use std::path::PathBuf;
use uuid::Uuid;

/// Writes every record as soon as it arrives; nothing is buffered beyond
/// the output stream.
pub struct NtSink {
    formatter: Option<NTriplesFormatter<OutputFile>>,
    path: PathBuf,
    vocab: Vocabulary,
    triples: usize,
}

impl NtSink {
    pub fn new(out: OutputFile, ctx: &TransformContext) -> Self {
        Self {
            path: out.path().to_path_buf(),
            formatter: Some(NTriplesFormatter::new(out)),
            vocab: Vocabulary::new(ctx),
            triples: 0,
        }
    }

    fn emit(&mut self, subject: &str, predicate: &str, object: &Object) -> Result<(), KgxError> {
        let formatter = self
            .formatter
            .as_mut()
            .ok_or_else(|| KgxError::write(FORMAT, "sink already finalized"))?;
        let subject = match subject.strip_prefix("_:") {
            Some(id) => Subject::BlankNode(BlankNode { id }),
            None => Subject::NamedNode(NamedNode { iri: subject }),
        };
        let object = match object {
            Object::Iri(iri) => match iri.strip_prefix("_:") {
                Some(id) => Term::BlankNode(BlankNode { id }),
                None => Term::NamedNode(NamedNode { iri }),
            },
            Object::Literal {
                value,
                datatype: Some(datatype),
            } => Term::Literal(Literal::Typed {
                value,
                datatype: NamedNode { iri: datatype },
            }),
            Object::Literal {
                value,
                datatype: None,
            } => Term::Literal(Literal::Simple { value }),
        };
        formatter
            .format(&Triple {
                subject,
                predicate: NamedNode { iri: predicate },
                object,
            })
            .map_err(|e| KgxError::io(&self.path, e))?;
        self.triples += 1;
        Ok(())
    }

    fn iri(&self, id: &str) -> Object {
        Object::Iri(self.vocab.expand(id))
    }

    /// RDF objects for one property value, one per array element.
    ///
    /// A declared type wins; otherwise the type follows the value's shape.
    /// Identifier-looking strings become IRIs only when `iri_ok`.
    fn objects(&self, name: &str, value: &Value, iri_ok: bool) -> Vec<Object> {
        let declared = self.vocab.ctx().property_types().get(name);
        value
            .scalars()
            .filter_map(|scalar| {
                let text = scalar.to_text()?;
                let literal = |datatype: Option<&str>| Object::Literal {
                    value: text.clone(),
                    datatype: datatype.map(str::to_string),
                };
                Some(match declared {
                    Some(PropertyType::UriOrCurie) => self.iri(&text),
                    Some(PropertyType::String) => literal(None),
                    Some(ty) => Object::Literal {
                        value: text.clone(),
                        datatype: ty.datatype_iri(),
                    },
                    None => match scalar {
                        Value::Bool(_) => literal(Some(vocab::XSD_BOOLEAN)),
                        Value::Int(_) => literal(Some(vocab::XSD_INTEGER)),
                        Value::Float(_) => literal(Some(vocab::XSD_DOUBLE)),
                        Value::String(s)
                            if iri_ok && self.vocab.ctx().prefixes.is_identifier(s) =>
                        {
                            self.iri(s)
                        }
                        _ => literal(None),
                    },
                })
            })
            .collect()
    }

    /// The association subject for an edge: its own id when it has one,
    /// else a blank node named by a UUID of the edge, so rewriting the same
    /// edge yields the same label and reading it back yields no id.
    fn association_iri(&self, edge: &Edge) -> String {
        match &edge.id {
            Some(id) if id.contains(':') => self.vocab.expand(id),
            Some(id) => format!("{LOCAL_ID}{id}"),
            None => {
                let name = format!("{}|{}|{}", edge.subject, edge.key(), edge.object);
                let uuid = Uuid::new_v5(&Uuid::NAMESPACE_URL, name.as_bytes());
                format!("_:e{}", uuid.simple())
            }
        }
    }
}

impl Sink for NtSink {
    fn write_node(&mut self, node: &Node) -> Result<(), KgxError> {
        let subject = self.vocab.expand(&node.id);
        for category in &node.category {
            let class = self.iri(category);
            self.emit(&subject, vocab::RDF_TYPE, &class)?;
        }
        for (name, value) in &node.properties {
            if name == "type" {
                for class in value.scalars().filter_map(Value::to_text) {
                    let class = self.iri(&class);
                    self.emit(&subject, vocab::RDF_TYPE, &class)?;
                }
                continue;
            }
            let predicate = self.vocab.predicate_iri(name);
            let iri_ok = self.vocab.is_property_predicate(&predicate, name);
            for object in self.objects(name, value, iri_ok) {
                self.emit(&subject, &predicate, &object)?;
            }
        }
        Ok(())
    }

    fn write_edge(&mut self, edge: &Edge) -> Result<(), KgxError> {
        let subject = self.association_iri(edge);
        let edge_type = edge.edge_type.as_deref().unwrap_or("biolink:Association");
        let reserved = [
            (vocab::RDF_TYPE, Some(edge_type)),
            (vocab::BIOLINK_SUBJECT, Some(edge.subject.as_str())),
            (vocab::BIOLINK_PREDICATE, Some(edge.predicate.as_str())),
            (vocab::BIOLINK_OBJECT, Some(edge.object.as_str())),
            (vocab::BIOLINK_RELATION, edge.relation.as_deref()),
        ];
        for (predicate, value) in reserved {
            if let Some(value) = value {
                let object = self.iri(value);
                self.emit(&subject, predicate, &object)?;
            }
        }
        for (name, value) in &edge.properties {
            let predicate = self.vocab.predicate_iri(name);
            for object in self.objects(name, value, true) {
                self.emit(&subject, &predicate, &object)?;
            }
        }
        Ok(())
    }

    fn finalize(&mut self) -> Result<(), KgxError> {
        let formatter = self
            .formatter
            .take()
            .ok_or_else(|| KgxError::write(FORMAT, "sink already finalized"))?;
        let out = formatter
            .finish()
            .map_err(|e| KgxError::io(&self.path, e))?;
        tracing::debug!(triples = self.triples, path = %self.path.display(), "wrote triples");
        out.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kgx_core::{Compression, PropertyTypeMap, TransformConfig};

    fn write(ctx: &TransformContext, nodes: &[Node], edges: &[Edge]) -> String {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("graph.nt");
        let mut sink = NtSink::new(OutputFile::create(&path, Compression::None).unwrap(), ctx);
        for node in nodes {
            sink.write_node(node).unwrap();
        }
        for edge in edges {
            sink.write_edge(edge).unwrap();
        }
        sink.finalize().unwrap();
        std::fs::read_to_string(&path).unwrap()
    }

    #[test]
    fn test_node_triples() {
        let node = Node::new("HGNC:11603")
            .with_category(["biolink:Gene"])
            .with_property("name", "TBX4")
            .with_property("xref", vec!["NCBIGene:9496"])
            .with_property("in_taxon", "NCBITaxon:9606")
            .with_property("rank", 3i64);
        let text = write(&TransformContext::default(), &[node], &[]);
        let subject = "<http://identifiers.org/hgnc/11603>";
        assert!(text.contains(&format!(
            "{subject} <http://www.w3.org/1999/02/22-rdf-syntax-ns#type> <https://w3id.org/biolink/vocab/Gene> ."
        )));
        assert!(text.contains(&format!(
            "{subject} <https://w3id.org/biolink/vocab/name> \"TBX4\" ."
        )));
        assert!(text.contains(&format!(
            "{subject} <https://w3id.org/biolink/vocab/xref> <http://identifiers.org/ncbigene/9496> ."
        )));
        assert!(text.contains("\"NCBITaxon:9606\" ."));
        assert!(text.contains("\"3\"^^<http://www.w3.org/2001/XMLSchema#integer>"));
    }

    #[test]
    fn test_edge_reified() {
        let edge = Edge::new("HGNC:11603", "biolink:related_to", "MONDO:0005002")
            .with_relation("RO:0002410")
            .with_property("publications", vec!["HGNC:1"])
            .with_property("frequency", 0.5);
        let text = write(&TransformContext::default(), &[], &[edge.clone()]);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 7);
        assert!(lines.iter().all(|l| l.starts_with("_:e")));
        assert!(text.contains(
            "<https://w3id.org/biolink/vocab/subject> <http://identifiers.org/hgnc/11603> ."
        ));
        assert!(text.contains("<https://w3id.org/biolink/vocab/Association> ."));
        assert!(text.contains(
            "<https://w3id.org/biolink/vocab/relation> <http://purl.obolibrary.org/obo/RO_0002410> ."
        ));
        assert!(text.contains("\"0.5\"^^<http://www.w3.org/2001/XMLSchema#double>"));

        assert_eq!(text, write(&TransformContext::default(), &[], &[edge]));
    }

    #[test]
    fn test_declared_type_and_mapping() {
        let mut config = TransformConfig::new()
            .with_property_types(PropertyTypeMap::new().with("start", PropertyType::Float));
        config
            .predicate_mappings
            .insert("http://example.org/vocab/start".into(), "start".into());
        let node = Node::new("HGNC:1").with_property("start", "332");
        let text = write(&TransformContext::new(config), &[node], &[]);
        assert!(text.contains(
            "<http://example.org/vocab/start> \"332\"^^<http://www.w3.org/2001/XMLSchema#float> ."
        ));
    }

    #[test]
    fn test_edge_id_is_association_subject() {
        let edge = Edge::new("HGNC:1", "biolink:related_to", "HGNC:2").with_id("HGNC:99");
        let text = write(&TransformContext::default(), &[], &[edge]);
        assert!(text.lines().all(|l| l.starts_with("<http://identifiers.org/hgnc/99> ")));
    }

    #[test]
    fn test_parallel_edges_keep_their_ids() {
        let edges = [
            Edge::new("HGNC:1", "biolink:related_to", "HGNC:2")
                .with_id("urn:uuid:5f0a1c52-3b7e-4c8e-9d7a-1f2e3d4c5b6a"),
            Edge::new("HGNC:1", "biolink:related_to", "HGNC:2")
                .with_id("urn:uuid:9b8c7d6e-5f4a-4b3c-8d2e-1f0a9b8c7d6e"),
            Edge::new("HGNC:1", "biolink:related_to", "HGNC:2").with_id("e1"),
        ];
        let text = write(&TransformContext::default(), &[], &edges);
        let subjects: std::collections::HashSet<&str> =
            text.lines().filter_map(|l| l.split(' ').next()).collect();
        assert_eq!(subjects.len(), 3);
        assert!(subjects.contains("<urn:uuid:5f0a1c52-3b7e-4c8e-9d7a-1f2e3d4c5b6a>"));
        assert!(subjects.contains("<urn:kgx:id:e1>"));
    }

    #[test]
    fn test_node_type_becomes_rdf_type() {
        let node = Node::new("HGNC:11603")
            .with_category(["biolink:Gene"])
            .with_property("type", "SO:0000704");
        let text = write(&TransformContext::default(), &[node], &[]);
        assert!(text.contains(
            "<http://www.w3.org/1999/02/22-rdf-syntax-ns#type> <http://purl.obolibrary.org/obo/SO_0000704> ."
        ));
        assert!(!text.contains("vocab/type>"));
    }
}
