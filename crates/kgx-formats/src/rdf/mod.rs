//! RDF N-Triples.
//!
//! Edges travel as reified associations: one subject per edge carrying
//! `biolink:subject`, `biolink:predicate` and `biolink:object`, plus one
//! triple per qualifier. The reader groups triples by subject and rebuilds
//! nodes and edges from the groups; the writer does the reverse.

mod reader;
mod writer;

pub use reader::NtSource;
pub use writer::NtSink;

use crate::compression::{OutputFile, open_reader};
use kgx_core::{
    BIOLINK, Compression, Format, FormatDecl, KgxError, OutputSpec, Sink, Source,
    TransformContext, is_absolute_iri,
};
use std::collections::{HashMap, HashSet};
use std::path::Path;

const FORMAT: &str = "nt";

/// Namespace for edge ids that are neither CURIEs nor IRIs.
pub(crate) const LOCAL_ID: &str = "urn:kgx:id:";

pub(crate) mod vocab {
    pub const RDF_TYPE: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#type";
    pub const RDF_STATEMENT: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#Statement";
    pub const RDF_SUBJECT: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#subject";
    pub const RDF_PREDICATE: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#predicate";
    pub const RDF_OBJECT: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#object";

    pub const BIOLINK_ASSOCIATION: &str = "https://w3id.org/biolink/vocab/Association";
    pub const BIOLINK_SUBJECT: &str = "https://w3id.org/biolink/vocab/subject";
    pub const BIOLINK_PREDICATE: &str = "https://w3id.org/biolink/vocab/predicate";
    pub const BIOLINK_OBJECT: &str = "https://w3id.org/biolink/vocab/object";
    pub const BIOLINK_RELATION: &str = "https://w3id.org/biolink/vocab/relation";

    pub const OBAN_ASSOCIATION: &str = "http://purl.org/oban/association";
    pub const OBAN_SUBJECT: &str = "http://purl.org/oban/association_has_subject";
    pub const OBAN_PREDICATE: &str = "http://purl.org/oban/association_has_predicate";
    pub const OBAN_OBJECT: &str = "http://purl.org/oban/association_has_object";

    pub const XSD_BOOLEAN: &str = "http://www.w3.org/2001/XMLSchema#boolean";
    pub const XSD_INTEGER: &str = "http://www.w3.org/2001/XMLSchema#integer";
    pub const XSD_DOUBLE: &str = "http://www.w3.org/2001/XMLSchema#double";
}

/// Object position of a triple.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Object {
    Iri(String),
    Literal {
        value: String,
        datatype: Option<String>,
    },
}

/// Role of a reserved association predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Reserved {
    Subject,
    Object,
    Predicate,
    Relation,
}

impl Reserved {
    pub(crate) fn of(iri: &str) -> Option<Self> {
        use vocab::*;
        match iri {
            BIOLINK_SUBJECT | RDF_SUBJECT | OBAN_SUBJECT => Some(Reserved::Subject),
            BIOLINK_OBJECT | RDF_OBJECT | OBAN_OBJECT => Some(Reserved::Object),
            BIOLINK_PREDICATE => Some(Reserved::Predicate),
            BIOLINK_RELATION | RDF_PREDICATE | OBAN_PREDICATE => Some(Reserved::Relation),
            _ => None,
        }
    }
}

/// Whether an `rdf:type` class marks its subject as an association.
pub(crate) fn is_association_type(class: &str) -> bool {
    class == vocab::RDF_STATEMENT
        || class == vocab::OBAN_ASSOCIATION
        || class
            .strip_prefix(BIOLINK)
            .is_some_and(|local| local.ends_with("Association"))
}

/// Node slots whose values are identifiers rather than free text.
const IRI_VALUED_SLOTS: &[&str] = &["same_as", "xref", "iri"];

/// IRI and CURIE handling shared by the reader and the writer.
pub(crate) struct Vocabulary {
    ctx: TransformContext,
    /// Property name to predicate IRI, the inverse of `predicate_mappings`.
    reverse_mappings: HashMap<String, String>,
    warned_stems: HashSet<String>,
}

impl Vocabulary {
    pub(crate) fn new(ctx: &TransformContext) -> Self {
        let reverse_mappings = ctx
            .config
            .predicate_mappings
            .iter()
            .map(|(iri, name)| (name.clone(), iri.clone()))
            .collect();
        Self {
            ctx: ctx.clone(),
            reverse_mappings,
            warned_stems: HashSet::new(),
        }
    }

    pub(crate) fn ctx(&self) -> &TransformContext {
        &self.ctx
    }

    /// Compress an IRI to a CURIE. Unmapped IRIs pass through unchanged,
    /// with one warning per namespace.
    pub(crate) fn contract(&mut self, iri: &str) -> String {
        if iri.starts_with("_:") {
            return iri.to_string();
        }
        if let Some(curie) = self.ctx.prefixes.contract(iri) {
            return curie;
        }
        if !iri.starts_with("urn:") {
            let stem = match iri.rfind(['#', '/']) {
                Some(i) => &iri[..=i],
                None => iri,
            };
            if self.warned_stems.insert(stem.to_string()) {
                tracing::warn!(stem, "unresolved prefix, keeping full IRI");
            }
        }
        iri.to_string()
    }

    /// Expand a CURIE to an IRI. Absolute IRIs, blank nodes and CURIEs with
    /// unknown prefixes are returned as they are.
    pub(crate) fn expand(&self, id: &str) -> String {
        if id.starts_with("_:") || is_absolute_iri(id) {
            return id.to_string();
        }
        self.ctx
            .prefixes
            .expand(id)
            .unwrap_or_else(|| id.to_string())
    }

    /// Property name for a predicate IRI: a configured mapping, else the
    /// biolink slot name, else the CURIE.
    pub(crate) fn property_name(&mut self, iri: &str) -> String {
        if let Some(name) = self.ctx.config.predicate_mappings.get(iri) {
            return name.clone();
        }
        if let Some(local) = iri.strip_prefix(BIOLINK) {
            return local.to_string();
        }
        self.contract(iri)
    }

    /// Predicate IRI for a property name, inverse of [`property_name`](Self::property_name).
    pub(crate) fn predicate_iri(&self, name: &str) -> String {
        if let Some(iri) = self.reverse_mappings.get(name) {
            return iri.clone();
        }
        if name.contains(':') {
            return self.expand(name);
        }
        format!("{BIOLINK}{name}")
    }

    /// Whether IRI objects of this predicate stay node properties instead of
    /// becoming edges.
    pub(crate) fn is_property_predicate(&self, iri: &str, name: &str) -> bool {
        let predicates = &self.ctx.config.node_property_predicates;
        predicates.contains(iri)
            || predicates.contains(name)
            || self
                .ctx
                .prefixes
                .contract(iri)
                .is_some_and(|curie| predicates.contains(&curie))
            || IRI_VALUED_SLOTS.contains(&name)
            || self.ctx.property_types().contains(name)
    }
}

/// RDF N-Triples with reified associations.
pub struct NTriplesFormat;

impl Format for NTriplesFormat {
    fn decl(&self) -> &FormatDecl {
        static DECL: std::sync::OnceLock<FormatDecl> = std::sync::OnceLock::new();
        DECL.get_or_init(|| {
            FormatDecl::new(FORMAT)
                .description("RDF N-Triples, edges reified as associations")
                .extension("nt")
                .alias("ntriples")
                .alias("n-triples")
        })
    }

    fn open_source(
        &self,
        path: &Path,
        compression: Compression,
        ctx: &TransformContext,
    ) -> Result<Box<dyn Source>, KgxError> {
        let reader = open_reader(path, compression)?;
        Ok(Box::new(NtSource::new(reader, ctx)))
    }

    fn open_sink(
        &self,
        output: &OutputSpec,
        ctx: &TransformContext,
    ) -> Result<Box<dyn Sink>, KgxError> {
        let out = OutputFile::create(&output.filename, output.effective_compression())?;
        Ok(Box::new(NtSink::new(out, ctx)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kgx_core::TransformConfig;

    #[test]
    fn test_reserved_predicates() {
        assert_eq!(Reserved::of(vocab::OBAN_SUBJECT), Some(Reserved::Subject));
        assert_eq!(Reserved::of(vocab::RDF_PREDICATE), Some(Reserved::Relation));
        assert_eq!(Reserved::of(vocab::BIOLINK_PREDICATE), Some(Reserved::Predicate));
        assert_eq!(Reserved::of(vocab::RDF_TYPE), None);
    }

    #[test]
    fn test_association_types() {
        assert!(is_association_type(vocab::BIOLINK_ASSOCIATION));
        assert!(is_association_type(
            "https://w3id.org/biolink/vocab/GeneToDiseaseAssociation"
        ));
        assert!(is_association_type(vocab::OBAN_ASSOCIATION));
        assert!(!is_association_type("https://w3id.org/biolink/vocab/Gene"));
    }

    #[test]
    fn test_property_names_and_predicates() {
        let mut config = TransformConfig::new();
        config
            .predicate_mappings
            .insert("http://example.org/vocab/freq".into(), "frequency".into());
        let mut vocab = Vocabulary::new(&TransformContext::new(config));

        assert_eq!(vocab.property_name("http://example.org/vocab/freq"), "frequency");
        assert_eq!(vocab.predicate_iri("frequency"), "http://example.org/vocab/freq");
        assert_eq!(vocab.property_name(&format!("{BIOLINK}name")), "name");
        assert_eq!(vocab.predicate_iri("name"), format!("{BIOLINK}name"));
        assert_eq!(
            vocab.property_name("http://purl.org/dc/terms/source"),
            "dcterms:source"
        );
        assert_eq!(vocab.predicate_iri("dcterms:source"), "http://purl.org/dc/terms/source");
    }

    #[test]
    fn test_unmapped_iri_passes_through() {
        let mut vocab = Vocabulary::new(&TransformContext::default());
        assert_eq!(
            vocab.contract("http://unknown.example/thing/1"),
            "http://unknown.example/thing/1"
        );
        assert_eq!(vocab.contract("_:b0"), "_:b0");
        assert_eq!(vocab.expand("NOPE:1"), "NOPE:1");
        assert_eq!(vocab.expand("HGNC:11603"), "http://identifiers.org/hgnc/11603");
    }

    #[test]
    fn test_property_predicate_rules() {
        let mut config = TransformConfig::new();
        config.node_property_predicates.insert("dcterms:source".into());
        let vocab = Vocabulary::new(&TransformContext::new(config));
        assert!(vocab.is_property_predicate("http://purl.org/dc/terms/source", "dcterms:source"));
        assert!(vocab.is_property_predicate(&format!("{BIOLINK}xref"), "xref"));
        assert!(!vocab.is_property_predicate(
            &format!("{BIOLINK}interacts_with"),
            "interacts_with"
        ));
    }
}
