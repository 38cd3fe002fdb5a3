//! Reification: rebuild nodes and edges from N-Triples.

use super::{FORMAT, LOCAL_ID, Object, Reserved, Vocabulary, is_association_type, vocab};
use indexmap::{IndexMap, IndexSet};
use kgx_core::{
    BIOLINK, DEFAULT_PREDICATE, Edge, KgxError, Node, Properties, PropertiesExt, PropertyType,
    Record, Source, TransformContext, Value,
};
use rio_api::model::{Literal, Subject, Term};
use rio_api::parser::TriplesParser;
use rio_turtle::{NTriplesParser, TurtleError};
use std::collections::{HashMap, HashSet, VecDeque};
use std::io::BufRead;

/// All triples seen so far for one subject.
#[derive(Debug, Default)]
struct Statement {
    triples: Vec<(String, Object)>,
    association: bool,
}

impl Statement {
    fn push(&mut self, predicate: String, object: Object) {
        if Reserved::of(&predicate).is_some() {
            self.association = true;
        }
        if predicate == vocab::RDF_TYPE {
            if let Object::Iri(class) = &object {
                self.association |= is_association_type(class);
            }
        }
        self.triples.push((predicate, object));
    }

    /// Whether the group already holds everything an edge needs.
    fn is_complete(&self) -> bool {
        if !self.association {
            return true;
        }
        let has = |role: &[Reserved]| {
            self.triples
                .iter()
                .any(|(p, _)| Reserved::of(p).is_some_and(|r| role.contains(&r)))
        };
        has(&[Reserved::Subject])
            && has(&[Reserved::Object])
            && has(&[Reserved::Predicate, Reserved::Relation])
    }
}

/// Groups triples by subject and converts each group to records.
struct StatementBuffer {
    vocab: Vocabulary,
    statements: IndexMap<String, Statement>,
    /// Edge endpoints, emitted as bare nodes unless they turn out to have
    /// their own statement.
    implied: IndexSet<String>,
    emitted: HashSet<String>,
    /// Associations already flushed, without their qualifiers. Triples
    /// arriving later for the same subject rebuild the same edge.
    flushed: HashMap<String, Edge>,
}

impl StatementBuffer {
    fn new(ctx: &TransformContext) -> Self {
        Self {
            vocab: Vocabulary::new(ctx),
            statements: IndexMap::new(),
            implied: IndexSet::new(),
            emitted: HashSet::new(),
            flushed: HashMap::new(),
        }
    }

    fn push(&mut self, subject: String, predicate: String, object: Object) {
        let flushed = self.flushed.contains_key(&subject);
        let statement = self.statements.entry(subject).or_default();
        statement.association |= flushed;
        statement.push(predicate, object);
    }

    fn len(&self) -> usize {
        self.statements.len()
    }

    /// Convert the complete groups, leaving incomplete associations buffered.
    fn flush_complete(&mut self, out: &mut VecDeque<Result<Record, KgxError>>) {
        let flushed = &self.flushed;
        let (ready, pending): (Vec<_>, Vec<_>) = std::mem::take(&mut self.statements)
            .into_iter()
            .partition(|(subject, statement)| {
                statement.is_complete() || flushed.contains_key(subject)
            });
        self.statements = pending.into_iter().collect();
        tracing::debug!(
            flushed = ready.len(),
            buffered = self.statements.len(),
            "flushing statement buffer"
        );
        let edges = self.convert(ready, out, true);
        out.extend(edges.into_iter().map(|edge| edge.map(Record::Edge)));
    }

    /// Convert everything left at end of stream.
    fn finish(&mut self, out: &mut VecDeque<Result<Record, KgxError>>) {
        let statements: Vec<_> = std::mem::take(&mut self.statements).into_iter().collect();
        let edges = self.convert(statements, out, false);

        for id in std::mem::take(&mut self.implied) {
            if !self.emitted.contains(&id) {
                out.push_back(Ok(Record::Node(self.implied_node(&id))));
            }
        }
        out.extend(edges.into_iter().map(|edge| edge.map(Record::Edge)));
    }

    /// Push the nodes of `statements` onto `out` and return their edges.
    ///
    /// With `remember`, converted associations are kept so that later
    /// qualifiers can be attached to them.
    fn convert(
        &mut self,
        statements: Vec<(String, Statement)>,
        out: &mut VecDeque<Result<Record, KgxError>>,
        remember: bool,
    ) -> Vec<Result<Edge, KgxError>> {
        let mut edges = Vec::new();
        for (subject, statement) in statements {
            if statement.association {
                let edge = self.association(&subject, statement);
                if remember {
                    if let Ok(edge) = &edge {
                        let mut seed = edge.clone();
                        seed.properties = Properties::new();
                        self.flushed.insert(subject, seed);
                    }
                }
                edges.push(edge);
            } else {
                let (node, direct) = self.entity(&subject, statement);
                self.emitted.insert(node.id.clone());
                out.push_back(Ok(Record::Node(node)));
                edges.extend(direct.into_iter().map(Ok));
            }
        }
        edges
    }

    fn entity(&mut self, subject: &str, statement: Statement) -> (Node, Vec<Edge>) {
        let id = self.vocab.contract(subject);
        let mut categories: Vec<String> = Vec::new();
        let mut props = Properties::new();
        let mut direct = Vec::new();

        for (predicate, object) in statement.triples {
            if predicate == vocab::RDF_TYPE {
                if let Object::Iri(class) = &object {
                    for category in self.class_categories(class) {
                        if !categories.contains(&category) {
                            categories.push(category);
                        }
                    }
                    if !class.starts_with(BIOLINK) {
                        let class = self.vocab.contract(class);
                        props.push_value("type", Value::String(class));
                    }
                }
                continue;
            }
            let name = self.vocab.property_name(&predicate);
            match object {
                Object::Literal { value, datatype } => {
                    let value = self.literal(&name, value, datatype.as_deref());
                    props.push_value(name, value);
                }
                Object::Iri(iri) if self.vocab.is_property_predicate(&predicate, &name) => {
                    let value = self.vocab.contract(&iri);
                    let value = self.typed(&name, Value::String(value));
                    props.push_value(name, value);
                }
                Object::Iri(iri) => {
                    let object = self.vocab.contract(&iri);
                    let relation = self.vocab.contract(&predicate);
                    let edge = Edge::new(id.clone(), biolink_predicate(&relation), object.clone())
                        .with_relation(relation);
                    self.implied.insert(object);
                    direct.push(edge);
                }
            }
        }

        if categories.is_empty() {
            categories = self.vocab.ctx().categories.categories(&id);
        }
        let mut node = Node::new(id).with_category(categories);
        node.properties.merge_from(props);
        kgx_core::normalize_multivalued(&mut node.properties);
        (node, direct)
    }

    fn association(&mut self, subject: &str, statement: Statement) -> Result<Edge, KgxError> {
        let id = self.vocab.contract(subject);
        let mut edge_subject = None;
        let mut edge_object = None;
        let mut predicate = None;
        let mut relation = None;
        let mut edge_type = None;
        let mut props = Properties::new();

        for (p, object) in statement.triples {
            if let Some(role) = Reserved::of(&p) {
                let Object::Iri(iri) = object else {
                    tracing::warn!(association = %id, predicate = %p, "literal in reserved slot");
                    continue;
                };
                let value = self.vocab.contract(&iri);
                let slot = match role {
                    Reserved::Subject => &mut edge_subject,
                    Reserved::Object => &mut edge_object,
                    Reserved::Predicate => &mut predicate,
                    Reserved::Relation => &mut relation,
                };
                *slot = Some(value);
                continue;
            }
            if p == vocab::RDF_TYPE {
                if let Object::Iri(class) = &object {
                    if class != vocab::BIOLINK_ASSOCIATION {
                        edge_type = Some(self.vocab.contract(class));
                    }
                }
                continue;
            }
            let name = self.vocab.property_name(&p);
            let value = match object {
                Object::Literal { value, datatype } => {
                    self.literal(&name, value, datatype.as_deref())
                }
                Object::Iri(iri) => {
                    let value = self.vocab.contract(&iri);
                    self.typed(&name, Value::String(value))
                }
            };
            props.push_value(name, value);
        }

        if let Some(seed) = self.flushed.get(subject) {
            edge_subject = edge_subject.or_else(|| Some(seed.subject.clone()));
            edge_object = edge_object.or_else(|| Some(seed.object.clone()));
            predicate = predicate.or_else(|| Some(seed.predicate.clone()));
            relation = relation.or_else(|| seed.relation.clone());
            edge_type = edge_type.or_else(|| seed.edge_type.clone());
        }

        let predicate = predicate.or_else(|| relation.as_deref().map(biolink_predicate));
        let (edge_subject, edge_object, predicate) = match (edge_subject, edge_object, predicate) {
            (Some(s), Some(o), Some(p)) => (s, o, p),
            (s, o, p) => {
                let missing = [
                    ("subject", s.is_none()),
                    ("object", o.is_none()),
                    ("predicate", p.is_none()),
                ]
                .into_iter()
                .filter(|(_, absent)| *absent)
                .map(|(name, _)| name)
                .collect();
                return Err(KgxError::IncompleteAssociation { id, missing });
            }
        };

        self.implied.insert(edge_subject.clone());
        self.implied.insert(edge_object.clone());
        let mut edge = Edge::new(edge_subject, predicate, edge_object);
        edge.relation = relation;
        edge.edge_type = edge_type;
        if !id.starts_with("_:") {
            let id = id.strip_prefix(LOCAL_ID).map(str::to_string).unwrap_or(id);
            edge.id = Some(id);
        }
        edge.properties = props;
        kgx_core::normalize_multivalued(&mut edge.properties);
        Ok(edge)
    }

    /// Categories for an `rdf:type` class.
    fn class_categories(&mut self, class: &str) -> Vec<String> {
        if let Some(local) = class.strip_prefix(BIOLINK) {
            return vec![format!("biolink:{local}")];
        }
        let curie = self.vocab.contract(class);
        let categories = self.vocab.ctx().categories.categories(&curie);
        if categories.is_empty() {
            tracing::debug!(class = %curie, "rdf:type with no known category");
        }
        categories
    }

    fn implied_node(&self, id: &str) -> Node {
        Node::new(id).with_category(self.vocab.ctx().categories.categories(id))
    }

    /// Coerce a literal: declared type, else its datatype, else a string.
    fn literal(&self, name: &str, value: String, datatype: Option<&str>) -> Value {
        let types = self.vocab.ctx().property_types();
        if types.contains(name) {
            return types.coerce(name, Value::String(value));
        }
        let Some(datatype) = datatype else {
            return Value::String(value);
        };
        let raw = Value::String(value);
        match PropertyType::from_datatype_iri(datatype).coerce(&raw) {
            Some(coerced) => coerced,
            None => {
                tracing::warn!(
                    property = name,
                    value = %raw,
                    datatype,
                    "literal does not match its datatype"
                );
                raw
            }
        }
    }

    fn typed(&self, name: &str, value: Value) -> Value {
        let types = self.vocab.ctx().property_types();
        if types.contains(name) {
            types.coerce(name, value)
        } else {
            value
        }
    }
}

/// The biolink predicate for a relation CURIE.
fn biolink_predicate(relation: &str) -> String {
    if relation.starts_with("biolink:") {
        relation.to_string()
    } else {
        DEFAULT_PREDICATE.to_string()
    }
}

/// Streams records out of an N-Triples document.
///
/// Records are produced when the statement buffer is flushed: at end of
/// input, or early once `rdf.flush_threshold` subjects are buffered.
pub struct NtSource<R: BufRead> {
    parser: NTriplesParser<R>,
    buffer: StatementBuffer,
    ready: VecDeque<Result<Record, KgxError>>,
    flush_threshold: Option<usize>,
    finished: bool,
    triples: usize,
}

impl<R: BufRead> NtSource<R> {
    pub fn new(reader: R, ctx: &TransformContext) -> Self {
        Self {
            parser: NTriplesParser::new(reader),
            buffer: StatementBuffer::new(ctx),
            ready: VecDeque::new(),
            flush_threshold: ctx.config.rdf.flush_threshold.filter(|n| *n > 0),
            finished: false,
            triples: 0,
        }
    }

    fn step(&mut self) -> Result<(), KgxError> {
        let buffer = &mut self.buffer;
        let triples = &mut self.triples;
        self.parser
            .parse_step(&mut |t| -> Result<(), TurtleError> {
                let subject = match t.subject {
                    Subject::NamedNode(n) => n.iri.to_string(),
                    Subject::BlankNode(b) => format!("_:{}", b.id),
                    _ => {
                        tracing::debug!("skipping quoted-triple subject");
                        return Ok(());
                    }
                };
                let object = match t.object {
                    Term::NamedNode(n) => Object::Iri(n.iri.to_string()),
                    Term::BlankNode(b) => Object::Iri(format!("_:{}", b.id)),
                    Term::Literal(Literal::Simple { value }) => Object::Literal {
                        value: value.to_string(),
                        datatype: None,
                    },
                    Term::Literal(Literal::LanguageTaggedString { value, .. }) => Object::Literal {
                        value: value.to_string(),
                        datatype: None,
                    },
                    Term::Literal(Literal::Typed { value, datatype }) => Object::Literal {
                        value: value.to_string(),
                        datatype: Some(datatype.iri.to_string()),
                    },
                    _ => {
                        tracing::debug!("skipping quoted-triple object");
                        return Ok(());
                    }
                };
                buffer.push(subject, t.predicate.iri.to_string(), object);
                *triples += 1;
                Ok(())
            })
            .map_err(|e| KgxError::parse(FORMAT, e))
    }
}

impl<R: BufRead> Source for NtSource<R> {
    fn next_record(&mut self) -> Result<Option<Record>, KgxError> {
        loop {
            if let Some(record) = self.ready.pop_front() {
                return record.map(Some);
            }
            if self.finished {
                return Ok(None);
            }
            if self.parser.is_end() {
                self.buffer.finish(&mut self.ready);
                self.finished = true;
                tracing::debug!(triples = self.triples, "finished reading triples");
                continue;
            }
            self.step()?;
            if let Some(threshold) = self.flush_threshold {
                if self.buffer.len() >= threshold {
                    self.buffer.flush_complete(&mut self.ready);
                }
            }
        }
    }
}
