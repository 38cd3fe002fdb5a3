//! CURIE prefix map: compress IRIs on read, expand CURIEs on write.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

pub const BIOLINK: &str = "https://w3id.org/biolink/vocab/";
pub const RDF: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#";
pub const XSD: &str = "http://www.w3.org/2001/XMLSchema#";

const DEFAULT_PREFIXES: &[(&str, &str)] = &[
    ("biolink", BIOLINK),
    ("rdf", RDF),
    ("rdfs", "http://www.w3.org/2000/01/rdf-schema#"),
    ("xsd", XSD),
    ("owl", "http://www.w3.org/2002/07/owl#"),
    ("dc", "http://purl.org/dc/elements/1.1/"),
    ("dcterms", "http://purl.org/dc/terms/"),
    ("OBAN", "http://purl.org/oban/"),
    ("RO", "http://purl.obolibrary.org/obo/RO_"),
    ("HP", "http://purl.obolibrary.org/obo/HP_"),
    ("MONDO", "http://purl.obolibrary.org/obo/MONDO_"),
    ("GO", "http://purl.obolibrary.org/obo/GO_"),
    ("SO", "http://purl.obolibrary.org/obo/SO_"),
    ("CHEBI", "http://purl.obolibrary.org/obo/CHEBI_"),
    ("OMIM", "http://omim.org/entry/"),
    ("HGNC", "http://identifiers.org/hgnc/"),
    ("NCBIGene", "http://identifiers.org/ncbigene/"),
    ("UniProtKB", "http://identifiers.org/uniprot/"),
];

/// Bidirectional mapping between CURIE prefixes and IRI stems.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PrefixMap {
    prefixes: IndexMap<String, String>,
}

impl PrefixMap {
    /// An empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in prefixes (biolink, rdf, xsd, common OBO namespaces, ...).
    pub fn with_defaults() -> Self {
        let prefixes = DEFAULT_PREFIXES
            .iter()
            .map(|(p, s)| (p.to_string(), s.to_string()))
            .collect();
        Self { prefixes }
    }

    /// Add or replace a prefix.
    pub fn insert(&mut self, prefix: impl Into<String>, stem: impl Into<String>) {
        self.prefixes.insert(prefix.into(), stem.into());
    }

    /// Overlay `other` on top of this map; entries in `other` win.
    pub fn extend(&mut self, other: &PrefixMap) {
        for (prefix, stem) in &other.prefixes {
            self.prefixes.insert(prefix.clone(), stem.clone());
        }
    }

    pub fn stem(&self, prefix: &str) -> Option<&str> {
        self.prefixes.get(prefix).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.prefixes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prefixes.is_empty()
    }

    /// Compress an IRI to a CURIE using the longest matching stem.
    pub fn contract(&self, iri: &str) -> Option<String> {
        self.prefixes
            .iter()
            .filter(|(_, stem)| !stem.is_empty() && iri.starts_with(stem.as_str()))
            .max_by_key(|(_, stem)| stem.len())
            .map(|(prefix, stem)| format!("{}:{}", prefix, &iri[stem.len()..]))
    }

    /// Expand a CURIE with a known prefix to a full IRI.
    pub fn expand(&self, curie: &str) -> Option<String> {
        let (prefix, local) = curie.split_once(':')?;
        if local.starts_with("//") {
            return None;
        }
        self.stem(prefix).map(|stem| format!("{stem}{local}"))
    }

    /// Whether `value` is an identifier this map can compress or expand.
    ///
    /// Used to infer `uriorcurie` for untyped string properties.
    pub fn is_identifier(&self, value: &str) -> bool {
        if value.is_empty() || value.chars().any(char::is_whitespace) {
            return false;
        }
        if is_absolute_iri(value) {
            return self.contract(value).is_some();
        }
        value
            .split_once(':')
            .is_some_and(|(prefix, local)| !local.is_empty() && self.stem(prefix).is_some())
    }
}

/// Whether `value` is already a full IRI rather than a CURIE.
pub fn is_absolute_iri(value: &str) -> bool {
    value.contains("://") || value.starts_with("urn:")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contract_and_expand_are_symmetric() {
        let map = PrefixMap::with_defaults();
        let iri = "http://purl.obolibrary.org/obo/HP_0000006";
        let curie = map.contract(iri).unwrap();
        assert_eq!(curie, "HP:0000006");
        assert_eq!(map.expand(&curie).unwrap(), iri);
    }

    #[test]
    fn test_longest_stem_wins() {
        let mut map = PrefixMap::new();
        map.insert("obo", "http://purl.obolibrary.org/obo/");
        map.insert("HP", "http://purl.obolibrary.org/obo/HP_");
        assert_eq!(
            map.contract("http://purl.obolibrary.org/obo/HP_1").as_deref(),
            Some("HP:1")
        );
        assert_eq!(
            map.contract("http://purl.obolibrary.org/obo/GO_1").as_deref(),
            Some("obo:GO_1")
        );
    }

    #[test]
    fn test_unmapped_passes_through() {
        let map = PrefixMap::with_defaults();
        assert_eq!(map.contract("http://example.org/x"), None);
        assert_eq!(map.expand("FOO:1"), None);
        assert_eq!(map.expand("http://example.org/x"), None);
    }

    #[test]
    fn test_user_prefix_overrides_default() {
        let mut map = PrefixMap::with_defaults();
        let mut user = PrefixMap::new();
        user.insert(
            "HGNC",
            "https://www.genenames.org/data/gene-symbol-report/#!/hgnc_id/",
        );
        map.extend(&user);
        assert_eq!(
            map.contract("https://www.genenames.org/data/gene-symbol-report/#!/hgnc_id/11603")
                .as_deref(),
            Some("HGNC:11603")
        );
    }

    #[test]
    fn test_is_identifier() {
        let map = PrefixMap::with_defaults();
        assert!(map.is_identifier("HGNC:11603"));
        assert!(map.is_identifier("https://w3id.org/biolink/vocab/Gene"));
        assert!(!map.is_identifier("not an id"));
        assert!(!map.is_identifier("FOO:1"));
        assert!(!map.is_identifier("12:30"));
    }
}
