//! Category lookup for `rdf:type` classes that are not biolink classes.

/// Maps an ontology class (CURIE) or a bare prefix to biolink categories.
pub trait CategoryLookup: Send + Sync {
    /// Categories for `key`, most specific first. Empty when unknown.
    fn categories(&self, key: &str) -> Vec<String>;
}

/// Table-driven lookup covering common biomedical namespaces.
///
/// Exact class matches win over prefix matches.
#[derive(Debug, Clone)]
pub struct StaticCategoryLookup {
    entries: Vec<(String, String)>,
}

const DEFAULT_ENTRIES: &[(&str, &str)] = &[
    ("SO:0000704", "biolink:Gene"),
    ("SO:0000110", "biolink:SequenceFeature"),
    ("HGNC", "biolink:Gene"),
    ("NCBIGene", "biolink:Gene"),
    ("ENSEMBL", "biolink:Gene"),
    ("MONDO", "biolink:Disease"),
    ("OMIM", "biolink:Disease"),
    ("Orphanet", "biolink:Disease"),
    ("DOID", "biolink:Disease"),
    ("HP", "biolink:PhenotypicFeature"),
    ("UniProtKB", "biolink:Protein"),
    ("CHEBI", "biolink:ChemicalSubstance"),
    ("GO", "biolink:BiologicalProcess"),
];

impl Default for StaticCategoryLookup {
    fn default() -> Self {
        Self {
            entries: DEFAULT_ENTRIES
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }
}

impl StaticCategoryLookup {
    /// A lookup with no entries.
    pub fn empty() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Add an entry; `key` is either a full CURIE or a prefix.
    pub fn with(mut self, key: impl Into<String>, category: impl Into<String>) -> Self {
        self.entries.push((key.into(), category.into()));
        self
    }

    fn lookup(&self, key: &str) -> Vec<String> {
        self.entries
            .iter()
            .filter(|(k, _)| k == key)
            .map(|(_, v)| v.clone())
            .collect()
    }
}

impl CategoryLookup for StaticCategoryLookup {
    fn categories(&self, key: &str) -> Vec<String> {
        let exact = self.lookup(key);
        if !exact.is_empty() {
            return exact;
        }
        match key.split_once(':') {
            Some((prefix, _)) => self.lookup(prefix),
            None => Vec::new(),
        }
    }
}
