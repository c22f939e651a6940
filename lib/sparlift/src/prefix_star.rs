//! `PREFIX * <vocabulary-iri>` → expanded `PREFIX` declarations.
//!
//! The vocabulary IRI is resolved to prefix bindings through a
//! [`VocabularyResolver`]; resolution may need I/O, so the expansion only
//! runs on the async parse path.

use crate::scanner::{code_mask, find_keyword, skip_whitespace};
use crate::TransformError;
use async_trait::async_trait;
use rustc_hash::FxHashMap;
use std::fmt::Write;
use tracing::debug;

/// A `(prefix, namespace)` pair emitted for a vocabulary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrefixBinding {
    pub prefix: String,
    pub namespace: String,
}

impl PrefixBinding {
    pub fn new(prefix: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            namespace: namespace.into(),
        }
    }
}

/// Maps a vocabulary IRI to the prefix declarations it stands for.
#[async_trait]
pub trait VocabularyResolver: Send + Sync {
    async fn resolve(&self, iri: &str) -> Option<Vec<PrefixBinding>>;
}

/// The built-in table of well-known vocabularies, extensible with
/// [`WellKnownVocabularies::register`].
#[derive(Debug, Clone)]
pub struct WellKnownVocabularies {
    table: FxHashMap<String, Vec<PrefixBinding>>,
}

impl Default for WellKnownVocabularies {
    fn default() -> Self {
        let mut this = Self {
            table: FxHashMap::default(),
        };
        for (iri, prefix, namespace) in [
            ("https://schema.org/", "schema", "https://schema.org/"),
            ("http://schema.org/", "schema", "http://schema.org/"),
            (
                "http://xmlns.com/foaf/0.1/",
                "foaf",
                "http://xmlns.com/foaf/0.1/",
            ),
            (
                "http://purl.org/dc/terms/",
                "dcterms",
                "http://purl.org/dc/terms/",
            ),
            (
                "http://purl.org/dc/elements/1.1/",
                "dc",
                "http://purl.org/dc/elements/1.1/",
            ),
            (
                "http://www.w3.org/1999/02/22-rdf-syntax-ns#",
                "rdf",
                "http://www.w3.org/1999/02/22-rdf-syntax-ns#",
            ),
            (
                "http://www.w3.org/2000/01/rdf-schema#",
                "rdfs",
                "http://www.w3.org/2000/01/rdf-schema#",
            ),
            (
                "http://www.w3.org/2002/07/owl#",
                "owl",
                "http://www.w3.org/2002/07/owl#",
            ),
            (
                "http://www.w3.org/2001/XMLSchema#",
                "xsd",
                "http://www.w3.org/2001/XMLSchema#",
            ),
            (
                "http://www.w3.org/2004/02/skos/core#",
                "skos",
                "http://www.w3.org/2004/02/skos/core#",
            ),
            (
                "http://www.w3.org/ns/prov#",
                "prov",
                "http://www.w3.org/ns/prov#",
            ),
            (
                "http://www.w3.org/ns/dcat#",
                "dcat",
                "http://www.w3.org/ns/dcat#",
            ),
            (
                "http://www.opengis.net/ont/geosparql#",
                "geo",
                "http://www.opengis.net/ont/geosparql#",
            ),
        ] {
            this.register(iri, vec![PrefixBinding::new(prefix, namespace)]);
        }
        this
    }
}

impl WellKnownVocabularies {
    pub fn new() -> Self {
        Self::default()
    }

    /// An empty table, for hermetic tests or fully custom setups.
    pub fn empty() -> Self {
        Self {
            table: FxHashMap::default(),
        }
    }

    /// Registers (or replaces) the bindings a vocabulary IRI expands to.
    ///
    /// The IRI is matched with and without a trailing `/` or `#`.
    pub fn register(&mut self, iri: impl Into<String>, bindings: Vec<PrefixBinding>) {
        let iri = iri.into();
        let trimmed = iri.trim_end_matches(['/', '#']).to_owned();
        self.table.insert(trimmed, bindings.clone());
        self.table.insert(iri, bindings);
    }

    fn lookup(&self, iri: &str) -> Option<Vec<PrefixBinding>> {
        self.table
            .get(iri)
            .or_else(|| self.table.get(iri.trim_end_matches(['/', '#'])))
            .cloned()
    }
}

#[async_trait]
impl VocabularyResolver for WellKnownVocabularies {
    async fn resolve(&self, iri: &str) -> Option<Vec<PrefixBinding>> {
        self.lookup(iri)
    }
}

/// Whether the query uses `PREFIX *` at all; the sync parse path refuses it.
pub(crate) fn uses_prefix_star(query: &str) -> bool {
    let (chars, mask) = code_mask(query);
    let mut from = 0;
    while let Some(at) = find_keyword(&chars, &mask, from, "PREFIX") {
        let after = skip_whitespace(&chars, at + "PREFIX".len());
        if chars.get(after) == Some(&'*') {
            return true;
        }
        from = at + "PREFIX".len();
    }
    false
}

pub(crate) async fn rewrite(
    query: &str,
    resolver: &dyn VocabularyResolver,
) -> Result<String, TransformError> {
    let (chars, mask) = code_mask(query);
    let mut remove: Vec<(usize, usize)> = Vec::new();
    let mut declarations = String::new();
    let mut from = 0;
    while let Some(at) = find_keyword(&chars, &mask, from, "PREFIX") {
        from = at + "PREFIX".len();
        let star = skip_whitespace(&chars, at + "PREFIX".len());
        if chars.get(star) != Some(&'*') {
            continue;
        }
        let iri_open = skip_whitespace(&chars, star + 1);
        if chars.get(iri_open) != Some(&'<') {
            return Err(TransformError::PrefixStarResolutionFailed(
                "PREFIX * requires a vocabulary IRI".to_owned(),
            ));
        }
        let mut iri_close = iri_open + 1;
        while chars.get(iri_close).is_some_and(|&c| c != '>') {
            iri_close += 1;
        }
        if iri_close >= chars.len() {
            return Err(TransformError::PrefixStarResolutionFailed(
                "unclosed vocabulary IRI".to_owned(),
            ));
        }
        let iri: String = chars[iri_open + 1..iri_close].iter().collect();

        let bindings = match resolver.resolve(&iri).await {
            Some(bindings) if !bindings.is_empty() => bindings,
            _ => fallback_bindings(&iri)?,
        };
        debug!(vocabulary = %iri, bindings = bindings.len(), "expanded PREFIX *");
        for binding in bindings {
            let _ = writeln!(
                declarations,
                "PREFIX {}: <{}>",
                binding.prefix, binding.namespace
            );
        }
        remove.push((at, iri_close + 1));
        from = iri_close + 1;
    }
    if remove.is_empty() {
        return Ok(query.to_owned());
    }
    let mut out = declarations;
    for (i, c) in chars.iter().enumerate() {
        if !remove.iter().any(|&(start, end)| i >= start && i < end) {
            out.push(*c);
        }
    }
    Ok(out)
}

/// Derives a prefix from the last meaningful path segment of the IRI.
fn fallback_bindings(iri: &str) -> Result<Vec<PrefixBinding>, TransformError> {
    let rest = iri.split_once("://").map_or(iri, |(_, rest)| rest);
    let trimmed = rest.trim_end_matches(['/', '#']);
    let segment = trimmed
        .rsplit(['/', '#'])
        .next()
        .unwrap_or_default()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_ascii_lowercase();
    if segment.is_empty() {
        return Err(TransformError::PrefixStarResolutionFailed(format!(
            "cannot derive a prefix from <{iri}>"
        )));
    }
    let namespace = if iri.ends_with('/') || iri.ends_with('#') {
        iri.to_owned()
    } else {
        format!("{iri}#")
    };
    Ok(vec![PrefixBinding::new(segment, namespace)])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn expands_known_vocabularies() {
        let resolver = WellKnownVocabularies::new();
        let rewritten = rewrite(
            "PREFIX * <http://xmlns.com/foaf/0.1/> SELECT ?n WHERE { ?x foaf:name ?n }",
            &resolver,
        )
        .await
        .unwrap();
        assert!(rewritten.starts_with("PREFIX foaf: <http://xmlns.com/foaf/0.1/>"));
        assert!(!rewritten.contains('*'));
    }

    #[tokio::test]
    async fn unknown_iris_fall_back_to_path_segment() {
        let resolver = WellKnownVocabularies::empty();
        let rewritten = rewrite(
            "PREFIX * <http://example.com/ontology/ems#> ASK { ems:a ems:b ems:c }",
            &resolver,
        )
        .await
        .unwrap();
        assert!(rewritten.starts_with("PREFIX ems: <http://example.com/ontology/ems#>"));
    }

    #[tokio::test]
    async fn unresolvable_iris_fail() {
        let resolver = WellKnownVocabularies::empty();
        assert!(matches!(
            rewrite("PREFIX * <http://///> ASK { ?s ?p ?o }", &resolver).await,
            Err(TransformError::PrefixStarResolutionFailed(_))
        ));
    }

    #[tokio::test]
    async fn regular_prefixes_are_untouched() {
        let resolver = WellKnownVocabularies::new();
        let query = "PREFIX ex: <http://example.com/> SELECT * WHERE { ex:s ?p ?o }";
        assert_eq!(rewrite(query, &resolver).await.unwrap(), query);
    }

    #[test]
    fn detection_of_prefix_star() {
        assert!(uses_prefix_star("PREFIX * <http://schema.org/> ASK {}"));
        assert!(uses_prefix_star("PREFIX*<http://schema.org/> ASK {}"));
        assert!(!uses_prefix_star(
            "PREFIX ex: <http://example.com/> ASK { ?s ?p \"PREFIX * <x>\" }"
        ));
    }

    #[test]
    fn registration_extends_the_table() {
        let mut resolver = WellKnownVocabularies::empty();
        resolver.register(
            "http://example.com/vocab#",
            vec![PrefixBinding::new("v", "http://example.com/vocab#")],
        );
        assert!(resolver.lookup("http://example.com/vocab#").is_some());
        assert!(resolver.lookup("http://example.com/vocab").is_some());
    }
}
