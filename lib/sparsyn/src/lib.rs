#![doc = include_str!("../README.md")]
#![doc(test(attr(deny(warnings))))]

pub mod ast;
mod lexer;
mod parser;

use crate::parser::Parser;
use mindrdf::NamedNode;
use oxiri::{Iri, IriParseError};
use rustc_hash::{FxHashMap, FxHashSet};

/// A SPARQL parser.
///
/// ```
/// use sparsyn::SparqlParser;
///
/// let query = SparqlParser::new().parse_query("SELECT ?s ?p ?o WHERE { ?s ?p ?o . }")?;
/// assert_eq!(
///     query.to_string(),
///     "SELECT ?s ?p ?o WHERE { ?s ?p ?o . }"
/// );
/// # Ok::<_, sparsyn::SparqlSyntaxError>(())
/// ```
#[must_use]
#[derive(Clone, Default)]
pub struct SparqlParser {
    base_iri: Option<Iri<String>>,
    prefixes: FxHashMap<String, String>,
    custom_aggregates: FxHashSet<NamedNode>,
}

impl SparqlParser {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Provides an IRI that could be used to resolve the operation's relative IRIs.
    pub fn with_base_iri(mut self, base_iri: impl Into<String>) -> Result<Self, IriParseError> {
        self.base_iri = Some(Iri::parse(base_iri.into())?);
        Ok(self)
    }

    /// Sets a default IRI prefix used during parsing.
    pub fn with_prefix(
        mut self,
        prefix_name: impl Into<String>,
        prefix_iri: impl Into<String>,
    ) -> Result<Self, IriParseError> {
        self.prefixes.insert(
            prefix_name.into(),
            Iri::parse(prefix_iri.into())?.into_inner(),
        );
        Ok(self)
    }

    /// Registers a function IRI to be parsed as a custom aggregate and not as
    /// a regular custom function.
    pub fn with_custom_aggregate_function(mut self, name: impl Into<NamedNode>) -> Self {
        self.custom_aggregates.insert(name.into());
        self
    }

    /// Parses a SPARQL query.
    pub fn parse_query(self, query: &str) -> Result<ast::Query, SparqlSyntaxError> {
        Parser::new(query, self.base_iri, self.prefixes, self.custom_aggregates)?.parse_query()
    }

    /// Parses a SPARQL update.
    ///
    /// Only `INSERT DATA` and `DELETE DATA` are representable; the other
    /// update forms are rejected with
    /// [`SparqlSyntaxError::UnsupportedUpdate`].
    pub fn parse_update(self, update: &str) -> Result<ast::Update, SparqlSyntaxError> {
        Parser::new(update, self.base_iri, self.prefixes, self.custom_aggregates)?.parse_update()
    }

    /// Parses either a query or an update, dispatching on the leading keyword.
    pub fn parse_operation(self, operation: &str) -> Result<ast::Operation, SparqlSyntaxError> {
        Parser::new(
            operation,
            self.base_iri,
            self.prefixes,
            self.custom_aggregates,
        )?
        .parse_operation()
    }
}

/// An error raised while parsing SPARQL text.
#[derive(Debug, Clone, thiserror::Error)]
#[non_exhaustive]
pub enum SparqlSyntaxError {
    #[error("Parse error at {line}:{column}: {message}")]
    Syntax {
        line: usize,
        column: usize,
        message: String,
    },
    /// The text is a SPARQL Update form this engine does not evaluate.
    #[error("Unsupported update operation: {0}")]
    UnsupportedUpdate(String),
}

impl SparqlSyntaxError {
    pub(crate) fn new(line: usize, column: usize, message: String) -> Self {
        Self::Syntax {
            line,
            column,
            message,
        }
    }

    /// The position the parse failed at, if it was a plain syntax error.
    pub fn position(&self) -> Option<(usize, usize)> {
        match self {
            Self::Syntax { line, column, .. } => Some((*line, *column)),
            Self::UnsupportedUpdate(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{
        Expression, GraphPatternElement, Operation, Query, TermPattern, Update,
    };

    fn parse(query: &str) -> Query {
        SparqlParser::new()
            .parse_query(query)
            .unwrap_or_else(|e| panic!("cannot parse {query:?}: {e}"))
    }

    fn roundtrips(query: &str) {
        let parsed = parse(query);
        let reparsed = parse(&parsed.to_string());
        // Fresh blank-node identifiers differ between parses, so only
        // blank-free queries use this helper.
        assert_eq!(parsed, reparsed, "round-trip failed for {query:?}");
    }

    #[test]
    fn select_roundtrips() {
        roundtrips("SELECT ?s WHERE { ?s ?p ?o }");
        roundtrips("PREFIX foaf: <http://xmlns.com/foaf/0.1/> SELECT DISTINCT ?name WHERE { ?x foaf:name ?name FILTER(STRLEN(?name) > 3) } ORDER BY DESC(?name) LIMIT 5 OFFSET 2");
        roundtrips("SELECT ?x (COUNT(?y) AS ?c) WHERE { ?x <http://example.com/p> ?y } GROUP BY ?x HAVING (COUNT(?y) > 1)");
        roundtrips("SELECT * WHERE { { ?a <http://example.com/p> ?b } UNION { ?a <http://example.com/q> ?b } OPTIONAL { ?a <http://example.com/r> ?c } }");
        roundtrips("SELECT ?x WHERE { VALUES ( ?x ) { ( 1 ) ( UNDEF ) } ?x <http://example.com/p> ?y . }");
        roundtrips("SELECT ?s WHERE { GRAPH <http://example.com/g> { ?s ?p ?o } }");
        roundtrips("SELECT ?s WHERE { SERVICE SILENT <http://example.com/sparql> { ?s ?p ?o } }");
        roundtrips("SELECT ?x WHERE { ?x (<http://example.com/p> / (<http://example.com/q>)+) ?y . MINUS { ?x <http://example.com/r> ?y . } }");
        roundtrips("ASK { ?s ?p ?o . FILTER(?o IN (1, 2, 3)) }");
        roundtrips("CONSTRUCT { ?s <http://example.com/p> ?o . } WHERE { ?s <http://example.com/q> ?o . }");
        roundtrips("DESCRIBE <http://example.com/a> ?x WHERE { ?x ?p <http://example.com/a> . }");
    }

    #[test]
    fn quoted_triples_roundtrip() {
        roundtrips(
            "SELECT ?c WHERE { << <http://example.com/a> <http://example.com/p> ?b >> <http://example.com/certainty> ?c . }",
        );
    }

    #[test]
    fn annotation_expands_to_quoted_triple_statements() {
        let query = parse(
            "PREFIX : <http://example.com/> SELECT ?v WHERE { :a :p :b {| :q ?v |} }",
        );
        let Query::Select(select) = query else {
            panic!("not a select");
        };
        let elements = &select.pattern.elements;
        assert_eq!(elements.len(), 2);
        let GraphPatternElement::Triple(base) = &elements[0] else {
            panic!("expected the base triple first");
        };
        let GraphPatternElement::Triple(annotation) = &elements[1] else {
            panic!("expected the annotation triple second");
        };
        assert_eq!(
            annotation.subject,
            TermPattern::Triple(Box::new(base.clone()))
        );
    }

    #[test]
    fn prefixes_resolve_during_parsing() {
        let query = parse("PREFIX ex: <http://example.com/> SELECT * WHERE { ex:s a ex:T }");
        let rendered = query.to_string();
        assert!(rendered.contains("<http://example.com/s>"));
        assert!(rendered.contains("<http://www.w3.org/1999/02/22-rdf-syntax-ns#type>"));
    }

    #[test]
    fn base_resolves_relative_iris() {
        let query = SparqlParser::new()
            .with_base_iri("http://example.com/dir/")
            .unwrap()
            .parse_query("SELECT * WHERE { <s> <p> <o> }")
            .unwrap();
        assert!(query.to_string().contains("<http://example.com/dir/s>"));
    }

    #[test]
    fn blank_node_property_lists_generate_triples() {
        let query = parse("SELECT ?n WHERE { [ <http://example.com/name> ?n ] a <http://example.com/T> }");
        let Query::Select(select) = query else {
            panic!("not a select");
        };
        assert_eq!(select.pattern.elements.len(), 2);
    }

    #[test]
    fn errors_carry_positions() {
        let error = SparqlParser::new()
            .parse_query("SELECT ?x WHERE {\n  ?x <http://example.com/p> }")
            .unwrap_err();
        let (line, _) = error.position().expect("should be a syntax error");
        assert_eq!(line, 2);
    }

    #[test]
    fn unknown_prefix_is_an_error() {
        assert!(SparqlParser::new()
            .parse_query("SELECT * WHERE { ex:s ?p ?o }")
            .is_err());
    }

    #[test]
    fn insert_and_delete_data() {
        let update = SparqlParser::new()
            .parse_update(
                "PREFIX : <http://example.com/> INSERT DATA { :a :p :b . GRAPH :g { :c :p :d } }",
            )
            .unwrap();
        let Update::InsertData(quads) = update else {
            panic!("not an insert");
        };
        assert_eq!(quads.len(), 2);
        assert!(quads[1].graph_name.to_string().contains("/g"));

        let update = SparqlParser::new()
            .parse_update("PREFIX : <http://example.com/> DELETE DATA { :a :p :b }")
            .unwrap();
        assert!(matches!(update, Update::DeleteData(quads) if quads.len() == 1));
    }

    #[test]
    fn other_update_forms_are_unsupported() {
        for update in [
            "CLEAR ALL",
            "DROP GRAPH <http://example.com/g>",
            "LOAD <http://example.com/data.ttl>",
            "INSERT { ?s ?p ?o } WHERE { ?s ?p ?o }",
            "DELETE WHERE { ?s ?p ?o }",
        ] {
            assert!(
                matches!(
                    SparqlParser::new().parse_update(update),
                    Err(SparqlSyntaxError::UnsupportedUpdate(_))
                ),
                "expected UnsupportedUpdate for {update:?}"
            );
        }
    }

    #[test]
    fn operation_dispatch() {
        assert!(matches!(
            SparqlParser::new().parse_operation("ASK { ?s ?p ?o }"),
            Ok(Operation::Query(_))
        ));
        assert!(matches!(
            SparqlParser::new()
                .parse_operation("INSERT DATA { <http://e.com/a> <http://e.com/p> 1 }"),
            Ok(Operation::Update(_))
        ));
    }

    #[test]
    fn subselect_with_marker_variable_parses() {
        let query = parse(
            "SELECT ?person ?friend WHERE { ?person <http://example.com/knows> ?f . { SELECT ?__LATERAL_JOIN__ ?friend WHERE { ?x <http://example.com/scored> ?friend } ORDER BY DESC(?friend) LIMIT 1 } }",
        );
        let Query::Select(select) = query else {
            panic!("not a select");
        };
        assert!(select
            .pattern
            .elements
            .iter()
            .any(|e| matches!(e, GraphPatternElement::SubSelect(_))));
    }

    #[test]
    fn expressions_parse_with_precedence() {
        let query = parse("SELECT ?x WHERE { ?x <http://example.com/p> ?y FILTER(?y > 1 + 2 * 3 || !BOUND(?x)) }");
        let Query::Select(select) = query else {
            panic!("not a select");
        };
        let filter = select
            .pattern
            .elements
            .iter()
            .find_map(|e| match e {
                GraphPatternElement::Filter(expression) => Some(expression),
                _ => None,
            })
            .expect("filter present");
        let Expression::Or(left, _) = filter else {
            panic!("|| should bind loosest, got {filter:?}");
        };
        let Expression::Greater(_, sum) = left.as_ref() else {
            panic!("expected >");
        };
        assert!(matches!(sum.as_ref(), Expression::Add(_, _)));
    }
}
