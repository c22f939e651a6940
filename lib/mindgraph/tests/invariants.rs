//! Cross-cutting properties: the optimizer preserves bag semantics, parsing
//! round-trips through the renderer, and matching sees every inserted quad.

use mindgraph::{optimize, parse, translate, GraphEngine, QueryToken};
use mindrdf::{NamedNode, Quad, Subject, Term};
use mindstore::MemoryTripleStore;
use sparexec::{QueryEvaluator, QueryResults};
use sparsyn::SparqlParser;

fn ex(name: &str) -> NamedNode {
    NamedNode::new_unchecked(format!("http://example.com/{name}"))
}

fn sample_store() -> MemoryTripleStore {
    let store = MemoryTripleStore::new();
    for (s, p, o) in [
        ("a", "knows", "b"),
        ("b", "knows", "c"),
        ("c", "knows", "d"),
        ("a", "likes", "c"),
        ("b", "likes", "a"),
        ("d", "label", "x"),
    ] {
        store
            .insert(Quad::new_in_default_graph(ex(s), ex(p), ex(o)))
            .unwrap();
    }
    store
}

/// Evaluates with and without optimization and compares multisets.
fn assert_optimization_preserves_bag(query_text: &str) {
    let store = sample_store();
    let parsed = parse(query_text).unwrap();
    let translated = translate(&parsed).unwrap();

    let collect = |query: &sparir::algebra::Query| -> Vec<String> {
        let results = QueryEvaluator::new()
            .execute(store.snapshot(), query, QueryToken::new())
            .unwrap();
        let QueryResults::Solutions(solutions) = results else {
            panic!("expected solutions");
        };
        let mut rendered: Vec<String> = solutions
            .map(|solution| {
                let solution = solution.unwrap();
                solution
                    .iter()
                    .map(|(variable, term)| format!("{variable}={term}"))
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .collect();
        rendered.sort();
        rendered
    };

    let unoptimized = collect(&translated);
    let optimized_query = optimize(translated, &store.snapshot());
    let optimized = collect(&optimized_query);
    assert_eq!(
        unoptimized, optimized,
        "optimization changed the result multiset for {query_text:?}"
    );
}

#[test]
fn optimization_preserves_results_without_modifiers() {
    for query in [
        "SELECT ?x ?y WHERE { ?x <http://example.com/knows> ?y . ?y <http://example.com/knows> ?z }",
        "SELECT ?x WHERE { ?x ?p ?o FILTER(?p = <http://example.com/likes>) }",
        "SELECT ?x ?y WHERE { { ?x <http://example.com/knows> ?y } UNION { ?x <http://example.com/likes> ?y } }",
        "SELECT ?x ?l WHERE { ?x <http://example.com/knows> ?y OPTIONAL { ?y <http://example.com/label> ?l } }",
        "SELECT ?x WHERE { ?x <http://example.com/knows> ?y MINUS { ?x <http://example.com/likes> ?z } }",
        "SELECT ?x ?v WHERE { VALUES (?v) { (1) (2) } ?x <http://example.com/knows> ?y }",
    ] {
        assert_optimization_preserves_bag(query);
    }
}

#[test]
fn rendered_queries_reparse_equivalently() {
    for query in [
        "SELECT DISTINCT ?x WHERE { ?x <http://example.com/knows> ?y FILTER(?y != <http://example.com/a>) } ORDER BY ?x LIMIT 3",
        "PREFIX : <http://example.com/> CONSTRUCT { ?a :linked ?b . } WHERE { ?a :knows ?b . }",
        "ASK { ?x <http://example.com/knows> ?y . ?y <http://example.com/likes> ?x }",
        "SELECT ?s (COUNT(?o) AS ?n) WHERE { ?s ?p ?o } GROUP BY ?s HAVING ((COUNT(?o) > 1))",
    ] {
        let first = SparqlParser::new().parse_query(query).unwrap();
        let second = SparqlParser::new()
            .parse_query(&first.to_string())
            .unwrap();
        assert_eq!(first, second, "round-trip changed {query:?}");
    }
}

#[test]
fn inserted_quads_are_found_by_every_pattern() {
    let store = sample_store();
    let snapshot = store.snapshot();
    for quad in snapshot.quads_for_pattern(None, None, None, None).unwrap() {
        let subject: Subject = quad.subject.clone();
        let object: Term = quad.object.clone();
        let found = snapshot
            .quads_for_pattern(
                Some(&subject),
                Some(&quad.predicate),
                Some(&object),
                Some(&quad.graph_name),
            )
            .unwrap();
        assert_eq!(found, vec![quad]);
    }
}

#[test]
fn lateral_outputs_at_most_one_row_per_left_solution() {
    let engine = GraphEngine::new();
    engine
        .update(
            "PREFIX : <http://example.com/> INSERT DATA { \
             :a :v 1 . :a :v 2 . :b :v 3 . :c :w 9 . }",
        )
        .unwrap();
    let results = engine
        .query(
            "PREFIX : <http://example.com/> SELECT ?s ?v { { SELECT DISTINCT ?s { ?s :v ?any } } \
             LATERAL { SELECT ?v { ?s :v ?v } ORDER BY DESC(?v) LIMIT 1 } }",
        )
        .unwrap();
    // :a and :b each contribute exactly one row; :c has no :v and is absent.
    let rows = results.solutions();
    assert_eq!(rows.len(), 2);
    for row in &rows {
        assert!(row.get("v").is_some());
    }
}
