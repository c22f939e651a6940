#![doc = include_str!("../README.md")]
#![doc(test(attr(deny(warnings))))]

mod aggregates;
mod error;
mod eval;
mod expression;
mod limits;
mod model;
mod path;
mod service;

pub use crate::aggregates::{Accumulator, CustomAggregateRegistry};
pub use crate::error::{AggregateError, ExpressionError, QueryEvaluationError};
use crate::eval::SimpleEvaluator;
pub use crate::limits::QueryToken;
pub use crate::model::{QueryResults, QuerySolution, QuerySolutionIter, QueryTripleIter};
use crate::service::ServiceHandlerRegistry;
pub use crate::service::{ServiceHandler, ServiceSolution};
use mindrdf::{NamedNode, Term};
use mindstore::StoreSnapshot;
use sparir::algebra::Query;
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::Arc;

/// Custom scalar functions, keyed by the function IRI. `None` results are
/// surfaced as expression errors.
pub type CustomFunctionRegistry =
    HashMap<NamedNode, Arc<dyn Fn(&[Term]) -> Option<Term> + Send + Sync>>;

/// Evaluates translated queries against a store snapshot.
///
/// The function, aggregate and service registries are explicit construction
/// parameters so per-query customization needs no global state.
///
/// ```
/// use mindrdf::{NamedNode, Quad};
/// use mindstore::MemoryTripleStore;
/// use sparexec::{QueryEvaluator, QueryResults, QueryToken};
///
/// let store = MemoryTripleStore::new();
/// let ex = NamedNode::new("http://example.com")?;
/// store.insert(Quad::new_in_default_graph(ex.clone(), ex.clone(), ex.clone()))?;
///
/// let (text, metadata) = sparlift::lift("SELECT * WHERE { ?s ?p ?o }")?;
/// let parsed = sparsyn::SparqlParser::new().parse_query(&text)?;
/// let query = sparir::translate(&parsed, &metadata)?;
/// let results = QueryEvaluator::new().execute(store.snapshot(), &query, QueryToken::new())?;
/// if let QueryResults::Solutions(solutions) = results {
///     assert_eq!(solutions.count(), 1);
/// }
/// # Result::<_, Box<dyn std::error::Error>>::Ok(())
/// ```
#[derive(Clone, Default)]
pub struct QueryEvaluator {
    custom_functions: CustomFunctionRegistry,
    custom_aggregates: CustomAggregateRegistry,
    service_handler: Option<Arc<dyn ServiceHandler>>,
}

impl QueryEvaluator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a custom scalar function.
    #[must_use]
    pub fn with_custom_function(
        mut self,
        name: NamedNode,
        function: Arc<dyn Fn(&[Term]) -> Option<Term> + Send + Sync>,
    ) -> Self {
        self.custom_functions.insert(name, function);
        self
    }

    /// Registers a custom aggregate through its accumulator factory.
    #[must_use]
    pub fn with_custom_aggregate(
        mut self,
        name: NamedNode,
        factory: Arc<dyn Fn() -> Box<dyn Accumulator> + Send + Sync>,
    ) -> Self {
        self.custom_aggregates.insert(name, factory);
        self
    }

    /// Registers the adapter evaluating `SERVICE` patterns.
    #[must_use]
    pub fn with_service_handler(mut self, handler: Arc<dyn ServiceHandler>) -> Self {
        self.service_handler = Some(handler);
        self
    }

    /// Evaluates `query` lazily against `snapshot`, checking `token` at every
    /// produced row.
    pub fn execute(
        &self,
        snapshot: StoreSnapshot,
        query: &Query,
        token: QueryToken,
    ) -> Result<QueryResults, QueryEvaluationError> {
        let services = match &self.service_handler {
            Some(handler) => ServiceHandlerRegistry::with_default(Arc::clone(handler)),
            None => ServiceHandlerRegistry::default(),
        };
        let evaluator = SimpleEvaluator::new(
            snapshot,
            token,
            Rc::new(self.custom_functions.clone()),
            Rc::new(self.custom_aggregates.clone()),
            services,
        );
        eval::evaluate_query(&evaluator, query)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mindrdf::{GraphName, Literal, Quad, Variable};
    use mindstore::MemoryTripleStore;

    fn ex(name: &str) -> NamedNode {
        NamedNode::new_unchecked(format!("http://example.com/{name}"))
    }

    fn run(store: &MemoryTripleStore, query: &str) -> QueryResults {
        run_with(QueryEvaluator::new(), store, query)
    }

    fn run_with(
        evaluator: QueryEvaluator,
        store: &MemoryTripleStore,
        query: &str,
    ) -> QueryResults {
        let (text, metadata) = sparlift::lift(query).unwrap();
        let parsed = sparsyn::SparqlParser::new().parse_query(&text).unwrap();
        let translated = sparir::translate(&parsed, &metadata).unwrap();
        let optimized = sparir::Optimizer::optimize(translated, &sparir::NoStats);
        evaluator
            .execute(store.snapshot(), &optimized, QueryToken::new())
            .unwrap()
    }

    fn solutions(results: QueryResults) -> Vec<QuerySolution> {
        let QueryResults::Solutions(solutions) = results else {
            panic!("expected solutions");
        };
        solutions.collect::<Result<Vec<_>, _>>().unwrap()
    }

    fn knows_chain() -> MemoryTripleStore {
        let store = MemoryTripleStore::new();
        for (s, o) in [("a", "b"), ("b", "c"), ("c", "d")] {
            store
                .insert(Quad::new_in_default_graph(ex(s), ex("knows"), ex(o)))
                .unwrap();
        }
        store
    }

    #[test]
    fn bgp_join_on_shared_variables() {
        let store = MemoryTripleStore::new();
        store
            .insert(Quad::new_in_default_graph(ex("alice"), ex("knows"), ex("bob")))
            .unwrap();
        store
            .insert(Quad::new_in_default_graph(
                ex("bob"),
                ex("name"),
                Literal::from("Bob"),
            ))
            .unwrap();
        let rows = solutions(run(
            &store,
            "SELECT ?n WHERE { <http://example.com/alice> <http://example.com/knows> ?x . ?x <http://example.com/name> ?n }",
        ));
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("n"), Some(&Term::from(Literal::from("Bob"))));
    }

    #[test]
    fn optional_keeps_unmatched_left_rows() {
        let store = MemoryTripleStore::new();
        store
            .insert(Quad::new_in_default_graph(ex("a"), ex("p"), ex("b")))
            .unwrap();
        store
            .insert(Quad::new_in_default_graph(ex("c"), ex("p"), ex("d")))
            .unwrap();
        store
            .insert(Quad::new_in_default_graph(
                ex("b"),
                ex("label"),
                Literal::from("B"),
            ))
            .unwrap();
        let rows = solutions(run(
            &store,
            "SELECT ?x ?l WHERE { ?s <http://example.com/p> ?x OPTIONAL { ?x <http://example.com/label> ?l } }",
        ));
        assert_eq!(rows.len(), 2);
        assert_eq!(rows.iter().filter(|r| r.get("l").is_some()).count(), 1);
    }

    #[test]
    fn minus_with_disjoint_variables_removes_nothing() {
        let store = knows_chain();
        let rows = solutions(run(
            &store,
            "SELECT ?x WHERE { ?x <http://example.com/knows> ?y MINUS { ?a <http://example.com/missing> ?b } }",
        ));
        assert_eq!(rows.len(), 3);
    }

    #[test]
    fn minus_removes_compatible_rows() {
        let store = knows_chain();
        let rows = solutions(run(
            &store,
            "SELECT ?x ?y WHERE { ?x <http://example.com/knows> ?y MINUS { ?x <http://example.com/knows> <http://example.com/b> } }",
        ));
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn union_concatenates() {
        let store = knows_chain();
        let rows = solutions(run(
            &store,
            "SELECT ?x WHERE { { <http://example.com/a> <http://example.com/knows> ?x } UNION { <http://example.com/b> <http://example.com/knows> ?x } }",
        ));
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn filter_drops_rows_and_swallows_errors() {
        let store = MemoryTripleStore::new();
        store
            .insert(Quad::new_in_default_graph(ex("a"), ex("v"), Literal::from(1)))
            .unwrap();
        store
            .insert(Quad::new_in_default_graph(ex("b"), ex("v"), Literal::from(5)))
            .unwrap();
        store
            .insert(Quad::new_in_default_graph(
                ex("c"),
                ex("v"),
                Literal::from("not a number"),
            ))
            .unwrap();
        // The string row errors in `?v > 2` and is filtered out, not fatal.
        let rows = solutions(run(
            &store,
            "SELECT ?s WHERE { ?s <http://example.com/v> ?v FILTER(?v > 2) }",
        ));
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("s"), Some(&Term::from(ex("b"))));
    }

    #[test]
    fn bind_errors_leave_variable_unbound() {
        let store = MemoryTripleStore::new();
        store
            .insert(Quad::new_in_default_graph(
                ex("a"),
                ex("v"),
                Literal::from("x"),
            ))
            .unwrap();
        let rows = solutions(run(
            &store,
            "SELECT ?s ?d WHERE { ?s <http://example.com/v> ?v BIND(?v * 2 AS ?d) }",
        ));
        assert_eq!(rows.len(), 1);
        assert!(rows[0].get("d").is_none());
    }

    #[test]
    fn order_limit_offset() {
        let store = MemoryTripleStore::new();
        for (name, value) in [("a", 3), ("b", 1), ("c", 2)] {
            store
                .insert(Quad::new_in_default_graph(
                    ex(name),
                    ex("v"),
                    Literal::from(value),
                ))
                .unwrap();
        }
        let rows = solutions(run(
            &store,
            "SELECT ?s WHERE { ?s <http://example.com/v> ?v } ORDER BY DESC(?v) LIMIT 2 OFFSET 1",
        ));
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get("s"), Some(&Term::from(ex("c"))));
        assert_eq!(rows[1].get("s"), Some(&Term::from(ex("b"))));
    }

    #[test]
    fn limit_zero_and_large_offset_are_empty() {
        let store = knows_chain();
        assert!(solutions(run(
            &store,
            "SELECT ?x WHERE { ?x <http://example.com/knows> ?y } LIMIT 0",
        ))
        .is_empty());
        assert!(solutions(run(
            &store,
            "SELECT ?x WHERE { ?x <http://example.com/knows> ?y } OFFSET 10",
        ))
        .is_empty());
    }

    #[test]
    fn distinct_deduplicates_fully() {
        let store = MemoryTripleStore::new();
        store
            .insert(Quad::new_in_default_graph(ex("a"), ex("p"), ex("x")))
            .unwrap();
        store
            .insert(Quad::new_in_default_graph(ex("a"), ex("q"), ex("x")))
            .unwrap();
        let rows = solutions(run(&store, "SELECT DISTINCT ?s WHERE { ?s ?p ?o }"));
        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn group_by_with_aggregates_and_having() {
        let store = MemoryTripleStore::new();
        for (s, o) in [("a", "x"), ("a", "y"), ("b", "z")] {
            store
                .insert(Quad::new_in_default_graph(ex(s), ex("p"), ex(o)))
                .unwrap();
        }
        let rows = solutions(run(
            &store,
            "SELECT ?s (COUNT(?o) AS ?c) WHERE { ?s <http://example.com/p> ?o } GROUP BY ?s HAVING (COUNT(?o) > 1)",
        ));
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("s"), Some(&Term::from(ex("a"))));
        assert_eq!(rows[0].get("c"), Some(&Term::from(Literal::from(2))));
    }

    #[test]
    fn count_over_empty_input_is_zero() {
        let store = MemoryTripleStore::new();
        let rows = solutions(run(
            &store,
            "SELECT (COUNT(*) AS ?c) WHERE { ?s ?p ?o }",
        ));
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("c"), Some(&Term::from(Literal::from(0))));
    }

    #[test]
    fn values_join_with_undef() {
        let store = MemoryTripleStore::new();
        store
            .insert(Quad::new_in_default_graph(ex("1"), ex("p"), ex("a")))
            .unwrap();
        store
            .insert(Quad::new_in_default_graph(ex("2"), ex("p"), ex("b")))
            .unwrap();
        // The UNDEF row leaves ?x free, so it joins with every subject.
        let rows = solutions(run(
            &store,
            "SELECT ?x ?z WHERE { VALUES (?x ?y) { (<http://example.com/1> 2) (UNDEF 3) } ?x <http://example.com/p> ?z }",
        ));
        assert_eq!(rows.len(), 3);
    }

    #[test]
    fn graph_patterns_bind_graph_names() {
        let store = MemoryTripleStore::new();
        store
            .insert(Quad::new(ex("a"), ex("p"), ex("b"), ex("g1")))
            .unwrap();
        store
            .insert(Quad::new(ex("c"), ex("p"), ex("d"), ex("g2")))
            .unwrap();
        store
            .insert(Quad::new_in_default_graph(ex("e"), ex("p"), ex("f")))
            .unwrap();
        let rows = solutions(run(
            &store,
            "SELECT ?g ?s WHERE { GRAPH ?g { ?s <http://example.com/p> ?o } }",
        ));
        assert_eq!(rows.len(), 2);
        let rows = solutions(run(
            &store,
            "SELECT ?s WHERE { GRAPH <http://example.com/g1> { ?s ?p ?o } }",
        ));
        assert_eq!(rows.len(), 1);
        // Plain BGPs only see the default graph.
        let rows = solutions(run(&store, "SELECT ?s WHERE { ?s ?p ?o }"));
        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn property_path_plus_and_star() {
        let store = knows_chain();
        let rows = solutions(run(
            &store,
            "SELECT ?x WHERE { <http://example.com/a> <http://example.com/knows>+ ?x }",
        ));
        let mut reached: Vec<String> = rows
            .iter()
            .map(|r| r.get("x").unwrap().to_string())
            .collect();
        reached.sort();
        assert_eq!(reached.len(), 3);
        assert!(!reached[0].contains("/a>"));

        let rows = solutions(run(
            &store,
            "SELECT ?x WHERE { <http://example.com/a> <http://example.com/knows>* ?x }",
        ));
        assert_eq!(rows.len(), 4);
    }

    #[test]
    fn ask_queries() {
        let store = MemoryTripleStore::new();
        store
            .insert(Quad::new_in_default_graph(
                ex("alice"),
                ex("knows"),
                ex("bob"),
            ))
            .unwrap();
        store
            .insert(Quad::new_in_default_graph(
                ex("bob"),
                ex("name"),
                Literal::from("Bob"),
            ))
            .unwrap();
        let QueryResults::Boolean(result) = run(
            &store,
            "ASK { <http://example.com/alice> <http://example.com/knows> ?x . ?x <http://example.com/name> ?n }",
        ) else {
            panic!("expected a boolean");
        };
        assert!(result);
        let QueryResults::Boolean(result) = run(
            &store,
            "ASK { <http://example.com/alice> <http://example.com/hates> ?x }",
        ) else {
            panic!("expected a boolean");
        };
        assert!(!result);
    }

    #[test]
    fn construct_discards_incomplete_triples_and_deduplicates() {
        let store = MemoryTripleStore::new();
        store
            .insert(Quad::new_in_default_graph(ex("a"), ex("p"), ex("b")))
            .unwrap();
        store
            .insert(Quad::new_in_default_graph(ex("a"), ex("q"), ex("b")))
            .unwrap();
        let QueryResults::Graph(triples) = run(
            &store,
            "CONSTRUCT { ?s <http://example.com/linked> ?o . ?s <http://example.com/opt> ?l } WHERE { ?s ?p ?o OPTIONAL { ?s <http://example.com/label> ?l } }",
        ) else {
            panic!("expected triples");
        };
        let triples: Vec<_> = triples.collect::<Result<Vec<_>, _>>().unwrap();
        // Two bindings produce the same `linked` triple once; the `opt`
        // template has an unbound slot and is dropped.
        assert_eq!(triples.len(), 1);
    }

    #[test]
    fn describe_depth_and_symmetry() {
        let store = MemoryTripleStore::new();
        store
            .insert(Quad::new_in_default_graph(
                ex("task1"),
                ex("parent"),
                ex("project1"),
            ))
            .unwrap();
        store
            .insert(Quad::new_in_default_graph(
                ex("project1"),
                ex("label"),
                Literal::from("P1"),
            ))
            .unwrap();
        store
            .insert(Quad::new_in_default_graph(
                ex("task2"),
                ex("parent"),
                ex("task1"),
            ))
            .unwrap();

        let collect = |query: &str| -> Vec<mindrdf::Triple> {
            let QueryResults::Graph(triples) = run(&store, query) else {
                panic!("expected triples");
            };
            triples.collect::<Result<Vec<_>, _>>().unwrap()
        };

        // Depth 1 + symmetric: both adjacent triples, nothing further out.
        let triples = collect("DESCRIBE <http://example.com/project1> DEPTH 1 SYMMETRIC");
        assert_eq!(triples.len(), 2);

        // Depth 0 is empty.
        assert!(collect("DESCRIBE <http://example.com/project1> DEPTH 0").is_empty());

        // Without SYMMETRIC only outgoing edges are followed.
        let triples = collect("DESCRIBE <http://example.com/project1> DEPTH 1");
        assert_eq!(triples.len(), 1);

        // Unset depth keeps the subject-or-object neighborhood.
        let triples = collect("DESCRIBE <http://example.com/project1>");
        assert_eq!(triples.len(), 2);

        // Depth 2 + symmetric reaches the grandchild task.
        let triples = collect("DESCRIBE <http://example.com/project1> DEPTH 2 SYMMETRIC");
        assert_eq!(triples.len(), 3);
    }

    #[test]
    fn lateral_join_runs_per_left_row() {
        let store = MemoryTripleStore::new();
        for (person, friend, score) in [
            ("alice", "bob", 80),
            ("alice", "charlie", 95),
            ("alice", "david", 70),
            ("eve", "frank", 60),
            ("eve", "grace", 90),
        ] {
            let statement = mindrdf::Triple::new(ex(person), ex("knows"), ex(friend));
            store
                .insert(Quad::new_in_default_graph(
                    statement.clone(),
                    ex("score"),
                    Literal::from(score),
                ))
                .unwrap();
            store
                .insert(statement.in_graph(GraphName::DefaultGraph))
                .unwrap();
        }
        let rows = solutions(run(
            &store,
            "SELECT ?p ?f ?s WHERE { { SELECT DISTINCT ?p WHERE { ?p <http://example.com/knows> ?x } } LATERAL { SELECT ?f ?s WHERE { ?p <http://example.com/knows> ?f . << ?p <http://example.com/knows> ?f >> <http://example.com/score> ?s } ORDER BY DESC(?s) LIMIT 1 } }",
        ));
        assert_eq!(rows.len(), 2);
        for row in &rows {
            let person = row.get("p").unwrap().to_string();
            let friend = row.get("f").unwrap().to_string();
            if person.contains("alice") {
                assert!(friend.contains("charlie"));
                assert_eq!(row.get("s"), Some(&Term::from(Literal::from(95))));
            } else {
                assert!(person.contains("eve"));
                assert!(friend.contains("grace"));
                assert_eq!(row.get("s"), Some(&Term::from(Literal::from(90))));
            }
        }
    }

    #[test]
    fn duration_arithmetic_between_datetimes() {
        let store = MemoryTripleStore::new();
        let dt = |s: &str| {
            Literal::new_typed_literal(s, mindrdf::vocab::xsd::DATE_TIME)
        };
        for (task, start, end) in [
            ("t1", "2024-01-01T10:00:00Z", "2024-01-01T12:00:00Z"),
            ("t2", "2024-01-02T09:00:00Z", "2024-01-02T10:30:00Z"),
        ] {
            store
                .insert(Quad::new_in_default_graph(ex(task), ex("start"), dt(start)))
                .unwrap();
            store
                .insert(Quad::new_in_default_graph(ex(task), ex("end"), dt(end)))
                .unwrap();
        }
        let rows = solutions(run(
            &store,
            "SELECT ?t ((?end - ?start) AS ?d) WHERE { ?t <http://example.com/start> ?start . ?t <http://example.com/end> ?end } ORDER BY ?t",
        ));
        assert_eq!(rows.len(), 2);
        let durations: Vec<String> = rows
            .iter()
            .map(|r| {
                let Some(Term::Literal(literal)) = r.get("d").cloned() else {
                    panic!("expected a literal duration");
                };
                assert_eq!(literal.datatype(), mindrdf::vocab::xsd::DAY_TIME_DURATION);
                literal.value().to_owned()
            })
            .collect();
        assert_eq!(durations, vec!["PT2H", "PT1H30M"]);
    }

    #[test]
    fn replace_replaces_all_occurrences() {
        let store = MemoryTripleStore::new();
        store
            .insert(Quad::new_in_default_graph(
                ex("a"),
                ex("v"),
                Literal::from("one two two"),
            ))
            .unwrap();
        let rows = solutions(run(
            &store,
            "SELECT (REPLACE(?v, \"two\", \"2\") AS ?r) WHERE { ?s <http://example.com/v> ?v }",
        ));
        assert_eq!(
            rows[0].get("r"),
            Some(&Term::from(Literal::from("one 2 2")))
        );
    }

    #[test]
    fn custom_functions_are_reachable() {
        let store = MemoryTripleStore::new();
        store
            .insert(Quad::new_in_default_graph(
                ex("a"),
                ex("v"),
                Literal::from("x"),
            ))
            .unwrap();
        let evaluator = QueryEvaluator::new().with_custom_function(
            ex("shout"),
            Arc::new(|args| {
                let [Term::Literal(literal)] = args else {
                    return None;
                };
                Some(Literal::from(format!("{}!", literal.value())).into())
            }),
        );
        let rows = solutions(run_with(
            evaluator,
            &store,
            "SELECT (<http://example.com/shout>(?v) AS ?r) WHERE { ?s <http://example.com/v> ?v }",
        ));
        assert_eq!(rows[0].get("r"), Some(&Term::from(Literal::from("x!"))));
    }

    #[test]
    fn exists_and_not_exists() {
        let store = knows_chain();
        let rows = solutions(run(
            &store,
            "SELECT ?x WHERE { ?x <http://example.com/knows> ?y FILTER NOT EXISTS { ?y <http://example.com/knows> ?z } }",
        ));
        // Only c → d has a target without outgoing edges.
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("x"), Some(&Term::from(ex("c"))));
    }

    #[test]
    fn subquery_joins_on_shared_variables() {
        let store = knows_chain();
        let rows = solutions(run(
            &store,
            "SELECT ?x ?y WHERE { ?x <http://example.com/knows> ?y . { SELECT ?y WHERE { ?y <http://example.com/knows> ?z } } }",
        ));
        // b and c have outgoing edges, d does not.
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn cancelled_tokens_stop_evaluation() {
        let store = knows_chain();
        let (text, metadata) = sparlift::lift("SELECT ?x WHERE { ?x ?p ?o }").unwrap();
        let parsed = sparsyn::SparqlParser::new().parse_query(&text).unwrap();
        let query = sparir::translate(&parsed, &metadata).unwrap();
        let token = QueryToken::new();
        token.cancel();
        let results = QueryEvaluator::new()
            .execute(store.snapshot(), &query, token)
            .unwrap();
        let QueryResults::Solutions(mut solutions) = results else {
            panic!("expected solutions");
        };
        assert!(matches!(
            solutions.next(),
            Some(Err(QueryEvaluationError::Cancelled))
        ));
    }

    #[test]
    fn service_without_handler_errors_unless_silent() {
        let store = MemoryTripleStore::new();
        store
            .insert(Quad::new_in_default_graph(ex("a"), ex("p"), ex("b")))
            .unwrap();
        let (text, metadata) = sparlift::lift(
            "SELECT ?s WHERE { ?s <http://example.com/p> ?o SERVICE <http://example.com/sparql> { ?s ?x ?y } }",
        )
        .unwrap();
        let parsed = sparsyn::SparqlParser::new().parse_query(&text).unwrap();
        let query = sparir::translate(&parsed, &metadata).unwrap();
        let results = QueryEvaluator::new()
            .execute(store.snapshot(), &query, QueryToken::new())
            .unwrap();
        let QueryResults::Solutions(solutions) = results else {
            panic!("expected solutions");
        };
        assert!(solutions
            .collect::<Result<Vec<_>, _>>()
            .is_err());

        let rows = solutions_of_silent(&store);
        assert!(rows.is_empty());
    }

    fn solutions_of_silent(store: &MemoryTripleStore) -> Vec<QuerySolution> {
        solutions(run(
            store,
            "SELECT ?s WHERE { ?s <http://example.com/p> ?o SERVICE SILENT <http://example.com/sparql> { ?s ?x ?y } }",
        ))
    }

    #[test]
    fn service_handler_solutions_join_in() {
        struct Fixed;
        impl ServiceHandler for Fixed {
            fn handle(
                &self,
                _name: &NamedNode,
                _pattern: &sparir::algebra::GraphPattern,
            ) -> Result<Vec<ServiceSolution>, Box<dyn std::error::Error + Send + Sync>>
            {
                let mut solution = ServiceSolution::new();
                solution.insert(
                    Variable::new_unchecked("y"),
                    Term::from(Literal::from("remote")),
                );
                Ok(vec![solution])
            }
        }
        let store = MemoryTripleStore::new();
        store
            .insert(Quad::new_in_default_graph(ex("a"), ex("p"), ex("b")))
            .unwrap();
        let evaluator = QueryEvaluator::new().with_service_handler(Arc::new(Fixed));
        let rows = solutions(run_with(
            evaluator,
            &store,
            "SELECT ?s ?y WHERE { ?s <http://example.com/p> ?o SERVICE <http://example.com/sparql> { ?s ?x ?y } }",
        ));
        assert_eq!(rows.len(), 1);
        assert_eq!(
            rows[0].get("y"),
            Some(&Term::from(Literal::from("remote")))
        );
    }
}
