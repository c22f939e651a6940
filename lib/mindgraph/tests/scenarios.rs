//! End-to-end coverage of the query pipeline through the engine facade.

use mindgraph::{
    EngineError, FileChangeEvent, FileChangeKind, GraphEngine, MaterializedResults,
};
use mindrdf::{Literal, NamedNode, Term};

const PREFIX: &str = "PREFIX : <http://example.com/> PREFIX ems: <http://example.com/ems#> ";

fn engine_with(data: &str) -> GraphEngine {
    let engine = GraphEngine::new();
    engine
        .update(&format!("{PREFIX}INSERT DATA {{ {data} }}"))
        .expect("test data should insert");
    engine
}

fn query(engine: &GraphEngine, text: &str) -> MaterializedResults {
    engine
        .query(&format!("{PREFIX}{text}"))
        .expect("query should evaluate")
}

fn ex(name: &str) -> Term {
    Term::NamedNode(NamedNode::new_unchecked(format!("http://example.com/{name}")))
}

fn bindings_of(results: &MaterializedResults, variable: &str) -> Vec<Term> {
    results
        .solutions()
        .iter()
        .filter_map(|solution| solution.get(variable).cloned())
        .collect()
}

#[test]
fn transitive_paths_reach_every_hop() {
    let engine = engine_with(":a :knows :b . :b :knows :c . :c :knows :d .");
    let results = query(&engine, "SELECT ?x { :a :knows+ ?x }");
    let mut reached = bindings_of(&results, "x");
    reached.sort_by_key(ToString::to_string);
    assert_eq!(reached, vec![ex("b"), ex("c"), ex("d")]);

    let results = query(&engine, "SELECT ?x { :a :knows* ?x }");
    let mut reached = bindings_of(&results, "x");
    reached.sort_by_key(ToString::to_string);
    assert_eq!(reached, vec![ex("a"), ex("b"), ex("c"), ex("d")]);
}

#[test]
fn datetime_differences_are_day_time_durations() {
    let engine = engine_with(
        ":t1 a ems:Task ; ems:start \"2024-03-01T10:00:00Z\"^^<http://www.w3.org/2001/XMLSchema#dateTime> ; \
         ems:end \"2024-03-01T12:00:00Z\"^^<http://www.w3.org/2001/XMLSchema#dateTime> . \
         :t2 a ems:Task ; ems:start \"2024-03-02T08:00:00Z\"^^<http://www.w3.org/2001/XMLSchema#dateTime> ; \
         ems:end \"2024-03-02T09:30:00Z\"^^<http://www.w3.org/2001/XMLSchema#dateTime> .",
    );
    let results = query(
        &engine,
        "SELECT ?task ((?end - ?start) AS ?d) { ?task a ems:Task ; ems:start ?start ; ems:end ?end } ORDER BY ?task",
    );
    let durations: Vec<(String, String)> = results
        .solutions()
        .iter()
        .map(|solution| {
            let Some(Term::Literal(literal)) = solution.get("d").cloned() else {
                panic!("expected a duration literal");
            };
            assert_eq!(
                literal.datatype().as_str(),
                "http://www.w3.org/2001/XMLSchema#dayTimeDuration"
            );
            (
                solution.get("task").expect("task bound").to_string(),
                literal.value().to_owned(),
            )
        })
        .collect();
    assert_eq!(durations[0].1, "PT2H");
    assert_eq!(durations[1].1, "PT1H30M");
}

#[test]
fn lateral_selects_the_top_friend_per_person() {
    let engine = engine_with(
        ":alice :knows :bob . << :alice :knows :bob >> :score 80 . \
         :alice :knows :charlie . << :alice :knows :charlie >> :score 95 . \
         :alice :knows :david . << :alice :knows :david >> :score 70 . \
         :eve :knows :frank . << :eve :knows :frank >> :score 60 . \
         :eve :knows :grace . << :eve :knows :grace >> :score 90 .",
    );
    let results = query(
        &engine,
        "SELECT ?p ?f ?s { { SELECT DISTINCT ?p { ?p :knows ?someone } } \
         LATERAL { SELECT ?f ?s { ?p :knows ?f . << ?p :knows ?f >> :score ?s } ORDER BY DESC(?s) LIMIT 1 } }",
    );
    let mut rows: Vec<(String, String, String)> = results
        .solutions()
        .iter()
        .map(|solution| {
            (
                solution.get("p").expect("p").to_string(),
                solution.get("f").expect("f").to_string(),
                solution.get("s").expect("s").to_string(),
            )
        })
        .collect();
    rows.sort();
    assert_eq!(rows.len(), 2);
    assert!(rows[0].0.contains("alice"));
    assert!(rows[0].1.contains("charlie"));
    assert!(rows[0].2.contains("95"));
    assert!(rows[1].0.contains("eve"));
    assert!(rows[1].1.contains("grace"));
    assert!(rows[1].2.contains("90"));
}

#[test]
fn values_rows_with_undef_join_freely() {
    let engine = engine_with(":one :p :a . :two :p :b .");
    let results = query(
        &engine,
        "SELECT ?x ?z { VALUES (?x ?y) { (:one 2) (UNDEF 3) } ?x :p ?z }",
    );
    // The bound row matches :one only; the UNDEF row joins with both
    // subjects.
    assert_eq!(results.len(), 3);
}

#[test]
fn ask_over_a_join() {
    let engine = engine_with(":alice :knows :bob . :bob :name \"Bob\" .");
    let results = query(&engine, "ASK { :alice :knows ?x . ?x :name ?n }");
    assert_eq!(results, MaterializedResults::Boolean(true));
    let results = query(&engine, "ASK { :alice :knows ?x . ?x :age ?n }");
    assert_eq!(results, MaterializedResults::Boolean(false));
}

#[test]
fn describe_depth_one_symmetric_stops_at_one_hop() {
    let engine = engine_with(
        ":task1 :parent :project1 . :project1 :label \"P1\" . :subtask :parent :task1 .",
    );
    let results = query(&engine, "DESCRIBE :project1 DEPTH 1 SYMMETRIC");
    let MaterializedResults::Graph(triples) = results else {
        panic!("expected triples");
    };
    assert_eq!(triples.len(), 2);
    let rendered: Vec<String> = triples.iter().map(ToString::to_string).collect();
    assert!(rendered.iter().any(|t| t.contains("task1")));
    assert!(rendered.iter().any(|t| t.contains("P1")));
    assert!(!rendered.iter().any(|t| t.contains("subtask")));
}

#[test]
fn describe_depth_zero_is_empty() {
    let engine = engine_with(":a :p :b .");
    let results = query(&engine, "DESCRIBE :a DEPTH 0");
    assert!(results.is_empty());
}

#[test]
fn directional_tags_distinguish_literals() {
    let engine = engine_with(":a :label \"x\"@ar--rtl . :b :label \"x\"@ar--ltr . :c :label \"x\"@ar .");
    let results = query(&engine, "SELECT ?s { ?s :label \"x\"@ar--rtl }");
    assert_eq!(bindings_of(&results, "s"), vec![ex("a")]);
    let results = query(&engine, "SELECT ?s { ?s :label \"x\"@ar }");
    assert_eq!(bindings_of(&results, "s"), vec![ex("c")]);
}

#[test]
fn annotation_syntax_matches_quoted_statements() {
    let engine = engine_with(":alice :knows :bob {| :since 2020 |} .");
    let results = query(
        &engine,
        "SELECT ?since { << :alice :knows :bob >> :since ?since }",
    );
    assert_eq!(
        bindings_of(&results, "since"),
        vec![Term::from(Literal::from(2020))]
    );
    // The base triple was asserted too.
    let results = query(&engine, "ASK { :alice :knows :bob }");
    assert_eq!(results, MaterializedResults::Boolean(true));
}

#[test]
fn triple_term_parenthesized_form_is_accepted() {
    let engine = engine_with(":a :p :b . << :a :p :b >> :certainty 9 .");
    let results = query(&engine, "SELECT ?c { <<( :a :p :b )>> :certainty ?c }");
    assert_eq!(
        bindings_of(&results, "c"),
        vec![Term::from(Literal::from(9))]
    );
}

#[test]
fn case_when_selects_branches() {
    let engine = engine_with(":a :v 1 . :b :v 5 .");
    let results = query(
        &engine,
        "SELECT ?s (CASE WHEN ?v > 3 THEN \"big\" ELSE \"small\" END AS ?size) { ?s :v ?v } ORDER BY ?s",
    );
    let sizes = bindings_of(&results, "size");
    assert_eq!(
        sizes,
        vec![
            Term::from(Literal::from("small")),
            Term::from(Literal::from("big")),
        ]
    );
}

#[tokio::test]
async fn prefix_star_expands_well_known_vocabularies() {
    let engine = GraphEngine::new();
    engine
        .update(
            "PREFIX foaf: <http://xmlns.com/foaf/0.1/> PREFIX : <http://example.com/> \
             INSERT DATA { :alice foaf:name \"Alice\" }",
        )
        .unwrap();
    let results = engine
        .query_async("PREFIX * <http://xmlns.com/foaf/0.1/> SELECT ?n { ?x foaf:name ?n }")
        .await
        .unwrap();
    assert_eq!(results.len(), 1);
}

#[test]
fn prefix_star_requires_the_async_path() {
    let engine = GraphEngine::new();
    let error = engine
        .query("PREFIX * <http://xmlns.com/foaf/0.1/> SELECT ?n { ?x ?p ?n }")
        .unwrap_err();
    assert!(matches!(
        error,
        EngineError::Transform(sparlift::TransformError::PrefixStarRequiresAsync)
    ));
}

#[test]
fn unsupported_updates_are_rejected_as_such() {
    let engine = GraphEngine::new();
    for update in ["CLEAR ALL", "DROP GRAPH <http://example.com/g>", "INSERT { ?s ?p ?o } WHERE { ?s ?p ?o }"] {
        assert!(matches!(
            engine.update(update),
            Err(EngineError::UnsupportedUpdate(_))
        ));
    }
}

#[test]
fn delete_data_removes_triples() {
    let engine = engine_with(":a :p :b . :a :p :c .");
    engine
        .update(&format!("{PREFIX}DELETE DATA {{ :a :p :b }}"))
        .unwrap();
    let results = query(&engine, "SELECT ?o { :a :p ?o }");
    assert_eq!(bindings_of(&results, "o"), vec![ex("c")]);
}

#[test]
fn cached_results_invalidate_per_file() {
    let engine = engine_with(":a :p :b .");
    let text = format!("{PREFIX}SELECT ?o {{ :a :p ?o }}");
    let first = engine
        .query_with_files(&text, &["notes/a.md".to_owned()])
        .unwrap();
    assert_eq!(first.len(), 1);
    assert_eq!(engine.cache().len(), 1);

    // A cache hit answers without re-evaluation.
    engine.query_with_files(&text, &[]).unwrap();
    assert_eq!(engine.cache().hit_count(), 1);

    // A change to an unrelated file keeps the entry.
    engine.on_file_change(FileChangeEvent::new(
        "notes/other.md",
        FileChangeKind::Modified,
    ));
    engine.flush_changes();
    assert_eq!(engine.cache().len(), 1);

    // A change to the contributing file evicts it.
    engine.on_file_change(FileChangeEvent::new(
        "notes/a.md",
        FileChangeKind::Modified,
    ));
    engine.flush_changes();
    assert_eq!(engine.cache().len(), 0);
}

#[test]
fn results_render_to_canonical_json() {
    let engine = engine_with(":a :name \"Alice\"@en .");
    let results = query(&engine, "SELECT ?n { :a :name ?n }");
    let json = results.to_json().unwrap();
    assert_eq!(json["head"]["vars"][0], "n");
    assert_eq!(json["results"]["bindings"][0]["n"]["value"], "Alice");
    assert_eq!(json["results"]["bindings"][0]["n"]["xml:lang"], "en");
}
