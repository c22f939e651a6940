//! Property-path evaluation.
//!
//! Closures (`*`, `+`) run an iterative breadth-first search with a visited
//! set keyed on `(start, end)` pairs, so cycles terminate. `*` additionally
//! yields the reflexive pair for every resource of the active graph.

use crate::error::QueryEvaluationError;
use crate::limits::QueryToken;
use mindrdf::{GraphName, NamedNode, Subject, Term};
use mindstore::StoreSnapshot;
use rustc_hash::FxHashSet;
use sparir::algebra::PropertyPathExpression;

/// Enumerates the `(start, end)` pairs connected by `path`, restricted to
/// the endpoints that are bound.
pub(crate) fn evaluate_path(
    snapshot: &StoreSnapshot,
    path: &PropertyPathExpression,
    start: Option<&Term>,
    end: Option<&Term>,
    graph: Option<&GraphName>,
    token: &QueryToken,
) -> Result<Vec<(Term, Term)>, QueryEvaluationError> {
    match (start, end) {
        (Some(start), _) => {
            let mut pairs = Vec::new();
            for found in ends_from(snapshot, path, start, graph, token)? {
                match end {
                    Some(end) => {
                        if *end == found {
                            pairs.push((start.clone(), found));
                        }
                    }
                    None => pairs.push((start.clone(), found)),
                }
            }
            Ok(pairs)
        }
        (None, Some(end)) => {
            // Walk backwards: ends_from over the reversed path.
            let reversed = PropertyPathExpression::Reverse(Box::new(path.clone()));
            let mut pairs = Vec::new();
            for found in ends_from(snapshot, &reversed, end, graph, token)? {
                pairs.push((found, end.clone()));
            }
            Ok(pairs)
        }
        (None, None) => {
            let mut pairs = Vec::new();
            for start in graph_resources(snapshot, graph)? {
                for found in ends_from(snapshot, path, &start, graph, token)? {
                    pairs.push((start.clone(), found));
                }
            }
            // Deduplicate: distinct start resources cannot repeat, but a
            // reflexive closure may re-derive pairs.
            let mut seen = FxHashSet::default();
            pairs.retain(|pair| seen.insert(pair.clone()));
            Ok(pairs)
        }
    }
}

/// All ends reachable from `start` through `path`.
fn ends_from(
    snapshot: &StoreSnapshot,
    path: &PropertyPathExpression,
    start: &Term,
    graph: Option<&GraphName>,
    token: &QueryToken,
) -> Result<Vec<Term>, QueryEvaluationError> {
    token.check()?;
    match path {
        PropertyPathExpression::NamedNode(predicate) => {
            step_forward(snapshot, start, predicate, graph)
        }
        PropertyPathExpression::Reverse(inner) => match inner.as_ref() {
            PropertyPathExpression::NamedNode(predicate) => {
                step_backward(snapshot, start, predicate, graph)
            }
            PropertyPathExpression::Reverse(inner) => {
                ends_from(snapshot, inner, start, graph, token)
            }
            PropertyPathExpression::Sequence(a, b) => {
                // ^(a/b) = ^b / ^a
                let flipped = PropertyPathExpression::Sequence(
                    Box::new(PropertyPathExpression::Reverse(b.clone())),
                    Box::new(PropertyPathExpression::Reverse(a.clone())),
                );
                ends_from(snapshot, &flipped, start, graph, token)
            }
            PropertyPathExpression::Alternative(a, b) => {
                let flipped = PropertyPathExpression::Alternative(
                    Box::new(PropertyPathExpression::Reverse(a.clone())),
                    Box::new(PropertyPathExpression::Reverse(b.clone())),
                );
                ends_from(snapshot, &flipped, start, graph, token)
            }
            PropertyPathExpression::ZeroOrMore(inner) => {
                let flipped = PropertyPathExpression::ZeroOrMore(Box::new(
                    PropertyPathExpression::Reverse(inner.clone()),
                ));
                ends_from(snapshot, &flipped, start, graph, token)
            }
            PropertyPathExpression::OneOrMore(inner) => {
                let flipped = PropertyPathExpression::OneOrMore(Box::new(
                    PropertyPathExpression::Reverse(inner.clone()),
                ));
                ends_from(snapshot, &flipped, start, graph, token)
            }
            PropertyPathExpression::ZeroOrOne(inner) => {
                let flipped = PropertyPathExpression::ZeroOrOne(Box::new(
                    PropertyPathExpression::Reverse(inner.clone()),
                ));
                ends_from(snapshot, &flipped, start, graph, token)
            }
            PropertyPathExpression::NegatedPropertySet(predicates) => {
                negated_step(snapshot, start, predicates, graph, true)
            }
        },
        PropertyPathExpression::Sequence(a, b) => {
            let mut ends = Vec::new();
            let mut seen = FxHashSet::default();
            for middle in ends_from(snapshot, a, start, graph, token)? {
                for end in ends_from(snapshot, b, &middle, graph, token)? {
                    if seen.insert(end.clone()) {
                        ends.push(end);
                    }
                }
            }
            Ok(ends)
        }
        PropertyPathExpression::Alternative(a, b) => {
            let mut ends = ends_from(snapshot, a, start, graph, token)?;
            let mut seen: FxHashSet<Term> = ends.iter().cloned().collect();
            for end in ends_from(snapshot, b, start, graph, token)? {
                if seen.insert(end.clone()) {
                    ends.push(end);
                }
            }
            Ok(ends)
        }
        PropertyPathExpression::ZeroOrMore(inner) => {
            closure_from(snapshot, inner, start, graph, token, true)
        }
        PropertyPathExpression::OneOrMore(inner) => {
            closure_from(snapshot, inner, start, graph, token, false)
        }
        PropertyPathExpression::ZeroOrOne(inner) => {
            let mut ends = vec![start.clone()];
            for end in ends_from(snapshot, inner, start, graph, token)? {
                if end != *start {
                    ends.push(end);
                }
            }
            Ok(ends)
        }
        PropertyPathExpression::NegatedPropertySet(predicates) => {
            negated_step(snapshot, start, predicates, graph, false)
        }
    }
}

/// Breadth-first closure; `reflexive` includes the start itself (`*` vs `+`).
fn closure_from(
    snapshot: &StoreSnapshot,
    inner: &PropertyPathExpression,
    start: &Term,
    graph: Option<&GraphName>,
    token: &QueryToken,
    reflexive: bool,
) -> Result<Vec<Term>, QueryEvaluationError> {
    let mut reached = Vec::new();
    let mut visited = FxHashSet::default();
    let mut frontier = vec![start.clone()];
    if reflexive {
        visited.insert(start.clone());
        reached.push(start.clone());
    }
    while !frontier.is_empty() {
        token.check()?;
        let mut next = Vec::new();
        for node in frontier {
            for end in ends_from(snapshot, inner, &node, graph, token)? {
                if visited.insert(end.clone()) {
                    reached.push(end.clone());
                    next.push(end);
                }
            }
        }
        frontier = next;
    }
    Ok(reached)
}

fn step_forward(
    snapshot: &StoreSnapshot,
    start: &Term,
    predicate: &NamedNode,
    graph: Option<&GraphName>,
) -> Result<Vec<Term>, QueryEvaluationError> {
    let Some(subject) = term_as_subject(start) else {
        return Ok(Vec::new());
    };
    Ok(snapshot
        .quads_for_pattern(Some(&subject), Some(predicate), None, graph)?
        .into_iter()
        .map(|quad| quad.object)
        .collect())
}

fn step_backward(
    snapshot: &StoreSnapshot,
    start: &Term,
    predicate: &NamedNode,
    graph: Option<&GraphName>,
) -> Result<Vec<Term>, QueryEvaluationError> {
    Ok(snapshot
        .quads_for_pattern(None, Some(predicate), Some(start), graph)?
        .into_iter()
        .map(|quad| Term::from(quad.subject))
        .collect())
}

fn negated_step(
    snapshot: &StoreSnapshot,
    start: &Term,
    predicates: &[NamedNode],
    graph: Option<&GraphName>,
    backward: bool,
) -> Result<Vec<Term>, QueryEvaluationError> {
    let quads = if backward {
        snapshot.quads_for_pattern(None, None, Some(start), graph)?
    } else {
        let Some(subject) = term_as_subject(start) else {
            return Ok(Vec::new());
        };
        snapshot.quads_for_pattern(Some(&subject), None, None, graph)?
    };
    Ok(quads
        .into_iter()
        .filter(|quad| !predicates.contains(&quad.predicate))
        .map(|quad| {
            if backward {
                Term::from(quad.subject)
            } else {
                quad.object
            }
        })
        .collect())
}

fn term_as_subject(term: &Term) -> Option<Subject> {
    match term {
        Term::NamedNode(node) => Some(Subject::NamedNode(node.clone())),
        Term::BlankNode(node) => Some(Subject::BlankNode(node.clone())),
        Term::Triple(triple) => Some(Subject::Triple(triple.clone())),
        Term::Literal(_) => None,
    }
}

/// Every resource appearing as subject or object in the active graph.
pub(crate) fn graph_resources(
    snapshot: &StoreSnapshot,
    graph: Option<&GraphName>,
) -> Result<Vec<Term>, QueryEvaluationError> {
    let mut resources = Vec::new();
    let mut seen = FxHashSet::default();
    for quad in snapshot.quads_for_pattern(None, None, None, graph)? {
        let subject = Term::from(quad.subject);
        if seen.insert(subject.clone()) {
            resources.push(subject);
        }
        if seen.insert(quad.object.clone()) {
            resources.push(quad.object);
        }
    }
    Ok(resources)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mindrdf::Quad;
    use mindstore::MemoryTripleStore;

    fn ex(name: &str) -> NamedNode {
        NamedNode::new_unchecked(format!("http://example.com/{name}"))
    }

    fn chain_store() -> MemoryTripleStore {
        // a → b → c → d
        let store = MemoryTripleStore::new();
        for (s, o) in [("a", "b"), ("b", "c"), ("c", "d")] {
            store
                .insert(Quad::new_in_default_graph(ex(s), ex("knows"), ex(o)))
                .unwrap();
        }
        store
    }

    fn ends(path: &PropertyPathExpression, start: &str) -> Vec<Term> {
        let store = chain_store();
        let start = Term::from(ex(start));
        let mut pairs = evaluate_path(
            &store.snapshot(),
            path,
            Some(&start),
            None,
            None,
            &QueryToken::new(),
        )
        .unwrap();
        pairs.sort_by_key(|(_, end)| end.to_string());
        pairs.into_iter().map(|(_, end)| end).collect()
    }

    #[test]
    fn one_or_more_is_transitive_but_not_reflexive() {
        let path = PropertyPathExpression::OneOrMore(Box::new(
            PropertyPathExpression::NamedNode(ex("knows")),
        ));
        let reached = ends(&path, "a");
        assert_eq!(reached.len(), 3);
        assert!(!reached.contains(&Term::from(ex("a"))));
    }

    #[test]
    fn zero_or_more_adds_the_reflexive_pair() {
        let path = PropertyPathExpression::ZeroOrMore(Box::new(
            PropertyPathExpression::NamedNode(ex("knows")),
        ));
        let reached = ends(&path, "a");
        assert_eq!(reached.len(), 4);
        assert!(reached.contains(&Term::from(ex("a"))));
    }

    #[test]
    fn cycles_terminate() {
        let store = MemoryTripleStore::new();
        store
            .insert(Quad::new_in_default_graph(ex("a"), ex("p"), ex("b")))
            .unwrap();
        store
            .insert(Quad::new_in_default_graph(ex("b"), ex("p"), ex("a")))
            .unwrap();
        let path = PropertyPathExpression::OneOrMore(Box::new(
            PropertyPathExpression::NamedNode(ex("p")),
        ));
        let start = Term::from(ex("a"));
        let pairs = evaluate_path(
            &store.snapshot(),
            &path,
            Some(&start),
            None,
            None,
            &QueryToken::new(),
        )
        .unwrap();
        // a+ reaches b and comes back to a through the cycle.
        assert_eq!(pairs.len(), 2);
    }

    #[test]
    fn inverse_and_sequence() {
        let path = PropertyPathExpression::Sequence(
            Box::new(PropertyPathExpression::NamedNode(ex("knows"))),
            Box::new(PropertyPathExpression::NamedNode(ex("knows"))),
        );
        assert_eq!(ends(&path, "a"), vec![Term::from(ex("c"))]);

        let inverse = PropertyPathExpression::Reverse(Box::new(
            PropertyPathExpression::NamedNode(ex("knows")),
        ));
        assert_eq!(ends(&inverse, "b"), vec![Term::from(ex("a"))]);
    }

    #[test]
    fn unbound_start_enumerates_graph_resources() {
        let store = chain_store();
        let path = PropertyPathExpression::NamedNode(ex("knows"));
        let pairs = evaluate_path(
            &store.snapshot(),
            &path,
            None,
            None,
            None,
            &QueryToken::new(),
        )
        .unwrap();
        assert_eq!(pairs.len(), 3);
    }

    #[test]
    fn negated_sets_filter_candidates() {
        let store = chain_store();
        store
            .insert(Quad::new_in_default_graph(ex("a"), ex("likes"), ex("z")))
            .unwrap();
        let path = PropertyPathExpression::NegatedPropertySet(vec![ex("knows")]);
        let start = Term::from(ex("a"));
        let pairs = evaluate_path(
            &store.snapshot(),
            &path,
            Some(&start),
            None,
            None,
            &QueryToken::new(),
        )
        .unwrap();
        assert_eq!(pairs, vec![(start, Term::from(ex("z")))]);
    }
}
