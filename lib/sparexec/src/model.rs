//! Query results: solution sequences, triple streams, booleans, and their
//! canonical JSON rendering (the SPARQL 1.1 Query Results JSON shape).

use crate::error::QueryEvaluationError;
use mindrdf::{Term, Triple, Variable};
use serde_json::{json, Map, Value};
use std::sync::Arc;

/// Results of a SPARQL query.
pub enum QueryResults {
    /// Results of a `SELECT` query.
    Solutions(QuerySolutionIter),
    /// Result of an `ASK` query.
    Boolean(bool),
    /// Results of a `CONSTRUCT` or `DESCRIBE` query.
    Graph(QueryTripleIter),
}

impl QueryResults {
    /// Drains the results into their canonical JSON representation.
    ///
    /// Solutions and booleans use the SPARQL 1.1 Query Results JSON format;
    /// graphs are rendered as an array of `{subject, predicate, object}`
    /// objects.
    pub fn into_json(self) -> Result<Value, QueryEvaluationError> {
        match self {
            Self::Boolean(value) => Ok(json!({ "head": {}, "boolean": value })),
            Self::Solutions(solutions) => {
                let variables: Vec<String> = solutions
                    .variables()
                    .iter()
                    .map(|v| v.as_str().to_owned())
                    .collect();
                let mut bindings = Vec::new();
                for solution in solutions {
                    let solution = solution?;
                    let mut row = Map::new();
                    for (variable, term) in solution.iter() {
                        row.insert(variable.as_str().to_owned(), term_to_json(term));
                    }
                    bindings.push(Value::Object(row));
                }
                Ok(json!({
                    "head": { "vars": variables },
                    "results": { "bindings": bindings },
                }))
            }
            Self::Graph(triples) => {
                let mut rendered = Vec::new();
                for triple in triples {
                    let triple = triple?;
                    rendered.push(json!({
                        "subject": triple.subject.to_string(),
                        "predicate": triple.predicate.to_string(),
                        "object": triple.object.to_string(),
                    }));
                }
                Ok(Value::Array(rendered))
            }
        }
    }
}

impl From<QuerySolutionIter> for QueryResults {
    fn from(value: QuerySolutionIter) -> Self {
        Self::Solutions(value)
    }
}

impl From<bool> for QueryResults {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

fn term_to_json(term: &Term) -> Value {
    match term {
        Term::NamedNode(node) => json!({ "type": "uri", "value": node.as_str() }),
        Term::BlankNode(node) => json!({ "type": "bnode", "value": node.as_str() }),
        Term::Literal(literal) => {
            let mut object = Map::new();
            object.insert("type".to_owned(), Value::String("literal".to_owned()));
            object.insert(
                "value".to_owned(),
                Value::String(literal.value().to_owned()),
            );
            if let Some(language) = literal.language() {
                object.insert(
                    "xml:lang".to_owned(),
                    Value::String(language.to_owned()),
                );
                if let Some(direction) = literal.direction() {
                    object.insert(
                        "its:dir".to_owned(),
                        Value::String(direction.to_string()),
                    );
                }
            } else if literal.datatype() != mindrdf::vocab::xsd::STRING {
                object.insert(
                    "datatype".to_owned(),
                    Value::String(literal.datatype().as_str().to_owned()),
                );
            }
            Value::Object(object)
        }
        Term::Triple(triple) => json!({
            "type": "triple",
            "value": {
                "subject": triple.subject.to_string(),
                "predicate": triple.predicate.to_string(),
                "object": triple.object.to_string(),
            }
        }),
    }
}

/// One solution mapping: a partial binding of the output variables.
#[derive(Debug, Clone)]
pub struct QuerySolution {
    variables: Arc<[Variable]>,
    values: Vec<Option<Term>>,
}

impl QuerySolution {
    pub(crate) fn new(variables: Arc<[Variable]>, values: Vec<Option<Term>>) -> Self {
        Self { variables, values }
    }

    /// The output variables, bound or not.
    pub fn variables(&self) -> &[Variable] {
        &self.variables
    }

    /// The binding of `variable`, if any.
    pub fn get(&self, variable: &str) -> Option<&Term> {
        let index = self
            .variables
            .iter()
            .position(|v| v.as_str() == variable)?;
        self.values.get(index)?.as_ref()
    }

    /// The bound `(variable, term)` pairs, in projection order.
    pub fn iter(&self) -> impl Iterator<Item = (&Variable, &Term)> {
        self.variables
            .iter()
            .zip(&self.values)
            .filter_map(|(variable, value)| value.as_ref().map(|term| (variable, term)))
    }

    pub fn is_empty(&self) -> bool {
        self.values.iter().all(Option::is_none)
    }
}

impl From<(Arc<[Variable]>, Vec<Option<Term>>)> for QuerySolution {
    fn from((variables, values): (Arc<[Variable]>, Vec<Option<Term>>)) -> Self {
        Self { variables, values }
    }
}

impl PartialEq for QuerySolution {
    fn eq(&self, other: &Self) -> bool {
        self.variables == other.variables && self.values == other.values
    }
}

impl Eq for QuerySolution {}

/// A lazy sequence of [`QuerySolution`]s.
pub struct QuerySolutionIter {
    variables: Arc<[Variable]>,
    iter: Box<dyn Iterator<Item = Result<QuerySolution, QueryEvaluationError>>>,
}

impl QuerySolutionIter {
    pub fn new(
        variables: Arc<[Variable]>,
        iter: impl Iterator<Item = Result<QuerySolution, QueryEvaluationError>> + 'static,
    ) -> Self {
        Self {
            variables,
            iter: Box::new(iter),
        }
    }

    pub fn variables(&self) -> &[Variable] {
        &self.variables
    }
}

impl Iterator for QuerySolutionIter {
    type Item = Result<QuerySolution, QueryEvaluationError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.iter.next()
    }
}

/// A lazy sequence of triples, for `CONSTRUCT` and `DESCRIBE`.
pub struct QueryTripleIter {
    iter: Box<dyn Iterator<Item = Result<Triple, QueryEvaluationError>>>,
}

impl QueryTripleIter {
    pub fn new(iter: impl Iterator<Item = Result<Triple, QueryEvaluationError>> + 'static) -> Self {
        Self {
            iter: Box::new(iter),
        }
    }
}

impl Iterator for QueryTripleIter {
    type Item = Result<Triple, QueryEvaluationError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.iter.next()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mindrdf::{Literal, NamedNode};

    #[test]
    fn solution_accessors() {
        let variables: Arc<[Variable]> =
            Arc::from(vec![Variable::new_unchecked("x"), Variable::new_unchecked("y")]);
        let solution = QuerySolution::new(
            Arc::clone(&variables),
            vec![Some(Term::from(Literal::from(1))), None],
        );
        assert!(solution.get("x").is_some());
        assert!(solution.get("y").is_none());
        assert!(solution.get("z").is_none());
        assert_eq!(solution.iter().count(), 1);
    }

    #[test]
    fn json_shape_for_solutions() {
        let variables: Arc<[Variable]> = Arc::from(vec![Variable::new_unchecked("s")]);
        let solution = QuerySolution::new(
            Arc::clone(&variables),
            vec![Some(Term::from(NamedNode::new_unchecked(
                "http://example.com/a",
            )))],
        );
        let results =
            QueryResults::Solutions(QuerySolutionIter::new(variables, vec![Ok(solution)].into_iter()));
        let json = results.into_json().unwrap();
        assert_eq!(json["head"]["vars"][0], "s");
        assert_eq!(
            json["results"]["bindings"][0]["s"]["value"],
            "http://example.com/a"
        );
        assert_eq!(json["results"]["bindings"][0]["s"]["type"], "uri");
    }

    #[test]
    fn json_shape_for_booleans() {
        let json = QueryResults::Boolean(true).into_json().unwrap();
        assert_eq!(json["boolean"], true);
    }
}
