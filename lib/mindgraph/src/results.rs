//! Materialized query results: what the cache stores and callers consume.

use mindrdf::{Term, Triple, Variable};
use serde_json::Value;
use sparexec::{QueryEvaluationError, QueryResults, QuerySolution, QuerySolutionIter, QueryTripleIter};
use std::sync::Arc;

/// Fully materialized results of one query, cheap to clone and hashable for
/// the cache's change detection.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MaterializedResults {
    /// `SELECT`: the output variables and one row of optional bindings each.
    Solutions {
        variables: Vec<Variable>,
        rows: Vec<Vec<Option<Term>>>,
    },
    /// `ASK`.
    Boolean(bool),
    /// `CONSTRUCT` / `DESCRIBE`.
    Graph(Vec<Triple>),
}

impl MaterializedResults {
    pub(crate) fn from_results(
        results: QueryResults,
    ) -> Result<Self, QueryEvaluationError> {
        match results {
            QueryResults::Boolean(value) => Ok(Self::Boolean(value)),
            QueryResults::Solutions(solutions) => {
                let variables = solutions.variables().to_vec();
                let mut rows = Vec::new();
                for solution in solutions {
                    let solution = solution?;
                    rows.push(
                        variables
                            .iter()
                            .map(|v| solution.get(v.as_str()).cloned())
                            .collect(),
                    );
                }
                Ok(Self::Solutions { variables, rows })
            }
            QueryResults::Graph(triples) => {
                Ok(Self::Graph(triples.collect::<Result<Vec<_>, _>>()?))
            }
        }
    }

    /// The number of solutions or triples (1/0 for booleans).
    pub fn len(&self) -> usize {
        match self {
            Self::Solutions { rows, .. } => rows.len(),
            Self::Boolean(value) => usize::from(*value),
            Self::Graph(triples) => triples.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The solution rows as [`QuerySolution`]s, empty for other shapes.
    pub fn solutions(&self) -> Vec<QuerySolution> {
        let Self::Solutions { variables, rows } = self else {
            return Vec::new();
        };
        let variables: Arc<[Variable]> = variables.clone().into();
        rows.iter()
            .map(|row| QuerySolution::from((Arc::clone(&variables), row.clone())))
            .collect()
    }

    /// Replays the materialized data as a lazy [`QueryResults`].
    pub fn into_results(self) -> QueryResults {
        match self {
            Self::Boolean(value) => QueryResults::Boolean(value),
            Self::Solutions { variables, rows } => {
                let variables: Arc<[Variable]> = variables.into();
                let output = Arc::clone(&variables);
                QueryResults::Solutions(QuerySolutionIter::new(
                    variables,
                    rows.into_iter()
                        .map(move |row| Ok(QuerySolution::from((Arc::clone(&output), row)))),
                ))
            }
            Self::Graph(triples) => {
                QueryResults::Graph(QueryTripleIter::new(triples.into_iter().map(Ok)))
            }
        }
    }

    /// The canonical JSON rendering (SPARQL 1.1 Query Results JSON).
    pub fn to_json(&self) -> Result<Value, QueryEvaluationError> {
        self.clone().into_results().into_json()
    }
}
